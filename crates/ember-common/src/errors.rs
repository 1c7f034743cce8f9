//! # Chain Configuration Errors

use crate::hardfork::Hardfork;
use thiserror::Error;

/// Errors from chain configuration and hardfork resolution.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// Hardfork name is not part of the canonical set.
    #[error("unknown hardfork: {0}")]
    UnknownHardfork(String),

    /// The chain schedules more than one total-difficulty hardfork.
    #[error("chain schedules more than one merge hardfork")]
    MultipleMergeHardforks,

    /// Block-based selection requires a hardfork active at block zero.
    #[error("no hardfork scheduled at or before the requested point")]
    MustHaveHardforkAtZero,

    /// Total difficulty and block number select conflicting hardforks.
    #[error("total difficulty conflicts with the block-derived hardfork")]
    HardforkMismatch,

    /// EIP number is not in the registry.
    #[error("unknown EIP: {0}")]
    UnknownEip(u64),

    /// An activated EIP requires another EIP that is not active.
    #[error("EIP-{eip} requires EIP-{missing} to be active")]
    EipPrerequisiteMissing {
        /// The EIP being activated.
        eip: u64,
        /// The prerequisite that is missing.
        missing: u64,
    },

    /// An activated EIP needs a later hardfork than the configured one.
    #[error("EIP-{eip} requires hardfork >= {minimum}")]
    EipMinimumHardfork {
        /// The EIP being activated.
        eip: u64,
        /// Its minimum hardfork.
        minimum: Hardfork,
    },
}
