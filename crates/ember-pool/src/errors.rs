//! # Pool Error Types

use ember_types::Hash;
use thiserror::Error;

/// Errors from transaction-pool admission.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The transaction hash is already pooled.
    #[error("transaction already known: {0}")]
    AlreadyKnown(Hash),

    /// Transaction nonce is below the account nonce.
    #[error("nonce too low: tx {tx}, account {account}")]
    NonceTooLow {
        /// Nonce carried by the transaction.
        tx: u64,
        /// Current account nonce.
        account: u64,
    },

    /// A same-nonce replacement did not raise the tip enough.
    #[error("replacement underpriced: needs at least {required}")]
    ReplacementUnderpriced {
        /// Minimum acceptable tip.
        required: ember_types::U256,
    },

    /// Fee cap below the configured fraction of the current base fee.
    #[error("fee below base fee floor")]
    FeeBelowBase,

    /// The pool is at capacity.
    #[error("pool full: capacity {capacity}")]
    PoolFull {
        /// Configured capacity.
        capacity: usize,
    },

    /// One sender holds too many pending transactions.
    #[error("account limit reached: {limit} per sender")]
    AccountLimitReached {
        /// Per-sender limit.
        limit: usize,
    },

    /// Sender balance cannot cover the upfront cost.
    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        /// Wei required.
        required: ember_types::U256,
        /// Wei available.
        available: ember_types::U256,
    },

    /// Transaction does not fit the chain's active rules.
    #[error("transaction incompatible with chain rules: {0}")]
    RulesMismatch(&'static str),

    /// Decoding, signature, or sidecar validation failed.
    #[error("invalid transaction: {0}")]
    Invalid(String),

    /// The backing state store failed.
    #[error("state failure: {0}")]
    State(String),

    /// Transaction not present.
    #[error("transaction not found: {0}")]
    NotFound(Hash),
}

impl From<ember_tx::TxError> for PoolError {
    fn from(error: ember_tx::TxError) -> Self {
        Self::Invalid(error.to_string())
    }
}

impl From<ember_state::StateError> for PoolError {
    fn from(error: ember_state::StateError) -> Self {
        Self::State(error.to_string())
    }
}
