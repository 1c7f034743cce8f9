//! # EVM Error Types
//!
//! Execution faults are carried inside `ExecResult` as the frame's
//! exception; only `Revert` preserves return data and remaining gas, and the
//! Frontier-only `CodestoreOutOfGas` is dismissed at the create site so
//! sibling frames keep their refunds.

use ember_state::StateError;
use ember_types::{Address, U256};
use thiserror::Error;

/// Errors raised during EVM execution and transaction running.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    /// Execution ran out of gas.
    #[error("out of gas")]
    OutOfGas,

    /// Pop from an empty stack.
    #[error("stack underflow")]
    StackUnderflow,

    /// Push beyond 1024 items.
    #[error("stack overflow")]
    StackOverflow,

    /// Undefined or deactivated opcode.
    #[error("invalid opcode: 0x{0:02x}")]
    InvalidOpcode(u8),

    /// Jump to a non-JUMPDEST position.
    #[error("invalid jump destination: {0}")]
    InvalidJump(usize),

    /// State-changing operation inside STATICCALL.
    #[error("state modification in static context")]
    StaticStateChange,

    /// Deployed code failed validation (0xEF prefix outside EOF).
    #[error("invalid bytecode result")]
    InvalidBytecodeResult,

    /// Malformed EOF container.
    #[error("invalid EOF format: {0}")]
    InvalidEofFormat(&'static str),

    /// CREATE target already occupied.
    #[error("create collision at {0:?}")]
    CreateCollision(Address),

    /// Initcode exceeds the EIP-3860 ceiling.
    #[error("initcode size {size} exceeds maximum {max}")]
    InitcodeSizeViolation {
        /// Observed initcode size.
        size: usize,
        /// Configured ceiling.
        max: usize,
    },

    /// Deployed code exceeds the EIP-170 ceiling.
    #[error("code size {size} exceeds maximum {max}")]
    CodesizeExceedsMax {
        /// Observed deployed-code size.
        size: usize,
        /// Configured ceiling.
        max: usize,
    },

    /// Value arithmetic overflowed 256 bits.
    #[error("value overflow")]
    ValueOverflow,

    /// Transfer exceeds the sender's balance.
    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        /// Wei needed.
        required: U256,
        /// Wei available.
        available: U256,
    },

    /// REVERT opcode: state is rolled back, return data survives.
    #[error("execution reverted")]
    Revert,

    /// Frontier only: the code-deposit charge did not fit in the remaining
    /// gas. Dismissed at the create site; sibling refunds survive.
    #[error("code store out of gas")]
    CodestoreOutOfGas,

    /// Call depth exceeded the configured limit.
    #[error("call depth exceeded {0}")]
    CallDepthExceeded(u64),

    /// RETURNDATACOPY past the end of return data.
    #[error("return data access out of bounds")]
    ReturnDataOutOfBounds,

    /// Memory expansion beyond the interpreter ceiling.
    #[error("memory limit exceeded: requested {requested}")]
    MemoryLimitExceeded {
        /// Requested byte size.
        requested: usize,
    },

    /// Transaction nonce does not match the account.
    #[error("nonce mismatch: tx {tx}, account {account}")]
    NonceMismatch {
        /// Nonce carried by the transaction.
        tx: u64,
        /// Current account nonce.
        account: u64,
    },

    /// Transaction gas limit is below its intrinsic gas.
    #[error("gas limit {limit} below intrinsic gas {intrinsic}")]
    IntrinsicGasTooLow {
        /// Transaction gas limit.
        limit: u64,
        /// Required intrinsic gas.
        intrinsic: u64,
    },

    /// Fee cap below the block base fee.
    #[error("max fee per gas below block base fee")]
    FeeCapTooLow,

    /// A precompile rejected its input.
    #[error("precompile failure: {0}")]
    PrecompileFailure(&'static str),

    /// The active rules need the external crypto provider, which is not
    /// installed.
    #[error("crypto provider not initialized")]
    CryptoNotInitialized,

    /// Transaction-level validation failed before execution.
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    /// State backend failure.
    #[error(transparent)]
    State(#[from] StateError),
}

impl From<ember_tx::TxError> for VmError {
    fn from(error: ember_tx::TxError) -> Self {
        Self::InvalidTransaction(error.to_string())
    }
}

impl VmError {
    /// Revert keeps remaining gas and return data; everything else consumes
    /// the frame's gas and drops its effects.
    #[must_use]
    pub fn consumes_all_gas(&self) -> bool {
        !matches!(self, Self::Revert)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revert_is_the_only_gas_preserving_error() {
        assert!(!VmError::Revert.consumes_all_gas());
        assert!(VmError::OutOfGas.consumes_all_gas());
        assert!(VmError::InvalidOpcode(0xfe).consumes_all_gas());
        assert!(VmError::StaticStateChange.consumes_all_gas());
    }
}
