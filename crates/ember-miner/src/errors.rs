//! # Build Error Types

use thiserror::Error;

/// Errors from the pending-block builder.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// No job registered under the payload id.
    #[error("unknown payload id")]
    UnknownPayload,

    /// The job was cancelled before any candidate was assembled.
    #[error("build cancelled")]
    Cancelled,

    /// The execution engine failed.
    #[error("execution failure: {0}")]
    Evm(String),

    /// The state layer failed.
    #[error("state failure: {0}")]
    State(String),

    /// Transaction encoding failed while sealing the block.
    #[error("encoding failure: {0}")]
    Encoding(String),
}

impl From<ember_evm::VmError> for BuildError {
    fn from(error: ember_evm::VmError) -> Self {
        Self::Evm(error.to_string())
    }
}

impl From<ember_state::StateError> for BuildError {
    fn from(error: ember_state::StateError) -> Self {
        Self::State(error.to_string())
    }
}
