//! # State Error Types

use thiserror::Error;

/// Errors from state access and journaling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    /// Commit or revert without a matching checkpoint.
    #[error("journal commit/revert without matching checkpoint")]
    JournalUnbalanced,

    /// The backing store failed.
    #[error("state backend failure: {0}")]
    Backend(String),

    /// A state root was requested for an unknown snapshot.
    #[error("unknown state root")]
    UnknownStateRoot,
}
