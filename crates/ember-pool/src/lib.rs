//! # Ember Transaction Pool
//!
//! The pending-transaction pool: per-sender nonce-ordered queues, fee-based
//! admission and replacement, and sidecar retention for blob transactions.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod errors;
pub mod pool;

pub use errors::PoolError;
pub use pool::{BlobSidecar, PoolConfig, PooledTransaction, TxPool};

use parking_lot::RwLock;
use std::sync::Arc;

/// A pool handle shared between the RPC surface and the block assembler.
pub type SharedTxPool = Arc<RwLock<TxPool>>;

/// Wraps a pool in the shared handle type.
#[must_use]
pub fn shared(pool: TxPool) -> SharedTxPool {
    Arc::new(RwLock::new(pool))
}
