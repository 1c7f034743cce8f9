//! # Ember State
//!
//! The state layer between the EVM and its backends: the undo-log journal,
//! transient storage, the journaled EVM-facing state handle, and in-memory
//! implementations of the state-manager and blockchain ports.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod errors;
pub mod journal;
pub mod journaled;
pub mod memory;
pub mod ports;
pub mod transient;

pub use errors::StateError;
pub use journal::Journal;
pub use journaled::JournaledState;
pub use memory::{fork_state, MemoryBlockchain, MemoryStateManager};
pub use ports::{AccountFields, Blockchain, StateManager};
pub use transient::TransientStorage;
