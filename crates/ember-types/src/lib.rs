//! # Ember Core Types
//!
//! Value objects and consensus data structures shared by every Ember crate:
//! byte-array primitives, accounts, logs and blooms, access lists, block
//! headers and bodies, withdrawals, and receipts. All consensus types carry
//! their RLP encodings.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod access_list;
pub mod account;
pub mod block;
pub mod header;
pub mod log;
pub mod primitives;
pub mod receipt;

pub use access_list::{AccessList, AccessListItem};
pub use account::{Account, EMPTY_ROOT, KECCAK_EMPTY};
pub use block::{Block, Withdrawal, GWEI};
pub use header::{BlockHeader, EMPTY_UNCLE_HASH};
pub use log::{Bloom, Log, MAX_TOPICS};
pub use primitives::{u256_to_be_bytes, Address, Bytes, Hash, StorageKey, StorageValue, U256, U512};
pub use receipt::Receipt;
