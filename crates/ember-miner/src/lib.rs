//! # Ember Miner
//!
//! Pending-block assembly: the payload job lifecycle (`start` / `build` /
//! `stop`), tip-ordered greedy transaction selection against a forked
//! state, EIP-1559/4844 fee derivation for the child header, withdrawal
//! application, and blob-bundle sidecar aggregation.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod builder;
pub mod errors;
pub mod fees;

pub use builder::{
    payload_id, BlobBundle, BuiltPayload, PayloadAttributes, PayloadId, PendingBlockBuilder,
};
pub use errors::BuildError;
pub use fees::{data_gas_price, next_base_fee, next_excess_data_gas};
