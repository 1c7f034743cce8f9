//! # Ember Transactions
//!
//! The typed-transaction layer: legacy, EIP-2930, EIP-1559, and EIP-4844
//! shapes with canonical RLP codecs, signing and sender recovery, intrinsic
//! gas, upfront-cost math, and the blob network wrapper with KZG
//! verification. Transactions are frozen on construction: all invariants are
//! checked in `new`, and the resulting values are immutable.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

mod codec;

pub mod eip1559;
pub mod eip2930;
pub mod eip4844;
pub mod envelope;
pub mod errors;
pub mod fees;
pub mod legacy;
pub mod signature;
pub mod test_util;

pub use eip1559::{FeeMarketTx, FeeMarketTxData, FEE_MARKET_TX_TYPE};
pub use eip2930::{AccessListTx, AccessListTxData, ACCESS_LIST_TX_TYPE};
pub use eip4844::{BlobTx, BlobTxData, BlobTxNetworkWrapper, BLOB_TX_TYPE};
pub use envelope::{Transaction, TxType, TypedTransaction};
pub use errors::TxError;
pub use fees::{effective_priority_fee, fee_overflows, intrinsic_gas};
pub use legacy::{LegacyTx, LegacyTxData};
pub use signature::{sign_legacy, sign_typed, TxSignature};
