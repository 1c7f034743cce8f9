//! # The Transaction Sum Type
//!
//! `TypedTransaction` is the tagged sum over the four transaction shapes,
//! with the shared capability set expressed by the [`Transaction`] trait.
//! Envelope dispatch lives here: a leading byte of 0x01/0x02/0x03 selects a
//! typed payload, anything ≥ 0xc0 is a legacy RLP list.

use crate::eip1559::{FeeMarketTx, FEE_MARKET_TX_TYPE};
use crate::eip2930::{AccessListTx, ACCESS_LIST_TX_TYPE};
use crate::eip4844::{BlobTx, BLOB_TX_TYPE};
use crate::errors::TxError;
use crate::legacy::LegacyTx;
use crate::signature::TxSignature;
use ember_common::Common;
use ember_types::{AccessList, Address, Bytes, Hash, U256};
use serde::Serialize;
use tracing::trace;

/// Transaction envelope types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TxType {
    /// Untyped pre-EIP-2718 transaction.
    Legacy,
    /// EIP-2930 access-list transaction.
    AccessList,
    /// EIP-1559 fee-market transaction.
    FeeMarket,
    /// EIP-4844 blob transaction.
    Blob,
}

impl TxType {
    /// The envelope byte (0 for legacy, which has none on the wire).
    #[must_use]
    pub fn byte(self) -> u8 {
        match self {
            Self::Legacy => 0x00,
            Self::AccessList => ACCESS_LIST_TX_TYPE,
            Self::FeeMarket => FEE_MARKET_TX_TYPE,
            Self::Blob => BLOB_TX_TYPE,
        }
    }
}

/// The capability set every transaction shape provides.
pub trait Transaction {
    /// Envelope type.
    fn tx_type(&self) -> TxType;
    /// Sender nonce.
    fn nonce(&self) -> u64;
    /// Gas limit.
    fn gas_limit(&self) -> u64;
    /// Recipient; `None` creates a contract.
    fn to(&self) -> Option<Address>;
    /// Value in wei.
    fn value(&self) -> U256;
    /// Calldata or initcode.
    fn data(&self) -> &Bytes;
    /// Access list, when the shape carries one.
    fn access_list(&self) -> Option<&AccessList>;
    /// The fee ceiling per gas (`gas_price` for pre-1559 shapes).
    fn max_fee_per_gas(&self) -> U256;
    /// The tip ceiling per gas (equal to the fee for pre-1559 shapes).
    fn max_priority_fee_per_gas(&self) -> U256;
    /// Signature, if signed.
    fn signature(&self) -> Option<&TxSignature>;
    /// Canonical wire encoding.
    ///
    /// # Errors
    ///
    /// Returns `Unsigned` before signing.
    fn serialize(&self) -> Result<Bytes, TxError>;
    /// The byte string whose digest is signed (signature fields excluded).
    fn message_to_sign(&self) -> Bytes;
    /// Keccak-256 of the signing message.
    fn signing_hash(&self) -> Hash;
    /// Transaction hash over the wire encoding.
    ///
    /// # Errors
    ///
    /// Returns `Unsigned` before signing.
    fn hash(&self) -> Result<Hash, TxError>;
    /// Recovered sender address.
    ///
    /// # Errors
    ///
    /// Returns `Unsigned` before signing, or recovery failures.
    fn sender_address(&self) -> Result<Address, TxError>;
    /// Intrinsic gas under the given rules.
    fn intrinsic_gas(&self, common: &Common) -> u64;
    /// Maximum wei the sender must hold to pay for the transaction.
    fn upfront_cost(&self, base_fee: Option<U256>, common: &Common) -> U256;
    /// The miner tip per gas at a base fee.
    fn effective_priority_fee(&self, base_fee: U256) -> U256;
}

/// The tagged sum over all four transaction shapes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TypedTransaction {
    /// Untyped legacy transaction.
    Legacy(LegacyTx),
    /// EIP-2930.
    AccessList(AccessListTx),
    /// EIP-1559.
    FeeMarket(FeeMarketTx),
    /// EIP-4844 (executable payload).
    Blob(BlobTx),
}

impl TypedTransaction {
    /// Decodes any wire-encoded transaction by its envelope byte.
    ///
    /// # Errors
    ///
    /// `UnknownTxType` for unrecognized envelope bytes, plus per-variant
    /// codec and validation errors.
    pub fn from_serialized(bytes: &[u8], common: &Common) -> Result<Self, TxError> {
        trace!(len = bytes.len(), first = ?bytes.first(), "decoding transaction envelope");
        match bytes.first() {
            None => Err(TxError::InvalidRlp("empty input".to_string())),
            Some(&ACCESS_LIST_TX_TYPE) => {
                AccessListTx::from_serialized(bytes, common).map(Self::AccessList)
            }
            Some(&FEE_MARKET_TX_TYPE) => {
                FeeMarketTx::from_serialized(bytes, common).map(Self::FeeMarket)
            }
            Some(&BLOB_TX_TYPE) => BlobTx::from_serialized(bytes, common).map(Self::Blob),
            Some(&byte) if byte <= 0x7f => Err(TxError::UnknownTxType(byte)),
            Some(_) => LegacyTx::from_serialized(bytes, common).map(Self::Legacy),
        }
    }

    /// Signs with a secret key, returning the signed transaction.
    ///
    /// # Errors
    ///
    /// Propagates key errors.
    pub fn sign(&self, secret_key: &[u8; 32]) -> Result<Self, TxError> {
        Ok(match self {
            Self::Legacy(tx) => Self::Legacy(tx.sign(secret_key)?),
            Self::AccessList(tx) => Self::AccessList(tx.sign(secret_key)?),
            Self::FeeMarket(tx) => Self::FeeMarket(tx.sign(secret_key)?),
            Self::Blob(tx) => Self::Blob(tx.sign(secret_key)?),
        })
    }

    /// Chain id carried or implied by the transaction.
    #[must_use]
    pub fn chain_id(&self) -> u64 {
        match self {
            Self::Legacy(tx) => tx.chain_id(),
            Self::AccessList(tx) => tx.chain_id(),
            Self::FeeMarket(tx) => tx.chain_id(),
            Self::Blob(tx) => tx.chain_id(),
        }
    }

    /// The blob payload, for type-3 transactions.
    #[must_use]
    pub fn as_blob(&self) -> Option<&BlobTx> {
        match self {
            Self::Blob(tx) => Some(tx),
            _ => None,
        }
    }

    /// The field values in serialization order, each as its minimal byte
    /// string (nested lists as their RLP encodings).
    #[must_use]
    pub fn raw_values(&self) -> Vec<Bytes> {
        match self {
            Self::Legacy(tx) => tx.raw_values(),
            Self::AccessList(tx) => tx.raw_values(),
            Self::FeeMarket(tx) => tx.raw_values(),
            Self::Blob(tx) => tx.raw_values(),
        }
    }

    /// Recovers the uncompressed sender public key (64 bytes).
    ///
    /// # Errors
    ///
    /// Returns `Unsigned` before signing, or recovery failures.
    pub fn sender_public_key(&self) -> Result<[u8; 64], TxError> {
        match self {
            Self::Legacy(tx) => tx.sender_public_key(),
            Self::AccessList(tx) => tx.sender_public_key(),
            Self::FeeMarket(tx) => tx.sender_public_key(),
            Self::Blob(tx) => tx.sender_public_key(),
        }
    }
}

impl Transaction for TypedTransaction {
    fn tx_type(&self) -> TxType {
        match self {
            Self::Legacy(_) => TxType::Legacy,
            Self::AccessList(_) => TxType::AccessList,
            Self::FeeMarket(_) => TxType::FeeMarket,
            Self::Blob(_) => TxType::Blob,
        }
    }

    fn nonce(&self) -> u64 {
        match self {
            Self::Legacy(tx) => tx.nonce(),
            Self::AccessList(tx) => tx.nonce(),
            Self::FeeMarket(tx) => tx.nonce(),
            Self::Blob(tx) => tx.nonce(),
        }
    }

    fn gas_limit(&self) -> u64 {
        match self {
            Self::Legacy(tx) => tx.gas_limit(),
            Self::AccessList(tx) => tx.gas_limit(),
            Self::FeeMarket(tx) => tx.gas_limit(),
            Self::Blob(tx) => tx.gas_limit(),
        }
    }

    fn to(&self) -> Option<Address> {
        match self {
            Self::Legacy(tx) => tx.to(),
            Self::AccessList(tx) => tx.to(),
            Self::FeeMarket(tx) => tx.to(),
            Self::Blob(tx) => Some(tx.to()),
        }
    }

    fn value(&self) -> U256 {
        match self {
            Self::Legacy(tx) => tx.value(),
            Self::AccessList(tx) => tx.value(),
            Self::FeeMarket(tx) => tx.value(),
            Self::Blob(tx) => tx.value(),
        }
    }

    fn data(&self) -> &Bytes {
        match self {
            Self::Legacy(tx) => tx.data(),
            Self::AccessList(tx) => tx.data(),
            Self::FeeMarket(tx) => tx.data(),
            Self::Blob(tx) => tx.data(),
        }
    }

    fn access_list(&self) -> Option<&AccessList> {
        match self {
            Self::Legacy(_) => None,
            Self::AccessList(tx) => Some(tx.access_list()),
            Self::FeeMarket(tx) => Some(tx.access_list()),
            Self::Blob(tx) => Some(tx.access_list()),
        }
    }

    fn max_fee_per_gas(&self) -> U256 {
        match self {
            Self::Legacy(tx) => tx.gas_price(),
            Self::AccessList(tx) => tx.gas_price(),
            Self::FeeMarket(tx) => tx.max_fee_per_gas(),
            Self::Blob(tx) => tx.max_fee_per_gas(),
        }
    }

    fn max_priority_fee_per_gas(&self) -> U256 {
        match self {
            Self::Legacy(tx) => tx.gas_price(),
            Self::AccessList(tx) => tx.gas_price(),
            Self::FeeMarket(tx) => tx.max_priority_fee_per_gas(),
            Self::Blob(tx) => tx.max_priority_fee_per_gas(),
        }
    }

    fn signature(&self) -> Option<&TxSignature> {
        match self {
            Self::Legacy(tx) => tx.signature(),
            Self::AccessList(tx) => tx.signature(),
            Self::FeeMarket(tx) => tx.signature(),
            Self::Blob(tx) => tx.signature(),
        }
    }

    fn serialize(&self) -> Result<Bytes, TxError> {
        match self {
            Self::Legacy(tx) => tx.serialize(),
            Self::AccessList(tx) => tx.serialize(),
            Self::FeeMarket(tx) => tx.serialize(),
            Self::Blob(tx) => tx.serialize(),
        }
    }

    fn message_to_sign(&self) -> Bytes {
        match self {
            Self::Legacy(tx) => tx.message_to_sign(),
            Self::AccessList(tx) => tx.message_to_sign(),
            Self::FeeMarket(tx) => tx.message_to_sign(),
            Self::Blob(tx) => tx.message_to_sign(),
        }
    }

    fn signing_hash(&self) -> Hash {
        match self {
            Self::Legacy(tx) => tx.signing_hash(),
            Self::AccessList(tx) => tx.signing_hash(),
            Self::FeeMarket(tx) => tx.signing_hash(),
            Self::Blob(tx) => tx.signing_hash(),
        }
    }

    fn hash(&self) -> Result<Hash, TxError> {
        match self {
            Self::Legacy(tx) => tx.hash(),
            Self::AccessList(tx) => tx.hash(),
            Self::FeeMarket(tx) => tx.hash(),
            Self::Blob(tx) => tx.hash(),
        }
    }

    fn sender_address(&self) -> Result<Address, TxError> {
        match self {
            Self::Legacy(tx) => tx.sender_address(),
            Self::AccessList(tx) => tx.sender_address(),
            Self::FeeMarket(tx) => tx.sender_address(),
            Self::Blob(tx) => tx.sender_address(),
        }
    }

    fn intrinsic_gas(&self, common: &Common) -> u64 {
        match self {
            Self::Legacy(tx) => tx.intrinsic_gas(common),
            Self::AccessList(tx) => tx.intrinsic_gas(common),
            Self::FeeMarket(tx) => tx.intrinsic_gas(common),
            Self::Blob(tx) => tx.intrinsic_gas(common),
        }
    }

    fn upfront_cost(&self, base_fee: Option<U256>, common: &Common) -> U256 {
        match self {
            Self::Legacy(tx) => tx.upfront_cost(),
            Self::AccessList(tx) => tx.upfront_cost(),
            Self::FeeMarket(tx) => tx.upfront_cost(base_fee),
            Self::Blob(tx) => tx.upfront_cost(base_fee, common),
        }
    }

    fn effective_priority_fee(&self, base_fee: U256) -> U256 {
        match self {
            Self::Legacy(tx) => tx.gas_price(),
            Self::AccessList(tx) => tx.gas_price(),
            Self::FeeMarket(tx) => tx.effective_priority_fee(base_fee),
            Self::Blob(tx) => tx.effective_priority_fee(base_fee),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
