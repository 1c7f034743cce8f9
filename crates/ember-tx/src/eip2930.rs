//! # EIP-2930 Access-List Transactions (type 0x01)
//!
//! `0x01 || rlp([chainId, nonce, gasPrice, gasLimit, to, value, data,
//! accessList, yParity, r, s])`.

use crate::codec::{
    address_bytes, append_optional_address, decode_access_list, decode_bytes,
    decode_optional_address, decode_u256, decode_u64, expect_list, scalar_bytes, u64_bytes,
};
use crate::errors::TxError;
use crate::fees::{fee_overflows, intrinsic_gas};
use crate::signature::{sign_typed, TxSignature};
use ember_common::Common;
use ember_crypto::keccak256;
use ember_types::{AccessList, Address, Bytes, Hash, U256};
use rlp::{Rlp, RlpStream};
use serde::Serialize;

/// Envelope byte of access-list transactions.
pub const ACCESS_LIST_TX_TYPE: u8 = 0x01;

/// Construction fields for an access-list transaction.
#[derive(Clone, Debug, Default)]
pub struct AccessListTxData {
    /// Sender nonce.
    pub nonce: u64,
    /// Gas price in wei.
    pub gas_price: U256,
    /// Gas limit.
    pub gas_limit: u64,
    /// Recipient; `None` creates a contract.
    pub to: Option<Address>,
    /// Value in wei.
    pub value: U256,
    /// Calldata or initcode.
    pub data: Bytes,
    /// Pre-warmed addresses and slots.
    pub access_list: AccessList,
    /// Signature, if already signed.
    pub signature: Option<TxSignature>,
}

/// A validated, immutable EIP-2930 transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessListTx {
    chain_id: u64,
    nonce: u64,
    gas_price: U256,
    gas_limit: u64,
    to: Option<Address>,
    value: U256,
    data: Bytes,
    access_list: AccessList,
    signature: Option<TxSignature>,
}

impl AccessListTx {
    /// Validates and freezes an access-list transaction.
    ///
    /// # Errors
    ///
    /// Rejects unactivated type, fee overflow, bad parity, and high-s.
    pub fn new(data: AccessListTxData, common: &Common) -> Result<Self, TxError> {
        if !common.is_activated_eip(2930) {
            return Err(TxError::TxTypeNotActivated(ACCESS_LIST_TX_TYPE));
        }
        if fee_overflows(data.gas_limit, data.gas_price) {
            return Err(TxError::GasOverflow);
        }
        if let Some(signature) = &data.signature {
            signature.check_y_parity()?;
            signature.check_low_s()?;
        }
        Ok(Self {
            chain_id: common.chain_id(),
            nonce: data.nonce,
            gas_price: data.gas_price,
            gas_limit: data.gas_limit,
            to: data.to,
            value: data.value,
            data: data.data,
            access_list: data.access_list,
            signature: data.signature,
        })
    }

    /// Decodes a wire-encoded type-1 transaction.
    ///
    /// # Errors
    ///
    /// Returns `WrongTxType` on a different envelope byte, plus codec and
    /// validation errors.
    pub fn from_serialized(bytes: &[u8], common: &Common) -> Result<Self, TxError> {
        let payload = strip_type_byte(bytes, ACCESS_LIST_TX_TYPE)?;
        let rlp = expect_list(payload, 11, "eip-2930 transaction")?;
        Self::from_values(&rlp, common)
    }

    /// Builds a transaction from an already-parsed eleven-item RLP list
    /// (the payload without the envelope byte).
    ///
    /// # Errors
    ///
    /// Codec and validation errors.
    pub fn from_values(rlp: &Rlp<'_>, common: &Common) -> Result<Self, TxError> {
        if rlp.item_count().unwrap_or(0) != 11 {
            return Err(TxError::InvalidRlp(
                "eip-2930 transaction: expected 11 fields".to_string(),
            ));
        }
        let chain_id = decode_u64(rlp, 0, "chainId")?;
        if chain_id != common.chain_id() {
            return Err(TxError::ChainIdMismatch {
                tx: chain_id,
                chain: common.chain_id(),
            });
        }
        let signature = TxSignature {
            v: decode_u64(rlp, 8, "yParity")?,
            r: decode_u256(rlp, 9, "r")?,
            s: decode_u256(rlp, 10, "s")?,
        };
        Self::new(
            AccessListTxData {
                nonce: decode_u64(rlp, 1, "nonce")?,
                gas_price: decode_u256(rlp, 2, "gasPrice")?,
                gas_limit: decode_u64(rlp, 3, "gasLimit")?,
                to: decode_optional_address(rlp, 4, "to")?,
                value: decode_u256(rlp, 5, "value")?,
                data: decode_bytes(rlp, 6, "data")?,
                access_list: decode_access_list(rlp, 7)?,
                signature: Some(signature),
            },
            common,
        )
    }

    /// The eleven field values in serialization order, each as its minimal
    /// byte string; the access list appears as its RLP encoding. Unsigned
    /// transactions carry empty signature fields.
    #[must_use]
    pub fn raw_values(&self) -> Vec<Bytes> {
        let (v, r, s) = match &self.signature {
            Some(signature) => (
                u64_bytes(signature.v),
                scalar_bytes(signature.r),
                scalar_bytes(signature.s),
            ),
            None => (Bytes::new(), Bytes::new(), Bytes::new()),
        };
        vec![
            u64_bytes(self.chain_id),
            u64_bytes(self.nonce),
            scalar_bytes(self.gas_price),
            u64_bytes(self.gas_limit),
            address_bytes(self.to),
            scalar_bytes(self.value),
            self.data.clone(),
            Bytes::from_vec(rlp::encode(&self.access_list).to_vec()),
            v,
            r,
            s,
        ]
    }

    /// Recovers the uncompressed sender public key (64 bytes).
    ///
    /// # Errors
    ///
    /// Returns `Unsigned` before signing, or recovery failures.
    pub fn sender_public_key(&self) -> Result<[u8; 64], TxError> {
        let signature = self.signature.as_ref().ok_or(TxError::Unsigned)?;
        signature.recover_public_key(&self.signing_hash(), signature.typed_recovery_id()?)
    }

    /// Chain id.
    #[must_use]
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Sender nonce.
    #[must_use]
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Gas price.
    #[must_use]
    pub fn gas_price(&self) -> U256 {
        self.gas_price
    }

    /// Gas limit.
    #[must_use]
    pub fn gas_limit(&self) -> u64 {
        self.gas_limit
    }

    /// Recipient, `None` for creates.
    #[must_use]
    pub fn to(&self) -> Option<Address> {
        self.to
    }

    /// Transferred value.
    #[must_use]
    pub fn value(&self) -> U256 {
        self.value
    }

    /// Calldata or initcode.
    #[must_use]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// The access list.
    #[must_use]
    pub fn access_list(&self) -> &AccessList {
        &self.access_list
    }

    /// Signature, if signed.
    #[must_use]
    pub fn signature(&self) -> Option<&TxSignature> {
        self.signature.as_ref()
    }

    fn append_unsigned_fields(&self, stream: &mut RlpStream) {
        stream
            .append(&self.chain_id)
            .append(&self.nonce)
            .append(&self.gas_price)
            .append(&self.gas_limit);
        append_optional_address(stream, self.to);
        stream
            .append(&self.value)
            .append(&self.data)
            .append(&self.access_list);
    }

    /// `0x01 || rlp(unsigned fields)` — the bytes whose digest is signed.
    #[must_use]
    pub fn message_to_sign(&self) -> Bytes {
        let mut stream = RlpStream::new_list(8);
        self.append_unsigned_fields(&mut stream);
        let mut out = vec![ACCESS_LIST_TX_TYPE];
        out.extend_from_slice(&stream.out());
        Bytes::from_vec(out)
    }

    /// Keccak-256 of [`AccessListTx::message_to_sign`].
    #[must_use]
    pub fn signing_hash(&self) -> Hash {
        keccak256(self.message_to_sign().as_slice())
    }

    /// Signs with a secret key, returning the signed transaction.
    ///
    /// # Errors
    ///
    /// Propagates key errors.
    pub fn sign(&self, secret_key: &[u8; 32]) -> Result<Self, TxError> {
        let mut signed = self.clone();
        signed.signature = Some(sign_typed(&self.signing_hash(), secret_key)?);
        Ok(signed)
    }

    /// Canonical wire encoding with the envelope byte.
    ///
    /// # Errors
    ///
    /// Returns `Unsigned` before signing.
    pub fn serialize(&self) -> Result<Bytes, TxError> {
        let signature = self.signature.as_ref().ok_or(TxError::Unsigned)?;
        let mut stream = RlpStream::new_list(11);
        self.append_unsigned_fields(&mut stream);
        stream
            .append(&signature.v)
            .append(&signature.r)
            .append(&signature.s);
        let mut out = vec![ACCESS_LIST_TX_TYPE];
        out.extend_from_slice(&stream.out());
        Ok(Bytes::from_vec(out))
    }

    /// Transaction hash: Keccak-256 of the wire encoding.
    ///
    /// # Errors
    ///
    /// Returns `Unsigned` before signing.
    pub fn hash(&self) -> Result<Hash, TxError> {
        Ok(keccak256(self.serialize()?.as_slice()))
    }

    /// Recovers the sender address.
    ///
    /// # Errors
    ///
    /// Returns `Unsigned` before signing, or recovery failures.
    pub fn sender_address(&self) -> Result<Address, TxError> {
        let signature = self.signature.as_ref().ok_or(TxError::Unsigned)?;
        signature.recover_address(&self.signing_hash(), signature.typed_recovery_id()?)
    }

    /// Intrinsic gas for this transaction.
    #[must_use]
    pub fn intrinsic_gas(&self, common: &Common) -> u64 {
        intrinsic_gas(
            common,
            self.data.as_slice(),
            self.to.is_none(),
            Some(&self.access_list),
        )
    }

    /// Maximum wei the sender must hold.
    #[must_use]
    pub fn upfront_cost(&self) -> U256 {
        self.value
            .saturating_add(self.gas_price.saturating_mul(U256::from(self.gas_limit)))
    }
}

pub(crate) fn strip_type_byte(bytes: &[u8], expected: u8) -> Result<&[u8], TxError> {
    match bytes.first() {
        None => Err(TxError::InvalidRlp("empty input".to_string())),
        Some(&byte) if byte == expected => Ok(&bytes[1..]),
        Some(&byte) => Err(TxError::WrongTxType {
            expected,
            actual: byte,
        }),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ember_common::{ChainConfig, Hardfork};
    use ember_crypto::secret_key_to_address;
    use ember_types::{AccessListItem, StorageKey};

    fn common() -> Common {
        Common::new(ChainConfig::dev(Hardfork::Berlin))
    }

    fn secret() -> [u8; 32] {
        let mut key = [0u8; 32];
        key[31] = 0x22;
        key
    }

    fn sample_tx() -> AccessListTx {
        AccessListTx::new(
            AccessListTxData {
                nonce: 3,
                gas_price: U256::from(2_000_000_000u64),
                gas_limit: 60_000,
                to: Some(Address::new([0xaa; 20])),
                value: U256::from(10),
                data: Bytes::from_slice(&[0x01, 0x02, 0x00]),
                access_list: AccessList(vec![AccessListItem::new(
                    Address::new([0xbb; 20]),
                    vec![StorageKey::new([0xcc; 32])],
                )]),
                signature: None,
            },
            &common(),
        )
        .unwrap()
    }

    #[test]
    fn envelope_starts_with_type_byte() {
        let signed = sample_tx().sign(&secret()).unwrap();
        let encoded = signed.serialize().unwrap();
        assert_eq!(encoded.as_slice()[0], ACCESS_LIST_TX_TYPE);
    }

    #[test]
    fn serialize_decode_round_trip() {
        let signed = sample_tx().sign(&secret()).unwrap();
        let encoded = signed.serialize().unwrap();
        let decoded = AccessListTx::from_serialized(encoded.as_slice(), &common()).unwrap();
        assert_eq!(decoded, signed);
    }

    #[test]
    fn sender_recovery_matches_key() {
        let signed = sample_tx().sign(&secret()).unwrap();
        assert_eq!(
            signed.sender_address().unwrap(),
            secret_key_to_address(&secret()).unwrap()
        );
    }

    #[test]
    fn message_to_sign_omits_signature() {
        let unsigned = sample_tx();
        let signed = unsigned.sign(&secret()).unwrap();
        assert_eq!(unsigned.message_to_sign(), signed.message_to_sign());
        assert_eq!(unsigned.signing_hash(), signed.signing_hash());
    }

    #[test]
    fn type_not_activated_pre_berlin() {
        let istanbul = Common::new(ChainConfig::dev(Hardfork::Istanbul));
        let result = AccessListTx::new(AccessListTxData::default(), &istanbul);
        assert_eq!(result.unwrap_err(), TxError::TxTypeNotActivated(0x01));
    }

    #[test]
    fn wrong_type_byte_is_rejected() {
        let signed = sample_tx().sign(&secret()).unwrap();
        let mut encoded = signed.serialize().unwrap().into_vec();
        encoded[0] = 0x02;
        assert!(matches!(
            AccessListTx::from_serialized(&encoded, &common()),
            Err(TxError::WrongTxType { .. })
        ));
    }

    #[test]
    fn intrinsic_gas_covers_access_list() {
        let tx = sample_tx();
        assert_eq!(
            tx.intrinsic_gas(&common()),
            21_000 + 2 * 16 + 4 + 2_400 + 1_900
        );
    }
}
