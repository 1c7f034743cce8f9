//! # EIP-1559 Fee-Market Transactions (type 0x02)
//!
//! `0x02 || rlp([chainId, nonce, maxPriorityFeePerGas, maxFeePerGas,
//! gasLimit, to, value, data, accessList, yParity, r, s])`.

use crate::codec::{
    address_bytes, append_optional_address, decode_access_list, decode_bytes,
    decode_optional_address, decode_u256, decode_u64, expect_list, scalar_bytes, u64_bytes,
};
use crate::eip2930::strip_type_byte;
use crate::errors::TxError;
use crate::fees::{effective_priority_fee, fee_overflows, intrinsic_gas};
use crate::signature::{sign_typed, TxSignature};
use ember_common::Common;
use ember_crypto::keccak256;
use ember_types::{AccessList, Address, Bytes, Hash, U256};
use rlp::{Rlp, RlpStream};
use serde::Serialize;

/// Envelope byte of fee-market transactions.
pub const FEE_MARKET_TX_TYPE: u8 = 0x02;

/// Construction fields for a fee-market transaction.
#[derive(Clone, Debug, Default)]
pub struct FeeMarketTxData {
    /// Sender nonce.
    pub nonce: u64,
    /// Miner tip ceiling in wei per gas.
    pub max_priority_fee_per_gas: U256,
    /// Total fee ceiling in wei per gas.
    pub max_fee_per_gas: U256,
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

/// A validated, immutable EIP-1559 transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeMarketTx {
    chain_id: u64,
    nonce: u64,
    max_priority_fee_per_gas: U256,
    max_fee_per_gas: U256,
    gas_limit: u64,
    to: Option<Address>,
    value: U256,
    data: Bytes,
    access_list: AccessList,
    signature: Option<TxSignature>,
}

impl FeeMarketTx {
    /// Validates and freezes a fee-market transaction.
    ///
    /// # Errors
    ///
    /// Rejects unactivated type, fee overflow, inverted fee caps, bad
    /// parity, and high-s.
    pub fn new(data: FeeMarketTxData, common: &Common) -> Result<Self, TxError> {
        if !common.is_activated_eip(1559) {
            return Err(TxError::TxTypeNotActivated(FEE_MARKET_TX_TYPE));
        }
        if fee_overflows(data.gas_limit, data.max_fee_per_gas) {
            return Err(TxError::GasOverflow);
        }
        if data.max_fee_per_gas < data.max_priority_fee_per_gas {
            return Err(TxError::MaxFeeLessThanPriority);
        }
        if let Some(signature) = &data.signature {
            signature.check_y_parity()?;
            signature.check_low_s()?;
        }
        Ok(Self {
            chain_id: common.chain_id(),
            nonce: data.nonce,
            max_priority_fee_per_gas: data.max_priority_fee_per_gas,
            max_fee_per_gas: data.max_fee_per_gas,
            gas_limit: data.gas_limit,
            to: data.to,
            value: data.value,
            data: data.data,
            access_list: data.access_list,
            signature: data.signature,
        })
    }

    /// Decodes a wire-encoded type-2 transaction.
    ///
    /// # Errors
    ///
    /// Returns `WrongTxType` on a different envelope byte, plus codec and
    /// validation errors.
    pub fn from_serialized(bytes: &[u8], common: &Common) -> Result<Self, TxError> {
        let payload = strip_type_byte(bytes, FEE_MARKET_TX_TYPE)?;
        let rlp = expect_list(payload, 12, "eip-1559 transaction")?;
        Self::from_values(&rlp, common)
    }

    /// Builds a transaction from an already-parsed twelve-item RLP list
    /// (the payload without the envelope byte).
    ///
    /// # Errors
    ///
    /// Codec and validation errors.
    pub fn from_values(rlp: &Rlp<'_>, common: &Common) -> Result<Self, TxError> {
        if rlp.item_count().unwrap_or(0) != 12 {
            return Err(TxError::InvalidRlp(
                "eip-1559 transaction: expected 12 fields".to_string(),
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
            v: decode_u64(rlp, 9, "yParity")?,
            r: decode_u256(rlp, 10, "r")?,
            s: decode_u256(rlp, 11, "s")?,
        };
        Self::new(
            FeeMarketTxData {
                nonce: decode_u64(rlp, 1, "nonce")?,
                max_priority_fee_per_gas: decode_u256(rlp, 2, "maxPriorityFeePerGas")?,
                max_fee_per_gas: decode_u256(rlp, 3, "maxFeePerGas")?,
                gas_limit: decode_u64(rlp, 4, "gasLimit")?,
                to: decode_optional_address(rlp, 5, "to")?,
                value: decode_u256(rlp, 6, "value")?,
                data: decode_bytes(rlp, 7, "data")?,
                access_list: decode_access_list(rlp, 8)?,
                signature: Some(signature),
            },
            common,
        )
    }

    /// The twelve field values in serialization order, each as its minimal
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
            scalar_bytes(self.max_priority_fee_per_gas),
            scalar_bytes(self.max_fee_per_gas),
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

    /// Tip ceiling.
    #[must_use]
    pub fn max_priority_fee_per_gas(&self) -> U256 {
        self.max_priority_fee_per_gas
    }

    /// Fee ceiling.
    #[must_use]
    pub fn max_fee_per_gas(&self) -> U256 {
        self.max_fee_per_gas
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

    /// The miner tip at a given base fee.
    #[must_use]
    pub fn effective_priority_fee(&self, base_fee: U256) -> U256 {
        effective_priority_fee(self.max_fee_per_gas, self.max_priority_fee_per_gas, base_fee)
    }

    fn append_unsigned_fields(&self, stream: &mut RlpStream) {
        stream
            .append(&self.chain_id)
            .append(&self.nonce)
            .append(&self.max_priority_fee_per_gas)
            .append(&self.max_fee_per_gas)
            .append(&self.gas_limit);
        append_optional_address(stream, self.to);
        stream
            .append(&self.value)
            .append(&self.data)
            .append(&self.access_list);
    }

    /// `0x02 || rlp(unsigned fields)` — the bytes whose digest is signed.
    #[must_use]
    pub fn message_to_sign(&self) -> Bytes {
        let mut stream = RlpStream::new_list(9);
        self.append_unsigned_fields(&mut stream);
        let mut out = vec![FEE_MARKET_TX_TYPE];
        out.extend_from_slice(&stream.out());
        Bytes::from_vec(out)
    }

    /// Keccak-256 of [`FeeMarketTx::message_to_sign`].
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
        let mut stream = RlpStream::new_list(12);
        self.append_unsigned_fields(&mut stream);
        stream
            .append(&signature.v)
            .append(&signature.r)
            .append(&signature.s);
        let mut out = vec![FEE_MARKET_TX_TYPE];
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

    /// Maximum wei the sender must hold. With a base fee the charge is the
    /// effective gas price; without one the fee ceiling is reserved.
    #[must_use]
    pub fn upfront_cost(&self, base_fee: Option<U256>) -> U256 {
        let per_gas = match base_fee {
            Some(base) => base.saturating_add(self.effective_priority_fee(base)),
            None => self.max_fee_per_gas,
        };
        self.value
            .saturating_add(per_gas.saturating_mul(U256::from(self.gas_limit)))
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

    fn common() -> Common {
        Common::new(ChainConfig::dev(Hardfork::London))
    }

    fn secret() -> [u8; 32] {
        let mut key = [0u8; 32];
        key[31] = 0x33;
        key
    }

    fn sample_tx() -> FeeMarketTx {
        FeeMarketTx::new(
            FeeMarketTxData {
                nonce: 1,
                max_priority_fee_per_gas: U256::from(2_000_000_000u64),
                max_fee_per_gas: U256::from(30_000_000_000u64),
                gas_limit: 21_000,
                to: Some(Address::new([0x11; 20])),
                value: U256::from(1_000u64),
                data: Bytes::new(),
                access_list: AccessList::empty(),
                signature: None,
            },
            &common(),
        )
        .unwrap()
    }

    #[test]
    fn serialize_decode_round_trip() {
        let signed = sample_tx().sign(&secret()).unwrap();
        let encoded = signed.serialize().unwrap();
        assert_eq!(encoded.as_slice()[0], FEE_MARKET_TX_TYPE);
        let decoded = FeeMarketTx::from_serialized(encoded.as_slice(), &common()).unwrap();
        assert_eq!(decoded, signed);
        assert_eq!(decoded.hash().unwrap(), signed.hash().unwrap());
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
    fn inverted_fee_caps_are_rejected() {
        let result = FeeMarketTx::new(
            FeeMarketTxData {
                max_priority_fee_per_gas: U256::from(10),
                max_fee_per_gas: U256::from(5),
                ..FeeMarketTxData::default()
            },
            &common(),
        );
        assert_eq!(result.unwrap_err(), TxError::MaxFeeLessThanPriority);
    }

    #[test]
    fn type_not_activated_pre_london() {
        let berlin_no_1559 = Common::new(ChainConfig::dev(Hardfork::Berlin));
        let result = FeeMarketTx::new(FeeMarketTxData::default(), &berlin_no_1559);
        assert_eq!(result.unwrap_err(), TxError::TxTypeNotActivated(0x02));
    }

    #[test]
    fn effective_priority_fee_clamps_to_fee_cap() {
        let tx = sample_tx();
        // base fee leaves less headroom than the tip cap
        let tip = tx.effective_priority_fee(U256::from(29_000_000_000u64));
        assert_eq!(tip, U256::from(1_000_000_000u64));
        // plenty of headroom: full tip
        let tip = tx.effective_priority_fee(U256::from(1_000_000_000u64));
        assert_eq!(tip, U256::from(2_000_000_000u64));
    }

    #[test]
    fn upfront_cost_uses_base_fee_when_known() {
        let tx = sample_tx();
        let base = U256::from(10_000_000_000u64);
        let expected_per_gas = base + tx.effective_priority_fee(base);
        assert_eq!(
            tx.upfront_cost(Some(base)),
            U256::from(1_000u64) + expected_per_gas * U256::from(21_000u64)
        );
        assert_eq!(
            tx.upfront_cost(None),
            U256::from(1_000u64) + tx.max_fee_per_gas() * U256::from(21_000u64)
        );
    }
}
