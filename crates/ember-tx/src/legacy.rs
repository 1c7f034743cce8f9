//! # Legacy Transactions
//!
//! The original nine-field transaction: bare RLP, no envelope byte. Signing
//! follows EIP-155 once Spurious Dragon is active on the chain.

use crate::codec::{
    address_bytes, append_optional_address, decode_bytes, decode_optional_address, decode_u256,
    decode_u64, expect_list, scalar_bytes, u64_bytes,
};
use crate::errors::TxError;
use crate::fees::{fee_overflows, intrinsic_gas};
use crate::signature::{sign_legacy, TxSignature};
use ember_common::{Common, Hardfork};
use ember_crypto::keccak256;
use ember_types::{Address, Bytes, Hash, U256};
use rlp::{Rlp, RlpStream};
use serde::Serialize;

/// Construction fields for a legacy transaction.
#[derive(Clone, Debug, Default)]
pub struct LegacyTxData {
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
    /// Signature, if already signed.
    pub signature: Option<TxSignature>,
}

/// A validated, immutable legacy transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyTx {
    nonce: u64,
    gas_price: U256,
    gas_limit: u64,
    to: Option<Address>,
    value: U256,
    data: Bytes,
    signature: Option<TxSignature>,
    chain_id: u64,
    eip155: bool,
}

impl LegacyTx {
    /// Validates and freezes a legacy transaction.
    ///
    /// # Errors
    ///
    /// Rejects fee overflow, malformed signatures, and EIP-155 chain-id
    /// mismatches.
    pub fn new(data: LegacyTxData, common: &Common) -> Result<Self, TxError> {
        if fee_overflows(data.gas_limit, data.gas_price) {
            return Err(TxError::GasOverflow);
        }
        if let Some(signature) = &data.signature {
            signature.check_low_s()?;
            let (_, derived_chain) = signature.legacy_recovery_id()?;
            if let Some(tx_chain) = derived_chain {
                if tx_chain != common.chain_id() {
                    return Err(TxError::ChainIdMismatch {
                        tx: tx_chain,
                        chain: common.chain_id(),
                    });
                }
            }
        }
        Ok(Self {
            nonce: data.nonce,
            gas_price: data.gas_price,
            gas_limit: data.gas_limit,
            to: data.to,
            value: data.value,
            data: data.data,
            signature: data.signature,
            chain_id: common.chain_id(),
            eip155: common.gte_hardfork(Hardfork::SpuriousDragon),
        })
    }

    /// Decodes a wire-encoded legacy transaction.
    ///
    /// # Errors
    ///
    /// Returns `WrongTxType` for typed envelopes and codec errors for
    /// malformed RLP.
    pub fn from_serialized(bytes: &[u8], common: &Common) -> Result<Self, TxError> {
        match bytes.first() {
            None => return Err(TxError::InvalidRlp("empty input".to_string())),
            Some(&byte) if byte <= 0x7f => {
                return Err(TxError::WrongTxType {
                    expected: 0xc0,
                    actual: byte,
                })
            }
            Some(_) => {}
        }
        expect_list(bytes, 9, "legacy transaction")?;
        Self::from_values(&Rlp::new(bytes), common)
    }

    /// Builds a transaction from an already-parsed nine-item RLP list.
    ///
    /// # Errors
    ///
    /// Codec and validation errors.
    pub fn from_values(rlp: &Rlp<'_>, common: &Common) -> Result<Self, TxError> {
        if rlp.item_count().unwrap_or(0) != 9 {
            return Err(TxError::InvalidRlp(
                "legacy transaction: expected 9 fields".to_string(),
            ));
        }
        let signature = TxSignature {
            v: decode_u64(rlp, 6, "v")?,
            r: decode_u256(rlp, 7, "r")?,
            s: decode_u256(rlp, 8, "s")?,
        };
        Self::new(
            LegacyTxData {
                nonce: decode_u64(rlp, 0, "nonce")?,
                gas_price: decode_u256(rlp, 1, "gasPrice")?,
                gas_limit: decode_u64(rlp, 2, "gasLimit")?,
                to: decode_optional_address(rlp, 3, "to")?,
                value: decode_u256(rlp, 4, "value")?,
                data: decode_bytes(rlp, 5, "data")?,
                signature: Some(signature),
            },
            common,
        )
    }

    /// The nine field values in signing/serialization order, each as its
    /// minimal byte string (the access-free legacy shape). Unsigned
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
            u64_bytes(self.nonce),
            scalar_bytes(self.gas_price),
            u64_bytes(self.gas_limit),
            address_bytes(self.to),
            scalar_bytes(self.value),
            self.data.clone(),
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
        let (recovery_id, _) = signature.legacy_recovery_id()?;
        signature.recover_public_key(&self.signing_hash(), recovery_id)
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

    /// Signature, if signed.
    #[must_use]
    pub fn signature(&self) -> Option<&TxSignature> {
        self.signature.as_ref()
    }

    /// Chain id context derived from the signature (EIP-155 signed) or the
    /// chain the transaction was constructed against.
    #[must_use]
    pub fn chain_id(&self) -> u64 {
        if let Some(signature) = &self.signature {
            if let Ok((_, Some(chain_id))) = signature.legacy_recovery_id() {
                return chain_id;
            }
        }
        self.chain_id
    }

    fn signing_uses_eip155(&self) -> bool {
        match &self.signature {
            Some(signature) => matches!(signature.legacy_recovery_id(), Ok((_, Some(_)))),
            None => self.eip155,
        }
    }

    /// The bytes whose Keccak-256 digest is signed: six fields pre-EIP-155,
    /// nine (with `chain_id, 0, 0`) after.
    #[must_use]
    pub fn message_to_sign(&self) -> Bytes {
        let eip155 = self.signing_uses_eip155();
        let mut stream = RlpStream::new_list(if eip155 { 9 } else { 6 });
        stream
            .append(&self.nonce)
            .append(&self.gas_price)
            .append(&self.gas_limit);
        append_optional_address(&mut stream, self.to);
        stream.append(&self.value).append(&self.data);
        if eip155 {
            stream.append(&self.chain_id());
            stream.append_empty_data();
            stream.append_empty_data();
        }
        Bytes::from_vec(stream.out().to_vec())
    }

    /// Keccak-256 of [`LegacyTx::message_to_sign`].
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
        let chain_id = if self.eip155 { Some(self.chain_id) } else { None };
        let mut signed = self.clone();
        signed.signature = Some(sign_legacy(&self.signing_hash(), secret_key, chain_id)?);
        Ok(signed)
    }

    /// Canonical wire encoding (nine fields).
    ///
    /// # Errors
    ///
    /// Returns `Unsigned` before signing.
    pub fn serialize(&self) -> Result<Bytes, TxError> {
        let signature = self.signature.as_ref().ok_or(TxError::Unsigned)?;
        let mut stream = RlpStream::new_list(9);
        stream
            .append(&self.nonce)
            .append(&self.gas_price)
            .append(&self.gas_limit);
        append_optional_address(&mut stream, self.to);
        stream
            .append(&self.value)
            .append(&self.data)
            .append(&signature.v)
            .append(&signature.r)
            .append(&signature.s);
        Ok(Bytes::from_vec(stream.out().to_vec()))
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
        let (recovery_id, _) = signature.legacy_recovery_id()?;
        signature.recover_address(&self.signing_hash(), recovery_id)
    }

    /// Intrinsic gas for this transaction.
    #[must_use]
    pub fn intrinsic_gas(&self, common: &Common) -> u64 {
        intrinsic_gas(common, self.data.as_slice(), self.to.is_none(), None)
    }

    /// Maximum wei the sender must hold: `value + gas_limit * gas_price`.
    #[must_use]
    pub fn upfront_cost(&self) -> U256 {
        self.value
            .saturating_add(self.gas_price.saturating_mul(U256::from(self.gas_limit)))
    }
}

// =============================================================================
// TESTS
// =============================================================================
