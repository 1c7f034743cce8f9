//! # EIP-4844 Blob Transactions (type 0x03)
//!
//! The executable payload is
//! `0x03 || rlp([chainId, nonce, maxPriorityFeePerGas, maxFeePerGas,
//! gasLimit, to, value, data, accessList, maxFeePerDataGas,
//! versionedHashes, yParity, r, s])`; the gossip form wraps it with blobs,
//! commitments, and proofs, which are verified on decode and never enter the
//! block.

use crate::codec::{
    address_bytes, decode_access_list, decode_bytes, decode_hash_list, decode_optional_address,
    decode_u256, decode_u64, expect_list, rlp_error, scalar_bytes, u64_bytes,
};
use crate::eip2930::strip_type_byte;
use crate::errors::TxError;
use crate::fees::{effective_priority_fee, fee_overflows, intrinsic_gas};
use crate::signature::{sign_typed, TxSignature};
use ember_common::{Common, ParamTopic};
use ember_crypto::{compute_versioned_hash, keccak256, provider, BYTES_PER_COMMITMENT};
use ember_types::{AccessList, Address, Bytes, Hash, U256};
use rlp::{Rlp, RlpStream};
use serde::Serialize;

/// Envelope byte of blob transactions.
pub const BLOB_TX_TYPE: u8 = 0x03;

/// Construction fields for a blob transaction.
#[derive(Clone, Debug, Default)]
pub struct BlobTxData {
    /// Sender nonce.
    pub nonce: u64,
    /// Miner tip ceiling in wei per gas.
    pub max_priority_fee_per_gas: U256,
    /// Total fee ceiling in wei per gas.
    pub max_fee_per_gas: U256,
    /// Gas limit.
    pub gas_limit: u64,
    /// Recipient (mandatory for blob transactions).
    pub to: Option<Address>,
    /// Value in wei.
    pub value: U256,
    /// Calldata.
    pub data: Bytes,
    /// Pre-warmed addresses and slots.
    pub access_list: AccessList,
    /// Fee ceiling per unit of data gas.
    pub max_fee_per_data_gas: U256,
    /// Versioned hashes of the referenced blobs.
    pub versioned_hashes: Vec<Hash>,
    /// Signature, if already signed.
    pub signature: Option<TxSignature>,
}

/// A validated, immutable EIP-4844 transaction (executable payload only).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobTx {
    chain_id: u64,
    nonce: u64,
    max_priority_fee_per_gas: U256,
    max_fee_per_gas: U256,
    gas_limit: u64,
    to: Address,
    value: U256,
    data: Bytes,
    access_list: AccessList,
    max_fee_per_data_gas: U256,
    versioned_hashes: Vec<Hash>,
    signature: Option<TxSignature>,
}

impl BlobTx {
    /// Validates and freezes a blob transaction.
    ///
    /// # Errors
    ///
    /// Rejects unactivated type, missing recipient, out-of-range blob
    /// counts, hashes with the wrong version byte, inverted fee caps, fee
    /// overflow, bad parity, and high-s.
    pub fn new(data: BlobTxData, common: &Common) -> Result<Self, TxError> {
        if !common.is_activated_eip(4844) {
            return Err(TxError::TxTypeNotActivated(BLOB_TX_TYPE));
        }
        let to = data.to.ok_or(TxError::BlobTxMissingTo)?;
        if fee_overflows(data.gas_limit, data.max_fee_per_gas) {
            return Err(TxError::GasOverflow);
        }
        if data.max_fee_per_gas < data.max_priority_fee_per_gas {
            return Err(TxError::MaxFeeLessThanPriority);
        }

        let limit = common
            .param(ParamTopic::Sharding, "limitBlobsPerTx")
            .as_u64() as usize;
        if data.versioned_hashes.is_empty() || data.versioned_hashes.len() > limit {
            return Err(TxError::BlobCountOutOfRange {
                count: data.versioned_hashes.len(),
                limit,
            });
        }
        let version = common
            .param(ParamTopic::Sharding, "blobCommitmentVersionKzg")
            .as_u64() as u8;
        for (index, hash) in data.versioned_hashes.iter().enumerate() {
            if hash.as_bytes()[0] != version {
                return Err(TxError::VersionedHashMismatch(index));
            }
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
            to,
            value: data.value,
            data: data.data,
            access_list: data.access_list,
            max_fee_per_data_gas: data.max_fee_per_data_gas,
            versioned_hashes: data.versioned_hashes,
            signature: data.signature,
        })
    }

    /// Decodes a wire-encoded type-3 payload (no sidecar).
    ///
    /// # Errors
    ///
    /// Returns `WrongTxType` on a different envelope byte, plus codec and
    /// validation errors.
    pub fn from_serialized(bytes: &[u8], common: &Common) -> Result<Self, TxError> {
        let payload = strip_type_byte(bytes, BLOB_TX_TYPE)?;
        let rlp = expect_list(payload, 14, "eip-4844 transaction")?;
        Self::from_values(&rlp, common)
    }

    /// Builds a transaction from an already-parsed fourteen-item RLP list
    /// (the payload without the envelope byte).
    ///
    /// # Errors
    ///
    /// Codec and validation errors.
    pub fn from_values(rlp: &Rlp<'_>, common: &Common) -> Result<Self, TxError> {
        if rlp.item_count().unwrap_or(0) != 14 {
            return Err(TxError::InvalidRlp(
                "eip-4844 transaction: expected 14 fields".to_string(),
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
            v: decode_u64(rlp, 11, "yParity")?,
            r: decode_u256(rlp, 12, "r")?,
            s: decode_u256(rlp, 13, "s")?,
        };
        Self::new(
            BlobTxData {
                nonce: decode_u64(rlp, 1, "nonce")?,
                max_priority_fee_per_gas: decode_u256(rlp, 2, "maxPriorityFeePerGas")?,
                max_fee_per_gas: decode_u256(rlp, 3, "maxFeePerGas")?,
                gas_limit: decode_u64(rlp, 4, "gasLimit")?,
                to: decode_optional_address(rlp, 5, "to")?,
                value: decode_u256(rlp, 6, "value")?,
                data: decode_bytes(rlp, 7, "data")?,
                access_list: decode_access_list(rlp, 8)?,
                max_fee_per_data_gas: decode_u256(rlp, 9, "maxFeePerDataGas")?,
                versioned_hashes: decode_hash_list(rlp, 10, "versionedHashes")?,
                signature: Some(signature),
            },
            common,
        )
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

    /// Data-gas fee ceiling.
    #[must_use]
    pub fn max_fee_per_data_gas(&self) -> U256 {
        self.max_fee_per_data_gas
    }

    /// Gas limit.
    #[must_use]
    pub fn gas_limit(&self) -> u64 {
        self.gas_limit
    }

    /// Recipient (always present for blob transactions).
    #[must_use]
    pub fn to(&self) -> Address {
        self.to
    }

    /// Transferred value.
    #[must_use]
    pub fn value(&self) -> U256 {
        self.value
    }

    /// Calldata.
    #[must_use]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// The access list.
    #[must_use]
    pub fn access_list(&self) -> &AccessList {
        &self.access_list
    }

    /// Versioned hashes of the referenced blobs.
    #[must_use]
    pub fn versioned_hashes(&self) -> &[Hash] {
        &self.versioned_hashes
    }

    /// Number of blobs referenced.
    #[must_use]
    pub fn blob_count(&self) -> usize {
        self.versioned_hashes.len()
    }

    /// Data gas consumed by this transaction.
    #[must_use]
    pub fn data_gas(&self, common: &Common) -> u64 {
        self.blob_count() as u64 * common.param(ParamTopic::Sharding, "dataGasPerBlob").as_u64()
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
            .append(&self.gas_limit)
            .append(&self.to)
            .append(&self.value)
            .append(&self.data)
            .append(&self.access_list)
            .append(&self.max_fee_per_data_gas)
            .append_list(&self.versioned_hashes);
    }

    /// `0x03 || rlp(unsigned fields)` — the bytes whose digest is signed.
    #[must_use]
    pub fn message_to_sign(&self) -> Bytes {
        let mut stream = RlpStream::new_list(11);
        self.append_unsigned_fields(&mut stream);
        let mut out = vec![BLOB_TX_TYPE];
        out.extend_from_slice(&stream.out());
        Bytes::from_vec(out)
    }

    /// Keccak-256 of [`BlobTx::message_to_sign`].
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

    /// Canonical wire encoding of the executable payload.
    ///
    /// # Errors
    ///
    /// Returns `Unsigned` before signing.
    pub fn serialize(&self) -> Result<Bytes, TxError> {
        let signature = self.signature.as_ref().ok_or(TxError::Unsigned)?;
        let mut stream = RlpStream::new_list(14);
        self.append_unsigned_fields(&mut stream);
        stream
            .append(&signature.v)
            .append(&signature.r)
            .append(&signature.s);
        let mut out = vec![BLOB_TX_TYPE];
        out.extend_from_slice(&stream.out());
        Ok(Bytes::from_vec(out))
    }

    /// Transaction hash: Keccak-256 of the payload encoding.
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

    /// Recovers the uncompressed sender public key (64 bytes).
    ///
    /// # Errors
    ///
    /// Returns `Unsigned` before signing, or recovery failures.
    pub fn sender_public_key(&self) -> Result<[u8; 64], TxError> {
        let signature = self.signature.as_ref().ok_or(TxError::Unsigned)?;
        signature.recover_public_key(&self.signing_hash(), signature.typed_recovery_id()?)
    }

    /// The fourteen field values in serialization order, each as its
    /// minimal byte string; the access list and versioned-hash list appear
    /// as their RLP encodings. Unsigned transactions carry empty signature
    /// fields.
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
        let mut hash_stream = RlpStream::new_list(self.versioned_hashes.len());
        for hash in &self.versioned_hashes {
            hash_stream.append(hash);
        }
        vec![
            u64_bytes(self.chain_id),
            u64_bytes(self.nonce),
            scalar_bytes(self.max_priority_fee_per_gas),
            scalar_bytes(self.max_fee_per_gas),
            u64_bytes(self.gas_limit),
            address_bytes(Some(self.to)),
            scalar_bytes(self.value),
            self.data.clone(),
            Bytes::from_vec(rlp::encode(&self.access_list).to_vec()),
            scalar_bytes(self.max_fee_per_data_gas),
            Bytes::from_vec(hash_stream.out().to_vec()),
            v,
            r,
            s,
        ]
    }

    /// Intrinsic gas for this transaction.
    #[must_use]
    pub fn intrinsic_gas(&self, common: &Common) -> u64 {
        intrinsic_gas(common, self.data.as_slice(), false, Some(&self.access_list))
    }

    /// Maximum wei the sender must hold, including the blob-fee reservation.
    #[must_use]
    pub fn upfront_cost(&self, base_fee: Option<U256>, common: &Common) -> U256 {
        let per_gas = match base_fee {
            Some(base) => base.saturating_add(self.effective_priority_fee(base)),
            None => self.max_fee_per_gas,
        };
        let execution = per_gas.saturating_mul(U256::from(self.gas_limit));
        let blob = self
            .max_fee_per_data_gas
            .saturating_mul(U256::from(self.data_gas(common)));
        self.value.saturating_add(execution).saturating_add(blob)
    }
}

// =============================================================================
// NETWORK WRAPPER
// =============================================================================

/// The gossip form of a blob transaction: payload plus sidecar.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlobTxNetworkWrapper {
    /// The executable payload.
    pub tx: BlobTx,
    /// The blobs themselves.
    pub blobs: Vec<Bytes>,
    /// KZG commitments, one per blob.
    pub commitments: Vec<[u8; 48]>,
    /// KZG proofs, one per blob.
    pub proofs: Vec<[u8; 48]>,
}

impl BlobTxNetworkWrapper {
    /// Builds a wrapper without re-verifying proofs (trusted local data).
    ///
    /// # Errors
    ///
    /// Returns `BlobWrapperLengthMismatch` if counts disagree.
    pub fn new(
        tx: BlobTx,
        blobs: Vec<Bytes>,
        commitments: Vec<[u8; 48]>,
        proofs: Vec<[u8; 48]>,
    ) -> Result<Self, TxError> {
        let count = tx.blob_count();
        if count == 0 || blobs.len() != count || commitments.len() != count || proofs.len() != count
        {
            return Err(TxError::BlobWrapperLengthMismatch);
        }
        Ok(Self {
            tx,
            blobs,
            commitments,
            proofs,
        })
    }

    /// Decodes and fully verifies a network-wrapped blob transaction:
    /// equal non-zero lengths, batch KZG verification, and versioned-hash
    /// equality per commitment.
    ///
    /// # Errors
    ///
    /// Codec errors, `KzgProofInvalid`, `VersionedHashMismatch`, and
    /// `CryptoError::NotInitialized` when no provider is installed.
    pub fn from_serialized(bytes: &[u8], common: &Common) -> Result<Self, TxError> {
        let payload = strip_type_byte(bytes, BLOB_TX_TYPE)?;
        let outer = expect_list(payload, 4, "blob network wrapper")?;

        let tx_rlp = outer.at(0).map_err(|e| rlp_error("wrapper.tx", e))?;
        if tx_rlp.item_count().map_err(|e| rlp_error("wrapper.tx", e))? != 14 {
            return Err(TxError::InvalidRlp(
                "wrapper.tx: expected 14 fields".to_string(),
            ));
        }
        let tx = BlobTx::from_values(&tx_rlp, common)?;

        let blobs: Vec<Bytes> = decode_byte_list(&outer, 1, "wrapper.blobs")?;
        let commitments = decode_fixed48_list(&outer, 2, "wrapper.commitments")?;
        let proofs = decode_fixed48_list(&outer, 3, "wrapper.proofs")?;

        let count = tx.blob_count();
        if count == 0 || blobs.len() != count || commitments.len() != count || proofs.len() != count
        {
            return Err(TxError::BlobWrapperLengthMismatch);
        }

        let kzg = provider()?;
        let blob_data: Vec<Vec<u8>> = blobs.iter().map(|b| b.as_slice().to_vec()).collect();
        let valid = kzg
            .verify_blob_kzg_proof_batch(&blob_data, &commitments, &proofs)
            .map_err(TxError::Crypto)?;
        if !valid {
            return Err(TxError::KzgProofInvalid);
        }

        let version = common
            .param(ParamTopic::Sharding, "blobCommitmentVersionKzg")
            .as_u64() as u8;
        for (index, commitment) in commitments.iter().enumerate() {
            if compute_versioned_hash(commitment, version) != tx.versioned_hashes[index] {
                return Err(TxError::VersionedHashMismatch(index));
            }
        }

        Self::new(tx, blobs, commitments, proofs)
    }

    /// `0x03 || rlp([payload, blobs, commitments, proofs])`.
    ///
    /// # Errors
    ///
    /// Returns `Unsigned` before signing.
    pub fn serialize(&self) -> Result<Bytes, TxError> {
        let payload = self.tx.serialize()?;
        // Strip the envelope byte: the wrapper re-wraps the bare payload list.
        let payload_list = &payload.as_slice()[1..];

        let mut stream = RlpStream::new_list(4);
        stream.append_raw(payload_list, 1);
        stream.begin_list(self.blobs.len());
        for blob in &self.blobs {
            stream.append(blob);
        }
        stream.begin_list(self.commitments.len());
        for commitment in &self.commitments {
            stream.append(&commitment.to_vec());
        }
        stream.begin_list(self.proofs.len());
        for proof in &self.proofs {
            stream.append(&proof.to_vec());
        }

        let mut out = vec![BLOB_TX_TYPE];
        out.extend_from_slice(&stream.out());
        Ok(Bytes::from_vec(out))
    }
}

fn decode_byte_list(rlp: &Rlp<'_>, index: usize, field: &'static str) -> Result<Vec<Bytes>, TxError> {
    let list = rlp.at(index).map_err(|e| rlp_error(field, e))?;
    let mut out = Vec::new();
    for item in list.iter() {
        out.push(Bytes::from_slice(
            item.data().map_err(|e| rlp_error(field, e))?,
        ));
    }
    Ok(out)
}

fn decode_fixed48_list(
    rlp: &Rlp<'_>,
    index: usize,
    field: &'static str,
) -> Result<Vec<[u8; 48]>, TxError> {
    let list = rlp.at(index).map_err(|e| rlp_error(field, e))?;
    let mut out = Vec::new();
    for item in list.iter() {
        let bytes = item.data().map_err(|e| rlp_error(field, e))?;
        if bytes.len() != BYTES_PER_COMMITMENT {
            return Err(TxError::LengthMismatch {
                field,
                expected: BYTES_PER_COMMITMENT,
                actual: bytes.len(),
            });
        }
        let mut fixed = [0u8; 48];
        fixed.copy_from_slice(bytes);
        out.push(fixed);
    }
    Ok(out)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{install_mock_kzg, MOCK_KZG_VERSION};
    use ember_common::{ChainConfig, Hardfork};

    fn common() -> Common {
        Common::new(ChainConfig::dev(Hardfork::Cancun))
    }

    fn secret() -> [u8; 32] {
        let mut key = [0u8; 32];
        key[31] = 0x44;
        key
    }

    fn commitment(n: u8) -> [u8; 48] {
        [n; 48]
    }

    fn versioned(commitment_bytes: &[u8; 48]) -> Hash {
        compute_versioned_hash(commitment_bytes, MOCK_KZG_VERSION)
    }

    fn sample_tx(hashes: Vec<Hash>) -> Result<BlobTx, TxError> {
        BlobTx::new(
            BlobTxData {
                nonce: 0,
                max_priority_fee_per_gas: U256::from(1_000_000_000u64),
                max_fee_per_gas: U256::from(10_000_000_000u64),
                gas_limit: 21_000,
                to: Some(Address::new([0x77; 20])),
                value: U256::zero(),
                data: Bytes::new(),
                access_list: AccessList::empty(),
                max_fee_per_data_gas: U256::from(100u64),
                versioned_hashes: hashes,
                signature: None,
            },
            &common(),
        )
    }

    #[test]
    fn payload_round_trip() {
        let tx = sample_tx(vec![versioned(&commitment(1))]).unwrap();
        let signed = tx.sign(&secret()).unwrap();
        let encoded = signed.serialize().unwrap();
        assert_eq!(encoded.as_slice()[0], BLOB_TX_TYPE);
        let decoded = BlobTx::from_serialized(encoded.as_slice(), &common()).unwrap();
        assert_eq!(decoded, signed);
    }

    #[test]
    fn missing_recipient_is_rejected() {
        let result = BlobTx::new(
            BlobTxData {
                versioned_hashes: vec![versioned(&commitment(1))],
                ..BlobTxData::default()
            },
            &common(),
        );
        assert_eq!(result.unwrap_err(), TxError::BlobTxMissingTo);
    }

    #[test]
    fn blob_count_bounds() {
        assert!(matches!(
            sample_tx(vec![]),
            Err(TxError::BlobCountOutOfRange { count: 0, .. })
        ));
        let too_many: Vec<Hash> = (0..7).map(|i| versioned(&commitment(i))).collect();
        assert!(matches!(
            sample_tx(too_many),
            Err(TxError::BlobCountOutOfRange { count: 7, .. })
        ));
    }

    #[test]
    fn wrong_version_byte_is_rejected() {
        let mut hash = versioned(&commitment(1));
        hash.0[0] = 0x02;
        assert_eq!(
            sample_tx(vec![hash]).unwrap_err(),
            TxError::VersionedHashMismatch(0)
        );
    }

    #[test]
    fn network_wrapper_round_trip_with_verification() {
        install_mock_kzg();
        let commitments = vec![commitment(1), commitment(2)];
        let hashes: Vec<Hash> = commitments.iter().map(versioned).collect();
        let tx = sample_tx(hashes).unwrap().sign(&secret()).unwrap();

        let wrapper = BlobTxNetworkWrapper::new(
            tx,
            vec![Bytes::from_slice(b"blob-1"), Bytes::from_slice(b"blob-2")],
            commitments,
            vec![commitment(0xf1), commitment(0xf2)],
        )
        .unwrap();

        let encoded = wrapper.serialize().unwrap();
        let decoded = BlobTxNetworkWrapper::from_serialized(encoded.as_slice(), &common()).unwrap();
        assert_eq!(decoded, wrapper);
    }

    #[test]
    fn wrapper_rejects_mismatched_hashes() {
        install_mock_kzg();
        let tx = sample_tx(vec![versioned(&commitment(9))])
            .unwrap()
            .sign(&secret())
            .unwrap();
        // Commitment differs from the one the versioned hash was built from.
        let wrapper = BlobTxNetworkWrapper::new(
            tx,
            vec![Bytes::from_slice(b"blob")],
            vec![commitment(1)],
            vec![commitment(2)],
        )
        .unwrap();
        let encoded = wrapper.serialize().unwrap();
        assert_eq!(
            BlobTxNetworkWrapper::from_serialized(encoded.as_slice(), &common()).unwrap_err(),
            TxError::VersionedHashMismatch(0)
        );
    }

    #[test]
    fn wrapper_rejects_length_mismatch() {
        let tx = sample_tx(vec![versioned(&commitment(1))])
            .unwrap()
            .sign(&secret())
            .unwrap();
        let result = BlobTxNetworkWrapper::new(
            tx,
            vec![],
            vec![commitment(1)],
            vec![commitment(2)],
        );
        assert_eq!(result.unwrap_err(), TxError::BlobWrapperLengthMismatch);
    }

    #[test]
    fn type_not_activated_pre_cancun() {
        let shanghai = Common::new(ChainConfig::dev(Hardfork::Shanghai));
        let result = BlobTx::new(
            BlobTxData {
                to: Some(Address::ZERO),
                versioned_hashes: vec![Hash::ZERO],
                ..BlobTxData::default()
            },
            &shanghai,
        );
        assert_eq!(result.unwrap_err(), TxError::TxTypeNotActivated(0x03));
    }

    #[test]
    fn data_gas_scales_with_blob_count() {
        let tx = sample_tx(vec![versioned(&commitment(1)), versioned(&commitment(2))]).unwrap();
        assert_eq!(tx.data_gas(&common()), 2 * 131_072);
    }
}
