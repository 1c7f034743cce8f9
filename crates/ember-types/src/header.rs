//! # Block Header
//!
//! The execution-layer block header with its fork-dependent trailing fields.
//! Field order follows the consensus encoding exactly; optional fields are
//! appended only when the fork that introduced them is active for the block.

use crate::account::EMPTY_ROOT;
use crate::log::Bloom;
use crate::primitives::{Address, Bytes, Hash, U256};
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

/// Keccak-256 of the RLP of an empty uncle list.
pub const EMPTY_UNCLE_HASH: Hash = Hash([
    0x1d, 0xcc, 0x4d, 0xe8, 0xde, 0xc7, 0x5d, 0x7a, 0xab, 0x85, 0xb5, 0x67, 0xb6, 0xcc, 0xd4,
    0x1a, 0xd3, 0x12, 0x45, 0x1b, 0x94, 0x8a, 0x74, 0x13, 0xf0, 0xa1, 0x42, 0xfd, 0x40, 0xd4,
    0x93, 0x47,
]);

/// An execution-layer block header.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Hash of the parent block.
    pub parent_hash: Hash,
    /// Hash of the uncle list (post-merge always [`EMPTY_UNCLE_HASH`]).
    pub uncle_hash: Hash,
    /// Beneficiary of priority fees.
    pub coinbase: Address,
    /// World-state root after executing this block.
    pub state_root: Hash,
    /// Root of the transaction trie.
    pub transactions_root: Hash,
    /// Root of the receipt trie.
    pub receipts_root: Hash,
    /// Union of all receipt blooms.
    pub logs_bloom: Bloom,
    /// Proof-of-work difficulty (zero post-merge).
    pub difficulty: U256,
    /// Block height.
    pub number: u64,
    /// Gas ceiling for the block.
    pub gas_limit: u64,
    /// Gas consumed by all transactions.
    pub gas_used: u64,
    /// Unix timestamp in seconds.
    pub timestamp: u64,
    /// Arbitrary extra data (bounded by protocol rules).
    pub extra_data: Bytes,
    /// Pre-merge mix hash; post-merge the prev-randao value.
    pub mix_hash: Hash,
    /// Proof-of-work nonce (zero post-merge).
    pub nonce: [u8; 8],
    /// Per-gas base fee burned by EIP-1559 (London onward).
    pub base_fee_per_gas: Option<U256>,
    /// Root of the withdrawals list (Shanghai onward).
    pub withdrawals_root: Option<Hash>,
    /// Blob gas consumed by the block (Cancun onward).
    pub data_gas_used: Option<u64>,
    /// Running blob-gas excess used for blob pricing (Cancun onward).
    pub excess_data_gas: Option<u64>,
}

impl BlockHeader {
    /// Keccak-256 of the header's RLP encoding.
    #[must_use]
    pub fn hash(&self) -> Hash {
        let encoded = rlp::encode(self);
        Hash::new(Keccak256::digest(&encoded).into())
    }

    /// Number of RLP fields for this header's fork vintage.
    fn field_count(&self) -> usize {
        let mut count = 15;
        if self.base_fee_per_gas.is_some() {
            count += 1;
        }
        if self.withdrawals_root.is_some() {
            count += 1;
        }
        if self.data_gas_used.is_some() {
            count += 2;
        }
        count
    }
}

impl Default for BlockHeader {
    fn default() -> Self {
        Self {
            parent_hash: Hash::ZERO,
            uncle_hash: EMPTY_UNCLE_HASH,
            coinbase: Address::ZERO,
            state_root: EMPTY_ROOT,
            transactions_root: EMPTY_ROOT,
            receipts_root: EMPTY_ROOT,
            logs_bloom: Bloom::ZERO,
            difficulty: U256::zero(),
            number: 0,
            gas_limit: 0,
            gas_used: 0,
            timestamp: 0,
            extra_data: Bytes::new(),
            mix_hash: Hash::ZERO,
            nonce: [0u8; 8],
            base_fee_per_gas: None,
            withdrawals_root: None,
            data_gas_used: None,
            excess_data_gas: None,
        }
    }
}

impl Encodable for BlockHeader {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(self.field_count());
        s.append(&self.parent_hash)
            .append(&self.uncle_hash)
            .append(&self.coinbase)
            .append(&self.state_root)
            .append(&self.transactions_root)
            .append(&self.receipts_root)
            .append(&self.logs_bloom)
            .append(&self.difficulty)
            .append(&self.number)
            .append(&self.gas_limit)
            .append(&self.gas_used)
            .append(&self.timestamp)
            .append(&self.extra_data)
            .append(&self.mix_hash);
        s.append(&self.nonce.to_vec());
        if let Some(base_fee) = self.base_fee_per_gas {
            s.append(&base_fee);
        }
        if let Some(root) = self.withdrawals_root {
            s.append(&root);
        }
        if let Some(used) = self.data_gas_used {
            s.append(&used);
            // excess_data_gas is always paired with data_gas_used
            s.append(&self.excess_data_gas.unwrap_or_default());
        }
    }
}

impl Decodable for BlockHeader {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        let count = rlp.item_count()?;
        if !matches!(count, 15 | 16 | 17 | 19) {
            return Err(DecoderError::RlpIncorrectListLen);
        }

        let nonce_bytes: Vec<u8> = rlp.val_at(14)?;
        if nonce_bytes.len() != 8 {
            return Err(DecoderError::RlpInvalidLength);
        }
        let mut nonce = [0u8; 8];
        nonce.copy_from_slice(&nonce_bytes);

        Ok(Self {
            parent_hash: rlp.val_at(0)?,
            uncle_hash: rlp.val_at(1)?,
            coinbase: rlp.val_at(2)?,
            state_root: rlp.val_at(3)?,
            transactions_root: rlp.val_at(4)?,
            receipts_root: rlp.val_at(5)?,
            logs_bloom: rlp.val_at(6)?,
            difficulty: rlp.val_at(7)?,
            number: rlp.val_at(8)?,
            gas_limit: rlp.val_at(9)?,
            gas_used: rlp.val_at(10)?,
            timestamp: rlp.val_at(11)?,
            extra_data: rlp.val_at(12)?,
            mix_hash: rlp.val_at(13)?,
            nonce,
            base_fee_per_gas: if count >= 16 { Some(rlp.val_at(15)?) } else { None },
            withdrawals_root: if count >= 17 { Some(rlp.val_at(16)?) } else { None },
            data_gas_used: if count >= 19 { Some(rlp.val_at(17)?) } else { None },
            excess_data_gas: if count >= 19 { Some(rlp.val_at(18)?) } else { None },
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn london_header() -> BlockHeader {
        BlockHeader {
            parent_hash: Hash::new([1; 32]),
            coinbase: Address::new([2; 20]),
            number: 12_965_000,
            gas_limit: 30_000_000,
            gas_used: 12_345_678,
            timestamp: 1_628_166_822,
            base_fee_per_gas: Some(U256::from(1_000_000_000u64)),
            ..BlockHeader::default()
        }
    }

    #[test]
    fn pre_london_header_has_15_fields() {
        let header = BlockHeader::default();
        let encoded = rlp::encode(&header);
        let outer = Rlp::new(&encoded);
        assert_eq!(outer.item_count().unwrap(), 15);
    }

    #[test]
    fn london_header_round_trip() {
        let header = london_header();
        let encoded = rlp::encode(&header);
        assert_eq!(Rlp::new(&encoded).item_count().unwrap(), 16);
        let decoded: BlockHeader = rlp::decode(&encoded).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn cancun_header_round_trip() {
        let mut header = london_header();
        header.withdrawals_root = Some(EMPTY_ROOT);
        header.data_gas_used = Some(131_072);
        header.excess_data_gas = Some(0);

        let encoded = rlp::encode(&header);
        assert_eq!(Rlp::new(&encoded).item_count().unwrap(), 19);
        let decoded: BlockHeader = rlp::decode(&encoded).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn header_hash_is_stable() {
        let header = london_header();
        assert_eq!(header.hash(), header.hash());
        let mut other = header.clone();
        other.number += 1;
        assert_ne!(header.hash(), other.hash());
    }
}
