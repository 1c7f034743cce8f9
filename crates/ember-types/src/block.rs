//! # Blocks and Withdrawals
//!
//! A block pairs a header with opaque transaction envelopes (each already in
//! its wire encoding) and, from Shanghai onward, a withdrawals list.

use crate::header::BlockHeader;
use crate::primitives::{Address, Bytes, Hash, U256};
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use serde::{Deserialize, Serialize};

/// One gwei in wei.
pub const GWEI: u64 = 1_000_000_000;

/// A beacon-chain withdrawal applied to the execution layer (EIP-4895).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawal {
    /// Monotonically increasing withdrawal index.
    pub index: u64,
    /// Validator the withdrawal originates from.
    pub validator_index: u64,
    /// Recipient address.
    pub address: Address,
    /// Amount in gwei.
    pub amount: u64,
}

impl Withdrawal {
    /// The withdrawn amount in wei.
    #[must_use]
    pub fn amount_wei(&self) -> U256 {
        U256::from(self.amount) * U256::from(GWEI)
    }
}

impl Encodable for Withdrawal {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(4)
            .append(&self.index)
            .append(&self.validator_index)
            .append(&self.address)
            .append(&self.amount);
    }
}

impl Decodable for Withdrawal {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 4 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        Ok(Self {
            index: rlp.val_at(0)?,
            validator_index: rlp.val_at(1)?,
            address: rlp.val_at(2)?,
            amount: rlp.val_at(3)?,
        })
    }
}

/// An execution-layer block.
///
/// Transactions are carried as wire-encoded envelopes; decoding them back
/// into typed transactions is the transaction crate's concern.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// The block header.
    pub header: BlockHeader,
    /// Wire-encoded transaction envelopes, in execution order.
    pub transactions: Vec<Bytes>,
    /// Withdrawals (Shanghai onward).
    pub withdrawals: Option<Vec<Withdrawal>>,
}

impl Block {
    /// Creates a block from its parts.
    #[must_use]
    pub fn new(
        header: BlockHeader,
        transactions: Vec<Bytes>,
        withdrawals: Option<Vec<Withdrawal>>,
    ) -> Self {
        Self {
            header,
            transactions,
            withdrawals,
        }
    }

    /// The block hash (the header hash).
    #[must_use]
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    /// Block height.
    #[must_use]
    pub fn number(&self) -> u64 {
        self.header.number
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn withdrawal_rlp_round_trip() {
        let withdrawal = Withdrawal {
            index: 42,
            validator_index: 7,
            address: Address::new([9; 20]),
            amount: 32 * GWEI,
        };
        let encoded = rlp::encode(&withdrawal);
        let decoded: Withdrawal = rlp::decode(&encoded).unwrap();
        assert_eq!(decoded, withdrawal);
    }

    #[test]
    fn withdrawal_amount_is_gwei_denominated() {
        let withdrawal = Withdrawal {
            index: 0,
            validator_index: 0,
            address: Address::ZERO,
            amount: 3,
        };
        assert_eq!(withdrawal.amount_wei(), U256::from(3u64 * GWEI));
    }

    #[test]
    fn block_hash_is_header_hash() {
        let block = Block::new(BlockHeader::default(), vec![], None);
        assert_eq!(block.hash(), block.header.hash());
    }
}
