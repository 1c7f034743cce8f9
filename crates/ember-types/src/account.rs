//! # Account State
//!
//! The four-field account record stored in the world state.

use crate::primitives::{Hash, U256};
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use serde::{Deserialize, Serialize};

/// Keccak-256 of the empty byte string. Code hash of every EOA.
pub const KECCAK_EMPTY: Hash = Hash([
    0xc5, 0xd2, 0x46, 0x01, 0x86, 0xf7, 0x23, 0x3c, 0x92, 0x7e, 0x7d, 0xb2, 0xdc, 0xc7, 0x03,
    0xc0, 0xe5, 0x00, 0xb6, 0x53, 0xca, 0x82, 0x27, 0x3b, 0x7b, 0xfa, 0xd8, 0x04, 0x5d, 0x85,
    0xa4, 0x70,
]);

/// Root hash of an empty storage trie.
pub const EMPTY_ROOT: Hash = Hash([
    0x56, 0xe8, 0x1f, 0x17, 0x1b, 0xcc, 0x55, 0xa6, 0xff, 0x83, 0x45, 0xe6, 0x92, 0xc0, 0xf8,
    0x6e, 0x5b, 0x48, 0xe0, 0x1b, 0x99, 0x6c, 0xad, 0xc0, 0x01, 0x62, 0x2f, 0xb5, 0xe3, 0x63,
    0xb4, 0x21,
]);

/// Account state: `[nonce, balance, storage_root, code_hash]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Number of transactions sent from this account (or contracts created by it).
    pub nonce: u64,
    /// Balance in wei.
    pub balance: U256,
    /// Root of the account's storage trie.
    pub storage_root: Hash,
    /// Keccak-256 of the account's code.
    pub code_hash: Hash,
}

impl Account {
    /// A fresh externally-owned account with the given balance and nonce.
    #[must_use]
    pub fn new_eoa(balance: U256, nonce: u64) -> Self {
        Self {
            nonce,
            balance,
            storage_root: EMPTY_ROOT,
            code_hash: KECCAK_EMPTY,
        }
    }

    /// Returns true if the account is empty per EIP-161:
    /// zero nonce, zero balance, empty code.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nonce == 0 && self.balance.is_zero() && self.code_hash == KECCAK_EMPTY
    }

    /// Returns true if the account carries contract code.
    #[must_use]
    pub fn has_code(&self) -> bool {
        self.code_hash != KECCAK_EMPTY
    }
}

impl Default for Account {
    fn default() -> Self {
        Self::new_eoa(U256::zero(), 0)
    }
}

impl Encodable for Account {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(4)
            .append(&self.nonce)
            .append(&self.balance)
            .append(&self.storage_root)
            .append(&self.code_hash);
    }
}

impl Decodable for Account {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 4 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        Ok(Self {
            nonce: rlp.val_at(0)?,
            balance: rlp.val_at(1)?,
            storage_root: rlp.val_at(2)?,
            code_hash: rlp.val_at(3)?,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use sha3::{Digest, Keccak256};

    #[test]
    fn keccak_empty_matches_digest_of_nothing() {
        let digest: [u8; 32] = Keccak256::digest([]).into();
        assert_eq!(KECCAK_EMPTY, Hash::new(digest));
    }

    #[test]
    fn empty_account_is_empty() {
        assert!(Account::default().is_empty());
        assert!(!Account::new_eoa(U256::one(), 0).is_empty());
        assert!(!Account::new_eoa(U256::zero(), 1).is_empty());

        let mut contract = Account::default();
        contract.code_hash = Hash::new([1u8; 32]);
        assert!(!contract.is_empty());
        assert!(contract.has_code());
    }

    #[test]
    fn account_rlp_round_trip() {
        let account = Account::new_eoa(U256::from(1_000_000u64), 7);
        let encoded = rlp::encode(&account);
        let decoded: Account = rlp::decode(&encoded).unwrap();
        assert_eq!(decoded, account);
    }
}
