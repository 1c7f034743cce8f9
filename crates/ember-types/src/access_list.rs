//! # EIP-2930 Access Lists

use crate::primitives::{Address, StorageKey};
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use serde::{Deserialize, Serialize};

/// One access-list entry: an address plus the storage keys to pre-warm.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessListItem {
    /// Account to warm.
    pub address: Address,
    /// Storage slots to warm under that account.
    pub storage_keys: Vec<StorageKey>,
}

impl AccessListItem {
    /// Creates a new entry.
    #[must_use]
    pub fn new(address: Address, storage_keys: Vec<StorageKey>) -> Self {
        Self {
            address,
            storage_keys,
        }
    }
}

impl Encodable for AccessListItem {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(2)
            .append(&self.address)
            .append_list(&self.storage_keys);
    }
}

impl Decodable for AccessListItem {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 2 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        Ok(Self {
            address: rlp.val_at(0)?,
            storage_keys: rlp.list_at(1)?,
        })
    }
}

/// An ordered access list. Duplicates are preserved: intrinsic-gas charging
/// counts every occurrence while warm-set insertion is idempotent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessList(pub Vec<AccessListItem>);

impl AccessList {
    /// The empty access list.
    #[must_use]
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    /// Number of entries (duplicates included).
    #[must_use]
    pub fn address_count(&self) -> usize {
        self.0.len()
    }

    /// Total number of storage keys across entries (duplicates included).
    #[must_use]
    pub fn storage_key_count(&self) -> usize {
        self.0.iter().map(|item| item.storage_keys.len()).sum()
    }

    /// Returns true if no entries are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the entries.
    pub fn iter(&self) -> impl Iterator<Item = &AccessListItem> {
        self.0.iter()
    }
}

impl From<Vec<AccessListItem>> for AccessList {
    fn from(items: Vec<AccessListItem>) -> Self {
        Self(items)
    }
}

impl Encodable for AccessList {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.append_list(&self.0);
    }
}

impl Decodable for AccessList {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(Self(rlp.as_list()?))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_include_duplicates() {
        let item = AccessListItem::new(
            Address::new([1; 20]),
            vec![StorageKey::new([2; 32]), StorageKey::new([2; 32])],
        );
        let list = AccessList(vec![item.clone(), item]);

        assert_eq!(list.address_count(), 2);
        assert_eq!(list.storage_key_count(), 4);
    }

    #[test]
    fn access_list_rlp_round_trip() {
        let list = AccessList(vec![
            AccessListItem::new(Address::new([1; 20]), vec![StorageKey::new([9; 32])]),
            AccessListItem::new(Address::new([2; 20]), vec![]),
        ]);
        let encoded = rlp::encode(&list);
        let decoded: AccessList = rlp::decode(&encoded).unwrap();
        assert_eq!(decoded, list);
    }

    #[test]
    fn empty_list_encodes_as_empty_rlp_list() {
        let encoded = rlp::encode(&AccessList::empty());
        assert_eq!(encoded.to_vec(), vec![0xc0]);
    }
}
