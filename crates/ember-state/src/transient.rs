//! # Transient Storage (EIP-1153)
//!
//! Per-transaction scratch storage with its own checkpoint stack, independent
//! of the state journal. Cleared when the transaction ends.

use crate::errors::StateError;
use crate::journal::Journal;
use ember_types::{Address, StorageKey, StorageValue};
use std::collections::HashMap;

type TransientEntry = (Address, StorageKey, StorageValue);

/// Per-transaction `(address, key) -> value` scratch space.
#[derive(Clone, Debug, Default)]
pub struct TransientStorage {
    data: HashMap<(Address, StorageKey), StorageValue>,
    journal: Journal<TransientEntry>,
}

impl TransientStorage {
    /// Creates empty transient storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a slot; absent slots read as zero.
    #[must_use]
    pub fn load(&self, address: Address, key: StorageKey) -> StorageValue {
        self.data
            .get(&(address, key))
            .copied()
            .unwrap_or(StorageValue::ZERO)
    }

    /// Writes a slot, journaling the previous value.
    pub fn store(&mut self, address: Address, key: StorageKey, value: StorageValue) {
        let previous = self.load(address, key);
        self.journal.record((address, key, previous));
        if value.is_zero() {
            self.data.remove(&(address, key));
        } else {
            self.data.insert((address, key), value);
        }
    }

    /// Opens a checkpoint frame.
    pub fn checkpoint(&mut self) {
        self.journal.checkpoint();
    }

    /// Merges the youngest frame into its parent.
    ///
    /// # Errors
    ///
    /// Returns `JournalUnbalanced` with no open checkpoint.
    pub fn commit(&mut self) -> Result<(), StateError> {
        self.journal.commit()
    }

    /// Undoes every write since the matching checkpoint.
    ///
    /// # Errors
    ///
    /// Returns `JournalUnbalanced` with no open checkpoint.
    pub fn revert(&mut self) -> Result<(), StateError> {
        for (address, key, previous) in self.journal.revert()? {
            if previous.is_zero() {
                self.data.remove(&(address, key));
            } else {
                self.data.insert((address, key), previous);
            }
        }
        Ok(())
    }

    /// Drops all slots and checkpoints. Called at transaction end.
    pub fn clear(&mut self) {
        self.data.clear();
        self.journal = Journal::new();
    }

    /// Number of live slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if no slot is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(n: u8) -> StorageKey {
        StorageKey::new([n; 32])
    }

    fn value(n: u8) -> StorageValue {
        StorageValue::new([n; 32])
    }

    #[test]
    fn unset_slots_read_zero() {
        let storage = TransientStorage::new();
        assert_eq!(storage.load(Address::ZERO, slot(1)), StorageValue::ZERO);
    }

    #[test]
    fn revert_restores_previous_value() {
        let mut storage = TransientStorage::new();
        let addr = Address::new([1; 20]);

        storage.checkpoint();
        storage.store(addr, slot(1), value(0xaa));
        storage.checkpoint();
        storage.store(addr, slot(1), value(0xbb));
        storage.revert().unwrap();
        assert_eq!(storage.load(addr, slot(1)), value(0xaa));

        storage.revert().unwrap();
        assert_eq!(storage.load(addr, slot(1)), StorageValue::ZERO);
    }

    #[test]
    fn commit_keeps_values_visible_to_outer_revert() {
        let mut storage = TransientStorage::new();
        let addr = Address::new([2; 20]);

        storage.checkpoint();
        storage.checkpoint();
        storage.store(addr, slot(3), value(1));
        storage.commit().unwrap();
        assert_eq!(storage.load(addr, slot(3)), value(1));

        storage.revert().unwrap();
        assert_eq!(storage.load(addr, slot(3)), StorageValue::ZERO);
    }

    #[test]
    fn clear_wipes_everything() {
        let mut storage = TransientStorage::new();
        storage.checkpoint();
        storage.store(Address::ZERO, slot(1), value(1));
        storage.clear();
        assert!(storage.is_empty());
        // The checkpoint stack is gone as well.
        assert_eq!(storage.commit(), Err(StateError::JournalUnbalanced));
    }
}
