//! # Undo-Log Journal
//!
//! A checkpoint stack over an append-only entry log. `checkpoint` marks a
//! boundary, `commit` merges the youngest frame into its parent (entries
//! survive, so an outer revert still undoes them), and `revert` drains the
//! youngest frame so the owner can undo it newest-first.

use crate::errors::StateError;

/// A generic journal over entry type `E`.
#[derive(Clone, Debug)]
pub struct Journal<E> {
    entries: Vec<E>,
    checkpoints: Vec<usize>,
}

impl<E> Default for Journal<E> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            checkpoints: Vec::new(),
        }
    }
}

impl<E> Journal<E> {
    /// Creates an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            checkpoints: Vec::new(),
        }
    }

    /// Current nesting depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.checkpoints.len()
    }

    /// Number of recorded entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no entries are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pushes a checkpoint boundary.
    pub fn checkpoint(&mut self) {
        self.checkpoints.push(self.entries.len());
    }

    /// Records one undo entry in the open frame.
    pub fn record(&mut self, entry: E) {
        self.entries.push(entry);
    }

    /// Merges the youngest frame into its parent.
    ///
    /// At the outermost level the log is drained: there is no parent left to
    /// undo into.
    ///
    /// # Errors
    ///
    /// Returns `JournalUnbalanced` with no open checkpoint.
    pub fn commit(&mut self) -> Result<(), StateError> {
        self.checkpoints
            .pop()
            .ok_or(StateError::JournalUnbalanced)?;
        if self.checkpoints.is_empty() {
            self.entries.clear();
        }
        Ok(())
    }

    /// Drains the youngest frame, returning its entries newest-first for the
    /// owner to undo.
    ///
    /// # Errors
    ///
    /// Returns `JournalUnbalanced` with no open checkpoint.
    pub fn revert(&mut self) -> Result<Vec<E>, StateError> {
        let mark = self
            .checkpoints
            .pop()
            .ok_or(StateError::JournalUnbalanced)?;
        let mut drained = self.entries.split_off(mark);
        drained.reverse();
        Ok(drained)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revert_returns_entries_newest_first() {
        let mut journal = Journal::new();
        journal.checkpoint();
        journal.record(1);
        journal.record(2);
        journal.record(3);
        assert_eq!(journal.revert().unwrap(), vec![3, 2, 1]);
        assert!(journal.is_empty());
    }

    #[test]
    fn commit_merges_into_parent() {
        let mut journal = Journal::new();
        journal.checkpoint();
        journal.record(1);
        journal.checkpoint();
        journal.record(2);
        journal.commit().unwrap();
        // Outer revert still sees the inner frame's entry.
        assert_eq!(journal.revert().unwrap(), vec![2, 1]);
    }

    #[test]
    fn outermost_commit_drains_the_log() {
        let mut journal = Journal::new();
        journal.checkpoint();
        journal.record(7);
        journal.commit().unwrap();
        assert!(journal.is_empty());
        assert_eq!(journal.depth(), 0);
    }

    #[test]
    fn unbalanced_operations_fail() {
        let mut journal: Journal<u8> = Journal::new();
        assert_eq!(journal.commit(), Err(StateError::JournalUnbalanced));
        assert_eq!(
            journal.revert().unwrap_err(),
            StateError::JournalUnbalanced
        );
    }

    #[test]
    fn nested_revert_only_touches_inner_frame() {
        let mut journal = Journal::new();
        journal.checkpoint();
        journal.record("outer");
        journal.checkpoint();
        journal.record("inner");
        assert_eq!(journal.revert().unwrap(), vec!["inner"]);
        assert_eq!(journal.revert().unwrap(), vec!["outer"]);
    }
}
