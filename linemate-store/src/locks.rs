//! Per-player lock table for game write transactions.

use std::collections::HashSet;

use parking_lot::Mutex;

use linemate_core::types::PlayerId;

/// Tracks which players are currently held by an in-flight game write.
///
/// Callers pass player ids sorted ascending. A transaction either claims its
/// whole set at once or claims nothing, so a writer never holds part of its
/// set while waiting on the rest.
pub struct PlayerLockTable {
    held: Mutex<HashSet<PlayerId>>,
}

impl PlayerLockTable {
    pub fn new() -> Self {
        Self {
            held: Mutex::new(HashSet::new()),
        }
    }

    /// Claim every id in `ids`, or none of them. Returns `false` if any id is
    /// already held by another writer.
    pub fn try_acquire(&self, ids: &[PlayerId]) -> bool {
        let mut held = self.held.lock();
        if ids.iter().any(|id| held.contains(id)) {
            return false;
        }
        for id in ids {
            held.insert(*id);
        }
        true
    }

    /// Release previously claimed ids.
    pub fn release(&self, ids: &[PlayerId]) {
        let mut held = self.held.lock();
        for id in ids {
            held.remove(id);
        }
    }

    /// Number of players currently held.
    pub fn held_count(&self) -> usize {
        self.held.lock().len()
    }
}

impl Default for PlayerLockTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases its id set when dropped, so locks are returned on every exit path
/// of a commit.
pub(crate) struct LockLease<'a> {
    table: &'a PlayerLockTable,
    ids: &'a [PlayerId],
}

impl<'a> LockLease<'a> {
    pub(crate) fn new(table: &'a PlayerLockTable, ids: &'a [PlayerId]) -> Self {
        Self { table, ids }
    }
}

impl Drop for LockLease<'_> {
    fn drop(&mut self) {
        self.table.release(self.ids);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_release() {
        let table = PlayerLockTable::new();
        assert!(table.try_acquire(&[1, 2, 3]));
        assert_eq!(table.held_count(), 3);

        table.release(&[1, 2, 3]);
        assert_eq!(table.held_count(), 0);
        assert!(table.try_acquire(&[1, 2, 3]));
    }

    #[test]
    fn test_overlapping_sets_conflict() {
        let table = PlayerLockTable::new();
        assert!(table.try_acquire(&[1, 2, 3]));
        // Shares player 3 with the held set.
        assert!(!table.try_acquire(&[3, 4, 5]));
        // The failed attempt must not have claimed anything.
        assert_eq!(table.held_count(), 3);
        assert!(table.try_acquire(&[4, 5]));
    }

    #[test]
    fn test_disjoint_sets_coexist() {
        let table = PlayerLockTable::new();
        assert!(table.try_acquire(&[1, 2]));
        assert!(table.try_acquire(&[3, 4]));
        assert_eq!(table.held_count(), 4);
    }

    #[test]
    fn test_lease_releases_on_drop() {
        let table = PlayerLockTable::new();
        let ids = vec![10, 20];
        assert!(table.try_acquire(&ids));
        {
            let _lease = LockLease::new(&table, &ids);
            assert_eq!(table.held_count(), 2);
        }
        assert_eq!(table.held_count(), 0);
    }

    #[test]
    fn test_empty_set_always_acquires() {
        let table = PlayerLockTable::new();
        assert!(table.try_acquire(&[]));
        assert_eq!(table.held_count(), 0);
    }
}
