use std::collections::HashSet;
use std::sync::Mutex;

use crate::resource_id::ResourceId;

pub type TxnId = u64;

/// Where a transaction stands in the two-phase locking protocol.
///
/// `Default → Growing → Shrinking → {Committed, Aborted}`. Under strict
/// strong 2PL the shrinking phase only ever happens at commit/abort, but
/// the lock manager enforces the ordering regardless of who releases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TxnState {
    #[default]
    Default,
    Growing,
    Shrinking,
    Committed,
    Aborted,
}

impl TxnState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TxnState::Committed | TxnState::Aborted)
    }
}

/// A transaction handle.
///
/// Owned by the transaction manager's registry and borrowed per call by
/// the lock manager, which mutates the phase and the lock set through a
/// shared reference. The interior mutexes make that safe; a single
/// thread drives any given transaction, so the phase never races.
pub struct Transaction {
    id: TxnId,
    state: Mutex<TxnState>,
    lock_set: Mutex<HashSet<ResourceId>>,
}

impl Transaction {
    /// Create a transaction in the `Default` phase holding no locks.
    ///
    /// Ids must increase monotonically across the process: a smaller id
    /// means an older transaction, which is what wait-die orders by.
    pub fn new(id: TxnId) -> Self {
        Self {
            id,
            state: Mutex::new(TxnState::Default),
            lock_set: Mutex::new(HashSet::new()),
        }
    }

    pub fn id(&self) -> TxnId {
        self.id
    }

    pub fn state(&self) -> TxnState {
        *self.state.lock().unwrap()
    }

    pub fn set_state(&self, state: TxnState) {
        *self.state.lock().unwrap() = state;
    }

    pub(crate) fn add_lock(&self, id: ResourceId) {
        self.lock_set.lock().unwrap().insert(id);
    }

    pub(crate) fn remove_lock(&self, id: &ResourceId) {
        self.lock_set.lock().unwrap().remove(id);
    }

    pub fn holds_lock(&self, id: &ResourceId) -> bool {
        self.lock_set.lock().unwrap().contains(id)
    }

    /// Snapshot of every resource currently locked. Commit/abort iterate
    /// this while `unlock` drains the live set underneath.
    pub fn held_locks(&self) -> Vec<ResourceId> {
        self.lock_set.lock().unwrap().iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rid::RID;

    #[test]
    fn starts_clean() {
        let txn = Transaction::new(1);
        assert_eq!(txn.id(), 1);
        assert_eq!(txn.state(), TxnState::Default);
        assert!(txn.held_locks().is_empty());
    }

    #[test]
    fn lock_set_tracks_membership() {
        let txn = Transaction::new(1);
        let table = ResourceId::table(5);
        let record = ResourceId::record(5, RID::new(0, 3));

        txn.add_lock(table);
        txn.add_lock(record);
        txn.add_lock(table); // set semantics
        assert_eq!(txn.held_locks().len(), 2);
        assert!(txn.holds_lock(&table));

        txn.remove_lock(&table);
        assert!(!txn.holds_lock(&table));
        assert!(txn.holds_lock(&record));
    }

    #[test]
    fn terminal_states() {
        assert!(TxnState::Committed.is_terminal());
        assert!(TxnState::Aborted.is_terminal());
        assert!(!TxnState::Shrinking.is_terminal());
        assert!(!TxnState::Default.is_terminal());
    }
}
