use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::trace;

use crate::error::Result;
use crate::lock_manager::LockManager;
use crate::transaction::{Transaction, TxnId, TxnState};

/// Hands out transactions and drives them to commit or abort.
///
/// Owns the process-wide id-to-transaction registry, guarded by its own
/// mutex rather than the lock manager's latch. Ids increase
/// monotonically, which is the age order wait-die decides by.
pub struct TransactionManager {
    lock_mgr: Arc<LockManager>,
    next_txn_id: AtomicU64,
    txn_map: Mutex<HashMap<TxnId, Arc<Transaction>>>,
}

impl TransactionManager {
    pub fn new(lock_mgr: Arc<LockManager>) -> Self {
        Self {
            lock_mgr,
            next_txn_id: AtomicU64::new(0),
            txn_map: Mutex::new(HashMap::new()),
        }
    }

    /// Start a new transaction and register it.
    pub fn begin(&self) -> Arc<Transaction> {
        let id = self.next_txn_id.fetch_add(1, Ordering::SeqCst);
        let txn = Arc::new(Transaction::new(id));
        self.txn_map.lock().unwrap().insert(id, txn.clone());
        trace!("transaction {} begins", id);
        txn
    }

    /// Look a transaction up by id.
    pub fn get(&self, txn_id: TxnId) -> Option<Arc<Transaction>> {
        self.txn_map.lock().unwrap().get(&txn_id).cloned()
    }

    /// Commit: release every lock, then mark the transaction committed.
    /// Under strict strong 2PL this is the only place locks come off a
    /// healthy transaction.
    pub fn commit(&self, txn: &Transaction) -> Result<()> {
        if txn.state().is_terminal() {
            return Ok(());
        }
        self.release_all(txn)?;
        txn.set_state(TxnState::Committed);
        trace!("transaction {} committed", txn.id());
        Ok(())
    }

    /// Abort: release every lock, then mark the transaction aborted.
    /// Rolling the data changes back belongs to the storage layer.
    pub fn abort(&self, txn: &Transaction) -> Result<()> {
        if txn.state().is_terminal() {
            return Ok(());
        }
        self.release_all(txn)?;
        txn.set_state(TxnState::Aborted);
        trace!("transaction {} aborted", txn.id());
        Ok(())
    }

    fn release_all(&self, txn: &Transaction) -> Result<()> {
        // Snapshot first: unlock drains the live set as it goes
        for rid in txn.held_locks() {
            self.lock_mgr.unlock(txn, rid)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rid::RID;

    fn setup() -> (Arc<LockManager>, TransactionManager) {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let lm = Arc::new(LockManager::new());
        let tm = TransactionManager::new(lm.clone());
        (lm, tm)
    }

    #[test]
    fn begin_assigns_increasing_ids() {
        let (_lm, tm) = setup();
        let t1 = tm.begin();
        let t2 = tm.begin();
        let t3 = tm.begin();
        assert!(t1.id() < t2.id());
        assert!(t2.id() < t3.id());
        assert_eq!(t1.state(), TxnState::Default);
    }

    #[test]
    fn registry_lookup() {
        let (_lm, tm) = setup();
        let txn = tm.begin();
        let found = tm.get(txn.id()).unwrap();
        assert_eq!(found.id(), txn.id());
        assert!(tm.get(9999).is_none());
    }

    #[test]
    fn commit_releases_every_lock() {
        let (lm, tm) = setup();
        let t1 = tm.begin();

        assert_eq!(lm.ixlock_table(&t1, 5), Ok(true));
        assert_eq!(lm.xlock_record(&t1, RID::new(1, 1), 5), Ok(true));
        assert_eq!(t1.held_locks().len(), 2);

        tm.commit(&t1).unwrap();
        assert_eq!(t1.state(), TxnState::Committed);
        assert!(t1.held_locks().is_empty());

        // The resources are free for the next transaction
        let t2 = tm.begin();
        assert_eq!(lm.xlock_table(&t2, 5), Ok(true));
    }

    #[test]
    fn abort_releases_every_lock() {
        let (lm, tm) = setup();
        let t1 = tm.begin();

        assert_eq!(lm.xlock_table(&t1, 7), Ok(true));
        tm.abort(&t1).unwrap();
        assert_eq!(t1.state(), TxnState::Aborted);
        assert!(t1.held_locks().is_empty());

        let t2 = tm.begin();
        assert_eq!(lm.slock_table(&t2, 7), Ok(true));
    }

    #[test]
    fn commit_and_abort_are_terminal() {
        let (lm, tm) = setup();
        let txn = tm.begin();

        assert_eq!(lm.slock_table(&txn, 1), Ok(true));
        tm.commit(&txn).unwrap();

        // A second commit or a late abort changes nothing
        tm.commit(&txn).unwrap();
        tm.abort(&txn).unwrap();
        assert_eq!(txn.state(), TxnState::Committed);

        // And further lock traffic is a harmless no-op
        assert_eq!(lm.slock_table(&txn, 1), Ok(false));
    }
}
