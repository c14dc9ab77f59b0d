use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use crate::error::{AbortReason, DbError, Result};
use crate::lock_mode::{GroupLockMode, LockMode};
use crate::resource_id::{FileId, GapId, ResourceId};
use crate::rid::RID;
use crate::transaction::{Transaction, TxnId, TxnState};

/// One transaction's claim on one resource.
#[derive(Clone, Copy, Debug)]
struct LockRequest {
    txn_id: TxnId,
    mode: LockMode,
    granted: bool,
}

/// Per-resource state: the requests, their aggregate mode and the wait
/// point blocked requesters park on.
///
/// Queues are created lazily on first touch and never removed from the
/// lock table, so a waiter may rely on its queue outliving the wait.
struct LockRequestQueue {
    requests: Vec<LockRequest>,
    group_mode: GroupLockMode,
    waiters: Arc<Condvar>,
}

impl LockRequestQueue {
    fn new() -> Self {
        Self {
            requests: Vec::new(),
            group_mode: GroupLockMode::NonLock,
            waiters: Arc::new(Condvar::new()),
        }
    }

    /// Recompute the aggregate from the granted requests: the single most
    /// restrictive mode present wins.
    fn recompute_group_mode(&mut self) {
        use LockMode::*;
        self.group_mode = [
            Exclusive,
            SharedIntentionExclusive,
            IntentionExclusive,
            Shared,
            IntentionShared,
            Gap,
        ]
        .into_iter()
        .find(|m| self.requests.iter().any(|r| r.granted && r.mode == *m))
        .map(GroupLockMode::of)
        .unwrap_or(GroupLockMode::NonLock);
    }

    /// Granted requests from other transactions that a request for `mode`
    /// conflicts with.
    fn conflicting_holders(&self, txn_id: TxnId, mode: LockMode) -> Vec<TxnId> {
        self.requests
            .iter()
            .filter(|r| r.granted && r.txn_id != txn_id && !r.mode.compatible_with(mode))
            .map(|r| r.txn_id)
            .collect()
    }

    /// Wake predicate: no conflicting granted request from another
    /// transaction remains.
    fn clear_for(&self, txn_id: TxnId, mode: LockMode) -> bool {
        self.conflicting_holders(txn_id, mode).is_empty()
    }
}

type LockTable = HashMap<ResourceId, LockRequestQueue>;

/// Process-wide lock manager.
///
/// One mutex guards the whole resource map and every queue in it; a
/// blocked requester releases that mutex while parked on its queue's
/// condvar and reacquires it on wake, re-checking its predicate every
/// time. Release broadcasts to all waiters of the resource.
pub struct LockManager {
    latch: Mutex<LockTable>,
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            latch: Mutex::new(HashMap::new()),
        }
    }

    /// Request a shared lock on a table.
    ///
    /// # Arguments
    ///
    /// * `txn` - The requesting transaction.
    /// * `fd` - The table's file descriptor.
    pub fn slock_table(&self, txn: &Transaction, fd: FileId) -> Result<bool> {
        self.lock(txn, ResourceId::table(fd), LockMode::Shared)
    }

    /// Request an exclusive lock on a table.
    pub fn xlock_table(&self, txn: &Transaction, fd: FileId) -> Result<bool> {
        self.lock(txn, ResourceId::table(fd), LockMode::Exclusive)
    }

    /// Request an intention-shared lock on a table, announcing shared
    /// record locks underneath it.
    pub fn islock_table(&self, txn: &Transaction, fd: FileId) -> Result<bool> {
        self.lock(txn, ResourceId::table(fd), LockMode::IntentionShared)
    }

    /// Request an intention-exclusive lock on a table, announcing
    /// exclusive record locks underneath it.
    pub fn ixlock_table(&self, txn: &Transaction, fd: FileId) -> Result<bool> {
        self.lock(txn, ResourceId::table(fd), LockMode::IntentionExclusive)
    }

    /// Request a shared lock on a single record.
    pub fn slock_record(&self, txn: &Transaction, rid: RID, fd: FileId) -> Result<bool> {
        self.lock(txn, ResourceId::record(fd, rid), LockMode::Shared)
    }

    /// Request an exclusive lock on a single record.
    pub fn xlock_record(&self, txn: &Transaction, rid: RID, fd: FileId) -> Result<bool> {
        self.lock(txn, ResourceId::record(fd, rid), LockMode::Exclusive)
    }

    /// Mark an index gap as visited by a scan.
    ///
    /// Gap marks never conflict with each other, so a non-holder is
    /// granted unconditionally; inserts into the gap are what check
    /// against the marks, via [`LockManager::wait_gap_clearance`].
    pub fn lock_gap(&self, txn: &Transaction, gap: GapId, fd: FileId) -> Result<bool> {
        if !self.check_state_for_lock(txn)? {
            return Ok(false);
        }
        let resource = ResourceId::gap(fd, gap);
        let mut table = self.latch.lock().unwrap();
        let queue = table.entry(resource).or_insert_with(LockRequestQueue::new);
        if queue.requests.iter().any(|r| r.txn_id == txn.id()) {
            return Ok(true);
        }
        queue.requests.push(LockRequest {
            txn_id: txn.id(),
            mode: LockMode::Gap,
            granted: true,
        });
        queue.recompute_group_mode();
        txn.add_lock(resource);
        log::trace!("txn {} marked gap {}", txn.id(), resource);
        Ok(true)
    }

    /// Block until no other transaction holds a mark on this gap.
    ///
    /// The insert-side half of phantom prevention: called before placing
    /// a new entry into the gap. Applies wait-die against every other
    /// holder. Takes no lock and leaves the phase machine alone; the
    /// insert already went through it for its table and record locks.
    pub fn wait_gap_clearance(&self, txn: &Transaction, gap: GapId, fd: FileId) -> Result<()> {
        let resource = ResourceId::gap(fd, gap);
        let txn_id = txn.id();
        let table = self.latch.lock().unwrap();
        let Some(queue) = table.get(&resource) else {
            return Ok(());
        };
        let holders: Vec<TxnId> = queue
            .requests
            .iter()
            .filter(|r| r.txn_id != txn_id)
            .map(|r| r.txn_id)
            .collect();
        if holders.is_empty() {
            return Ok(());
        }
        log::trace!("txn {} needs clearance of {}", txn_id, resource);
        self.wait_die(txn, &holders, resource, table, move |q| {
            q.requests.iter().all(|r| r.txn_id == txn_id)
        })?;
        Ok(())
    }

    /// Release one lock held by the transaction.
    ///
    /// Removes the request, recomputes the queue's group mode from what
    /// remains and wakes every waiter on the resource. Succeeds (and
    /// still advances the phase machine) when the resource was never
    /// locked.
    ///
    /// # Arguments
    ///
    /// * `txn` - The releasing transaction.
    /// * `resource` - The resource to release.
    pub fn unlock(&self, txn: &Transaction, resource: ResourceId) -> Result<bool> {
        if !self.check_state_for_unlock(txn)? {
            return Ok(false);
        }
        let mut table = self.latch.lock().unwrap();
        let Some(queue) = table.get_mut(&resource) else {
            return Ok(true);
        };
        queue.requests.retain(|r| r.txn_id != txn.id());
        txn.remove_lock(&resource);
        queue.recompute_group_mode();
        log::trace!(
            "txn {} released {}, group mode now {:?}",
            txn.id(),
            resource,
            queue.group_mode
        );
        queue.waiters.notify_all();
        Ok(true)
    }

    /// The shared shape of every table/record acquisition: phase check,
    /// re-entrancy/upgrade handling, conflict check, wait-die, grant.
    fn lock(&self, txn: &Transaction, resource: ResourceId, mode: LockMode) -> Result<bool> {
        if !self.check_state_for_lock(txn)? {
            return Ok(false);
        }
        let txn_id = txn.id();

        let mut table = self.latch.lock().unwrap();
        let queue = table.entry(resource).or_insert_with(LockRequestQueue::new);

        let held = queue
            .requests
            .iter()
            .find(|r| r.txn_id == txn_id)
            .map(|r| r.mode);

        // Re-request by a holder: a no-op if the hold already covers the
        // mode, otherwise an in-place upgrade to the join of the two.
        if let Some(held_mode) = held {
            if held_mode.covers(mode) {
                return Ok(true);
            }
            let target = held_mode.lub(mode);
            let conflicts = queue.conflicting_holders(txn_id, target);
            if !conflicts.is_empty() {
                log::trace!(
                    "txn {} waiting to upgrade {:?} to {:?} on {}",
                    txn_id,
                    held_mode,
                    target,
                    resource
                );
                table = self.wait_die(txn, &conflicts, resource, table, move |q| {
                    q.clear_for(txn_id, target)
                })?;
            }
            let queue = table
                .get_mut(&resource)
                .expect("lock queue vanished during upgrade");
            let req = queue
                .requests
                .iter_mut()
                .find(|r| r.txn_id == txn_id)
                .expect("upgrading request vanished");
            req.mode = target;
            queue.recompute_group_mode();
            log::trace!("txn {} upgraded to {:?} on {}", txn_id, target, resource);
            return Ok(true);
        }

        if !queue.group_mode.admits(mode) {
            let conflicts = queue.conflicting_holders(txn_id, mode);
            log::trace!(
                "txn {} blocked requesting {:?} on {} (group mode {:?})",
                txn_id,
                mode,
                resource,
                queue.group_mode
            );
            table = self.wait_die(txn, &conflicts, resource, table, move |q| {
                q.clear_for(txn_id, mode)
            })?;
        }

        let queue = table
            .get_mut(&resource)
            .expect("lock queue vanished during acquire");
        queue.requests.push(LockRequest {
            txn_id,
            mode,
            granted: true,
        });
        queue.recompute_group_mode();
        txn.add_lock(resource);
        log::trace!(
            "txn {} granted {:?} on {}, group mode {:?}",
            txn_id,
            mode,
            resource,
            queue.group_mode
        );
        Ok(true)
    }

    /// Decide whether the requester may wait at all, then wait.
    ///
    /// A transaction may block only when it is older than every
    /// conflicting holder; one older holder anywhere in the set means
    /// the requester is the younger party and dies instead.
    fn wait_die<'a, F>(
        &self,
        txn: &Transaction,
        holders: &[TxnId],
        resource: ResourceId,
        mut table: MutexGuard<'a, LockTable>,
        wake: F,
    ) -> Result<MutexGuard<'a, LockTable>>
    where
        F: Fn(&LockRequestQueue) -> bool,
    {
        if holders.iter().any(|&holder| holder < txn.id()) {
            log::trace!(
                "txn {} dies on {} (conflicting older holder)",
                txn.id(),
                resource
            );
            return Err(DbError::abort(txn.id(), AbortReason::DeadlockPrevention));
        }

        let waiters = table
            .get(&resource)
            .expect("waiting on a resource with no queue")
            .waiters
            .clone();
        loop {
            {
                let queue = table
                    .get(&resource)
                    .expect("lock queue vanished while waiting");
                if wake(queue) {
                    return Ok(table);
                }
            }
            log::trace!("txn {} waiting on {}", txn.id(), resource);
            table = waiters.wait(table).unwrap();
        }
    }

    /// Gate every acquisition on the phase machine. `Ok(true)` to
    /// proceed (advancing `Default` to `Growing`), `Ok(false)` for the
    /// terminal no-op, `Err` when the transaction is already shrinking.
    fn check_state_for_lock(&self, txn: &Transaction) -> Result<bool> {
        match txn.state() {
            TxnState::Committed | TxnState::Aborted => Ok(false),
            TxnState::Default => {
                txn.set_state(TxnState::Growing);
                Ok(true)
            }
            TxnState::Growing => Ok(true),
            TxnState::Shrinking => {
                Err(DbError::abort(txn.id(), AbortReason::LockOnShrinking))
            }
        }
    }

    /// Gate every release on the phase machine: the first release moves
    /// the transaction into `Shrinking`.
    fn check_state_for_unlock(&self, txn: &Transaction) -> Result<bool> {
        match txn.state() {
            TxnState::Committed | TxnState::Aborted => Ok(false),
            TxnState::Default | TxnState::Growing => {
                txn.set_state(TxnState::Shrinking);
                Ok(true)
            }
            TxnState::Shrinking => Ok(true),
        }
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}
