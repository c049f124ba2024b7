//! Page-level shared/exclusive locking.
//!
//! The lock table is guarded by a single mutex, so every grant, upgrade and
//! release is one atomic step. Blocked requesters sleep on a condition
//! variable that every release notifies, and give up once their wait budget
//! runs out. There is no wait-for graph: a timeout is how deadlocks are broken.

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::PageId;
use crate::transaction::TransactionId;
use log::{debug, warn};
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

/// Lock modes supported by the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Shared lock for read operations.
    Shared,
    /// Exclusive lock for write operations.
    Exclusive,
}

impl LockMode {
    /// Checks if this lock mode is compatible with another.
    pub fn is_compatible_with(&self, other: &LockMode) -> bool {
        matches!((self, other), (LockMode::Shared, LockMode::Shared))
    }
}

/// One transaction's hold on one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockRecord {
    pub tid: TransactionId,
    pub mode: LockMode,
}

/// Holders of a single page: either any number of shared records or exactly
/// one exclusive record.
#[derive(Debug, Default)]
struct LockInfo {
    holders: Vec<LockRecord>,
}

impl LockInfo {
    fn find(&self, tid: TransactionId) -> Option<&LockRecord> {
        self.holders.iter().find(|r| r.tid == tid)
    }

    fn find_mut(&mut self, tid: TransactionId) -> Option<&mut LockRecord> {
        self.holders.iter_mut().find(|r| r.tid == tid)
    }

    /// Checks if a new request is compatible with every current holder.
    fn is_compatible(&self, mode: LockMode) -> bool {
        self.holders.iter().all(|r| r.mode.is_compatible_with(&mode))
    }

    fn remove(&mut self, tid: TransactionId) -> bool {
        let before = self.holders.len();
        self.holders.retain(|r| r.tid != tid);
        self.holders.len() != before
    }
}

#[derive(Debug, Default)]
struct LockTable {
    pages: HashMap<PageId, LockInfo>,
    /// Reverse index: pages each transaction holds a lock on.
    transaction_locks: HashMap<TransactionId, HashSet<PageId>>,
}

impl LockTable {
    fn try_acquire(
        &mut self,
        tid: TransactionId,
        page_id: PageId,
        mode: LockMode,
    ) -> StorageResult<bool> {
        let granted = match self.pages.get_mut(&page_id) {
            None => {
                self.pages.insert(
                    page_id,
                    LockInfo {
                        holders: vec![LockRecord { tid, mode }],
                    },
                );
                true
            }
            Some(info) => {
                let sole_holder = info.holders.len() == 1;
                let compatible = info.is_compatible(mode);
                match info.find_mut(tid) {
                    Some(record) => match (record.mode, mode) {
                        (LockMode::Exclusive, _) | (LockMode::Shared, LockMode::Shared) => true,
                        (LockMode::Shared, LockMode::Exclusive) => {
                            if !sole_holder {
                                warn!("{} cannot upgrade lock on {}: page is shared", tid, page_id);
                                return Err(StorageError::LockConflict { tid, page_id });
                            }
                            record.mode = LockMode::Exclusive;
                            debug!("{} upgraded lock on {} to exclusive", tid, page_id);
                            true
                        }
                    },
                    None if compatible => {
                        info.holders.push(LockRecord { tid, mode });
                        true
                    }
                    None => false,
                }
            }
        };

        if granted {
            self.transaction_locks
                .entry(tid)
                .or_default()
                .insert(page_id);
        }
        Ok(granted)
    }

    fn release(&mut self, page_id: PageId, tid: TransactionId) -> bool {
        let Some(info) = self.pages.get_mut(&page_id) else {
            return false;
        };
        if !info.remove(tid) {
            return false;
        }
        if info.holders.is_empty() {
            self.pages.remove(&page_id);
        }

        if let Some(pages) = self.transaction_locks.get_mut(&tid) {
            pages.remove(&page_id);
            if pages.is_empty() {
                self.transaction_locks.remove(&tid);
            }
        }
        true
    }

    fn release_all(&mut self, tid: TransactionId) -> usize {
        let Some(pages) = self.transaction_locks.remove(&tid) else {
            return 0;
        };

        for page_id in &pages {
            if let Some(info) = self.pages.get_mut(page_id) {
                info.remove(tid);
                if info.holders.is_empty() {
                    self.pages.remove(page_id);
                }
            }
        }
        pages.len()
    }
}

/// Lock manager shared by every transaction of a buffer pool.
#[derive(Debug, Default)]
pub struct LockManager {
    table: Mutex<LockTable>,
    released: Condvar,
}

impl LockManager {
    /// Creates a new lock manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to take `mode` on `page_id` without waiting.
    ///
    /// Returns `Ok(false)` when another transaction's lock is in the way; the
    /// caller may retry later. Upgrading a shared lock that other
    /// transactions also hold fails with [`StorageError::LockConflict`].
    pub fn try_acquire(
        &self,
        tid: TransactionId,
        page_id: PageId,
        mode: LockMode,
    ) -> StorageResult<bool> {
        self.table.lock().try_acquire(tid, page_id, mode)
    }

    /// Takes `mode` on `page_id`, sleeping until a release makes the grant
    /// possible or `timeout` elapses.
    pub fn acquire(
        &self,
        tid: TransactionId,
        page_id: PageId,
        mode: LockMode,
        timeout: Duration,
    ) -> StorageResult<()> {
        let start = Instant::now();
        let deadline = start + timeout;
        let mut table = self.table.lock();

        loop {
            if table.try_acquire(tid, page_id, mode)? {
                return Ok(());
            }

            debug!("{} waiting for {:?} lock on {}", tid, mode, page_id);
            if self.released.wait_until(&mut table, deadline).timed_out() {
                // One last attempt: the release may have raced the deadline.
                if table.try_acquire(tid, page_id, mode)? {
                    return Ok(());
                }
                let waited = start.elapsed();
                warn!(
                    "{} timed out after {:?} waiting for {:?} lock on {}",
                    tid, waited, mode, page_id
                );
                return Err(StorageError::LockTimeout {
                    tid,
                    page_id,
                    waited,
                });
            }
        }
    }

    /// Releases `tid`'s lock on a single page.
    pub fn release(&self, page_id: PageId, tid: TransactionId) {
        if self.table.lock().release(page_id, tid) {
            self.released.notify_all();
        }
    }

    /// Releases every lock held by `tid`.
    pub fn release_all(&self, tid: TransactionId) {
        let released = self.table.lock().release_all(tid);
        if released > 0 {
            debug!("{} released {} page locks", tid, released);
            self.released.notify_all();
        }
    }

    /// Checks if `tid` holds any lock on `page_id`.
    pub fn holds_lock(&self, page_id: PageId, tid: TransactionId) -> bool {
        self.lock_mode(page_id, tid).is_some()
    }

    /// Checks if some transaction holds an exclusive lock on `page_id`.
    pub fn is_exclusively_locked(&self, page_id: PageId) -> bool {
        let table = self.table.lock();
        table.pages.get(&page_id).map_or(false, |info| {
            info.holders.iter().any(|r| r.mode == LockMode::Exclusive)
        })
    }

    pub fn lock_mode(&self, page_id: PageId, tid: TransactionId) -> Option<LockMode> {
        let table = self.table.lock();
        table
            .pages
            .get(&page_id)
            .and_then(|info| info.find(tid))
            .map(|record| record.mode)
    }

    /// Snapshot of the records currently held on `page_id`.
    pub fn holders(&self, page_id: PageId) -> Vec<LockRecord> {
        let table = self.table.lock();
        table
            .pages
            .get(&page_id)
            .map(|info| info.holders.clone())
            .unwrap_or_default()
    }

    /// Pages on which `tid` currently holds a lock.
    pub fn pages_locked_by(&self, tid: TransactionId) -> Vec<PageId> {
        let table = self.table.lock();
        let mut pages: Vec<PageId> = table
            .transaction_locks
            .get(&tid)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        pages.sort();
        pages
    }
}
