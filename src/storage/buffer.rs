pub mod lru;
pub mod replacer;

use crate::access::tuple::Tuple;
use crate::catalog::{Catalog, TableId};
use crate::concurrency::{LockManager, LockMode};
use crate::config::StorageConfig;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::{PageId, PageRef};
use crate::transaction::TransactionId;
use log::{debug, warn};
use lru::LruReplacer;
use parking_lot::Mutex;
use rand::Rng;
use replacer::Replacer;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Resident pages and their eviction order. Guarded as one unit so a page
/// is never tracked by one and missing from the other.
#[derive(Debug)]
struct PageCache {
    pages: HashMap<PageId, PageRef>,
    replacer: Box<dyn Replacer>,
}

impl PageCache {
    /// Evicts pages until one more page fits.
    ///
    /// A page is a victim only if it is clean, no transaction holds it
    /// exclusively (its holder may be about to write it) and nobody holds
    /// its write guard. Dirty pages are never written out here, so
    /// uncommitted bytes only reach disk on commit.
    fn make_room(&mut self, capacity: usize, locks: &LockManager) -> StorageResult<()> {
        let PageCache { pages, replacer } = self;

        while pages.len() >= capacity {
            let mut evictable = |page_id: PageId| {
                if locks.is_exclusively_locked(page_id) {
                    return false;
                }
                pages.get(&page_id).map_or(true, |page| {
                    page.try_read()
                        .map_or(false, |page| page.is_dirty().is_none())
                })
            };

            match replacer.evict(&mut evictable) {
                Some(victim) => {
                    pages.remove(&victim);
                    debug!("evicted page {}", victim);
                }
                None => {
                    warn!("no evictable page among {} resident pages", pages.len());
                    return Err(StorageError::CacheExhausted { capacity });
                }
            }
        }

        Ok(())
    }

    fn admit(
        &mut self,
        page_id: PageId,
        page: PageRef,
        capacity: usize,
        locks: &LockManager,
    ) -> StorageResult<()> {
        if !self.pages.contains_key(&page_id) {
            self.make_room(capacity, locks)?;
        }
        self.pages.insert(page_id, page);
        self.replacer.record_access(page_id);
        Ok(())
    }

    fn remove(&mut self, page_id: PageId) -> Option<PageRef> {
        self.replacer.remove(page_id);
        self.pages.remove(&page_id)
    }
}

/// Page cache shared by every transaction, and the gate through which they
/// take page locks.
///
/// Every fetch first acquires the requested lock from the pool's
/// [`LockManager`], then serves the page from memory or loads it from the
/// owning table's file. Pages carrying uncommitted changes stay resident
/// until their transaction commits (they are flushed) or aborts (they are
/// reloaded from disk).
#[derive(Clone, Debug)]
pub struct BufferPool {
    inner: Arc<BufferPoolInner>,
}

#[derive(Debug)]
struct BufferPoolInner {
    catalog: Catalog,
    lock_manager: LockManager,
    cache: Mutex<PageCache>,
    capacity: usize,
    lock_wait: (Duration, Duration),
}

impl BufferPool {
    pub fn new(catalog: Catalog, config: &StorageConfig) -> Self {
        let replacer = Box::new(LruReplacer::new(config.buffer_pool_pages));
        Self::with_replacer(catalog, config, replacer)
    }

    pub fn with_replacer(
        catalog: Catalog,
        config: &StorageConfig,
        replacer: Box<dyn Replacer>,
    ) -> Self {
        Self {
            inner: Arc::new(BufferPoolInner {
                catalog,
                lock_manager: LockManager::new(),
                cache: Mutex::new(PageCache {
                    pages: HashMap::with_capacity(config.buffer_pool_pages),
                    replacer,
                }),
                capacity: config.buffer_pool_pages,
                lock_wait: config.lock_wait_range(),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.inner.lock_manager
    }

    /// Number of pages currently cached.
    pub fn resident_pages(&self) -> usize {
        self.inner.cache.lock().pages.len()
    }

    pub fn is_resident(&self, page_id: PageId) -> bool {
        self.inner.cache.lock().pages.contains_key(&page_id)
    }

    /// Random wait budget for one lock acquisition. Drawing a fresh budget
    /// per fetch keeps transactions caught in a deadlock from timing out in
    /// lockstep. An inverted range collapses to its lower bound.
    fn lock_wait_budget(&self) -> Duration {
        let (min, max) = self.inner.lock_wait;
        if max <= min {
            return min;
        }
        rand::thread_rng().gen_range(min..=max)
    }

    fn cached(&self, page_id: PageId) -> Option<PageRef> {
        self.inner.cache.lock().pages.get(&page_id).map(Arc::clone)
    }

    /// Locks `page_id` in `mode` on behalf of `tid` and returns the cached
    /// page, loading it from disk on a miss.
    ///
    /// Fails with [`StorageError::LockTimeout`] or
    /// [`StorageError::LockConflict`] when the lock cannot be granted, and
    /// with [`StorageError::CacheExhausted`] when the page is not resident
    /// and no resident page can be evicted. A lock granted before a later
    /// failure stays held until the transaction completes.
    pub fn fetch_page(
        &self,
        tid: TransactionId,
        page_id: PageId,
        mode: LockMode,
    ) -> StorageResult<PageRef> {
        let budget = self.lock_wait_budget();
        self.inner.lock_manager.acquire(tid, page_id, mode, budget)?;

        let mut cache = self.inner.cache.lock();
        if let Some(page) = cache.pages.get(&page_id).map(Arc::clone) {
            cache.replacer.record_access(page_id);
            return Ok(page);
        }

        let file = self.inner.catalog.get(page_id.table_id)?;
        let locks = &self.inner.lock_manager;
        cache.make_room(self.inner.capacity, locks)?;
        let page = file.read_page(page_id)?.into_ref();
        cache.admit(page_id, Arc::clone(&page), self.inner.capacity, locks)?;
        debug!("{} loaded page {} ({:?})", tid, page_id, mode);
        Ok(page)
    }

    /// Releases `tid`'s lock on one page before the transaction ends.
    ///
    /// Only sound when the transaction neither read nor wrote anything on
    /// the page under that lock.
    pub fn release_page(&self, tid: TransactionId, page_id: PageId) {
        self.inner.lock_manager.release(page_id, tid);
    }

    pub fn holds_lock(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.inner.lock_manager.holds_lock(page_id, tid)
    }

    /// Inserts `tuple` into table `table_id`. The modified page is left
    /// dirty on behalf of `tid`.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        table_id: TableId,
        tuple: &mut Tuple,
    ) -> StorageResult<()> {
        let file = self.inner.catalog.get(table_id)?;
        let pages = file.insert_tuple(self, tid, tuple)?;
        self.admit_modified(pages)
    }

    /// Deletes a stored tuple from the table its record id points into.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &mut Tuple) -> StorageResult<()> {
        let tuple_id = tuple.tuple_id.ok_or(StorageError::MissingRecordId)?;
        let file = self.inner.catalog.get(tuple_id.page_id.table_id)?;
        let pages = file.delete_tuple(self, tid, tuple)?;
        self.admit_modified(pages)
    }

    /// Makes sure the cache holds the pages an operation modified. The
    /// pages are already marked dirty by the heap file.
    fn admit_modified(&self, pages: Vec<PageRef>) -> StorageResult<()> {
        let pages: Vec<(PageId, PageRef)> = pages
            .into_iter()
            .map(|page| {
                let page_id = page.read().id();
                (page_id, page)
            })
            .collect();

        let mut cache = self.inner.cache.lock();
        for (page_id, page) in pages {
            cache.admit(page_id, page, self.inner.capacity, &self.inner.lock_manager)?;
        }
        Ok(())
    }

    /// Writes one resident page back if it is dirty, marking it clean.
    pub fn flush_page(&self, page_id: PageId) -> StorageResult<()> {
        let Some(page) = self.cached(page_id) else {
            return Ok(());
        };

        let mut guard = page.write();
        if guard.is_dirty().is_some() {
            let file = self.inner.catalog.get(page_id.table_id)?;
            file.write_page(&guard)?;
            guard.mark_dirty(None);
        }
        Ok(())
    }

    /// Flushes every dirty page `tid` holds a lock on. Only exclusively
    /// held pages can carry its changes, so shared ones are skipped.
    pub fn flush_pages(&self, tid: TransactionId) -> StorageResult<()> {
        for page_id in self.exclusive_pages(tid) {
            self.flush_page(page_id)?;
        }
        Ok(())
    }

    fn exclusive_pages(&self, tid: TransactionId) -> Vec<PageId> {
        let locks = &self.inner.lock_manager;
        locks
            .pages_locked_by(tid)
            .into_iter()
            .filter(|&page_id| locks.lock_mode(page_id, tid) == Some(LockMode::Exclusive))
            .collect()
    }

    /// Writes every dirty resident page to disk.
    ///
    /// This bypasses transaction boundaries: calling it while a transaction
    /// is in flight makes its uncommitted changes durable.
    pub fn flush_all_pages(&self) -> StorageResult<()> {
        let page_ids: Vec<PageId> = self.inner.cache.lock().pages.keys().copied().collect();
        for page_id in page_ids {
            self.flush_page(page_id)?;
        }
        Ok(())
    }

    /// Drops a page from the cache without writing it back.
    pub fn discard_page(&self, page_id: PageId) {
        if self.inner.cache.lock().remove(page_id).is_some() {
            debug!("discarded page {}", page_id);
        }
    }

    /// Reloads from disk every resident page carrying `tid`'s changes.
    ///
    /// A page that cannot be reloaded is discarded instead: nothing wrote
    /// its uncommitted bytes to disk, so the next fetch sees the old
    /// contents. Every page is attempted and the first error is returned.
    fn restore_pages(&self, tid: TransactionId) -> StorageResult<()> {
        let mut first_error = None;

        for page_id in self.exclusive_pages(tid) {
            let Some(page) = self.cached(page_id) else {
                continue;
            };

            let mut guard = page.write();
            if guard.is_dirty() != Some(tid) {
                continue;
            }

            let reloaded = self
                .inner
                .catalog
                .get(page_id.table_id)
                .and_then(|file| file.read_page(page_id));
            match reloaded {
                Ok(fresh) => {
                    guard.restore_from(fresh);
                    debug!("{} restored page {}", tid, page_id);
                }
                Err(e) => {
                    warn!("{} could not reload page {}, discarding it: {}", tid, page_id, e);
                    drop(guard);
                    self.discard_page(page_id);
                    first_error.get_or_insert(e);
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    pub fn commit(&self, tid: TransactionId) -> StorageResult<()> {
        self.transaction_complete(tid, true)
    }

    pub fn abort(&self, tid: TransactionId) -> StorageResult<()> {
        self.transaction_complete(tid, false)
    }

    /// Ends `tid`: on commit its dirty pages are flushed, on abort they are
    /// restored from disk. Its locks are released afterwards.
    ///
    /// A failed flush keeps the locks, so the caller can retry or abort. An
    /// abort always releases them, even when it reports an error.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> StorageResult<()> {
        if commit {
            self.flush_pages(tid)?;
        } else {
            let restored = self.restore_pages(tid);
            self.inner.lock_manager.release_all(tid);
            debug!("{} aborted", tid);
            return restored;
        }
        self.inner.lock_manager.release_all(tid);
        debug!("{} committed", tid);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::schema::Schema;
    use crate::access::value::{DataType, Value};
    use anyhow::Result;
    use std::path::Path;
    use std::sync::mpsc;
    use std::thread;
    use tempfile::tempdir;

    const PAGE_SIZE: usize = 128;

    fn config(pages: usize) -> StorageConfig {
        StorageConfig::default()
            .with_page_size(PAGE_SIZE)
            .with_buffer_pool_pages(pages)
            .with_lock_wait(Duration::from_millis(20), Duration::from_millis(40))
    }

    fn table(catalog: &Catalog, dir: &Path, name: &str) -> Result<TableId> {
        let path = dir.join(format!("{}.dat", name));
        Ok(catalog.create_table(name, &path, Schema::new(vec![("n", DataType::Int32)]))?)
    }

    fn row(n: i32) -> Tuple {
        Tuple::new(vec![Value::from(n)])
    }

    /// Drops every cached page so a test starts from an empty cache.
    fn clear(pool: &BufferPool, tables: &[TableId]) {
        for &table_id in tables {
            pool.discard_page(PageId::new(table_id, 0));
        }
    }

    /// Commits one row per table so each has a single page on disk.
    fn seed(pool: &BufferPool, tables: &[TableId]) -> Result<()> {
        let tid = TransactionId::new(100);
        for (n, &table_id) in tables.iter().enumerate() {
            pool.insert_tuple(tid, table_id, &mut row(n as i32))?;
            pool.commit(tid)?;
        }
        Ok(())
    }

    #[test]
    fn test_fetch_locks_and_caches() -> Result<()> {
        let dir = tempdir()?;
        let catalog = Catalog::new(PAGE_SIZE);
        let t = table(&catalog, dir.path(), "t")?;
        let pool = BufferPool::new(catalog, &config(4));
        seed(&pool, &[t])?;
        pool.discard_page(PageId::new(t, 0));
        assert_eq!(pool.resident_pages(), 0);

        let tid = TransactionId::new(1);
        let page_id = PageId::new(t, 0);
        let first = pool.fetch_page(tid, page_id, LockMode::Shared)?;
        let second = pool.fetch_page(tid, page_id, LockMode::Shared)?;

        assert!(Arc::ptr_eq(&first, &second));
        assert!(pool.holds_lock(tid, page_id));
        assert!(pool.is_resident(page_id));
        assert_eq!(first.read().heap_page().tuple_count(), 1);

        Ok(())
    }

    #[test]
    fn test_fetch_missing_page_fails() -> Result<()> {
        let dir = tempdir()?;
        let catalog = Catalog::new(PAGE_SIZE);
        let t = table(&catalog, dir.path(), "t")?;
        let pool = BufferPool::new(catalog, &config(4));

        let result = pool.fetch_page(TransactionId::new(1), PageId::new(t, 0), LockMode::Shared);
        assert!(matches!(result, Err(StorageError::StoreBounds { .. })));

        let result = pool.fetch_page(TransactionId::new(1), PageId::new(99, 0), LockMode::Shared);
        assert!(matches!(result, Err(StorageError::UnknownStore(99))));

        Ok(())
    }

    #[test]
    fn test_clean_pages_are_evicted_in_lru_order() -> Result<()> {
        let dir = tempdir()?;
        let catalog = Catalog::new(PAGE_SIZE);
        let tables = vec![
            table(&catalog, dir.path(), "a")?,
            table(&catalog, dir.path(), "b")?,
            table(&catalog, dir.path(), "c")?,
        ];
        let pool = BufferPool::new(catalog, &config(2));
        seed(&pool, &tables)?;

        let tid = TransactionId::new(1);
        for &t in &tables {
            pool.fetch_page(tid, PageId::new(t, 0), LockMode::Shared)?;
            assert!(pool.resident_pages() <= pool.capacity());
        }

        assert!(!pool.is_resident(PageId::new(tables[0], 0)));
        assert!(pool.is_resident(PageId::new(tables[1], 0)));
        assert!(pool.is_resident(PageId::new(tables[2], 0)));

        Ok(())
    }

    #[test]
    fn test_all_dirty_pages_exhaust_cache() -> Result<()> {
        let dir = tempdir()?;
        let catalog = Catalog::new(PAGE_SIZE);
        let a = table(&catalog, dir.path(), "a")?;
        let b = table(&catalog, dir.path(), "b")?;
        let pool = BufferPool::new(catalog, &config(1));
        seed(&pool, &[b])?;

        let tid = TransactionId::new(1);
        pool.insert_tuple(tid, a, &mut row(1))?;
        assert_eq!(pool.resident_pages(), 1);

        let result = pool.fetch_page(tid, PageId::new(b, 0), LockMode::Shared);
        assert!(matches!(
            result,
            Err(StorageError::CacheExhausted { capacity: 1 })
        ));
        assert!(pool.is_resident(PageId::new(a, 0)));

        Ok(())
    }

    #[test]
    fn test_clean_victim_is_chosen_over_dirty_page() -> Result<()> {
        let dir = tempdir()?;
        let catalog = Catalog::new(PAGE_SIZE);
        let tables = vec![
            table(&catalog, dir.path(), "a")?,
            table(&catalog, dir.path(), "b")?,
            table(&catalog, dir.path(), "c")?,
        ];
        let pool = BufferPool::new(catalog, &config(2));
        seed(&pool, &tables)?;
        clear(&pool, &tables);
        let [a, b, c] = [0, 1, 2].map(|i| PageId::new(tables[i], 0));

        // `a` is the least recently used page but carries changes.
        let writer = TransactionId::new(1);
        pool.insert_tuple(writer, tables[0], &mut row(10))?;
        let reader = TransactionId::new(2);
        pool.fetch_page(reader, b, LockMode::Shared)?;
        pool.commit(reader)?;

        pool.fetch_page(TransactionId::new(3), c, LockMode::Shared)?;

        assert!(pool.is_resident(a));
        assert!(!pool.is_resident(b));
        assert!(pool.is_resident(c));
        let page = pool.fetch_page(writer, a, LockMode::Shared)?;
        assert_eq!(page.read().is_dirty(), Some(writer));
        assert_eq!(page.read().heap_page().tuple_count(), 2);

        Ok(())
    }

    #[test]
    fn test_exclusively_locked_page_is_not_evicted() -> Result<()> {
        let dir = tempdir()?;
        let catalog = Catalog::new(PAGE_SIZE);
        let tables = vec![
            table(&catalog, dir.path(), "a")?,
            table(&catalog, dir.path(), "b")?,
            table(&catalog, dir.path(), "c")?,
        ];
        let pool = BufferPool::new(catalog, &config(2));
        seed(&pool, &tables)?;
        clear(&pool, &tables);
        let [a, b, c] = [0, 1, 2].map(|i| PageId::new(tables[i], 0));

        // Clean, but its holder may write it at any moment.
        let writer = TransactionId::new(1);
        pool.fetch_page(writer, a, LockMode::Exclusive)?;
        let reader = TransactionId::new(2);
        pool.fetch_page(reader, b, LockMode::Shared)?;
        pool.commit(reader)?;

        pool.fetch_page(TransactionId::new(3), c, LockMode::Shared)?;
        assert!(pool.is_resident(a));
        assert!(!pool.is_resident(b));

        Ok(())
    }

    #[test]
    fn test_fetch_while_holding_a_page_guard() -> Result<()> {
        let dir = tempdir()?;
        let catalog = Catalog::new(PAGE_SIZE);
        let tables = vec![
            table(&catalog, dir.path(), "a")?,
            table(&catalog, dir.path(), "b")?,
            table(&catalog, dir.path(), "c")?,
        ];
        let pool = BufferPool::new(catalog, &config(2));
        seed(&pool, &tables)?;
        clear(&pool, &tables);
        let [a, b, c] = [0, 1, 2].map(|i| PageId::new(tables[i], 0));

        let (tx, rx) = mpsc::channel();
        let worker = {
            let pool = pool.clone();
            thread::spawn(move || {
                let tid = TransactionId::new(1);
                let result = pool.fetch_page(tid, a, LockMode::Shared).and_then(|page| {
                    let _guard = page.write();
                    pool.fetch_page(tid, b, LockMode::Shared)?;
                    pool.fetch_page(tid, c, LockMode::Shared)?;
                    Ok(pool.is_resident(a) && !pool.is_resident(b))
                });
                let _ = tx.send(result);
            })
        };

        // The guarded page is skipped, so `b` makes room for `c`.
        assert!(rx.recv_timeout(Duration::from_secs(5))??);
        worker
            .join()
            .map_err(|_| anyhow::anyhow!("fetching thread panicked"))?;

        Ok(())
    }

    #[test]
    fn test_inverted_lock_wait_range_is_clamped() -> Result<()> {
        let dir = tempdir()?;
        let catalog = Catalog::new(PAGE_SIZE);
        let t = table(&catalog, dir.path(), "t")?;
        let mut config = config(4);
        config.lock_wait_min_ms = 40;
        config.lock_wait_max_ms = 10;
        let pool = BufferPool::new(catalog, &config);
        seed(&pool, &[t])?;
        let page_id = PageId::new(t, 0);

        pool.fetch_page(TransactionId::new(1), page_id, LockMode::Exclusive)?;
        let result = pool.fetch_page(TransactionId::new(2), page_id, LockMode::Shared);
        assert!(matches!(result, Err(StorageError::LockTimeout { .. })));

        Ok(())
    }

    #[test]
    fn test_commit_flushes_dirty_pages() -> Result<()> {
        let dir = tempdir()?;
        let catalog = Catalog::new(PAGE_SIZE);
        let t = table(&catalog, dir.path(), "t")?;
        let pool = BufferPool::new(catalog.clone(), &config(4));
        let file = catalog.get(t)?;
        let page_id = PageId::new(t, 0);

        let tid = TransactionId::new(1);
        pool.insert_tuple(tid, t, &mut row(42))?;

        // Not on disk before commit.
        assert_eq!(file.read_page(page_id)?.heap_page().tuple_count(), 0);

        pool.commit(tid)?;
        assert_eq!(file.read_page(page_id)?.heap_page().tuple_count(), 1);
        assert!(!pool.holds_lock(tid, page_id));

        let page = pool.fetch_page(TransactionId::new(2), page_id, LockMode::Shared)?;
        assert_eq!(page.read().is_dirty(), None);

        Ok(())
    }

    #[test]
    fn test_abort_restores_pages_from_disk() -> Result<()> {
        let dir = tempdir()?;
        let catalog = Catalog::new(PAGE_SIZE);
        let t = table(&catalog, dir.path(), "t")?;
        let pool = BufferPool::new(catalog.clone(), &config(4));
        seed(&pool, &[t])?;
        let page_id = PageId::new(t, 0);

        let tid = TransactionId::new(1);
        pool.insert_tuple(tid, t, &mut row(7))?;
        pool.abort(tid)?;
        assert!(!pool.holds_lock(tid, page_id));

        let reader = TransactionId::new(2);
        let page = pool.fetch_page(reader, page_id, LockMode::Shared)?;
        let on_disk = catalog.get(t)?.read_page(page_id)?;
        assert_eq!(page.read().data(), on_disk.data());
        assert_eq!(page.read().heap_page().tuple_count(), 1);

        Ok(())
    }

    #[test]
    fn test_abort_leaves_other_transactions_pages() -> Result<()> {
        let dir = tempdir()?;
        let catalog = Catalog::new(PAGE_SIZE);
        let a = table(&catalog, dir.path(), "a")?;
        let b = table(&catalog, dir.path(), "b")?;
        let pool = BufferPool::new(catalog, &config(4));

        let keeper = TransactionId::new(1);
        let loser = TransactionId::new(2);
        pool.insert_tuple(keeper, a, &mut row(1))?;
        pool.insert_tuple(loser, b, &mut row(2))?;
        pool.abort(loser)?;

        let page = pool.fetch_page(keeper, PageId::new(a, 0), LockMode::Shared)?;
        assert_eq!(page.read().is_dirty(), Some(keeper));
        assert_eq!(page.read().heap_page().tuple_count(), 1);

        Ok(())
    }

    #[test]
    fn test_abort_does_not_wait_for_other_readers() -> Result<()> {
        let dir = tempdir()?;
        let catalog = Catalog::new(PAGE_SIZE);
        let a = table(&catalog, dir.path(), "a")?;
        let b = table(&catalog, dir.path(), "b")?;
        let pool = BufferPool::new(catalog, &config(4));
        seed(&pool, &[a, b])?;

        let reader = TransactionId::new(1);
        let page = pool.fetch_page(reader, PageId::new(a, 0), LockMode::Shared)?;
        let guard = page.read();

        let writer = TransactionId::new(2);
        pool.insert_tuple(writer, b, &mut row(9))?;

        let (tx, rx) = mpsc::channel();
        let aborter = {
            let pool = pool.clone();
            thread::spawn(move || {
                let _ = tx.send(pool.abort(writer));
            })
        };

        rx.recv_timeout(Duration::from_secs(5))??;
        drop(guard);
        aborter
            .join()
            .map_err(|_| anyhow::anyhow!("aborting thread panicked"))?;

        assert!(!pool.holds_lock(writer, PageId::new(b, 0)));
        assert_eq!(page.read().heap_page().tuple_count(), 1);

        Ok(())
    }

    #[test]
    fn test_failed_reload_still_releases_locks() -> Result<()> {
        let dir = tempdir()?;
        let catalog = Catalog::new(PAGE_SIZE);
        let t = table(&catalog, dir.path(), "t")?;
        let u = table(&catalog, dir.path(), "u")?;
        let pool = BufferPool::new(catalog, &config(4));
        let (t0, u0) = (PageId::new(t, 0), PageId::new(u, 0));

        let tid = TransactionId::new(1);
        pool.insert_tuple(tid, t, &mut row(1))?;
        pool.insert_tuple(tid, u, &mut row(2))?;

        // The appended page vanishes from disk before the abort.
        std::fs::OpenOptions::new()
            .write(true)
            .open(dir.path().join("t.dat"))?
            .set_len(0)?;

        let result = pool.abort(tid);
        assert!(matches!(result, Err(StorageError::StoreBounds { .. })));
        assert!(pool.lock_manager().pages_locked_by(tid).is_empty());
        assert!(!pool.is_resident(t0));

        // The other page was still restored.
        let page = pool.fetch_page(TransactionId::new(2), u0, LockMode::Shared)?;
        assert_eq!(page.read().is_dirty(), None);
        assert_eq!(page.read().heap_page().tuple_count(), 0);

        Ok(())
    }

    #[test]
    fn test_conflicting_fetch_times_out() -> Result<()> {
        let dir = tempdir()?;
        let catalog = Catalog::new(PAGE_SIZE);
        let t = table(&catalog, dir.path(), "t")?;
        let pool = BufferPool::new(catalog, &config(4));
        seed(&pool, &[t])?;
        let page_id = PageId::new(t, 0);

        pool.fetch_page(TransactionId::new(1), page_id, LockMode::Exclusive)?;
        let result = pool.fetch_page(TransactionId::new(2), page_id, LockMode::Shared);

        match result {
            Err(err @ StorageError::LockTimeout { .. }) => assert!(err.is_abort_required()),
            other => panic!("expected a lock timeout, got {:?}", other),
        }

        Ok(())
    }

    #[test]
    fn test_flush_all_and_discard() -> Result<()> {
        let dir = tempdir()?;
        let catalog = Catalog::new(PAGE_SIZE);
        let t = table(&catalog, dir.path(), "t")?;
        let pool = BufferPool::new(catalog.clone(), &config(4));
        let page_id = PageId::new(t, 0);

        let tid = TransactionId::new(1);
        pool.insert_tuple(tid, t, &mut row(5))?;
        pool.flush_all_pages()?;
        assert_eq!(catalog.get(t)?.read_page(page_id)?.heap_page().tuple_count(), 1);

        pool.discard_page(page_id);
        assert!(!pool.is_resident(page_id));
        assert_eq!(pool.resident_pages(), 0);

        Ok(())
    }
}
