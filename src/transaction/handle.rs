use super::id::TransactionId;
use crate::access::scan::TableScanner;
use crate::access::tuple::Tuple;
use crate::catalog::TableId;
use crate::concurrency::LockMode;
use crate::storage::buffer::BufferPool;
use crate::storage::error::StorageResult;
use crate::storage::page::{PageId, PageRef};
use log::warn;

/// Handle to one running transaction.
///
/// Every operation runs under the handle's id. Dropping a handle that was
/// never committed or aborted aborts it.
pub struct Transaction {
    id: TransactionId,
    pool: BufferPool,
    completed: bool,
}

impl Transaction {
    pub(crate) fn new(id: TransactionId, pool: BufferPool) -> Self {
        Self {
            id,
            pool,
            completed: false,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn insert(&self, table_id: TableId, tuple: &mut Tuple) -> StorageResult<()> {
        self.pool.insert_tuple(self.id, table_id, tuple)
    }

    pub fn delete(&self, tuple: &mut Tuple) -> StorageResult<()> {
        self.pool.delete_tuple(self.id, tuple)
    }

    pub fn scan(&self, table_id: TableId) -> StorageResult<TableScanner> {
        let file = self.pool.catalog().get(table_id)?;
        Ok(file.scan(&self.pool, self.id))
    }

    pub fn fetch_page(&self, page_id: PageId, mode: LockMode) -> StorageResult<PageRef> {
        self.pool.fetch_page(self.id, page_id, mode)
    }

    /// Makes the transaction's changes durable and releases its locks.
    ///
    /// On failure the handle is dropped and the transaction aborted.
    pub fn commit(mut self) -> StorageResult<()> {
        self.pool.commit(self.id)?;
        self.completed = true;
        Ok(())
    }

    /// Discards the transaction's changes and releases its locks.
    pub fn abort(mut self) -> StorageResult<()> {
        self.completed = true;
        self.pool.abort(self.id)
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.completed {
            if let Err(e) = self.pool.abort(self.id) {
                warn!("{} failed to abort on drop: {}", self.id, e);
            }
        }
    }
}
