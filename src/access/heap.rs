use crate::access::scan::TableScanner;
use crate::access::schema::Schema;
use crate::access::tuple::{Tuple, TupleId};
use crate::catalog::TableId;
use crate::concurrency::LockMode;
use crate::storage::buffer::BufferPool;
use crate::storage::disk::PageManager;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::heap_page::{HEADER_SIZE, SLOT_SIZE};
use crate::storage::page::{Page, PageId, PageRef};
use crate::transaction::TransactionId;
use log::debug;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

/// A table stored as an unordered collection of slotted pages in one file.
///
/// Raw page reads and writes go straight to disk. Tuple-level operations go
/// through the buffer pool so that every page they touch is locked on behalf
/// of the calling transaction.
#[derive(Debug)]
pub struct HeapFile {
    table_id: TableId,
    schema: Schema,
    page_manager: Mutex<PageManager>,
    page_size: usize,
}

impl HeapFile {
    pub fn create(
        table_id: TableId,
        path: &Path,
        schema: Schema,
        page_size: usize,
    ) -> StorageResult<Self> {
        Ok(Self {
            table_id,
            schema,
            page_manager: Mutex::new(PageManager::create(path, page_size)?),
            page_size,
        })
    }

    pub fn open(
        table_id: TableId,
        path: &Path,
        schema: Schema,
        page_size: usize,
    ) -> StorageResult<Self> {
        Ok(Self {
            table_id,
            schema,
            page_manager: Mutex::new(PageManager::open(path, page_size)?),
            page_size,
        })
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn num_pages(&self) -> StorageResult<u32> {
        self.page_manager.lock().num_pages()
    }

    pub fn read_page(&self, page_id: PageId) -> StorageResult<Page> {
        self.check_owner(page_id)?;
        self.page_manager.lock().load(page_id)
    }

    pub fn write_page(&self, page: &Page) -> StorageResult<()> {
        self.check_owner(page.id())?;
        self.page_manager.lock().write_page(page.id(), page.data())
    }

    fn check_owner(&self, page_id: PageId) -> StorageResult<()> {
        if page_id.table_id != self.table_id {
            return Err(StorageError::UnknownStore(page_id.table_id));
        }
        Ok(())
    }

    /// Stores `tuple` in the first page with room, appending a page when
    /// every existing one is full. Sets the tuple's record id and returns
    /// the page that was modified, already marked dirty by `tid`.
    pub fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> StorageResult<Vec<PageRef>> {
        let data = self.schema.encode(&tuple.values)?;
        let max_len = self.page_size - HEADER_SIZE - SLOT_SIZE;
        if data.len() > max_len {
            return Err(StorageError::PageFull {
                required: data.len(),
                available: max_len,
            });
        }

        for page_no in 0..self.num_pages()? {
            let page_id = PageId::new(self.table_id, page_no);
            let held_before = pool.holds_lock(tid, page_id);
            let page = pool.fetch_page(tid, page_id, LockMode::Exclusive)?;

            let slot_id = {
                let mut guard = page.write();
                let mut heap_page = guard.heap_page_mut();
                if heap_page.has_room_for(data.len()) {
                    let slot_id = heap_page.insert_tuple(&data)?;
                    guard.mark_dirty(Some(tid));
                    Some(slot_id)
                } else {
                    None
                }
            };

            match slot_id {
                Some(slot_id) => {
                    tuple.tuple_id = Some(TupleId::new(page_id, slot_id));
                    return Ok(vec![page]);
                }
                // Nothing was read or written under this lock.
                None if !held_before => pool.release_page(tid, page_id),
                None => {}
            }
        }

        let page_no = self.page_manager.lock().allocate_page()?;
        let page_id = PageId::new(self.table_id, page_no);
        debug!("{} grew table {} to page {}", tid, self.table_id, page_no);

        let page = pool.fetch_page(tid, page_id, LockMode::Exclusive)?;
        let slot_id = {
            let mut guard = page.write();
            let slot_id = guard.heap_page_mut().insert_tuple(&data)?;
            guard.mark_dirty(Some(tid));
            slot_id
        };
        tuple.tuple_id = Some(TupleId::new(page_id, slot_id));
        Ok(vec![page])
    }

    /// Removes a stored tuple and clears its record id. Returns the page
    /// that was modified, already marked dirty by `tid`.
    pub fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> StorageResult<Vec<PageRef>> {
        let tuple_id = tuple.tuple_id.ok_or(StorageError::MissingRecordId)?;
        self.check_owner(tuple_id.page_id)?;

        let page = pool.fetch_page(tid, tuple_id.page_id, LockMode::Exclusive)?;
        {
            let mut guard = page.write();
            guard.heap_page_mut().delete_tuple(tuple_id.slot_id)?;
            guard.mark_dirty(Some(tid));
        }
        tuple.tuple_id = None;
        Ok(vec![page])
    }

    /// Lazily iterates every tuple of the table in page order, taking a
    /// shared lock on each page as it is reached.
    pub fn scan(
        self: &Arc<Self>,
        pool: &BufferPool,
        tid: TransactionId,
    ) -> TableScanner {
        TableScanner::new(Arc::clone(self), pool.clone(), tid)
    }
}
