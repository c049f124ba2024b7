//! Table scanning functionality for sequential access.

use crate::access::heap::HeapFile;
use crate::access::tuple::{Tuple, TupleId};
use crate::concurrency::LockMode;
use crate::storage::buffer::BufferPool;
use crate::storage::error::StorageResult;
use crate::storage::page::PageId;
use crate::transaction::TransactionId;
use std::collections::VecDeque;
use std::sync::Arc;

/// Iterator over every tuple of a heap file, page by page.
///
/// Each page is fetched with a shared lock when the scan reaches it, so a
/// scan never sees another transaction's uncommitted rows. The page count is
/// re-read at each page boundary, so pages appended by the scanning
/// transaction itself are visited too.
pub struct TableScanner {
    file: Arc<HeapFile>,
    pool: BufferPool,
    tid: TransactionId,
    next_page: u32,
    buffered: VecDeque<Tuple>,
    failed: bool,
}

impl TableScanner {
    pub fn new(file: Arc<HeapFile>, pool: BufferPool, tid: TransactionId) -> Self {
        Self {
            file,
            pool,
            tid,
            next_page: 0,
            buffered: VecDeque::new(),
            failed: false,
        }
    }

    /// Restarts the scan from the first page.
    pub fn rewind(&mut self) {
        self.next_page = 0;
        self.buffered.clear();
        self.failed = false;
    }

    /// Loads the next page's tuples. Returns false once past the last page.
    fn load_next_page(&mut self) -> StorageResult<bool> {
        if self.next_page >= self.file.num_pages()? {
            return Ok(false);
        }

        let page_id = PageId::new(self.file.table_id(), self.next_page);
        let page = self.pool.fetch_page(self.tid, page_id, LockMode::Shared)?;
        let guard = page.read();
        let heap_page = guard.heap_page();
        heap_page.check()?;
        let schema = self.file.schema();

        for (slot_id, data) in heap_page.live_tuples() {
            let values = schema.decode(data)?;
            self.buffered
                .push_back(Tuple::stored_at(TupleId::new(page_id, slot_id), values));
        }

        self.next_page += 1;
        Ok(true)
    }
}

impl Iterator for TableScanner {
    type Item = StorageResult<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            if let Some(tuple) = self.buffered.pop_front() {
                return Some(Ok(tuple));
            }

            match self.load_next_page() {
                Ok(true) => continue,
                Ok(false) => return None,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
