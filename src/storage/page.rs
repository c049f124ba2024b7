pub mod heap_page;

use crate::catalog::TableId;
use crate::transaction::TransactionId;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

pub use heap_page::HeapPage;

/// Identifies a page by the table that owns it and its position in the
/// table's backing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageId {
    pub table_id: TableId,
    pub page_no: u32,
}

impl PageId {
    pub fn new(table_id: TableId, page_no: u32) -> Self {
        Self { table_id, page_no }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table_id, self.page_no)
    }
}

/// An in-memory copy of one on-disk page.
///
/// `dirty` names the transaction whose uncommitted changes the bytes carry;
/// `None` means the bytes match the backing file.
#[derive(Debug, Clone)]
pub struct Page {
    id: PageId,
    data: Box<[u8]>,
    dirty: Option<TransactionId>,
}

/// Shared handle to a resident page.
///
/// The per-page `RwLock` only makes byte access sound; isolation between
/// transactions comes from the lock manager. Guards are short-lived: take
/// one to read or change bytes, and drop it before calling back into the
/// buffer pool. Eviction never waits on a guard, it skips the page instead,
/// and a page changed under a guard is marked dirty under that same guard.
pub type PageRef = Arc<RwLock<Page>>;

impl Page {
    pub fn new(id: PageId, data: Vec<u8>) -> Self {
        Self {
            id,
            data: data.into_boxed_slice(),
            dirty: None,
        }
    }

    /// A zero-filled page, which is also a valid empty heap page.
    pub fn empty(id: PageId, page_size: usize) -> Self {
        Self::new(id, vec![0u8; page_size])
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn is_dirty(&self) -> Option<TransactionId> {
        self.dirty
    }

    pub fn mark_dirty(&mut self, tid: Option<TransactionId>) {
        self.dirty = tid;
    }

    /// Replaces the page contents with `other`'s bytes and marks it clean.
    pub(crate) fn restore_from(&mut self, other: Page) {
        self.data = other.data;
        self.dirty = None;
    }

    pub fn heap_page(&self) -> HeapPage<&[u8]> {
        HeapPage::from_data(&self.data[..])
    }

    pub fn heap_page_mut(&mut self) -> HeapPage<&mut [u8]> {
        HeapPage::from_data(&mut self.data[..])
    }

    pub(crate) fn into_ref(self) -> PageRef {
        Arc::new(RwLock::new(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_id_value_semantics() {
        use std::collections::HashSet;

        let a = PageId::new(1, 5);
        let b = PageId::new(1, 5);
        let c = PageId::new(2, 5);

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert_eq!(a.to_string(), "1:5");
    }

    #[test]
    fn test_dirty_flag_tracks_owner() {
        let mut page = Page::empty(PageId::new(1, 0), 128);
        assert_eq!(page.is_dirty(), None);

        let tid = TransactionId::new(3);
        page.mark_dirty(Some(tid));
        assert_eq!(page.is_dirty(), Some(tid));

        page.data_mut()[0] = 0xFF;
        page.restore_from(Page::empty(PageId::new(1, 0), 128));
        assert_eq!(page.is_dirty(), None);
        assert_eq!(page.data()[0], 0);
    }
}
