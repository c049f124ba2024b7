use crate::storage::page::PageId;
use std::fmt::Debug;

/// Victim selection policy of the buffer pool.
///
/// The pool reports every access and removal; the replacer only decides the
/// order in which resident pages are offered for eviction.
pub trait Replacer: Send + Debug {
    /// Records a use of `page_id`, tracking it if it is new.
    fn record_access(&mut self, page_id: PageId);

    /// Stops tracking `page_id`.
    fn remove(&mut self, page_id: PageId);

    /// Picks the first tracked page, in policy order, for which `evictable`
    /// returns true and stops tracking it. Returns None if no page qualifies.
    fn evict(&mut self, evictable: &mut dyn FnMut(PageId) -> bool) -> Option<PageId>;

    /// Number of tracked pages.
    fn size(&self) -> usize;
}
