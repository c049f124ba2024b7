//! Storage layer.
//!
//! - **PageManager**: fixed-size page I/O over one flat file per table
//! - **Page**: in-memory page image tagged with the transaction that dirtied it
//! - **HeapPage**: slotted layout for variable-length tuples
//! - **BufferPool**: bounded page cache that takes page locks on every fetch

pub mod buffer;
pub mod disk;
pub mod error;
pub mod page;

pub use buffer::BufferPool;
pub use disk::PageManager;
pub use error::{StorageError, StorageResult};
pub use page::{HeapPage, Page, PageId, PageRef};
