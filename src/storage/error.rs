//! Storage layer error types.

use crate::catalog::TableId;
use crate::storage::page::PageId;
use crate::transaction::TransactionId;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur in the storage layer.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("{tid} cannot upgrade its lock on {page_id}: other transactions share it")]
    LockConflict { tid: TransactionId, page_id: PageId },

    #[error("{tid} gave up waiting for a lock on {page_id} after {waited:?}")]
    LockTimeout {
        tid: TransactionId,
        page_id: PageId,
        waited: Duration,
    },

    #[error("Buffer pool exhausted: none of the {capacity} resident pages can be evicted")]
    CacheExhausted { capacity: usize },

    #[error("Page {page_id} is outside the store ({page_count} pages)")]
    StoreBounds { page_id: PageId, page_count: u32 },

    #[error("Tuple not found: slot {slot_id} is empty or deleted")]
    TupleNotFound { slot_id: u16 },

    #[error("Invalid slot ID: {slot_id} (max: {max_slot})")]
    InvalidSlotId { slot_id: u16, max_slot: u16 },

    #[error("Page is full: requires {required} bytes but only {available} available")]
    PageFull { required: usize, available: usize },

    #[error("Buffer is {actual} bytes but pages are {expected} bytes")]
    PageSizeMismatch { expected: usize, actual: usize },

    #[error("No table registered with id {0}")]
    UnknownStore(TableId),

    #[error("Tuple has no record id")]
    MissingRecordId,

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Corrupted data: {0}")]
    Corrupted(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Whether the failing transaction has to be aborted before it can make
    /// further progress.
    pub fn is_abort_required(&self) -> bool {
        matches!(
            self,
            StorageError::LockConflict { .. } | StorageError::LockTimeout { .. }
        )
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
