//! Engine configuration.

use crate::storage::error::{StorageError, StorageResult};
use serde::Deserialize;
use std::time::Duration;

/// Default bytes per page.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Default number of resident pages in the buffer pool.
pub const DEFAULT_BUFFER_POOL_PAGES: usize = 50;

/// Largest page size whose offsets still fit the slot format.
pub const MAX_PAGE_SIZE: usize = 32 * 1024;

const MIN_PAGE_SIZE: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Bytes per page, for every table opened by one database.
    pub page_size: usize,
    /// Maximum number of pages resident in the buffer pool.
    pub buffer_pool_pages: usize,
    /// Lower bound of the randomized lock wait budget.
    pub lock_wait_min_ms: u64,
    /// Upper bound of the randomized lock wait budget.
    pub lock_wait_max_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            buffer_pool_pages: DEFAULT_BUFFER_POOL_PAGES,
            lock_wait_min_ms: 1000,
            lock_wait_max_ms: 3000,
        }
    }
}

impl StorageConfig {
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_buffer_pool_pages(mut self, pages: usize) -> Self {
        self.buffer_pool_pages = pages;
        self
    }

    pub fn with_lock_wait(mut self, min: Duration, max: Duration) -> Self {
        self.lock_wait_min_ms = min.as_millis() as u64;
        self.lock_wait_max_ms = max.as_millis() as u64;
        self
    }

    pub fn lock_wait_range(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.lock_wait_min_ms),
            Duration::from_millis(self.lock_wait_max_ms),
        )
    }

    pub fn validate(&self) -> StorageResult<()> {
        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(StorageError::InvalidConfig(format!(
                "page_size must be within {}..={}, got {}",
                MIN_PAGE_SIZE, MAX_PAGE_SIZE, self.page_size
            )));
        }

        if self.buffer_pool_pages == 0 {
            return Err(StorageError::InvalidConfig(
                "buffer_pool_pages must be at least 1".to_string(),
            ));
        }

        if self.lock_wait_min_ms > self.lock_wait_max_ms {
            return Err(StorageError::InvalidConfig(format!(
                "lock wait range is inverted: {}ms > {}ms",
                self.lock_wait_min_ms, self.lock_wait_max_ms
            )));
        }

        Ok(())
    }
}
