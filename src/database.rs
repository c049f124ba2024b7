use crate::access::heap::HeapFile;
use crate::access::schema::Schema;
use crate::catalog::{Catalog, TableId};
use crate::config::StorageConfig;
use crate::storage::buffer::BufferPool;
use crate::storage::error::StorageResult;
use crate::transaction::{Transaction, TransactionIdGenerator};
use log::info;
use std::path::Path;
use std::sync::Arc;

/// Entry point tying the catalog, buffer pool and transaction ids together.
///
/// Dropping a database does not flush anything: committed changes are
/// already on disk, uncommitted ones are discarded.
pub struct Database {
    config: StorageConfig,
    catalog: Catalog,
    buffer_pool: BufferPool,
    txn_ids: TransactionIdGenerator,
}

impl Database {
    pub fn new(config: StorageConfig) -> StorageResult<Self> {
        config.validate()?;

        let catalog = Catalog::new(config.page_size);
        let buffer_pool = BufferPool::new(catalog.clone(), &config);
        info!(
            "database ready: {} byte pages, {} page buffer pool",
            config.page_size, config.buffer_pool_pages
        );

        Ok(Self {
            config,
            catalog,
            buffer_pool,
            txn_ids: TransactionIdGenerator::new(),
        })
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn buffer_pool(&self) -> &BufferPool {
        &self.buffer_pool
    }

    /// Creates an empty table backed by a new file at `path`.
    pub fn create_table(&self, name: &str, path: &Path, schema: Schema) -> StorageResult<TableId> {
        self.catalog.create_table(name, path, schema)
    }

    /// Registers an existing table file.
    pub fn open_table(&self, name: &str, path: &Path, schema: Schema) -> StorageResult<TableId> {
        self.catalog.open_table(name, path, schema)
    }

    pub fn table(&self, table_id: TableId) -> StorageResult<Arc<HeapFile>> {
        self.catalog.get(table_id)
    }

    /// Starts a transaction with a fresh id.
    pub fn begin(&self) -> Transaction {
        Transaction::new(self.txn_ids.next(), self.buffer_pool.clone())
    }
}
