//! Registry of open tables.
//!
//! Maps a table id to the heap file that stores it. Every page id carries
//! its table id, so the buffer pool resolves the backing file through here.

use crate::access::heap::HeapFile;
use crate::access::schema::Schema;
use crate::storage::error::{StorageError, StorageResult};
use dashmap::DashMap;
use log::info;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

pub type TableId = u32;

#[derive(Debug, Clone)]
pub struct TableInfo {
    pub table_id: TableId,
    pub table_name: String,
    pub schema: Schema,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    inner: Arc<CatalogInner>,
}

#[derive(Debug)]
struct CatalogInner {
    files: DashMap<TableId, Arc<HeapFile>>,
    names: DashMap<String, TableId>,
    next_table_id: AtomicU32,
    page_size: usize,
}

impl Catalog {
    pub fn new(page_size: usize) -> Self {
        Self {
            inner: Arc::new(CatalogInner {
                files: DashMap::new(),
                names: DashMap::new(),
                next_table_id: AtomicU32::new(1),
                page_size,
            }),
        }
    }

    pub fn page_size(&self) -> usize {
        self.inner.page_size
    }

    /// Creates (or truncates) the file at `path` and registers it as a table.
    pub fn create_table(&self, name: &str, path: &Path, schema: Schema) -> StorageResult<TableId> {
        let table_id = self.next_table_id();
        let file = HeapFile::create(table_id, path, schema, self.inner.page_size)?;
        self.register(name, file);
        info!("created table '{}' (id {}) at {}", name, table_id, path.display());
        Ok(table_id)
    }

    /// Registers an existing heap file as a table.
    pub fn open_table(&self, name: &str, path: &Path, schema: Schema) -> StorageResult<TableId> {
        let table_id = self.next_table_id();
        let file = HeapFile::open(table_id, path, schema, self.inner.page_size)?;
        self.register(name, file);
        info!("opened table '{}' (id {}) at {}", name, table_id, path.display());
        Ok(table_id)
    }

    fn next_table_id(&self) -> TableId {
        self.inner.next_table_id.fetch_add(1, Ordering::SeqCst)
    }

    fn register(&self, name: &str, file: HeapFile) {
        let table_id = file.table_id();
        if let Some(previous) = self.inner.names.insert(name.to_string(), table_id) {
            self.inner.files.remove(&previous);
        }
        self.inner.files.insert(table_id, Arc::new(file));
    }

    pub fn get(&self, table_id: TableId) -> StorageResult<Arc<HeapFile>> {
        self.inner
            .files
            .get(&table_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(StorageError::UnknownStore(table_id))
    }

    pub fn table_id(&self, name: &str) -> Option<TableId> {
        self.inner.names.get(name).map(|entry| *entry.value())
    }

    pub fn get_table(&self, name: &str) -> Option<TableInfo> {
        let table_id = self.table_id(name)?;
        let file = self.get(table_id).ok()?;
        Some(TableInfo {
            table_id,
            table_name: name.to_string(),
            schema: file.schema().clone(),
        })
    }

    pub fn list_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .names
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::value::DataType;
    use anyhow::Result;
    use tempfile::tempdir;

    fn schema() -> Schema {
        Schema::new(vec![("id", DataType::Int32)])
    }

    #[test]
    fn test_create_and_lookup() -> Result<()> {
        let dir = tempdir()?;
        let catalog = Catalog::new(4096);

        let users = catalog.create_table("users", &dir.path().join("users.dat"), schema())?;
        let orders = catalog.create_table("orders", &dir.path().join("orders.dat"), schema())?;
        assert_ne!(users, orders);

        assert_eq!(catalog.table_id("users"), Some(users));
        assert_eq!(catalog.get(orders)?.table_id(), orders);
        assert_eq!(catalog.list_tables(), vec!["orders", "users"]);

        let info = catalog.get_table("users").expect("users is registered");
        assert_eq!(info.schema, schema());

        Ok(())
    }

    #[test]
    fn test_unknown_table() {
        let catalog = Catalog::new(4096);
        assert!(matches!(
            catalog.get(42),
            Err(StorageError::UnknownStore(42))
        ));
        assert!(catalog.get_table("nope").is_none());
    }

    #[test]
    fn test_reregistering_a_name_replaces_it() -> Result<()> {
        let dir = tempdir()?;
        let catalog = Catalog::new(4096);
        let path = dir.path().join("t.dat");

        let first = catalog.create_table("t", &path, schema())?;
        let second = catalog.open_table("t", &path, schema())?;

        assert_eq!(catalog.table_id("t"), Some(second));
        assert!(catalog.get(first).is_err());

        Ok(())
    }
}
