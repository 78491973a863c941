//! Catalog - table id to table storage lookup.
//!
//! The catalog is the buffer pool's route from a [`PageId`] back to the
//! storage object that can read and write that page. It is a plain handle
//! owned by the [`Database`](crate::Database), never global state.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::buffer::BufferPool;
use crate::common::{PageId, TableId, TransactionId};
use crate::error::{Error, Result};
use crate::storage::{Page, Tuple};

/// Storage object backing one table.
///
/// Implementations own the page layout (slot headers, tuple widths) that
/// the buffer pool deliberately knows nothing about. The tuple mutation
/// methods receive the pool so they can route every page access through
/// [`BufferPool::get_page`] under the proper lock; they never touch their
/// backing file directly for reads of live pages.
pub trait Table: Send + Sync {
    /// Unique id of this table.
    fn id(&self) -> TableId;

    /// Read one page's bytes from the backing file.
    ///
    /// Fails with [`Error::TableMismatch`] if `pid` names a different table.
    fn read_page(&self, pid: PageId) -> Result<Page>;

    /// Write a page's current bytes back at its offset, growing the file
    /// when needed.
    fn write_page(&self, page: &Page) -> Result<()>;

    /// Number of pages currently in the backing file.
    fn page_count(&self) -> Result<u32>;

    /// Insert a tuple, acquiring exclusive page locks through `pool`.
    /// Returns the ids of every page the operation dirtied.
    fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<PageId>>;

    /// Delete a tuple by its record id, acquiring exclusive page locks
    /// through `pool`. Returns the ids of every page the operation dirtied.
    fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<PageId>>;
}

/// Registry of the tables the buffer pool can serve pages for.
#[derive(Default)]
pub struct Catalog {
    tables: RwLock<HashMap<TableId, Arc<dyn Table>>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table, replacing any previous registration for its id.
    pub fn register(&self, table: Arc<dyn Table>) {
        self.tables.write().insert(table.id(), table);
    }

    /// Remove a table from the catalog. Cached pages for it survive until
    /// discarded or evicted; flushing them afterwards fails.
    pub fn deregister(&self, id: TableId) -> Option<Arc<dyn Table>> {
        self.tables.write().remove(&id)
    }

    /// Look up the storage object for a table.
    pub fn get(&self, id: TableId) -> Result<Arc<dyn Table>> {
        self.tables
            .read()
            .get(&id)
            .cloned()
            .ok_or(Error::TableNotFound(id))
    }

    /// Ids of all registered tables.
    pub fn table_ids(&self) -> Vec<TableId> {
        self.tables.read().keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::HeapFile;
    use tempfile::tempdir;

    #[test]
    fn test_register_and_get() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::new();
        let table = Arc::new(HeapFile::open(TableId(1), dir.path().join("t.dat"), 64, 8).unwrap());

        catalog.register(table.clone());
        assert_eq!(catalog.get(TableId(1)).unwrap().id(), TableId(1));
        assert_eq!(catalog.table_ids(), vec![TableId(1)]);
    }

    #[test]
    fn test_missing_table() {
        let catalog = Catalog::new();
        assert!(matches!(
            catalog.get(TableId(9)),
            Err(Error::TableNotFound(TableId(9)))
        ));
    }

    #[test]
    fn test_deregister() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::new();
        let table = Arc::new(HeapFile::open(TableId(2), dir.path().join("t.dat"), 64, 8).unwrap());
        catalog.register(table);

        assert!(catalog.deregister(TableId(2)).is_some());
        assert!(catalog.get(TableId(2)).is_err());
    }
}
