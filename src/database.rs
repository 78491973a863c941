//! Database - the single long-lived handle owning catalog and buffer pool.
//!
//! A [`Database`] is constructed once per process and passed explicitly to
//! every collaborator; nothing in this crate reaches for global state. The
//! lock manager lives inside the buffer pool, which routes every page
//! access through it.

use std::path::Path;
use std::sync::Arc;

use crate::buffer::BufferPool;
use crate::catalog::{Catalog, Table};
use crate::common::{Config, TableId};
use crate::error::Result;
use crate::storage::HeapFile;

/// Owner of the storage/concurrency core: catalog plus buffer pool.
pub struct Database {
    catalog: Arc<Catalog>,
    pool: BufferPool,
    config: Config,
}

impl Database {
    pub fn new(config: Config) -> Self {
        let catalog = Arc::new(Catalog::new());
        let pool = BufferPool::new(&config, Arc::clone(&catalog));
        Self {
            catalog,
            pool,
            config,
        }
    }

    /// Register an already-constructed table.
    pub fn add_table(&self, table: Arc<dyn Table>) {
        self.catalog.register(table);
    }

    /// Open a heap file with this database's page size and register it.
    pub fn add_heap_table<P: AsRef<Path>>(
        &self,
        id: TableId,
        path: P,
        tuple_width: usize,
    ) -> Result<Arc<HeapFile>> {
        let table = Arc::new(HeapFile::open(id, path, self.config.page_size, tuple_width)?);
        self.catalog.register(table.clone());
        Ok(table)
    }

    #[inline]
    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    #[inline]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Bytes per page for this database.
    #[inline]
    pub fn page_size(&self) -> usize {
        self.config.page_size
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
