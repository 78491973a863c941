//! pagelock - transactional page cache with strict two-phase locking.
//!
//! The storage and concurrency core of a single-node relational engine: a
//! fixed-capacity page cache (buffer pool) mediating all disk access, and a
//! per-page shared/exclusive lock manager enforcing strict 2PL over it.
//!
//! # Architecture
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        Database                          │
//! │  ┌────────────┐        ┌──────────────────────────────┐  │
//! │  │  Catalog   │◀───────│          BufferPool          │  │
//! │  │ TableId →  │        │  cache: PageId → Page        │  │
//! │  │ table file │        │  ┌────────────────────────┐  │  │
//! │  └─────┬──────┘        │  │      LockManager       │  │  │
//! │        │               │  │ shared set / exclusive │  │  │
//! │        ▼               │  └────────────────────────┘  │  │
//! │  ┌────────────┐        └──────────────┬───────────────┘  │
//! │  │  HeapFile  │  read_page/write_page │                  │
//! │  │ PageStore  │◀──────────────────────┘                  │
//! │  └────────────┘                                          │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Callers ask the pool for a page under a permission level; the pool
//! blocks until the lock manager grants the lock (or aborts the waiter),
//! serves the page from cache or disk, and at transaction end either
//! flushes the transaction's dirty pages (commit) or restores their
//! before-images (abort) before releasing all of its locks.
//!
//! # Quick start
//! ```no_run
//! use pagelock::{Config, Database, Permissions, TableId, TransactionId, Tuple};
//!
//! let db = Database::new(Config::default());
//! let table = db.add_heap_table(TableId(1), "users.dat", 16).unwrap();
//!
//! let tid = TransactionId::new();
//! let mut tuple = Tuple::new(vec![0u8; 16]);
//! db.pool().insert_tuple(tid, TableId(1), &mut tuple).unwrap();
//! db.pool().transaction_complete(tid, true).unwrap();
//! ```

pub mod buffer;
pub mod catalog;
pub mod common;
pub mod database;
pub mod error;
pub mod lock;
pub mod storage;

// Re-export commonly used items at crate root for convenience.
pub use buffer::{BufferPool, PageRef, Permissions};
pub use catalog::{Catalog, Table};
pub use common::{Config, PageId, TableId, TransactionId};
pub use database::Database;
pub use error::{AbortReason, Error, Result};
pub use lock::{DeadlockPolicy, LockManager, LockMode};
pub use storage::{HeapFile, Page, PageStore, RecordId, Tuple};
