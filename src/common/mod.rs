//! Common types shared across pagelock.
//!
//! Fundamental primitives used throughout the codebase:
//! - Configuration (page size, capacity, lock timeout)
//! - Identifiers (TableId, PageId, TransactionId)

pub mod config;
mod page_id;
mod transaction_id;

pub use config::Config;
pub use page_id::{PageId, TableId};
pub use transaction_id::TransactionId;
