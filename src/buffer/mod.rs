//! Buffer pool: the bounded page cache and gatekeeper for all storage
//! access.

mod pool;

pub use pool::{BufferPool, PageRef, Permissions};
