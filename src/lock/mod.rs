//! Per-page shared/exclusive locking with deadlock handling.

mod manager;

pub use manager::{DeadlockPolicy, LockManager, LockMode};
