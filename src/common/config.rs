//! Configuration for a pagelock database.

use std::time::Duration;

use crate::lock::DeadlockPolicy;

/// Default size of a page in bytes (4KB).
///
/// Matches the OS page size on most systems. Every page in a table's
/// backing file occupies exactly this many bytes at offset
/// `number * page_size`.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Default buffer pool capacity in pages.
pub const DEFAULT_CAPACITY: usize = 50;

/// Base bound on how long a `get_page` call waits for a lock before the
/// waiting transaction is aborted. Each call jitters its own deadline
/// around this value so competing waiters do not time out in lockstep.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(1000);

/// Construction-time configuration for a [`Database`](crate::Database).
///
/// The page size is fixed for the lifetime of the database; shrinking it is
/// test configuration only (small pages make eviction scenarios cheap to
/// drive).
#[derive(Debug, Clone)]
pub struct Config {
    /// Bytes per page, including any collaborator-owned header.
    pub page_size: usize,
    /// Maximum number of pages the buffer pool caches.
    pub capacity: usize,
    /// Base lock-wait bound before a waiter is aborted.
    pub lock_timeout: Duration,
    /// How lock waits detect or avoid deadlock.
    pub deadlock_policy: DeadlockPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            capacity: DEFAULT_CAPACITY,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            deadlock_policy: DeadlockPolicy::TimeoutOnly,
        }
    }
}

impl Config {
    /// Configuration with a non-default page size. Test configuration only.
    pub fn with_page_size(page_size: usize) -> Self {
        assert!(page_size > 0, "page_size must be > 0");
        Self {
            page_size,
            ..Self::default()
        }
    }

    /// Set the buffer pool capacity.
    pub fn capacity(mut self, capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be > 0");
        self.capacity = capacity;
        self
    }

    /// Set the base lock-wait bound.
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Set the deadlock policy.
    pub fn deadlock_policy(mut self, policy: DeadlockPolicy) -> Self {
        self.deadlock_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.page_size, 4096);
        assert_eq!(config.capacity, 50);
        assert_eq!(config.deadlock_policy, DeadlockPolicy::TimeoutOnly);
    }

    #[test]
    fn test_builder() {
        let config = Config::with_page_size(64)
            .capacity(2)
            .lock_timeout(Duration::from_millis(100))
            .deadlock_policy(DeadlockPolicy::WaitForGraph);
        assert_eq!(config.page_size, 64);
        assert_eq!(config.capacity, 2);
        assert_eq!(config.deadlock_policy, DeadlockPolicy::WaitForGraph);
    }

    #[test]
    #[should_panic(expected = "capacity must be > 0")]
    fn test_zero_capacity_rejected() {
        let _ = Config::default().capacity(0);
    }
}
