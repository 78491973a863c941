//! Buffer pool - the capacity-bounded page cache.
//!
//! Every page access goes through [`BufferPool::get_page`], which blocks
//! (bounded retry with jitter) until the lock manager grants the requested
//! permission, then serves the page from cache or fetches it from the
//! owning table's page store, evicting a clean page if the cache is full.
//!
//! The cache uses a no-steal write policy: a page dirtied by an uncommitted
//! transaction is never written to the page store and never evicted, which
//! is what makes before-image rollback sufficient for in-process abort.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use rand::Rng;

use crate::catalog::Catalog;
use crate::common::{Config, PageId, TableId, TransactionId};
use crate::error::{AbortReason, Error, Result};
use crate::lock::{LockManager, LockMode};
use crate::storage::{Page, Tuple};

/// Permission level a caller requests on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permissions {
    /// Shared read access.
    ReadOnly,
    /// Exclusive access; the page is marked dirty for the requester.
    ReadWrite,
}

impl From<Permissions> for LockMode {
    fn from(perm: Permissions) -> Self {
        match perm {
            Permissions::ReadOnly => LockMode::Shared,
            Permissions::ReadWrite => LockMode::Exclusive,
        }
    }
}

/// Shared handle to a cached page.
///
/// The `RwLock` guards the in-memory structure only; transactional
/// isolation comes from the page lock the holder already acquired through
/// `get_page`.
pub type PageRef = Arc<RwLock<Page>>;

/// Cache map plus access order, guarded as one unit so compound sequences
/// ("check capacity, evict, insert") never interleave between threads.
struct PoolState {
    pages: HashMap<PageId, PageRef>,
    /// Access order, front = oldest. A page moves to the back on every
    /// access; eviction scans from the front.
    order: VecDeque<PageId>,
}

/// The bounded page cache and transaction-end flush/rollback protocol.
pub struct BufferPool {
    state: Mutex<PoolState>,
    locks: LockManager,
    catalog: Arc<Catalog>,
    capacity: usize,
    lock_timeout: Duration,
}

impl BufferPool {
    pub fn new(config: &Config, catalog: Arc<Catalog>) -> Self {
        assert!(config.capacity > 0, "capacity must be > 0");
        Self {
            state: Mutex::new(PoolState {
                pages: HashMap::with_capacity(config.capacity),
                order: VecDeque::with_capacity(config.capacity),
            }),
            locks: LockManager::new(config.deadlock_policy),
            catalog,
            capacity: config.capacity,
            lock_timeout: config.lock_timeout,
        }
    }

    /// Maximum number of cached pages.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of pages currently cached.
    pub fn cached_pages(&self) -> usize {
        self.state.lock().pages.len()
    }

    /// Whether `pid` is currently cached.
    pub fn contains(&self, pid: PageId) -> bool {
        self.state.lock().pages.contains_key(&pid)
    }

    /// Fetch a page under the given permission level.
    ///
    /// Blocks until the lock manager grants the lock, retrying with a short
    /// randomized sleep between attempts. The total wait is bounded by a
    /// per-call jittered timeout; on expiry the waiting transaction is
    /// aborted with [`Error::TransactionAborted`] (recoverable: roll back
    /// and optionally restart). Under the wait-for-graph policy a detected
    /// deadlock aborts the requester immediately.
    ///
    /// On a cache miss at capacity, one clean page is evicted first; if
    /// every cached page is dirty the call fails with [`Error::CacheFull`].
    pub fn get_page(&self, tid: TransactionId, pid: PageId, perm: Permissions) -> Result<PageRef> {
        self.wait_for_lock(tid, pid, perm.into())?;

        let mut state = self.state.lock();
        if let Some(page) = state.pages.get(&pid).cloned() {
            Self::touch(&mut state.order, pid);
            if perm == Permissions::ReadWrite {
                page.write().mark_dirty(tid);
            }
            return Ok(page);
        }

        if state.pages.len() >= self.capacity {
            Self::evict_one(&mut state)?;
        }

        let table = self.catalog.get(pid.table)?;
        let mut page = table.read_page(pid)?;
        if perm == Permissions::ReadWrite {
            page.mark_dirty(tid);
        }
        let page = Arc::new(RwLock::new(page));
        state.pages.insert(pid, page.clone());
        state.order.push_back(pid);
        Ok(page)
    }

    /// Add a tuple to `table` on behalf of `tid`.
    ///
    /// The table's storage format performs the slot mutation, itself calling
    /// [`get_page`](Self::get_page) with ReadWrite permission for every page
    /// it touches; afterwards every dirtied page is guaranteed cached and
    /// marked dirty for `tid`.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        table: TableId,
        tuple: &mut Tuple,
    ) -> Result<()> {
        let storage = self.catalog.get(table)?;
        let dirtied = storage.insert_tuple(self, tid, tuple)?;
        self.admit_dirtied(tid, dirtied)
    }

    /// Remove a tuple on behalf of `tid`, using its record id to find the
    /// owning table and page.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &Tuple) -> Result<()> {
        let rid = tuple.rid.ok_or(Error::MissingRecordId)?;
        let storage = self.catalog.get(rid.pid.table)?;
        let dirtied = storage.delete_tuple(self, tid, tuple)?;
        self.admit_dirtied(tid, dirtied)
    }

    /// Commit or abort `tid`, then release all of its locks.
    ///
    /// Commit flushes every page `tid` dirtied and re-snapshots its
    /// before-image to the committed bytes. Abort restores each such page
    /// from its before-image in place; no disk I/O is needed because the
    /// store was never touched by the uncommitted transaction.
    ///
    /// A failure while flushing is logged and remembered but does not stop
    /// the loop, and the locks are released regardless — leaking a lock
    /// forever is worse than an inconsistent cached page, which the
    /// returned error reports.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> Result<()> {
        let mut first_err = None;
        {
            let state = self.state.lock();
            for (&pid, page) in state.pages.iter() {
                let mut page = page.write();
                if page.dirtied_by() != Some(tid) {
                    continue;
                }
                if commit {
                    let flushed = self
                        .catalog
                        .get(pid.table)
                        .and_then(|table| table.write_page(&page));
                    match flushed {
                        Ok(()) => page.set_clean(),
                        Err(e) => {
                            log::error!("flush of {pid} failed during commit of {tid}: {e}");
                            first_err.get_or_insert(e);
                        }
                    }
                } else {
                    page.revert();
                }
            }
        }

        self.locks.release_all(tid);
        match first_err {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }

    /// True if `tid` holds a lock (shared or exclusive) on `pid`.
    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.locks.holds(tid, pid)
    }

    /// Release a single page lock before the transaction completes.
    ///
    /// Calling this is very risky: it breaks strict two-phase locking, so
    /// another transaction may observe state the releasing transaction
    /// later rolls back. Think hard about who needs to call this and why.
    pub fn release_page(&self, tid: TransactionId, pid: PageId) {
        self.locks.release(tid, pid);
    }

    /// Unconditionally drop a page from the cache without flushing.
    ///
    /// Used by rollback/recovery collaborators, and by structures that must
    /// guarantee a physically deleted page is never served stale.
    pub fn discard_page(&self, pid: PageId) {
        let mut state = self.state.lock();
        state.pages.remove(&pid);
        state.order.retain(|&p| p != pid);
    }

    /// Write one dirty cached page to its store and mark it clean.
    ///
    /// Maintenance/test operation only: flushing an uncommitted page breaks
    /// the no-steal policy the abort path relies on.
    pub fn flush_page(&self, pid: PageId) -> Result<()> {
        let state = self.state.lock();
        if let Some(page) = state.pages.get(&pid) {
            let mut page = page.write();
            if page.is_dirty() {
                self.catalog.get(pid.table)?.write_page(&page)?;
                page.set_clean();
            }
        }
        Ok(())
    }

    /// Write every dirty cached page to its store. Same caveat as
    /// [`flush_page`](Self::flush_page).
    pub fn flush_all_pages(&self) -> Result<()> {
        let pids: Vec<PageId> = self.state.lock().pages.keys().copied().collect();
        for pid in pids {
            self.flush_page(pid)?;
        }
        Ok(())
    }

    /// Retry `try_acquire` with jittered backoff until granted or the
    /// per-call deadline expires.
    fn wait_for_lock(&self, tid: TransactionId, pid: PageId, mode: LockMode) -> Result<()> {
        let mut rng = rand::thread_rng();
        // Jitter the deadline itself so competing waiters do not all time
        // out in lockstep.
        let timeout = self.lock_timeout.mul_f64(rng.gen_range(0.75..1.25));
        let start = Instant::now();
        loop {
            if self.locks.try_acquire(tid, pid, mode)? {
                return Ok(());
            }
            if start.elapsed() >= timeout {
                log::debug!("{tid} timed out waiting for {pid}");
                return Err(Error::TransactionAborted {
                    tid,
                    reason: AbortReason::LockTimeout,
                });
            }
            thread::sleep(Duration::from_micros(rng.gen_range(100..1500)));
        }
    }

    /// Ensure every dirtied page is cached and marked dirty for `tid`.
    ///
    /// Pages mutated through `get_page` are already cached (dirty pages are
    /// never evicted); the read-back branch covers a storage format that
    /// wrote a page the pool has not seen.
    fn admit_dirtied(&self, tid: TransactionId, dirtied: Vec<PageId>) -> Result<()> {
        let mut state = self.state.lock();
        for pid in dirtied {
            if let Some(page) = state.pages.get(&pid).cloned() {
                page.write().mark_dirty(tid);
                Self::touch(&mut state.order, pid);
            } else {
                if state.pages.len() >= self.capacity {
                    Self::evict_one(&mut state)?;
                }
                let mut page = self.catalog.get(pid.table)?.read_page(pid)?;
                page.mark_dirty(tid);
                state.pages.insert(pid, Arc::new(RwLock::new(page)));
                state.order.push_back(pid);
            }
        }
        Ok(())
    }

    /// Move `pid` to the back of the access order.
    fn touch(order: &mut VecDeque<PageId>, pid: PageId) {
        order.retain(|&p| p != pid);
        order.push_back(pid);
    }

    /// Evict the oldest-accessed clean page.
    ///
    /// Dirty pages carry uncommitted work and are never candidates; with no
    /// write-ahead log, flushing one would leave an abort unrecoverable.
    /// The chosen victim is clean by construction, so no flush is issued.
    fn evict_one(state: &mut PoolState) -> Result<()> {
        let victim = state.order.iter().enumerate().find_map(|(i, pid)| {
            let clean = state
                .pages
                .get(pid)
                .is_some_and(|page| !page.read().is_dirty());
            clean.then_some((i, *pid))
        });
        let Some((index, pid)) = victim else {
            return Err(Error::CacheFull);
        };
        state.order.remove(index);
        state.pages.remove(&pid);
        log::debug!("evicted clean {pid}");
        Ok(())
    }
}
