//! Lock manager - the per-page shared/exclusive lock table.
//!
//! Entirely in-memory, lifetime scoped to the process. A lock is not a
//! stored entity: it is membership of a transaction in a page's
//! shared-holder set or exclusive-holder slot. All operations run under one
//! global mutex; `try_acquire` never blocks, so the buffer pool drives
//! waiting with its bounded retry loop.
//!
//! Per (transaction, page) pair the legal transitions are
//! `Unlocked -> Shared -> Exclusive` (upgrade, sole sharer only) or
//! `Unlocked -> Exclusive`, and back to `Unlocked` only through
//! [`release`](LockManager::release) / [`release_all`](LockManager::release_all).

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use crate::common::{PageId, TransactionId};
use crate::error::{AbortReason, Error, Result};

/// Requested lock strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// How the lock manager participates in deadlock handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeadlockPolicy {
    /// No detection here; the caller bounds its wait and aborts on timeout.
    #[default]
    TimeoutOnly,
    /// Maintain a wait-for graph and abort a requester whose refused request
    /// would close a cycle back to itself.
    ///
    /// Conservative: edges are cleared when their owner is granted a lock or
    /// releases everything, but edges pointing *at* a transaction are never
    /// retracted when it unblocks. Spurious aborts are possible; missed
    /// deadlocks are not.
    WaitForGraph,
}

/// Holder state for one page.
#[derive(Debug, Default)]
struct PageLocks {
    shared: HashSet<TransactionId>,
    exclusive: Option<TransactionId>,
}

impl PageLocks {
    fn is_free(&self) -> bool {
        self.shared.is_empty() && self.exclusive.is_none()
    }

    fn holds(&self, tid: TransactionId) -> bool {
        self.exclusive == Some(tid) || self.shared.contains(&tid)
    }

    /// Every current holder other than `tid` that is incompatible with the
    /// requested mode.
    fn conflicting_holders(&self, tid: TransactionId, mode: LockMode) -> Vec<TransactionId> {
        let mut holders = Vec::new();
        if let Some(ex) = self.exclusive {
            if ex != tid {
                holders.push(ex);
            }
        }
        if mode == LockMode::Exclusive {
            holders.extend(self.shared.iter().copied().filter(|&t| t != tid));
        }
        holders
    }
}

#[derive(Debug, Default)]
struct LockTables {
    pages: HashMap<PageId, PageLocks>,
    /// Reverse index: every page a transaction holds some lock on.
    held: HashMap<TransactionId, HashSet<PageId>>,
    /// Wait-for edges, populated only under `DeadlockPolicy::WaitForGraph`.
    waits_for: HashMap<TransactionId, HashSet<TransactionId>>,
}

impl LockTables {
    /// Depth-first reachability from `start` back to `start`.
    fn in_cycle(&self, start: TransactionId) -> bool {
        let mut stack: Vec<TransactionId> = self
            .waits_for
            .get(&start)
            .map(|edges| edges.iter().copied().collect())
            .unwrap_or_default();
        let mut visited = HashSet::new();
        while let Some(tid) = stack.pop() {
            if tid == start {
                return true;
            }
            if !visited.insert(tid) {
                continue;
            }
            if let Some(edges) = self.waits_for.get(&tid) {
                stack.extend(edges.iter().copied());
            }
        }
        false
    }

    #[cfg(test)]
    fn assert_holder_invariant(&self) {
        for (pid, locks) in &self.pages {
            assert!(
                locks.exclusive.is_none() || locks.shared.is_empty(),
                "{pid} has exclusive holder {:?} alongside sharers {:?}",
                locks.exclusive,
                locks.shared,
            );
        }
    }
}

/// Per-page shared/exclusive lock table with optional wait-for-graph
/// deadlock detection.
pub struct LockManager {
    state: Mutex<LockTables>,
    policy: DeadlockPolicy,
}

impl LockManager {
    pub fn new(policy: DeadlockPolicy) -> Self {
        Self {
            state: Mutex::new(LockTables::default()),
            policy,
        }
    }

    /// Try to grant `mode` on `pid` to `tid` without blocking.
    ///
    /// Returns `Ok(true)` and records the grant if compatible with current
    /// holders, `Ok(false)` if the caller should retry later. Under
    /// `WaitForGraph`, a refusal that closes a wait-for cycle back to `tid`
    /// instead aborts the requester with `Error::TransactionAborted`.
    ///
    /// Compatibility: Exclusive is granted only when the page has no holder
    /// or `tid` is its *sole* holder (upgrade from shared). Shared is
    /// granted when no other transaction holds exclusive.
    pub fn try_acquire(&self, tid: TransactionId, pid: PageId, mode: LockMode) -> Result<bool> {
        let mut state = self.state.lock();
        let locks = state.pages.entry(pid).or_default();

        let grantable = match mode {
            LockMode::Shared => locks.exclusive.is_none() || locks.exclusive == Some(tid),
            LockMode::Exclusive => {
                locks.is_free()
                    || locks.exclusive == Some(tid)
                    || (locks.exclusive.is_none()
                        && locks.shared.len() == 1
                        && locks.shared.contains(&tid))
            }
        };

        if grantable {
            match mode {
                LockMode::Shared => {
                    // An exclusive holder already has shared access implied;
                    // do not downgrade it.
                    if locks.exclusive != Some(tid) {
                        locks.shared.insert(tid);
                    }
                }
                LockMode::Exclusive => {
                    locks.shared.remove(&tid);
                    locks.exclusive = Some(tid);
                }
            }
            debug_assert!(locks.exclusive.is_none() || locks.shared.is_empty());
            state.held.entry(tid).or_default().insert(pid);
            if self.policy == DeadlockPolicy::WaitForGraph {
                state.waits_for.remove(&tid);
            }
            return Ok(true);
        }

        if self.policy == DeadlockPolicy::WaitForGraph {
            let holders = locks.conflicting_holders(tid, mode);
            state.waits_for.entry(tid).or_default().extend(holders);
            if state.in_cycle(tid) {
                // The requester is the victim: drop its edges and surface
                // the abort. Its already-held locks are released when the
                // caller rolls back.
                state.waits_for.remove(&tid);
                log::debug!("aborting {tid}: wait-for cycle on {pid}");
                return Err(Error::TransactionAborted {
                    tid,
                    reason: AbortReason::Deadlock,
                });
            }
        }

        Ok(false)
    }

    /// Remove `tid` from whichever holder structure it occupies for `pid`.
    /// Idempotent when `tid` holds nothing there.
    pub fn release(&self, tid: TransactionId, pid: PageId) {
        let mut state = self.state.lock();
        Self::release_one(&mut state, tid, pid);
        let now_empty = state.held.get_mut(&tid).map(|pages| {
            pages.remove(&pid);
            pages.is_empty()
        });
        if now_empty == Some(true) {
            state.held.remove(&tid);
        }
    }

    /// Remove `tid` from every page's holder structures and drop its
    /// wait-for edges. Used at transaction end.
    pub fn release_all(&self, tid: TransactionId) {
        let mut state = self.state.lock();
        if let Some(pages) = state.held.remove(&tid) {
            for pid in pages {
                Self::release_one(&mut state, tid, pid);
            }
        }
        state.waits_for.remove(&tid);
    }

    /// True if `tid` currently holds a shared or exclusive lock on `pid`.
    pub fn holds(&self, tid: TransactionId, pid: PageId) -> bool {
        self.state
            .lock()
            .pages
            .get(&pid)
            .is_some_and(|locks| locks.holds(tid))
    }

    /// Every page `tid` holds some lock on.
    pub fn held_pages(&self, tid: TransactionId) -> Vec<PageId> {
        self.state
            .lock()
            .held
            .get(&tid)
            .map(|pages| pages.iter().copied().collect())
            .unwrap_or_default()
    }

    fn release_one(state: &mut LockTables, tid: TransactionId, pid: PageId) {
        if let Some(locks) = state.pages.get_mut(&pid) {
            if locks.exclusive == Some(tid) {
                locks.exclusive = None;
            }
            locks.shared.remove(&tid);
            if locks.is_free() {
                state.pages.remove(&pid);
            }
        }
    }
}
