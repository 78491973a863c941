//! Page - the in-memory representation of one on-disk page.
//!
//! A [`Page`] owns its raw bytes plus the transactional state the buffer
//! pool needs: which transaction (if any) has dirtied it, and a retained
//! before-image for rollback on abort.

use crate::common::{PageId, TransactionId};

/// One page's bytes plus dirty/clean status and rollback snapshot.
///
/// Invariant: a page is dirty (`dirtied_by.is_some()`) exactly when its
/// in-memory content may differ from what is on the page store. The
/// before-image is an independent copy of the bytes taken at the moment the
/// page last transitioned from clean to dirty — never an alias of the live
/// buffer — so restoring it undoes everything the dirtying transaction did.
#[derive(Debug)]
pub struct Page {
    id: PageId,
    data: Vec<u8>,
    dirtied_by: Option<TransactionId>,
    before_image: Vec<u8>,
}

impl Page {
    /// Wrap bytes freshly read from the page store (clean by definition).
    pub fn new(id: PageId, data: Vec<u8>) -> Self {
        let before_image = data.clone();
        Self {
            id,
            data,
            dirtied_by: None,
            before_image,
        }
    }

    /// Construct an empty (all-zero) page, used when a table file grows.
    pub fn empty(id: PageId, page_size: usize) -> Self {
        Self::new(id, vec![0; page_size])
    }

    #[inline]
    pub fn id(&self) -> PageId {
        self.id
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable access to the page bytes.
    ///
    /// Callers must hold the appropriate exclusive lock via the buffer pool
    /// and must have called [`mark_dirty`](Self::mark_dirty) first, so the
    /// before-image predates every modification.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// The transaction that dirtied this page, if any.
    #[inline]
    pub fn dirtied_by(&self) -> Option<TransactionId> {
        self.dirtied_by
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirtied_by.is_some()
    }

    /// Record that `tid` is about to modify this page.
    ///
    /// On the clean-to-dirty transition the before-image is snapshotted from
    /// the current bytes. Re-marking an already dirty page only updates the
    /// owning transaction; under strict 2PL that owner cannot actually
    /// change until the page is clean again.
    pub fn mark_dirty(&mut self, tid: TransactionId) {
        if self.dirtied_by.is_none() {
            self.before_image = self.data.clone();
        }
        self.dirtied_by = Some(tid);
    }

    /// Clear the dirty flag and re-snapshot the before-image to the current
    /// bytes. Called after a successful flush: the current content is now
    /// what the page store holds.
    pub fn set_clean(&mut self) {
        self.dirtied_by = None;
        self.before_image = self.data.clone();
    }

    /// Roll the page back to its before-image, discarding every in-memory
    /// modification made since it was last clean. No disk I/O: the store
    /// was never touched by the uncommitted transaction.
    pub fn revert(&mut self) {
        self.data.clear();
        self.data.extend_from_slice(&self.before_image);
        self.dirtied_by = None;
    }
}
