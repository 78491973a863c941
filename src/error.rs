//! Error types for pagelock.

use thiserror::Error;

use crate::common::{PageId, TableId, TransactionId};

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a transaction was forcibly aborted while waiting for a lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The bounded lock wait expired.
    LockTimeout,
    /// Granting the request would have closed a cycle in the wait-for graph.
    Deadlock,
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbortReason::LockTimeout => write!(f, "lock wait timed out"),
            AbortReason::Deadlock => write!(f, "deadlock detected"),
        }
    }
}

/// All possible errors in pagelock.
///
/// `TransactionAborted` and `CacheFull` are recoverable: the caller is
/// expected to roll back (and may retry the whole transaction). `Io` is
/// propagated as-is and never retried by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from page store operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No table is registered under this id.
    #[error("no table with id {0}")]
    TableNotFound(TableId),

    /// A page id was handed to a table file it does not belong to.
    #[error("page {pid} does not belong to table {table}")]
    TableMismatch { pid: PageId, table: TableId },

    /// Read past the end of a table's backing file.
    #[error("page {0} is beyond the end of its table file")]
    PageOutOfBounds(PageId),

    /// The waiting transaction was aborted to bound its wait or break a
    /// deadlock. Recoverable: roll back, optionally restart.
    #[error("transaction {tid} aborted: {reason}")]
    TransactionAborted {
        tid: TransactionId,
        reason: AbortReason,
    },

    /// Every cached page carries an uncommitted modification, so nothing can
    /// be evicted to admit a new page.
    #[error("buffer pool full: no clean page available to evict")]
    CacheFull,

    /// Heap page has no free slot.
    #[error("page {0} has no free slot")]
    PageFull(PageId),

    /// A tuple operation needed a record id the tuple does not carry.
    #[error("tuple has no record id")]
    MissingRecordId,

    /// Delete targeted a slot that holds no tuple.
    #[error("no tuple stored at {pid} slot {slot}")]
    TupleNotFound { pid: PageId, slot: usize },

    /// Tuple bytes do not match the table's fixed tuple width.
    #[error("tuple is {got} bytes, table stores {want}-byte tuples")]
    TupleWidthMismatch { got: usize, want: usize },
}

impl Error {
    /// True for errors a caller can recover from by rolling back the
    /// transaction and retrying.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::TransactionAborted { .. } | Error::CacheFull)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::TableNotFound(TableId(7));
        assert_eq!(format!("{}", err), "no table with id table 7");

        let err = Error::CacheFull;
        assert!(format!("{}", err).contains("no clean page"));
    }

    #[test]
    fn test_abort_is_recoverable() {
        let err = Error::TransactionAborted {
            tid: TransactionId::new(),
            reason: AbortReason::LockTimeout,
        };
        assert!(err.is_recoverable());
        assert!(Error::CacheFull.is_recoverable());
        assert!(!Error::MissingRecordId.is_recoverable());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
