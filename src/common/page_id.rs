//! Page and table identifier types.

use std::fmt;

/// Identifies a registered table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub u32);

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table {}", self.0)
    }
}

/// Identifies one page: the table it belongs to plus its page number within
/// that table's backing file.
///
/// Equality and hashing cover both fields; page number N lives at file
/// offset `N * page_size`.
///
/// # Example
/// ```
/// use pagelock::{PageId, TableId};
///
/// let pid = PageId::new(TableId(1), 42);
/// assert_eq!(pid.number, 42);
/// assert_eq!(pid.table, TableId(1));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId {
    /// The table this page belongs to.
    pub table: TableId,
    /// Page number within the table's file.
    pub number: u32,
}

impl PageId {
    /// Create a new PageId.
    #[inline]
    pub fn new(table: TableId, number: u32) -> Self {
        PageId { table, number }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page {}.{}", self.table.0, self.number)
    }
}
