//! Storage layer: pages, the on-disk page store, and the heap table format.

pub mod heap;
mod page;
mod page_store;

pub use heap::{HeapFile, RecordId, Tuple};
pub use page::Page;
pub use page_store::PageStore;
