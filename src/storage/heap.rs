//! Heap table format: fixed-width tuples in slotted pages.
//!
//! A [`HeapFile`] stores tuples in no particular order across the pages of
//! one backing [`PageStore`]. Each page starts with a slot-occupancy bitmap
//! (one bit per slot, LSB-first within each byte) followed by the
//! fixed-width tuple slots. This layout is owned entirely here; the buffer
//! pool sees only opaque bytes.

use std::ops::Range;
use std::path::Path;

use parking_lot::Mutex;

use crate::buffer::{BufferPool, Permissions};
use crate::catalog::Table;
use crate::common::{PageId, TableId, TransactionId};
use crate::error::{Error, Result};
use crate::storage::{Page, PageStore};

/// Location of one stored tuple: page plus slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub pid: PageId,
    pub slot: usize,
}

/// A fixed-width tuple, optionally carrying the location it is stored at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    pub data: Vec<u8>,
    pub rid: Option<RecordId>,
}

impl Tuple {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, rid: None }
    }
}

/// Slot arithmetic for one page geometry.
#[derive(Debug, Clone, Copy)]
struct Layout {
    slots: usize,
    header_bytes: usize,
    width: usize,
}

impl Layout {
    fn of(page_size: usize, width: usize) -> Self {
        // Each slot costs width bytes plus one header bit.
        let slots = (page_size * 8) / (width * 8 + 1);
        let header_bytes = slots.div_ceil(8);
        debug_assert!(header_bytes + slots * width <= page_size);
        Self {
            slots,
            header_bytes,
            width,
        }
    }

    fn slot_used(&self, data: &[u8], slot: usize) -> bool {
        (data[slot / 8] >> (slot % 8)) & 1 == 1
    }

    fn set_slot(&self, data: &mut [u8], slot: usize, used: bool) {
        let mask = 1u8 << (slot % 8);
        if used {
            data[slot / 8] |= mask;
        } else {
            data[slot / 8] &= !mask;
        }
    }

    fn free_slot(&self, data: &[u8]) -> Option<usize> {
        (0..self.slots).find(|&s| !self.slot_used(data, s))
    }

    fn slot_range(&self, slot: usize) -> Range<usize> {
        let start = self.header_bytes + slot * self.width;
        start..start + self.width
    }
}

/// A table of fixed-width tuples backed by one page file.
pub struct HeapFile {
    id: TableId,
    store: PageStore,
    layout: Layout,
    // Serializes file growth so concurrent inserts do not both append the
    // same page number.
    append: Mutex<()>,
}

impl HeapFile {
    /// Open (or create) a heap file storing `tuple_width`-byte tuples.
    pub fn open<P: AsRef<Path>>(
        id: TableId,
        path: P,
        page_size: usize,
        tuple_width: usize,
    ) -> Result<Self> {
        assert!(tuple_width > 0, "tuple_width must be > 0");
        let layout = Layout::of(page_size, tuple_width);
        assert!(layout.slots > 0, "page too small for even one tuple");
        Ok(Self {
            id,
            store: PageStore::open(path, page_size)?,
            layout,
            append: Mutex::new(()),
        })
    }

    /// Tuple slots per page for this file's geometry.
    pub fn slots_per_page(&self) -> usize {
        self.layout.slots
    }

    pub fn tuple_width(&self) -> usize {
        self.layout.width
    }

    fn check_owns(&self, pid: PageId) -> Result<()> {
        if pid.table != self.id {
            return Err(Error::TableMismatch {
                pid,
                table: self.id,
            });
        }
        Ok(())
    }

    fn check_width(&self, tuple: &Tuple) -> Result<()> {
        if tuple.data.len() != self.layout.width {
            return Err(Error::TupleWidthMismatch {
                got: tuple.data.len(),
                want: self.layout.width,
            });
        }
        Ok(())
    }

    /// Try to place `tuple` into an already-fetched page. Returns the slot
    /// used, or None when the page is full.
    fn insert_into(&self, page: &mut Page, tuple: &mut Tuple) -> Option<usize> {
        let slot = self.layout.free_slot(page.data())?;
        let range = self.layout.slot_range(slot);
        let data = page.data_mut();
        data[range].copy_from_slice(&tuple.data);
        self.layout.set_slot(data, slot, true);
        tuple.rid = Some(RecordId {
            pid: page.id(),
            slot,
        });
        Some(slot)
    }

    /// Read every live tuple in the table under shared page locks.
    ///
    /// Holds a shared lock on each scanned page for the remainder of the
    /// transaction, as strict 2PL requires.
    pub fn scan(&self, pool: &BufferPool, tid: TransactionId) -> Result<Vec<Tuple>> {
        let mut out = Vec::new();
        for number in 0..self.page_count()? {
            let pid = PageId::new(self.id, number);
            let page = pool.get_page(tid, pid, Permissions::ReadOnly)?;
            let page = page.read();
            for slot in 0..self.layout.slots {
                if self.layout.slot_used(page.data(), slot) {
                    out.push(Tuple {
                        data: page.data()[self.layout.slot_range(slot)].to_vec(),
                        rid: Some(RecordId { pid, slot }),
                    });
                }
            }
        }
        Ok(out)
    }
}

impl Table for HeapFile {
    fn id(&self) -> TableId {
        self.id
    }

    fn read_page(&self, pid: PageId) -> Result<Page> {
        self.check_owns(pid)?;
        let data = self.store.read(pid, pid.number)?;
        Ok(Page::new(pid, data))
    }

    fn write_page(&self, page: &Page) -> Result<()> {
        self.check_owns(page.id())?;
        self.store.write(page.id().number, page.data())
    }

    fn page_count(&self) -> Result<u32> {
        self.store.page_count()
    }

    fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<PageId>> {
        self.check_width(tuple)?;

        for number in 0..self.page_count()? {
            let pid = PageId::new(self.id, number);
            let page = pool.get_page(tid, pid, Permissions::ReadWrite)?;
            if self.insert_into(&mut page.write(), tuple).is_some() {
                return Ok(vec![pid]);
            }
        }

        // Every existing page is full: grow the file by one empty page and
        // place the tuple there.
        let pid = {
            let _growth = self.append.lock();
            let number = self.page_count()?;
            self.store.write(number, &vec![0u8; self.store.page_size()])?;
            PageId::new(self.id, number)
        };
        let page = pool.get_page(tid, pid, Permissions::ReadWrite)?;
        let result = match self.insert_into(&mut page.write(), tuple) {
            Some(_) => Ok(vec![pid]),
            // Only reachable if another transaction filled the fresh page
            // between growth and lock grant.
            None => Err(Error::PageFull(pid)),
        };
        result
    }

    fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<PageId>> {
        let rid = tuple.rid.ok_or(Error::MissingRecordId)?;
        self.check_owns(rid.pid)?;

        let page = pool.get_page(tid, rid.pid, Permissions::ReadWrite)?;
        let mut page = page.write();
        if rid.slot >= self.layout.slots || !self.layout.slot_used(page.data(), rid.slot) {
            return Err(Error::TupleNotFound {
                pid: rid.pid,
                slot: rid.slot,
            });
        }
        self.layout.set_slot(page.data_mut(), rid.slot, false);
        Ok(vec![rid.pid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_slot_count() {
        // 64-byte page, 8-byte tuples: 512 bits / 65 bits-per-slot = 7 slots.
        let layout = Layout::of(64, 8);
        assert_eq!(layout.slots, 7);
        assert_eq!(layout.header_bytes, 1);
        assert!(layout.header_bytes + layout.slots * 8 <= 64);
    }

    #[test]
    fn test_layout_bitmap_round_trip() {
        let layout = Layout::of(64, 8);
        let mut data = vec![0u8; 64];

        assert_eq!(layout.free_slot(&data), Some(0));
        layout.set_slot(&mut data, 0, true);
        layout.set_slot(&mut data, 2, true);

        assert!(layout.slot_used(&data, 0));
        assert!(!layout.slot_used(&data, 1));
        assert!(layout.slot_used(&data, 2));
        assert_eq!(layout.free_slot(&data), Some(1));

        layout.set_slot(&mut data, 0, false);
        assert!(!layout.slot_used(&data, 0));
    }

    #[test]
    fn test_layout_full_page() {
        let layout = Layout::of(64, 8);
        let mut data = vec![0u8; 64];
        for s in 0..layout.slots {
            layout.set_slot(&mut data, s, true);
        }
        assert_eq!(layout.free_slot(&data), None);
    }

    #[test]
    fn test_slot_ranges_do_not_overlap_header() {
        let layout = Layout::of(64, 8);
        assert_eq!(layout.slot_range(0), 1..9);
        assert_eq!(layout.slot_range(6), 49..57);
    }
}
