//! Page store - fixed-size-page file I/O.
//!
//! The [`PageStore`] maps a page number to a byte-exact slot in a backing
//! file and nothing more. It performs no locking beyond serializing its own
//! seek/read pairs; callers reach it only while already holding the
//! appropriate page lock via the buffer pool.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::common::PageId;
use crate::error::{Error, Result};

/// One table's backing file, addressed in fixed-size pages.
///
/// # File layout
/// Page N occupies bytes `[N * page_size, (N + 1) * page_size)`. The file
/// length need not be a multiple of the page size; a partial tail page reads
/// back zero-padded, and `page_count` rounds up.
pub struct PageStore {
    file: Mutex<File>,
    page_size: usize,
    path: PathBuf,
}

impl PageStore {
    /// Open (or create) a backing file.
    pub fn open<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;
        Ok(Self {
            file: Mutex::new(file),
            page_size,
            path: path.as_ref().to_path_buf(),
        })
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of pages in the file: `ceil(file_len / page_size)`.
    pub fn page_count(&self) -> Result<u32> {
        let file = self.file.lock();
        let len = file.metadata()?.len();
        Ok(len.div_ceil(self.page_size as u64) as u32)
    }

    /// Read page `number`, zero-padding a partial tail page.
    ///
    /// `pid` is only used for error reporting.
    pub fn read(&self, pid: PageId, number: u32) -> Result<Vec<u8>> {
        let mut file = self.file.lock();
        let len = file.metadata()?.len();
        let offset = number as u64 * self.page_size as u64;
        if offset >= len {
            return Err(Error::PageOutOfBounds(pid));
        }

        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; self.page_size];
        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..])? {
                0 => break, // tail page shorter than page_size
                n => filled += n,
            }
        }
        Ok(buf)
    }

    /// Write page `number` at its absolute offset, extending the file when
    /// the page lies beyond the current end.
    pub fn write(&self, number: u32, data: &[u8]) -> Result<()> {
        debug_assert_eq!(data.len(), self.page_size);
        let mut file = self.file.lock();
        let offset = number as u64 * self.page_size as u64;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        file.sync_data()?;
        Ok(())
    }
}

impl std::fmt::Debug for PageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageStore")
            .field("path", &self.path)
            .field("page_size", &self.page_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::TableId;
    use tempfile::tempdir;

    const PS: usize = 64;

    fn store() -> (PageStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = PageStore::open(dir.path().join("t.dat"), PS).unwrap();
        (store, dir)
    }

    fn pid(number: u32) -> PageId {
        PageId::new(TableId(0), number)
    }

    #[test]
    fn test_empty_file_has_no_pages() {
        let (store, _dir) = store();
        assert_eq!(store.page_count().unwrap(), 0);
        assert!(matches!(
            store.read(pid(0), 0),
            Err(Error::PageOutOfBounds(_))
        ));
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let (store, _dir) = store();
        let mut data = vec![0u8; PS];
        data[0] = 0xAB;
        data[PS - 1] = 0xCD;
        store.write(0, &data).unwrap();

        assert_eq!(store.read(pid(0), 0).unwrap(), data);
        assert_eq!(store.page_count().unwrap(), 1);
    }

    #[test]
    fn test_write_past_end_grows_file() {
        let (store, _dir) = store();
        let data = vec![0x11u8; PS];
        store.write(3, &data).unwrap();

        assert_eq!(store.page_count().unwrap(), 4);
        // The hole pages read back as zeros.
        assert_eq!(store.read(pid(1), 1).unwrap(), vec![0u8; PS]);
        assert_eq!(store.read(pid(3), 3).unwrap(), data);
    }

    #[test]
    fn test_partial_tail_page_zero_padded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.dat");
        std::fs::write(&path, [0x55u8; PS + 10]).unwrap();

        let store = PageStore::open(&path, PS).unwrap();
        assert_eq!(store.page_count().unwrap(), 2);

        let tail = store.read(pid(1), 1).unwrap();
        assert_eq!(&tail[..10], &[0x55u8; 10]);
        assert_eq!(&tail[10..], &vec![0u8; PS - 10][..]);
    }

    #[test]
    fn test_reopen_preserves_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.dat");
        {
            let store = PageStore::open(&path, PS).unwrap();
            store.write(0, &vec![0x42u8; PS]).unwrap();
        }
        let store = PageStore::open(&path, PS).unwrap();
        assert_eq!(store.read(pid(0), 0).unwrap()[0], 0x42);
    }
}
