//! Integration tests for buffer pool caching and eviction.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use pagelock::{
    Config, Database, Error, Page, PageId, Permissions, TableId, TransactionId, Tuple,
};
use tempfile::tempdir;

const PAGE: usize = 64;
const WIDTH: usize = 8;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn database(capacity: usize) -> (Arc<Database>, tempfile::TempDir) {
    init_logging();
    let dir = tempdir().unwrap();
    let config = Config::with_page_size(PAGE)
        .capacity(capacity)
        .lock_timeout(Duration::from_secs(2));
    let db = Database::new(config);
    db.add_heap_table(TableId(1), dir.path().join("t.dat"), WIDTH)
        .unwrap();
    (Arc::new(db), dir)
}

/// Write `count` zeroed pages straight to the table file.
fn seed_pages(db: &Database, count: u32) {
    let table = db.catalog().get(TableId(1)).unwrap();
    for n in 0..count {
        table
            .write_page(&Page::empty(PageId::new(TableId(1), n), PAGE))
            .unwrap();
    }
}

fn pid(n: u32) -> PageId {
    PageId::new(TableId(1), n)
}

/// Capacity 2: after reading pages {0,1} and then requesting page 2, one of
/// the first two is evicted without any flush (both clean) and the cache
/// holds page 2 plus one survivor.
#[test]
fn test_clean_page_evicted_at_capacity() {
    let (db, _dir) = database(2);
    seed_pages(&db, 3);
    let tid = TransactionId::new();

    db.pool().get_page(tid, pid(0), Permissions::ReadOnly).unwrap();
    db.pool().get_page(tid, pid(1), Permissions::ReadOnly).unwrap();
    db.pool().get_page(tid, pid(2), Permissions::ReadOnly).unwrap();

    assert_eq!(db.pool().cached_pages(), 2);
    assert!(db.pool().contains(pid(2)));
    assert!(db.pool().contains(pid(0)) ^ db.pool().contains(pid(1)));
    db.pool().transaction_complete(tid, true).unwrap();
}

/// Writing a page and reading it back with no intervening eviction returns
/// byte-identical content.
#[test]
fn test_write_read_round_trip() {
    let (db, _dir) = database(4);
    seed_pages(&db, 1);

    let writer = TransactionId::new();
    let page = db
        .pool()
        .get_page(writer, pid(0), Permissions::ReadWrite)
        .unwrap();
    let pattern: Vec<u8> = (0..PAGE as u8).collect();
    page.write().data_mut().copy_from_slice(&pattern);
    drop(page);
    db.pool().transaction_complete(writer, true).unwrap();

    let reader = TransactionId::new();
    let page = db
        .pool()
        .get_page(reader, pid(0), Permissions::ReadOnly)
        .unwrap();
    assert_eq!(page.read().data(), &pattern[..]);
}

/// Eviction round-trips through disk: committed bytes survive leaving the
/// cache and are re-read intact on the next access.
#[test]
fn test_committed_data_survives_eviction() {
    let (db, _dir) = database(2);
    seed_pages(&db, 5);

    for n in 0..5u32 {
        let tid = TransactionId::new();
        let page = db
            .pool()
            .get_page(tid, pid(n), Permissions::ReadWrite)
            .unwrap();
        page.write().data_mut()[0] = n as u8 + 1;
        drop(page);
        db.pool().transaction_complete(tid, true).unwrap();
    }

    for n in 0..5u32 {
        let tid = TransactionId::new();
        let page = db
            .pool()
            .get_page(tid, pid(n), Permissions::ReadOnly)
            .unwrap();
        assert_eq!(page.read().data()[0], n as u8 + 1);
        db.pool().transaction_complete(tid, true).unwrap();
    }
}

#[test]
fn test_concurrent_shared_readers() {
    let (db, _dir) = database(4);
    seed_pages(&db, 1);

    let setup = TransactionId::new();
    let page = db
        .pool()
        .get_page(setup, pid(0), Permissions::ReadWrite)
        .unwrap();
    page.write().data_mut()[0] = 0x42;
    drop(page);
    db.pool().transaction_complete(setup, true).unwrap();

    let mut handles = vec![];
    for _ in 0..10 {
        let db = Arc::clone(&db);
        handles.push(thread::spawn(move || {
            let tid = TransactionId::new();
            let page = db
                .pool()
                .get_page(tid, pid(0), Permissions::ReadOnly)
                .unwrap();
            assert_eq!(page.read().data()[0], 0x42);
            drop(page);
            db.pool().transaction_complete(tid, true).unwrap();
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
}

/// Heap inserts spilling over several pages come back intact after each
/// transaction commits, including across evictions.
#[test]
fn test_multi_page_inserts_scan_back() {
    let (db, _dir) = database(8);
    let table = db.catalog().get(TableId(1)).unwrap();

    let total = 20usize;
    for i in 0..total {
        let tid = TransactionId::new();
        let mut tuple = Tuple::new(vec![i as u8; WIDTH]);
        db.pool().insert_tuple(tid, TableId(1), &mut tuple).unwrap();
        db.pool().transaction_complete(tid, true).unwrap();
    }
    assert!(table.page_count().unwrap() > 1);

    let reader = TransactionId::new();
    let mut seen = 0;
    for n in 0..table.page_count().unwrap() {
        let page = db
            .pool()
            .get_page(reader, pid(n), Permissions::ReadOnly)
            .unwrap();
        let data = page.read();
        // First byte of each page is the slot bitmap; count set bits.
        seen += data.data()[0].count_ones() as usize;
    }
    assert_eq!(seen, total);
    db.pool().transaction_complete(reader, true).unwrap();
}

/// A failed admission (everything dirty) surfaces CacheFull instead of
/// evicting uncommitted work, and the dirty pages are still intact.
#[test]
fn test_dirty_pages_survive_failed_admission() {
    let (db, _dir) = database(2);
    seed_pages(&db, 3);
    let tid = TransactionId::new();

    for n in 0..2u32 {
        let page = db
            .pool()
            .get_page(tid, pid(n), Permissions::ReadWrite)
            .unwrap();
        page.write().data_mut()[1] = 0x99;
    }

    let err = db
        .pool()
        .get_page(tid, pid(2), Permissions::ReadOnly)
        .unwrap_err();
    assert!(matches!(err, Error::CacheFull));

    db.pool().transaction_complete(tid, true).unwrap();
    let table = db.catalog().get(TableId(1)).unwrap();
    for n in 0..2u32 {
        assert_eq!(table.read_page(pid(n)).unwrap().data()[1], 0x99);
    }
}
