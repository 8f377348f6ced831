//! Tests for the index strategies
//!
//! These tests verify:
//! - get/put/remove semantics shared by every index
//! - Persistence across close/reopen
//! - Bucket capacity limits
//! - Corruption detection on reopen
//! - Memory-mapped table lifecycle

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use porkdb::config::IndexKind;
use porkdb::index::{
    open_index, BucketingIndex, HashTableIndex, IndexLookup, MappedIndex, BUCKET_FILENAME,
    SLOT_SIZE, TABLE_FILENAME,
};
use porkdb::{Locator, PorkError};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_dir() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().to_path_buf();
    (temp_dir, path)
}

fn all_kinds() -> Vec<IndexKind> {
    vec![
        IndexKind::HashTable,
        IndexKind::Mapped,
        IndexKind::Bucketing {
            bucket_bits: 4,
            entries_per_bucket: 32,
        },
    ]
}

fn loc(n: u64) -> Locator {
    Locator::new(n, n * 10)
}

// =============================================================================
// Shared Contract Tests
// =============================================================================

#[test]
fn test_get_missing_returns_none() {
    for kind in all_kinds() {
        let (_temp, dir) = setup_temp_dir();
        let mut index = open_index(&dir, kind, 10).unwrap();

        assert_eq!(index.get(0).unwrap(), None, "{:?}", kind);
        assert_eq!(index.get(1023).unwrap(), None, "{:?}", kind);
    }
}

#[test]
fn test_put_get_remove() {
    for kind in all_kinds() {
        let (_temp, dir) = setup_temp_dir();
        let mut index = open_index(&dir, kind, 10).unwrap();

        assert_eq!(index.put(5, loc(1)).unwrap(), None);
        assert_eq!(index.put(700, loc(2)).unwrap(), None);

        assert_eq!(index.get(5).unwrap(), Some(loc(1)), "{:?}", kind);
        assert_eq!(index.get(700).unwrap(), Some(loc(2)), "{:?}", kind);

        assert_eq!(index.remove(5).unwrap(), Some(loc(1)));
        assert_eq!(index.get(5).unwrap(), None);
        assert_eq!(index.remove(5).unwrap(), None);
        assert_eq!(index.get(700).unwrap(), Some(loc(2)));
    }
}

#[test]
fn test_put_returns_previous() {
    for kind in all_kinds() {
        let (_temp, dir) = setup_temp_dir();
        let mut index = open_index(&dir, kind, 10).unwrap();

        index.put(42, loc(1)).unwrap();
        assert_eq!(index.put(42, loc(2)).unwrap(), Some(loc(1)), "{:?}", kind);
        assert_eq!(index.get(42).unwrap(), Some(loc(2)));
        assert_eq!(index.entries().unwrap().len(), 1);
    }
}

#[test]
fn test_entries_lists_everything() {
    for kind in all_kinds() {
        let (_temp, dir) = setup_temp_dir();
        let mut index = open_index(&dir, kind, 10).unwrap();

        for hash in [3u64, 17, 500, 1023] {
            index.put(hash, loc(hash)).unwrap();
        }
        index.remove(17).unwrap();

        let entries = index.entries().unwrap();
        assert_eq!(
            entries,
            vec![(3, loc(3)), (500, loc(500)), (1023, loc(1023))],
            "{:?}",
            kind
        );
    }
}

#[test]
fn test_rejects_out_of_range_hash() {
    for kind in all_kinds() {
        let (_temp, dir) = setup_temp_dir();
        let mut index = open_index(&dir, kind, 10).unwrap();

        let result = index.put(1024, loc(1));
        assert!(matches!(result, Err(PorkError::Config(_))), "{:?}", kind);
    }
}

#[test]
fn test_persists_across_reopen() {
    for kind in all_kinds() {
        let (_temp, dir) = setup_temp_dir();

        {
            let mut index = open_index(&dir, kind, 12).unwrap();
            for hash in 0..200u64 {
                index.put(hash * 13, loc(hash)).unwrap();
            }
            index.remove(13).unwrap();
            index.close().unwrap();
        }

        {
            let mut index = open_index(&dir, kind, 12).unwrap();
            assert_eq!(index.get(0).unwrap(), Some(loc(0)), "{:?}", kind);
            assert_eq!(index.get(13).unwrap(), None, "{:?}", kind);
            assert_eq!(index.get(199 * 13).unwrap(), Some(loc(199)), "{:?}", kind);
            assert_eq!(index.entries().unwrap().len(), 199);
        }
    }
}

// =============================================================================
// Hash Table Tests
// =============================================================================

#[test]
fn test_hash_table_file_size() {
    let (_temp, dir) = setup_temp_dir();
    let path = dir.join(TABLE_FILENAME);

    let _index = HashTableIndex::open(&path, 8).unwrap();

    assert_eq!(path.metadata().unwrap().len(), 256 * SLOT_SIZE as u64);
}

#[test]
fn test_hash_table_rejects_wrong_size() {
    let (_temp, dir) = setup_temp_dir();
    let path = dir.join(TABLE_FILENAME);

    drop(HashTableIndex::open(&path, 8).unwrap());

    let result = HashTableIndex::open(&path, 9);
    assert!(matches!(result, Err(PorkError::Corruption(_))));
}

#[test]
fn test_hash_table_detects_bad_slot_state() {
    let (_temp, dir) = setup_temp_dir();
    let path = dir.join(TABLE_FILENAME);

    {
        let mut index = HashTableIndex::open(&path, 8).unwrap();
        index.put(9, loc(9)).unwrap();
        Box::new(index).close().unwrap();
    }

    corrupt_byte(&path, 9 * SLOT_SIZE as u64, 0x7F);

    let mut index = HashTableIndex::open(&path, 8).unwrap();
    assert!(matches!(index.get(9), Err(PorkError::Corruption(_))));
    assert!(matches!(index.entries(), Err(PorkError::Corruption(_))));
}

// =============================================================================
// Mapped Index Tests
// =============================================================================

#[test]
fn test_mapped_shares_table_format() {
    let (_temp, dir) = setup_temp_dir();
    let path = dir.join(TABLE_FILENAME);

    {
        let mut index = HashTableIndex::open(&path, 8).unwrap();
        index.put(200, loc(7)).unwrap();
        Box::new(index).close().unwrap();
    }

    let mut mapped = MappedIndex::open(&path, 8).unwrap();
    assert_eq!(mapped.get(200).unwrap(), Some(loc(7)));
}

#[test]
fn test_mapped_writes_reach_file_on_flush() {
    let (_temp, dir) = setup_temp_dir();
    let path = dir.join(TABLE_FILENAME);

    let mut mapped = MappedIndex::open(&path, 8).unwrap();
    mapped.put(1, loc(1)).unwrap();
    mapped.flush().unwrap();

    // A second, independent reader sees the flushed slot
    let mut reader = HashTableIndex::open(&path, 8).unwrap();
    assert_eq!(reader.get(1).unwrap(), Some(loc(1)));
}

#[test]
fn test_mapped_destroy_removes_file() {
    let (_temp, dir) = setup_temp_dir();
    let path = dir.join(TABLE_FILENAME);

    let mut mapped = MappedIndex::open(&path, 6).unwrap();
    mapped.put(3, loc(3)).unwrap();
    assert!(path.exists());

    mapped.destroy().unwrap();
    assert!(!path.exists());
}

#[test]
fn test_mapped_rejects_wrong_size() {
    let (_temp, dir) = setup_temp_dir();
    let path = dir.join(TABLE_FILENAME);
    std::fs::write(&path, b"short").unwrap();

    let result = MappedIndex::open(&path, 6);
    assert!(matches!(result, Err(PorkError::Corruption(_))));
}

// =============================================================================
// Bucketing Index Tests
// =============================================================================

#[test]
fn test_bucket_overflow_is_capacity_error() {
    let (_temp, dir) = setup_temp_dir();
    let mut index = BucketingIndex::open(&dir.join(BUCKET_FILENAME), 16, 2, 3).unwrap();

    // Bucket 1 holds hashes with low bits 01
    index.put(0b0001, loc(1)).unwrap();
    index.put(0b0101, loc(2)).unwrap();
    index.put(0b1001, loc(3)).unwrap();

    let result = index.put(0b1101, loc(4));
    assert!(matches!(result, Err(PorkError::Capacity(_))));

    // Full bucket still accepts replacements and other buckets have room
    assert_eq!(index.put(0b0101, loc(5)).unwrap(), Some(loc(2)));
    index.put(0b0010, loc(6)).unwrap();

    // Removing frees a place in the bucket
    index.remove(0b0001).unwrap();
    index.put(0b1101, loc(4)).unwrap();
    assert_eq!(index.get(0b1101).unwrap(), Some(loc(4)));
}

#[test]
fn test_bucketing_wide_hashes() {
    let (_temp, dir) = setup_temp_dir();
    let mut index = BucketingIndex::open(&dir.join(BUCKET_FILENAME), 64, 4, 4).unwrap();

    index.put(u64::MAX, loc(1)).unwrap();
    index.put(0xDEAD_BEEF_0000_000F, loc(2)).unwrap();

    assert_eq!(index.get(u64::MAX).unwrap(), Some(loc(1)));
    assert_eq!(index.get(0xDEAD_BEEF_0000_000F).unwrap(), Some(loc(2)));
    assert_eq!(index.bucket_count(), 16);
}

#[test]
fn test_bucketing_detects_bad_count() {
    let (_temp, dir) = setup_temp_dir();
    let path = dir.join(BUCKET_FILENAME);

    drop(BucketingIndex::open(&path, 16, 2, 3).unwrap());
    corrupt_byte(&path, 0, 200);

    let mut index = BucketingIndex::open(&path, 16, 2, 3).unwrap();
    assert!(matches!(index.get(0), Err(PorkError::Corruption(_))));
}

// =============================================================================
// Utilities
// =============================================================================

fn corrupt_byte(path: &Path, offset: u64, value: u8) {
    let mut file = OpenOptions::new().write(true).open(path).unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.write_all(&[value]).unwrap();
    file.sync_all().unwrap();
}
