//! Tests for PorkDb
//!
//! These tests verify:
//! - Root directory creation
//! - Container registration and reuse
//! - Type mismatch and name validation
//! - Closing every container exactly once
//! - Reopening containers under a new PorkDb

use std::cell::Cell;
use std::sync::Arc;

use porkdb::config::{ContainerConfig, DataKind, IndexKind};
use porkdb::map::{DbMap, DbMapOptions};
use porkdb::{PorkDb, PorkError};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

type StringMap = DbMap<String, String>;

fn setup_temp_db() -> (TempDir, PorkDb) {
    let temp_dir = TempDir::new().unwrap();
    let db = PorkDb::builder(temp_dir.path().join("root")).build().unwrap();
    (temp_dir, db)
}

fn string_map(db: &PorkDb, name: &str) -> Arc<StringMap> {
    db.get_container::<StringMap, _>(name, || {
        Ok(DbMapOptions::bincode(ContainerConfig::default()))
    })
    .unwrap()
}

// =============================================================================
// Builder Tests
// =============================================================================

#[test]
fn test_builder_creates_root() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("a").join("b");

    let db = PorkDb::builder(&root).build().unwrap();

    assert!(root.is_dir());
    assert_eq!(db.root(), root.as_path());
    db.close().unwrap();
}

#[test]
fn test_builder_without_create_requires_root() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("missing");

    let result = PorkDb::builder(&root).create_if_missing(false).build();

    assert!(matches!(result, Err(PorkError::Config(_))));
    assert!(!root.exists());
}

// =============================================================================
// Container Registration Tests
// =============================================================================

#[test]
fn test_get_container_creates_directory() {
    let (_temp, db) = setup_temp_db();

    let map = string_map(&db, "users");

    assert!(db.root().join("users").is_dir());
    assert!(db.root().join("users").join("index.tbl").exists());
    assert!(db.root().join("users").join("data.sec").exists());
    assert_eq!(map.dir(), db.root().join("users").as_path());
    assert!(db.is_open("users"));
}

#[test]
fn test_get_container_returns_same_instance() {
    let (_temp, db) = setup_temp_db();
    let first = string_map(&db, "users");
    let calls = Cell::new(0);

    let second = db
        .get_container::<StringMap, _>("users", || {
            calls.set(calls.get() + 1);
            Ok(DbMapOptions::bincode(ContainerConfig::default()))
        })
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(calls.get(), 0);
}

#[test]
fn test_get_container_type_mismatch() {
    let (_temp, db) = setup_temp_db();
    let _users = string_map(&db, "users");

    let result = db.get_container::<DbMap<u64, u64>, _>("users", || {
        Ok(DbMapOptions::bincode(ContainerConfig::default()))
    });

    assert!(matches!(result, Err(PorkError::ContainerType(_))));
}

#[test]
fn test_get_container_rejects_bad_names() {
    let (_temp, db) = setup_temp_db();

    for name in ["", ".", "..", "a/b", "a\\b"] {
        let result = db.get_container::<StringMap, _>(name, || {
            Ok(DbMapOptions::bincode(ContainerConfig::default()))
        });
        assert!(matches!(result, Err(PorkError::Config(_))), "{:?}", name);
    }
}

#[test]
fn test_configure_error_registers_nothing() {
    let (_temp, db) = setup_temp_db();

    let result = db.get_container::<StringMap, _>("broken", || {
        let config = ContainerConfig::builder().hash_bits(0).build()?;
        Ok(DbMapOptions::bincode(config))
    });

    assert!(matches!(result, Err(PorkError::Config(_))));
    assert!(!db.is_open("broken"));
    assert!(!db.root().join("broken").exists());
}

#[test]
fn test_containers_are_independent() {
    let (_temp, db) = setup_temp_db();
    let users = string_map(&db, "users");
    let blobs = db
        .get_container::<DbMap<u64, Vec<u8>>, _>("blobs", || {
            let config = ContainerConfig::builder()
                .hash_bits(24)
                .index(IndexKind::Bucketing {
                    bucket_bits: 8,
                    entries_per_bucket: 16,
                })
                .data(DataKind::IndividualFile)
                .build()?;
            Ok(DbMapOptions::bincode(config))
        })
        .unwrap();

    users.put(&"alice".to_string(), &"admin".to_string()).unwrap();
    blobs.put(&7, &vec![1, 2, 3]).unwrap();

    assert_eq!(users.len().unwrap(), 1);
    assert_eq!(blobs.get(&7).unwrap(), Some(vec![1, 2, 3]));
    assert_eq!(db.container_names(), vec!["blobs".to_string(), "users".to_string()]);
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_close_closes_every_container() {
    let (_temp, db) = setup_temp_db();
    let users = string_map(&db, "users");
    let groups = string_map(&db, "groups");

    db.close().unwrap();

    assert!(users.is_closed());
    assert!(groups.is_closed());
    assert!(matches!(
        users.get(&"x".to_string()),
        Err(PorkError::Closed(_))
    ));
}

#[test]
fn test_close_container() {
    let (_temp, db) = setup_temp_db();
    let users = string_map(&db, "users");

    assert!(db.close_container("users").unwrap());
    assert!(users.is_closed());
    assert!(!db.is_open("users"));
    assert!(!db.close_container("users").unwrap());

    // Reopening yields a fresh instance over the same data
    let reopened = string_map(&db, "users");
    assert!(!Arc::ptr_eq(&users, &reopened));
    assert!(!reopened.is_closed());
}

#[test]
fn test_reopen_database_preserves_data() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("root");

    {
        let db = PorkDb::builder(&root).build().unwrap();
        let users = string_map(&db, "users");
        for i in 0..8 {
            users.put(&format!("user{}", i), &format!("name{}", i)).unwrap();
        }
        users.remove(&"user3".to_string(), false).unwrap();
        db.flush().unwrap();
        db.close().unwrap();
    }

    {
        let db = PorkDb::builder(&root).build().unwrap();
        let users = string_map(&db, "users");
        assert_eq!(users.get(&"user0".to_string()).unwrap(), Some("name0".to_string()));
        assert_eq!(users.get(&"user7".to_string()).unwrap(), Some("name7".to_string()));
        assert_eq!(users.get(&"user3".to_string()).unwrap(), None);
        db.close().unwrap();
    }
}

#[test]
fn test_drop_closes_containers() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("root");

    let users = {
        let db = PorkDb::builder(&root).build().unwrap();
        let users = string_map(&db, "users");
        users.put(&"k".to_string(), &"v".to_string()).unwrap();
        users
    };

    assert!(users.is_closed());

    let db = PorkDb::builder(&root).build().unwrap();
    let users = string_map(&db, "users");
    assert_eq!(users.get(&"k".to_string()).unwrap(), Some("v".to_string()));
}
