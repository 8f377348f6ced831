//! # PorkDB
//!
//! An embedded, disk-backed key-value storage engine built from
//! interchangeable parts:
//! - A key hasher reducing keys to a fixed-width hash
//! - An index mapping hashes to locators (hash table, bucketing, memory-mapped)
//! - A data store mapping locators to bytes (individual files, sector
//!   chains, append-only log)
//! - An optional compression codec between serialization and storage
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         PorkDb                               │
//! │              (root directory, open containers)               │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      DbMap<K, V>                             │
//! │     serializer → KeyHasher → IndexLookup → DataLookup        │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │ IndexLookup │          │ DataLookup  │
//!   │ hash → loc  │          │ loc → bytes │
//!   └─────────────┘          └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use porkdb::{ContainerConfig, DbMap, DbMapOptions, PorkDb};
//!
//! # fn main() -> porkdb::Result<()> {
//! let db = PorkDb::builder("./pork_data").build()?;
//! let users = db.get_container::<DbMap<String, u64>, _>("users", || {
//!     Ok(DbMapOptions::bincode(ContainerConfig::builder().hash_bits(20).build()?))
//! })?;
//!
//! users.put(&"alice".to_string(), &42)?;
//! assert_eq!(users.get(&"alice".to_string())?, Some(42));
//! db.close()?;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod compression;
pub mod hasher;
pub mod locator;
pub mod serializer;

pub mod index;
pub mod data;
pub mod map;
pub mod db;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use compression::Compression;
pub use config::{ContainerConfig, DataKind, HasherKind, IndexKind};
pub use db::{Container, PorkDb};
pub use error::{PorkError, Result};
pub use hasher::KeyHasher;
pub use locator::Locator;
pub use map::{DbMap, DbMapOptions, MapStats};
pub use serializer::{BincodeSerializer, RawSerializer, Serializer};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of PorkDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
