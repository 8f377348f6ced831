//! Index Module
//!
//! Maps fixed-width key hashes to [`Locator`]s. At most one entry exists
//! per hash; writing a hash that is already present replaces its locator.
//!
//! ## Strategies
//! - [`HashTableIndex`]: direct-addressed slots read and written with file I/O
//! - [`BucketingIndex`]: bounded buckets scanned linearly, overflow is an error
//! - [`MappedIndex`]: the hash table layout accessed through a memory map
//!
//! ## Slot Format (hash table and mapped index)
//! ```text
//! ┌───────────┬───────────────────────────┐
//! │ State (1) │ Locator (16)              │
//! └───────────┴───────────────────────────┘
//! State: 0 = empty, 1 = occupied
//! ```
//! Slot `i` lives at offset `i * SLOT_SIZE`; the file holds `2^bits` slots
//! and nothing else.

mod bucketing;
mod hash_table;
mod mapped;

use std::path::Path;

use bytes::BufMut;

use crate::config::IndexKind;
use crate::error::{PorkError, Result};
use crate::locator::{Locator, LOCATOR_SIZE};

pub use bucketing::BucketingIndex;
pub use hash_table::HashTableIndex;
pub use mapped::MappedIndex;

// =============================================================================
// Shared Constants
// =============================================================================

/// File holding the direct-addressed slot table
pub const TABLE_FILENAME: &str = "index.tbl";

/// File holding the bucket directory
pub const BUCKET_FILENAME: &str = "index.bkt";

/// Size of one direct-addressed slot
pub const SLOT_SIZE: usize = 1 + LOCATOR_SIZE;

const SLOT_EMPTY: u8 = 0;
const SLOT_OCCUPIED: u8 = 1;

// =============================================================================
// IndexLookup Trait
// =============================================================================

/// Hash → locator mapping, durable across close/reopen
///
/// Lookups take `&mut self` since file-backed implementations seek.
pub trait IndexLookup: Send {
    /// Locator stored for `hash`, if any
    fn get(&mut self, hash: u64) -> Result<Option<Locator>>;

    /// Store `locator` for `hash`, returning the locator it replaced
    fn put(&mut self, hash: u64, locator: Locator) -> Result<Option<Locator>>;

    /// Remove the entry for `hash`, returning its locator
    fn remove(&mut self, hash: u64) -> Result<Option<Locator>>;

    /// Every stored (hash, locator) pair, in hash order for direct tables
    fn entries(&mut self) -> Result<Vec<(u64, Locator)>>;

    /// Persist pending changes
    fn flush(&mut self) -> Result<()>;

    /// Flush and release file handles and mappings
    fn close(self: Box<Self>) -> Result<()>;
}

/// Open the index selected by `kind` inside a container directory
pub fn open_index(dir: &Path, kind: IndexKind, hash_bits: u32) -> Result<Box<dyn IndexLookup>> {
    let index: Box<dyn IndexLookup> = match kind {
        IndexKind::HashTable => {
            Box::new(HashTableIndex::open(&dir.join(TABLE_FILENAME), hash_bits)?)
        }
        IndexKind::Mapped => Box::new(MappedIndex::open(&dir.join(TABLE_FILENAME), hash_bits)?),
        IndexKind::Bucketing {
            bucket_bits,
            entries_per_bucket,
        } => Box::new(BucketingIndex::open(
            &dir.join(BUCKET_FILENAME),
            hash_bits,
            bucket_bits,
            entries_per_bucket,
        )?),
    };
    Ok(index)
}

// =============================================================================
// Shared Helpers
// =============================================================================

/// Reject hashes wider than the index was created for
pub(crate) fn check_hash(hash: u64, bits: u32) -> Result<()> {
    if bits < 64 && hash >> bits != 0 {
        return Err(PorkError::Config(format!(
            "hash {:#x} does not fit in {} bits",
            hash, bits
        )));
    }
    Ok(())
}

/// Expected byte length of a direct-addressed table
pub(crate) fn table_len(bits: u32) -> u64 {
    (1u64 << bits) * SLOT_SIZE as u64
}

pub(crate) fn encode_slot(locator: Option<Locator>) -> [u8; SLOT_SIZE] {
    let mut slot = [0u8; SLOT_SIZE];
    if let Some(locator) = locator {
        let mut buf = &mut slot[..];
        buf.put_u8(SLOT_OCCUPIED);
        locator.encode(&mut buf);
    }
    slot
}

pub(crate) fn decode_slot(slot: &[u8], index: u64) -> Result<Option<Locator>> {
    match slot[0] {
        SLOT_EMPTY => Ok(None),
        SLOT_OCCUPIED => {
            let mut body = &slot[1..SLOT_SIZE];
            Ok(Some(Locator::decode(&mut body)))
        }
        state => Err(PorkError::Corruption(format!(
            "index slot {} has invalid state byte {:#04x}",
            index, state
        ))),
    }
}
