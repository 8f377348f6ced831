//! Data Module
//!
//! Stores raw value bytes and hands back a [`Locator`] for each write.
//! A locator is valid until it is freed, and must be freed at most once.
//!
//! Data stores do not coordinate with the index; the map writes data
//! before it publishes a locator in the index, so a crash can leak space
//! but never leaves the index pointing at unwritten bytes.
//!
//! ## Strategies
//! - [`IndividualFileStore`]: one file per value under `values/`
//! - [`SectoredStore`]: sector chains in `data.sec` with a persistent free list
//! - [`WriteOnceStore`]: append-only `data.log`, frees leave garbage behind

mod individual;
mod sectored;
mod write_once;

use std::path::Path;

use crate::config::DataKind;
use crate::error::Result;
use crate::locator::Locator;

pub use individual::IndividualFileStore;
pub use sectored::{SectoredStore, SECTOR_HEADER_SIZE};
pub use write_once::{WriteOnceStore, RECORD_HEADER_SIZE};

// =============================================================================
// Shared Constants
// =============================================================================

/// Directory holding one file per value
pub const VALUES_DIRNAME: &str = "values";

/// Sector file for the sectored store
pub const SECTOR_FILENAME: &str = "data.sec";

/// Log file for the write-once store
pub const LOG_FILENAME: &str = "data.log";

// =============================================================================
// DataLookup Trait
// =============================================================================

/// Locator → bytes storage
pub trait DataLookup: Send {
    /// Store `bytes` and return where they went
    fn write(&mut self, bytes: &[u8]) -> Result<Locator>;

    /// Read back the bytes stored at `locator`
    fn read(&mut self, locator: Locator) -> Result<Vec<u8>>;

    /// Release the space behind `locator`
    ///
    /// `shrink` asks the store to hand space back to the filesystem right
    /// away; stores that cannot do so ignore it.
    fn free(&mut self, locator: Locator, shrink: bool) -> Result<()>;

    /// Storage usage snapshot
    fn stats(&self) -> Result<DataStats>;

    /// Persist pending changes
    fn flush(&mut self) -> Result<()>;

    /// Flush and release file handles
    fn close(self: Box<Self>) -> Result<()>;
}

/// Storage usage reported by a data store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataStats {
    /// Bytes occupied on disk, including headers and free space
    pub bytes_on_disk: u64,

    /// Sectors on the free list (sectored store only)
    pub free_sectors: Option<u64>,
}

/// Open the data store selected by `kind` inside a container directory
pub fn open_data(dir: &Path, kind: DataKind) -> Result<Box<dyn DataLookup>> {
    let data: Box<dyn DataLookup> = match kind {
        DataKind::IndividualFile => {
            Box::new(IndividualFileStore::open(&dir.join(VALUES_DIRNAME))?)
        }
        DataKind::Sectored { sector_size } => {
            Box::new(SectoredStore::open(&dir.join(SECTOR_FILENAME), sector_size)?)
        }
        DataKind::WriteOnce => Box::new(WriteOnceStore::open(&dir.join(LOG_FILENAME))?),
    };
    Ok(data)
}
