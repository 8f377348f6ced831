//! Individual File Store
//!
//! Every value lives in its own file named after a monotonically increasing
//! id: `values/{id:016x}.val`. Simple and robust, but one filesystem entry
//! per value makes it a poor fit for large key counts.
//!
//! Locator: `primary` = file id, `secondary` = payload length.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::{PorkError, Result};
use crate::locator::Locator;

use super::{DataLookup, DataStats};

const VALUE_EXTENSION: &str = "val";

/// One-file-per-value data store
pub struct IndividualFileStore {
    /// Directory holding the value files
    dir: PathBuf,

    /// Id for the next written value
    next_id: u64,
}

impl IndividualFileStore {
    /// Open or create the value directory
    ///
    /// The next id continues after the highest id found on disk.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;

        let mut max_id = 0u64;
        let mut count = 0usize;
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if let Some(id) = Self::parse_id(&entry.path()) {
                max_id = max_id.max(id);
                count += 1;
            }
        }

        debug!(dir = %dir.display(), values = count, next_id = max_id + 1, "opened individual file store");

        Ok(Self {
            dir: dir.to_path_buf(),
            next_id: max_id + 1,
        })
    }

    /// Id the next write will use
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// File path for a value id
    pub fn value_path(&self, id: u64) -> PathBuf {
        self.dir.join(format!("{:016x}.{}", id, VALUE_EXTENSION))
    }

    /// "000000000000002a.val" → Some(42)
    fn parse_id(path: &Path) -> Option<u64> {
        if path.extension()?.to_str()? != VALUE_EXTENSION {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        if stem.len() != 16 {
            return None;
        }
        u64::from_str_radix(stem, 16).ok()
    }

    fn missing(&self, locator: Locator) -> PorkError {
        PorkError::Corruption(format!(
            "value file {} is missing",
            self.value_path(locator.primary).display()
        ))
    }
}

impl DataLookup for IndividualFileStore {
    fn write(&mut self, bytes: &[u8]) -> Result<Locator> {
        let id = self.next_id;
        let path = self.value_path(id);

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        file.write_all(bytes)?;
        file.sync_data()?;

        self.next_id += 1;
        trace!(id, len = bytes.len(), "wrote value file");
        Ok(Locator::new(id, bytes.len() as u64))
    }

    fn read(&mut self, locator: Locator) -> Result<Vec<u8>> {
        let bytes = match fs::read(self.value_path(locator.primary)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(self.missing(locator)),
            Err(e) => return Err(e.into()),
        };

        if bytes.len() as u64 != locator.secondary {
            return Err(PorkError::Corruption(format!(
                "value file {:016x} holds {} bytes, expected {}",
                locator.primary,
                bytes.len(),
                locator.secondary
            )));
        }
        Ok(bytes)
    }

    fn free(&mut self, locator: Locator, _shrink: bool) -> Result<()> {
        match fs::remove_file(self.value_path(locator.primary)) {
            Ok(()) => {
                trace!(id = locator.primary, "removed value file");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(self.missing(locator)),
            Err(e) => Err(e.into()),
        }
    }

    fn stats(&self) -> Result<DataStats> {
        let mut bytes_on_disk = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if Self::parse_id(&entry.path()).is_some() {
                bytes_on_disk += entry.metadata()?.len();
            }
        }
        Ok(DataStats {
            bytes_on_disk,
            free_sectors: None,
        })
    }

    fn flush(&mut self) -> Result<()> {
        // Each value file is synced as it is written
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        debug!(dir = %self.dir.display(), "closed individual file store");
        Ok(())
    }
}
