//! Write-Once Store
//!
//! An append-only log. Every write appends a new record; nothing is ever
//! overwritten in place. Freeing a locator does nothing, so updates and
//! removals leave the old bytes behind as unreclaimed garbage.
//!
//! ## Record Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────┐
//! │ Len (4)  │ CRC (4)  │      Payload        │
//! └──────────┴──────────┴─────────────────────┘
//! ```
//!
//! Locator: `primary` = record offset, `secondary` = payload length.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut, BytesMut};
use tracing::{debug, trace};

use crate::error::{PorkError, Result};
use crate::locator::Locator;

use super::{DataLookup, DataStats};

/// Length (4) + CRC32 (4)
pub const RECORD_HEADER_SIZE: u64 = 8;

/// Append-only data store
pub struct WriteOnceStore {
    path: PathBuf,
    file: File,
    /// Offset where the next record is appended
    end: u64,
}

impl WriteOnceStore {
    /// Open or create the log at `path`
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let end = file.metadata()?.len();

        debug!(path = %path.display(), size = end, "opened write-once store");

        Ok(Self {
            path: path.to_path_buf(),
            file,
            end,
        })
    }

    /// Current log size in bytes
    pub fn len(&self) -> u64 {
        self.end
    }

    pub fn is_empty(&self) -> bool {
        self.end == 0
    }
}

impl DataLookup for WriteOnceStore {
    fn write(&mut self, bytes: &[u8]) -> Result<Locator> {
        let len = u32::try_from(bytes.len()).map_err(|_| {
            PorkError::Capacity(format!("value of {} bytes exceeds record limit", bytes.len()))
        })?;
        let crc = crc32fast::hash(bytes);

        let mut record = BytesMut::with_capacity(RECORD_HEADER_SIZE as usize + bytes.len());
        record.put_u32_le(len);
        record.put_u32_le(crc);
        record.put_slice(bytes);

        let offset = self.end;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&record)?;
        self.end += record.len() as u64;

        trace!(offset, len, "appended record");
        Ok(Locator::new(offset, len as u64))
    }

    fn read(&mut self, locator: Locator) -> Result<Vec<u8>> {
        let offset = locator.primary;
        let record_end = offset
            .checked_add(RECORD_HEADER_SIZE)
            .and_then(|n| n.checked_add(locator.secondary));
        if record_end.map_or(true, |end| end > self.end) {
            return Err(PorkError::Corruption(format!(
                "record at offset {} extends past end of log ({} bytes)",
                offset, self.end
            )));
        }

        let mut header = [0u8; RECORD_HEADER_SIZE as usize];
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut header)?;

        let mut buf = &header[..];
        let len = buf.get_u32_le();
        let crc = buf.get_u32_le();
        if len as u64 != locator.secondary {
            return Err(PorkError::Corruption(format!(
                "record at offset {} has length {}, expected {}",
                offset, len, locator.secondary
            )));
        }

        let mut payload = vec![0u8; len as usize];
        self.file.read_exact(&mut payload)?;

        if crc32fast::hash(&payload) != crc {
            return Err(PorkError::Corruption(format!(
                "record at offset {} failed checksum",
                offset
            )));
        }
        Ok(payload)
    }

    fn free(&mut self, locator: Locator, _shrink: bool) -> Result<()> {
        trace!(offset = locator.primary, len = locator.secondary, "record orphaned");
        Ok(())
    }

    fn stats(&self) -> Result<DataStats> {
        Ok(DataStats {
            bytes_on_disk: self.end,
            free_sectors: None,
        })
    }

    fn flush(&mut self) -> Result<()> {
        self.file.sync_data()?;
        Ok(())
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        self.flush()?;
        debug!(path = %self.path.display(), size = self.end, "closed write-once store");
        Ok(())
    }
}
