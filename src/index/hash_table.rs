//! Hash Table Index
//!
//! Direct-addressed table: slot `hash` holds the locator for that hash.
//! Every operation is a single positioned read or write of one slot.
//! Two keys whose hashes collide share a slot; the later put wins.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{PorkError, Result};
use crate::locator::Locator;

use super::{check_hash, decode_slot, encode_slot, table_len, IndexLookup, SLOT_SIZE};

/// File-backed direct-addressed index
pub struct HashTableIndex {
    /// Path to the table file
    path: PathBuf,
    /// Open table file (read + write)
    file: File,
    /// Hash width; the table holds `2^bits` slots
    bits: u32,
}

impl HashTableIndex {
    /// Open or create the table file at `path`
    ///
    /// A new file is sized to `2^bits` empty slots up front (sparse on most
    /// filesystems). An existing file of any other size is rejected.
    pub fn open(path: &Path, bits: u32) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let expected = table_len(bits);
        let actual = file.metadata()?.len();

        if actual == 0 {
            file.set_len(expected)?;
            debug!(path = %path.display(), bits, "created hash table index");
        } else if actual != expected {
            return Err(PorkError::Corruption(format!(
                "index file {} is {} bytes, expected {} for {} bits",
                path.display(),
                actual,
                expected,
                bits
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            file,
            bits,
        })
    }

    /// Path of the backing table file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_slot(&mut self, hash: u64) -> Result<Option<Locator>> {
        let mut slot = [0u8; SLOT_SIZE];
        self.file
            .seek(SeekFrom::Start(hash * SLOT_SIZE as u64))?;
        self.file.read_exact(&mut slot)?;
        decode_slot(&slot, hash)
    }

    fn write_slot(&mut self, hash: u64, locator: Option<Locator>) -> Result<()> {
        let slot = encode_slot(locator);
        self.file
            .seek(SeekFrom::Start(hash * SLOT_SIZE as u64))?;
        self.file.write_all(&slot)?;
        Ok(())
    }
}

impl IndexLookup for HashTableIndex {
    fn get(&mut self, hash: u64) -> Result<Option<Locator>> {
        check_hash(hash, self.bits)?;
        self.read_slot(hash)
    }

    fn put(&mut self, hash: u64, locator: Locator) -> Result<Option<Locator>> {
        check_hash(hash, self.bits)?;
        let previous = self.read_slot(hash)?;
        self.write_slot(hash, Some(locator))?;
        Ok(previous)
    }

    fn remove(&mut self, hash: u64) -> Result<Option<Locator>> {
        check_hash(hash, self.bits)?;
        let previous = self.read_slot(hash)?;
        if previous.is_some() {
            self.write_slot(hash, None)?;
        }
        Ok(previous)
    }

    fn entries(&mut self) -> Result<Vec<(u64, Locator)>> {
        self.file.seek(SeekFrom::Start(0))?;
        let mut reader = BufReader::new(&self.file);
        let mut slot = [0u8; SLOT_SIZE];
        let mut entries = Vec::new();

        for hash in 0..(1u64 << self.bits) {
            reader.read_exact(&mut slot)?;
            if let Some(locator) = decode_slot(&slot, hash)? {
                entries.push((hash, locator));
            }
        }

        Ok(entries)
    }

    fn flush(&mut self) -> Result<()> {
        self.file.sync_data()?;
        Ok(())
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        self.flush()?;
        debug!(path = %self.path.display(), "closed hash table index");
        Ok(())
    }
}
