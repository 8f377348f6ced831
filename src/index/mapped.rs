//! Mapped Hash Table Index
//!
//! Same slot layout as [`super::HashTableIndex`], accessed through a shared
//! writable memory map instead of read/write calls. Writes are visible to
//! other readers of the mapping immediately; they reach the file only when
//! the map is flushed, which `flush()` and `close()` do.
//!
//! ## Mapping Lifetime
//!
//! The map is owned by the index and lives exactly as long as it. Nothing
//! here resizes the table; deleting the backing file goes through
//! [`MappedIndex::destroy`], which takes `self` by value, so the borrow
//! checker guarantees no slot reference outlives the mapping and the map is
//! released before the file is removed.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use memmap2::MmapMut;
use tracing::debug;

use crate::error::{PorkError, Result};
use crate::locator::Locator;

use super::{check_hash, decode_slot, encode_slot, table_len, IndexLookup, SLOT_SIZE};

/// Memory-mapped direct-addressed index
#[derive(Debug)]
pub struct MappedIndex {
    path: PathBuf,
    /// Declared before `file` so it is unmapped first on drop
    mmap: MmapMut,
    #[allow(dead_code)]
    file: File,
    bits: u32,
}

impl MappedIndex {
    /// Open or create the table file at `path` and map it
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
            debug!(path = %path.display(), bits, "created mapped index");
        } else if actual != expected {
            return Err(PorkError::Corruption(format!(
                "index file {} is {} bytes, expected {} for {} bits",
                path.display(),
                actual,
                expected,
                bits
            )));
        }

        // SAFETY: MmapMut::map_mut is unsafe because the file could be changed
        // by another process while mapped. The container directory is owned by
        // a single PorkDb, the file has its final size before mapping, and the
        // map is dropped before the file handle.
        let mmap = unsafe { MmapMut::map_mut(&file)? };

        Ok(Self {
            path: path.to_path_buf(),
            mmap,
            file,
            bits,
        })
    }

    /// Path of the backing table file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unmap the table and delete its backing file
    pub fn destroy(self) -> Result<()> {
        let path = self.path.clone();
        drop(self);
        fs::remove_file(&path)?;
        debug!(path = %path.display(), "destroyed mapped index");
        Ok(())
    }

    fn slot(&self, hash: u64) -> &[u8] {
        let offset = hash as usize * SLOT_SIZE;
        &self.mmap[offset..offset + SLOT_SIZE]
    }

    fn slot_mut(&mut self, hash: u64) -> &mut [u8] {
        let offset = hash as usize * SLOT_SIZE;
        &mut self.mmap[offset..offset + SLOT_SIZE]
    }
}

impl IndexLookup for MappedIndex {
    fn get(&mut self, hash: u64) -> Result<Option<Locator>> {
        check_hash(hash, self.bits)?;
        decode_slot(self.slot(hash), hash)
    }

    fn put(&mut self, hash: u64, locator: Locator) -> Result<Option<Locator>> {
        check_hash(hash, self.bits)?;
        let previous = decode_slot(self.slot(hash), hash)?;
        self.slot_mut(hash)
            .copy_from_slice(&encode_slot(Some(locator)));
        Ok(previous)
    }

    fn remove(&mut self, hash: u64) -> Result<Option<Locator>> {
        check_hash(hash, self.bits)?;
        let previous = decode_slot(self.slot(hash), hash)?;
        if previous.is_some() {
            self.slot_mut(hash).copy_from_slice(&encode_slot(None));
        }
        Ok(previous)
    }

    fn entries(&mut self) -> Result<Vec<(u64, Locator)>> {
        let mut entries = Vec::new();
        for (hash, slot) in self.mmap.chunks_exact(SLOT_SIZE).enumerate() {
            if let Some(locator) = decode_slot(slot, hash as u64)? {
                entries.push((hash as u64, locator));
            }
        }
        Ok(entries)
    }

    fn flush(&mut self) -> Result<()> {
        self.mmap.flush()?;
        Ok(())
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        self.flush()?;
        debug!(path = %self.path.display(), "closed mapped index");
        Ok(())
    }
}
