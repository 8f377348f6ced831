//! Bucketing Index
//!
//! Splits the hash space into `2^bucket_bits` buckets by the low bits of the
//! hash. Each bucket holds at most `entries_per_bucket` (hash, locator)
//! pairs and every operation reads, scans and rewrites only its own bucket.
//! Colliding hashes share an entry; distinct hashes in a full bucket are
//! refused with [`PorkError::Capacity`].
//!
//! ## Bucket Format
//! ```text
//! ┌───────────┬──────────────────────────────────────────────┐
//! │ Count (4) │ Entry × entries_per_bucket                   │
//! │           │   [Hash (8)][Locator (16)]                   │
//! └───────────┴──────────────────────────────────────────────┘
//! ```
//! Unused entries are zero filled. Bucket `b` starts at `b * bucket_size`.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut, BytesMut};
use tracing::debug;

use crate::error::{PorkError, Result};
use crate::locator::{Locator, LOCATOR_SIZE};

use super::{check_hash, IndexLookup};

/// Bucket header: entry count
const COUNT_SIZE: usize = 4;

/// One bucket entry: hash + locator
const ENTRY_SIZE: usize = 8 + LOCATOR_SIZE;

/// File-backed index of bounded buckets
pub struct BucketingIndex {
    path: PathBuf,
    file: File,
    hash_bits: u32,
    bucket_bits: u32,
    entries_per_bucket: u32,
    /// Bytes per bucket record
    bucket_size: u64,
}

impl BucketingIndex {
    /// Open or create the bucket file at `path`
    pub fn open(
        path: &Path,
        hash_bits: u32,
        bucket_bits: u32,
        entries_per_bucket: u32,
    ) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let bucket_size = (COUNT_SIZE + ENTRY_SIZE * entries_per_bucket as usize) as u64;
        let expected = (1u64 << bucket_bits) * bucket_size;
        let actual = file.metadata()?.len();

        if actual == 0 {
            file.set_len(expected)?;
            debug!(
                path = %path.display(),
                bucket_bits,
                entries_per_bucket,
                "created bucketing index"
            );
        } else if actual != expected {
            return Err(PorkError::Corruption(format!(
                "bucket file {} is {} bytes, expected {}",
                path.display(),
                actual,
                expected
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            file,
            hash_bits,
            bucket_bits,
            entries_per_bucket,
            bucket_size,
        })
    }

    /// Number of buckets
    pub fn bucket_count(&self) -> u64 {
        1u64 << self.bucket_bits
    }

    /// Maximum entries per bucket
    pub fn entries_per_bucket(&self) -> u32 {
        self.entries_per_bucket
    }

    fn bucket_of(&self, hash: u64) -> u64 {
        hash & ((1u64 << self.bucket_bits) - 1)
    }

    /// Read and parse one bucket
    fn read_bucket(&mut self, bucket: u64) -> Result<Vec<(u64, Locator)>> {
        let mut raw = vec![0u8; self.bucket_size as usize];
        self.file.seek(SeekFrom::Start(bucket * self.bucket_size))?;
        self.file.read_exact(&mut raw)?;

        let mut buf = &raw[..];
        let count = buf.get_u32_le();
        if count > self.entries_per_bucket {
            return Err(PorkError::Corruption(format!(
                "bucket {} claims {} entries, capacity is {}",
                bucket, count, self.entries_per_bucket
            )));
        }

        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let hash = buf.get_u64_le();
            let locator = Locator::decode(&mut buf);
            entries.push((hash, locator));
        }
        Ok(entries)
    }

    /// Rewrite one bucket in full
    fn write_bucket(&mut self, bucket: u64, entries: &[(u64, Locator)]) -> Result<()> {
        let mut buf = BytesMut::with_capacity(self.bucket_size as usize);
        buf.put_u32_le(entries.len() as u32);
        for (hash, locator) in entries {
            buf.put_u64_le(*hash);
            locator.encode(&mut buf);
        }
        buf.resize(self.bucket_size as usize, 0);

        self.file.seek(SeekFrom::Start(bucket * self.bucket_size))?;
        self.file.write_all(&buf)?;
        Ok(())
    }
}

impl IndexLookup for BucketingIndex {
    fn get(&mut self, hash: u64) -> Result<Option<Locator>> {
        check_hash(hash, self.hash_bits)?;
        let entries = self.read_bucket(self.bucket_of(hash))?;
        Ok(entries
            .into_iter()
            .find(|(h, _)| *h == hash)
            .map(|(_, locator)| locator))
    }

    fn put(&mut self, hash: u64, locator: Locator) -> Result<Option<Locator>> {
        check_hash(hash, self.hash_bits)?;
        let bucket = self.bucket_of(hash);
        let mut entries = self.read_bucket(bucket)?;

        let previous = match entries.iter_mut().find(|(h, _)| *h == hash) {
            Some(entry) => Some(std::mem::replace(&mut entry.1, locator)),
            None => {
                if entries.len() >= self.entries_per_bucket as usize {
                    return Err(PorkError::Capacity(format!(
                        "bucket {} is full ({} entries)",
                        bucket, self.entries_per_bucket
                    )));
                }
                entries.push((hash, locator));
                None
            }
        };

        self.write_bucket(bucket, &entries)?;
        Ok(previous)
    }

    fn remove(&mut self, hash: u64) -> Result<Option<Locator>> {
        check_hash(hash, self.hash_bits)?;
        let bucket = self.bucket_of(hash);
        let mut entries = self.read_bucket(bucket)?;

        match entries.iter().position(|(h, _)| *h == hash) {
            Some(pos) => {
                let (_, locator) = entries.swap_remove(pos);
                self.write_bucket(bucket, &entries)?;
                Ok(Some(locator))
            }
            None => Ok(None),
        }
    }

    fn entries(&mut self) -> Result<Vec<(u64, Locator)>> {
        let mut all = Vec::new();
        for bucket in 0..self.bucket_count() {
            all.extend(self.read_bucket(bucket)?);
        }
        all.sort_unstable_by_key(|(hash, _)| *hash);
        Ok(all)
    }

    fn flush(&mut self) -> Result<()> {
        self.file.sync_data()?;
        Ok(())
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        self.flush()?;
        debug!(path = %self.path.display(), "closed bucketing index");
        Ok(())
    }
}
