//! Sectored Store
//!
//! Values are stored in chains of fixed-size sectors inside one shared
//! file, much like a minimal FAT. Freed chains are spliced onto a
//! persistent free list and reused before the file grows.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ Sector 0: Allocator Header                                  │
//! │   Magic "PKSE" (4) | Version u16 (2) | SectorSize u32 (4)   │
//! │   SectorCount u64 (8) | FreeHead u64 (8) | FreeCount u64 (8)│
//! │   CRC32 of the above (4) | zero padding                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Sector 1..N                                                 │
//! │   Next u64 (8) | Len u32 (4) | Payload (sector_size - 12)   │
//! │   Next = 0 ends a chain                                     │
//! │   Len = total payload length in a value's first sector      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Free sectors link to each other through the same `Next` field starting
//! at `FreeHead`. Fragmented free space is never compacted; `shrink` only
//! trims free sectors off the end of the file.
//!
//! Locator: `primary` = first sector, `secondary` = payload length.
//!
//! ## Write Ordering
//! Allocation persists the header (sectors leave the free list, file grows)
//! before any payload is written, and a free links the chain onto the free
//! list before the header points at it. A crash at any step leaks sectors
//! at worst.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut, BytesMut};
use tracing::{debug, trace, warn};

use crate::error::{PorkError, Result};
use crate::locator::Locator;

use super::{DataLookup, DataStats};

// =============================================================================
// Format Constants
// =============================================================================

/// Magic bytes identifying a sector file
const MAGIC: &[u8; 4] = b"PKSE";

/// Current sector file format version
const VERSION: u16 = 1;

/// Magic (4) + Version (2) + SectorSize (4) + SectorCount (8) + FreeHead (8) + FreeCount (8)
const HEADER_BODY_SIZE: usize = 34;

/// Header body + CRC32 (4)
const HEADER_SIZE: usize = HEADER_BODY_SIZE + 4;

/// Next (8) + Len (4) at the start of every data sector
pub const SECTOR_HEADER_SIZE: u64 = 12;

/// Chain terminator; sector 0 is the header so it is never part of a chain
const END_OF_CHAIN: u64 = 0;

/// Sector-chain data store with a persistent free list
pub struct SectoredStore {
    path: PathBuf,
    file: File,
    sector_size: u64,
    /// Sectors in the file, including the header sector
    sector_count: u64,
    /// First free sector, or END_OF_CHAIN
    free_head: u64,
    free_count: u64,
}

impl SectoredStore {
    /// Open or create the sector file at `path`
    ///
    /// An existing file must carry a valid header written with the same
    /// sector size.
    pub fn open(path: &Path, sector_size: u32) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let file_len = file.metadata()?.len();

        let mut store = Self {
            path: path.to_path_buf(),
            file,
            sector_size: sector_size as u64,
            sector_count: 1,
            free_head: END_OF_CHAIN,
            free_count: 0,
        };

        if file_len == 0 {
            store.file.set_len(store.sector_size)?;
            store.write_header()?;
            debug!(path = %path.display(), sector_size, "created sectored store");
            return Ok(store);
        }

        store.read_header()?;

        let expected = store.sector_count * store.sector_size;
        if file_len < expected {
            return Err(PorkError::Corruption(format!(
                "sector file {} is {} bytes, header claims {} sectors ({} bytes)",
                path.display(),
                file_len,
                store.sector_count,
                expected
            )));
        }
        if file_len > expected {
            // Growth that never made it into the header; reused on next growth
            warn!(
                path = %path.display(),
                leaked_bytes = file_len - expected,
                "sector file longer than header records"
            );
        }

        debug!(
            path = %path.display(),
            sector_size,
            sectors = store.sector_count,
            free = store.free_count,
            "opened sectored store"
        );
        Ok(store)
    }

    /// Total sectors in the file, including the header sector
    pub fn sector_count(&self) -> u64 {
        self.sector_count
    }

    /// Sectors currently on the free list
    pub fn free_count(&self) -> u64 {
        self.free_count
    }

    /// Payload bytes one sector carries
    pub fn payload_per_sector(&self) -> u64 {
        self.sector_size - SECTOR_HEADER_SIZE
    }

    /// Sectors needed for a payload of `len` bytes (at least one)
    pub fn sectors_for(&self, len: u64) -> u64 {
        len.div_ceil(self.payload_per_sector()).max(1)
    }

    // =========================================================================
    // Allocator Header
    // =========================================================================

    fn write_header(&mut self) -> Result<()> {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE);
        buf.put_slice(MAGIC);
        buf.put_u16_le(VERSION);
        buf.put_u32_le(self.sector_size as u32);
        buf.put_u64_le(self.sector_count);
        buf.put_u64_le(self.free_head);
        buf.put_u64_le(self.free_count);
        let crc = crc32fast::hash(&buf);
        buf.put_u32_le(crc);

        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&buf)?;
        Ok(())
    }

    fn read_header(&mut self) -> Result<()> {
        let mut raw = [0u8; HEADER_SIZE];
        self.file.seek(SeekFrom::Start(0))?;
        self.file.read_exact(&mut raw)?;

        let stored_crc = (&raw[HEADER_BODY_SIZE..]).get_u32_le();
        if crc32fast::hash(&raw[..HEADER_BODY_SIZE]) != stored_crc {
            return Err(PorkError::Corruption(format!(
                "sector file {} header checksum mismatch",
                self.path.display()
            )));
        }

        let mut buf = &raw[..HEADER_BODY_SIZE];
        if &buf[..4] != MAGIC {
            return Err(PorkError::Corruption(format!(
                "invalid sector file magic: expected PKSE, got {:?}",
                &buf[..4]
            )));
        }
        buf.advance(4);

        let version = buf.get_u16_le();
        if version != VERSION {
            return Err(PorkError::Corruption(format!(
                "unsupported sector file version: {}",
                version
            )));
        }

        let sector_size = buf.get_u32_le() as u64;
        if sector_size != self.sector_size {
            return Err(PorkError::Corruption(format!(
                "sector file written with {}-byte sectors, opened with {}",
                sector_size, self.sector_size
            )));
        }

        self.sector_count = buf.get_u64_le();
        self.free_head = buf.get_u64_le();
        self.free_count = buf.get_u64_le();

        if self.sector_count == 0 || self.free_count >= self.sector_count {
            return Err(PorkError::Corruption(format!(
                "inconsistent allocator header: {} sectors, {} free",
                self.sector_count, self.free_count
            )));
        }
        Ok(())
    }

    // =========================================================================
    // Sector I/O
    // =========================================================================

    fn check_sector(&self, sector: u64, context: &str) -> Result<()> {
        if sector == END_OF_CHAIN || sector >= self.sector_count {
            return Err(PorkError::Corruption(format!(
                "{}: sector {} out of range (1..{})",
                context, sector, self.sector_count
            )));
        }
        Ok(())
    }

    /// Read (next, len) from the start of a sector
    fn read_sector_header(&mut self, sector: u64) -> Result<(u64, u32)> {
        let mut raw = [0u8; SECTOR_HEADER_SIZE as usize];
        self.file.seek(SeekFrom::Start(sector * self.sector_size))?;
        self.file.read_exact(&mut raw)?;
        let mut buf = &raw[..];
        Ok((buf.get_u64_le(), buf.get_u32_le()))
    }

    fn write_next(&mut self, sector: u64, next: u64) -> Result<()> {
        self.file.seek(SeekFrom::Start(sector * self.sector_size))?;
        let mut buf = [0u8; 8];
        (&mut buf[..]).put_u64_le(next);
        self.file.write_all(&buf)?;
        Ok(())
    }

    /// Walk a value's chain, returning its sectors and payload length
    fn read_chain(&mut self, first: u64) -> Result<(Vec<u64>, u32)> {
        self.check_sector(first, "chain head")?;
        let (mut next, len) = self.read_sector_header(first)?;
        let needed = self.sectors_for(len as u64);

        let mut sectors = Vec::with_capacity(needed as usize);
        sectors.push(first);
        while (sectors.len() as u64) < needed {
            if next == END_OF_CHAIN {
                return Err(PorkError::Corruption(format!(
                    "unexpected end of chain at sector {} ({} of {} sectors)",
                    sectors[sectors.len() - 1],
                    sectors.len(),
                    needed
                )));
            }
            self.check_sector(next, "chain link")?;
            sectors.push(next);
            next = self.read_sector_header(next)?.0;
        }

        if next != END_OF_CHAIN {
            return Err(PorkError::Corruption(format!(
                "chain starting at sector {} continues past its {} sectors",
                first, needed
            )));
        }
        Ok((sectors, len))
    }

    // =========================================================================
    // Allocation
    // =========================================================================

    /// Take `count` sectors, free list first, then by growing the file
    ///
    /// The updated header is persisted before returning.
    fn allocate(&mut self, count: u64) -> Result<Vec<u64>> {
        let mut sectors = Vec::with_capacity(count as usize);

        while (sectors.len() as u64) < count && self.free_head != END_OF_CHAIN {
            if self.free_count == 0 {
                return Err(PorkError::Corruption(
                    "free list longer than its recorded count".to_string(),
                ));
            }
            let sector = self.free_head;
            self.check_sector(sector, "free list")?;
            self.free_head = self.read_sector_header(sector)?.0;
            self.free_count -= 1;
            sectors.push(sector);
        }

        let grow = count - sectors.len() as u64;
        if grow > 0 {
            let first_new = self.sector_count;
            self.sector_count += grow;
            self.file.set_len(self.sector_count * self.sector_size)?;
            sectors.extend(first_new..self.sector_count);
            trace!(grow, sectors = self.sector_count, "grew sector file");
        }

        self.write_header()?;
        Ok(sectors)
    }

    /// Trim free sectors off the end of the file
    ///
    /// Rebuilds the free list without the trimmed sectors (ascending order)
    /// and truncates the file. Returns the number of sectors released.
    pub fn shrink(&mut self) -> Result<u64> {
        if self.free_count == 0 {
            return Ok(0);
        }

        let mut free = Vec::with_capacity(self.free_count as usize);
        let mut sector = self.free_head;
        while sector != END_OF_CHAIN {
            if free.len() as u64 >= self.free_count {
                return Err(PorkError::Corruption(
                    "free list longer than its recorded count".to_string(),
                ));
            }
            self.check_sector(sector, "free list")?;
            free.push(sector);
            sector = self.read_sector_header(sector)?.0;
        }
        free.sort_unstable();

        let mut new_count = self.sector_count;
        while let Some(&last) = free.last() {
            if last + 1 != new_count {
                break;
            }
            free.pop();
            new_count -= 1;
        }

        let released = self.sector_count - new_count;
        if released == 0 {
            return Ok(0);
        }

        for (i, &sector) in free.iter().enumerate() {
            let next = free.get(i + 1).copied().unwrap_or(END_OF_CHAIN);
            self.write_next(sector, next)?;
        }
        self.free_head = free.first().copied().unwrap_or(END_OF_CHAIN);
        self.free_count = free.len() as u64;
        self.sector_count = new_count;
        self.write_header()?;
        self.file.set_len(self.sector_count * self.sector_size)?;

        debug!(
            path = %self.path.display(),
            released,
            sectors = self.sector_count,
            "shrank sector file"
        );
        Ok(released)
    }
}

impl DataLookup for SectoredStore {
    fn write(&mut self, bytes: &[u8]) -> Result<Locator> {
        let len = u32::try_from(bytes.len()).map_err(|_| {
            PorkError::Capacity(format!("value of {} bytes exceeds chain limit", bytes.len()))
        })?;

        let sectors = self.allocate(self.sectors_for(len as u64))?;
        let payload = self.payload_per_sector() as usize;

        let mut buf = BytesMut::with_capacity(self.sector_size as usize);
        for (i, &sector) in sectors.iter().enumerate() {
            let next = sectors.get(i + 1).copied().unwrap_or(END_OF_CHAIN);
            let start = (i * payload).min(bytes.len());
            let end = (start + payload).min(bytes.len());

            buf.clear();
            buf.put_u64_le(next);
            buf.put_u32_le(if i == 0 { len } else { 0 });
            buf.put_slice(&bytes[start..end]);

            self.file.seek(SeekFrom::Start(sector * self.sector_size))?;
            self.file.write_all(&buf)?;
        }

        trace!(first = sectors[0], sectors = sectors.len(), len, "wrote chain");
        Ok(Locator::new(sectors[0], len as u64))
    }

    fn read(&mut self, locator: Locator) -> Result<Vec<u8>> {
        let (sectors, len) = self.read_chain(locator.primary)?;
        if len as u64 != locator.secondary {
            return Err(PorkError::Corruption(format!(
                "chain at sector {} holds {} bytes, expected {}",
                locator.primary, len, locator.secondary
            )));
        }

        let payload = self.payload_per_sector() as usize;
        let mut value = vec![0u8; len as usize];
        for (i, sector) in sectors.into_iter().enumerate() {
            let start = (i * payload).min(value.len());
            let end = (start + payload).min(value.len());
            self.file
                .seek(SeekFrom::Start(sector * self.sector_size + SECTOR_HEADER_SIZE))?;
            self.file.read_exact(&mut value[start..end])?;
        }
        Ok(value)
    }

    fn free(&mut self, locator: Locator, shrink: bool) -> Result<()> {
        let (sectors, _) = self.read_chain(locator.primary)?;
        let first = sectors[0];
        let last = sectors[sectors.len() - 1];

        // The chain is already linked; splice it in front of the free list
        self.write_next(last, self.free_head)?;
        self.free_head = first;
        self.free_count += sectors.len() as u64;
        self.write_header()?;

        trace!(first, sectors = sectors.len(), "freed chain");

        if shrink {
            self.shrink()?;
        }
        Ok(())
    }

    fn stats(&self) -> Result<DataStats> {
        Ok(DataStats {
            bytes_on_disk: self.sector_count * self.sector_size,
            free_sectors: Some(self.free_count),
        })
    }

    fn flush(&mut self) -> Result<()> {
        self.file.sync_data()?;
        Ok(())
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        self.flush()?;
        debug!(
            path = %self.path.display(),
            sectors = self.sector_count,
            free = self.free_count,
            "closed sectored store"
        );
        Ok(())
    }
}
