//! Configuration for PorkDB containers
//!
//! A [`ContainerConfig`] fixes the key hasher, hash width, index strategy,
//! data strategy and compression codec of one container for its entire
//! lifetime. It is assembled with a builder and validated once in
//! [`ContainerConfigBuilder::build`]; the resulting value is immutable.
//!
//! Reopening a container directory with a different configuration than the
//! one it was created with is not detected.

use crate::compression::Compression;
use crate::error::{PorkError, Result};

// =============================================================================
// Limits
// =============================================================================

/// Widest hash a container may use
pub const MAX_HASH_BITS: u32 = 64;

/// Widest directly addressed table (hash table and mapped indexes)
pub const MAX_TABLE_BITS: u32 = 32;

/// Widest bucket directory for the bucketing index
pub const MAX_BUCKET_BITS: u32 = 24;

/// Most entries one bucket may hold; a bucket is read whole on every lookup
pub const MAX_BUCKET_ENTRIES: u32 = 4096;

/// Sector size bounds for the sectored data store
pub const MIN_SECTOR_SIZE: u32 = 64;
pub const MAX_SECTOR_SIZE: u32 = 1024 * 1024;

// =============================================================================
// Strategy Selectors
// =============================================================================

/// How keys are reduced to a fixed-width hash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HasherKind {
    /// Take the leading bits of the serialized key verbatim.
    ///
    /// Only suitable when keys are already uniformly distributed
    /// (e.g. they are digests themselves). This is not checked.
    ConstantLength,

    /// Hash the serialized key with XXH3 and keep the low bits
    Content,
}

/// Which structure maps hashes to locators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// Direct-addressed table of `2^bits` slots accessed with file reads/writes
    HashTable,

    /// `2^bucket_bits` buckets holding up to `entries_per_bucket` entries each
    Bucketing {
        bucket_bits: u32,
        entries_per_bucket: u32,
    },

    /// Direct-addressed table of `2^bits` slots accessed through a memory map
    Mapped,
}

/// Which store maps locators to value bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    /// One file per value
    IndividualFile,

    /// Chains of fixed-size sectors in a shared file, with a free list
    Sectored { sector_size: u32 },

    /// Append-only log; freed values become garbage
    WriteOnce,
}

// =============================================================================
// Container Configuration
// =============================================================================

/// Immutable, validated configuration for one container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerConfig {
    hasher: HasherKind,
    hash_bits: u32,
    index: IndexKind,
    data: DataKind,
    compression: Compression,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            hasher: HasherKind::Content,
            hash_bits: 16,
            index: IndexKind::HashTable,
            data: DataKind::Sectored { sector_size: 4096 },
            compression: Compression::None,
        }
    }
}

impl ContainerConfig {
    /// Create a new config builder
    pub fn builder() -> ContainerConfigBuilder {
        ContainerConfigBuilder::default()
    }

    pub fn hasher(&self) -> HasherKind {
        self.hasher
    }

    /// Number of bits every key is reduced to
    pub fn hash_bits(&self) -> u32 {
        self.hash_bits
    }

    pub fn index(&self) -> IndexKind {
        self.index
    }

    pub fn data(&self) -> DataKind {
        self.data
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Check every option against its allowed range
    fn validate(&self) -> Result<()> {
        if self.hash_bits == 0 || self.hash_bits > MAX_HASH_BITS {
            return Err(PorkError::Config(format!(
                "hash width must be in 1..={} bits, got {}",
                MAX_HASH_BITS, self.hash_bits
            )));
        }

        match self.index {
            IndexKind::HashTable | IndexKind::Mapped => {
                if self.hash_bits > MAX_TABLE_BITS {
                    return Err(PorkError::Config(format!(
                        "direct-addressed index supports at most {} bits, got {}",
                        MAX_TABLE_BITS, self.hash_bits
                    )));
                }
            }
            IndexKind::Bucketing {
                bucket_bits,
                entries_per_bucket,
            } => {
                if bucket_bits == 0 || bucket_bits > MAX_BUCKET_BITS {
                    return Err(PorkError::Config(format!(
                        "bucket bits must be in 1..={}, got {}",
                        MAX_BUCKET_BITS, bucket_bits
                    )));
                }
                if bucket_bits > self.hash_bits {
                    return Err(PorkError::Config(format!(
                        "bucket bits ({}) exceed hash width ({})",
                        bucket_bits, self.hash_bits
                    )));
                }
                if entries_per_bucket == 0 || entries_per_bucket > MAX_BUCKET_ENTRIES {
                    return Err(PorkError::Config(format!(
                        "entries per bucket must be in 1..={}, got {}",
                        MAX_BUCKET_ENTRIES, entries_per_bucket
                    )));
                }
            }
        }

        if let DataKind::Sectored { sector_size } = self.data {
            if !sector_size.is_power_of_two()
                || !(MIN_SECTOR_SIZE..=MAX_SECTOR_SIZE).contains(&sector_size)
            {
                return Err(PorkError::Config(format!(
                    "sector size must be a power of two in {}..={}, got {}",
                    MIN_SECTOR_SIZE, MAX_SECTOR_SIZE, sector_size
                )));
            }
        }

        if let Compression::Zstd { level } = self.compression {
            if !(1..=22).contains(&level) {
                return Err(PorkError::Config(format!(
                    "zstd level must be in 1..=22, got {}",
                    level
                )));
            }
        }

        Ok(())
    }
}

/// Builder for ContainerConfig
#[derive(Default)]
pub struct ContainerConfigBuilder {
    config: ContainerConfig,
}

impl ContainerConfigBuilder {
    /// Set the key hashing strategy
    pub fn hasher(mut self, hasher: HasherKind) -> Self {
        self.config.hasher = hasher;
        self
    }

    /// Set the hash width in bits
    pub fn hash_bits(mut self, bits: u32) -> Self {
        self.config.hash_bits = bits;
        self
    }

    /// Set the index strategy
    pub fn index(mut self, index: IndexKind) -> Self {
        self.config.index = index;
        self
    }

    /// Set the data placement strategy
    pub fn data(mut self, data: DataKind) -> Self {
        self.config.data = data;
        self
    }

    /// Set the value compression codec
    pub fn compression(mut self, compression: Compression) -> Self {
        self.config.compression = compression;
        self
    }

    /// Validate and freeze the configuration
    pub fn build(self) -> Result<ContainerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
