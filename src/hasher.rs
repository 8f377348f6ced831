//! Key Hasher
//!
//! Reduces serialized keys to a fixed-width hash. The same key always maps
//! to the same hash, across process restarts, so the index stays valid
//! when a container is reopened.
//!
//! Hashes are not unique. With `bits` bits and `n` keys, collisions become
//! likely around `n ≈ 2^(bits/2)`; the map overwrites on collision.

use xxhash_rust::xxh3::xxh3_64;

use crate::config::{HasherKind, MAX_HASH_BITS};

/// Deterministic key → hash reduction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyHasher {
    kind: HasherKind,
    bits: u32,
}

impl KeyHasher {
    /// Create a hasher producing `bits`-wide hashes
    ///
    /// `bits` is expected to be validated by the container config (1..=64).
    pub fn new(kind: HasherKind, bits: u32) -> Self {
        debug_assert!((1..=MAX_HASH_BITS).contains(&bits));
        Self { kind, bits }
    }

    /// Hash width in bits
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Largest hash value plus one, saturating at `u64::MAX` for 64-bit hashes
    pub fn mask(&self) -> u64 {
        if self.bits >= 64 {
            u64::MAX
        } else {
            (1u64 << self.bits) - 1
        }
    }

    /// Reduce key bytes to a hash in `0..=mask()`
    pub fn hash(&self, key: &[u8]) -> u64 {
        match self.kind {
            HasherKind::ConstantLength => {
                // Leading bytes as a big-endian integer; short keys are zero padded
                let mut prefix = [0u8; 8];
                let n = key.len().min(8);
                prefix[..n].copy_from_slice(&key[..n]);
                let word = u64::from_be_bytes(prefix);
                if self.bits >= 64 {
                    word
                } else {
                    word >> (64 - self.bits)
                }
            }
            HasherKind::Content => xxh3_64(key) & self.mask(),
        }
    }
}
