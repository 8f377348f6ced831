//! Value compression
//!
//! A reversible byte transform applied between the serializer and the data
//! store. The codec is part of a container's configuration; values written
//! with one codec cannot be read back with another.

use crate::error::{PorkError, Result};

/// Compression codec applied to serialized values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Store bytes as-is
    #[default]
    None,

    /// Zstandard at the given level (1..=22)
    Zstd { level: i32 },
}

impl Compression {
    /// Compress serialized value bytes
    pub fn compress(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        match self {
            Compression::None => Ok(bytes.to_vec()),
            Compression::Zstd { level } => zstd::encode_all(bytes, *level)
                .map_err(|e| PorkError::Compression(format!("zstd encode failed: {}", e))),
        }
    }

    /// Reverse [`Compression::compress`]
    pub fn decompress(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        match self {
            Compression::None => Ok(bytes.to_vec()),
            Compression::Zstd { .. } => zstd::decode_all(bytes)
                .map_err(|e| PorkError::Compression(format!("zstd decode failed: {}", e))),
        }
    }
}
