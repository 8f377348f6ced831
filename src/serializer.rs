//! Serializers
//!
//! Convert typed keys and values to bytes and back. The engine itself only
//! ever sees bytes; a container carries one serializer for its keys and one
//! for its values.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{PorkError, Result};

/// Two-way conversion between a typed value and bytes
pub trait Serializer<T>: Send + Sync {
    fn serialize(&self, value: &T) -> Result<Vec<u8>>;

    fn deserialize(&self, bytes: &[u8]) -> Result<T>;
}

/// Bincode encoding for any serde type
///
/// Fixed-size byte arrays encode as their raw bytes, so a `[u8; 16]` key is
/// hashed over exactly those 16 bytes.
pub struct BincodeSerializer<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> BincodeSerializer<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for BincodeSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Serializer<T> for BincodeSerializer<T>
where
    T: Serialize + DeserializeOwned,
{
    fn serialize(&self, value: &T) -> Result<Vec<u8>> {
        bincode::serialize(value).map_err(|e| PorkError::Serialization(e.to_string()))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<T> {
        bincode::deserialize(bytes).map_err(|e| PorkError::Serialization(e.to_string()))
    }
}

/// Identity serializer for raw byte values
#[derive(Debug, Default, Clone, Copy)]
pub struct RawSerializer;

impl Serializer<Vec<u8>> for RawSerializer {
    fn serialize(&self, value: &Vec<u8>) -> Result<Vec<u8>> {
        Ok(value.clone())
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        Ok(bytes.to_vec())
    }
}
