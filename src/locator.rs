//! Locator
//!
//! Opaque handle a data store hands out for a stored value. Each store
//! decides what the two words mean (file id, first sector, log offset,
//! payload length); nothing outside the store interprets them.
//!
//! ## Encoding (16 bytes, little-endian)
//! ```text
//! ┌──────────────────┬──────────────────┐
//! │ Primary (8)      │ Secondary (8)    │
//! └──────────────────┴──────────────────┘
//! ```

use bytes::{Buf, BufMut};

/// Encoded size of a locator in bytes
pub const LOCATOR_SIZE: usize = 16;

/// Opaque reference to a stored value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Locator {
    pub(crate) primary: u64,
    pub(crate) secondary: u64,
}

impl Locator {
    /// Build a locator from raw words
    ///
    /// Only the data store that issued a locator can interpret it; other
    /// callers use this to round-trip locators they already hold.
    pub fn new(primary: u64, secondary: u64) -> Self {
        Self { primary, secondary }
    }

    /// Append the fixed-width encoding to `buf`
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u64_le(self.primary);
        buf.put_u64_le(self.secondary);
    }

    /// Decode from the first [`LOCATOR_SIZE`] bytes of `buf`
    ///
    /// Callers check the length; slot and bucket layouts always reserve the
    /// full width.
    pub fn decode<B: Buf>(buf: &mut B) -> Self {
        let primary = buf.get_u64_le();
        let secondary = buf.get_u64_le();
        Self { primary, secondary }
    }
}
