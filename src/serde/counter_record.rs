//! Persisted counter value type for file-backed sequences.
//!
//! This module provides the [`CounterRecord`] type, the single unsigned
//! 64-bit value a persisted counter stores at a fixed offset in its backing
//! file. The stored value is always the *next* value the counter will issue.
//!
//! # Format
//!
//! The record serializes to exactly 8 bytes, not length-prefixed:
//!
//! ```text
//! | value (u64 BE) |
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use super::DeserializeError;

/// The next value a persisted counter will issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterRecord {
    value: u64,
}

impl CounterRecord {
    /// Width of the serialized record in bytes.
    pub const LEN: usize = 8;

    /// Creates a new CounterRecord holding the given value.
    pub fn new(value: u64) -> Self {
        Self { value }
    }

    /// Returns the stored value.
    pub fn value(&self) -> u64 {
        self.value
    }

    /// Encodes the record to bytes.
    ///
    /// Format: `| value (u64 BE) |`
    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::LEN);
        buf.put_u64(self.value);
        buf.freeze()
    }

    /// Decodes a CounterRecord from bytes.
    pub fn deserialize(data: &[u8]) -> Result<Self, DeserializeError> {
        if data.len() < Self::LEN {
            return Err(DeserializeError {
                message: format!(
                    "buffer too short for counter record: need {} bytes, got {}",
                    Self::LEN,
                    data.len()
                ),
            });
        }

        let value = u64::from_be_bytes([
            data[0], data[1], data[2], data[3], data[4], data[5], data[6], data[7],
        ]);

        Ok(CounterRecord { value })
    }
}
