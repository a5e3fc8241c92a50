//! Flat images and the per-call conversion context.

use crate::protocol::DEFAULT_BASE_ADDRESS;

/// Contiguous byte buffer plus the address it loads at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatImage {
    pub start_address: u32,
    pub data: Vec<u8>,
}

impl FlatImage {
    pub fn new(start_address: u32, data: Vec<u8>) -> Self {
        Self {
            start_address,
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Address one past the last byte.
    pub fn end_address(&self) -> u64 {
        self.start_address as u64 + self.data.len() as u64
    }
}

/// Resolved settings for one conversion.
///
/// Passed explicitly to every codec; nothing here is process-wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionContext {
    /// Load address for raw binary input, and the start address a UF2
    /// decode reports when no block passes the family filter.
    pub base_address: u32,
    /// Family filter for decoding and tag for encoding. 0 means none.
    pub family_id: u32,
}

impl Default for ConversionContext {
    fn default() -> Self {
        Self {
            base_address: DEFAULT_BASE_ADDRESS,
            family_id: 0,
        }
    }
}

impl ConversionContext {
    pub fn new(base_address: u32, family_id: u32) -> Self {
        Self {
            base_address,
            family_id,
        }
    }
}
