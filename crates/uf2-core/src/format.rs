//! Input format detection.

use std::fmt;

use crate::protocol::has_uf2_magic;

/// Classification of an input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// UF2 block stream.
    Uf2,
    /// Intel HEX text.
    Hex,
    /// Anything else, treated as a raw flash image.
    Binary,
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputFormat::Uf2 => write!(f, "UF2"),
            InputFormat::Hex => write!(f, "Intel HEX"),
            InputFormat::Binary => write!(f, "Binary"),
        }
    }
}

impl InputFormat {
    /// Classify `data`. Never fails.
    pub fn detect(data: &[u8]) -> Self {
        if is_uf2(data) {
            InputFormat::Uf2
        } else if is_hex(data) {
            InputFormat::Hex
        } else {
            InputFormat::Binary
        }
    }
}

/// First two words are the UF2 start magics.
pub fn is_uf2(data: &[u8]) -> bool {
    has_uf2_magic(data)
}

/// Starts with `:` and holds nothing but hex digits, `:` and line breaks.
pub fn is_hex(data: &[u8]) -> bool {
    data.first() == Some(&b':')
        && data
            .iter()
            .all(|&b| b == b':' || b == b'\r' || b == b'\n' || b.is_ascii_hexdigit())
}
