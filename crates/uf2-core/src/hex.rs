//! Intel HEX to UF2 conversion.
//!
//! Data bytes are gathered into 256-byte blocks keyed by their aligned base
//! address. A new block is opened whenever a byte's base differs from the
//! block being filled, so blocks come out in the order they are first hit
//! in the file, not sorted by address. Bootloaders rely on seeing that
//! order unchanged.

use ihex::{ReaderError, Record};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::image::ConversionContext;
use crate::protocol::{BlockError, UF2_BLOCK_SIZE, UF2_PAYLOAD_SIZE, Uf2Block};

#[derive(Error, Debug)]
pub enum HexError {
    #[error("Input is not valid text: {0}")]
    NotText(#[from] std::str::Utf8Error),
    #[error("Malformed record on line {line}: {reason}")]
    Malformed { line: usize, reason: String },
    #[error("Unsupported record type 0x{kind:02X} on line {line}")]
    UnsupportedRecord { line: usize, kind: u8 },
    #[error("Block error: {0}")]
    Block(#[from] BlockError),
}

/// Parse one `:` line. `line` is the 1-based line number for errors.
pub fn parse_record(text: &str, line: usize) -> Result<Record, HexError> {
    Record::from_record_string(text).map_err(|err| match err {
        ReaderError::UnsupportedRecordType(kind) => HexError::UnsupportedRecord { line, kind },
        other => HexError::Malformed {
            line,
            reason: other.to_string(),
        },
    })
}

/// 256-byte block being filled.
#[derive(Debug, Clone)]
struct HexBlock {
    base: u32,
    bytes: [u8; UF2_PAYLOAD_SIZE],
}

impl HexBlock {
    fn new(base: u32) -> Self {
        Self {
            base,
            bytes: [0; UF2_PAYLOAD_SIZE],
        }
    }
}

/// Result of converting an Intel HEX file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedHex {
    /// Encoded UF2 blocks.
    pub uf2: Vec<u8>,
    /// Address of the first data byte, `None` without data records.
    pub start_address: Option<u32>,
    /// Base address of each block, in output order.
    pub block_bases: Vec<u32>,
}

/// Intel HEX text to UF2 block stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct HexDecoder {
    /// Family tag written into every block. 0 leaves blocks untagged.
    pub family_id: u32,
}

impl HexDecoder {
    pub fn new(family_id: u32) -> Self {
        Self { family_id }
    }

    pub fn from_context(ctx: &ConversionContext) -> Self {
        Self::new(ctx.family_id)
    }

    pub fn decode_bytes(&self, data: &[u8]) -> Result<DecodedHex, HexError> {
        self.decode(std::str::from_utf8(data)?)
    }

    #[instrument(level = "debug", skip(self, text), fields(len = text.len()))]
    pub fn decode(&self, text: &str) -> Result<DecodedHex, HexError> {
        let mut upper: u32 = 0;
        let mut start_address = None;
        let mut blocks: Vec<HexBlock> = Vec::new();

        for (idx, line) in text.split('\n').enumerate() {
            let line_no = idx + 1;
            let line = line.trim_end();
            if !line.starts_with(':') {
                if !line.is_empty() {
                    debug!(line = line_no, "Skipping non-record line");
                }
                continue;
            }

            match parse_record(line, line_no)? {
                Record::ExtendedLinearAddress(value) => {
                    upper = (value as u32) << 16;
                }
                Record::ExtendedSegmentAddress(value) => {
                    upper = (value as u32) << 4;
                }
                Record::EndOfFile => break,
                Record::StartSegmentAddress { .. } | Record::StartLinearAddress(_) => {
                    debug!(line = line_no, "Ignoring start address record");
                }
                Record::Data { offset, value } => {
                    let first = upper as u64 + offset as u64;
                    if first + value.len() as u64 > u32::MAX as u64 + 1 {
                        return Err(HexError::Malformed {
                            line: line_no,
                            reason: "data extends past 4 GiB".to_string(),
                        });
                    }
                    let first = first as u32;
                    start_address.get_or_insert(first);

                    for (i, &byte) in value.iter().enumerate() {
                        let addr = first + i as u32;
                        let base = addr & !0xff;
                        if blocks.last().is_none_or(|b| b.base != base) {
                            blocks.push(HexBlock::new(base));
                        }
                        if let Some(block) = blocks.last_mut() {
                            block.bytes[(addr & 0xff) as usize] = byte;
                        }
                    }
                }
            }
        }

        let num_blocks = blocks.len() as u32;
        let mut uf2 = Vec::with_capacity(blocks.len() * UF2_BLOCK_SIZE);
        for (block_no, block) in blocks.iter().enumerate() {
            Uf2Block::new(
                block.base,
                &block.bytes,
                block_no as u32,
                num_blocks,
                self.family_id,
            )?
            .write_to(&mut uf2).map_err(BlockError::from)?;
        }

        info!(
            blocks = num_blocks,
            start = ?start_address.map(|a| format!("0x{:08x}", a)),
            "Converted Intel HEX"
        );

        Ok(DecodedHex {
            uf2,
            start_address,
            block_bases: blocks.iter().map(|b| b.base).collect(),
        })
    }
}
