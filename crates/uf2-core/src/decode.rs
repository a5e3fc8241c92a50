//! UF2 to flat image decoding.
//!
//! Decoding walks the blocks in file order and drives a small state
//! machine ([`DecoderState`]) holding the current family, the output
//! cursor and the lowest address seen per family. Each accepted block is
//! one transition ([`DecoderState::step`]) that yields the zero padding to
//! emit before it and whether its payload passes the family filter.

use std::fmt;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::family::FamilyRegistry;
use crate::image::{ConversionContext, FlatImage};
use crate::protocol::{BlockError, MAX_PADDING, UF2_BLOCK_SIZE, UF2_DATA_SIZE, Uf2Block};

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Invalid UF2 data size at {offset}: {size} bytes")]
    InvalidPayloadSize { offset: usize, size: u32 },
    #[error("Block out of order at {offset}: target 0x{target_addr:08x} below cursor 0x{cursor:08x}")]
    OutOfOrder {
        offset: usize,
        target_addr: u32,
        cursor: u64,
    },
    #[error("More than 10M of padding needed at {offset} ({padding} bytes)")]
    PaddingTooLarge { offset: usize, padding: u64 },
    #[error("Non-word padding size at {offset} ({padding} bytes)")]
    UnalignedPadding { offset: usize, padding: u64 },
    #[error("Block error at {offset}: {source}")]
    Block {
        offset: usize,
        #[source]
        source: BlockError,
    },
}

/// Lowest target address seen for one family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyInfo {
    pub id: u32,
    pub name: Option<&'static str>,
    pub min_address: u32,
}

/// Diagnostic summary of a decoded UF2 file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeSummary {
    /// Families found, in first-seen order.
    pub families: Vec<FamilyInfo>,
    /// Every accepted block carried the same flags.
    pub flags_consistent: bool,
    /// Flags of the last accepted block.
    pub last_flags: Option<u32>,
    /// Blocks in the file.
    pub total_blocks: usize,
    /// Blocks skipped for a bad magic.
    pub bad_magic_blocks: usize,
    /// Blocks skipped for the not-main-flash flag.
    pub no_flash_blocks: usize,
}

impl fmt::Display for DecodeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- UF2 File Header Info ---")?;
        for family in &self.families {
            writeln!(
                f,
                "Family ID is {}, hex value is 0x{:08x}",
                family.name.unwrap_or(""),
                family.id
            )?;
            writeln!(f, "Target Address is 0x{:08x}", family.min_address)?;
        }
        match self.last_flags {
            Some(flags) if self.flags_consistent => {
                writeln!(f, "All block flag values consistent, 0x{:04x}", flags)?
            }
            Some(_) => writeln!(f, "Flags were not all the same")?,
            None => writeln!(f, "No flashable blocks")?,
        }
        write!(f, "----------------------------")
    }
}

/// Result of decoding a UF2 file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedUf2 {
    pub image: FlatImage,
    pub summary: DecodeSummary,
    /// Several families were present and no filter was given; `image` was
    /// cleared and its start address reset to 0.
    pub ambiguous: bool,
}

/// Outcome of one decoder transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Zero bytes to emit before this block.
    pub padding: u64,
    /// Whether the block's payload passes the family filter.
    pub keep_payload: bool,
    /// Cursor and family were reset by this block.
    pub reset: bool,
}

/// Decoder state carried from block to block.
#[derive(Debug, Clone)]
pub struct DecoderState {
    /// Family filter, 0 accepts all.
    filter: u32,
    current_family: Option<u32>,
    cursor: Option<u64>,
    start_address: u32,
    families: Vec<(u32, u32)>,
    last_flags: Option<u32>,
    flags_consistent: bool,
}

impl DecoderState {
    pub fn new(ctx: &ConversionContext) -> Self {
        Self {
            filter: ctx.family_id,
            current_family: None,
            cursor: None,
            start_address: ctx.base_address,
            families: Vec::new(),
            last_flags: None,
            flags_consistent: true,
        }
    }

    pub fn current_family(&self) -> Option<u32> {
        self.current_family
    }

    pub fn cursor(&self) -> Option<u64> {
        self.cursor
    }

    pub fn start_address(&self) -> u32 {
        self.start_address
    }

    fn passes_filter(&self, block: &Uf2Block) -> bool {
        self.filter == 0 || (block.has_family_id() && block.family_id == self.filter)
    }

    /// Apply one accepted block (valid magic, main flash) at byte `offset`.
    pub fn step(&mut self, block: &Uf2Block, offset: usize) -> Result<Step, DecodeError> {
        if block.payload_size as usize > UF2_DATA_SIZE {
            return Err(DecodeError::InvalidPayloadSize {
                offset,
                size: block.payload_size,
            });
        }

        let tagged = block.has_family_id();
        if tagged && self.current_family.is_none() {
            self.current_family = Some(block.family_id);
        }

        let family_changed = tagged && self.current_family != Some(block.family_id);
        let reset = self.cursor.is_none() || family_changed;
        if reset {
            // The raw field is adopted even for untagged blocks.
            self.current_family = Some(block.family_id);
            self.cursor = Some(block.target_addr as u64);
            if self.filter == 0 || self.filter == block.family_id {
                self.start_address = block.target_addr;
            }
        }

        let cursor = self.cursor.unwrap_or(block.target_addr as u64);
        let target = block.target_addr as u64;
        if target < cursor {
            return Err(DecodeError::OutOfOrder {
                offset,
                target_addr: block.target_addr,
                cursor,
            });
        }
        let padding = target - cursor;
        if padding > MAX_PADDING as u64 {
            return Err(DecodeError::PaddingTooLarge { offset, padding });
        }
        if padding % 4 != 0 {
            return Err(DecodeError::UnalignedPadding { offset, padding });
        }

        let keep_payload = self.passes_filter(block);
        self.cursor = Some(target + block.payload_size as u64);

        if tagged {
            match self.families.iter_mut().find(|(id, _)| *id == block.family_id) {
                Some((_, min)) => *min = (*min).min(block.target_addr),
                None => self.families.push((block.family_id, block.target_addr)),
            }
        }

        if let Some(prev) = self.last_flags
            && prev != block.flags
        {
            self.flags_consistent = false;
        }
        self.last_flags = Some(block.flags);

        Ok(Step {
            padding,
            keep_payload,
            reset,
        })
    }

    /// Distinct families seen so far.
    pub fn family_count(&self) -> usize {
        self.families.len()
    }

    /// More than one family and nothing to pick one with.
    pub fn is_ambiguous(&self) -> bool {
        self.families.len() > 1 && self.filter == 0
    }

    fn summary(&self, registry: &FamilyRegistry) -> DecodeSummary {
        DecodeSummary {
            families: self
                .families
                .iter()
                .map(|&(id, min_address)| FamilyInfo {
                    id,
                    name: registry.name_of(id),
                    min_address,
                })
                .collect(),
            flags_consistent: self.flags_consistent,
            last_flags: self.last_flags,
            ..Default::default()
        }
    }
}

/// UF2 block stream to flat image.
#[derive(Debug, Clone, Copy, Default)]
pub struct Uf2Decoder {
    ctx: ConversionContext,
    registry: FamilyRegistry,
}

impl Uf2Decoder {
    pub fn new(ctx: ConversionContext) -> Self {
        Self {
            ctx,
            registry: FamilyRegistry::builtin(),
        }
    }

    #[instrument(level = "debug", skip(self, data), fields(len = data.len(), filter = self.ctx.family_id))]
    pub fn decode(&self, data: &[u8]) -> Result<DecodedUf2, DecodeError> {
        let mut state = DecoderState::new(&self.ctx);
        let mut out = Vec::new();
        let mut bad_magic_blocks = 0;
        let mut no_flash_blocks = 0;

        let total_blocks = data.len() / UF2_BLOCK_SIZE;
        let trailing = data.len() % UF2_BLOCK_SIZE;
        if trailing != 0 {
            warn!(bytes = trailing, "Ignoring trailing partial UF2 block");
        }

        for (block_no, raw) in data.chunks_exact(UF2_BLOCK_SIZE).enumerate() {
            let offset = block_no * UF2_BLOCK_SIZE;
            let block = match Uf2Block::from_bytes(raw) {
                Ok(b) => b,
                Err(BlockError::InvalidMagic { .. }) => {
                    warn!(offset, "Skipping block; bad magic");
                    bad_magic_blocks += 1;
                    continue;
                }
                Err(source) => return Err(DecodeError::Block { offset, source }),
            };

            if block.is_not_main_flash() {
                debug!(offset, "Skipping not-main-flash block");
                no_flash_blocks += 1;
                continue;
            }

            let step = state.step(&block, offset)?;
            if step.reset {
                debug!(
                    offset,
                    family = %format!("0x{:08x}", block.family_id),
                    addr = %format!("0x{:08x}", block.target_addr),
                    "Cursor reset"
                );
            }
            out.resize(out.len() + step.padding as usize, 0);
            if step.keep_payload {
                out.extend_from_slice(block.payload());
            }
        }

        let mut summary = state.summary(&self.registry);
        summary.total_blocks = total_blocks;
        summary.bad_magic_blocks = bad_magic_blocks;
        summary.no_flash_blocks = no_flash_blocks;

        let ambiguous = state.is_ambiguous();
        let image = if ambiguous {
            warn!(
                families = state.family_count(),
                "Multiple families found and no family selected; output discarded"
            );
            FlatImage::new(0, Vec::new())
        } else {
            FlatImage::new(state.start_address(), out)
        };

        info!(
            size = image.len(),
            start = %format!("0x{:08x}", image.start_address),
            "Decoded UF2"
        );

        Ok(DecodedUf2 {
            image,
            summary,
            ambiguous,
        })
    }
}
