//! Flat image to UF2 encoding.

use tracing::debug;

use crate::image::{ConversionContext, FlatImage};
use crate::protocol::{BlockError, UF2_BLOCK_SIZE, UF2_PAYLOAD_SIZE, Uf2Block};

/// Splits a flat image into 256-byte UF2 blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct Uf2Encoder {
    /// Family tag written into every block. 0 leaves blocks untagged.
    pub family_id: u32,
}

impl Uf2Encoder {
    pub fn new(family_id: u32) -> Self {
        Self { family_id }
    }

    pub fn from_context(ctx: &ConversionContext) -> Self {
        Self::new(ctx.family_id)
    }

    /// Encode `image`; the last chunk is zero-padded to 256 bytes.
    pub fn encode(&self, image: &FlatImage) -> Result<Vec<u8>, BlockError> {
        let num_blocks = image.data.len().div_ceil(UF2_PAYLOAD_SIZE);
        let mut out = Vec::with_capacity(num_blocks * UF2_BLOCK_SIZE);

        for (block_no, chunk) in image.data.chunks(UF2_PAYLOAD_SIZE).enumerate() {
            let offset = block_no * UF2_PAYLOAD_SIZE;
            let target_addr = u32::try_from(offset)
                .ok()
                .and_then(|o| image.start_address.checked_add(o))
                .ok_or(BlockError::AddressOverflow {
                    base: image.start_address,
                    offset,
                })?;

            let mut payload = [0u8; UF2_PAYLOAD_SIZE];
            payload[..chunk.len()].copy_from_slice(chunk);

            Uf2Block::new(
                target_addr,
                &payload,
                block_no as u32,
                num_blocks as u32,
                self.family_id,
            )?
            .write_to(&mut out)?;
        }

        debug!(
            blocks = num_blocks,
            start = %format!("0x{:08x}", image.start_address),
            end = %format!("0x{:08x}", image.end_address()),
            "Encoded UF2"
        );
        Ok(out)
    }
}
