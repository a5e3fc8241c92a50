//! UF2 block layout.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Write};
use thiserror::Error;

use super::constants::*;

#[derive(Error, Debug)]
pub enum BlockError {
    #[error("Buffer too small: expected {expected}, got {actual}")]
    BufferTooSmall { expected: usize, actual: usize },
    #[error("Invalid magic: got 0x{magic0:08X} 0x{magic1:08X}")]
    InvalidMagic { magic0: u32, magic1: u32 },
    #[error("Payload too large: {size} bytes, maximum {max}")]
    PayloadTooLarge { size: usize, max: usize },
    #[error("Target address overflow: base 0x{base:08X} + offset 0x{offset:X}")]
    AddressOverflow { base: u32, offset: usize },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One 512-byte UF2 block.
///
/// Layout (all words little-endian):
///
/// | Offset | Field |
/// |--------|-------|
/// | 0x000 | magic start 0 |
/// | 0x004 | magic start 1 |
/// | 0x008 | flags |
/// | 0x00C | target address |
/// | 0x010 | payload size |
/// | 0x014 | block number |
/// | 0x018 | total blocks |
/// | 0x01C | family id (or file size) |
/// | 0x020 | data (476 bytes) |
/// | 0x1FC | magic end |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uf2Block {
    pub flags: u32,
    pub target_addr: u32,
    pub payload_size: u32,
    pub block_no: u32,
    pub num_blocks: u32,
    pub family_id: u32,
    pub data: [u8; UF2_DATA_SIZE],
}

impl Uf2Block {
    pub const SIZE: usize = UF2_BLOCK_SIZE;

    /// Build a block carrying `payload` at `target_addr`.
    ///
    /// The family-present flag is set iff `family_id` is non-zero.
    pub fn new(
        target_addr: u32,
        payload: &[u8],
        block_no: u32,
        num_blocks: u32,
        family_id: u32,
    ) -> Result<Self, BlockError> {
        if payload.len() > UF2_DATA_SIZE {
            return Err(BlockError::PayloadTooLarge {
                size: payload.len(),
                max: UF2_DATA_SIZE,
            });
        }
        let mut data = [0u8; UF2_DATA_SIZE];
        data[..payload.len()].copy_from_slice(payload);

        let flags = if family_id != 0 {
            UF2_FLAG_FAMILY_ID_PRESENT
        } else {
            0
        };

        Ok(Self {
            flags,
            target_addr,
            payload_size: payload.len() as u32,
            block_no,
            num_blocks,
            family_id,
            data,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        self.write_to(&mut buf).unwrap();
        buf
    }

    /// Write the encoded block to `out`.
    pub fn write_to<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        let header = [
            UF2_MAGIC_START0,
            UF2_MAGIC_START1,
            self.flags,
            self.target_addr,
            self.payload_size,
            self.block_no,
            self.num_blocks,
            self.family_id,
        ];
        for word in header {
            out.write_u32::<LittleEndian>(word)?;
        }
        out.write_all(&self.data)?;
        out.write_u32::<LittleEndian>(UF2_MAGIC_END)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, BlockError> {
        if data.len() < Self::SIZE {
            return Err(BlockError::BufferTooSmall {
                expected: Self::SIZE,
                actual: data.len(),
            });
        }
        let mut cursor = Cursor::new(data);
        let magic0 = cursor.read_u32::<LittleEndian>()?;
        let magic1 = cursor.read_u32::<LittleEndian>()?;
        if magic0 != UF2_MAGIC_START0 || magic1 != UF2_MAGIC_START1 {
            return Err(BlockError::InvalidMagic { magic0, magic1 });
        }

        let flags = cursor.read_u32::<LittleEndian>()?;
        let target_addr = cursor.read_u32::<LittleEndian>()?;
        let payload_size = cursor.read_u32::<LittleEndian>()?;
        let block_no = cursor.read_u32::<LittleEndian>()?;
        let num_blocks = cursor.read_u32::<LittleEndian>()?;
        let family_id = cursor.read_u32::<LittleEndian>()?;

        let mut block_data = [0u8; UF2_DATA_SIZE];
        block_data.copy_from_slice(&data[UF2_HEADER_SIZE..UF2_HEADER_SIZE + UF2_DATA_SIZE]);

        Ok(Self {
            flags,
            target_addr,
            payload_size,
            block_no,
            num_blocks,
            family_id,
            data: block_data,
        })
    }

    /// Payload bytes, clamped to the data area.
    pub fn payload(&self) -> &[u8] {
        let len = (self.payload_size as usize).min(UF2_DATA_SIZE);
        &self.data[..len]
    }

    pub fn is_not_main_flash(&self) -> bool {
        self.flags & UF2_FLAG_NOT_MAIN_FLASH != 0
    }

    pub fn has_family_id(&self) -> bool {
        self.flags & UF2_FLAG_FAMILY_ID_PRESENT != 0
    }
}

/// Names of the known flag bits set in `flags`.
pub fn flag_names(flags: u32) -> Vec<&'static str> {
    [
        (UF2_FLAG_NOT_MAIN_FLASH, "not-main-flash"),
        (UF2_FLAG_FILE_CONTAINER, "file-container"),
        (UF2_FLAG_FAMILY_ID_PRESENT, "family-id"),
        (UF2_FLAG_MD5_PRESENT, "md5"),
    ]
    .into_iter()
    .filter(|(bit, _)| flags & bit != 0)
    .map(|(_, name)| name)
    .collect()
}

/// Check the two start magics at the beginning of `data`.
pub fn has_uf2_magic(data: &[u8]) -> bool {
    if data.len() < 8 {
        return false;
    }
    let mut cursor = Cursor::new(data);
    matches!(
        (
            cursor.read_u32::<LittleEndian>(),
            cursor.read_u32::<LittleEndian>()
        ),
        (Ok(UF2_MAGIC_START0), Ok(UF2_MAGIC_START1))
    )
}
