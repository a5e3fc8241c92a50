//! UF2 format constants.
//!
//! Values follow the Microsoft UF2 format header (`uf2.h`).

// ============================================================================
// Block Magic Numbers
// ============================================================================

/// First start magic - "UF2\n" little-endian
pub const UF2_MAGIC_START0: u32 = 0x0A324655;

/// Second start magic
pub const UF2_MAGIC_START1: u32 = 0x9E5D5157;

/// End magic, last word of every block
pub const UF2_MAGIC_END: u32 = 0x0AB16F30;

// ============================================================================
// Block Flags
// ============================================================================

/// Block is not meant for main flash; bootloaders skip it
pub const UF2_FLAG_NOT_MAIN_FLASH: u32 = 0x0000_0001;

/// Block is part of a file container
pub const UF2_FLAG_FILE_CONTAINER: u32 = 0x0000_1000;

/// `family_id` field holds a family id instead of a file size
pub const UF2_FLAG_FAMILY_ID_PRESENT: u32 = 0x0000_2000;

/// Data area carries an MD5 checksum
pub const UF2_FLAG_MD5_PRESENT: u32 = 0x0000_4000;

// ============================================================================
// Size Constants
// ============================================================================

/// Size of one UF2 block
pub const UF2_BLOCK_SIZE: usize = 512;

/// Header size (8 DWORDs)
pub const UF2_HEADER_SIZE: usize = 32;

/// Data area size (block minus header minus end magic)
pub const UF2_DATA_SIZE: usize = 476;

/// Payload carried by each block we produce
pub const UF2_PAYLOAD_SIZE: usize = 256;

/// Largest zero gap the decoder will fill between two blocks (10 MiB)
pub const MAX_PADDING: u32 = 10 * 1024 * 1024;

// ============================================================================
// Bootloader Volume
// ============================================================================

/// Marker file present at the root of every UF2 bootloader volume
pub const INFO_FILE: &str = "INFO_UF2.TXT";

/// Name the image is written under on the bootloader volume
pub const UPLOAD_FILE: &str = "NEW.UF2";

/// Prefix of the board identification line in `INFO_UF2.TXT`
pub const BOARD_ID_TAG: &str = "Board-ID: ";

// ============================================================================
// Defaults
// ============================================================================

/// Load address used for raw binary input when none is given
pub const DEFAULT_BASE_ADDRESS: u32 = 0x2000;

/// Interval between drive scans while waiting for a bootloader (ms)
pub const DEVICE_POLL_INTERVAL_MS: u64 = 100;
