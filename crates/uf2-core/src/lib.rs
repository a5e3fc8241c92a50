//! UF2-Core: UF2 firmware container conversion and flashing in Rust.
//!
//! Converts between raw binaries, Intel HEX and the UF2 block format, and
//! copies UF2 images onto mounted bootloader volumes.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Protocol**: Block layout, magics, flags
//! - **Family**: Known family IDs and argument resolution
//! - **Codecs**: Binary encoder, UF2 decoder, Intel HEX reader, C array writer
//! - **Device**: Bootloader volume discovery (filesystem scan, mock)
//! - **Events**: Observer pattern for UI decoupling
//! - **Session**: Top-level convert and deploy procedure
//!
//! # Example
//!
//! ```no_run
//! use uf2_core::session::{FlashSession, SessionConfig};
//!
//! let config = SessionConfig {
//!     input: Some("firmware.bin".into()),
//!     base: 0x1000_0000,
//!     family: "RP2040".to_string(),
//!     ..Default::default()
//! };
//!
//! let session = FlashSession::new(config);
//! session.run().expect("flash failed");
//! ```

pub mod carray;
pub mod decode;
pub mod device;
pub mod encode;
pub mod events;
pub mod family;
pub mod format;
pub mod hex;
pub mod image;
pub mod protocol;
pub mod session;

// Re-exports for convenience
pub use carray::to_c_array;
pub use decode::{DecodeError, DecodeSummary, DecodedUf2, Uf2Decoder};
pub use device::{Drive, DriveError, DriveLocator, MockLocator, VolumeScanner};
pub use encode::Uf2Encoder;
pub use events::{FlashEvent, FlashObserver, NullObserver, OutputKind, TracingObserver};
pub use family::{FamilyError, FamilyRegistry, parse_u32};
pub use format::InputFormat;
pub use hex::{DecodedHex, HexDecoder, HexError};
pub use image::{ConversionContext, FlatImage};
pub use protocol::{BlockError, Uf2Block};
pub use session::{FlashError, FlashReport, FlashSession, Outcome, SessionConfig};
