//! Device module - bootloader volume discovery.

pub mod mock;
pub mod scanner;
pub mod traits;

pub use mock::MockLocator;
pub use scanner::VolumeScanner;
pub use traits::{Drive, DriveError, DriveLocator, parse_board_id};
