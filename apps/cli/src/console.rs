//! Plain-text progress output for the terminal.

use uf2_core::events::{FlashEvent, FlashObserver};

/// Prints user-facing progress lines to stdout. Diagnostics go through
/// tracing on stderr.
pub struct ConsoleObserver;

impl FlashObserver for ConsoleObserver {
    fn on_event(&self, event: &FlashEvent) {
        match event {
            FlashEvent::Summary(summary) => println!("{}", summary),
            FlashEvent::Converted {
                kind,
                size,
                start_address,
            } => println!(
                "Converted to {}, output size: {}, start address: 0x{:x}",
                kind,
                size,
                start_address.unwrap_or(0)
            ),
            FlashEvent::AmbiguousFamilies { families } => {
                let ids: Vec<String> = families.iter().map(|id| format!("0x{:08x}", id)).collect();
                println!(
                    "Multiple families found ({}); pass --family to select one",
                    ids.join(", ")
                );
            }
            FlashEvent::FileWritten { path, size } => {
                println!("Wrote {} bytes to {}", size, path.display())
            }
            FlashEvent::WaitingForDrive => println!("Waiting for drive to deploy..."),
            FlashEvent::Flashing { path, board_id } => {
                println!("Flashing {} ({})", path.display(), board_id)
            }
            FlashEvent::FormatDetected { .. } | FlashEvent::Complete => {}
        }
    }
}
