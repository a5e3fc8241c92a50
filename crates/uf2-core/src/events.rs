//! Event system for UI decoupling.
//!
//! Lets the CLI (or any other front end) report conversion and flashing
//! progress without the core knowing how it is displayed.

use std::fmt;
use std::path::PathBuf;

use crate::decode::DecodeSummary;
use crate::format::InputFormat;
use crate::protocol::flag_names;

/// Kind of bytes a session produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// UF2 block stream.
    Uf2,
    /// Flat binary decoded from UF2.
    Bin,
    /// C array source text.
    CArray,
}

impl OutputKind {
    /// File extension used for the default output name.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputKind::Uf2 => "uf2",
            OutputKind::Bin => "bin",
            OutputKind::CArray => "h",
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Events emitted by a flash session.
#[derive(Debug, Clone)]
pub enum FlashEvent {
    /// Input classified.
    FormatDetected { format: InputFormat, size: usize },
    /// UF2 header summary (info mode and UF2 decoding).
    Summary(DecodeSummary),
    /// Conversion finished.
    Converted {
        kind: OutputKind,
        size: usize,
        start_address: Option<u32>,
    },
    /// Several families and no filter; the decoded image was discarded.
    AmbiguousFamilies { families: Vec<u32> },
    /// Output file written.
    FileWritten { path: PathBuf, size: usize },
    /// No drive yet; polling.
    WaitingForDrive,
    /// Writing to a bootloader drive.
    Flashing { path: PathBuf, board_id: String },
    /// Session finished successfully.
    Complete,
}

/// Observer trait for receiving flash events.
///
/// Implement this trait in your UI layer to receive updates.
pub trait FlashObserver: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &FlashEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl FlashObserver for NullObserver {
    fn on_event(&self, _event: &FlashEvent) {}
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl FlashObserver for TracingObserver {
    fn on_event(&self, event: &FlashEvent) {
        match event {
            FlashEvent::FormatDetected { format, size } => {
                tracing::info!(format = %format, size = size, "Input format detected");
            }
            FlashEvent::Summary(summary) => {
                for family in &summary.families {
                    tracing::info!(
                        family = %format!("0x{:08x}", family.id),
                        name = family.name.unwrap_or(""),
                        min_address = %format!("0x{:08x}", family.min_address),
                        "UF2 family"
                    );
                }
                if let Some(flags) = summary.last_flags {
                    tracing::info!(
                        flags = %format!("0x{:04x}", flags),
                        names = ?flag_names(flags),
                        consistent = summary.flags_consistent,
                        "UF2 block flags"
                    );
                }
            }
            FlashEvent::Converted {
                kind,
                size,
                start_address,
            } => {
                tracing::info!(
                    kind = %kind,
                    size = size,
                    start = ?start_address.map(|a| format!("0x{:x}", a)),
                    "Converted"
                );
            }
            FlashEvent::AmbiguousFamilies { families } => {
                tracing::warn!(
                    count = families.len(),
                    "Multiple families in UF2 and no --family given; output is empty"
                );
            }
            FlashEvent::FileWritten { path, size } => {
                tracing::info!(path = %path.display(), size = size, "Wrote file");
            }
            FlashEvent::WaitingForDrive => {
                tracing::info!("Waiting for drive to deploy...");
            }
            FlashEvent::Flashing { path, board_id } => {
                tracing::info!(path = %path.display(), board_id = %board_id, "Flashing");
            }
            FlashEvent::Complete => {
                tracing::debug!("Operation complete");
            }
        }
    }
}
