//! Flash session - top-level convert and deploy procedure.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::carray::to_c_array;
use crate::decode::{DecodeSummary, Uf2Decoder};
use crate::device::{Drive, DriveError, DriveLocator, VolumeScanner};
use crate::encode::Uf2Encoder;
use crate::events::{FlashEvent, FlashObserver, OutputKind, TracingObserver};
use crate::family::{FamilyError, FamilyRegistry};
use crate::format::InputFormat;
use crate::hex::HexDecoder;
use crate::image::{ConversionContext, FlatImage};
use crate::protocol::{DEFAULT_BASE_ADDRESS, DEVICE_POLL_INTERVAL_MS};

#[derive(Error, Debug)]
pub enum FlashError {
    #[error("Need input file")]
    MissingInput,

    #[error("No drive to deploy.")]
    NoDrive,

    #[error("Failed to read {}: {source}", .path.display())]
    ReadInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", .path.display())]
    WriteOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration for a flash session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Input file (HEX, BIN or UF2).
    pub input: Option<PathBuf>,
    /// Load address for raw binary input.
    pub base: u32,
    /// Family name or numeric id; "0x0" for none.
    pub family: String,
    /// Output file. Defaults to `flash.<ext>` where sensible.
    pub output: Option<PathBuf>,
    /// Flash this volume instead of scanning for one.
    pub device: Option<PathBuf>,
    /// Only convert, never flash.
    pub convert: bool,
    /// Only flash, never convert.
    pub deploy: bool,
    /// Wait for a drive instead of failing.
    pub wait: bool,
    /// Emit binary input as a C array.
    pub carray: bool,
    /// Only print the UF2 header summary.
    pub info: bool,
    /// Delay between drive scans while waiting.
    pub poll_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            input: None,
            base: DEFAULT_BASE_ADDRESS,
            family: "0x0".to_string(),
            output: None,
            device: None,
            convert: false,
            deploy: false,
            wait: false,
            carray: false,
            info: false,
            poll_interval_ms: DEVICE_POLL_INTERVAL_MS,
        }
    }
}

impl SessionConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SessionConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Resolve the family argument into a conversion context.
    pub fn context(&self, registry: &FamilyRegistry) -> Result<ConversionContext, FamilyError> {
        Ok(ConversionContext::new(
            self.base,
            registry.resolve(&self.family)?,
        ))
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Input converted to the output kind.
    Converted,
    /// Input passed through unchanged.
    Deployed,
    /// UF2 summary only; nothing produced.
    InfoOnly,
    /// Multi-family UF2 without a family filter; output is empty.
    AmbiguousFamilies,
}

/// What a session did.
#[derive(Debug, Clone)]
pub struct FlashReport {
    pub format: InputFormat,
    pub outcome: Outcome,
    pub kind: OutputKind,
    pub output_size: usize,
    pub start_address: Option<u32>,
    pub summary: Option<DecodeSummary>,
    pub files_written: Vec<PathBuf>,
    pub drives_flashed: Vec<Drive>,
}

/// Conversion result before anything is written.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub kind: OutputKind,
    pub bytes: Vec<u8>,
    pub start_address: Option<u32>,
    pub summary: Option<DecodeSummary>,
    pub outcome: Outcome,
}

/// Flash session - runs one conversion and deploys the result.
pub struct FlashSession<L: DriveLocator, O: FlashObserver> {
    config: SessionConfig,
    locator: L,
    observer: Arc<O>,
    registry: FamilyRegistry,
}

impl FlashSession<VolumeScanner, TracingObserver> {
    /// Create a session scanning the platform's mount points, logging events.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_parts(
            config,
            VolumeScanner::platform_default(),
            Arc::new(TracingObserver),
        )
    }
}

impl<L: DriveLocator, O: FlashObserver> FlashSession<L, O> {
    /// Create a session with a custom locator and observer.
    pub fn with_parts(config: SessionConfig, locator: L, observer: Arc<O>) -> Self {
        Self {
            config,
            locator,
            observer,
            registry: FamilyRegistry::builtin(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn locator(&self) -> &L {
        &self.locator
    }

    /// Resolve the family argument against the registry.
    pub fn context(&self) -> Result<ConversionContext, FamilyError> {
        self.config.context(&self.registry)
    }

    /// Drives currently mounted.
    pub fn list_drives(&self) -> Result<Vec<Drive>, DriveError> {
        self.locator.discover()
    }

    /// Run the complete session.
    #[instrument(skip(self), fields(input = ?self.config.input))]
    pub fn run(&self) -> Result<FlashReport> {
        // Configuration errors come before any I/O.
        let ctx = self.context()?;
        let input_path = self.config.input.as_ref().ok_or(FlashError::MissingInput)?;

        let input = std::fs::read(input_path).map_err(|source| FlashError::ReadInput {
            path: input_path.clone(),
            source,
        })?;
        let format = InputFormat::detect(&input);
        self.observer.on_event(&FlashEvent::FormatDetected {
            format,
            size: input.len(),
        });

        let conversion = self.convert(&ctx, format, input)?;

        if let Some(summary) = &conversion.summary {
            self.observer.on_event(&FlashEvent::Summary(summary.clone()));
        }
        match conversion.outcome {
            Outcome::Converted => self.observer.on_event(&FlashEvent::Converted {
                kind: conversion.kind,
                size: conversion.bytes.len(),
                start_address: conversion.start_address,
            }),
            Outcome::AmbiguousFamilies => {
                let families = conversion
                    .summary
                    .iter()
                    .flat_map(|s| s.families.iter().map(|f| f.id))
                    .collect();
                self.observer
                    .on_event(&FlashEvent::AmbiguousFamilies { families });
                self.observer.on_event(&FlashEvent::Converted {
                    kind: conversion.kind,
                    size: conversion.bytes.len(),
                    start_address: conversion.start_address,
                });
            }
            Outcome::Deployed | Outcome::InfoOnly => {}
        }

        let mut files_written = Vec::new();
        if !self.info_only(&conversion)
            && let Some(path) = self.output_path(conversion.kind)
        {
            write_file(&path, &conversion.bytes)?;
            self.observer.on_event(&FlashEvent::FileWritten {
                path: path.clone(),
                size: conversion.bytes.len(),
            });
            files_written.push(path);
        }

        let mut drives_flashed = Vec::new();
        if self.deploys_to_drive(&conversion) {
            for drive in self.find_drives(!files_written.is_empty())? {
                self.observer.on_event(&FlashEvent::Flashing {
                    path: drive.path.clone(),
                    board_id: drive.board_id.clone(),
                });
                let path = drive.write_image(&conversion.bytes)?;
                self.observer.on_event(&FlashEvent::FileWritten {
                    path,
                    size: conversion.bytes.len(),
                });
                drives_flashed.push(drive);
            }
        }

        self.observer.on_event(&FlashEvent::Complete);

        Ok(FlashReport {
            format,
            outcome: conversion.outcome,
            kind: conversion.kind,
            output_size: conversion.bytes.len(),
            start_address: conversion.start_address,
            summary: conversion.summary,
            files_written,
            drives_flashed,
        })
    }

    /// Produce the output bytes for `input` without writing anything.
    pub fn convert(
        &self,
        ctx: &ConversionContext,
        format: InputFormat,
        input: Vec<u8>,
    ) -> Result<Conversion> {
        if self.config.deploy {
            return Ok(Conversion {
                kind: OutputKind::Uf2,
                bytes: input,
                start_address: None,
                summary: None,
                outcome: Outcome::Deployed,
            });
        }

        let conversion = match format {
            InputFormat::Uf2 => {
                let decoded = Uf2Decoder::new(*ctx).decode(&input)?;
                if self.config.info {
                    Conversion {
                        kind: OutputKind::Uf2,
                        bytes: Vec::new(),
                        start_address: Some(decoded.image.start_address),
                        summary: Some(decoded.summary),
                        outcome: Outcome::InfoOnly,
                    }
                } else {
                    Conversion {
                        kind: OutputKind::Bin,
                        start_address: Some(decoded.image.start_address),
                        outcome: if decoded.ambiguous {
                            Outcome::AmbiguousFamilies
                        } else {
                            Outcome::Converted
                        },
                        bytes: decoded.image.data,
                        summary: Some(decoded.summary),
                    }
                }
            }
            InputFormat::Hex => {
                let decoded = HexDecoder::from_context(ctx).decode_bytes(&input)?;
                Conversion {
                    kind: OutputKind::Uf2,
                    bytes: decoded.uf2,
                    start_address: decoded.start_address,
                    summary: None,
                    outcome: Outcome::Converted,
                }
            }
            InputFormat::Binary if self.config.carray => Conversion {
                kind: OutputKind::CArray,
                bytes: to_c_array(&input).into_bytes(),
                start_address: Some(ctx.base_address),
                summary: None,
                outcome: Outcome::Converted,
            },
            InputFormat::Binary => {
                let image = FlatImage::new(ctx.base_address, input);
                Conversion {
                    kind: OutputKind::Uf2,
                    bytes: Uf2Encoder::from_context(ctx).encode(&image)?,
                    start_address: Some(ctx.base_address),
                    summary: None,
                    outcome: Outcome::Converted,
                }
            }
        };
        Ok(conversion)
    }

    /// Explicit output, or `flash.<ext>` when converting only or when the
    /// result is not UF2.
    pub fn output_path(&self, kind: OutputKind) -> Option<PathBuf> {
        if let Some(path) = &self.config.output {
            return Some(path.clone());
        }
        if self.config.convert || kind != OutputKind::Uf2 {
            return Some(PathBuf::from(format!("flash.{}", kind.extension())));
        }
        None
    }

    /// Info mode produces nothing, whatever the input format.
    fn info_only(&self, conversion: &Conversion) -> bool {
        self.config.info || conversion.outcome == Outcome::InfoOnly
    }

    fn deploys_to_drive(&self, conversion: &Conversion) -> bool {
        conversion.kind == OutputKind::Uf2 && !self.info_only(conversion) && !self.config.convert
    }

    /// Drives to flash. Waits when asked to; fails when there is nothing
    /// to flash and no file was written either.
    fn find_drives(&self, wrote_file: bool) -> Result<Vec<Drive>> {
        if let Some(device) = &self.config.device {
            if !self.config.wait {
                return Ok(vec![Drive::open(device)?]);
            }
            let mut drive = Drive::probe(device)?;
            if drive.is_none() {
                self.observer.on_event(&FlashEvent::WaitingForDrive);
                let interval = Duration::from_millis(self.config.poll_interval_ms);
                while drive.is_none() {
                    thread::sleep(interval);
                    drive = Drive::probe(device)?;
                }
                info!(path = %device.display(), "Device appeared");
            }
            return Ok(drive.into_iter().collect());
        }

        let mut drives = self.locator.discover()?;
        if drives.is_empty() && self.config.wait {
            self.observer.on_event(&FlashEvent::WaitingForDrive);
            let interval = Duration::from_millis(self.config.poll_interval_ms);
            while drives.is_empty() {
                thread::sleep(interval);
                drives = self.locator.discover()?;
            }
            info!(count = drives.len(), "Drive appeared");
        }

        if drives.is_empty() && !wrote_file {
            return Err(FlashError::NoDrive.into());
        }
        debug!(count = drives.len(), "Drives to flash");
        Ok(drives)
    }
}

/// Write the whole buffer to `path`.
fn write_file(path: &Path, data: &[u8]) -> Result<(), FlashError> {
    std::fs::write(path, data).map_err(|source| FlashError::WriteOutput {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MockLocator;
    use crate::events::NullObserver;
    use crate::protocol::{INFO_FILE, UF2_FLAG_FAMILY_ID_PRESENT, UPLOAD_FILE, Uf2Block};
    use std::sync::Mutex;

    const RP2040: u32 = 0xe48bff56;

    /// Records every event for inspection.
    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<FlashEvent>>,
    }

    impl FlashObserver for RecordingObserver {
        fn on_event(&self, event: &FlashEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    struct Fixture {
        dir: PathBuf,
    }

    impl Fixture {
        fn new(name: &str) -> Self {
            let dir = std::env::temp_dir().join(format!("uf2-session-{}-{}", name, std::process::id()));
            let _ = std::fs::remove_dir_all(&dir);
            std::fs::create_dir_all(&dir).unwrap();
            Self { dir }
        }

        fn file(&self, name: &str, data: &[u8]) -> PathBuf {
            let path = self.dir.join(name);
            std::fs::write(&path, data).unwrap();
            path
        }

        fn volume(&self, name: &str, board_id: &str) -> Drive {
            let path = self.dir.join(name);
            std::fs::create_dir_all(&path).unwrap();
            std::fs::write(
                path.join(INFO_FILE),
                format!("UF2 Bootloader v1.0\nBoard-ID: {}\n", board_id),
            )
            .unwrap();
            Drive {
                path,
                board_id: board_id.to_string(),
            }
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    fn session(config: SessionConfig, locator: MockLocator) -> FlashSession<MockLocator, NullObserver> {
        FlashSession::with_parts(config, locator, Arc::new(NullObserver))
    }

    #[test]
    fn test_binary_to_uf2_file() {
        let fx = Fixture::new("bin2uf2");
        let firmware: Vec<u8> = (0..700u32).map(|i| i as u8).collect();
        let out = fx.dir.join("out.uf2");
        let config = SessionConfig {
            input: Some(fx.file("firmware.bin", &firmware)),
            base: 0x8000,
            family: "RP2040".to_string(),
            output: Some(out.clone()),
            convert: true,
            ..Default::default()
        };

        let s = session(config, MockLocator::new());
        let report = s.run().unwrap();
        assert_eq!(report.format, InputFormat::Binary);
        assert_eq!(report.outcome, Outcome::Converted);
        assert_eq!(report.kind, OutputKind::Uf2);
        assert_eq!(report.start_address, Some(0x8000));
        assert_eq!(report.files_written, vec![out.clone()]);
        assert!(report.drives_flashed.is_empty());
        assert_eq!(s.locator().calls(), 0);

        let written = std::fs::read(&out).unwrap();
        assert_eq!(written.len(), 3 * 512);
        let first = Uf2Block::from_bytes(&written).unwrap();
        assert_eq!(first.family_id, RP2040);
        assert_eq!(first.target_addr, 0x8000);
        assert_eq!(first.flags, UF2_FLAG_FAMILY_ID_PRESENT);
    }

    #[test]
    fn test_info_writes_nothing() {
        let fx = Fixture::new("info");
        let uf2 = Uf2Encoder::new(RP2040)
            .encode(&FlatImage::new(0x1000_0000, vec![1; 512]))
            .unwrap();
        let out = fx.dir.join("never.bin");
        let config = SessionConfig {
            input: Some(fx.file("out.uf2", &uf2)),
            output: Some(out.clone()),
            info: true,
            ..Default::default()
        };

        let observer = Arc::new(RecordingObserver::default());
        let s = FlashSession::with_parts(config, MockLocator::new(), observer.clone());
        let report = s.run().unwrap();

        assert_eq!(report.outcome, Outcome::InfoOnly);
        assert_eq!(report.output_size, 0);
        assert!(report.files_written.is_empty());
        assert!(!out.exists());
        assert_eq!(s.locator().calls(), 0);

        let summary = report.summary.unwrap();
        assert_eq!(summary.families.len(), 1);
        assert_eq!(summary.families[0].name, Some("RP2040"));
        assert_eq!(summary.families[0].min_address, 0x1000_0000);

        let events = observer.events.lock().unwrap();
        assert!(events.iter().any(|e| matches!(e, FlashEvent::Summary(_))));
        assert!(!events.iter().any(|e| matches!(e, FlashEvent::Converted { .. })));
    }

    #[test]
    fn test_uf2_to_bin() {
        let fx = Fixture::new("uf22bin");
        let uf2 = Uf2Encoder::default()
            .encode(&FlatImage::new(0x4000, vec![0xAB; 256]))
            .unwrap();
        let out = fx.dir.join("flash.bin");
        let config = SessionConfig {
            input: Some(fx.file("in.uf2", &uf2)),
            output: Some(out.clone()),
            ..Default::default()
        };

        let s = session(config, MockLocator::new());
        let report = s.run().unwrap();
        assert_eq!(report.kind, OutputKind::Bin);
        assert_eq!(report.start_address, Some(0x4000));
        assert_eq!(std::fs::read(&out).unwrap(), vec![0xAB; 256]);
        // Binary output never goes to a drive
        assert_eq!(s.locator().calls(), 0);
    }

    #[test]
    fn test_ambiguous_uf2_reported() {
        let fx = Fixture::new("ambiguous");
        let mut uf2 = Uf2Block::new(0x1000_0000, &[1; 256], 0, 1, RP2040)
            .unwrap()
            .to_bytes();
        uf2.extend(Uf2Block::new(0x2000, &[2; 256], 0, 1, 0x68ed2b88).unwrap().to_bytes());
        let out = fx.dir.join("flash.bin");
        let config = SessionConfig {
            input: Some(fx.file("multi.uf2", &uf2)),
            output: Some(out.clone()),
            ..Default::default()
        };

        let observer = Arc::new(RecordingObserver::default());
        let report = FlashSession::with_parts(config, MockLocator::new(), observer.clone())
            .run()
            .unwrap();
        assert_eq!(report.outcome, Outcome::AmbiguousFamilies);
        assert_eq!(report.start_address, Some(0));
        assert_eq!(std::fs::read(&out).unwrap().len(), 0);

        let events = observer.events.lock().unwrap();
        assert!(events.iter().any(|e| matches!(
            e,
            FlashEvent::AmbiguousFamilies { families } if families.len() == 2
        )));
    }

    #[test]
    fn test_hex_flashed_to_discovered_drive() {
        let fx = Fixture::new("hex");
        let drive = fx.volume("RPI-RP2", "RPI-RP2");
        let hex = b":020000041000EA\n:0400000001020304F2\n:00000001FF\n";
        let config = SessionConfig {
            input: Some(fx.file("fw.hex", hex)),
            ..Default::default()
        };

        let s = session(config, MockLocator::with_drives(vec![drive.clone()]));
        let report = s.run().unwrap();
        assert_eq!(report.format, InputFormat::Hex);
        assert_eq!(report.start_address, Some(0x1000_0000));
        assert!(report.files_written.is_empty());
        assert_eq!(report.drives_flashed, vec![drive.clone()]);

        let flashed = std::fs::read(drive.path.join(UPLOAD_FILE)).unwrap();
        let block = Uf2Block::from_bytes(&flashed).unwrap();
        assert_eq!(block.target_addr, 0x1000_0000);
        assert_eq!(&block.payload()[..4], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_no_drive_is_fatal() {
        let fx = Fixture::new("nodrive");
        let config = SessionConfig {
            input: Some(fx.file("fw.bin", &[0; 16])),
            ..Default::default()
        };
        let err = session(config, MockLocator::new()).run().unwrap_err();
        assert!(matches!(err.downcast_ref::<FlashError>(), Some(FlashError::NoDrive)));
    }

    #[test]
    fn test_no_drive_with_output_is_fine() {
        let fx = Fixture::new("nodrive-out");
        let out = fx.dir.join("fw.uf2");
        let config = SessionConfig {
            input: Some(fx.file("fw.bin", &[0; 16])),
            output: Some(out.clone()),
            ..Default::default()
        };
        let s = session(config, MockLocator::new());
        let report = s.run().unwrap();
        assert_eq!(report.files_written, vec![out]);
        assert!(report.drives_flashed.is_empty());
        assert_eq!(s.locator().calls(), 1);
    }

    #[test]
    fn test_wait_polls_until_drive_appears() {
        let fx = Fixture::new("wait");
        let drive = fx.volume("BOOT", "TEST-BOARD");
        let config = SessionConfig {
            input: Some(fx.file("fw.bin", &[7; 300])),
            wait: true,
            poll_interval_ms: 1,
            ..Default::default()
        };
        let locator = MockLocator::new();
        locator.queue_scan(vec![]);
        locator.queue_scan(vec![]);
        locator.queue_scan(vec![drive.clone()]);

        let observer = Arc::new(RecordingObserver::default());
        let s = FlashSession::with_parts(config, locator, observer.clone());
        let report = s.run().unwrap();
        assert_eq!(s.locator().calls(), 3);
        assert_eq!(report.drives_flashed.len(), 1);
        assert_eq!(
            std::fs::read(drive.path.join(UPLOAD_FILE)).unwrap().len(),
            2 * 512
        );

        let events = observer.events.lock().unwrap();
        assert!(events.iter().any(|e| matches!(e, FlashEvent::WaitingForDrive)));
    }

    #[test]
    fn test_deploy_passes_input_through() {
        let fx = Fixture::new("deploy");
        let a = fx.volume("A", "BOARD-A");
        let b = fx.volume("B", "BOARD-B");
        let payload = b"not even a uf2 file".to_vec();
        let config = SessionConfig {
            input: Some(fx.file("blob", &payload)),
            deploy: true,
            ..Default::default()
        };

        let report = session(config, MockLocator::with_drives(vec![a.clone(), b.clone()]))
            .run()
            .unwrap();
        assert_eq!(report.outcome, Outcome::Deployed);
        assert_eq!(report.drives_flashed.len(), 2);
        assert_eq!(std::fs::read(a.upload_path()).unwrap(), payload);
        assert_eq!(std::fs::read(b.upload_path()).unwrap(), payload);
    }

    #[test]
    fn test_explicit_device_skips_discovery() {
        let fx = Fixture::new("device");
        let drive = fx.volume("PICO", "RPI-RP2");
        let config = SessionConfig {
            input: Some(fx.file("fw.bin", &[1; 4])),
            device: Some(drive.path.clone()),
            ..Default::default()
        };

        let s = session(config, MockLocator::new());
        let report = s.run().unwrap();
        assert_eq!(s.locator().calls(), 0);
        assert_eq!(report.drives_flashed, vec![drive]);
    }

    #[test]
    fn test_missing_device_without_wait_fails() {
        let fx = Fixture::new("device-missing");
        let config = SessionConfig {
            input: Some(fx.file("fw.bin", &[1; 4])),
            device: Some(fx.dir.join("NOTYET")),
            ..Default::default()
        };
        let err = session(config, MockLocator::new()).run().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DriveError>(),
            Some(DriveError::NotBootloader { .. })
        ));
    }

    #[test]
    fn test_wait_for_explicit_device() {
        let fx = Fixture::new("device-wait");
        let volume = fx.dir.join("NOTYET");
        let config = SessionConfig {
            input: Some(fx.file("fw.bin", &[9; 64])),
            device: Some(volume.clone()),
            wait: true,
            poll_interval_ms: 5,
            ..Default::default()
        };

        let mount = volume.clone();
        let mounter = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            std::fs::create_dir_all(&mount).unwrap();
            // Rename so the scan never sees a half-written marker
            let staged = mount.join("info.tmp");
            std::fs::write(&staged, "Board-ID: LATE-BOARD\n").unwrap();
            std::fs::rename(&staged, mount.join(INFO_FILE)).unwrap();
        });

        let observer = Arc::new(RecordingObserver::default());
        let s = FlashSession::with_parts(config, MockLocator::new(), observer.clone());
        let report = s.run().unwrap();
        mounter.join().unwrap();

        assert_eq!(s.locator().calls(), 0);
        assert_eq!(report.drives_flashed.len(), 1);
        assert_eq!(report.drives_flashed[0].board_id, "LATE-BOARD");
        assert_eq!(std::fs::read(volume.join(UPLOAD_FILE)).unwrap().len(), 512);

        let events = observer.events.lock().unwrap();
        assert!(events.iter().any(|e| matches!(e, FlashEvent::WaitingForDrive)));
    }

    #[test]
    fn test_info_with_binary_input_touches_nothing() {
        let fx = Fixture::new("info-bin");
        let drive = fx.volume("BOOT", "TEST-BOARD");
        let out = fx.dir.join("never.uf2");
        let config = SessionConfig {
            input: Some(fx.file("fw.bin", &[3; 300])),
            output: Some(out.clone()),
            info: true,
            ..Default::default()
        };

        let s = session(config, MockLocator::with_drives(vec![drive.clone()]));
        let report = s.run().unwrap();
        assert_eq!(s.locator().calls(), 0);
        assert!(report.files_written.is_empty());
        assert!(report.drives_flashed.is_empty());
        assert!(!out.exists());
        assert!(!drive.upload_path().exists());
    }

    #[test]
    fn test_info_without_drive_is_not_an_error() {
        let fx = Fixture::new("info-nodrive");
        let config = SessionConfig {
            input: Some(fx.file("fw.bin", &[3; 16])),
            info: true,
            ..Default::default()
        };
        let s = session(config, MockLocator::new());
        assert!(s.run().is_ok());
        assert_eq!(s.locator().calls(), 0);
    }

    #[test]
    fn test_info_overrides_deploy() {
        let fx = Fixture::new("info-deploy");
        let drive = fx.volume("BOOT", "TEST-BOARD");
        let config = SessionConfig {
            input: Some(fx.file("blob", b"payload")),
            deploy: true,
            info: true,
            ..Default::default()
        };

        let s = session(config, MockLocator::with_drives(vec![drive.clone()]));
        let report = s.run().unwrap();
        assert_eq!(s.locator().calls(), 0);
        assert!(report.drives_flashed.is_empty());
        assert!(!drive.upload_path().exists());
    }

    #[test]
    fn test_carray_output() {
        let fx = Fixture::new("carray");
        let out = fx.dir.join("fw.h");
        let config = SessionConfig {
            input: Some(fx.file("fw.bin", &[0xDE, 0xAD])),
            output: Some(out.clone()),
            carray: true,
            ..Default::default()
        };
        let report = session(config, MockLocator::new()).run().unwrap();
        assert_eq!(report.kind, OutputKind::CArray);
        let text = std::fs::read_to_string(&out).unwrap();
        assert!(text.starts_with("const unsigned long bindata_len = 2;\n"));
        assert!(text.contains("0xde, 0xad, "));
    }

    #[test]
    fn test_unknown_family_fails_before_io() {
        let config = SessionConfig {
            input: Some(PathBuf::from("/nonexistent/firmware.bin")),
            family: "NOPE".to_string(),
            ..Default::default()
        };
        let err = session(config, MockLocator::new()).run().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FamilyError>(),
            Some(FamilyError::Unknown { .. })
        ));
    }

    #[test]
    fn test_missing_input() {
        let err = session(SessionConfig::default(), MockLocator::new())
            .run()
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FlashError>(),
            Some(FlashError::MissingInput)
        ));
    }

    #[test]
    fn test_default_output_paths() {
        let s = session(SessionConfig::default(), MockLocator::new());
        assert_eq!(s.output_path(OutputKind::Uf2), None);
        assert_eq!(s.output_path(OutputKind::Bin), Some(PathBuf::from("flash.bin")));
        assert_eq!(s.output_path(OutputKind::CArray), Some(PathBuf::from("flash.h")));

        let convert = SessionConfig {
            convert: true,
            ..Default::default()
        };
        let s = session(convert, MockLocator::new());
        assert_eq!(s.output_path(OutputKind::Uf2), Some(PathBuf::from("flash.uf2")));
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let fx = Fixture::new("config");
        let path = fx.dir.join("uf2conv.toml");
        let config = SessionConfig {
            base: 0x1000_0000,
            family: "RP2040".to_string(),
            wait: true,
            ..Default::default()
        };
        config.save_to_file(&path).unwrap();

        let loaded = SessionConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.base, 0x1000_0000);
        assert_eq!(loaded.family, "RP2040");
        assert!(loaded.wait);
        assert_eq!(loaded.poll_interval_ms, DEVICE_POLL_INTERVAL_MS);

        // Missing keys fall back to defaults
        std::fs::write(&path, "family = \"SAMD21\"\n").unwrap();
        let partial = SessionConfig::load_from_file(&path).unwrap();
        assert_eq!(partial.base, DEFAULT_BASE_ADDRESS);
        assert_eq!(partial.family, "SAMD21");
    }
}
