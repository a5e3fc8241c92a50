//! Filesystem scan for mounted bootloader volumes.

use std::path::{Path, PathBuf};

use tracing::{debug, instrument, trace};

use super::traits::{Drive, DriveError, DriveLocator};

/// Finds bootloader volumes by looking for the marker file.
///
/// `roots` are mount directories whose children are candidate volumes
/// (`/media/$USER`, `/Volumes`). `volumes` are candidates checked directly
/// (Windows drive letters).
#[derive(Debug, Clone, Default)]
pub struct VolumeScanner {
    roots: Vec<PathBuf>,
    volumes: Vec<PathBuf>,
}

impl VolumeScanner {
    /// Scanner over explicit mount roots.
    pub fn with_roots<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
            volumes: Vec::new(),
        }
    }

    /// Scanner over the usual removable-media locations of this platform.
    pub fn platform_default() -> Self {
        if cfg!(windows) {
            return Self {
                roots: Vec::new(),
                volumes: (b'A'..=b'Z')
                    .map(|letter| PathBuf::from(format!("{}:\\", letter as char)))
                    .collect(),
            };
        }

        let mut roots = Vec::new();
        if cfg!(target_os = "macos") {
            roots.push(PathBuf::from("/Volumes"));
        } else {
            roots.push(PathBuf::from("/media"));
            if cfg!(target_os = "linux")
                && let Ok(user) = std::env::var("USER")
            {
                roots.push(Path::new("/media").join(&user));
                roots.push(Path::new("/run/media").join(&user));
            }
        }
        Self::with_roots(roots)
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Every path that could be a volume root, sorted.
    fn candidates(&self) -> Vec<PathBuf> {
        let mut found = self.volumes.clone();
        for root in &self.roots {
            let Ok(entries) = std::fs::read_dir(root) else {
                trace!(root = %root.display(), "Mount root not readable");
                continue;
            };
            found.extend(entries.filter_map(|e| e.ok()).map(|e| e.path()));
        }
        found.sort();
        found.dedup();
        found
    }
}

impl DriveLocator for VolumeScanner {
    #[instrument(level = "debug", skip(self))]
    fn discover(&self) -> Result<Vec<Drive>, DriveError> {
        let mut drives = Vec::new();
        for candidate in self.candidates() {
            if let Some(drive) = Drive::probe(&candidate)? {
                debug!(path = %drive.path.display(), board_id = %drive.board_id, "Found bootloader drive");
                drives.push(drive);
            }
        }
        Ok(drives)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::INFO_FILE;

    fn fixture_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("uf2-scanner-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_only_volumes_with_marker_are_drives() {
        let root = fixture_dir("marker");
        let boot = root.join("RPI-RP2");
        let stick = root.join("USBSTICK");
        std::fs::create_dir_all(&boot).unwrap();
        std::fs::create_dir_all(&stick).unwrap();
        std::fs::write(
            boot.join(INFO_FILE),
            "UF2 Bootloader v3.0\r\nModel: Raspberry Pi RP2\r\nBoard-ID: RPI-RP2\r\n",
        )
        .unwrap();
        std::fs::write(stick.join("notes.txt"), "hello").unwrap();

        let drives = VolumeScanner::with_roots([&root]).discover().unwrap();
        assert_eq!(drives.len(), 1);
        assert_eq!(drives[0].path, boot);
        assert_eq!(drives[0].board_id, "RPI-RP2");

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_marker_without_board_id_is_error() {
        let root = fixture_dir("noboard");
        let vol = root.join("VOL");
        std::fs::create_dir_all(&vol).unwrap();
        std::fs::write(vol.join(INFO_FILE), "UF2 Bootloader\n").unwrap();

        let err = VolumeScanner::with_roots([&root]).discover().unwrap_err();
        assert!(matches!(err, DriveError::MissingBoardId { .. }));

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_missing_root_is_ignored() {
        let scanner = VolumeScanner::with_roots(["/definitely/not/a/mount/root"]);
        assert!(scanner.discover().unwrap().is_empty());
    }

    #[test]
    fn test_rescan_sees_new_volume() {
        let root = fixture_dir("rescan");
        let scanner = VolumeScanner::with_roots([&root]);
        assert!(scanner.discover().unwrap().is_empty());

        let vol = root.join("FTHR840BOOT");
        std::fs::create_dir_all(&vol).unwrap();
        std::fs::write(vol.join(INFO_FILE), "Board-ID: nRF52840-Feather-revD\n").unwrap();
        assert_eq!(scanner.discover().unwrap().len(), 1);

        std::fs::remove_dir_all(&root).unwrap();
    }
}
