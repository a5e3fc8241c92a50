//! Bootloader drive abstraction.
//!
//! Defines the `DriveLocator` trait for finding mounted UF2 bootloader
//! volumes, allowing different implementations (filesystem scan, mock).

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::protocol::{BOARD_ID_TAG, INFO_FILE, UPLOAD_FILE};

#[derive(Error, Debug)]
pub enum DriveError {
    #[error("No Board-ID line in {}", .path.display())]
    MissingBoardId { path: PathBuf },

    #[error("Failed to read {}: {source}", .path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", .path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not a UF2 bootloader volume (no {})", .path.display(), INFO_FILE)]
    NotBootloader { path: PathBuf },
}

/// A mounted bootloader volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drive {
    pub path: PathBuf,
    pub board_id: String,
}

impl fmt::Display for Drive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.path.display(), self.board_id)
    }
}

impl Drive {
    /// Inspect `path` as a volume root.
    ///
    /// Returns `Ok(None)` when it has no marker file.
    pub fn probe(path: &Path) -> Result<Option<Self>, DriveError> {
        let info_path = path.join(INFO_FILE);
        if !info_path.is_file() {
            return Ok(None);
        }
        let content = std::fs::read(&info_path).map_err(|source| DriveError::ReadFailed {
            path: info_path.clone(),
            source,
        })?;
        let board_id = parse_board_id(&String::from_utf8_lossy(&content))
            .ok_or(DriveError::MissingBoardId { path: info_path })?;

        Ok(Some(Self {
            path: path.to_path_buf(),
            board_id,
        }))
    }

    /// Like [`Drive::probe`], but a missing marker file is an error.
    pub fn open(path: &Path) -> Result<Self, DriveError> {
        Self::probe(path)?.ok_or_else(|| DriveError::NotBootloader {
            path: path.to_path_buf(),
        })
    }

    /// Where the image goes on this volume.
    pub fn upload_path(&self) -> PathBuf {
        self.path.join(UPLOAD_FILE)
    }

    /// Write the whole image as the volume's upload file.
    pub fn write_image(&self, data: &[u8]) -> Result<PathBuf, DriveError> {
        let path = self.upload_path();
        std::fs::write(&path, data).map_err(|source| DriveError::WriteFailed {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

/// Text after the first `Board-ID: ` up to the end of its line.
pub fn parse_board_id(info: &str) -> Option<String> {
    let start = info.find(BOARD_ID_TAG)? + BOARD_ID_TAG.len();
    let rest = &info[start..];
    let end = rest.find(['\r', '\n']).unwrap_or(rest.len());
    Some(rest[..end].to_string())
}

/// Source of bootloader drives.
///
/// Every call is a fresh scan; implementations must not cache.
pub trait DriveLocator: Send + Sync {
    fn discover(&self) -> Result<Vec<Drive>, DriveError>;
}
