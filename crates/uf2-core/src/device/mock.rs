//! Mock drive locator for testing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::traits::{Drive, DriveError, DriveLocator};

/// Scripted locator for exercising the flash logic without real volumes.
///
/// Each `discover` call pops the next queued scan result. Once the queue is
/// drained, the last result keeps being returned.
pub struct MockLocator {
    scans: Arc<Mutex<VecDeque<Vec<Drive>>>>,
    last: Arc<Mutex<Vec<Drive>>>,
    calls: Arc<Mutex<usize>>,
}

impl MockLocator {
    pub fn new() -> Self {
        Self {
            scans: Arc::new(Mutex::new(VecDeque::new())),
            last: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    /// Locator that always reports `drives`.
    pub fn with_drives(drives: Vec<Drive>) -> Self {
        let mock = Self::new();
        *mock.last.lock().unwrap() = drives;
        mock
    }

    /// Queue the result of one scan.
    pub fn queue_scan(&self, drives: Vec<Drive>) {
        self.scans.lock().unwrap().push_back(drives);
    }

    /// Number of scans performed.
    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl Default for MockLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl DriveLocator for MockLocator {
    fn discover(&self) -> Result<Vec<Drive>, DriveError> {
        *self.calls.lock().unwrap() += 1;
        let mut last = self.last.lock().unwrap();
        if let Some(scan) = self.scans.lock().unwrap().pop_front() {
            *last = scan;
        }
        Ok(last.clone())
    }
}
