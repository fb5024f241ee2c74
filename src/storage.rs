// SPDX-License-Identifier: GPL-3.0-only

//! Storage utilities for meter photos
//!
//! Each capture gets a pair of names sharing one stem:
//! `meter_<YYYYmmdd_HHMMSS_mmm>_<seq>_full.jpg` and `..._crop.jpg`.
//! The sequence counter is per storage instance and an existing name is
//! never reused, so rapid captures within one millisecond cannot overwrite
//! a result the caller has not consumed yet.

use crate::constants::capture;
use crate::errors::{AppError, AppResult};
use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Reserved output paths for one capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturePaths {
    pub full: PathBuf,
    pub crop: PathBuf,
}

/// Photo directory with collision-free naming
#[derive(Debug)]
pub struct CaptureStorage {
    dir: PathBuf,
    sequence: AtomicU64,
}

impl CaptureStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            sequence: AtomicU64::new(0),
        }
    }

    /// App-private picture directory, `<data_dir>/meter-capture/app_images`
    pub fn default_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(capture::APP_DIR_NAME)
            .join(capture::CAPTURE_DIR_NAME)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the directory if needed
    pub fn ensure_dir(&self) -> AppResult<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            AppError::Storage(format!("Cannot create {}: {}", self.dir.display(), e))
        })?;
        debug!(dir = %self.dir.display(), "Capture directory ready");
        Ok(())
    }

    /// Reserve names for the next capture
    ///
    /// Neither file is created here; the names are free at the time of the call.
    pub fn next_capture_paths(&self) -> CapturePaths {
        let timestamp = Local::now().format(capture::TIMESTAMP_FORMAT).to_string();
        self.reserve(&timestamp)
    }

    fn reserve(&self, timestamp: &str) -> CapturePaths {
        loop {
            let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
            let paths = self.paths_for(timestamp, seq);
            if !paths.full.exists() && !paths.crop.exists() {
                info!(
                    full = %paths.full.display(),
                    crop = %paths.crop.display(),
                    "Reserved capture file names"
                );
                return paths;
            }
            debug!(seq, "Capture name taken, trying next sequence");
        }
    }

    fn paths_for(&self, timestamp: &str, seq: u64) -> CapturePaths {
        let stem = format!("{}_{}_{}", capture::FILE_PREFIX, timestamp, seq);
        CapturePaths {
            full: self
                .dir
                .join(format!("{}_{}.jpg", stem, capture::FULL_SUFFIX)),
            crop: self
                .dir
                .join(format!("{}_{}.jpg", stem, capture::CROP_SUFFIX)),
        }
    }
}

impl Default for CaptureStorage {
    fn default() -> Self {
        Self::new(Self::default_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_are_unique_and_paired() {
        let dir = tempfile::tempdir().unwrap();
        let storage = CaptureStorage::new(dir.path());

        let mut seen = HashSet::new();
        for _ in 0..50 {
            let paths = storage.next_capture_paths();
            let full = paths.full.file_name().unwrap().to_string_lossy().to_string();
            let crop = paths.crop.file_name().unwrap().to_string_lossy().to_string();
            assert!(full.starts_with("meter_") && full.ends_with("_full.jpg"));
            assert_eq!(
                full.trim_end_matches("_full.jpg"),
                crop.trim_end_matches("_crop.jpg")
            );
            assert!(seen.insert(full));
        }
    }

    #[test]
    fn test_existing_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let storage = CaptureStorage::new(dir.path());
        let timestamp = "20240101_000000_000";

        let taken = storage.paths_for(timestamp, 0);
        std::fs::write(&taken.full, b"not consumed yet").unwrap();

        let next = storage.reserve(timestamp);
        assert_eq!(next, storage.paths_for(timestamp, 1));
        assert_eq!(std::fs::read(&taken.full).unwrap(), b"not consumed yet");
    }

    #[test]
    fn test_ensure_dir_creates_nested() {
        let dir = tempfile::tempdir().unwrap();
        let storage = CaptureStorage::new(dir.path().join("a").join("app_images"));
        storage.ensure_dir().unwrap();
        assert!(storage.dir().is_dir());
    }
}
