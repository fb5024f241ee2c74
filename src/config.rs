// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::camera::CameraBackendType;
use crate::constants::{AspectRatio, capture};
use crate::errors::{AppError, AppResult};
use crate::pipelines::photo::{CropConfig, CropStrategy, EncodingQuality, GuideRect};
use crate::preview::PreviewConfig;
use crate::storage::CaptureStorage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera backend to use (V4L2 or a file source)
    pub backend: CameraBackendType,
    /// Last used camera device path
    pub last_device_path: Option<String>,
    /// Photo directory override (default: app data dir)
    pub capture_dir: Option<PathBuf>,
    /// JPEG quality for full and cropped photos, clamped to 1-100 on load
    #[serde(deserialize_with = "deserialize_quality")]
    pub jpeg_quality: u8,
    /// On-screen guide, as fractions of the upright preview
    pub guide: GuideRect,
    /// How the guide maps onto the photo
    pub crop_strategy: CropStrategy,
    /// Preview aspect ratio
    pub aspect_ratio: AspectRatio,
    /// Digital zoom applied when the preview is bound
    pub zoom: f32,
    /// Image served by the file backend
    pub source_image: Option<PathBuf>,
}

/// Accept any integer quality and clamp it into the JPEG range
fn deserialize_quality<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = i64::deserialize(deserializer)?;
    Ok(value.clamp(1, 100) as u8)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: CameraBackendType::default(),
            last_device_path: None,
            capture_dir: None,
            jpeg_quality: capture::DEFAULT_JPEG_QUALITY,
            guide: GuideRect::METER_DEFAULT,
            crop_strategy: CropStrategy::default(),
            aspect_ratio: AspectRatio::WIDESCREEN,
            zoom: capture::DEFAULT_ZOOM,
            source_image: None,
        }
    }
}

impl Config {
    /// `<config_dir>/meter-capture/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| {
            dir.join(capture::APP_DIR_NAME)
                .join(capture::CONFIG_FILE_NAME)
        })
    }

    /// Load from the default location, falling back to defaults
    pub fn load() -> AppResult<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => {
                debug!("No config directory, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load from `path`; a missing file yields defaults
    pub fn load_from(path: &Path) -> AppResult<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Config file missing, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(AppError::Config(format!(
                    "Cannot read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Save to the default location
    pub fn save(&self) -> AppResult<()> {
        let path = Self::default_path()
            .ok_or_else(|| AppError::Config("No config directory".to_string()))?;
        self.save_to(&path)
    }

    /// Save as pretty JSON, creating the parent directory
    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        debug!(path = %path.display(), "Saved config");
        Ok(())
    }

    /// Check values that cannot be clamped
    pub fn validate(&self) -> AppResult<()> {
        self.guide.validate()?;
        if !self.zoom.is_finite() || self.zoom < 1.0 {
            return Err(AppError::Config(format!(
                "Zoom must be at least 1.0, got {}",
                self.zoom
            )));
        }
        Ok(())
    }

    pub fn quality(&self) -> EncodingQuality {
        EncodingQuality::Custom(self.jpeg_quality)
    }

    pub fn crop_config(&self) -> CropConfig {
        CropConfig {
            guide: self.guide,
            strategy: self.crop_strategy,
            quality: self.quality(),
        }
    }

    pub fn preview_config(&self) -> PreviewConfig {
        PreviewConfig {
            aspect_ratio: self.aspect_ratio,
            zoom: self.zoom,
            quality: self.quality(),
        }
    }

    /// Photo directory: the override or the app-private default
    pub fn capture_dir(&self) -> PathBuf {
        self.capture_dir
            .clone()
            .unwrap_or_else(CaptureStorage::default_dir)
    }
}
