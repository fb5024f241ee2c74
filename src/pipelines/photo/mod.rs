// SPDX-License-Identifier: GPL-3.0-only

//! Meter photo pipeline
//!
//! Turns a durably written full-resolution photo into the cropped meter
//! close-up:
//!
//! ```text
//! full photo on disk → decode + orientation → guide crop → JPEG → crop file
//! ```
//!
//! All stages are CPU or file bound and run on the blocking pool so the
//! preview keeps streaming.

pub mod encoding;
pub mod geometry;
pub mod orientation;

pub use encoding::{EncodingQuality, PhotoEncoder};
pub use geometry::{CropRect, CropStrategy, GuideRect};
pub use orientation::Orientation;

use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// What the crop stage produced
#[derive(Debug, Clone, PartialEq)]
pub struct CroppedPhoto {
    pub path: PathBuf,
    /// Upright size of the source photo
    pub source_width: u32,
    pub source_height: u32,
    /// Region taken from the upright source
    pub rect: CropRect,
}

/// Guide crop configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropConfig {
    pub guide: GuideRect,
    pub strategy: CropStrategy,
    pub quality: EncodingQuality,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            guide: GuideRect::METER_DEFAULT,
            strategy: CropStrategy::default(),
            quality: EncodingQuality::High,
        }
    }
}

/// Decode → normalise → crop → encode → save
#[derive(Debug, Clone, Copy)]
pub struct CropPipeline {
    config: CropConfig,
    encoder: PhotoEncoder,
}

impl CropPipeline {
    pub fn new(config: CropConfig) -> Self {
        Self {
            config,
            encoder: PhotoEncoder::new(config.quality),
        }
    }

    pub fn config(&self) -> &CropConfig {
        &self.config
    }

    /// Run the crop synchronously
    ///
    /// # Arguments
    /// * `full_path` - Durably written full-resolution photo
    /// * `crop_path` - Where the cropped JPEG is written
    pub fn crop_file(&self, full_path: &Path, crop_path: &Path) -> Result<CroppedPhoto, String> {
        let upright = orientation::normalize(full_path)?;
        let (width, height) = (upright.width(), upright.height());

        let rect = self
            .config
            .strategy
            .crop_rect(width, height, &self.config.guide)
            .ok_or_else(|| format!("Degenerate image {}x{}, nothing to crop", width, height))?;

        debug!(
            width,
            height,
            %rect,
            strategy = %self.config.strategy,
            "Cropping to guide"
        );

        let cropped = upright.crop_imm(rect.left, rect.top, rect.width, rect.height);
        let jpeg = self.encoder.encode_jpeg(&cropped)?;
        encoding::write_durably(crop_path, &jpeg)
            .map_err(|e| format!("Failed to write {}: {}", crop_path.display(), e))?;

        info!(path = %crop_path.display(), %rect, "Cropped photo saved");

        Ok(CroppedPhoto {
            path: crop_path.to_path_buf(),
            source_width: width,
            source_height: height,
            rect,
        })
    }

    /// Run the crop on the blocking pool
    pub async fn crop(&self, full_path: PathBuf, crop_path: PathBuf) -> Result<CroppedPhoto, String> {
        let pipeline = *self;
        tokio::task::spawn_blocking(move || pipeline.crop_file(&full_path, &crop_path))
            .await
            .map_err(|e| format!("Crop task error: {}", e))?
    }
}

impl Default for CropPipeline {
    fn default() -> Self {
        Self::new(CropConfig::default())
    }
}
