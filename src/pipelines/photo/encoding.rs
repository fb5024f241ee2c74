// SPDX-License-Identifier: GPL-3.0-only

//! Photo encoding and durable file output
//!
//! - JPEG encoding with a configurable quality
//! - EXIF orientation embedding for photos stored in sensor order
//! - Writes that are flushed to disk before the path is handed on

use super::orientation::Orientation;
use image::DynamicImage;
use std::fs::File;
use std::io::{Cursor, Write};
use std::path::Path;
use tracing::debug;

/// JPEG APP1 marker
const APP1_MARKER: [u8; 2] = [0xFF, 0xE1];

/// JPEG start-of-image marker
const SOI_MARKER: [u8; 2] = [0xFF, 0xD8];

/// Identifier that opens an EXIF APP1 payload
const EXIF_HEADER: &[u8; 6] = b"Exif\0\0";

/// Encoding quality settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingQuality {
    /// Low quality (high compression)
    Low,
    /// Medium quality (balanced)
    Medium,
    /// High quality (low compression)
    High,
    /// Maximum quality (minimal compression)
    Maximum,
    /// Explicit JPEG quality, clamped to 1..=100
    Custom(u8),
}

impl EncodingQuality {
    /// Get JPEG quality value (1-100)
    pub fn jpeg_quality(&self) -> u8 {
        match self {
            EncodingQuality::Low => 60,
            EncodingQuality::Medium => 80,
            EncodingQuality::High => 92,
            EncodingQuality::Maximum => 98,
            EncodingQuality::Custom(q) => (*q).clamp(1, 100),
        }
    }
}

impl Default for EncodingQuality {
    fn default() -> Self {
        EncodingQuality::High
    }
}

/// JPEG encoder for captured and cropped photos
#[derive(Debug, Clone, Copy, Default)]
pub struct PhotoEncoder {
    quality: EncodingQuality,
}

impl PhotoEncoder {
    pub fn new(quality: EncodingQuality) -> Self {
        Self { quality }
    }

    pub fn quality(&self) -> EncodingQuality {
        self.quality
    }

    /// Encode an image as baseline JPEG
    pub fn encode_jpeg(&self, image: &DynamicImage) -> Result<Vec<u8>, String> {
        let rgb = image.to_rgb8();
        let mut buffer = Vec::new();
        let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(
            &mut buffer,
            self.quality.jpeg_quality(),
        );

        encoder
            .encode(
                rgb.as_raw(),
                rgb.width(),
                rgb.height(),
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| format!("JPEG encoding failed: {}", e))?;

        debug!(
            width = rgb.width(),
            height = rgb.height(),
            size = buffer.len(),
            quality = self.quality.jpeg_quality(),
            "JPEG encoded"
        );
        Ok(buffer)
    }

    /// Encode a sensor-order buffer and tag it with the orientation needed to
    /// display it upright
    pub fn encode_sensor_jpeg(
        &self,
        image: &DynamicImage,
        orientation: Orientation,
    ) -> Result<Vec<u8>, String> {
        let jpeg = self.encode_jpeg(image)?;
        if orientation == Orientation::Normal {
            return Ok(jpeg);
        }
        embed_orientation(&jpeg, orientation)
    }
}

/// Build a TIFF structure holding only the orientation tag
fn orientation_tiff(orientation: Orientation) -> Result<Vec<u8>, String> {
    let field = exif::Field {
        tag: exif::Tag::Orientation,
        ifd_num: exif::In::PRIMARY,
        value: exif::Value::Short(vec![orientation.exif_value()]),
    };

    let mut writer = exif::experimental::Writer::new();
    writer.push_field(&field);

    let mut tiff = Cursor::new(Vec::new());
    writer
        .write(&mut tiff, false)
        .map_err(|e| format!("EXIF encoding failed: {}", e))?;
    Ok(tiff.into_inner())
}

/// Insert an EXIF APP1 segment carrying `orientation` right after SOI
///
/// Any image data after the SOI marker is kept byte for byte.
pub fn embed_orientation(jpeg: &[u8], orientation: Orientation) -> Result<Vec<u8>, String> {
    if jpeg.len() < 2 || jpeg[..2] != SOI_MARKER {
        return Err("Not a JPEG stream (missing SOI marker)".to_string());
    }

    let tiff = orientation_tiff(orientation)?;
    let segment_len = 2 + EXIF_HEADER.len() + tiff.len();
    let segment_len = u16::try_from(segment_len)
        .map_err(|_| format!("EXIF segment too large: {} bytes", segment_len))?;

    let mut out = Vec::with_capacity(jpeg.len() + usize::from(segment_len) + 2);
    out.extend_from_slice(&SOI_MARKER);
    out.extend_from_slice(&APP1_MARKER);
    out.extend_from_slice(&segment_len.to_be_bytes());
    out.extend_from_slice(EXIF_HEADER);
    out.extend_from_slice(&tiff);
    out.extend_from_slice(&jpeg[2..]);
    Ok(out)
}

/// Write `data` to `path` and flush it to stable storage
///
/// A reader opening `path` after this returns sees the complete file.
pub fn write_durably(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(data)?;
    file.sync_all()?;
    debug!(path = %path.display(), size = data.len(), "File written and synced");
    Ok(())
}
