// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use crate::pipelines::photo::encoding::EncodingQuality;
use crate::pipelines::photo::orientation::Orientation;
use image::{DynamicImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Camera backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CameraBackendType {
    /// Video4Linux2 capture devices
    #[default]
    V4l2,
    /// A still image file served as a camera
    File,
}

impl std::fmt::Display for CameraBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraBackendType::V4l2 => write!(f, "V4L2"),
            CameraBackendType::File => write!(f, "file"),
        }
    }
}

/// Sensor rotation in degrees (clockwise)
///
/// Sensors on handheld devices are often mounted at 90° or 270° relative to
/// the display. Photos from such a sensor are written in sensor order and
/// tagged with the orientation that displays them upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensorRotation {
    /// No rotation (sensor is oriented correctly)
    #[default]
    None,
    /// 90 degrees clockwise
    Rotate90,
    /// 180 degrees (upside down)
    Rotate180,
    /// 270 degrees clockwise (90 degrees counter-clockwise)
    Rotate270,
}

impl SensorRotation {
    /// Create rotation from an integer degree value (normalised to 0-360).
    pub fn from_degrees_int(degrees: i32) -> Self {
        match degrees.rem_euclid(360) {
            90 => SensorRotation::Rotate90,
            180 => SensorRotation::Rotate180,
            270 => SensorRotation::Rotate270,
            _ => SensorRotation::None,
        }
    }

    /// Get the rotation in degrees
    pub fn degrees(&self) -> u32 {
        match self {
            SensorRotation::None => 0,
            SensorRotation::Rotate90 => 90,
            SensorRotation::Rotate180 => 180,
            SensorRotation::Rotate270 => 270,
        }
    }

    /// Orientation tag recorded for frames from this sensor
    pub fn orientation(&self) -> Orientation {
        Orientation::from_rotation_degrees(self.degrees())
    }
}

impl std::fmt::Display for SensorRotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Represents a camera device
#[derive(Debug, Clone, PartialEq)]
pub struct CameraDevice {
    pub name: String,
    /// Device node or source file
    pub path: String,
    /// Driver name, when the backend knows it
    pub driver: Option<String>,
    /// Sensor mounting rotation
    pub rotation: SensorRotation,
}

/// Camera format specification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraFormat {
    pub width: u32,
    pub height: u32,
    pub framerate: Option<u32>,
    /// FourCC code (e.g., "MJPG", "YUYV") or "RGBA" for decoded sources
    pub pixel_format: String,
}

impl CameraFormat {
    /// Long side over short side, so sensor and display orientation compare equal
    pub fn aspect_ratio(&self) -> f64 {
        let long = self.width.max(self.height).max(1);
        let short = self.width.min(self.height).max(1);
        f64::from(long) / f64::from(short)
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

impl std::fmt::Display for CameraFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(fps) = &self.framerate {
            write!(
                f,
                "{}x{} {} @ {}fps",
                self.width, self.height, self.pixel_format, fps
            )
        } else {
            write!(f, "{}x{} {}", self.width, self.height, self.pixel_format)
        }
    }
}

/// Pixel format for camera frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// RGBA - 32-bit with alpha (4 bytes per pixel)
    RGBA,
    /// Motion JPEG - each frame is a complete JPEG image
    MJPEG,
}

/// A single frame from the preview stream, in sensor order
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    /// RGBA pixels or a compressed JPEG
    pub data: Arc<[u8]>,
    pub format: PixelFormat,
    /// How to display this frame upright
    pub orientation: Orientation,
    /// Frame sequence number
    pub sequence: u64,
    /// Timestamp when frame was captured
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Decode the frame into an RGBA buffer, still in sensor order
    pub fn decode(&self) -> BackendResult<DynamicImage> {
        match self.format {
            PixelFormat::RGBA => {
                let expected = self.width as usize * self.height as usize * 4;
                if self.data.len() < expected {
                    return Err(BackendError::Other(format!(
                        "RGBA frame too small: expected {}, got {}",
                        expected,
                        self.data.len()
                    )));
                }
                RgbaImage::from_raw(self.width, self.height, self.data[..expected].to_vec())
                    .map(DynamicImage::ImageRgba8)
                    .ok_or_else(|| BackendError::Other("Invalid RGBA frame".to_string()))
            }
            PixelFormat::MJPEG => {
                image::load_from_memory_with_format(&self.data, image::ImageFormat::Jpeg)
                    .map_err(|e| BackendError::Other(format!("MJPEG decode failed: {}", e)))
            }
        }
    }
}

/// Frame sender type
pub type FrameSender = futures::channel::mpsc::Sender<CameraFrame>;

/// Frame receiver type
pub type FrameReceiver = futures::channel::mpsc::Receiver<CameraFrame>;

/// Parameters for one still capture
#[derive(Debug, Clone, PartialEq)]
pub struct StillRequest {
    /// Where the full-resolution JPEG goes
    pub path: PathBuf,
    /// Digital zoom factor (1.0 = none)
    pub zoom: f32,
    pub quality: EncodingQuality,
}

/// A full-resolution photo written by a backend
///
/// Dimensions describe the stored buffer; `orientation` says how to show it.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedImage {
    pub file_path: PathBuf,
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub orientation: Orientation,
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Backend errors
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Backend is not available on this system
    NotAvailable(String),
    /// Failed to initialize backend
    InitializationFailed(String),
    /// Camera device not found
    DeviceNotFound(String),
    /// Format not supported
    FormatNotSupported(String),
    /// Operation needs an initialized backend
    NotInitialized,
    /// Camera is busy (e.g. another capture holds it)
    Busy,
    /// No frame arrived in time
    Timeout(String),
    /// General I/O error
    IoError(String),
    /// Other errors
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NotAvailable(msg) => write!(f, "Backend not available: {}", msg),
            BackendError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::FormatNotSupported(msg) => write!(f, "Format not supported: {}", msg),
            BackendError::NotInitialized => write!(f, "Backend not initialized"),
            BackendError::Busy => write!(f, "Camera is busy"),
            BackendError::Timeout(msg) => write!(f, "Timed out: {}", msg),
            BackendError::IoError(msg) => write!(f, "I/O error: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::IoError(err.to_string())
    }
}
