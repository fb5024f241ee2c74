// SPDX-License-Identifier: GPL-3.0-only

//! Camera backend abstraction
//!
//! ```text
//! ┌─────────────────────┐
//! │   PreviewSession    │  ← open/close, 16:9 format, zoom, capture lock
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │  CameraBackend Trait│  ← Common interface
//! └──────────┬──────────┘
//!            │
//!       ┌────┴─────┐
//!       ▼          ▼
//!   ┌──────┐  ┌──────────┐
//!   │ V4L2 │  │File source│
//!   └──────┘  └──────────┘
//! ```

pub mod file_source;
pub mod types;
pub mod v4l2;

pub use file_source::FileSourceBackend;
pub use types::*;
pub use v4l2::V4l2Backend;

use crate::pipelines::photo::encoding::{self, PhotoEncoder};
use crate::pipelines::photo::geometry::digital_zoom_rect;
use crate::pipelines::photo::orientation::Orientation;
use image::DynamicImage;
use std::path::Path;
use tracing::{debug, info};

/// Camera backend trait
///
/// All camera backends provide:
/// - Device enumeration and format detection
/// - Lifecycle management (initialization, shutdown)
/// - A preview frame stream
/// - Full-resolution still capture to a file
pub trait CameraBackend: Send {
    // ===== Enumeration =====

    /// Enumerate available cameras on this backend
    fn enumerate_cameras(&self) -> Vec<CameraDevice>;

    /// Get supported formats for a specific camera device
    fn get_formats(&self, device: &CameraDevice) -> Vec<CameraFormat>;

    // ===== Lifecycle =====

    /// Start streaming from `device` in `format`
    ///
    /// Must be called before any capture or preview operations.
    fn initialize(&mut self, device: &CameraDevice, format: &CameraFormat) -> BackendResult<()>;

    /// Stop streaming and release the device
    ///
    /// Calling this on an uninitialized backend is a no-op.
    fn shutdown(&mut self) -> BackendResult<()>;

    /// Check if the backend is currently initialized and operational
    fn is_initialized(&self) -> bool;

    // ===== Preview =====

    /// Take the receiver for preview frames
    ///
    /// Each initialization creates one receiver; later calls return `None`.
    fn take_preview_receiver(&mut self) -> Option<FrameReceiver>;

    // ===== Capture =====

    /// Capture a full-resolution still and write it to `request.path`
    ///
    /// Blocks until the file is written and synced. The written JPEG keeps the
    /// sensor pixel order and carries the orientation tag needed to show it.
    fn capture_still(&self, request: &StillRequest) -> BackendResult<CapturedImage>;

    // ===== Metadata =====

    /// Get the backend type identifier
    fn backend_type(&self) -> CameraBackendType;

    /// Get the currently active camera device (if initialized)
    fn current_device(&self) -> Option<&CameraDevice>;

    /// Get the currently active format (if initialized)
    fn current_format(&self) -> Option<&CameraFormat>;
}

/// Create a backend instance
///
/// The file backend needs `source`, the image served as camera output.
pub fn get_backend_for_type(
    backend_type: CameraBackendType,
    source: Option<&Path>,
) -> BackendResult<Box<dyn CameraBackend>> {
    match backend_type {
        CameraBackendType::V4l2 => Ok(Box::new(V4l2Backend::new())),
        CameraBackendType::File => {
            let source = source.ok_or_else(|| {
                BackendError::NotAvailable("file backend needs a source image".to_string())
            })?;
            Ok(Box::new(FileSourceBackend::new(source)))
        }
    }
}

/// Apply digital zoom to a sensor-order frame and write it as the still photo
pub(crate) fn write_still(
    sensor_image: &DynamicImage,
    orientation: Orientation,
    request: &StillRequest,
) -> BackendResult<CapturedImage> {
    let zoom = digital_zoom_rect(sensor_image.width(), sensor_image.height(), request.zoom)
        .map_err(|e| BackendError::Other(e.to_string()))?;

    let zoomed = if zoom.width == sensor_image.width() && zoom.height == sensor_image.height() {
        sensor_image.clone()
    } else {
        sensor_image.crop_imm(zoom.left, zoom.top, zoom.width, zoom.height)
    };

    debug!(
        sensor_width = sensor_image.width(),
        sensor_height = sensor_image.height(),
        zoom = request.zoom,
        %zoom,
        "Digital zoom applied to still"
    );

    let jpeg = PhotoEncoder::new(request.quality)
        .encode_sensor_jpeg(&zoomed, orientation)
        .map_err(BackendError::Other)?;
    encoding::write_durably(&request.path, &jpeg)?;

    info!(
        path = %request.path.display(),
        width = zoomed.width(),
        height = zoomed.height(),
        %orientation,
        "Full-resolution photo written"
    );

    Ok(CapturedImage {
        file_path: request.path.clone(),
        pixel_width: zoomed.width(),
        pixel_height: zoomed.height(),
        orientation,
    })
}
