// SPDX-License-Identifier: GPL-3.0-only

//! Meter Capture - capture-and-crop pipeline for utility meter photos
//!
//! A field reader frames the meter display inside an on-screen guide and
//! presses the shutter. The crate takes the full-resolution photo, turns it
//! upright according to its EXIF orientation, cuts out the region under the
//! guide and hands both file paths back to the caller.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`permission`]: Once-per-visit camera permission gate (xdg portal)
//! - [`backends`]: Camera backend abstraction (V4L2, file source)
//! - [`preview`]: Scoped preview session, format selection and guide overlay
//! - [`pipelines`]: Orientation normalization, crop geometry and JPEG output
//! - [`app`]: Capture controller state machine
//! - [`config`]: User configuration handling
//! - [`storage`]: Collision-free photo naming
//!
//! # Example
//!
//! ```no_run
//! use meter_capture::backends::camera::FileSourceBackend;
//! use meter_capture::permission::{PermissionGate, PortalPermission};
//! use meter_capture::{CaptureController, CaptureStorage, Config, CropPipeline, PreviewSession};
//! use std::sync::Arc;
//!
//! # async fn run() -> meter_capture::AppResult<()> {
//! let config = Config::load()?;
//! PermissionGate::new(PortalPermission::new()).ensure().await?;
//!
//! let backend = Box::new(FileSourceBackend::new("meter.jpg"));
//! let session = Arc::new(PreviewSession::open(backend, None, config.preview_config())?);
//! let controller = CaptureController::new(
//!     session,
//!     CropPipeline::new(config.crop_config()),
//!     CaptureStorage::new(config.capture_dir()),
//! );
//! let result = controller.capture("customer-0042").await?;
//! println!("{}", result.cropped_image_path.display());
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod permission;
pub mod pipelines;
pub mod preview;
pub mod storage;

// Re-export commonly used types
pub use app::{CaptureController, CaptureOutcome, CaptureResult, CaptureState, CaptureStatus};
pub use config::Config;
pub use errors::{AppError, AppResult};
pub use pipelines::photo::{CropPipeline, CropRect, CropStrategy, GuideRect, Orientation};
pub use preview::{PreviewConfig, PreviewSession};
pub use storage::{CapturePaths, CaptureStorage};
