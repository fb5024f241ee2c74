// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the capture-and-crop pipeline
//!
//! Every failure a caller can observe maps onto one of four conditions:
//! permission denied, camera binding failed, capture failed, or the
//! decode/crop stage failed after the full photo was already written.

use crate::backends::camera::types::BackendError;
use crate::pipelines::photo::geometry::GeometryError;
use std::fmt;
use std::path::PathBuf;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// Camera access was not granted by the host platform
    PermissionDenied,
    /// The camera could not be attached to the preview session
    BindingFailed(String),
    /// Hardware shutter or full-image write failed
    CaptureFailed(String),
    /// The full image was written but decoding or cropping it failed.
    ///
    /// The full image stays on disk so the caller can fall back to it.
    DecodeOrCropFailed {
        full_image_path: PathBuf,
        reason: String,
    },
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors outside of a capture
    Storage(String),
    /// Generic error with message
    Other(String),
}

impl AppError {
    /// Path of a full photo that survived a failed capture, if any
    pub fn retained_full_image(&self) -> Option<&PathBuf> {
        match self {
            AppError::DecodeOrCropFailed {
                full_image_path, ..
            } => Some(full_image_path),
            _ => None,
        }
    }

    /// Whether the screen can keep capturing after this error
    ///
    /// Permission and binding failures block the current screen until it is
    /// re-entered; everything else can be retried with the shutter.
    pub fn is_fatal_to_screen(&self) -> bool {
        matches!(self, AppError::PermissionDenied | AppError::BindingFailed(_))
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::PermissionDenied => write!(f, "Camera permission denied"),
            AppError::BindingFailed(msg) => write!(f, "Camera binding failed: {}", msg),
            AppError::CaptureFailed(msg) => write!(f, "Capture failed: {}", msg),
            AppError::DecodeOrCropFailed {
                full_image_path,
                reason,
            } => write!(
                f,
                "Decode or crop failed ({}), full image kept at {}",
                reason,
                full_image_path.display()
            ),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<GeometryError> for AppError {
    fn from(err: GeometryError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        AppError::CaptureFailed(err.to_string())
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}
