// SPDX-License-Identifier: GPL-3.0-only

//! Capture controller state types

use crate::errors::AppError;
use serde::Serialize;
use std::path::PathBuf;

/// Whether the shutter is available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum CaptureState {
    /// Ready for a shutter press
    #[default]
    Idle,
    /// A capture is in flight; new triggers are ignored
    Capturing,
}

/// Paths handed to the detail screen after a successful capture
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureResult {
    /// Opaque identifier supplied by the caller
    pub customer_id: String,
    pub full_image_path: PathBuf,
    pub cropped_image_path: PathBuf,
}

/// How the last capture ended
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    Success(CaptureResult),
    Failed(AppError),
}

impl From<&Result<CaptureResult, AppError>> for CaptureOutcome {
    fn from(result: &Result<CaptureResult, AppError>) -> Self {
        match result {
            Ok(result) => CaptureOutcome::Success(result.clone()),
            Err(e) => CaptureOutcome::Failed(e.clone()),
        }
    }
}

/// Snapshot published to observers after every transition
///
/// The outcome of a capture and the return to `Idle` arrive in the same
/// snapshot, so observers never see a half-finished result.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CaptureStatus {
    pub state: CaptureState,
    /// Customer of the capture in flight
    pub customer_id: Option<String>,
    pub last_outcome: Option<CaptureOutcome>,
    /// Captures finished since the controller was created
    pub completed: u64,
}

impl CaptureStatus {
    pub fn is_capturing(&self) -> bool {
        self.state == CaptureState::Capturing
    }

    /// The last successful result, if the last capture succeeded
    pub fn last_result(&self) -> Option<&CaptureResult> {
        match &self.last_outcome {
            Some(CaptureOutcome::Success(result)) => Some(result),
            _ => None,
        }
    }

    /// The last error, if the last capture failed
    pub fn last_error(&self) -> Option<&AppError> {
        match &self.last_outcome {
            Some(CaptureOutcome::Failed(e)) => Some(e),
            _ => None,
        }
    }
}
