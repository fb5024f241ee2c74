// SPDX-License-Identifier: GPL-3.0-only

//! Capture screen logic
//!
//! The controller owns the capture state machine; any rendering layer
//! observes its status instead of holding state of its own.

pub mod controller;
pub mod state;

pub use controller::CaptureController;
pub use state::{CaptureOutcome, CaptureResult, CaptureState, CaptureStatus};
