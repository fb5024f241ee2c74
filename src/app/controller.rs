// SPDX-License-Identifier: GPL-3.0-only

//! Capture controller
//!
//! Drives one shutter press through the whole pipeline:
//!
//! ```text
//! Idle ──trigger──▶ Capturing ──▶ still → sync → normalise → crop → save
//!  ▲                                                  │
//!  └──────────── Success(paths) | Failed(error) ◀─────┘
//! ```
//!
//! The hardware capture and the crop run on the blocking pool. Status is
//! published through a `watch` channel; the outcome and the return to
//! `Idle` are one update.

use super::state::{CaptureOutcome, CaptureResult, CaptureState, CaptureStatus};
use crate::errors::{AppError, AppResult};
use crate::pipelines::photo::CropPipeline;
use crate::preview::PreviewSession;
use crate::storage::CaptureStorage;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub struct CaptureController {
    session: Arc<PreviewSession>,
    pipeline: CropPipeline,
    storage: Arc<CaptureStorage>,
    status: Arc<watch::Sender<CaptureStatus>>,
}

impl CaptureController {
    pub fn new(session: Arc<PreviewSession>, pipeline: CropPipeline, storage: CaptureStorage) -> Self {
        let (status, _) = watch::channel(CaptureStatus::default());
        Self {
            session,
            pipeline,
            storage: Arc::new(storage),
            status: Arc::new(status),
        }
    }

    /// Observe status changes
    pub fn subscribe(&self) -> watch::Receiver<CaptureStatus> {
        self.status.subscribe()
    }

    /// Current status snapshot
    pub fn status(&self) -> CaptureStatus {
        self.status.borrow().clone()
    }

    /// Press the shutter
    ///
    /// Returns `None` without side effects while a capture is in flight.
    /// Otherwise the state becomes `Capturing` before this returns and the
    /// capture runs to completion on the runtime; it cannot be cancelled.
    /// Must be called from within a tokio runtime.
    pub fn trigger(
        &self,
        customer_id: impl Into<String>,
    ) -> Option<JoinHandle<AppResult<CaptureResult>>> {
        let Some(guard) = self.session.try_begin_capture() else {
            info!("Capture already in flight, trigger ignored");
            return None;
        };

        let customer_id = customer_id.into();
        self.status.send_modify(|status| {
            status.state = CaptureState::Capturing;
            status.customer_id = Some(customer_id.clone());
        });
        info!(customer_id = %customer_id, "Capture started");

        let session = Arc::clone(&self.session);
        let storage = Arc::clone(&self.storage);
        let status = Arc::clone(&self.status);
        let pipeline = self.pipeline;

        Some(tokio::spawn(async move {
            let result = run_capture(session, pipeline, storage, customer_id).await;

            match &result {
                Ok(done) => info!(
                    full = %done.full_image_path.display(),
                    crop = %done.cropped_image_path.display(),
                    "Capture succeeded"
                ),
                Err(e) => error!(
                    error = %e,
                    retained_full_image = ?e.retained_full_image(),
                    "Capture failed"
                ),
            }

            // Release the lock inside the update so a new trigger cannot
            // publish `Capturing` before this `Idle` lands.
            status.send_modify(|status| {
                drop(guard);
                status.state = CaptureState::Idle;
                status.customer_id = None;
                status.last_outcome = Some(CaptureOutcome::from(&result));
                status.completed += 1;
            });

            result
        }))
    }

    /// Trigger and wait for the result
    pub async fn capture(&self, customer_id: impl Into<String>) -> AppResult<CaptureResult> {
        let Some(handle) = self.trigger(customer_id) else {
            let err = AppError::Other("A capture is already in progress".to_string());
            error!(error = %err, "Capture rejected");
            return Err(err);
        };
        handle.await.map_err(|e| {
            let err = AppError::Other(format!("Capture task error: {}", e));
            error!(error = %err, "Capture task did not finish");
            err
        })?
    }
}

async fn run_capture(
    session: Arc<PreviewSession>,
    pipeline: CropPipeline,
    storage: Arc<CaptureStorage>,
    customer_id: String,
) -> AppResult<CaptureResult> {
    storage
        .ensure_dir()
        .map_err(|e| AppError::CaptureFailed(e.to_string()))?;
    let paths = storage.next_capture_paths();

    let full_path = paths.full.clone();
    let captured = tokio::task::spawn_blocking(move || session.capture_still(&full_path))
        .await
        .map_err(|e| AppError::CaptureFailed(format!("Capture task error: {}", e)))??;

    let cropped = pipeline
        .crop(captured.file_path.clone(), paths.crop)
        .await
        .map_err(|reason| AppError::DecodeOrCropFailed {
            full_image_path: captured.file_path.clone(),
            reason,
        })?;

    Ok(CaptureResult {
        customer_id,
        full_image_path: captured.file_path,
        cropped_image_path: cropped.path,
    })
}
