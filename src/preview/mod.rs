// SPDX-License-Identifier: GPL-3.0-only

//! Preview session
//!
//! A session is the scoped binding of one camera to one screen visit:
//! [`PreviewSession::open`] picks the format closest to the target aspect
//! ratio and starts streaming, [`PreviewSession::close`] (or dropping the
//! session) releases the device on every exit path. The session also holds
//! the capture lock that keeps at most one still capture in flight.

pub mod overlay;

use crate::backends::camera::{CameraBackend, CameraDevice, CameraFormat, CameraFrame};
use crate::backends::camera::{CapturedImage, FrameReceiver, StillRequest};
use crate::constants::{AspectRatio, capture, timing};
use crate::errors::{AppError, AppResult};
use crate::pipelines::photo::EncodingQuality;
use crate::pipelines::photo::geometry::digital_zoom_rect;
use futures::StreamExt;
use image::RgbaImage;
use std::cmp::Ordering as CmpOrdering;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Settings applied when the camera is bound
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewConfig {
    pub aspect_ratio: AspectRatio,
    /// Digital zoom, at least 1.0
    pub zoom: f32,
    /// JPEG quality of the full-resolution photo
    pub quality: EncodingQuality,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            aspect_ratio: AspectRatio::WIDESCREEN,
            zoom: capture::DEFAULT_ZOOM,
            quality: EncodingQuality::Custom(capture::DEFAULT_JPEG_QUALITY),
        }
    }
}

/// An upright, zoomed preview frame ready for display
#[derive(Debug, Clone)]
pub struct PreviewFrame {
    pub image: RgbaImage,
    pub sequence: u64,
    pub captured_at: Instant,
}

/// Pick the format whose aspect ratio is closest to `target`
///
/// Ties go to the larger area, then the higher framerate.
pub fn select_format(formats: &[CameraFormat], target: AspectRatio) -> Option<CameraFormat> {
    let target = target.ratio();
    formats
        .iter()
        .min_by(|a, b| {
            let da = (a.aspect_ratio() - target).abs();
            let db = (b.aspect_ratio() - target).abs();
            let by_ratio = if (da - db).abs() < 1e-6 {
                CmpOrdering::Equal
            } else {
                da.total_cmp(&db)
            };
            by_ratio
                .then_with(|| b.area().cmp(&a.area()))
                .then_with(|| b.framerate.unwrap_or(0).cmp(&a.framerate.unwrap_or(0)))
        })
        .cloned()
}

/// Decode a sensor frame, turn it upright and apply digital zoom
pub fn render_frame(frame: &CameraFrame, zoom: f32) -> AppResult<RgbaImage> {
    let sensor = frame
        .decode()
        .map_err(|e| AppError::Other(format!("Preview frame unusable: {}", e)))?;
    let upright = frame.orientation.apply(sensor);
    let rect = digital_zoom_rect(upright.width(), upright.height(), zoom)?;
    Ok(upright
        .crop_imm(rect.left, rect.top, rect.width, rect.height)
        .to_rgba8())
}

/// Held while a still capture is in flight; dropping it releases the lock
#[derive(Debug)]
pub struct CaptureGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// A camera bound to the preview for one screen visit
pub struct PreviewSession {
    backend: Mutex<Box<dyn CameraBackend>>,
    frames: tokio::sync::Mutex<Option<FrameReceiver>>,
    device: CameraDevice,
    format: CameraFormat,
    config: PreviewConfig,
    capturing: Arc<AtomicBool>,
    closed: AtomicBool,
    opened_at: Instant,
}

impl PreviewSession {
    /// Bind `device` (or the first camera the backend finds)
    ///
    /// Every failure to attach the camera is reported as `BindingFailed`.
    pub fn open(
        mut backend: Box<dyn CameraBackend>,
        device: Option<CameraDevice>,
        config: PreviewConfig,
    ) -> AppResult<Self> {
        digital_zoom_rect(1, 1, config.zoom)?;

        let device = match device {
            Some(device) => device,
            None => backend
                .enumerate_cameras()
                .into_iter()
                .next()
                .ok_or_else(|| AppError::BindingFailed("No camera found".to_string()))?,
        };

        let formats = backend.get_formats(&device);
        let format = select_format(&formats, config.aspect_ratio).ok_or_else(|| {
            AppError::BindingFailed(format!("{} offers no usable format", device.name))
        })?;

        backend
            .initialize(&device, &format)
            .map_err(|e| AppError::BindingFailed(e.to_string()))?;
        let frames = backend.take_preview_receiver();

        info!(
            backend = %backend.backend_type(),
            device = %device.name,
            %format,
            aspect = %config.aspect_ratio,
            zoom = config.zoom,
            "Preview session opened"
        );

        Ok(Self {
            backend: Mutex::new(backend),
            frames: tokio::sync::Mutex::new(frames),
            device,
            format,
            config,
            capturing: Arc::new(AtomicBool::new(false)),
            closed: AtomicBool::new(false),
            opened_at: Instant::now(),
        })
    }

    pub fn device(&self) -> &CameraDevice {
        &self.device
    }

    pub fn format(&self) -> &CameraFormat {
        &self.format
    }

    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    /// Release the camera; later calls do nothing
    ///
    /// Waits for an in-flight still capture to finish first.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut backend = match self.backend.lock() {
            Ok(backend) => backend,
            Err(poisoned) => poisoned.into_inner(),
        };
        match backend.shutdown() {
            Ok(()) => info!(device = %self.device.name, "Preview session closed"),
            Err(e) => warn!(error = %e, "Camera shutdown reported an error"),
        }
    }

    /// Take the capture lock, or `None` while another capture is in flight
    pub fn try_begin_capture(&self) -> Option<CaptureGuard> {
        self.capturing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| CaptureGuard {
                flag: Arc::clone(&self.capturing),
            })
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    /// Take a full-resolution photo into `path`
    ///
    /// Blocks until the file is written and synced; run it off the
    /// interactive thread.
    pub fn capture_still(&self, path: &Path) -> AppResult<CapturedImage> {
        if !self.is_open() {
            return Err(AppError::CaptureFailed("Preview session is closed".to_string()));
        }
        let backend = self
            .backend
            .lock()
            .map_err(|_| AppError::CaptureFailed("Camera lock poisoned".to_string()))?;

        let request = StillRequest {
            path: path.to_path_buf(),
            zoom: self.config.zoom,
            quality: self.config.quality,
        };
        debug!(path = %path.display(), "Capturing still");
        backend
            .capture_still(&request)
            .map_err(|e| AppError::CaptureFailed(e.to_string()))
    }

    /// Next frame from the stream, upright and zoomed
    pub async fn next_preview_frame(&self) -> AppResult<PreviewFrame> {
        let mut frames = self.frames.lock().await;
        let receiver = frames
            .as_mut()
            .ok_or_else(|| AppError::Other("Preview stream not available".to_string()))?;

        let frame = tokio::time::timeout(timing::FRAME_TIMEOUT, receiver.next())
            .await
            .map_err(|_| AppError::Other("Timed out waiting for a preview frame".to_string()))?
            .ok_or_else(|| AppError::Other("Preview stream ended".to_string()))?;
        drop(frames);

        let zoom = self.config.zoom;
        let sequence = frame.sequence;
        let captured_at = frame.captured_at;
        let image = tokio::task::spawn_blocking(move || render_frame(&frame, zoom))
            .await
            .map_err(|e| AppError::Other(format!("Preview task error: {}", e)))??;

        Ok(PreviewFrame {
            image,
            sequence,
            captured_at,
        })
    }

    /// First preview frame taken after the exposure warm-up
    pub async fn settled_preview_frame(&self) -> AppResult<PreviewFrame> {
        let settled_at = self.opened_at + timing::PREVIEW_WARMUP;
        loop {
            let frame = self.next_preview_frame().await?;
            if frame.captured_at >= settled_at {
                return Ok(frame);
            }
            debug!(sequence = frame.sequence, "Skipping warm-up frame");
        }
    }
}

impl Drop for PreviewSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::{BackendError, BackendResult, CameraBackendType, PixelFormat};
    use crate::pipelines::photo::Orientation;
    use image::Rgba;
    use std::sync::atomic::AtomicUsize;

    fn fmt(width: u32, height: u32) -> CameraFormat {
        CameraFormat {
            width,
            height,
            framerate: Some(30),
            pixel_format: "MJPG".into(),
        }
    }

    #[test]
    fn test_select_format_prefers_16_9_then_area() {
        let formats = vec![fmt(640, 480), fmt(1280, 720), fmt(2592, 1944), fmt(1920, 1080)];
        assert_eq!(
            select_format(&formats, AspectRatio::WIDESCREEN),
            Some(fmt(1920, 1080))
        );
        assert_eq!(
            select_format(&formats, AspectRatio::STANDARD),
            Some(fmt(2592, 1944))
        );
        assert_eq!(select_format(&[], AspectRatio::WIDESCREEN), None);
    }

    #[test]
    fn test_select_format_falls_back_to_nearest() {
        let formats = vec![fmt(640, 480), fmt(1280, 800)];
        assert_eq!(
            select_format(&formats, AspectRatio::WIDESCREEN),
            Some(fmt(1280, 800))
        );
    }

    #[test]
    fn test_render_frame_rotates_then_zooms() {
        // 4x2 sensor buffer, left half red and right half blue
        let sensor = RgbaImage::from_fn(4, 2, |x, _| {
            if x < 2 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        });
        let frame = CameraFrame {
            width: 4,
            height: 2,
            data: Arc::from(sensor.into_raw()),
            format: PixelFormat::RGBA,
            orientation: Orientation::Rotate90,
            sequence: 7,
            captured_at: Instant::now(),
        };

        let unzoomed = render_frame(&frame, 1.0).unwrap();
        assert_eq!(unzoomed.dimensions(), (2, 4));
        // Rotating clockwise puts the left half on top
        assert_eq!(unzoomed.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(unzoomed.get_pixel(0, 3).0, [0, 0, 255, 255]);

        assert_eq!(render_frame(&frame, 2.0).unwrap().dimensions(), (1, 2));
    }

    /// Where the test camera breaks while binding
    #[derive(Clone, Copy, PartialEq)]
    enum Fault {
        None,
        NoCameras,
        NoFormats,
        Init,
    }

    /// Backend that records lifecycle calls
    struct CountingBackend {
        device: CameraDevice,
        initialized: bool,
        shutdowns: Arc<AtomicUsize>,
        fault: Fault,
    }

    impl CountingBackend {
        fn new(shutdowns: Arc<AtomicUsize>, fault: Fault) -> Self {
            Self {
                device: CameraDevice {
                    name: "Test".into(),
                    path: "test://0".into(),
                    driver: None,
                    rotation: Default::default(),
                },
                initialized: false,
                shutdowns,
                fault,
            }
        }
    }

    impl CameraBackend for CountingBackend {
        fn enumerate_cameras(&self) -> Vec<CameraDevice> {
            if self.fault == Fault::NoCameras {
                return Vec::new();
            }
            vec![self.device.clone()]
        }

        fn get_formats(&self, _device: &CameraDevice) -> Vec<CameraFormat> {
            if self.fault == Fault::NoFormats {
                return Vec::new();
            }
            vec![fmt(1280, 720)]
        }

        fn initialize(&mut self, _: &CameraDevice, _: &CameraFormat) -> BackendResult<()> {
            if self.fault == Fault::Init {
                return Err(BackendError::DeviceNotFound("test://0".into()));
            }
            self.initialized = true;
            Ok(())
        }

        fn shutdown(&mut self) -> BackendResult<()> {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            self.initialized = false;
            Ok(())
        }

        fn is_initialized(&self) -> bool {
            self.initialized
        }

        fn take_preview_receiver(&mut self) -> Option<FrameReceiver> {
            None
        }

        fn capture_still(&self, _: &StillRequest) -> BackendResult<CapturedImage> {
            Err(BackendError::Busy)
        }

        fn backend_type(&self) -> CameraBackendType {
            CameraBackendType::File
        }

        fn current_device(&self) -> Option<&CameraDevice> {
            self.initialized.then_some(&self.device)
        }

        fn current_format(&self) -> Option<&CameraFormat> {
            None
        }
    }

    #[test]
    fn test_drop_releases_camera_once() {
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let backend = Box::new(CountingBackend::new(Arc::clone(&shutdowns), Fault::None));
        let session = PreviewSession::open(backend, None, PreviewConfig::default()).unwrap();
        assert_eq!(session.format(), &fmt(1280, 720));

        session.close();
        assert!(!session.is_open());
        drop(session);
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_binding_failures_are_binding_failed() {
        for fault in [Fault::NoCameras, Fault::NoFormats, Fault::Init] {
            let shutdowns = Arc::new(AtomicUsize::new(0));
            let backend = Box::new(CountingBackend::new(Arc::clone(&shutdowns), fault));
            let err = PreviewSession::open(backend, None, PreviewConfig::default())
                .err()
                .unwrap();
            assert!(matches!(err, AppError::BindingFailed(_)), "{:?}", err);
            assert!(err.is_fatal_to_screen());
            assert_eq!(shutdowns.load(Ordering::SeqCst), 0);
        }
    }

    #[test]
    fn test_capture_lock_is_exclusive() {
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let backend = Box::new(CountingBackend::new(shutdowns, Fault::None));
        let session = PreviewSession::open(backend, None, PreviewConfig::default()).unwrap();

        let guard = session.try_begin_capture().unwrap();
        assert!(session.is_capturing());
        assert!(session.try_begin_capture().is_none());
        drop(guard);
        assert!(!session.is_capturing());
        assert!(session.try_begin_capture().is_some());
    }

    #[test]
    fn test_capture_after_close_fails() {
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let backend = Box::new(CountingBackend::new(shutdowns, Fault::None));
        let session = PreviewSession::open(backend, None, PreviewConfig::default()).unwrap();
        session.close();
        assert!(matches!(
            session.capture_still(Path::new("/tmp/x.jpg")),
            Err(AppError::CaptureFailed(_))
        ));
    }
}
