// SPDX-License-Identifier: GPL-3.0-only

//! Still image served as a camera
//!
//! The file is decoded once in stored (sensor) order, its EXIF orientation is
//! kept, and a streaming thread repeats it as preview frames. Still captures
//! re-encode the same buffer with the same orientation tag, so the pipeline
//! sees exactly what a tagged hardware capture would produce.

use super::types::*;
use super::{CameraBackend, write_still};
use crate::pipelines::photo::orientation::{self, Orientation};
use futures::channel::mpsc;
use image::DynamicImage;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Interval between repeated preview frames
const FRAME_INTERVAL: Duration = Duration::from_millis(66);

/// Preview channel depth; older frames are dropped when the consumer lags
const PREVIEW_CHANNEL_CAPACITY: usize = 2;

/// Decoded source kept while the backend is initialized
struct LoadedSource {
    image: Arc<DynamicImage>,
    orientation: Orientation,
}

/// File-backed virtual camera
pub struct FileSourceBackend {
    source: PathBuf,
    device: Option<CameraDevice>,
    format: Option<CameraFormat>,
    loaded: Option<LoadedSource>,
    running: Arc<AtomicBool>,
    preview_receiver: Option<FrameReceiver>,
    thread_handle: Option<std::thread::JoinHandle<()>>,
}

impl FileSourceBackend {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            device: None,
            format: None,
            loaded: None,
            running: Arc::new(AtomicBool::new(false)),
            preview_receiver: None,
            thread_handle: None,
        }
    }

    fn device(&self) -> CameraDevice {
        let name = self
            .source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.source.display().to_string());
        CameraDevice {
            name: format!("File: {}", name),
            path: self.source.display().to_string(),
            driver: None,
            rotation: SensorRotation::None,
        }
    }

    fn load(&self) -> BackendResult<LoadedSource> {
        let image = image::open(&self.source).map_err(|e| {
            BackendError::InitializationFailed(format!(
                "Failed to load {}: {}",
                self.source.display(),
                e
            ))
        })?;
        Ok(LoadedSource {
            image: Arc::new(image),
            orientation: orientation::read_orientation(&self.source),
        })
    }
}

fn stream_loop(
    image: Arc<DynamicImage>,
    orientation: Orientation,
    mut sender: FrameSender,
    running: Arc<AtomicBool>,
) {
    static FRAME_COUNTER: AtomicU64 = AtomicU64::new(0);

    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let data: Arc<[u8]> = Arc::from(rgba.into_raw());

    while running.load(Ordering::SeqCst) {
        let frame = CameraFrame {
            width,
            height,
            data: Arc::clone(&data),
            format: PixelFormat::RGBA,
            orientation,
            sequence: FRAME_COUNTER.fetch_add(1, Ordering::Relaxed),
            captured_at: Instant::now(),
        };

        if let Err(e) = sender.try_send(frame) {
            if e.is_disconnected() {
                debug!("Preview receiver dropped, stopping file source stream");
                break;
            }
        }
        std::thread::sleep(FRAME_INTERVAL);
    }
}

impl CameraBackend for FileSourceBackend {
    fn enumerate_cameras(&self) -> Vec<CameraDevice> {
        if self.source.is_file() {
            vec![self.device()]
        } else {
            Vec::new()
        }
    }

    fn get_formats(&self, _device: &CameraDevice) -> Vec<CameraFormat> {
        match image::image_dimensions(&self.source) {
            Ok((width, height)) => vec![CameraFormat {
                width,
                height,
                framerate: None,
                pixel_format: "RGBA".to_string(),
            }],
            Err(e) => {
                warn!(path = %self.source.display(), error = %e, "Cannot read source dimensions");
                Vec::new()
            }
        }
    }

    fn initialize(&mut self, device: &CameraDevice, format: &CameraFormat) -> BackendResult<()> {
        if self.is_initialized() {
            self.shutdown()?;
        }
        if device.path != self.source.display().to_string() {
            return Err(BackendError::DeviceNotFound(device.path.clone()));
        }

        let loaded = self.load()?;
        info!(
            path = %self.source.display(),
            width = loaded.image.width(),
            height = loaded.image.height(),
            orientation = %loaded.orientation,
            "File source camera initialized"
        );

        let (sender, receiver) = mpsc::channel(PREVIEW_CHANNEL_CAPACITY);
        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let image = Arc::clone(&loaded.image);
        let orientation = loaded.orientation;
        self.thread_handle = Some(std::thread::spawn(move || {
            stream_loop(image, orientation, sender, running)
        }));

        self.preview_receiver = Some(receiver);
        self.loaded = Some(loaded);
        self.device = Some(device.clone());
        self.format = Some(format.clone());
        Ok(())
    }

    fn shutdown(&mut self) -> BackendResult<()> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take()
            && handle.join().is_err()
        {
            warn!("File source stream thread panicked");
        }
        if self.loaded.take().is_some() {
            info!(path = %self.source.display(), "File source camera shut down");
        }
        self.preview_receiver = None;
        self.device = None;
        self.format = None;
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.loaded.is_some()
    }

    fn take_preview_receiver(&mut self) -> Option<FrameReceiver> {
        self.preview_receiver.take()
    }

    fn capture_still(&self, request: &StillRequest) -> BackendResult<CapturedImage> {
        let loaded = self.loaded.as_ref().ok_or(BackendError::NotInitialized)?;
        write_still(&loaded.image, loaded.orientation, request)
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::File
    }

    fn current_device(&self) -> Option<&CameraDevice> {
        self.device.as_ref()
    }

    fn current_format(&self) -> Option<&CameraFormat> {
        self.format.as_ref()
    }
}

impl Drop for FileSourceBackend {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipelines::photo::encoding::{EncodingQuality, PhotoEncoder, write_durably};
    use crate::pipelines::photo::orientation::read_orientation;
    use image::{Rgb, RgbImage};
    use std::path::Path;

    fn write_source(dir: &Path, orientation: Orientation) -> PathBuf {
        let path = dir.join("source.jpg");
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(48, 32, Rgb([200, 10, 10])));
        let jpeg = PhotoEncoder::default()
            .encode_sensor_jpeg(&image, orientation)
            .unwrap();
        write_durably(&path, &jpeg).unwrap();
        path
    }

    #[test]
    fn test_lifecycle_and_capture() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(dir.path(), Orientation::Rotate270);
        let mut backend = FileSourceBackend::new(&source);

        let devices = backend.enumerate_cameras();
        assert_eq!(devices.len(), 1);
        let formats = backend.get_formats(&devices[0]);
        assert_eq!((formats[0].width, formats[0].height), (48, 32));

        let request = StillRequest {
            path: dir.path().join("full.jpg"),
            zoom: 1.0,
            quality: EncodingQuality::High,
        };
        assert_eq!(
            backend.capture_still(&request),
            Err(BackendError::NotInitialized)
        );

        backend.initialize(&devices[0], &formats[0]).unwrap();
        assert!(backend.is_initialized());
        assert!(backend.take_preview_receiver().is_some());
        assert!(backend.take_preview_receiver().is_none());

        let captured = backend.capture_still(&request).unwrap();
        assert_eq!(captured.orientation, Orientation::Rotate270);
        assert_eq!((captured.pixel_width, captured.pixel_height), (48, 32));
        assert_eq!(read_orientation(&request.path), Orientation::Rotate270);

        backend.shutdown().unwrap();
        assert!(!backend.is_initialized());
        // Second shutdown is a no-op
        backend.shutdown().unwrap();
    }

    #[test]
    fn test_missing_source() {
        let backend = FileSourceBackend::new("/nonexistent/meter.jpg");
        assert!(backend.enumerate_cameras().is_empty());
    }
}
