// SPDX-License-Identifier: GPL-3.0-only

//! Shared fixtures for integration tests

#![allow(dead_code)]

use image::{DynamicImage, Rgb, RgbImage};
use meter_capture::backends::camera::{
    BackendError, BackendResult, CameraBackend, CameraBackendType, CameraDevice, CameraFormat,
    CapturedImage, FrameReceiver, SensorRotation, StillRequest,
};
use meter_capture::pipelines::photo::encoding::{PhotoEncoder, write_durably};
use meter_capture::pipelines::photo::{EncodingQuality, Orientation};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use tracing_subscriber::fmt::MakeWriter;

pub const RED: [u8; 3] = [220, 30, 30];
pub const GREEN: [u8; 3] = [30, 200, 30];
pub const BLUE: [u8; 3] = [30, 30, 220];
pub const YELLOW: [u8; 3] = [230, 220, 30];

/// Upright picture split into four solid quadrants
///
/// Top-left red, top-right green, bottom-left blue, bottom-right yellow.
pub fn quadrant_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        let color = match (x < width / 2, y < height / 2) {
            (true, true) => RED,
            (false, true) => GREEN,
            (true, false) => BLUE,
            (false, false) => YELLOW,
        };
        Rgb(color)
    }))
}

/// Write `upright` the way a sensor with `orientation` would have stored it
pub fn write_tagged_jpeg(path: &Path, upright: &DynamicImage, orientation: Orientation) {
    let sensor = orientation.unapply(upright.clone());
    let jpeg = PhotoEncoder::new(EncodingQuality::Maximum)
        .encode_sensor_jpeg(&sensor, orientation)
        .unwrap();
    write_durably(path, &jpeg).unwrap();
}

/// Panics unless every channel is within `tolerance` of `expected`
pub fn assert_color_near(actual: [u8; 3], expected: [u8; 3], tolerance: u8, context: &str) {
    for (a, e) in actual.iter().zip(expected.iter()) {
        assert!(
            a.abs_diff(*e) <= tolerance,
            "{}: got {:?}, expected {:?}",
            context,
            actual,
            expected
        );
    }
}

/// Colour at the centre of an image file
pub fn center_color(path: &Path) -> [u8; 3] {
    let image = image::open(path).unwrap().to_rgb8();
    image.get_pixel(image.width() / 2, image.height() / 2).0
}

/// In-memory log sink for a test subscriber
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

pub struct LogWriter(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter(Arc::clone(&self.0))
    }
}

impl io::Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .map_err(|_| io::Error::other("log buffer poisoned"))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// What the scripted camera does on the shutter
#[derive(Clone)]
pub enum Shutter {
    /// Store `upright` in sensor order tagged with `orientation`
    Photo {
        upright: DynamicImage,
        orientation: Orientation,
    },
    /// Write bytes that are not an image
    Corrupt,
    /// Fail without writing anything
    Fail,
}

/// Camera double with a scripted shutter
pub struct ScriptedBackend {
    device: CameraDevice,
    shutter: Shutter,
    initialized: bool,
    captures: Arc<AtomicUsize>,
    release: Option<Mutex<mpsc::Receiver<()>>>,
}

impl ScriptedBackend {
    pub fn new(shutter: Shutter) -> Self {
        Self {
            device: CameraDevice {
                name: "Scripted camera".into(),
                path: "scripted://0".into(),
                driver: None,
                rotation: SensorRotation::None,
            },
            shutter,
            initialized: false,
            captures: Arc::new(AtomicUsize::new(0)),
            release: None,
        }
    }

    /// Hold every shutter until a message arrives on the returned sender
    pub fn held(mut self) -> (Self, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel();
        self.release = Some(Mutex::new(rx));
        (self, tx)
    }

    /// Number of shutter presses that reached the camera
    pub fn capture_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.captures)
    }
}

impl CameraBackend for ScriptedBackend {
    fn enumerate_cameras(&self) -> Vec<CameraDevice> {
        vec![self.device.clone()]
    }

    fn get_formats(&self, _device: &CameraDevice) -> Vec<CameraFormat> {
        vec![
            CameraFormat {
                width: 640,
                height: 480,
                framerate: Some(30),
                pixel_format: "MJPG".into(),
            },
            CameraFormat {
                width: 1920,
                height: 1080,
                framerate: Some(30),
                pixel_format: "MJPG".into(),
            },
        ]
    }

    fn initialize(&mut self, _device: &CameraDevice, _format: &CameraFormat) -> BackendResult<()> {
        self.initialized = true;
        Ok(())
    }

    fn shutdown(&mut self) -> BackendResult<()> {
        self.initialized = false;
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn take_preview_receiver(&mut self) -> Option<FrameReceiver> {
        None
    }

    fn capture_still(&self, request: &StillRequest) -> BackendResult<CapturedImage> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        if let Some(release) = &self.release {
            let _ = release.lock().unwrap().recv();
        }

        match &self.shutter {
            Shutter::Photo {
                upright,
                orientation,
            } => {
                write_tagged_jpeg(&request.path, upright, *orientation);
                // Stored buffer size; turning it upright swaps the sides back
                let (pixel_width, pixel_height) =
                    orientation.display_dimensions(upright.width(), upright.height());
                Ok(CapturedImage {
                    file_path: request.path.clone(),
                    pixel_width,
                    pixel_height,
                    orientation: *orientation,
                })
            }
            Shutter::Corrupt => {
                write_durably(&request.path, b"\xFF\xD8 truncated sensor dump")?;
                Ok(CapturedImage {
                    file_path: request.path.clone(),
                    pixel_width: 0,
                    pixel_height: 0,
                    orientation: Orientation::Normal,
                })
            }
            Shutter::Fail => Err(BackendError::IoError("sensor timeout".into())),
        }
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
