// SPDX-License-Identifier: GPL-3.0-only

//! Direct V4L2 capture
//!
//! Uses the v4l crate to stream MJPEG from a capture device. A dedicated
//! thread owns the memory-mapped stream; it publishes every frame as the
//! latest still candidate and forwards it to the preview channel when the
//! consumer keeps up. Still captures wait for a frame newer than the trigger
//! so the photo never predates the shutter press.

use super::types::*;
use super::{CameraBackend, write_still};
use futures::channel::mpsc;
use std::fs::File;
use std::os::unix::io::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

/// Only MJPEG is negotiated: every frame is a complete, full-resolution JPEG
const MJPEG_FOURCC: &[u8; 4] = b"MJPG";

/// Number of memory-mapped buffers
const STREAM_BUFFERS: u32 = 4;

/// Preview channel depth; frames are dropped when the consumer lags
const PREVIEW_CHANNEL_CAPACITY: usize = 2;

/// How long `initialize` waits for the capture thread to open the device
const STARTUP_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a still capture waits for a fresh frame
const STILL_FRAME_TIMEOUT: Duration = Duration::from_secs(3);

// ===== V4L2 controls =====

const V4L2_CID_CAMERA_CLASS_BASE: u32 = 0x009a0000 | 0x900;
/// Sensor mounting rotation in degrees (read-only)
const V4L2_CID_CAMERA_SENSOR_ROTATION: u32 = V4L2_CID_CAMERA_CLASS_BASE + 35;
/// Get control value (v4l2_control: 8 bytes)
const VIDIOC_G_CTRL: libc::c_ulong = 0xC008561B;

/// V4L2 control get/set structure
#[repr(C)]
struct V4l2Control {
    id: u32,
    value: i32,
}

/// Get current value of a control
fn get_control(device_path: &str, control_id: u32) -> Option<i32> {
    let file = File::open(device_path).ok()?;
    let fd = file.as_raw_fd();

    let mut ctrl = V4l2Control {
        id: control_id,
        value: 0,
    };

    // SAFETY: fd is open for the duration of the call and ctrl matches the
    // kernel's struct v4l2_control layout.
    let result = unsafe { libc::ioctl(fd, VIDIOC_G_CTRL, &mut ctrl as *mut V4l2Control) };
    if result < 0 {
        debug!(device_path, control_id, "Failed to get V4L2 control");
        return None;
    }
    Some(ctrl.value)
}

/// Most recent frame, shared between the capture thread and still captures
#[derive(Default)]
struct LatestFrame {
    frame: Mutex<Option<CameraFrame>>,
    updated: Condvar,
}

impl LatestFrame {
    fn publish(&self, frame: CameraFrame) {
        if let Ok(mut slot) = self.frame.lock() {
            *slot = Some(frame);
            self.updated.notify_all();
        }
    }

    fn current_sequence(&self) -> Option<u64> {
        self.frame
            .lock()
            .ok()
            .and_then(|slot| slot.as_ref().map(|f| f.sequence))
    }

    /// Wait for a frame with a sequence number above `after`
    fn wait_newer(&self, after: Option<u64>, timeout: Duration) -> BackendResult<CameraFrame> {
        let slot = self
            .frame
            .lock()
            .map_err(|_| BackendError::Other("frame lock poisoned".to_string()))?;
        let (slot, result) = self
            .updated
            .wait_timeout_while(slot, timeout, |slot| match (slot.as_ref(), after) {
                (Some(frame), Some(after)) => frame.sequence <= after,
                (Some(_), None) => false,
                (None, _) => true,
            })
            .map_err(|_| BackendError::Other("frame lock poisoned".to_string()))?;
        if result.timed_out() {
            return Err(BackendError::Timeout(
                "no frame from camera for still capture".to_string(),
            ));
        }
        slot.clone()
            .ok_or_else(|| BackendError::Other("frame slot empty".to_string()))
    }
}

/// V4L2 MJPEG camera backend
pub struct V4l2Backend {
    device: Option<CameraDevice>,
    format: Option<CameraFormat>,
    running: Arc<AtomicBool>,
    latest: Arc<LatestFrame>,
    preview_receiver: Option<FrameReceiver>,
    thread_handle: Option<std::thread::JoinHandle<()>>,
}

impl V4l2Backend {
    pub fn new() -> Self {
        Self {
            device: None,
            format: None,
            running: Arc::new(AtomicBool::new(false)),
            latest: Arc::new(LatestFrame::default()),
            preview_receiver: None,
            thread_handle: None,
        }
    }

    fn stop_thread(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            match handle.join() {
                Ok(_) => info!("V4L2 capture thread stopped"),
                Err(_) => warn!("V4L2 capture thread panicked"),
            }
        }
    }
}

impl Default for V4l2Backend {
    fn default() -> Self {
        Self::new()
    }
}

/// Open `/dev/videoN` nodes that can capture video
fn scan_devices() -> Vec<CameraDevice> {
    let mut nodes: Vec<_> = std::fs::read_dir("/dev")
        .into_iter()
        .flatten()
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("video"))
        })
        .collect();
    nodes.sort();

    let mut cameras = Vec::new();
    for node in nodes {
        let path_str = node.to_string_lossy().to_string();
        let Ok(dev) = Device::with_path(&node) else {
            continue;
        };
        let Ok(caps) = dev.query_caps() else {
            continue;
        };
        if !caps
            .capabilities
            .contains(v4l::capability::Flags::VIDEO_CAPTURE)
        {
            continue;
        }
        // Metadata nodes advertise capture but list no formats
        if dev.enum_formats().map(|f| f.is_empty()).unwrap_or(true) {
            continue;
        }

        let rotation = get_control(&path_str, V4L2_CID_CAMERA_SENSOR_ROTATION)
            .map(SensorRotation::from_degrees_int)
            .unwrap_or_default();

        debug!(path = %path_str, card = %caps.card, %rotation, "Found V4L2 camera");
        cameras.push(CameraDevice {
            name: caps.card.clone(),
            path: path_str,
            driver: Some(caps.driver.clone()),
            rotation,
        });
    }
    cameras
}

/// Discrete MJPEG sizes with their best framerate
fn mjpeg_formats(device_path: &str) -> Vec<CameraFormat> {
    let Ok(dev) = Device::with_path(device_path) else {
        return Vec::new();
    };
    let fourcc = v4l::FourCC::new(MJPEG_FOURCC);

    let mut formats = Vec::new();
    let Ok(sizes) = dev.enum_framesizes(fourcc) else {
        return formats;
    };
    for size in sizes {
        match size.size {
            v4l::framesize::FrameSizeEnum::Discrete(discrete) => {
                let fps = dev
                    .enum_frameintervals(fourcc, discrete.width, discrete.height)
                    .into_iter()
                    .flatten()
                    .filter_map(|interval| match interval.interval {
                        v4l::frameinterval::FrameIntervalEnum::Discrete(frac)
                            if frac.numerator > 0 =>
                        {
                            Some(frac.denominator / frac.numerator)
                        }
                        _ => None,
                    })
                    .max();
                formats.push(CameraFormat {
                    width: discrete.width,
                    height: discrete.height,
                    framerate: fps,
                    pixel_format: "MJPG".to_string(),
                });
            }
            v4l::framesize::FrameSizeEnum::Stepwise(step) => {
                // Offer the common 16:9 and 4:3 sizes the range allows
                for (w, h) in [(3840, 2160), (1920, 1080), (1280, 720), (640, 480)] {
                    if (step.min_width..=step.max_width).contains(&w)
                        && (step.min_height..=step.max_height).contains(&h)
                    {
                        formats.push(CameraFormat {
                            width: w,
                            height: h,
                            framerate: None,
                            pixel_format: "MJPG".to_string(),
                        });
                    }
                }
            }
        }
    }
    formats
}

/// Main capture loop running in a separate thread
#[allow(clippy::too_many_arguments)]
fn capture_loop(
    device_path: &str,
    width: u32,
    height: u32,
    orientation: crate::pipelines::photo::Orientation,
    mut preview_sender: FrameSender,
    latest: Arc<LatestFrame>,
    running: Arc<AtomicBool>,
    ready: std::sync::mpsc::Sender<BackendResult<()>>,
) {
    let mut dev = match Device::with_path(device_path) {
        Ok(dev) => dev,
        Err(e) => {
            let _ = ready.send(Err(BackendError::DeviceNotFound(format!(
                "{}: {}",
                device_path, e
            ))));
            return;
        }
    };

    let fourcc = v4l::FourCC::new(MJPEG_FOURCC);
    let negotiated = dev.format().and_then(|mut format| {
        format.width = width;
        format.height = height;
        format.fourcc = fourcc;
        dev.set_format(&format)
    });
    let (width, height) = match negotiated {
        Ok(f) if f.fourcc == fourcc => {
            info!(width = f.width, height = f.height, "Set V4L2 format");
            (f.width, f.height)
        }
        Ok(f) => {
            let _ = ready.send(Err(BackendError::FormatNotSupported(format!(
                "device chose {:?} instead of MJPG",
                f.fourcc
            ))));
            return;
        }
        Err(e) => {
            let _ = ready.send(Err(BackendError::FormatNotSupported(e.to_string())));
            return;
        }
    };

    let mut stream = match MmapStream::with_buffers(&mut dev, Type::VideoCapture, STREAM_BUFFERS)
    {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(BackendError::InitializationFailed(format!(
                "Failed to create buffer stream: {}",
                e
            ))));
            return;
        }
    };

    let _ = ready.send(Ok(()));
    info!(device_path, "V4L2 capture stream started");

    let mut sequence: u64 = 0;
    while running.load(Ordering::SeqCst) {
        match stream.next() {
            Ok((buf, meta)) => {
                let used = (meta.bytesused as usize).min(buf.len());
                if used == 0 {
                    continue;
                }
                let frame = CameraFrame {
                    width,
                    height,
                    data: Arc::from(&buf[..used]),
                    format: PixelFormat::MJPEG,
                    orientation,
                    sequence,
                    captured_at: Instant::now(),
                };
                sequence += 1;

                latest.publish(frame.clone());
                if let Err(e) = preview_sender.try_send(frame)
                    && e.is_disconnected()
                    && sequence % 60 == 0
                {
                    debug!("Preview receiver gone, still frames only");
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to capture frame");
                std::thread::sleep(Duration::from_millis(10));
            }
        }
    }

    info!(device_path, "V4L2 capture loop ended");
}

impl CameraBackend for V4l2Backend {
    fn enumerate_cameras(&self) -> Vec<CameraDevice> {
        scan_devices()
    }

    fn get_formats(&self, device: &CameraDevice) -> Vec<CameraFormat> {
        mjpeg_formats(&device.path)
    }

    fn initialize(&mut self, device: &CameraDevice, format: &CameraFormat) -> BackendResult<()> {
        if self.is_initialized() {
            self.shutdown()?;
        }

        info!(device = %device.name, path = %device.path, %format, "Initializing V4L2 camera");

        let (preview_sender, preview_receiver) = mpsc::channel(PREVIEW_CHANNEL_CAPACITY);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();

        self.latest = Arc::new(LatestFrame::default());
        self.running.store(true, Ordering::SeqCst);

        let path = device.path.clone();
        let (width, height) = (format.width, format.height);
        let orientation = device.rotation.orientation();
        let latest = Arc::clone(&self.latest);
        let running = Arc::clone(&self.running);
        let handle = std::thread::spawn(move || {
            capture_loop(
                &path,
                width,
                height,
                orientation,
                preview_sender,
                latest,
                running,
                ready_tx,
            )
        });
        self.thread_handle = Some(handle);

        let startup = ready_rx.recv_timeout(STARTUP_TIMEOUT).unwrap_or_else(|_| {
            Err(BackendError::InitializationFailed(
                "capture thread did not start".to_string(),
            ))
        });
        if let Err(e) = startup {
            error!(error = %e, "V4L2 initialization failed");
            self.stop_thread();
            return Err(e);
        }

        self.preview_receiver = Some(preview_receiver);
        self.device = Some(device.clone());
        self.format = Some(format.clone());
        Ok(())
    }

    fn shutdown(&mut self) -> BackendResult<()> {
        if self.thread_handle.is_some() {
            info!("Shutting down V4L2 camera");
        }
        self.stop_thread();
        self.preview_receiver = None;
        self.device = None;
        self.format = None;
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.device.is_some() && self.running.load(Ordering::SeqCst)
    }

    fn take_preview_receiver(&mut self) -> Option<FrameReceiver> {
        self.preview_receiver.take()
    }

    fn capture_still(&self, request: &StillRequest) -> BackendResult<CapturedImage> {
        if !self.is_initialized() {
            return Err(BackendError::NotInitialized);
        }

        let trigger_sequence = self.latest.current_sequence();
        let frame = self.latest.wait_newer(trigger_sequence, STILL_FRAME_TIMEOUT)?;
        debug!(
            sequence = frame.sequence,
            size = frame.data.len(),
            "Still frame selected"
        );

        let sensor_image = frame.decode()?;
        write_still(&sensor_image, frame.orientation, request)
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::V4l2
    }

    fn current_device(&self) -> Option<&CameraDevice> {
        self.device.as_ref()
    }

    fn current_format(&self) -> Option<&CameraFormat> {
        self.format.as_ref()
    }
}

impl Drop for V4l2Backend {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}
