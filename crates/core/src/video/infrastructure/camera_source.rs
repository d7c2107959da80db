use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;

use crate::shared::frame::Frame;
use crate::video::domain::video_source::{SourceError, SourceReadiness, VideoSource};

type LatestFrame = Arc<Mutex<Option<Frame>>>;

/// Live camera capture on a background thread.
///
/// The thread overwrites a single latest-frame slot; readers never queue
/// behind it. Timestamps are measured from the moment the stream opened.
pub struct CameraSource {
    device: String,
    latest: LatestFrame,
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl CameraSource {
    /// Opens camera `index` and starts capturing.
    ///
    /// The device is opened on the capture thread, but this call waits for
    /// the outcome so a missing or busy camera is reported here.
    pub fn open(index: u32) -> Result<Self, SourceError> {
        let device = format!("camera {index}");
        let latest: LatestFrame = Arc::new(Mutex::new(None));
        let stop = Arc::new(AtomicBool::new(false));
        let (opened_tx, opened_rx) = crossbeam_channel::bounded::<Result<(), String>>(1);

        let slot = latest.clone();
        let stop_flag = stop.clone();
        let handle = thread::spawn(move || {
            let mut camera = match open_camera(index) {
                Ok(camera) => {
                    let _ = opened_tx.send(Ok(()));
                    camera
                }
                Err(reason) => {
                    let _ = opened_tx.send(Err(reason));
                    return;
                }
            };
            capture_until_stopped(&mut camera, &slot, &stop_flag);
            if let Err(e) = camera.stop_stream() {
                log::debug!("camera stop_stream failed: {e}");
            }
        });

        let outcome = opened_rx
            .recv()
            .unwrap_or_else(|_| Err("capture thread exited before opening".to_string()));
        if let Err(reason) = outcome {
            let _ = handle.join();
            return Err(SourceError::DeviceUnavailable { device, reason });
        }

        log::info!("{device} streaming");
        Ok(Self {
            device,
            latest,
            stop,
            handle: Some(handle),
        })
    }

    fn capture_alive(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

fn open_camera(index: u32) -> Result<Camera, String> {
    let requested = [
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    ];
    let mut last_err = String::from("no supported format");
    for format in requested {
        match Camera::new(CameraIndex::Index(index), format) {
            Ok(mut camera) => match camera.open_stream() {
                Ok(()) => return Ok(camera),
                Err(e) => last_err = e.to_string(),
            },
            Err(e) => last_err = e.to_string(),
        }
    }
    Err(last_err)
}

fn capture_until_stopped(camera: &mut Camera, slot: &LatestFrame, stop: &AtomicBool) {
    let opened_at = Instant::now();
    while !stop.load(Ordering::Relaxed) {
        let buffer = match camera.frame() {
            Ok(buffer) => buffer,
            Err(e) => {
                log::warn!("camera frame read failed: {e}");
                thread::sleep(Duration::from_millis(5));
                continue;
            }
        };
        let timestamp = opened_at.elapsed();
        let rgb = match buffer.decode_image::<RgbFormat>() {
            Ok(rgb) => rgb,
            Err(e) => {
                log::warn!("failed to decode camera frame: {e}");
                continue;
            }
        };
        let (width, height) = (rgb.width(), rgb.height());
        let frame = Frame::new(rgb.into_raw(), width, height, 3, timestamp);
        if let Ok(mut latest) = slot.lock() {
            *latest = Some(frame);
        }
    }
}

impl VideoSource for CameraSource {
    fn readiness(&mut self) -> SourceReadiness {
        if !self.capture_alive() {
            return SourceReadiness::ended();
        }
        let has_frame = self.latest.lock().map(|l| l.is_some()).unwrap_or(false);
        SourceReadiness {
            playing: true,
            ended: false,
            has_enough_data: has_frame,
        }
    }

    fn current_timestamp(&self) -> Duration {
        self.latest
            .lock()
            .ok()
            .and_then(|l| l.as_ref().map(Frame::timestamp))
            .unwrap_or_default()
    }

    fn current_frame(&mut self) -> Result<Frame, Box<dyn std::error::Error>> {
        if self.handle.is_none() {
            return Err(SourceError::Released.into());
        }
        let latest = self
            .latest
            .lock()
            .map_err(|_| format!("{} frame slot poisoned", self.device))?;
        latest
            .clone()
            .ok_or_else(|| format!("{} has not delivered a frame yet", self.device).into())
    }

    fn release(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            log::info!("{} released", self.device);
        }
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.release();
    }
}
