#![allow(dead_code)]

use image::{Rgb, RgbImage};
use packcam::app_config::ApplicationConfig;
use packcam::camera::camera_entity::CameraHandle;
use packcam::camera_config::{CameraConfig, CameraSource};
use packcam::common::shutdown::ShutdownSignal;
use packcam::config_loader::{parse_config, MasterConfig};
use packcam::core::capture_source::{CodeDecoder, Frame, FrameCapture, MediaBackend, VideoSink, WriterSpec};
use packcam::core::recording::RecordingCoordinator;
use packcam::core::status::{CameraStatus, Cue, CuePlayer, StatusSink};
use packcam::errors::AppError;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub const FRAME_WIDTH: u32 = 64;
pub const FRAME_HEIGHT: u32 = 48;

/// In-memory media backend. Device `n` produces solid frames whose red
/// channel is `n`; the decoder maps that colour back to whatever label the
/// test currently shows to device `n`.
#[derive(Default)]
pub struct ScriptedBackend {
    labels: Arc<Mutex<HashMap<u8, String>>>,
    unreachable: Mutex<HashSet<u32>>,
    fail_writes_after: Mutex<Option<u64>>,
    stall_writes_after: Mutex<Option<u64>>,
    fail_writer_opens: Mutex<bool>,
    stall_capture_opens: Mutex<Option<Duration>>,
    writers_opened: Mutex<Vec<PathBuf>>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn show_label(&self, device: u32, code: &str) {
        self.labels.lock().unwrap().insert(device as u8, code.to_string());
    }

    pub fn hide_label(&self, device: u32) {
        self.labels.lock().unwrap().remove(&(device as u8));
    }

    pub fn set_unreachable(&self, device: u32, unreachable: bool) {
        let mut set = self.unreachable.lock().unwrap();
        if unreachable {
            set.insert(device);
        } else {
            set.remove(&device);
        }
    }

    /// Writers opened from now on fail once they have written `frames` frames.
    pub fn fail_writes_after(&self, frames: u64) {
        *self.fail_writes_after.lock().unwrap() = Some(frames);
    }

    /// Writers opened from now on block for a long time on every frame after
    /// the first `frames`.
    pub fn stall_writes_after(&self, frames: u64) {
        *self.stall_writes_after.lock().unwrap() = Some(frames);
    }

    pub fn fail_writer_opens(&self, fail: bool) {
        *self.fail_writer_opens.lock().unwrap() = fail;
    }

    /// Every capture open blocks for `delay` before it returns.
    pub fn stall_capture_opens(&self, delay: Duration) {
        *self.stall_capture_opens.lock().unwrap() = Some(delay);
    }

    pub fn writers_opened(&self) -> Vec<PathBuf> {
        self.writers_opened.lock().unwrap().clone()
    }
}

impl MediaBackend for ScriptedBackend {
    fn backend_name(&self) -> &str {
        "scripted"
    }

    fn open_capture(&self, source: &CameraSource) -> Result<Box<dyn FrameCapture>, AppError> {
        let stall = *self.stall_capture_opens.lock().unwrap();
        if let Some(delay) = stall {
            std::thread::sleep(delay);
        }
        match source {
            CameraSource::DeviceIndex(index) if !self.unreachable.lock().unwrap().contains(index) => {
                Ok(Box::new(ScriptedCapture { device: *index as u8 }))
            }
            other => Err(AppError::Device(format!("cannot open {}", other))),
        }
    }

    fn open_writer(&self, path: &Path, _spec: &WriterSpec) -> Result<Box<dyn VideoSink>, AppError> {
        if *self.fail_writer_opens.lock().unwrap() {
            return Err(AppError::Media(format!("codec unavailable for {}", path.display())));
        }
        let file = File::create(path)?;
        self.writers_opened.lock().unwrap().push(path.to_path_buf());
        Ok(Box::new(ScriptedSink {
            file,
            frames: 0,
            fail_after: *self.fail_writes_after.lock().unwrap(),
            stall_after: *self.stall_writes_after.lock().unwrap(),
        }))
    }

    fn new_decoder(&self) -> Result<Box<dyn CodeDecoder>, AppError> {
        Ok(Box::new(ScriptedDecoder { labels: self.labels.clone() }))
    }
}

struct ScriptedCapture {
    device: u8,
}

impl FrameCapture for ScriptedCapture {
    fn read_frame(&mut self) -> Result<Frame, AppError> {
        std::thread::sleep(Duration::from_millis(5));
        Ok(solid_frame(self.device))
    }
}

struct ScriptedSink {
    file: File,
    frames: u64,
    fail_after: Option<u64>,
    stall_after: Option<u64>,
}

impl VideoSink for ScriptedSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), AppError> {
        if self.fail_after.is_some_and(|limit| self.frames >= limit) {
            return Err(AppError::Media("disk full".into()));
        }
        if self.stall_after.is_some_and(|limit| self.frames >= limit) {
            std::thread::sleep(Duration::from_secs(10));
        }
        self.file.write_all(&frame.image.as_raw()[..3])?;
        self.frames += 1;
        Ok(())
    }

    fn release(mut self: Box<Self>) -> Result<(), AppError> {
        self.file.flush()?;
        Ok(())
    }
}

struct ScriptedDecoder {
    labels: Arc<Mutex<HashMap<u8, String>>>,
}

impl CodeDecoder for ScriptedDecoder {
    fn decode(&mut self, region: &RgbImage) -> Result<Vec<String>, AppError> {
        let (w, h) = region.dimensions();
        let device = region.get_pixel(w / 2, h / 2)[0];
        Ok(self.labels.lock().unwrap().get(&device).cloned().into_iter().collect())
    }
}

pub fn solid_frame(device: u8) -> Frame {
    Frame::new(RgbImage::from_pixel(FRAME_WIDTH, FRAME_HEIGHT, Rgb([device, 0, 0])))
}

/// Remembers every status transition.
#[derive(Default)]
pub struct RecordingStatusSink {
    events: Mutex<Vec<(String, CameraStatus)>>,
}

impl RecordingStatusSink {
    pub fn texts_for(&self, camera_id: &str) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == camera_id)
            .map(|(_, status)| status.to_string())
            .collect()
    }

    pub fn saw(&self, camera_id: &str, text: &str) -> bool {
        self.texts_for(camera_id).iter().any(|t| t == text)
    }
}

impl StatusSink for RecordingStatusSink {
    fn on_status_changed(&self, camera_id: &str, _camera_name: &str, status: &CameraStatus) {
        self.events.lock().unwrap().push((camera_id.to_string(), status.clone()));
    }
}

#[derive(Default)]
pub struct RecordingCuePlayer {
    cues: Mutex<Vec<Cue>>,
}

impl RecordingCuePlayer {
    pub fn played(&self) -> Vec<Cue> {
        self.cues.lock().unwrap().clone()
    }
}

impl CuePlayer for RecordingCuePlayer {
    fn play(&self, cue: Cue) {
        self.cues.lock().unwrap().push(cue);
    }
}

/// Fast settings rooted in `dir`.
pub fn test_settings(dir: &Path) -> ApplicationConfig {
    ApplicationConfig {
        output_directory: dir.join("Video").to_string_lossy().into_owned(),
        metadata_directory: dir.join("Metadata").to_string_lossy().into_owned(),
        fps: 50.0,
        scan_rate_hz: 25.0,
        detection_cooldown_secs: 0.2,
        reconnect_backoff_secs: 0.1,
        reconnect_backoff_max_secs: 0.1,
        writer_join_timeout_secs: 1.0,
        shutdown_join_timeout_secs: 2.0,
        ..ApplicationConfig::default()
    }
}

/// A two-camera configuration on scripted devices 1 and 2.
pub fn test_config(dir: &Path) -> MasterConfig {
    let yaml = format!(
        r#"
application:
  output_directory: "{video}"
  metadata_directory: "{meta}"
  fps: 50
  scan_rate_hz: 25
  detection_cooldown_secs: 2
  reconnect_backoff_secs: 0.1
  reconnect_backoff_max_secs: 0.1
  writer_join_timeout_secs: 1
  shutdown_join_timeout_secs: 2
cameras:
  - id: 1
    name: Bench
    source: 1
  - id: 2
    name: Dock
    source: 2
"#,
        video = dir.join("Video").display(),
        meta = dir.join("Metadata").display(),
    );
    parse_config(&yaml).unwrap()
}

pub struct Harness {
    pub backend: Arc<ScriptedBackend>,
    pub status: Arc<RecordingStatusSink>,
    pub cues: Arc<RecordingCuePlayer>,
    pub shutdown: ShutdownSignal,
    pub coordinator: RecordingCoordinator,
}

impl Harness {
    pub fn new(settings: ApplicationConfig) -> Self {
        let backend = ScriptedBackend::new();
        let status = Arc::new(RecordingStatusSink::default());
        let cues = Arc::new(RecordingCuePlayer::default());
        let shutdown = ShutdownSignal::new();
        let coordinator = RecordingCoordinator::new(
            settings,
            backend.clone(),
            status.clone(),
            cues.clone(),
            shutdown.clone(),
        );
        coordinator.layout().ensure_directories().unwrap();
        Harness { backend, status, cues, shutdown, coordinator }
    }
}

/// A camera handle with a frame already published.
pub fn live_camera(id: &str, name: &str, device: u32) -> Arc<CameraHandle> {
    let camera = Arc::new(CameraHandle::new(CameraConfig {
        id: id.to_string(),
        name: name.to_string(),
        source: CameraSource::DeviceIndex(device),
    }));
    camera.frames().publish(solid_frame(device as u8));
    camera
}

pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}

pub async fn wait_until_async(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
