//! Per-camera recording state machine and the process-wide coordination lock
//! that keeps an order code on at most one camera at a time.
//!
//! A camera is either idle or recording one order code. Detection events
//! drive it through cooldown suppression, stop-on-rescan, cross-camera
//! conflict rejection, duplicate-artifact rejection, switching and starting.
//! The global lock guards only the order-code reservations; device, codec
//! and disk work always happens outside it. Reservations are keyed by the
//! sanitized code, i.e. by the artifact they will produce.

use crate::app_config::ApplicationConfig;
use crate::camera::camera_entity::CameraHandle;
use crate::common::file_utils;
use crate::common::shutdown::ShutdownSignal;
use crate::common::thread_utils::{join_with_timeout, JoinOutcome};
use crate::core::capture_source::{MediaBackend, WriterSpec};
use crate::core::persistence::{self, ArtifactLayout, SessionSummary, VideoRecord};
use crate::core::recording_writer::{spawn_writer, WriterReport};
use crate::core::status::{CameraStatus, Cue, CuePlayer, StatusSink};
use chrono::{DateTime, Local};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;

const SAVED_STATUS_HOLD: Duration = Duration::from_millis(1500);
const REJECTION_STATUS_HOLD: Duration = Duration::from_secs(2);

/// The recording a camera currently owns.
#[derive(Debug)]
pub struct RecordingSession {
    pub order_code: String,
    pub file_name: String,
    pub output_file: PathBuf,
    pub started_at: DateTime<Local>,
    started_instant: Instant,
    active: Arc<AtomicBool>,
    writer: Option<JoinHandle<WriterReport>>,
}

impl RecordingSession {
    /// False once the writer has stopped on its own (write failure) or was told to.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn elapsed(&self) -> Duration {
        self.started_instant.elapsed()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Rescan,
    Switch,
    Manual,
    WriteFailure,
    MaxDuration,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartError {
    #[error("order {order_code} is being recorded by {other_camera}")]
    Busy { order_code: String, other_camera: String },
    #[error("order {0} already has a saved video")]
    Duplicate(String),
    #[error("camera is already recording {0}")]
    AlreadyRecording(String),
    #[error("no frame from camera")]
    NoFrame,
    #[error("cannot open video writer: {0}")]
    Writer(String),
    #[error("shutting down")]
    ShuttingDown,
}

/// Result of feeding one detection event to a camera.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionOutcome {
    /// Same code again inside the cooldown window; nothing changed.
    Suppressed,
    /// The recorded label was scanned again and the session was saved.
    Finished(Option<VideoRecord>),
    Busy { other_camera: String },
    Duplicate,
    /// A new session started, possibly after saving the previous one.
    Started { replaced: Option<VideoRecord> },
    StartFailed { replaced: Option<VideoRecord>, reason: String },
}

#[derive(Debug, Clone)]
struct Reservation {
    camera_id: String,
    camera_name: String,
}

pub struct RecordingCoordinator {
    // sanitized order code -> camera holding it. This is the global lock.
    reservations: Mutex<HashMap<String, Reservation>>,
    layout: ArtifactLayout,
    settings: ApplicationConfig,
    backend: Arc<dyn MediaBackend>,
    status: Arc<dyn StatusSink>,
    cues: Arc<dyn CuePlayer>,
    shutdown: ShutdownSignal,
}

impl RecordingCoordinator {
    pub fn new(
        settings: ApplicationConfig,
        backend: Arc<dyn MediaBackend>,
        status: Arc<dyn StatusSink>,
        cues: Arc<dyn CuePlayer>,
        shutdown: ShutdownSignal,
    ) -> Self {
        RecordingCoordinator {
            reservations: Mutex::new(HashMap::new()),
            layout: ArtifactLayout::from_config(&settings),
            settings,
            backend,
            status,
            cues,
            shutdown,
        }
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// Name of the camera holding `order_code`, if any.
    pub fn holder_of(&self, order_code: &str) -> Option<String> {
        self.reservations().get(&reservation_key(order_code)).map(|r| r.camera_name.clone())
    }

    /// `(order code, camera id)` for every reserved order.
    pub fn active_orders(&self) -> Vec<(String, String)> {
        let mut orders: Vec<_> = self
            .reservations()
            .iter()
            .map(|(code, r)| (code.clone(), r.camera_id.clone()))
            .collect();
        orders.sort();
        orders
    }

    /// Applies one detection event to `camera`.
    pub fn handle_detection(&self, camera: &Arc<CameraHandle>, order_code: &str) -> DetectionOutcome {
        let now = Instant::now();
        if camera.is_within_cooldown(order_code, self.settings.detection_cooldown(), now) {
            debug!("[CAM {}] Ignoring repeat scan of '{}' (cooldown).", camera.name(), order_code);
            return DetectionOutcome::Suppressed;
        }
        camera.remember_detection(order_code, now);

        let current = camera.recording_order_code();
        if current.as_deref() == Some(order_code) {
            info!("🔁 [CAM {}] Rescanned '{}'. Stopping recording.", camera.name(), order_code);
            return DetectionOutcome::Finished(self.stop_recording(camera, StopReason::Rescan));
        }

        if let Some(other_camera) = self.holder_elsewhere(order_code, camera.id()) {
            self.reject_busy(camera, order_code, &other_camera);
            return DetectionOutcome::Busy { other_camera };
        }

        // A switch always saves the current session; an already-recorded new
        // code is then rejected by the start.
        let replaced = match current {
            Some(previous) => {
                info!("🔀 [CAM {}] Switching from '{}' to '{}'.", camera.name(), previous, order_code);
                self.stop_recording(camera, StopReason::Switch)
            }
            None => None,
        };

        match self.start_recording(camera, order_code) {
            Ok(()) => DetectionOutcome::Started { replaced },
            Err(StartError::Busy { other_camera, .. }) if replaced.is_none() => DetectionOutcome::Busy { other_camera },
            Err(StartError::Duplicate(_)) if replaced.is_none() => DetectionOutcome::Duplicate,
            Err(e) => DetectionOutcome::StartFailed { replaced, reason: e.to_string() },
        }
    }

    /// Starts a session for `order_code` on an idle camera.
    pub fn start_recording(&self, camera: &Arc<CameraHandle>, order_code: &str) -> Result<(), StartError> {
        if !self.shutdown.is_running() || camera.is_retired() {
            return Err(StartError::ShuttingDown);
        }
        if let Some(current) = camera.recording_order_code() {
            return Err(StartError::AlreadyRecording(current));
        }
        let Some(frame) = camera.latest_frame() else {
            error!("[CAM {}] Cannot record '{}': no frame available.", camera.name(), order_code);
            self.emit_transient(camera, CameraStatus::Error { reason: "no frame from camera".into() });
            return Err(StartError::NoFrame);
        };
        let output_file = self.layout.video_path(order_code);
        let key = reservation_key(order_code);

        {
            let mut reservations = self.reservations();
            if let Some(holder) = reservations.get(&key) {
                if holder.camera_id != camera.id() {
                    let other_camera = holder.camera_name.clone();
                    drop(reservations);
                    self.reject_busy(camera, order_code, &other_camera);
                    return Err(StartError::Busy { order_code: order_code.to_string(), other_camera });
                }
            }
            if self.layout.video_exists(order_code) {
                drop(reservations);
                self.reject_duplicate(camera, order_code);
                return Err(StartError::Duplicate(order_code.to_string()));
            }
            reservations.insert(
                key,
                Reservation { camera_id: camera.id().to_string(), camera_name: camera.name().to_string() },
            );
        }

        let dimensions = frame.dimensions();
        let spec = WriterSpec {
            fourcc: self.settings.video_codec.clone(),
            fps: self.settings.fps,
            width: dimensions.0,
            height: dimensions.1,
        };
        let open_result = file_utils::ensure_output_directory(&self.layout.video_dir)
            .and_then(|_| self.backend.open_writer(&output_file, &spec));
        let mut sink = match open_result {
            Ok(sink) => sink,
            Err(e) => return Err(self.abort_start(camera, order_code, &output_file, e.to_string())),
        };
        if let Err(e) = sink.write_frame(&frame) {
            let _ = sink.release();
            return Err(self.abort_start(camera, order_code, &output_file, e.to_string()));
        }

        let active = Arc::new(AtomicBool::new(true));
        let writer = match spawn_writer(
            camera.clone(),
            sink,
            dimensions,
            active.clone(),
            self.shutdown.clone(),
            self.settings.frame_interval(),
        ) {
            Ok(handle) => handle,
            // The sink moved into the failed spawn and was dropped with it.
            Err(e) => return Err(self.abort_start(camera, order_code, &output_file, e.to_string())),
        };

        let file_name = self.layout.video_file_name(order_code);
        *camera.session() = Some(RecordingSession {
            order_code: order_code.to_string(),
            file_name,
            output_file: output_file.clone(),
            started_at: Local::now(),
            started_instant: Instant::now(),
            active,
            writer: Some(writer),
        });

        info!(
            "🎬 [CAM {}] Recording '{}' ({}x{}) to {}",
            camera.name(), order_code, dimensions.0, dimensions.1, output_file.display()
        );
        camera.cancel_status_reset();
        self.emit(camera, CameraStatus::Recording { order_code: order_code.to_string() });
        self.cues.play(Cue::RecordingStarted);
        Ok(())
    }

    /// Closes the camera's session, persists its record and frees the order.
    /// Returns `None` if the camera was idle.
    pub fn stop_recording(&self, camera: &CameraHandle, reason: StopReason) -> Option<VideoRecord> {
        let mut session = {
            let _reservations = self.reservations();
            camera.session().take()?
        };
        let stop_start = Instant::now();
        session.active.store(false, Ordering::SeqCst);

        if let Some(writer) = session.writer.take() {
            match join_with_timeout(writer, self.settings.writer_join_timeout()) {
                JoinOutcome::Finished(report) => {
                    if let Some(err) = &report.write_error {
                        warn!("⚠️ [CAM {}] Session '{}' ended early: {}", camera.name(), session.order_code, err);
                    }
                    debug!("[CAM {}] Writer joined: {:?}", camera.name(), report);
                }
                JoinOutcome::Panicked => {
                    error!("❌ [CAM {}] Writer thread for '{}' panicked.", camera.name(), session.order_code)
                }
                JoinOutcome::TimedOut => warn!(
                    "⚠️ [CAM {}] Writer for '{}' did not stop within {:?}; saving metadata anyway.",
                    camera.name(), session.order_code, self.settings.writer_join_timeout()
                ),
            }
        }

        let ended_at = Local::now();
        let summary = SessionSummary {
            order_code: session.order_code.clone(),
            file_name: session.file_name.clone(),
            camera_id: camera.id().to_string(),
            camera_name: camera.name().to_string(),
            started_at: session.started_at,
        };
        let record = persistence::finalize(&self.layout, &summary, ended_at);

        self.release_reservation(camera, &session.order_code);

        info!(
            "✅ [CAM {}] Saved '{}' ({:.2}s, {:?}) in {:?}.",
            camera.name(), session.order_code, record.duration_seconds, reason, stop_start.elapsed()
        );
        self.emit(camera, CameraStatus::Saved);
        camera.schedule_status_reset(SAVED_STATUS_HOLD);
        match reason {
            StopReason::Rescan => self.cues.play(Cue::RecordingFinished),
            StopReason::Manual => self.cues.play(Cue::RecordingStopped),
            _ => {}
        }
        Some(record)
    }

    /// Ends sessions whose writer died or that ran past the maximum length.
    pub fn service(&self, camera: &CameraHandle) -> Option<VideoRecord> {
        let reason = {
            let session = camera.session();
            let session = session.as_ref()?;
            if !session.is_active() {
                if self.shutdown.is_running() { StopReason::WriteFailure } else { StopReason::Shutdown }
            } else if self
                .settings
                .max_recording_duration()
                .is_some_and(|max| session.elapsed() >= max)
            {
                info!("⏱️ [CAM {}] '{}' reached the maximum recording length.", camera.name(), session.order_code);
                StopReason::MaxDuration
            } else {
                return None;
            }
        };
        self.stop_recording(camera, reason)
    }

    /// Status to show once a transient one has been held long enough:
    /// back to the running session, or `Waiting`.
    pub fn revert_status(&self, camera: &CameraHandle, now: Instant) -> Option<CameraStatus> {
        if !camera.take_due_status_reset(now) {
            return None;
        }
        let status = match camera.recording_order_code() {
            Some(order_code) => CameraStatus::Recording { order_code },
            None => CameraStatus::Waiting,
        };
        self.emit(camera, status.clone());
        Some(status)
    }

    fn holder_elsewhere(&self, order_code: &str, camera_id: &str) -> Option<String> {
        self.reservations()
            .get(&reservation_key(order_code))
            .filter(|r| r.camera_id != camera_id)
            .map(|r| r.camera_name.clone())
    }

    fn reject_busy(&self, camera: &CameraHandle, order_code: &str, other_camera: &str) {
        warn!("🚫 [CAM {}] Order '{}' is already being recorded by {}.", camera.name(), order_code, other_camera);
        self.emit_transient(
            camera,
            CameraStatus::Busy { order_code: order_code.to_string(), other_camera: other_camera.to_string() },
        );
    }

    fn reject_duplicate(&self, camera: &CameraHandle, order_code: &str) {
        if camera.should_warn_duplicate(order_code, self.settings.duplicate_warning_interval(), Instant::now()) {
            warn!("🚫 [CAM {}] Order '{}' already has a saved video.", camera.name(), order_code);
            self.emit_transient(camera, CameraStatus::DuplicateOrder { order_code: order_code.to_string() });
            self.cues.play(Cue::DuplicateOrder);
        } else {
            debug!("[CAM {}] Duplicate order '{}' already reported.", camera.name(), order_code);
        }
    }

    fn abort_start(&self, camera: &CameraHandle, order_code: &str, output_file: &std::path::Path, reason: String) -> StartError {
        error!("❌ [CAM {}] Could not start recording '{}': {}", camera.name(), order_code, reason);
        self.release_reservation(camera, order_code);
        if output_file.exists() {
            if let Err(e) = std::fs::remove_file(output_file) {
                warn!("Failed to delete partial file {}: {}", output_file.display(), e);
            }
        }
        self.emit_transient(camera, CameraStatus::Error { reason: "cannot create video file".into() });
        StartError::Writer(reason)
    }

    fn emit(&self, camera: &CameraHandle, status: CameraStatus) {
        self.status.on_status_changed(camera.id(), camera.name(), &status);
    }

    fn release_reservation(&self, camera: &CameraHandle, order_code: &str) {
        let key = reservation_key(order_code);
        let mut reservations = self.reservations();
        if reservations.get(&key).is_some_and(|r| r.camera_id == camera.id()) {
            reservations.remove(&key);
        }
    }

    /// Emits a status that `revert_status` replaces after a short hold.
    fn emit_transient(&self, camera: &CameraHandle, status: CameraStatus) {
        self.emit(camera, status);
        camera.schedule_status_reset(REJECTION_STATUS_HOLD);
    }

    fn reservations(&self) -> MutexGuard<'_, HashMap<String, Reservation>> {
        self.reservations.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn reservation_key(order_code: &str) -> String {
    file_utils::sanitize_order_code(order_code)
}
