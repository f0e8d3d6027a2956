use crate::camera::frame_slot::FrameSlot;
use crate::camera_config::CameraConfig;
use crate::core::capture_source::Frame;
use crate::core::recording::RecordingSession;
use log::info;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// An order code seen at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub order_code: String,
    pub at: Instant,
}

impl Detection {
    fn matches_within(&self, order_code: &str, window: Duration, now: Instant) -> bool {
        self.order_code == order_code && now.saturating_duration_since(self.at) < window
    }
}

#[derive(Debug, Default)]
struct DetectionMemory {
    last_detection: Option<Detection>,
    last_duplicate_warning: Option<Detection>,
}

/// Runtime state of one configured camera. Shared between its control loop,
/// frame grabber, recording writer and the orchestrator.
#[derive(Debug)]
pub struct CameraHandle {
    pub config: CameraConfig,
    state: Mutex<ConnectionState>,
    frames: FrameSlot,
    recording: Mutex<Option<RecordingSession>>,
    detections: Mutex<DetectionMemory>,
    status_reset_at: Mutex<Option<Instant>>,
    retired: AtomicBool,
}

impl CameraHandle {
    pub fn new(config: CameraConfig) -> Self {
        CameraHandle {
            config,
            state: Mutex::new(ConnectionState::Disconnected),
            frames: FrameSlot::new(),
            recording: Mutex::new(None),
            detections: Mutex::new(DetectionMemory::default()),
            status_reset_at: Mutex::new(None),
            retired: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn connection_state(&self) -> ConnectionState {
        *lock(&self.state)
    }

    pub fn update_state(&self, new_state: ConnectionState) {
        let mut state = lock(&self.state);
        if *state != new_state {
            info!("Camera '{}' state changed from {:?} to {:?}", self.config.name, *state, new_state);
            *state = new_state;
        }
    }

    pub fn frames(&self) -> &FrameSlot {
        &self.frames
    }

    pub fn latest_frame(&self) -> Option<Arc<Frame>> {
        self.frames.latest()
    }

    pub fn is_recording(&self) -> bool {
        lock(&self.recording).is_some()
    }

    pub fn recording_order_code(&self) -> Option<String> {
        lock(&self.recording).as_ref().map(|s| s.order_code.clone())
    }

    pub(crate) fn session(&self) -> MutexGuard<'_, Option<RecordingSession>> {
        lock(&self.recording)
    }

    pub fn last_detection(&self) -> Option<Detection> {
        lock(&self.detections).last_detection.clone()
    }

    /// True when the same code was already handled inside `window`.
    pub fn is_within_cooldown(&self, order_code: &str, window: Duration, now: Instant) -> bool {
        lock(&self.detections)
            .last_detection
            .as_ref()
            .is_some_and(|d| d.matches_within(order_code, window, now))
    }

    pub fn remember_detection(&self, order_code: &str, now: Instant) {
        lock(&self.detections).last_detection = Some(Detection { order_code: order_code.to_string(), at: now });
    }

    /// Records a duplicate-order warning unless one for the same code was
    /// already given inside `interval`. Returns whether to warn.
    pub fn should_warn_duplicate(&self, order_code: &str, interval: Duration, now: Instant) -> bool {
        let mut memory = lock(&self.detections);
        if memory
            .last_duplicate_warning
            .as_ref()
            .is_some_and(|d| d.matches_within(order_code, interval, now))
        {
            return false;
        }
        memory.last_duplicate_warning = Some(Detection { order_code: order_code.to_string(), at: now });
        true
    }

    pub fn schedule_status_reset(&self, after: Duration) {
        *lock(&self.status_reset_at) = Some(Instant::now() + after);
    }

    pub fn cancel_status_reset(&self) {
        *lock(&self.status_reset_at) = None;
    }

    /// Consumes a pending status reset whose deadline has passed.
    pub fn take_due_status_reset(&self, now: Instant) -> bool {
        let mut pending = lock(&self.status_reset_at);
        match *pending {
            Some(deadline) if deadline <= now => {
                *pending = None;
                true
            }
            _ => false,
        }
    }

    /// Marks the handle as belonging to a replaced configuration.
    pub fn retire(&self) {
        self.retired.store(true, Ordering::SeqCst);
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
