//! Keeps one camera's capture device open, reopening it with backoff when
//! it disappears.

use crate::camera::camera_entity::{CameraHandle, ConnectionState};
use crate::common::shutdown::ShutdownSignal;
use crate::common::thread_utils::{join_with_timeout, JoinOutcome};
use crate::core::capture_source::MediaBackend;
use crate::core::frame_grabber::{spawn_grabber, GrabberExit};
use crate::core::status::{CameraStatus, StatusSink};
use crate::errors::AppError;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Reconnect delay. Doubles after every failed attempt up to `max`; with
/// `max == base` it is a fixed delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Backoff { base, max: max.max(base), current: base }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.base;
    }
}

pub struct ConnectionManager {
    camera: Arc<CameraHandle>,
    backend: Arc<dyn MediaBackend>,
    status: Arc<dyn StatusSink>,
    shutdown: ShutdownSignal,
    backoff: Backoff,
    grabber: Option<JoinHandle<GrabberExit>>,
    attempts: u64,
}

impl ConnectionManager {
    pub fn new(
        camera: Arc<CameraHandle>,
        backend: Arc<dyn MediaBackend>,
        status: Arc<dyn StatusSink>,
        shutdown: ShutdownSignal,
        backoff: Backoff,
    ) -> Self {
        ConnectionManager { camera, backend, status, shutdown, backoff, grabber: None, attempts: 0 }
    }

    /// Returns `true` when a grabber is running for the camera. Otherwise
    /// makes one connection attempt; a failed attempt sleeps the backoff delay
    /// (woken early by shutdown) before returning `false`.
    pub fn ensure_connected(&mut self) -> bool {
        if self.grabber.as_ref().is_some_and(|g| !g.is_finished()) {
            return true;
        }
        if let Some(finished) = self.grabber.take() {
            self.reap(finished);
        }
        if !self.shutdown.is_running() || self.camera.is_retired() {
            return false;
        }

        self.attempts += 1;
        let attempt_start = Instant::now();
        self.camera.update_state(ConnectionState::Connecting);
        self.emit(CameraStatus::Connecting);
        debug!(
            "🔌 [CAM {}] Opening {} (attempt {}) via {}",
            self.camera.name(), self.camera.config.source, self.attempts, self.backend.backend_name()
        );

        match self.open_and_spawn() {
            Ok(grabber) => {
                self.grabber = Some(grabber);
                self.backoff.reset();
                self.camera.update_state(ConnectionState::Connected);
                info!("✅ [CAM {}] Connected in {:?}.", self.camera.name(), attempt_start.elapsed());
                self.emit(CameraStatus::Connected);
                if !self.camera.is_recording() {
                    self.emit(CameraStatus::Waiting);
                }
                true
            }
            Err(e) => {
                self.camera.update_state(ConnectionState::Disconnected);
                self.emit(CameraStatus::ConnectionError);
                let delay = self.backoff.next_delay();
                error!("❌ [CAM {}] Connection failed: {}. Retrying in {:?}.", self.camera.name(), e, delay);
                self.shutdown.sleep(delay);
                false
            }
        }
    }

    /// Waits (bounded) for the grabber to exit and marks the camera
    /// disconnected. The grabber only exits once shutdown is signalled, the
    /// camera is retired, or the device fails.
    pub fn disconnect(&mut self, timeout: Duration) {
        if let Some(grabber) = self.grabber.take() {
            match join_with_timeout(grabber, timeout) {
                JoinOutcome::Finished(exit) => debug!("[CAM {}] Grabber joined: {:?}", self.camera.name(), exit),
                JoinOutcome::Panicked => error!("❌ [CAM {}] Frame grabber panicked.", self.camera.name()),
                JoinOutcome::TimedOut => warn!(
                    "⚠️ [CAM {}] Frame grabber still blocked after {:?}; leaving it behind.",
                    self.camera.name(), timeout
                ),
            }
        }
        self.camera.frames().clear();
        self.camera.update_state(ConnectionState::Disconnected);
    }

    fn open_and_spawn(&self) -> Result<JoinHandle<GrabberExit>, AppError> {
        let source = self.camera.config.source.normalized();
        let capture = self.backend.open_capture(&source)?;
        spawn_grabber(self.camera.clone(), capture, self.shutdown.clone())
            .map_err(|e| AppError::Task(format!("cannot spawn frame grabber: {}", e)))
    }

    fn reap(&mut self, finished: JoinHandle<GrabberExit>) {
        // Stale frames must not be mistaken for live ones after a reconnect.
        self.camera.frames().clear();
        self.camera.update_state(ConnectionState::Disconnected);
        match finished.join() {
            Ok(GrabberExit::ReadFailed { frames, reason }) => {
                warn!("🔌 [CAM {}] Lost stream after {} frames ({}).", self.camera.name(), frames, reason);
                self.emit(CameraStatus::ConnectionError);
            }
            Ok(GrabberExit::Stopped { .. }) => {}
            Err(_) => {
                error!("❌ [CAM {}] Frame grabber panicked.", self.camera.name());
                self.emit(CameraStatus::ConnectionError);
            }
        }
    }

    fn emit(&self, status: CameraStatus) {
        self.status.on_status_changed(self.camera.id(), self.camera.name(), &status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_delay_when_max_equals_base() {
        let mut backoff = Backoff::new(Duration::from_secs(5), Duration::from_secs(5));
        assert_eq!(backoff.next_delay(), Duration::from_secs(5));
        assert_eq!(backoff.next_delay(), Duration::from_secs(5));
    }

    #[test]
    fn doubles_up_to_max_and_resets() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(5));
        let delays: Vec<_> = (0..5).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 5, 5]);
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn max_below_base_is_lifted_to_base() {
        let mut backoff = Backoff::new(Duration::from_secs(3), Duration::from_secs(1));
        backoff.next_delay();
        assert_eq!(backoff.next_delay(), Duration::from_secs(3));
    }
}
