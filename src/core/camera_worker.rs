use crate::app_config::ApplicationConfig;
use crate::camera::camera_entity::CameraHandle;
use crate::common::shutdown::ShutdownSignal;
use crate::core::capture_source::MediaBackend;
use crate::core::code_scanner::CodeScanner;
use crate::core::connection::{Backoff, ConnectionManager};
use crate::core::recording::RecordingCoordinator;
use crate::core::status::StatusSink;
use crate::errors::AppError;
use log::{debug, info};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// The control loop of one camera: keep it connected, close sessions that
/// need closing, revert transient statuses and feed scanned codes to the
/// recording state machine.
pub struct CameraWorker {
    camera: Arc<CameraHandle>,
    connection: ConnectionManager,
    scanner: CodeScanner,
    coordinator: Arc<RecordingCoordinator>,
    shutdown: ShutdownSignal,
    frame_interval: Duration,
    release_timeout: Duration,
}

impl CameraWorker {
    pub fn new(
        camera: Arc<CameraHandle>,
        settings: &ApplicationConfig,
        backend: Arc<dyn MediaBackend>,
        coordinator: Arc<RecordingCoordinator>,
        status: Arc<dyn StatusSink>,
        shutdown: ShutdownSignal,
    ) -> Result<Self, AppError> {
        let decoder = backend.new_decoder()?;
        let connection = ConnectionManager::new(
            camera.clone(),
            backend,
            status,
            shutdown.clone(),
            Backoff::new(settings.reconnect_backoff(), settings.reconnect_backoff_max()),
        );
        Ok(CameraWorker {
            camera,
            connection,
            scanner: CodeScanner::new(decoder, settings.roi_fraction, settings.scan_interval_ticks()),
            coordinator,
            shutdown,
            frame_interval: settings.frame_interval(),
            release_timeout: settings.shutdown_join_timeout(),
        })
    }

    /// Runs the loop on its own named thread. A device open can block for as
    /// long as the driver likes, so the loop never lives on the async runtime.
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        let thread_name = format!("cam-{}", self.camera.id());
        std::thread::Builder::new().name(thread_name).spawn(move || self.run())
    }

    /// Blocks until shutdown or until the camera is retired.
    pub fn run(mut self) {
        let loop_start = Instant::now();
        let mut ticks = 0u64;
        info!("▶️ [CAM {}] Control loop started.", self.camera.name());

        while self.shutdown.is_running() && !self.camera.is_retired() {
            let tick_start = Instant::now();
            self.coordinator.service(&self.camera);

            if !self.connection.ensure_connected() {
                self.scanner.reset();
                continue;
            }
            ticks += 1;

            self.coordinator.revert_status(&self.camera, tick_start);

            let frame = self.camera.latest_frame();
            if let Some(order_code) = self.scanner.on_tick(frame.as_deref()) {
                debug!("🔎 [CAM {}] Detected '{}'.", self.camera.name(), order_code);
                let outcome = self.coordinator.handle_detection(&self.camera, &order_code);
                debug!("[CAM {}] Detection outcome: {:?}", self.camera.name(), outcome);
            }

            if let Some(rest) = self.frame_interval.checked_sub(tick_start.elapsed()) {
                self.shutdown.sleep(rest);
            }
        }

        self.connection.disconnect(self.release_timeout);
        info!(
            "⏹️ [CAM {}] Control loop exited after {:?} ({} ticks).",
            self.camera.name(), loop_start.elapsed(), ticks
        );
    }
}
