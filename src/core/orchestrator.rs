//! Owns the cameras, the recording coordinator and the background tasks of a
//! running engine, and takes them down in order.

use crate::camera::camera_entity::CameraHandle;
use crate::common::shutdown::ShutdownSignal;
use crate::common::thread_utils::{join_with_timeout, JoinOutcome};
use crate::config_loader::MasterConfig;
use crate::core::archive::{self, ArchiveEntry};
use crate::core::camera_manager::CameraManager;
use crate::core::camera_worker::CameraWorker;
use crate::core::capture_source::MediaBackend;
use crate::core::persistence::VideoRecord;
use crate::core::recording::{RecordingCoordinator, StopReason};
use crate::core::retention::{spawn_sweeper, RetentionReport};
use crate::core::status::{CuePlayer, StatusSink};
use crate::errors::AppError;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

type WorkerHandle = std::thread::JoinHandle<()>;

/// A session that is currently being written.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveRecording {
    pub camera_id: String,
    pub camera_name: String,
    pub order_code: String,
    pub file_name: String,
    pub started_at: DateTime<Local>,
}

pub struct Orchestrator {
    config: MasterConfig,
    backend: Arc<dyn MediaBackend>,
    status: Arc<dyn StatusSink>,
    cues: Arc<dyn CuePlayer>,
    shutdown: ShutdownSignal,
    cameras: CameraManager,
    coordinator: Arc<RecordingCoordinator>,
    workers: Vec<(String, WorkerHandle)>,
    sweeper: Option<JoinHandle<()>>,
    // Kept so a reload can restart the sweeper with the same receiver.
    retention_reports: Option<UnboundedSender<RetentionReport>>,
}

impl Orchestrator {
    pub fn new(
        config: MasterConfig,
        backend: Arc<dyn MediaBackend>,
        status: Arc<dyn StatusSink>,
        cues: Arc<dyn CuePlayer>,
    ) -> Result<Self> {
        let shutdown = ShutdownSignal::new();
        let cameras = CameraManager::new(&config).context("Failed to initialize CameraManager")?;
        let coordinator = Arc::new(RecordingCoordinator::new(
            config.app_settings.clone(),
            backend.clone(),
            status.clone(),
            cues.clone(),
            shutdown.clone(),
        ));
        Ok(Orchestrator {
            config,
            backend,
            status,
            cues,
            shutdown,
            cameras,
            coordinator,
            workers: Vec::new(),
            sweeper: None,
            retention_reports: None,
        })
    }

    /// Creates the artifact directories, starts the retention sweeper and one
    /// control loop per camera. Must be called inside a tokio runtime.
    pub fn start(&mut self, retention_reports: Option<UnboundedSender<RetentionReport>>) -> Result<()> {
        let start_time = Instant::now();
        self.coordinator
            .layout()
            .ensure_directories()
            .context("Failed to prepare output directories")?;
        self.retention_reports = retention_reports;
        self.start_sweeper();
        self.start_workers();
        info!(
            "🚀 Engine started with {} camera(s) on the {} backend in {:?}.",
            self.cameras.len(), self.backend.backend_name(), start_time.elapsed()
        );
        Ok(())
    }

    pub fn cameras(&self) -> &CameraManager {
        &self.cameras
    }

    pub fn coordinator(&self) -> &Arc<RecordingCoordinator> {
        &self.coordinator
    }

    pub fn config(&self) -> &MasterConfig {
        &self.config
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    pub fn active_recordings(&self) -> Vec<ActiveRecording> {
        self.cameras
            .get_all_cameras()
            .iter()
            .filter_map(|camera| {
                let session = camera.session();
                session.as_ref().map(|s| ActiveRecording {
                    camera_id: camera.id().to_string(),
                    camera_name: camera.name().to_string(),
                    order_code: s.order_code.clone(),
                    file_name: s.file_name.clone(),
                    started_at: s.started_at,
                })
            })
            .collect()
    }

    /// Recorded artifacts, newest first, with sessions still being written flagged.
    pub fn list_archive(&self) -> Result<Vec<ArchiveEntry>, AppError> {
        archive::list_artifacts(self.coordinator.layout(), &self.recording_file_names())
    }

    pub fn find_in_archive(&self, order_code: &str) -> Result<Option<ArchiveEntry>, AppError> {
        archive::find_artifact(self.coordinator.layout(), order_code, &self.recording_file_names())
    }

    /// Operator stop for one camera. Blocks until the writer is joined
    /// (bounded by `writer_join_timeout_secs`).
    pub fn stop_recording(&self, camera_id: &str) -> Result<Option<VideoRecord>, AppError> {
        let camera = self
            .cameras
            .get(camera_id)
            .ok_or_else(|| AppError::NotFound(format!("camera '{}'", camera_id)))?;
        Ok(self.coordinator.stop_recording(&camera, StopReason::Manual))
    }

    pub fn stop_all_recordings(&self) -> Vec<VideoRecord> {
        stop_all(&self.coordinator, &self.cameras.get_all_cameras(), StopReason::Manual)
    }

    /// Graceful shutdown: no new sessions, finalize the active ones, then
    /// join the camera loops and the sweeper with bounded waits.
    pub async fn shutdown(&mut self) {
        let shutdown_start = Instant::now();
        info!("🛑 Shutting down engine...");
        self.shutdown.trigger();

        let saved = self.finalize_sessions(StopReason::Shutdown).await;
        if !saved.is_empty() {
            info!("💾 Finalized {} recording(s) on shutdown.", saved.len());
        }

        let timeout = self.config.app_settings.shutdown_join_timeout();
        self.join_workers(timeout).await;
        // A start that raced the trigger may have slipped in before its loop exited.
        self.finalize_sessions(StopReason::Shutdown).await;

        if let Some(sweeper) = self.sweeper.take() {
            if tokio::time::timeout(timeout, sweeper).await.is_err() {
                warn!("⚠️ Retention sweeper did not stop within {:?}.", timeout);
            }
        }
        info!("🏁 Engine shut down in {:?}.", shutdown_start.elapsed());
    }

    /// Replaces the configuration: active sessions are finalized, the old
    /// camera handles retired and joined, and everything is rebuilt.
    pub async fn reload(&mut self, new_config: MasterConfig) -> Result<()> {
        let reload_start = Instant::now();
        info!("🔄 Reloading configuration ({} camera(s))...", new_config.cameras.len());
        let new_cameras = CameraManager::new(&new_config).context("Failed to initialize CameraManager")?;

        self.cameras.retire_all();
        let saved = self.finalize_sessions(StopReason::Shutdown).await;
        debug!("Finalized {} recording(s) before reload.", saved.len());
        self.join_workers(self.config.app_settings.shutdown_join_timeout()).await;
        self.finalize_sessions(StopReason::Shutdown).await;
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }

        self.coordinator = Arc::new(RecordingCoordinator::new(
            new_config.app_settings.clone(),
            self.backend.clone(),
            self.status.clone(),
            self.cues.clone(),
            self.shutdown.clone(),
        ));
        self.cameras = new_cameras;
        self.config = new_config;
        self.coordinator
            .layout()
            .ensure_directories()
            .context("Failed to prepare output directories")?;

        if self.shutdown.is_running() {
            self.start_sweeper();
            self.start_workers();
        }
        info!("✅ Configuration reloaded in {:?}.", reload_start.elapsed());
        Ok(())
    }

    fn start_workers(&mut self) {
        for camera in self.cameras.get_all_cameras() {
            let worker = match CameraWorker::new(
                camera.clone(),
                &self.config.app_settings,
                self.backend.clone(),
                self.coordinator.clone(),
                self.status.clone(),
                self.shutdown.clone(),
            ) {
                Ok(worker) => worker,
                Err(e) => {
                    error!("❌ [CAM {}] Cannot start control loop: {}", camera.name(), e);
                    continue;
                }
            };
            match worker.spawn() {
                Ok(handle) => self.workers.push((camera.id().to_string(), handle)),
                Err(e) => error!("❌ [CAM {}] Cannot spawn control loop thread: {}", camera.name(), e),
            }
        }
    }

    fn start_sweeper(&mut self) {
        let app = &self.config.app_settings;
        self.sweeper = Some(spawn_sweeper(
            vec![app.output_dir(), app.metadata_dir()],
            app.retention_window(),
            app.retention_sweep_interval(),
            self.shutdown.clone(),
            self.retention_reports.clone(),
        ));
    }

    async fn finalize_sessions(&self, reason: StopReason) -> Vec<VideoRecord> {
        let coordinator = self.coordinator.clone();
        let cameras = self.cameras.get_all_cameras();
        match tokio::task::spawn_blocking(move || stop_all(&coordinator, &cameras, reason)).await {
            Ok(saved) => saved,
            Err(e) => {
                error!("❌ Finalizing recordings failed: {}", e);
                Vec::new()
            }
        }
    }

    fn recording_file_names(&self) -> Vec<String> {
        self.active_recordings().into_iter().map(|r| r.file_name).collect()
    }

    /// Joins every camera loop against one shared deadline. Loops still stuck
    /// (e.g. in a device open) are detached so they cannot hold up exit.
    async fn join_workers(&mut self, timeout: Duration) {
        if self.workers.is_empty() {
            return;
        }
        let workers: Vec<(String, WorkerHandle)> = self.workers.drain(..).collect();
        let joined = tokio::task::spawn_blocking(move || {
            let deadline = Instant::now() + timeout;
            workers
                .into_iter()
                .map(|(id, handle)| {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    (id, join_with_timeout(handle, remaining))
                })
                .collect::<Vec<_>>()
        })
        .await;

        match joined {
            Ok(outcomes) => {
                for (id, outcome) in outcomes {
                    match outcome {
                        JoinOutcome::Finished(()) => debug!("Camera loop '{}' joined.", id),
                        JoinOutcome::Panicked => error!("❌ Camera loop '{}' panicked.", id),
                        JoinOutcome::TimedOut => {
                            warn!("⚠️ Camera loop '{}' did not exit within {:?}; detached.", id, timeout)
                        }
                    }
                }
            }
            Err(e) => error!("❌ Joining camera loops failed: {}", e),
        }
    }
}

fn stop_all(coordinator: &RecordingCoordinator, cameras: &[Arc<CameraHandle>], reason: StopReason) -> Vec<VideoRecord> {
    cameras
        .iter()
        .filter_map(|camera| coordinator.stop_recording(camera, reason))
        .collect()
}
