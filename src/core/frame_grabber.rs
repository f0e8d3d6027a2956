use crate::camera::camera_entity::CameraHandle;
use crate::common::shutdown::ShutdownSignal;
use crate::core::capture_source::FrameCapture;
use log::{debug, info, warn};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

/// Why a grabber thread stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrabberExit {
    /// Shutdown was signalled or the camera was retired.
    Stopped { frames: u64 },
    /// The device stopped delivering frames and must be reopened.
    ReadFailed { frames: u64, reason: String },
}

impl GrabberExit {
    pub fn frames(&self) -> u64 {
        match self {
            GrabberExit::Stopped { frames } | GrabberExit::ReadFailed { frames, .. } => *frames,
        }
    }
}

/// Spawns the dedicated reader for one opened device. Each decoded frame
/// replaces the camera's latest frame. The device is released when the
/// thread returns.
pub fn spawn_grabber(
    camera: Arc<CameraHandle>,
    mut capture: Box<dyn FrameCapture>,
    shutdown: ShutdownSignal,
) -> std::io::Result<JoinHandle<GrabberExit>> {
    let thread_name = format!("grab-{}", camera.id());
    std::thread::Builder::new().name(thread_name).spawn(move || {
        let started = Instant::now();
        let mut frames = 0u64;
        debug!("📷 [{}] Frame grabber started.", camera.name());

        let exit = loop {
            if !shutdown.is_running() || camera.is_retired() {
                break GrabberExit::Stopped { frames };
            }
            match capture.read_frame() {
                Ok(frame) => {
                    camera.frames().publish(frame);
                    frames += 1;
                }
                Err(e) => {
                    warn!("🚫 [{}] Frame read failed after {} frames: {}", camera.name(), frames, e);
                    break GrabberExit::ReadFailed { frames, reason: e.to_string() };
                }
            }
        };

        drop(capture);
        info!("📷 [{}] Frame grabber exited after {:?} ({} frames).", camera.name(), started.elapsed(), frames);
        exit
    })
}
