use crate::camera::camera_entity::CameraHandle;
use crate::common::shutdown::ShutdownSignal;
use crate::core::capture_source::VideoSink;
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// How a writer worker ended.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WriterReport {
    pub frames_written: u64,
    pub frames_skipped: u64,
    /// First write error, if the session ended because of one.
    pub write_error: Option<String>,
    pub release_error: Option<String>,
}

/// Spawns the per-session writer thread. It copies the camera's latest frame
/// at `frame_interval` and encodes it outside the frame lock, until `active`
/// is cleared, shutdown is signalled, or a write fails. The sink is always
/// released before the thread returns.
pub fn spawn_writer(
    camera: Arc<CameraHandle>,
    mut sink: Box<dyn VideoSink>,
    dimensions: (u32, u32),
    active: Arc<AtomicBool>,
    shutdown: ShutdownSignal,
    frame_interval: Duration,
) -> std::io::Result<JoinHandle<WriterReport>> {
    let thread_name = format!("rec-{}", camera.id());
    std::thread::Builder::new().name(thread_name).spawn(move || {
        let started = Instant::now();
        let mut report = WriterReport::default();
        debug!("✍️ [{}] Writer thread started.", camera.name());

        while active.load(Ordering::SeqCst) && shutdown.is_running() {
            let tick = Instant::now();
            if let Some(frame) = camera.latest_frame() {
                if frame.dimensions() != dimensions {
                    // The writer was opened for a fixed size; mismatched frames would corrupt it.
                    report.frames_skipped += 1;
                } else if let Err(e) = sink.write_frame(&frame) {
                    error!("❌ [{}] Frame write failed, ending session: {}", camera.name(), e);
                    report.write_error = Some(e.to_string());
                    break;
                } else {
                    report.frames_written += 1;
                }
            }
            if let Some(rest) = frame_interval.checked_sub(tick.elapsed()) {
                std::thread::sleep(rest);
            }
        }
        active.store(false, Ordering::SeqCst);

        if let Err(e) = sink.release() {
            warn!("⚠️ [{}] Releasing video writer failed: {}", camera.name(), e);
            report.release_error = Some(e.to_string());
        }
        info!(
            "🏁 [{}] Writer thread finished after {:?}: {} frames written, {} skipped.",
            camera.name(), started.elapsed(), report.frames_written, report.frames_skipped
        );
        report
    })
}
