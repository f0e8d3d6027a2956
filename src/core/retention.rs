//! Age-based cleanup of recorded videos and their metadata.

use crate::common::shutdown::ShutdownSignal;
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetentionReport {
    pub deleted_count: usize,
    pub freed_bytes: u64,
    pub freed_bytes_mb: f64,
}

impl RetentionReport {
    fn record_deletion(&mut self, size: u64) {
        self.deleted_count += 1;
        self.freed_bytes += size;
        self.freed_bytes_mb = self.freed_bytes as f64 / BYTES_PER_MB;
    }
}

/// Deletes regular files in `dirs` whose age (`now - mtime`) is strictly
/// greater than `window`. Missing directories and per-file failures are
/// logged and skipped.
pub fn sweep_directories(dirs: &[PathBuf], window: Duration, now: SystemTime) -> RetentionReport {
    let sweep_start = Instant::now();
    let mut report = RetentionReport::default();
    for dir in dirs {
        sweep_directory(dir, window, now, &mut report);
    }
    info!(
        "🧹 Retention sweep deleted {} file(s), freed {:.2} MB in {:?}.",
        report.deleted_count, report.freed_bytes_mb, sweep_start.elapsed()
    );
    report
}

fn sweep_directory(dir: &Path, window: Duration, now: SystemTime, report: &mut RetentionReport) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("⚠️ Retention: cannot read {}: {}", dir.display(), e);
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let metadata = match entry.metadata() {
            Ok(m) if m.is_file() => m,
            Ok(_) => continue,
            Err(e) => {
                warn!("⚠️ Retention: cannot stat {}: {}", path.display(), e);
                continue;
            }
        };
        let Ok(modified) = metadata.modified() else {
            continue;
        };
        // Files stamped in the future have age zero.
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
        if age <= window {
            continue;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!("🗑️ Deleted {} (age {:?})", path.display(), age);
                report.record_deletion(metadata.len());
            }
            Err(e) => error!("❌ Retention: failed to delete {}: {}", path.display(), e),
        }
    }
}

/// Runs a sweep immediately and then every `interval` until shutdown,
/// publishing each report on `reports` when given.
pub fn spawn_sweeper(
    dirs: Vec<PathBuf>,
    window: Duration,
    interval: Duration,
    shutdown: ShutdownSignal,
    reports: Option<UnboundedSender<RetentionReport>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("🧹 Retention sweeper started (window {:?}, every {:?}).", window, interval);
        let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.triggered() => break,
            }
            let sweep_dirs = dirs.clone();
            let report = match tokio::task::spawn_blocking(move || {
                sweep_directories(&sweep_dirs, window, SystemTime::now())
            })
            .await
            {
                Ok(report) => report,
                Err(e) => {
                    error!("❌ Retention sweep task failed: {}", e);
                    continue;
                }
            };
            if let Some(tx) = &reports {
                if tx.send(report).is_err() {
                    debug!("Retention report receiver dropped.");
                }
            }
        }
        info!("🧹 Retention sweeper stopped.");
    })
}
