use anyhow::{Context, Result};
use log::{error, info, warn};
use packcam::camera::camera_media;
use packcam::config_loader::{self, MasterConfig};
use packcam::core::orchestrator::Orchestrator;
use packcam::core::retention::RetentionReport;
use packcam::core::status::{LogCuePlayer, LogStatusSink};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

/// Runs the engine until Ctrl-C. On unix, SIGHUP re-reads `config_path`
/// and rebuilds the cameras; an invalid file keeps the running setup.
pub async fn handle_run_cli(master_config: MasterConfig, config_path: &str) -> Result<()> {
    let run_start = Instant::now();
    let backend = camera_media::default_backend().context("Cannot start the recording engine")?;
    let mut orchestrator = Orchestrator::new(
        master_config,
        backend,
        Arc::new(LogStatusSink),
        Arc::new(LogCuePlayer),
    )?;

    let (report_tx, mut report_rx) = mpsc::unbounded_channel::<RetentionReport>();
    let report_logger = tokio::spawn(async move {
        while let Some(report) = report_rx.recv().await {
            if report.deleted_count > 0 {
                info!(
                    "🧹 [CLEANUP] Deleted {} old file(s), freed {:.2} MB.",
                    report.deleted_count, report.freed_bytes_mb
                );
            }
        }
    });

    orchestrator.start(Some(report_tx))?;
    info!("🎥 Recording engine running. Press Ctrl-C to stop.");

    let mut hangups = HangupListener::new();
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    error!("❌ Failed to listen for Ctrl-C: {}. Shutting down.", e);
                }
                info!("🛑 Ctrl-C received.");
                break;
            }
            _ = hangups.recv() => {
                info!("🔄 SIGHUP received, reloading '{}'.", config_path);
                match config_loader::load_config(config_path) {
                    Ok(new_config) => {
                        if let Err(e) = orchestrator.reload(new_config).await {
                            error!("❌ Reload failed: {:#}", e);
                        }
                    }
                    Err(e) => warn!("⚠️ Keeping current configuration, new one is invalid: {:#}", e),
                }
            }
        }
    }

    orchestrator.shutdown().await;
    drop(orchestrator);
    if let Err(e) = report_logger.await {
        warn!("Retention report logger ended abnormally: {}", e);
    }
    info!("🏁 Engine ran for {:?}.", run_start.elapsed());
    Ok(())
}

struct HangupListener {
    #[cfg(unix)]
    signal: Option<tokio::signal::unix::Signal>,
}

impl HangupListener {
    #[cfg(unix)]
    fn new() -> Self {
        use tokio::signal::unix::{signal, SignalKind};
        let signal = match signal(SignalKind::hangup()) {
            Ok(s) => Some(s),
            Err(e) => {
                warn!("⚠️ SIGHUP reload unavailable: {}", e);
                None
            }
        };
        HangupListener { signal }
    }

    #[cfg(not(unix))]
    fn new() -> Self {
        HangupListener {}
    }

    async fn recv(&mut self) {
        #[cfg(unix)]
        if let Some(signal) = self.signal.as_mut() {
            if signal.recv().await.is_some() {
                return;
            }
            self.signal = None;
        }
        std::future::pending::<()>().await
    }
}
