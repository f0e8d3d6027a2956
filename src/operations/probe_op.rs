use super::op_helper::select_cameras;
use anyhow::{Context, Result};
use clap::ArgMatches;
use log::{error, info};
use packcam::camera::camera_media;
use packcam::config_loader::MasterConfig;
use packcam::core::camera_manager::CameraManager;
use packcam::core::capture_source::MediaBackend;
use std::sync::Arc;
use std::time::Instant;

struct ProbeResult {
    camera: String,
    success: bool,
    details: String,
}

/// Opens each selected camera, reads one frame and reports its size.
pub async fn handle_probe_cli(master_config: &MasterConfig, args: &ArgMatches) -> Result<()> {
    let probe_start = Instant::now();
    let camera_manager = CameraManager::new(master_config)?;
    let cameras = select_cameras(&camera_manager, args)?;
    let backend = camera_media::default_backend().context("Cannot probe cameras")?;
    info!("🩺 Probing {} camera(s) with the {} backend...", cameras.len(), backend.backend_name());

    let mut tasks = Vec::new();
    for camera in cameras {
        let backend: Arc<dyn MediaBackend> = backend.clone();
        tasks.push(tokio::task::spawn_blocking(move || {
            let attempt_start = Instant::now();
            let label = format!("{} ({})", camera.name(), camera.config.source);
            let outcome = backend
                .open_capture(&camera.config.source.normalized())
                .and_then(|mut capture| capture.read_frame());
            match outcome {
                Ok(frame) => ProbeResult {
                    camera: label,
                    success: true,
                    details: format!("{}x{} frame in {:?}", frame.width(), frame.height(), attempt_start.elapsed()),
                },
                Err(e) => ProbeResult { camera: label, success: false, details: e.to_string() },
            }
        }));
    }

    let mut results = Vec::new();
    for task in futures::future::join_all(tasks).await {
        match task {
            Ok(result) => results.push(result),
            Err(e) => error!("❌ Probe task panicked: {}", e),
        }
    }

    info!("📋 ----- Camera Probe Summary ({:?}) -----", probe_start.elapsed());
    let mut all_ok = true;
    for result in &results {
        let status_emoji = if result.success { "✅ PASS" } else { "❌ FAIL" };
        info!("Camera: {:<40} | Status: {:<10} | Details: {}", result.camera, status_emoji, result.details);
        all_ok &= result.success;
    }
    if !all_ok {
        anyhow::bail!("One or more cameras could not deliver a frame.");
    }
    Ok(())
}
