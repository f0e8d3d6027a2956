use serde::Deserialize;
use std::fs;
use crate::app_config::{ApplicationConfig, MAX_RETENTION_DAYS};
use crate::camera_config::CameraConfig;
use anyhow::{Result, Context, bail};
use std::collections::HashSet;
use log::{debug, info};
use std::time::Instant;

#[derive(Debug, Deserialize, Clone)] pub struct MasterConfig {
    #[serde(rename = "application", default)]
    pub app_settings: ApplicationConfig,
    pub cameras: Vec<CameraConfig>,
}

pub fn load_config(path: &str) -> Result<MasterConfig> {
    debug!("📄 Attempting to load config from: {}", path);
    let start_time = Instant::now();

    let config_str = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file \'{}\'. 📖", path))?;
    debug!("Read config file in {:?}", start_time.elapsed());

    let config = parse_config(&config_str)
        .with_context(|| format!("Invalid configuration in \'{}\'", path))?;

    info!("✅ Successfully loaded and validated configuration from \'{}\' in {:?}", path, start_time.elapsed());
    Ok(config)
}

/// Parses and validates a YAML document without touching the filesystem.
pub fn parse_config(config_str: &str) -> Result<MasterConfig> {
    let parse_start_time = Instant::now();
    let config: MasterConfig = serde_yaml::from_str(config_str)
        .context("Failed to parse YAML configuration. 💔")?;
    debug!("Parsed YAML in {:?}", parse_start_time.elapsed());

    validate_master_config(&config).context("Master configuration validation failed 👎")?;
    Ok(config)
}

fn validate_master_config(config: &MasterConfig) -> Result<()> {
    debug!("🕵️ Validating master configuration...");
    let validation_start_time = Instant::now();
    let app = &config.app_settings;

    if app.output_directory.trim().is_empty() {
        bail!("❌ Application output_directory cannot be empty.");
    }
    if app.metadata_directory.trim().is_empty() {
        bail!("❌ Application metadata_directory cannot be empty.");
    }
    if app.video_extension.trim().is_empty() {
        bail!("❌ Application video_extension cannot be empty.");
    }
    if app.video_codec.chars().count() != 4 {
        bail!("❌ Application video_codec '{}' must be a 4-character fourcc.", app.video_codec);
    }
    if !(app.fps > 0.0) {
        bail!("❌ Application fps must be positive (got {}).", app.fps);
    }
    if !(app.scan_rate_hz > 0.0) {
        bail!("❌ Application scan_rate_hz must be positive (got {}).", app.scan_rate_hz);
    }
    if !(app.roi_fraction > 0.0 && app.roi_fraction <= 1.0) {
        bail!("❌ Application roi_fraction must be in (0, 1] (got {}).", app.roi_fraction);
    }
    if app.reconnect_backoff_max_secs < app.reconnect_backoff_secs {
        bail!(
            "❌ reconnect_backoff_max_secs ({}) cannot be smaller than reconnect_backoff_secs ({}).",
            app.reconnect_backoff_max_secs, app.reconnect_backoff_secs
        );
    }

    if app.retention_days > MAX_RETENTION_DAYS {
        bail!("❌ Application retention_days must be at most {} (got {}).", MAX_RETENTION_DAYS, app.retention_days);
    }
    if app.retention_sweep_interval_hours > MAX_RETENTION_DAYS * 24 {
        bail!(
            "❌ Application retention_sweep_interval_hours must be at most {} (got {}).",
            MAX_RETENTION_DAYS * 24, app.retention_sweep_interval_hours
        );
    }
    for (field, value) in [
        ("detection_cooldown_secs", app.detection_cooldown_secs),
        ("duplicate_warning_secs", app.duplicate_warning_secs),
        ("reconnect_backoff_secs", app.reconnect_backoff_secs),
        ("writer_join_timeout_secs", app.writer_join_timeout_secs),
        ("shutdown_join_timeout_secs", app.shutdown_join_timeout_secs),
    ] {
        if !value.is_finite() || value < 0.0 {
            bail!("❌ Application {} must be a non-negative number (got {}).", field, value);
        }
    }

    if config.cameras.is_empty() {
        bail!("❌ No cameras defined in the configuration.");
    }

    let mut camera_ids = HashSet::new();
    let mut camera_names = HashSet::new();
    for (idx, camera) in config.cameras.iter().enumerate() {
        debug!("Validating camera #{}: {}", idx + 1, camera.name);
        if camera.id.trim().is_empty() {
            bail!("❌ Camera id cannot be empty for camera #{}.", idx + 1);
        }
        if camera.name.trim().is_empty() {
            bail!("❌ Camera name cannot be empty for camera #{}.", idx + 1);
        }
        if !camera_ids.insert(&camera.id) {
            bail!("❌ Duplicate camera id found: {}", camera.id);
        }
        if !camera_names.insert(&camera.name) {
            bail!("❌ Duplicate camera name found: {}", camera.name);
        }
        if camera.source.is_empty() {
            bail!("❌ Source for camera \'{}\' cannot be empty.", camera.name);
        }
        debug!("Camera \'{}\' validated successfully.", camera.name);
    }
    info!("👍 Master configuration validated successfully in {:?}.", validation_start_time.elapsed());
    Ok(())
}
