use anyhow::Result;
use clap::ArgMatches;
use log::info;
use packcam::app_config::days;
use packcam::config_loader::MasterConfig;
use packcam::core::retention::sweep_directories;
use std::time::SystemTime;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

pub async fn handle_sweep_cli(master_config: &MasterConfig, args: &ArgMatches) -> Result<()> {
    let app = &master_config.app_settings;
    let window = match args.get_one::<u64>("days") {
        Some(n) => days(*n),
        None => app.retention_window(),
    };
    let dirs = vec![app.output_dir(), app.metadata_dir()];
    info!("🧹 Sweeping {:?} for files older than {} day(s)...", dirs, window.as_secs() / SECS_PER_DAY);

    let report = tokio::task::spawn_blocking(move || sweep_directories(&dirs, window, SystemTime::now())).await?;
    println!(
        "Deleted {} file(s), freed {:.2} MB ({} bytes).",
        report.deleted_count, report.freed_bytes_mb, report.freed_bytes
    );
    Ok(())
}
