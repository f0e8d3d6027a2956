use super::op_helper::artifact_layout;
use anyhow::{Context, Result};
use clap::ArgMatches;
use log::debug;
use packcam::config_loader::MasterConfig;
use packcam::core::archive::{self, ArchiveEntry};
use std::time::Instant;

pub async fn handle_search_cli(master_config: &MasterConfig, args: &ArgMatches) -> Result<()> {
    let order_code = args.get_one::<String>("order").context("Missing order code")?;
    let layout = artifact_layout(master_config);
    let search_start = Instant::now();
    let found = archive::find_artifact(&layout, order_code, &[])
        .with_context(|| format!("Cannot search {}", layout.video_dir.display()))?;
    debug!("Search for '{}' took {:?}", order_code, search_start.elapsed());

    match found {
        Some(entry) => {
            println!("Found video: {}", entry.file_name);
            println!("Path: {}", entry.path.display());
            print_timing(&entry);
        }
        None => println!("No video starts with order code '{}'.", order_code.trim()),
    }
    Ok(())
}

pub async fn handle_list_cli(master_config: &MasterConfig) -> Result<()> {
    let layout = artifact_layout(master_config);
    let entries = archive::list_artifacts(&layout, &[])
        .with_context(|| format!("Cannot list {}", layout.video_dir.display()))?;
    if entries.is_empty() {
        println!("No recorded videos in {}.", layout.video_dir.display());
        return Ok(());
    }
    println!("{:<32} {:<20} {:<20} {:<9} {}", "FILE", "START", "END", "DURATION", "CAMERA");
    for entry in &entries {
        println!(
            "{:<32} {:<20} {:<20} {:<9} {}",
            entry.file_name,
            entry.start_display(),
            entry.end_display(),
            entry.duration_display(),
            entry.camera_display()
        );
    }
    println!("{} video(s).", entries.len());
    Ok(())
}

fn print_timing(entry: &ArchiveEntry) {
    println!("Camera:   {}", entry.camera_display());
    println!("Start:    {}", entry.start_display());
    println!("End:      {}", entry.end_display());
    println!("Duration: {}", entry.duration_display());
}
