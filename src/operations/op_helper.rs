use packcam::core::camera_manager::{parse_camera_names_arg, CameraManager};
use anyhow::{bail, Result};
use clap::ArgMatches;
use log::debug;
use packcam::camera::camera_entity::CameraHandle;
use packcam::config_loader::MasterConfig;
use packcam::core::persistence::ArtifactLayout;
use std::sync::Arc;
use std::time::Instant;

/// Resolves the `--cameras` selection (ids or names) against the registry,
/// defaulting to every configured camera.
pub fn select_cameras(camera_manager: &CameraManager, args: &ArgMatches) -> Result<Vec<Arc<CameraHandle>>> {
    let select_start = Instant::now();
    let requested = parse_camera_names_arg(args.get_one::<String>("cameras"));
    let cameras = match requested {
        Some(ref names) => camera_manager.get_cameras_by_names(names),
        None => camera_manager.get_all_cameras(),
    };
    debug!("  Selected {} camera(s) from {:?} in {:?}", cameras.len(), requested, select_start.elapsed());
    if cameras.is_empty() {
        bail!("No cameras matched the selection {:?}.", requested.unwrap_or_default());
    }
    Ok(cameras)
}

pub fn artifact_layout(master_config: &MasterConfig) -> ArtifactLayout {
    ArtifactLayout::from_config(&master_config.app_settings)
}
