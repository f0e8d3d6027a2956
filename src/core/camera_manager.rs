use crate::camera::camera_entity::CameraHandle;
use crate::config_loader::MasterConfig;
use anyhow::{bail, Result};
use log::{debug, info};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Registry of configured cameras, keyed by id, kept in configuration order.
pub struct CameraManager {
    cameras: Vec<Arc<CameraHandle>>,
    by_id: HashMap<String, usize>,
}

impl CameraManager {
    pub fn new(master_config: &MasterConfig) -> Result<Self> {
        debug!("🛠️ Initializing CameraManager...");
        let start_time = Instant::now();
        let mut cameras = Vec::with_capacity(master_config.cameras.len());
        let mut by_id = HashMap::new();
        for (idx, cam_config) in master_config.cameras.iter().enumerate() {
            debug!("  Processing camera config #{}: {} ({})", idx + 1, cam_config.name, cam_config.source);
            if by_id.contains_key(&cam_config.id) {
                bail!("❌ Duplicate camera id found in configuration: {}", cam_config.id);
            }
            by_id.insert(cam_config.id.clone(), cameras.len());
            cameras.push(Arc::new(CameraHandle::new(cam_config.clone())));
        }
        info!("✅ CameraManager initialized with {} cameras in {:?}.", cameras.len(), start_time.elapsed());
        Ok(CameraManager { cameras, by_id })
    }

    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }

    pub fn get_all_cameras(&self) -> Vec<Arc<CameraHandle>> {
        self.cameras.clone()
    }

    pub fn get(&self, camera_id: &str) -> Option<Arc<CameraHandle>> {
        self.by_id.get(camera_id).map(|&idx| self.cameras[idx].clone())
    }

    /// Looks cameras up by id or name, skipping unknown entries.
    pub fn get_cameras_by_names(&self, names: &[String]) -> Vec<Arc<CameraHandle>> {
        let mut result = Vec::new();
        for name in names {
            match self.cameras.iter().find(|c| c.id() == name || c.name() == name) {
                Some(cam) => result.push(cam.clone()),
                None => debug!("  Camera not found: {}", name),
            }
        }
        result
    }

    /// Marks every handle as belonging to a replaced configuration.
    pub fn retire_all(&self) {
        for camera in &self.cameras {
            camera.retire();
        }
    }
}

// Helper to parse comma-separated camera names from CLI
pub fn parse_camera_names_arg(names_str_opt: Option<&String>) -> Option<Vec<String>> {
    names_str_opt.map(|names_str| {
        names_str.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
    })
}
