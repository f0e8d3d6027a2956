//! Filesystem layout for finished recordings and the sealed metadata record
//! written once a session closes.

use crate::app_config::ApplicationConfig;
use crate::common::file_utils::{self, artifact_filename, sanitize_order_code};
use crate::common::timestamp_utils::duration_seconds_between;
use crate::errors::AppError;
use chrono::{DateTime, Local};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Where videos and their metadata live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    pub video_dir: PathBuf,
    pub metadata_dir: PathBuf,
    pub extension: String,
}

impl ArtifactLayout {
    pub fn new(video_dir: impl Into<PathBuf>, metadata_dir: impl Into<PathBuf>, extension: &str) -> Self {
        ArtifactLayout {
            video_dir: video_dir.into(),
            metadata_dir: metadata_dir.into(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn from_config(app: &ApplicationConfig) -> Self {
        Self::new(app.output_dir(), app.metadata_dir(), &app.video_extension)
    }

    pub fn ensure_directories(&self) -> Result<(), AppError> {
        file_utils::ensure_output_directory(&self.video_dir)?;
        file_utils::ensure_output_directory(&self.metadata_dir)?;
        Ok(())
    }

    pub fn video_file_name(&self, order_code: &str) -> String {
        artifact_filename(order_code, &self.extension)
    }

    pub fn video_path(&self, order_code: &str) -> PathBuf {
        self.video_dir.join(self.video_file_name(order_code))
    }

    pub fn metadata_path(&self, order_code: &str) -> PathBuf {
        self.metadata_dir.join(format!("{}.json", sanitize_order_code(order_code)))
    }

    pub fn metadata_path_for_file(&self, video_file_name: &str) -> PathBuf {
        let stem = Path::new(video_file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| video_file_name.to_string());
        self.metadata_dir.join(format!("{}.json", stem))
    }

    /// A finished (or in-flight) video for this order already exists.
    pub fn video_exists(&self, order_code: &str) -> bool {
        self.video_path(order_code).exists()
    }
}

/// Immutable description of a finished recording, serialized as
/// `<metadata_dir>/<order>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub file_name: String,
    pub camera_name: String,
    pub camera_id: String,
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
    pub duration_seconds: f64,
}

/// What the recorder knows about a session at the moment it closes.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub order_code: String,
    pub file_name: String,
    pub camera_id: String,
    pub camera_name: String,
    pub started_at: DateTime<Local>,
}

/// Builds the `VideoRecord` for a closed session and writes its metadata.
///
/// Callers must have released the video sink first, so metadata never points
/// at a file that is still being written. A metadata write failure is logged
/// and the record is still returned: the video itself is already saved.
pub fn finalize(layout: &ArtifactLayout, summary: &SessionSummary, ended_at: DateTime<Local>) -> VideoRecord {
    let record = VideoRecord {
        file_name: summary.file_name.clone(),
        camera_name: summary.camera_name.clone(),
        camera_id: summary.camera_id.clone(),
        start_time: summary.started_at,
        end_time: ended_at.max(summary.started_at),
        duration_seconds: duration_seconds_between(&summary.started_at, &ended_at),
    };

    let metadata_path = layout.metadata_path(&summary.order_code);
    match write_metadata(&metadata_path, &record) {
        Ok(()) => info!(
            "💾 Saved metadata for order '{}' ({:.2}s) to {}",
            summary.order_code, record.duration_seconds, metadata_path.display()
        ),
        Err(e) => error!(
            "❌ Could not save metadata for order '{}' at {}: {}. Video is kept without timing.",
            summary.order_code, metadata_path.display(), e
        ),
    }
    record
}

pub fn write_metadata(path: &Path, record: &VideoRecord) -> Result<(), AppError> {
    let start_time = Instant::now();
    if let Some(parent) = path.parent() {
        file_utils::ensure_output_directory(parent)?;
    }
    let json = serde_json::to_vec_pretty(record)?;
    file_utils::write_atomically(path, &json)?;
    debug!("Metadata written to {} in {:?}", path.display(), start_time.elapsed());
    Ok(())
}

/// Reads a metadata record. Missing or unreadable metadata means "unknown
/// timing" and yields `None`.
pub fn read_metadata(path: &Path) -> Option<VideoRecord> {
    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(e) => {
            debug!("No metadata at {}: {}", path.display(), e);
            return None;
        }
    };
    match serde_json::from_slice(&raw) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!("⚠️ Ignoring unreadable metadata {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn summary(started_at: DateTime<Local>) -> SessionSummary {
        SessionSummary {
            order_code: "ORD001".into(),
            file_name: "ORD001.mp4".into(),
            camera_id: "1".into(),
            camera_name: "Bench".into(),
            started_at,
        }
    }

    #[test]
    fn layout_derives_paths_from_order_code() {
        let layout = ArtifactLayout::new("/data/Video", "/data/Metadata", ".avi");
        assert_eq!(layout.video_path("ORD001"), PathBuf::from("/data/Video/ORD001.avi"));
        assert_eq!(layout.metadata_path("ORD001"), PathBuf::from("/data/Metadata/ORD001.json"));
        assert_eq!(layout.metadata_path_for_file("ORD001.avi"), PathBuf::from("/data/Metadata/ORD001.json"));
    }

    #[test]
    fn finalize_writes_expected_json_fields() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path().join("Video"), dir.path().join("Metadata"), "mp4");
        let start = Local.with_ymd_and_hms(2025, 5, 2, 8, 0, 0).unwrap();
        let end = start + chrono::Duration::milliseconds(42_500);

        let record = finalize(&layout, &summary(start), end);
        assert_eq!(record.duration_seconds, 42.5);

        let raw = std::fs::read_to_string(layout.metadata_path("ORD001")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        for field in ["file_name", "camera_name", "camera_id", "start_time", "end_time", "duration_seconds"] {
            assert!(json.get(field).is_some(), "missing {}", field);
        }
        assert_eq!(json["file_name"], "ORD001.mp4");
        assert_eq!(read_metadata(&layout.metadata_path("ORD001")), Some(record));
    }

    #[test]
    fn end_time_never_precedes_start_time() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path().join("Video"), dir.path().join("Metadata"), "mp4");
        let start = Local.with_ymd_and_hms(2025, 5, 2, 8, 0, 0).unwrap();
        let record = finalize(&layout, &summary(start), start - chrono::Duration::seconds(5));
        assert!(record.end_time >= record.start_time);
        assert_eq!(record.duration_seconds, 0.0);
    }

    #[test]
    fn unreadable_metadata_is_treated_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, b"{not json").unwrap();
        assert!(read_metadata(&path).is_none());
        assert!(read_metadata(&dir.path().join("absent.json")).is_none());
    }
}
