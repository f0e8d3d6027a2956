//! Read-only queries over recorded artifacts: newest-first listing, order
//! lookup by prefix, and timing summaries from the metadata records.

use crate::common::timestamp_utils::{format_for_display, format_hms};
use crate::core::persistence::{read_metadata, ArtifactLayout, VideoRecord};
use crate::errors::AppError;
use log::debug;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};

pub const VIDEO_EXTENSIONS: [&str; 4] = ["avi", "mp4", "mov", "mkv"];

const UNKNOWN: &str = "N/A";

#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveEntry {
    pub file_name: String,
    pub path: PathBuf,
    pub modified: SystemTime,
    pub size_bytes: u64,
    pub record: Option<VideoRecord>,
    /// The order is still being written by a camera.
    pub recording_now: bool,
}

impl ArchiveEntry {
    pub fn order_code(&self) -> &str {
        Path::new(&self.file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.file_name)
    }

    pub fn start_display(&self) -> String {
        self.record.as_ref().map_or_else(|| UNKNOWN.to_string(), |r| format_for_display(&r.start_time))
    }

    pub fn end_display(&self) -> String {
        self.record.as_ref().map_or_else(|| UNKNOWN.to_string(), |r| format_for_display(&r.end_time))
    }

    pub fn duration_display(&self) -> String {
        format_hms(self.record.as_ref().map_or(0.0, |r| r.duration_seconds))
    }

    pub fn camera_display(&self) -> &str {
        self.record.as_ref().map_or(UNKNOWN, |r| r.camera_name.as_str())
    }
}

pub fn is_video_file(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| VIDEO_EXTENSIONS.iter().any(|v| v.eq_ignore_ascii_case(ext)))
}

/// Every video artifact in the layout's video directory, newest first.
/// `recording_files` holds the file names of sessions still in progress.
pub fn list_artifacts(layout: &ArtifactLayout, recording_files: &[String]) -> Result<Vec<ArchiveEntry>, AppError> {
    let list_start = Instant::now();
    let mut entries = Vec::new();
    for dir_entry in std::fs::read_dir(&layout.video_dir)?.flatten() {
        let file_name = dir_entry.file_name().to_string_lossy().into_owned();
        if !is_video_file(&file_name) {
            continue;
        }
        let Ok(metadata) = dir_entry.metadata() else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        entries.push(ArchiveEntry {
            path: dir_entry.path(),
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            size_bytes: metadata.len(),
            record: read_metadata(&layout.metadata_path_for_file(&file_name)),
            recording_now: recording_files.contains(&file_name),
            file_name,
        });
    }
    entries.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.file_name.cmp(&b.file_name)));
    debug!("Listed {} artifact(s) in {:?}", entries.len(), list_start.elapsed());
    Ok(entries)
}

/// The newest artifact whose file name starts with `order_code`.
pub fn find_artifact(
    layout: &ArtifactLayout,
    order_code: &str,
    recording_files: &[String],
) -> Result<Option<ArchiveEntry>, AppError> {
    let prefix = order_code.trim();
    if prefix.is_empty() {
        return Err(AppError::Config("order code to search for is empty".into()));
    }
    Ok(list_artifacts(layout, recording_files)?
        .into_iter()
        .find(|entry| entry.file_name.starts_with(prefix)))
}
