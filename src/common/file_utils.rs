use std::path::{Path, PathBuf};
use crate::errors::AppError;
use log::debug;

const RESERVED_FILENAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Order codes become file stems; strip anything a filesystem would reject.
pub fn sanitize_order_code(order_code: &str) -> String {
    let cleaned: String = order_code
        .trim()
        .chars()
        .map(|c| if RESERVED_FILENAME_CHARS.contains(&c) || c.is_control() { '_' } else { c })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".repeat(cleaned.len().max(1)),
        _ => cleaned,
    }
}

pub fn artifact_filename(order_code: &str, extension: &str) -> String {
    format!("{}.{}", sanitize_order_code(order_code), extension.trim_start_matches('.'))
}

pub fn ensure_output_directory(dir_path: &Path) -> Result<PathBuf, AppError> {
    if !dir_path.exists() {
        debug!("Output directory '{}' does not exist, attempting to create it.", dir_path.display());
        std::fs::create_dir_all(dir_path).map_err(|e| {
            AppError::Io(format!(
                "Failed to create output directory '{}': {}",
                dir_path.display(),
                e
            ))
        })?;
    } else if !dir_path.is_dir() {
        return Err(AppError::Io(format!(
            "Output path '{}' exists but is not a directory.",
            dir_path.display()
        )));
    }
    Ok(dir_path.to_path_buf())
}

/// Writes `contents` next to `path` and renames it into place.
pub fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), AppError> {
    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    std::fs::write(&tmp_path, contents)
        .map_err(|e| AppError::Io(format!("Failed to write '{}': {}", tmp_path.display(), e)))?;
    std::fs::rename(&tmp_path, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp_path);
        AppError::Io(format!("Failed to move '{}' into place: {}", path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_path_separators_and_whitespace() {
        assert_eq!(sanitize_order_code("  SPX/VN:0535 "), "SPX_VN_0535");
        assert_eq!(sanitize_order_code(".."), "__");
        assert_eq!(artifact_filename("ORD001", ".mp4"), "ORD001.mp4");
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("ORD001.json");
        write_atomically(&target, b"{}").unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"{}");
        assert!(!dir.path().join("ORD001.json.tmp").exists());
    }

    #[test]
    fn refuses_file_as_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not_a_dir");
        std::fs::write(&file, b"x").unwrap();
        assert!(ensure_output_directory(&file).is_err());
        assert!(ensure_output_directory(&dir.path().join("nested/Video")).is_ok());
    }
}
