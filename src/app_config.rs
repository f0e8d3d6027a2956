use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const SECS_PER_HOUR: u64 = 60 * 60;
const SECS_PER_DAY: u64 = 24 * SECS_PER_HOUR;
/// Upper bound accepted for `retention_days` (about a century).
pub const MAX_RETENTION_DAYS: u64 = 36_500;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApplicationConfig {
    pub output_directory: String,   // finished videos, <order>.<ext>
    pub metadata_directory: String, // <order>.json timing records
    pub video_extension: String,    // Container, e.g., "mp4", "avi"
    pub video_codec: String,        // fourcc, e.g., "mp4v", "MJPG", "XVID"
    pub fps: f64,                   // control loop + writer cadence
    pub scan_rate_hz: f64,          // how often the ROI is decoded
    pub roi_fraction: f64,          // share of width/height searched for a code
    pub detection_cooldown_secs: f64,
    pub duplicate_warning_secs: f64,
    pub reconnect_backoff_secs: f64,
    pub reconnect_backoff_max_secs: f64, // == reconnect_backoff_secs gives a fixed delay
    pub writer_join_timeout_secs: f64,
    pub shutdown_join_timeout_secs: f64,
    pub max_recording_seconds: Option<u64>,
    pub retention_days: u64,
    pub retention_sweep_interval_hours: u64,
    pub log_level: Option<String>, // CLI --debug wins over this
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        ApplicationConfig {
            output_directory: "./Video".to_string(),
            metadata_directory: "./Metadata".to_string(),
            video_extension: "mp4".to_string(),
            video_codec: "mp4v".to_string(),
            fps: 30.0,
            scan_rate_hz: 5.0,
            roi_fraction: 0.7,
            detection_cooldown_secs: 3.0,
            duplicate_warning_secs: 10.0,
            reconnect_backoff_secs: 5.0,
            reconnect_backoff_max_secs: 5.0,
            writer_join_timeout_secs: 2.0,
            shutdown_join_timeout_secs: 5.0,
            max_recording_seconds: Some(3600),
            retention_days: 30,
            retention_sweep_interval_hours: 24,
            log_level: Some("info".to_string()),
        }
    }
}

impl ApplicationConfig {
    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.output_directory)
    }

    pub fn metadata_dir(&self) -> PathBuf {
        PathBuf::from(&self.metadata_directory)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps.max(1.0))
    }

    /// Control-loop ticks between two decode attempts (at least 1).
    pub fn scan_interval_ticks(&self) -> u32 {
        ((self.fps / self.scan_rate_hz).floor() as u32).max(1)
    }

    pub fn detection_cooldown(&self) -> Duration {
        secs(self.detection_cooldown_secs)
    }

    pub fn duplicate_warning_interval(&self) -> Duration {
        secs(self.duplicate_warning_secs)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        secs(self.reconnect_backoff_secs)
    }

    pub fn reconnect_backoff_max(&self) -> Duration {
        secs(self.reconnect_backoff_max_secs.max(self.reconnect_backoff_secs))
    }

    pub fn writer_join_timeout(&self) -> Duration {
        secs(self.writer_join_timeout_secs)
    }

    pub fn shutdown_join_timeout(&self) -> Duration {
        secs(self.shutdown_join_timeout_secs)
    }

    pub fn max_recording_duration(&self) -> Option<Duration> {
        self.max_recording_seconds.map(Duration::from_secs)
    }

    pub fn retention_window(&self) -> Duration {
        days(self.retention_days)
    }

    pub fn retention_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.retention_sweep_interval_hours.max(1).saturating_mul(SECS_PER_HOUR))
    }
}

/// `n` whole days, saturating instead of overflowing.
pub fn days(n: u64) -> Duration {
    Duration::from_secs(n.saturating_mul(SECS_PER_DAY))
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(Duration::MAX)
}
