//! Observer interfaces through which the engine reports what each camera is
//! doing. A GUI, a log, or a test can sit behind them.

use log::{info, warn};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraStatus {
    Connecting,
    Connected,
    ConnectionError,
    Waiting,
    Recording { order_code: String },
    DuplicateOrder { order_code: String },
    Busy { order_code: String, other_camera: String },
    Saved,
    Error { reason: String },
}

impl fmt::Display for CameraStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraStatus::Connecting => write!(f, "Connecting"),
            CameraStatus::Connected => write!(f, "Connected"),
            CameraStatus::ConnectionError => write!(f, "ConnectionError"),
            CameraStatus::Waiting => write!(f, "Waiting"),
            CameraStatus::Recording { order_code } => write!(f, "Recording:{}", order_code),
            CameraStatus::DuplicateOrder { order_code } => write!(f, "DuplicateOrder:{}", order_code),
            CameraStatus::Busy { order_code, other_camera } => write!(f, "Busy:{}@{}", order_code, other_camera),
            CameraStatus::Saved => write!(f, "Saved"),
            CameraStatus::Error { reason } => write!(f, "Error:{}", reason),
        }
    }
}

pub trait StatusSink: Send + Sync {
    fn on_status_changed(&self, camera_id: &str, camera_name: &str, status: &CameraStatus);
}

/// Audible feedback points. Playback itself lives outside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cue {
    RecordingStarted,
    /// The label was scanned again and the session ended.
    RecordingFinished,
    /// An operator stopped the session by hand.
    RecordingStopped,
    DuplicateOrder,
}

pub trait CuePlayer: Send + Sync {
    fn play(&self, cue: Cue);
}

/// Writes every status transition to the application log.
#[derive(Debug, Default, Clone)]
pub struct LogStatusSink;

impl StatusSink for LogStatusSink {
    fn on_status_changed(&self, camera_id: &str, camera_name: &str, status: &CameraStatus) {
        match status {
            CameraStatus::ConnectionError
            | CameraStatus::Error { .. }
            | CameraStatus::Busy { .. }
            | CameraStatus::DuplicateOrder { .. } => {
                warn!("📟 [STATUS CAM {} ({})]: {}", camera_name, camera_id, status)
            }
            _ => info!("📟 [STATUS CAM {} ({})]: {}", camera_name, camera_id, status),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct LogCuePlayer;

impl CuePlayer for LogCuePlayer {
    fn play(&self, cue: Cue) {
        info!("🔔 Cue: {:?}", cue);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_texts_match_the_wire_format() {
        assert_eq!(CameraStatus::Waiting.to_string(), "Waiting");
        assert_eq!(CameraStatus::Recording { order_code: "ORD001".into() }.to_string(), "Recording:ORD001");
        assert_eq!(
            CameraStatus::Busy { order_code: "ORD001".into(), other_camera: "Dock".into() }.to_string(),
            "Busy:ORD001@Dock"
        );
        assert_eq!(CameraStatus::DuplicateOrder { order_code: "X".into() }.to_string(), "DuplicateOrder:X");
    }
}
