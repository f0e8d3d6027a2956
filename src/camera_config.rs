use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct CameraConfig {
    #[serde(deserialize_with = "deserialize_camera_id")]
    pub id: String,
    pub name: String,
    pub source: CameraSource, // device index (e.g. 0) or stream URL (e.g. rtsp://...)
}

/// Where a camera's frames come from. One pipeline serves both kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CameraSource {
    DeviceIndex(u32),
    StreamUrl(String),
}

impl CameraSource {
    /// Digit-only strings such as `"0"` are treated as device indexes.
    pub fn normalized(&self) -> CameraSource {
        match self {
            CameraSource::StreamUrl(s) => match s.trim().parse::<u32>() {
                Ok(idx) => CameraSource::DeviceIndex(idx),
                Err(_) => CameraSource::StreamUrl(s.trim().to_string()),
            },
            other => other.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CameraSource::StreamUrl(s) if s.trim().is_empty())
    }
}

impl fmt::Display for CameraSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraSource::DeviceIndex(idx) => write!(f, "device #{}", idx),
            CameraSource::StreamUrl(url) => write!(f, "{}", url),
        }
    }
}

// Camera ids show up as plain integers in older camera lists, so accept both.
fn deserialize_camera_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdRepr {
        Number(i64),
        Text(String),
    }

    Ok(match IdRepr::deserialize(deserializer)? {
        IdRepr::Number(n) => n.to_string(),
        IdRepr::Text(s) => s,
    })
}
