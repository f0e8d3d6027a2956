use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("File I/O Error: {0}")]
    Io(String),

    #[error("Camera Device Error: {0}")]
    Device(String),

    #[error("Media Processing Error: {0}")]
    Media(String),

    #[error("Code Decode Error: {0}")]
    Decode(String),

    #[error("Persistence Error: {0}")]
    Persistence(String),

    #[error("Task Execution Error: {0}")]
    Task(String),

    #[error("Resource Not Found: {0}")]
    NotFound(String),

    #[error("OpenCV Error: {0}")]
    OpenCV(String),
}

// Allow conversion from std::io::Error to AppError::Io
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Persistence(err.to_string())
    }
}

#[cfg(feature = "opencv")]
impl From<opencv::Error> for AppError {
    fn from(err: opencv::Error) -> Self {
        AppError::OpenCV(err.to_string())
    }
}
