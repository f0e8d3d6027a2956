use crate::camera_config::CameraSource;
use crate::errors::AppError;
use image::RgbImage;
use std::path::Path;

// --- Data structures for frame information ---

/// One decoded RGB8 frame as published by a frame grabber.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbImage,
    pub sequence: u64, // assigned by the frame slot on publish
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Frame { image, sequence: 0 }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Parameters for opening a video writer.
#[derive(Debug, Clone, PartialEq)]
pub struct WriterSpec {
    pub fourcc: String,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

// --- The media seams ---

/// An opened capture device. Reads block until the next frame is available.
pub trait FrameCapture: Send {
    /// An `Err` means the stream is gone and must be reopened.
    fn read_frame(&mut self) -> Result<Frame, AppError>;
}

/// An open video file receiving frames for one recording session.
pub trait VideoSink: Send {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), AppError>;

    /// Flushes and closes the container.
    fn release(self: Box<Self>) -> Result<(), AppError>;
}

/// Opaque "image region in, decoded strings out" capability.
pub trait CodeDecoder: Send {
    fn decode(&mut self, region: &RgbImage) -> Result<Vec<String>, AppError>;
}

/// Everything the engine needs from the outside world to see and record.
pub trait MediaBackend: Send + Sync {
    fn backend_name(&self) -> &str;

    fn open_capture(&self, source: &CameraSource) -> Result<Box<dyn FrameCapture>, AppError>;

    fn open_writer(&self, path: &Path, spec: &WriterSpec) -> Result<Box<dyn VideoSink>, AppError>;

    /// Decoders may hold per-thread detector state, so each camera gets its own.
    fn new_decoder(&self) -> Result<Box<dyn CodeDecoder>, AppError>;
}
