//! OpenCV implementation of the media seams: device/stream capture,
//! `VideoWriter` output and QR decoding. Compiled with the `opencv` feature.

use crate::core::capture_source::MediaBackend;
use crate::errors::AppError;
use std::sync::Arc;

/// The backend `run` and `probe` use.
pub fn default_backend() -> Result<Arc<dyn MediaBackend>, AppError> {
    #[cfg(feature = "opencv")]
    {
        Ok(Arc::new(opencv_backend::OpenCvBackend::new()))
    }
    #[cfg(not(feature = "opencv"))]
    {
        Err(AppError::Config(
            "no media backend compiled in; rebuild with `--features opencv`".to_string(),
        ))
    }
}

#[cfg(feature = "opencv")]
pub use opencv_backend::OpenCvBackend;

#[cfg(feature = "opencv")]
mod opencv_backend {
    use crate::camera_config::CameraSource;
    use crate::core::capture_source::{CodeDecoder, Frame, FrameCapture, MediaBackend, VideoSink, WriterSpec};
    use crate::errors::AppError;
    use image::RgbImage;
    use log::{debug, info, warn};
    use opencv::{core as opencv_core, imgproc, objdetect, prelude::*, videoio};
    use std::path::{Path, PathBuf};
    use std::time::Instant;

    #[derive(Debug, Default, Clone)]
    pub struct OpenCvBackend;

    impl OpenCvBackend {
        pub fn new() -> Self {
            OpenCvBackend
        }
    }

    impl MediaBackend for OpenCvBackend {
        fn backend_name(&self) -> &str {
            "opencv"
        }

        fn open_capture(&self, source: &CameraSource) -> Result<Box<dyn FrameCapture>, AppError> {
            let open_start = Instant::now();
            let cap = match source {
                CameraSource::DeviceIndex(index) => videoio::VideoCapture::new(*index as i32, videoio::CAP_ANY)?,
                CameraSource::StreamUrl(url) => videoio::VideoCapture::from_file(url, videoio::CAP_FFMPEG)?,
            };
            if !videoio::VideoCapture::is_opened(&cap)? {
                return Err(AppError::Device(format!("cannot open {}", source)));
            }
            debug!("VideoCapture opened for {} in {:?}", source, open_start.elapsed());
            Ok(Box::new(OpenCvCapture { cap, source: source.to_string() }))
        }

        fn open_writer(&self, path: &Path, spec: &WriterSpec) -> Result<Box<dyn VideoSink>, AppError> {
            let mut code = spec.fourcc.chars();
            let fourcc = videoio::VideoWriter::fourcc(
                code.next().unwrap_or('m'),
                code.next().unwrap_or('p'),
                code.next().unwrap_or('4'),
                code.next().unwrap_or('v'),
            )?;
            let path_str = path
                .to_str()
                .ok_or_else(|| AppError::Media(format!("output path is not UTF-8: {}", path.display())))?;
            let writer = videoio::VideoWriter::new(
                path_str,
                fourcc,
                spec.fps,
                opencv_core::Size::new(spec.width as i32, spec.height as i32),
                true,
            )?;
            if !videoio::VideoWriter::is_opened(&writer)? {
                return Err(AppError::Media(format!(
                    "VideoWriter refused {} ({} {}x{} @ {} fps)",
                    path.display(), spec.fourcc, spec.width, spec.height, spec.fps
                )));
            }
            info!("✍️ VideoWriter opened for {}", path.display());
            Ok(Box::new(OpenCvSink { writer, path: path.to_path_buf() }))
        }

        fn new_decoder(&self) -> Result<Box<dyn CodeDecoder>, AppError> {
            Ok(Box::new(QrDecoder { detector: objdetect::QRCodeDetector::default()? }))
        }
    }

    struct OpenCvCapture {
        cap: videoio::VideoCapture,
        source: String,
    }

    impl FrameCapture for OpenCvCapture {
        fn read_frame(&mut self) -> Result<Frame, AppError> {
            let mut bgr = Mat::default();
            if !self.cap.read(&mut bgr)? || bgr.empty() {
                return Err(AppError::Device(format!("no frame from {}", self.source)));
            }
            Ok(Frame::new(bgr_to_rgb_image(&bgr)?))
        }
    }

    impl Drop for OpenCvCapture {
        fn drop(&mut self) {
            if let Err(e) = self.cap.release() {
                warn!("Failed to release capture {}: {}", self.source, e);
            }
        }
    }

    struct OpenCvSink {
        writer: videoio::VideoWriter,
        path: PathBuf,
    }

    impl VideoSink for OpenCvSink {
        fn write_frame(&mut self, frame: &Frame) -> Result<(), AppError> {
            let bgr = rgb_image_to_bgr(&frame.image)?;
            self.writer.write(&bgr)?;
            Ok(())
        }

        fn release(mut self: Box<Self>) -> Result<(), AppError> {
            self.writer.release()?;
            debug!("VideoWriter released for {}", self.path.display());
            Ok(())
        }
    }

    struct QrDecoder {
        detector: objdetect::QRCodeDetector,
    }

    impl CodeDecoder for QrDecoder {
        fn decode(&mut self, region: &RgbImage) -> Result<Vec<String>, AppError> {
            let mat = rgb_image_to_bgr(region)?;
            let mut decoded = opencv_core::Vector::<String>::new();
            let mut points = Mat::default();
            let mut straight = opencv_core::Vector::<Mat>::new();
            let found = self
                .detector
                .detect_and_decode_multi(&mat, &mut decoded, &mut points, &mut straight)
                .map_err(|e| AppError::Decode(e.to_string()))?;
            if !found {
                return Ok(Vec::new());
            }
            Ok(decoded.to_vec())
        }
    }

    fn bgr_to_rgb_image(bgr: &Mat) -> Result<RgbImage, AppError> {
        let mut rgb = Mat::default();
        imgproc::cvt_color(bgr, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;
        let (cols, rows) = (rgb.cols() as u32, rgb.rows() as u32);
        let data = rgb.data_bytes()?.to_vec();
        RgbImage::from_raw(cols, rows, data)
            .ok_or_else(|| AppError::Media(format!("unexpected frame layout {}x{}", cols, rows)))
    }

    fn rgb_image_to_bgr(image: &RgbImage) -> Result<Mat, AppError> {
        let flat = Mat::from_slice(image.as_raw())?;
        let rgb = flat.reshape(3, image.height() as i32)?;
        let mut bgr = Mat::default();
        imgproc::cvt_color(&rgb, &mut bgr, imgproc::COLOR_RGB2BGR, 0)?;
        Ok(bgr)
    }
}
