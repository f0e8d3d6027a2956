use crate::core::capture_source::{CodeDecoder, Frame};
use image::imageops;
use log::{debug, trace};
use std::time::Instant;

/// Crop rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionOfInterest {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// The centered rectangle covering `fraction` of each dimension.
pub fn centered_roi(width: u32, height: u32, fraction: f64) -> RegionOfInterest {
    let fraction = fraction.clamp(0.0, 1.0);
    let roi_w = ((width as f64 * fraction).floor() as u32).clamp(width.min(1), width);
    let roi_h = ((height as f64 * fraction).floor() as u32).clamp(height.min(1), height);
    RegionOfInterest {
        x: (width - roi_w) / 2,
        y: (height - roi_h) / 2,
        width: roi_w,
        height: roi_h,
    }
}

/// First decoded payload that is not blank, trimmed.
pub fn first_order_code<I>(decoded: I) -> Option<String>
where
    I: IntoIterator<Item = String>,
{
    decoded
        .into_iter()
        .map(|text| text.trim().to_string())
        .find(|text| !text.is_empty())
}

/// Periodically decodes the center of the newest frame for an order code.
pub struct CodeScanner {
    decoder: Box<dyn CodeDecoder>,
    roi_fraction: f64,
    interval_ticks: u32,
    ticks: u64,
    last_sequence: Option<u64>,
}

impl CodeScanner {
    pub fn new(decoder: Box<dyn CodeDecoder>, roi_fraction: f64, interval_ticks: u32) -> Self {
        CodeScanner {
            decoder,
            roi_fraction,
            interval_ticks: interval_ticks.max(1),
            ticks: 0,
            last_sequence: None,
        }
    }

    /// Advances the tick counter and scans `frame` every `interval_ticks`
    /// ticks. A frame that was already scanned is not decoded twice.
    pub fn on_tick(&mut self, frame: Option<&Frame>) -> Option<String> {
        self.ticks += 1;
        if self.ticks % self.interval_ticks as u64 != 0 {
            return None;
        }
        let frame = frame?;
        if self.last_sequence == Some(frame.sequence) {
            return None;
        }
        self.last_sequence = Some(frame.sequence);
        self.scan(frame)
    }

    pub fn scan(&mut self, frame: &Frame) -> Option<String> {
        let scan_start = Instant::now();
        let roi = centered_roi(frame.width(), frame.height(), self.roi_fraction);
        if roi.width == 0 || roi.height == 0 {
            return None;
        }
        let region = imageops::crop_imm(&frame.image, roi.x, roi.y, roi.width, roi.height).to_image();
        match self.decoder.decode(&region) {
            Ok(decoded) => {
                let code = first_order_code(decoded);
                trace!("Scanned frame #{} ({:?}) in {:?}: {:?}", frame.sequence, roi, scan_start.elapsed(), code);
                code
            }
            Err(e) => {
                debug!("Decode failed on frame #{}: {}", frame.sequence, e);
                None
            }
        }
    }

    pub fn reset(&mut self) {
        self.ticks = 0;
        self.last_sequence = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;
    use image::{Rgb, RgbImage};
    use std::sync::{Arc, Mutex};

    struct EchoDecoder {
        seen: Arc<Mutex<Vec<(u32, u32)>>>,
        reply: Result<Vec<String>, String>,
    }

    impl CodeDecoder for EchoDecoder {
        fn decode(&mut self, region: &RgbImage) -> Result<Vec<String>, AppError> {
            self.seen.lock().unwrap().push(region.dimensions());
            self.reply.clone().map_err(AppError::Decode)
        }
    }

    fn scanner(reply: Result<Vec<String>, String>, interval: u32) -> (CodeScanner, Arc<Mutex<Vec<(u32, u32)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let decoder = EchoDecoder { seen: seen.clone(), reply };
        (CodeScanner::new(Box::new(decoder), 0.7, interval), seen)
    }

    fn frame(sequence: u64) -> Frame {
        let mut f = Frame::new(RgbImage::from_pixel(640, 480, Rgb([10, 10, 10])));
        f.sequence = sequence;
        f
    }

    #[test]
    fn roi_is_centered_seventy_percent() {
        let roi = centered_roi(640, 480, 0.7);
        assert_eq!(roi, RegionOfInterest { x: 96, y: 72, width: 448, height: 336 });
    }

    #[test]
    fn roi_never_collapses_on_tiny_frames() {
        let roi = centered_roi(1, 1, 0.7);
        assert_eq!((roi.width, roi.height), (1, 1));
    }

    #[test]
    fn first_non_blank_code_is_trimmed() {
        let decoded = vec!["".to_string(), "   ".to_string(), " ORD001 \n".to_string(), "ORD002".to_string()];
        assert_eq!(first_order_code(decoded), Some("ORD001".to_string()));
        assert_eq!(first_order_code(Vec::<String>::new()), None);
    }

    #[test]
    fn scans_only_every_interval_ticks() {
        let (mut scanner, seen) = scanner(Ok(vec!["ORD001".into()]), 6);
        let mut hits = Vec::new();
        for seq in 1..=12 {
            hits.push(scanner.on_tick(Some(&frame(seq))));
        }
        assert_eq!(hits.iter().filter(|h| h.is_some()).count(), 2);
        assert_eq!(hits[5].as_deref(), Some("ORD001"));
        assert_eq!(seen.lock().unwrap().as_slice(), &[(448, 336), (448, 336)]);
    }

    #[test]
    fn same_frame_is_not_decoded_twice() {
        let (mut scanner, seen) = scanner(Ok(vec!["ORD001".into()]), 1);
        let f = frame(7);
        assert!(scanner.on_tick(Some(&f)).is_some());
        assert!(scanner.on_tick(Some(&f)).is_none());
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn decode_errors_produce_no_event() {
        let (mut scanner, _) = scanner(Err("corrupt".into()), 1);
        assert_eq!(scanner.on_tick(Some(&frame(1))), None);
        assert_eq!(scanner.on_tick(None), None);
    }
}
