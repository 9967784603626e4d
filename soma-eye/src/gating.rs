//! Perceptual gating: darkness, blur, and motion filters ahead of detection
//!
//! Every camera frame is converted to a downscaled grayscale working copy,
//! then run through three gates of increasing cost. Only frames that pass
//! all gates reach the detection model.

use crate::config::EyeConfig;
use soma_core::types::{PixelBuffer, VisualDetection};

/// Downscaled grayscale working image used by the gates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayFrame {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayFrame {
    /// Grayscale-convert and nearest-neighbor downscale to `target_width`.
    pub fn from_pixels(image: &PixelBuffer, target_width: usize) -> Option<GrayFrame> {
        if image.is_empty() || image.channels == 0 {
            return None;
        }
        let expected = image.width * image.height * image.channels;
        if image.data.len() < expected {
            return None;
        }

        let target_width = target_width.min(image.width).max(1);
        let scale = image.width as f64 / target_width as f64;
        let target_height = ((image.height as f64 / scale) as usize).max(1);

        let mut data = Vec::with_capacity(target_width * target_height);
        for ty in 0..target_height {
            let sy = ((ty as f64 * scale) as usize).min(image.height - 1);
            for tx in 0..target_width {
                let sx = ((tx as f64 * scale) as usize).min(image.width - 1);
                let base = (sy * image.width + sx) * image.channels;
                let value = if image.channels >= 3 {
                    // ITU-R BT.601 luma.
                    let r = image.data[base] as f64;
                    let g = image.data[base + 1] as f64;
                    let b = image.data[base + 2] as f64;
                    (0.299 * r + 0.587 * g + 0.114 * b) as u8
                } else {
                    image.data[base]
                };
                data.push(value);
            }
        }

        Some(GrayFrame {
            width: target_width,
            height: target_height,
            data,
        })
    }

    pub fn mean_luminance(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().map(|&p| p as f64).sum::<f64>() / self.data.len() as f64
    }

    /// Variance of the 4-neighbor Laplacian response; low variance means blur.
    pub fn laplacian_variance(&self) -> f64 {
        if self.width < 3 || self.height < 3 {
            return 0.0;
        }

        let mut responses = Vec::with_capacity((self.width - 2) * (self.height - 2));
        for y in 1..self.height - 1 {
            for x in 1..self.width - 1 {
                let center = self.data[y * self.width + x] as f64;
                let up = self.data[(y - 1) * self.width + x] as f64;
                let down = self.data[(y + 1) * self.width + x] as f64;
                let left = self.data[y * self.width + x - 1] as f64;
                let right = self.data[y * self.width + x + 1] as f64;
                responses.push(up + down + left + right - 4.0 * center);
            }
        }

        let n = responses.len() as f64;
        let mean = responses.iter().sum::<f64>() / n;
        responses.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n
    }

    /// Percentage of pixels whose absolute difference exceeds `delta`.
    pub fn motion_percent(&self, other: &GrayFrame, delta: u8) -> f64 {
        let len = self.data.len().min(other.data.len());
        if len == 0 {
            return 100.0;
        }
        let moving = self.data[..len]
            .iter()
            .zip(&other.data[..len])
            .filter(|(a, b)| a.abs_diff(**b) > delta)
            .count();
        moving as f64 * 100.0 / len as f64
    }
}

/// Detection model seam. Implementations are external; the only contract is
/// a single-frame latency budget and thread safety.
pub trait Detector: Send + Sync {
    fn detect(&self, image: &PixelBuffer) -> Vec<VisualDetection>;
}

/// Gate verdict for one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// Mean luminance at or below the dark threshold.
    Dark { mean_luminance: f64 },
    /// Laplacian variance did not strictly exceed the blur threshold.
    Blurry { blur_score: f64 },
    /// Scene unchanged and the forced-processing interval not yet reached.
    Static { blur_score: f64, motion_score: f64 },
    /// Frame passes all gates and should run detection.
    Process { blur_score: f64, motion_score: f64 },
}

/// Stateful L0/L1 gate. Holds the last processed frame for motion diffing
/// and the consecutive-skip counter for forced processing.
pub struct FrameGate {
    dark_threshold: f64,
    blur_threshold: f64,
    motion_pixel_delta: u8,
    motion_threshold: f64,
    force_process_interval: u32,
    last_processed: Option<GrayFrame>,
    skipped_count: u32,
}

impl FrameGate {
    pub fn new(config: &EyeConfig) -> Self {
        Self {
            dark_threshold: config.dark_threshold,
            blur_threshold: config.blur_threshold,
            motion_pixel_delta: config.motion_pixel_delta,
            motion_threshold: config.motion_threshold,
            force_process_interval: config.force_process_interval,
            last_processed: None,
            skipped_count: 0,
        }
    }

    /// Run the gates over a prepared grayscale frame.
    ///
    /// `Process` updates the motion reference and resets the skip counter;
    /// the caller is expected to follow up with detection.
    pub fn evaluate(&mut self, gray: &GrayFrame) -> GateDecision {
        let mean = gray.mean_luminance();
        if mean <= self.dark_threshold {
            return GateDecision::Dark {
                mean_luminance: mean,
            };
        }

        let blur_score = gray.laplacian_variance();
        if blur_score <= self.blur_threshold {
            return GateDecision::Blurry { blur_score };
        }

        let motion_score = match &self.last_processed {
            Some(reference) => gray.motion_percent(reference, self.motion_pixel_delta),
            // No reference yet: treat as full motion so the first sharp
            // frame always reaches detection.
            None => 100.0,
        };

        if motion_score < self.motion_threshold && self.skipped_count <= self.force_process_interval
        {
            self.skipped_count += 1;
            return GateDecision::Static {
                blur_score,
                motion_score,
            };
        }

        self.last_processed = Some(gray.clone());
        self.skipped_count = 0;
        GateDecision::Process {
            blur_score,
            motion_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_gray(width: usize, height: usize, value: u8) -> GrayFrame {
        GrayFrame {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    fn checkerboard(width: usize, height: usize) -> GrayFrame {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(if (x + y) % 2 == 0 { 255 } else { 0 });
            }
        }
        GrayFrame {
            width,
            height,
            data,
        }
    }

    #[test]
    fn test_grayscale_downscale() {
        let image = PixelBuffer::new(640, 480, 3, vec![128; 640 * 480 * 3]);
        let gray = GrayFrame::from_pixels(&image, 320).unwrap();
        assert_eq!(gray.width, 320);
        assert_eq!(gray.height, 240);
        assert!((gray.mean_luminance() - 127.0).abs() < 2.0);
    }

    #[test]
    fn test_from_pixels_rejects_short_buffer() {
        let image = PixelBuffer::new(64, 64, 3, vec![0; 10]);
        assert!(GrayFrame::from_pixels(&image, 32).is_none());
    }

    #[test]
    fn test_flat_frame_has_zero_laplacian_variance() {
        assert_eq!(flat_gray(32, 32, 100).laplacian_variance(), 0.0);
    }

    #[test]
    fn test_checkerboard_is_sharp() {
        assert!(checkerboard(32, 32).laplacian_variance() > 1000.0);
    }

    #[test]
    fn test_motion_percent() {
        let a = flat_gray(16, 16, 10);
        let b = flat_gray(16, 16, 200);
        assert_eq!(a.motion_percent(&b, 30), 100.0);
        assert_eq!(a.motion_percent(&a, 30), 0.0);
    }

    #[test]
    fn test_gate_dark() {
        let mut gate = FrameGate::new(&EyeConfig::default());
        let decision = gate.evaluate(&flat_gray(32, 32, 5));
        assert!(matches!(decision, GateDecision::Dark { .. }));
    }

    #[test]
    fn test_gate_blurry_at_threshold_boundary() {
        // A flat (non-dark) frame has zero variance: always Blurry.
        let mut gate = FrameGate::new(&EyeConfig::default());
        let decision = gate.evaluate(&flat_gray(32, 32, 100));
        assert!(matches!(decision, GateDecision::Blurry { .. }));

        // Equality with the threshold must also be Blurry (strict pass).
        let mut config = EyeConfig::default();
        config.blur_threshold = 0.0;
        let mut gate = FrameGate::new(&config);
        match gate.evaluate(&flat_gray(32, 32, 100)) {
            GateDecision::Blurry { blur_score } => assert_eq!(blur_score, 0.0),
            other => panic!("expected Blurry, got {:?}", other),
        }
    }

    #[test]
    fn test_gate_first_sharp_frame_processes() {
        let mut gate = FrameGate::new(&EyeConfig::default());
        let decision = gate.evaluate(&checkerboard(32, 32));
        assert!(matches!(decision, GateDecision::Process { .. }));
    }

    #[test]
    fn test_gate_static_then_forced_processing() {
        let mut config = EyeConfig::default();
        config.force_process_interval = 3;
        let mut gate = FrameGate::new(&config);
        let frame = checkerboard(32, 32);

        assert!(matches!(gate.evaluate(&frame), GateDecision::Process { .. }));
        for _ in 0..4 {
            assert!(matches!(gate.evaluate(&frame), GateDecision::Static { .. }));
        }
        // Skip budget exhausted: identical frame is force-processed.
        assert!(matches!(gate.evaluate(&frame), GateDecision::Process { .. }));
    }
}
