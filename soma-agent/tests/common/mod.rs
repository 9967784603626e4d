//! Shared test doubles for agent integration tests

use nalgebra::Vector3;
use parking_lot::Mutex;
use soma_agent::hal::{AsrEngine, BodyActuator, Detector, StatusProbe, TtsBackend};
use soma_core::types::{BoundingBox, ComponentState, PixelBuffer, RobotState, VisualDetection};
use soma_core::Timestamp;
use soma_eye::asr::Transcription;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Detector returning whatever the test staged.
pub struct StagedDetector {
    pub detections: Mutex<Vec<VisualDetection>>,
}

impl StagedDetector {
    pub fn new(detections: Vec<VisualDetection>) -> Self {
        Self {
            detections: Mutex::new(detections),
        }
    }

    pub fn stage(&self, detections: Vec<VisualDetection>) {
        *self.detections.lock() = detections;
    }
}

impl Detector for StagedDetector {
    fn detect(&self, _image: &PixelBuffer) -> Vec<VisualDetection> {
        self.detections.lock().clone()
    }
}

pub struct SilentAsr;

impl AsrEngine for SilentAsr {
    fn transcribe(&self, _pcm: &[i16], _rate: u32) -> Option<Transcription> {
        None
    }
}

/// Body driver recording every torque command.
pub struct RecordingBody {
    pub commands: Mutex<Vec<(Vec<f64>, ComponentState)>>,
    stalled: AtomicBool,
}

impl RecordingBody {
    pub fn new() -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            stalled: AtomicBool::new(false),
        }
    }

    pub fn stall(&self) {
        self.stalled.store(true, Ordering::SeqCst);
    }

    pub fn last_command(&self) -> Option<Vec<f64>> {
        self.commands.lock().last().map(|(cmd, _)| cmd.clone())
    }
}

impl BodyActuator for RecordingBody {
    fn set_command(&self, torques: &[f64]) {
        self.commands
            .lock()
            .push((torques.to_vec(), self.state()));
    }

    fn state(&self) -> ComponentState {
        if self.stalled.load(Ordering::SeqCst) {
            ComponentState::Stalled
        } else {
            ComponentState::Ready
        }
    }
}

/// TTS backend recording utterances; playback honors cancellation.
pub struct RecordingTts {
    pub spoken: Mutex<Vec<String>>,
    pub playback: Duration,
}

impl RecordingTts {
    pub fn new(playback: Duration) -> Self {
        Self {
            spoken: Mutex::new(Vec::new()),
            playback,
        }
    }
}

impl TtsBackend for RecordingTts {
    fn speak(&self, text: &str, cancel: &AtomicBool) -> soma_spk::Result<()> {
        let deadline = std::time::Instant::now() + self.playback;
        while std::time::Instant::now() < deadline {
            if cancel.load(Ordering::Acquire) {
                return Ok(());
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        self.spoken.lock().push(text.to_string());
        Ok(())
    }
}

/// Fixed-state probe.
pub struct FixedProbe(pub ComponentState);

impl StatusProbe for FixedProbe {
    fn state(&self) -> ComponentState {
        self.0
    }
}

pub fn detection(label: &str, confidence: f32, bbox: BoundingBox) -> VisualDetection {
    VisualDetection {
        label: label.to_string(),
        confidence,
        box_2d: bbox,
        mask: None,
        position_3d: Vector3::new(0.4, 0.0, 0.2),
    }
}

/// Sharp high-contrast frame; `phase` shifts the pattern to defeat the
/// static-scene gate.
pub fn sharp_frame(phase: usize) -> PixelBuffer {
    let (w, h) = (64usize, 48usize);
    let mut data = Vec::with_capacity(w * h);
    for y in 0..h {
        for x in 0..w {
            data.push(if (x + y + phase) % 2 == 0 { 255 } else { 40 });
        }
    }
    PixelBuffer::new(w, h, 1, data)
}

/// Uniform mid-gray frame: bright but textureless, always gated Blurry.
pub fn blurry_frame() -> PixelBuffer {
    PixelBuffer::new(64, 48, 1, vec![128; 64 * 48])
}

pub fn robot_state() -> RobotState {
    RobotState::zeroed(6, Timestamp::now())
}
