//! Shared data model: sensor records, fused context, cognitive events

use crate::time::{HasTimestamp, Timestamp};
use nalgebra::{DVector, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Lifecycle state of a hardware component or subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComponentState {
    Offline,
    Initializing,
    Ready,
    Active,
    Stalled,
    Error,
    Occluded,
}

/// Perceptual quality verdict attached to every camera frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameQuality {
    Valid,
    Blurry,
    Static,
    Dark,
}

/// Axis-aligned 2D box in pixel coordinates, (x, y, width, height).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn area(&self) -> f32 {
        if self.w <= 0.0 || self.h <= 0.0 {
            return 0.0;
        }
        self.w * self.h
    }

    fn intersection_area(&self, other: &BoundingBox) -> f32 {
        let x_min = self.x.max(other.x);
        let y_min = self.y.max(other.y);
        let x_max = (self.x + self.w).min(other.x + other.w);
        let y_max = (self.y + self.h).min(other.y + other.h);
        if x_max <= x_min || y_max <= y_min {
            return 0.0;
        }
        (x_max - x_min) * (y_max - y_min)
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.intersection_area(other) > 0.0
    }

    /// Intersection over union. Degenerate or non-finite boxes score 0.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let coords = [
            self.x, self.y, self.w, self.h, other.x, other.y, other.w, other.h,
        ];
        if coords.iter().any(|c| !c.is_finite()) {
            return 0.0;
        }
        if self.w < 0.0 || self.h < 0.0 || other.w < 0.0 || other.h < 0.0 {
            return 0.0;
        }

        let inter = self.intersection_area(other);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 || !union.is_finite() {
            return 0.0;
        }

        let iou = inter / union;
        if iou.is_finite() && (0.0..=1.0).contains(&iou) {
            iou
        } else {
            0.0
        }
    }
}

/// High-rate proprioceptive state, produced at ~1 kHz. Immutable once pushed.
#[derive(Debug, Clone)]
pub struct RobotState {
    pub timestamp: Timestamp,
    pub joint_pos: DVector<f64>,
    pub joint_vel: DVector<f64>,
    pub ee_pos: Vector3<f64>,
    pub ee_rot: UnitQuaternion<f64>,
    pub imu_acc: Vector3<f64>,
    /// End-effector contact force estimate, Newtons.
    pub ee_force: f64,
    pub head_yaw: f32,
    pub head_pitch: f32,
}

impl RobotState {
    /// A zeroed state with `dof` joints, useful as a cold-start placeholder.
    pub fn zeroed(dof: usize, timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            joint_pos: DVector::zeros(dof),
            joint_vel: DVector::zeros(dof),
            ee_pos: Vector3::zeros(),
            ee_rot: UnitQuaternion::identity(),
            imu_acc: Vector3::zeros(),
            ee_force: 0.0,
            head_yaw: 0.0,
            head_pitch: 0.0,
        }
    }
}

impl HasTimestamp for RobotState {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

/// A single detector output within one frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualDetection {
    pub label: String,
    pub confidence: f32,
    pub box_2d: BoundingBox,
    /// Opaque instance mask payload, if the detector produced one.
    pub mask: Option<Vec<u8>>,
    pub position_3d: Vector3<f64>,
}

/// Raw interleaved pixel buffer handed over by the camera driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub width: usize,
    pub height: usize,
    /// Bytes per pixel (1 = grayscale, 3 = RGB).
    pub channels: usize,
    pub data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: usize, height: usize, channels: usize, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            channels,
            data,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty() || self.width == 0 || self.height == 0
    }
}

/// One camera frame after gating, ~30 Hz.
#[derive(Debug, Clone)]
pub struct VisualFrame {
    pub timestamp: Timestamp,
    pub image: PixelBuffer,
    pub quality: FrameQuality,
    pub blur_score: f64,
    pub motion_score: f64,
    pub detections: Vec<VisualDetection>,
    pub vlm_desc: Option<String>,
}

impl HasTimestamp for VisualFrame {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

/// Raw microphone chunk, 16-bit signed PCM.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub timestamp: Timestamp,
    pub pcm: Vec<i16>,
    pub sample_rate: u32,
}

impl HasTimestamp for AudioChunk {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

/// ASR output, emitted only on VAD end-of-utterance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioTranscript {
    /// Time the utterance ended.
    pub t_end: Timestamp,
    pub text: String,
    pub speaker_id: Option<String>,
    pub confidence: f64,
    /// Set once the agent has consumed this transcript.
    pub processed: bool,
}

impl HasTimestamp for AudioTranscript {
    fn timestamp(&self) -> Timestamp {
        self.t_end
    }
}

/// Live health snapshot of the hardware stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    pub vision_state: ComponentState,
    pub arm_state: ComponentState,
    pub audio_state: ComponentState,
    pub battery_voltage: f64,
    pub cpu_temperature: f64,
}

impl Default for SystemStatus {
    fn default() -> Self {
        Self {
            vision_state: ComponentState::Offline,
            arm_state: ComponentState::Offline,
            audio_state: ComponentState::Offline,
            battery_voltage: 0.0,
            cpu_temperature: 0.0,
        }
    }
}

/// Embodied environment estimates derived from system status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvMetrics {
    /// Battery fraction in [0, 1] against nominal full voltage.
    pub battery_level: f64,
    pub estimated_runtime_min: f64,
    /// Passable-width estimate divided by robot shoulder width.
    pub clearance_ratio: f64,
}

/// Time-sliced view over all sensor tracks, assembled on demand.
#[derive(Debug, Clone)]
pub struct FusedContext {
    pub timestamp: Timestamp,
    /// Interpolated (or one-step extrapolated) proprioceptive state.
    pub robot: RobotState,
    /// Latest frame at or before the query time.
    pub vision: Option<VisualFrame>,
    /// Unprocessed transcript inside the delivery window, if any.
    pub latest_transcript: Option<AudioTranscript>,
    pub system_status: SystemStatus,
    pub env_metrics: EnvMetrics,
    /// Top-down focus keyword handed down from the executive.
    pub attention_hint: String,
}

/// Category of a cognitive stream entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    PerceptionVisual,
    PerceptionAudio,
    PerceptionBody,
    ThoughtChain,
    DecisionSwitch,
    ActionPhysical,
    ActionVerbal,
}

impl EventType {
    /// Prefix marker used when serializing the stream for an LLM prompt.
    pub fn marker(&self) -> &'static str {
        match self {
            EventType::PerceptionVisual => "[Eye]",
            EventType::PerceptionAudio => "[Ear]",
            EventType::PerceptionBody => "[Body]",
            EventType::ThoughtChain => "[Think]",
            EventType::DecisionSwitch => "[Decide]",
            EventType::ActionPhysical => "[Act]",
            EventType::ActionVerbal => "[Say]",
        }
    }
}

/// One entry in the append-only cognitive stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CognitiveEvent {
    pub timestamp: Timestamp,
    pub event_type: EventType,
    pub summary: String,
    pub detailed_data: JsonValue,
}

impl CognitiveEvent {
    pub fn new(event_type: EventType, summary: impl Into<String>, detailed_data: JsonValue) -> Self {
        Self {
            timestamp: Timestamp::now(),
            event_type,
            summary: summary.into(),
            detailed_data,
        }
    }
}

impl HasTimestamp for CognitiveEvent {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

/// Non-owning handle into a hardware driver's state accessor.
///
/// Drivers outlive the perception system; perception only ever reads.
pub trait StatusProbe: Send + Sync {
    fn state(&self) -> ComponentState;

    fn battery_voltage(&self) -> Option<f64> {
        None
    }

    fn cpu_temperature(&self) -> Option<f64> {
        None
    }
}
