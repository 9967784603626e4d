//! Sensor ingestion and time-aligned context assembly

use crate::asr::{AsrEngine, AsrWorker};
use crate::config::EyeConfig;
use crate::error::{PerceptionError, Result};
use crate::gating::{Detector, FrameGate, GateDecision, GrayFrame};
use crate::vad::VadMachine;
use parking_lot::Mutex;
use soma_core::types::{
    AudioChunk, AudioTranscript, ComponentState, EnvMetrics, FrameQuality, FusedContext,
    PixelBuffer, RobotState, StatusProbe, SystemStatus, VisualFrame,
};
use soma_core::{RingTrack, StateInterpolator, Timestamp};
use std::sync::Arc;
use tracing::{debug, warn};

/// Mocked passable-width estimate until a depth source is wired in.
const ESTIMATED_PASSAGE_WIDTH_M: f64 = 2.5;

/// Owns the four sensor ring tracks and the perceptual gating pipeline.
///
/// Driver callbacks run on driver threads and only push into ring tracks;
/// the tick thread queries through [`PerceptionSystem::get_context`].
pub struct PerceptionSystem {
    config: EyeConfig,
    body_track: Arc<RingTrack<RobotState>>,
    vision_track: Arc<RingTrack<VisualFrame>>,
    audio_track: Arc<RingTrack<AudioChunk>>,
    text_track: Arc<RingTrack<AudioTranscript>>,
    gate: Mutex<FrameGate>,
    vad: Mutex<VadMachine>,
    detector: Arc<dyn Detector>,
    asr: AsrWorker,
    camera_probe: Option<Arc<dyn StatusProbe>>,
    body_probe: Option<Arc<dyn StatusProbe>>,
    mic_probe: Option<Arc<dyn StatusProbe>>,
}

impl PerceptionSystem {
    pub fn new(
        config: EyeConfig,
        detector: Arc<dyn Detector>,
        asr_engine: Arc<dyn AsrEngine>,
        sample_rate: u32,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(PerceptionError::Configuration)?;

        let text_track = Arc::new(RingTrack::new(config.transcript_capacity));
        let asr = AsrWorker::spawn(asr_engine, sample_rate, text_track.clone());

        Ok(Self {
            body_track: Arc::new(RingTrack::new(config.body_capacity)),
            vision_track: Arc::new(RingTrack::new(config.vision_capacity)),
            audio_track: Arc::new(RingTrack::new(config.audio_capacity)),
            text_track,
            gate: Mutex::new(FrameGate::new(&config)),
            vad: Mutex::new(VadMachine::new(&config)),
            detector,
            asr,
            camera_probe: None,
            body_probe: None,
            mic_probe: None,
            config,
        })
    }

    /// Attach non-owning driver state accessors. Drivers outlive perception.
    pub fn attach_probes(
        &mut self,
        camera: Option<Arc<dyn StatusProbe>>,
        body: Option<Arc<dyn StatusProbe>>,
        mic: Option<Arc<dyn StatusProbe>>,
    ) {
        self.camera_probe = camera;
        self.body_probe = body;
        self.mic_probe = mic;
    }

    // --- driver callbacks (driver threads) ---

    /// Camera callback. `t_capture` precedes reception; gating runs inline
    /// on the driver thread, detection only for frames that pass all gates.
    pub fn on_camera_frame(&self, image: PixelBuffer, t_capture: Timestamp) {
        let Some(gray) = GrayFrame::from_pixels(&image, self.config.downscale_width) else {
            warn!("dropping malformed camera frame");
            return;
        };

        let decision = self.gate.lock().evaluate(&gray);
        let frame = match decision {
            GateDecision::Dark { mean_luminance } => {
                debug!(mean_luminance, "frame gated: dark");
                VisualFrame {
                    timestamp: t_capture,
                    image,
                    quality: FrameQuality::Dark,
                    blur_score: 0.0,
                    motion_score: 0.0,
                    detections: Vec::new(),
                    vlm_desc: None,
                }
            }
            GateDecision::Blurry { blur_score } => {
                debug!(blur_score, "frame gated: blurry");
                VisualFrame {
                    timestamp: t_capture,
                    image,
                    quality: FrameQuality::Blurry,
                    blur_score,
                    motion_score: 0.0,
                    detections: Vec::new(),
                    vlm_desc: None,
                }
            }
            GateDecision::Static {
                blur_score,
                motion_score,
            } => VisualFrame {
                timestamp: t_capture,
                image,
                quality: FrameQuality::Static,
                blur_score,
                motion_score,
                detections: Vec::new(),
                vlm_desc: None,
            },
            GateDecision::Process {
                blur_score,
                motion_score,
            } => {
                let detections = self.detector.detect(&image);
                debug!(count = detections.len(), "detection ran");
                VisualFrame {
                    timestamp: t_capture,
                    image,
                    quality: FrameQuality::Valid,
                    blur_score,
                    motion_score,
                    detections,
                    vlm_desc: None,
                }
            }
        };
        self.vision_track.push(frame);
    }

    /// Proprioceptive callback, ~1 kHz. Must stay sub-microsecond.
    pub fn on_imu_joint(&self, state: RobotState) {
        self.body_track.push(state);
    }

    /// Microphone callback: archives the raw chunk and advances the VAD.
    pub fn on_audio_mic(&self, pcm: &[i16], sample_rate: u32) {
        self.audio_track.push(AudioChunk {
            timestamp: Timestamp::now(),
            pcm: pcm.to_vec(),
            sample_rate,
        });

        let utterance = self.vad.lock().push_chunk(pcm);
        if let Some(pcm) = utterance {
            debug!(samples = pcm.len(), "utterance closed, queueing for ASR");
            self.asr.enqueue(pcm);
        }
    }

    // --- tick-thread queries ---

    /// Assemble the time-sliced view at `t_query`.
    pub fn get_context(&self, t_query: Timestamp) -> FusedContext {
        let robot = match self.body_track.get_bracket(t_query) {
            (Some(before), Some(after)) => {
                StateInterpolator::interpolate(&before, &after, t_query)
            }
            (Some(latest), None) => StateInterpolator::extrapolate(&latest, t_query),
            _ => RobotState::zeroed(0, t_query),
        };

        let vision = match self.vision_track.get_bracket(t_query) {
            (Some(before), _) if before.timestamp <= t_query => Some(before),
            _ => None,
        };

        let latest_transcript = self.text_track.get_latest().filter(|t| {
            if t.processed {
                return false;
            }
            let age = t_query.seconds_since(t.t_end);
            age < self.config.transcript_past_window && age > -self.config.transcript_future_window
        });

        let system_status = self.system_status();
        let env_metrics = self.env_metrics(&system_status);

        FusedContext {
            timestamp: t_query,
            robot,
            vision,
            latest_transcript,
            system_status,
            env_metrics,
            attention_hint: String::new(),
        }
    }

    /// Mark the newest transcript consumed so it is never re-delivered.
    /// Idempotent.
    pub fn mark_transcript_processed(&self) {
        self.text_track.modify_latest(|t| t.processed = true);
    }

    /// Live component states straight from the driver accessors.
    pub fn system_status(&self) -> SystemStatus {
        let state_of = |probe: &Option<Arc<dyn StatusProbe>>| {
            probe
                .as_ref()
                .map(|p| p.state())
                .unwrap_or(ComponentState::Offline)
        };

        let battery_voltage = self
            .body_probe
            .as_ref()
            .and_then(|p| p.battery_voltage())
            .unwrap_or(self.config.nominal_battery_voltage);
        let cpu_temperature = self
            .body_probe
            .as_ref()
            .and_then(|p| p.cpu_temperature())
            .unwrap_or(0.0);

        SystemStatus {
            vision_state: state_of(&self.camera_probe),
            arm_state: state_of(&self.body_probe),
            audio_state: state_of(&self.mic_probe),
            battery_voltage,
            cpu_temperature,
        }
    }

    fn env_metrics(&self, status: &SystemStatus) -> EnvMetrics {
        let battery_level =
            (status.battery_voltage / self.config.nominal_battery_voltage).clamp(0.0, 1.0);
        let estimated_runtime_min =
            self.config.battery_capacity_wh * battery_level / self.config.avg_power_draw_w * 60.0;
        EnvMetrics {
            battery_level,
            estimated_runtime_min,
            clearance_ratio: ESTIMATED_PASSAGE_WIDTH_M / self.config.robot_width_m,
        }
    }

    // --- introspection used by the agent and tests ---

    pub fn body_track(&self) -> &RingTrack<RobotState> {
        &self.body_track
    }

    pub fn vision_track(&self) -> &RingTrack<VisualFrame> {
        &self.vision_track
    }

    pub fn audio_track(&self) -> &RingTrack<AudioChunk> {
        &self.audio_track
    }

    pub fn transcript_track(&self) -> &RingTrack<AudioTranscript> {
        &self.text_track
    }

    pub fn pending_asr(&self) -> usize {
        self.asr.pending()
    }
}
