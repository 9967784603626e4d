//! Configuration for soma-eye

use serde::{Deserialize, Serialize};

/// Perception system configuration.
///
/// Every gating and VAD tunable is a constructor parameter; nothing is read
/// from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EyeConfig {
    /// Ring capacity for 1 kHz proprioceptive records.
    pub body_capacity: usize,
    /// Ring capacity for ~30 Hz camera frames.
    pub vision_capacity: usize,
    /// Ring capacity for raw audio chunks.
    pub audio_capacity: usize,
    /// Ring capacity for ASR transcripts.
    pub transcript_capacity: usize,

    /// Frames are downscaled to this width before gating.
    pub downscale_width: usize,
    /// Mean luminance at or below this marks the frame Dark.
    pub dark_threshold: f64,
    /// Variance of Laplacian; a frame is Blurry unless strictly above this.
    pub blur_threshold: f64,
    /// Per-pixel absolute difference counted as motion.
    pub motion_pixel_delta: u8,
    /// Percentage of moving pixels below which a frame is Static.
    pub motion_threshold: f64,
    /// Consecutive static skips before a frame is force-processed.
    pub force_process_interval: u32,

    /// RMS energy above which a chunk may be speech.
    pub energy_threshold: f64,
    /// Zero-crossing count at or above which a chunk is noise, not speech.
    pub zcr_threshold: usize,
    /// Non-speech chunks tolerated before an utterance is closed.
    pub max_silence_chunks: u32,

    /// Transcript delivery window relative to the query time, seconds.
    pub transcript_past_window: f64,
    pub transcript_future_window: f64,

    /// Full-charge voltage used to normalize battery level.
    pub nominal_battery_voltage: f64,
    /// Fixed power draw model for runtime estimation, Watts.
    pub avg_power_draw_w: f64,
    /// Battery capacity, Watt-hours.
    pub battery_capacity_wh: f64,
    /// Robot shoulder width for clearance estimation, meters.
    pub robot_width_m: f64,
}

impl Default for EyeConfig {
    fn default() -> Self {
        Self {
            body_capacity: 2000,
            vision_capacity: 100,
            audio_capacity: 500,
            transcript_capacity: 50,
            downscale_width: 320,
            dark_threshold: 20.0,
            blur_threshold: 100.0,
            motion_pixel_delta: 30,
            motion_threshold: 5.0,
            force_process_interval: 30,
            energy_threshold: 500.0,
            zcr_threshold: 1500,
            max_silence_chunks: 10,
            transcript_past_window: 2.0,
            transcript_future_window: 0.5,
            nominal_battery_voltage: 24.0,
            avg_power_draw_w: 50.0,
            battery_capacity_wh: 500.0,
            robot_width_m: 0.6,
        }
    }
}

impl EyeConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.body_capacity == 0
            || self.vision_capacity == 0
            || self.audio_capacity == 0
            || self.transcript_capacity == 0
        {
            return Err("Ring capacities must be non-zero".to_string());
        }
        if self.downscale_width == 0 || self.downscale_width > 4096 {
            return Err("Downscale width must be in 1..=4096".to_string());
        }
        if !self.blur_threshold.is_finite() || self.blur_threshold < 0.0 {
            return Err("Blur threshold must be finite and non-negative".to_string());
        }
        if !(0.0..=100.0).contains(&self.motion_threshold) {
            return Err("Motion threshold is a percentage in 0..=100".to_string());
        }
        if self.energy_threshold <= 0.0 {
            return Err("Energy threshold must be positive".to_string());
        }
        if self.transcript_past_window < 0.0 || self.transcript_future_window < 0.0 {
            return Err("Transcript windows must be non-negative".to_string());
        }
        if self.nominal_battery_voltage <= 0.0 {
            return Err("Nominal battery voltage must be positive".to_string());
        }
        Ok(())
    }
}
