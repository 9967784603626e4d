//! Configuration for soma-act

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Lower clamp of the stability factor.
    pub min_stability: f64,
    /// Additive per-tick recovery toward full gain.
    pub recovery_rate: f64,
    /// Predictive variance above which the controller explores.
    pub exploration_variance: f64,
    /// Exploratory force added per unit of variance.
    pub exploration_gain: f64,
    /// Full-gain velocity ceiling, m/s.
    pub max_velocity: f64,

    /// Seconds after which a running action is considered succeeded.
    pub action_success_secs: f64,

    /// Minimum priority advantage required to switch behaviors.
    pub hysteresis: f64,

    /// Muscle-memory node budget.
    pub muscle_max_nodes: usize,
    /// RBF kernel length scale for the default muscle memory.
    pub muscle_length_scale: f64,
    /// Surprise below which a full store refuses new samples.
    pub muscle_min_surprise: f64,
    /// Optional persistence path for the muscle-memory blob.
    pub muscle_path: Option<PathBuf>,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            min_stability: 0.2,
            recovery_rate: 0.01,
            exploration_variance: 0.5,
            exploration_gain: 2.0,
            max_velocity: 1.0,
            action_success_secs: 2.0,
            hysteresis: 0.1,
            muscle_max_nodes: 100,
            muscle_length_scale: 1.0,
            muscle_min_surprise: 0.2,
            muscle_path: None,
        }
    }
}

impl ControlConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.min_stability) {
            return Err("Min stability must be in 0..=1".to_string());
        }
        if self.recovery_rate <= 0.0 || self.recovery_rate > 1.0 {
            return Err("Recovery rate must be in (0, 1]".to_string());
        }
        if self.hysteresis < 0.0 {
            return Err("Hysteresis must be non-negative".to_string());
        }
        if self.muscle_max_nodes == 0 {
            return Err("Muscle node budget must be non-zero".to_string());
        }
        if self.muscle_length_scale <= 0.0 {
            return Err("Kernel length scale must be positive".to_string());
        }
        Ok(())
    }
}
