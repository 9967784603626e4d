//! Configuration for soma-exec

use serde::{Deserialize, Serialize};
use soma_core::types::BoundingBox;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecConfig {
    /// Retries before a step escalates to FAILED.
    pub max_retries: u32,
    /// Score inertia for the task currently running.
    pub running_bonus: f64,
    /// Score gained per second of waiting; guarantees eventual progress.
    pub starvation_rate: f64,
    /// Score lost when a required resource is already busy.
    pub resource_penalty: f64,
    /// Score lost per meter of distance to the step's target.
    pub distance_weight: f64,
    /// Step timeout when the plan carries no expected duration, seconds.
    pub default_step_timeout: f64,
    /// Where a sought object is expected to appear absent a semantic map.
    pub default_expected_roi: BoundingBox,
    /// Tactile prior for grasp steps: expected force and tolerance, Newtons.
    pub grasp_expected_force: f64,
    pub grasp_force_tolerance: f64,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            running_bonus: 5.0,
            starvation_rate: 0.1,
            resource_penalty: 20.0,
            distance_weight: 1.0,
            default_step_timeout: 5.0,
            default_expected_roi: BoundingBox::new(200.0, 150.0, 240.0, 180.0),
            grasp_expected_force: 5.0,
            grasp_force_tolerance: 2.0,
        }
    }
}

impl ExecConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_retries == 0 {
            return Err("Max retries must be non-zero".to_string());
        }
        if self.starvation_rate < 0.0 {
            return Err("Starvation rate must be non-negative".to_string());
        }
        if self.default_step_timeout <= 0.0 {
            return Err("Step timeout must be positive".to_string());
        }
        Ok(())
    }
}
