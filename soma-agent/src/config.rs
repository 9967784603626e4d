//! Top-level agent configuration

use serde::{Deserialize, Serialize};
use soma_act::ControlConfig;
use soma_exec::ExecConfig;
use soma_eye::EyeConfig;
use soma_llm::LlmConfig;
use soma_mind::MindConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub eye: EyeConfig,
    pub mind: MindConfig,
    pub llm: LlmConfig,
    pub exec: ExecConfig,
    pub control: ControlConfig,

    /// Joint count for zero-torque safety commands.
    pub dof: usize,
    /// Microphone sample rate handed to the ASR worker.
    pub sample_rate: u32,
    /// Attention fusion weights.
    pub attention_weight_bottom_up: f64,
    pub attention_weight_top_down: f64,
    /// Identical commands inside this window are ignored, seconds.
    pub command_debounce_secs: f64,
    /// Saliency gates for curiosity-driven proposals.
    pub exploration_bottom_up_min: f64,
    pub exploration_top_down_max: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            eye: EyeConfig::default(),
            mind: MindConfig::default(),
            llm: LlmConfig::default(),
            exec: ExecConfig::default(),
            control: ControlConfig::default(),
            dof: 6,
            sample_rate: 16_000,
            attention_weight_bottom_up: 0.3,
            attention_weight_top_down: 0.7,
            command_debounce_secs: 2.0,
            exploration_bottom_up_min: 0.8,
            exploration_top_down_max: 0.2,
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.eye.validate()?;
        self.mind.validate()?;
        self.llm.validate()?;
        self.exec.validate()?;
        self.control.validate()?;
        if self.dof == 0 {
            return Err("Joint count must be non-zero".to_string());
        }
        if self.sample_rate == 0 {
            return Err("Sample rate must be non-zero".to_string());
        }
        if self.command_debounce_secs < 0.0 {
            return Err("Debounce window must be non-negative".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(AgentConfig::default().validate().is_ok());
    }

    #[test]
    fn test_nested_validation_propagates() {
        let mut config = AgentConfig::default();
        config.eye.vision_capacity = 0;
        assert!(config.validate().is_err());
    }
}
