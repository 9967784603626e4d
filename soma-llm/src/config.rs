//! Configuration for soma-llm

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Strategies retrieved per planning prompt.
    pub retrieval_top_k: usize,
    /// Minimum weighted similarity for a strategy to be included.
    pub retrieval_threshold: f64,
    /// Usage-count multiplier applied to retrieval scores.
    pub usage_weight: f64,
    /// Cognitive stream events folded into planning prompts.
    pub max_prompt_events: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            retrieval_top_k: 3,
            retrieval_threshold: 0.1,
            usage_weight: 0.1,
            max_prompt_events: 40,
        }
    }
}

impl LlmConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.retrieval_top_k == 0 {
            return Err("Retrieval top-k must be non-zero".to_string());
        }
        if self.retrieval_threshold < 0.0 {
            return Err("Retrieval threshold must be non-negative".to_string());
        }
        Ok(())
    }
}
