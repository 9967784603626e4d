//! Configuration for soma-mind

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MindConfig {
    /// Minimum IoU for a detection to match an existing entity.
    pub iou_threshold: f64,
    /// Seconds an ordinary entity survives unseen.
    pub time_to_live: f64,
    /// Minimum confidence for an unmatched detection to spawn an entity.
    pub new_entity_confidence: f32,
    /// Entities older than this tolerate 2x time_to_live occlusion.
    pub old_entity_age: u32,
    /// Entities younger than this are pruned after young_prune_secs absence.
    pub young_entity_age: u32,
    pub young_prune_secs: f64,
    /// Cognitive stream depth.
    pub max_history: usize,
    /// Per-entity episodic history depth.
    pub max_entity_events: usize,
}

impl Default for MindConfig {
    fn default() -> Self {
        Self {
            iou_threshold: 0.3,
            time_to_live: 2.0,
            new_entity_confidence: 0.5,
            old_entity_age: 100,
            young_entity_age: 5,
            young_prune_secs: 0.5,
            max_history: 100,
            max_entity_events: 64,
        }
    }
}

impl MindConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err("IoU threshold must be in 0..=1".to_string());
        }
        if self.time_to_live <= 0.0 {
            return Err("Time to live must be positive".to_string());
        }
        if !(0.0..=1.0).contains(&self.new_entity_confidence) {
            return Err("New-entity confidence must be in 0..=1".to_string());
        }
        if self.max_history == 0 {
            return Err("Stream history must be non-zero".to_string());
        }
        Ok(())
    }
}
