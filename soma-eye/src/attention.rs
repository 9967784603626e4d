//! Saliency fusion: bottom-up surprise, top-down task relevance, and
//! inhibition of return

use soma_core::types::VisualDetection;
use std::collections::HashMap;
use tracing::trace;

/// A detection annotated with its attention scores.
#[derive(Debug, Clone)]
pub struct AttentionalObject {
    pub detection: VisualDetection,
    pub bottom_up_score: f64,
    pub top_down_score: f64,
    pub total_saliency: f64,
}

/// Computes per-object saliency each tick.
///
/// Inhibition of return: labels the agent just attended to are suppressed
/// so it does not fixate; the suppression decays multiplicatively between
/// ticks.
pub struct AttentionEngine {
    weight_bottom_up: f64,
    weight_top_down: f64,
    inhibition: HashMap<String, f64>,
}

const INHIBIT_INCREMENT: f64 = 0.5;
const INHIBIT_DECAY: f64 = 0.9;
const INHIBIT_FLOOR: f64 = 1e-3;

impl AttentionEngine {
    pub fn new(weight_bottom_up: f64, weight_top_down: f64) -> Self {
        Self {
            weight_bottom_up,
            weight_top_down,
            inhibition: HashMap::new(),
        }
    }

    pub fn set_weights(&mut self, bottom_up: f64, top_down: f64) {
        self.weight_bottom_up = bottom_up;
        self.weight_top_down = top_down;
    }

    /// Fuse saliency for the current detections, sorted most salient first.
    pub fn compute_saliency(
        &self,
        detections: &[VisualDetection],
        task_keyword: &str,
        surprise_map: &HashMap<String, f64>,
    ) -> Vec<AttentionalObject> {
        let mut result: Vec<AttentionalObject> = detections
            .iter()
            .map(|det| {
                let surprise = surprise_map.get(&det.label).copied().unwrap_or(0.0);
                let bottom_up = det.confidence as f64 + 2.0 * surprise;

                let top_down = if !task_keyword.is_empty() && det.label.contains(task_keyword) {
                    1.0
                } else {
                    0.0
                };

                let inhibition = self.inhibition.get(&det.label).copied().unwrap_or(0.0);
                let total = self.weight_bottom_up * bottom_up + self.weight_top_down * top_down
                    - inhibition;

                trace!(label = %det.label, bottom_up, top_down, inhibition, total, "saliency");
                AttentionalObject {
                    detection: det.clone(),
                    bottom_up_score: bottom_up,
                    top_down_score: top_down,
                    total_saliency: total,
                }
            })
            .collect();

        result.sort_by(|a, b| {
            b.total_saliency
                .partial_cmp(&a.total_saliency)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        result
    }

    /// Suppress a label the agent just attended to.
    pub fn inhibit(&mut self, label: &str) {
        *self.inhibition.entry(label.to_string()).or_insert(0.0) += INHIBIT_INCREMENT;
    }

    /// End-of-tick multiplicative decay of all inhibition entries.
    pub fn decay(&mut self) {
        self.inhibition.retain(|_, value| {
            *value *= INHIBIT_DECAY;
            *value > INHIBIT_FLOOR
        });
    }

    pub fn inhibition_of(&self, label: &str) -> f64 {
        self.inhibition.get(label).copied().unwrap_or(0.0)
    }
}

impl Default for AttentionEngine {
    fn default() -> Self {
        Self::new(0.3, 0.7)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;
    use soma_core::types::BoundingBox;

    fn det(label: &str, confidence: f32) -> VisualDetection {
        VisualDetection {
            label: label.to_string(),
            confidence,
            box_2d: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            mask: None,
            position_3d: Vector3::zeros(),
        }
    }

    #[test]
    fn test_top_down_substring_match() {
        let engine = AttentionEngine::default();
        let objects = engine.compute_saliency(
            &[det("red cup", 0.5), det("bottle", 0.5)],
            "cup",
            &HashMap::new(),
        );
        assert_eq!(objects[0].detection.label, "red cup");
        assert_eq!(objects[0].top_down_score, 1.0);
        assert_eq!(objects[1].top_down_score, 0.0);
    }

    #[test]
    fn test_surprise_boosts_bottom_up() {
        let engine = AttentionEngine::default();
        let mut surprise = HashMap::new();
        surprise.insert("bottle".to_string(), 1.0);
        let objects =
            engine.compute_saliency(&[det("cup", 0.9), det("bottle", 0.1)], "", &surprise);
        // bottom_up(bottle) = 0.1 + 2.0 beats bottom_up(cup) = 0.9.
        assert_eq!(objects[0].detection.label, "bottle");
    }

    #[test]
    fn test_inhibition_of_return_cycle() {
        let mut engine = AttentionEngine::default();
        let detections = vec![det("cup", 0.9), det("bottle", 0.85)];
        let surprise = HashMap::new();

        let tick1 = engine.compute_saliency(&detections, "cup", &surprise);
        assert_eq!(tick1[0].detection.label, "cup");

        engine.inhibit("cup");
        engine.decay();
        assert!((engine.inhibition_of("cup") - 0.45).abs() < 1e-9);

        // cup: 0.3*0.9 + 0.7*1.0 - 0.45 = 0.52; bottle: 0.3*0.85 = 0.255.
        // With a weaker task match the runner-up can now win:
        let tick2 = engine.compute_saliency(&detections, "", &surprise);
        // cup: 0.27 - 0.45 = -0.18; bottle: 0.255.
        assert_eq!(tick2[0].detection.label, "bottle");
    }

    #[test]
    fn test_decay_prunes_stale_entries() {
        let mut engine = AttentionEngine::default();
        engine.inhibit("cup");
        for _ in 0..100 {
            engine.decay();
        }
        assert_eq!(engine.inhibition_of("cup"), 0.0);
    }
}
