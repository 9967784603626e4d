//! Muscle memory: the controller's learned sensorimotor regressor
//!
//! The contract is deliberately small: predict a (mean, variance) pair for
//! a feature vector, learn from observed outcomes gated by surprise, and
//! round-trip through an opaque blob. `KernelMemory` is the default
//! implementation: a bounded node store with RBF distance weighting. It is
//! not a Gaussian process; variance is a coverage heuristic, not a
//! posterior.

use crate::config::ControlConfig;
use crate::error::{ControlError, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// High variance reported when the store has no data at all.
const COLD_START_VARIANCE: f64 = 100.0;

pub trait MuscleMemory: Send + Sync {
    /// Predicted (mean, variance) for a feature vector.
    fn predict(&self, features: &[f64]) -> (f64, f64);

    /// Absorb one observation; implementations may refuse low-surprise
    /// samples when full.
    fn learn(&mut self, features: &[f64], outcome: f64, surprise: f64);

    fn save(&self) -> Result<Bytes>;

    fn load(&mut self, blob: &[u8]) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MemoryNode {
    features: Vec<f64>,
    outcome: f64,
    score: f64,
}

/// Bounded RBF-weighted nearest-experience regressor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelMemory {
    nodes: Vec<MemoryNode>,
    max_nodes: usize,
    length_scale: f64,
    min_surprise: f64,
}

impl KernelMemory {
    pub fn new(config: &ControlConfig) -> Self {
        Self {
            nodes: Vec::new(),
            max_nodes: config.muscle_max_nodes,
            length_scale: config.muscle_length_scale,
            min_surprise: config.muscle_min_surprise,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn kernel(&self, a: &[f64], b: &[f64]) -> f64 {
        let sq_dist: f64 = a
            .iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f64>()
            + (a.len() as f64 - b.len() as f64).powi(2);
        (-0.5 * sq_dist / (self.length_scale * self.length_scale)).exp()
    }

    /// Drop the stored node closest to the incoming sample.
    fn prune_redundant(&mut self, features: &[f64]) {
        let closest = self
            .nodes
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| {
                self.kernel(features, &a.features)
                    .partial_cmp(&self.kernel(features, &b.features))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(idx, _)| idx);
        if let Some(idx) = closest {
            self.nodes.swap_remove(idx);
        }
    }
}

impl MuscleMemory for KernelMemory {
    fn predict(&self, features: &[f64]) -> (f64, f64) {
        if self.nodes.is_empty() {
            return (0.0, COLD_START_VARIANCE);
        }

        let mut weight_sum = 0.0;
        let mut weighted_outcome = 0.0;
        for node in &self.nodes {
            let w = self.kernel(features, &node.features);
            weight_sum += w;
            weighted_outcome += w * node.outcome;
        }

        if weight_sum < 1e-9 {
            // Far outside experience: no usable mean, maximal uncertainty.
            return (0.0, COLD_START_VARIANCE);
        }

        let mean = weighted_outcome / weight_sum;
        // Coverage heuristic: dense local experience drives variance down.
        let variance = 1.0 / (1.0 + weight_sum);
        (mean, variance)
    }

    fn learn(&mut self, features: &[f64], outcome: f64, surprise: f64) {
        if self.nodes.len() >= self.max_nodes {
            if surprise < self.min_surprise {
                return;
            }
            self.prune_redundant(features);
        }
        self.nodes.push(MemoryNode {
            features: features.to_vec(),
            outcome,
            score: surprise,
        });
        debug!(nodes = self.nodes.len(), surprise, "muscle memory updated");
    }

    fn save(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    fn load(&mut self, blob: &[u8]) -> Result<()> {
        *self = serde_json::from_slice(blob)
            .map_err(|e| ControlError::Load(format!("muscle blob: {e}")))?;
        Ok(())
    }
}
