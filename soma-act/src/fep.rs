//! Gain-modulated predictive controller
//!
//! Force tracks the muscle-memory prediction; uncertainty above the
//! exploration threshold adds exploratory drive. A stability factor scales
//! both force and the velocity ceiling: it collapses multiplicatively when
//! perception degrades and recovers additively every tick. The factor is an
//! atomic so `solve` may race `reduce_gain_for_stability` safely.

use crate::config::ControlConfig;
use crate::error::{ControlError, Result};
use crate::muscle::MuscleMemory;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlOutput {
    pub force: f64,
    pub velocity_limit: f64,
    pub is_exploring: bool,
}

pub struct FepController {
    config: ControlConfig,
    muscle: RwLock<Box<dyn MuscleMemory>>,
    /// f64 bits; acquire/release so concurrent readers see a clean value.
    stability_bits: AtomicU64,
}

impl FepController {
    pub fn new(config: ControlConfig, muscle: Box<dyn MuscleMemory>) -> Result<Self> {
        config.validate().map_err(ControlError::Configuration)?;
        let controller = Self {
            config,
            muscle: RwLock::new(muscle),
            stability_bits: AtomicU64::new(1.0f64.to_bits()),
        };
        controller.load_persisted()?;
        Ok(controller)
    }

    /// Startup load: a missing blob starts empty; a corrupt one is fatal.
    fn load_persisted(&self) -> Result<()> {
        let Some(path) = &self.config.muscle_path else {
            return Ok(());
        };
        if !path.exists() {
            info!(path = %path.display(), "no muscle memory blob; starting empty");
            return Ok(());
        }
        let blob = std::fs::read(path)?;
        self.muscle.write().load(&blob)?;
        info!(path = %path.display(), "muscle memory loaded");
        Ok(())
    }

    /// Persist the muscle blob if a path is configured.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.config.muscle_path else {
            return Ok(());
        };
        let blob = self.muscle.read().save()?;
        std::fs::write(path, &blob)?;
        debug!(path = %path.display(), bytes = blob.len(), "muscle memory saved");
        Ok(())
    }

    pub fn stability_factor(&self) -> f64 {
        f64::from_bits(self.stability_bits.load(Ordering::Acquire))
    }

    fn update_stability(&self, f: impl Fn(f64) -> f64) {
        let mut current = self.stability_bits.load(Ordering::Acquire);
        loop {
            let next = f(f64::from_bits(current)).to_bits();
            match self.stability_bits.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }

    /// Compute the gain-modulated control output for one feature vector.
    pub fn solve(&self, features: &[f64]) -> ControlOutput {
        let (mean, variance) = self.muscle.read().predict(features);

        let mut raw_force = mean;
        let is_exploring = variance > self.config.exploration_variance;
        if is_exploring {
            raw_force += variance * self.config.exploration_gain;
        }

        let stability = self.stability_factor();
        ControlOutput {
            force: raw_force * stability,
            velocity_limit: self.config.max_velocity * stability,
            is_exploring,
        }
    }

    /// Absorb feedback: surprise is the absolute prediction miss.
    pub fn learn(&self, features: &[f64], actual_best: f64, predicted: f64) {
        let surprise = (actual_best - predicted).abs();
        self.muscle.write().learn(features, actual_best, surprise);
    }

    /// Fast multiplicative collapse, invoked on degraded perception.
    pub fn reduce_gain_for_stability(&self) {
        let min = self.config.min_stability;
        self.update_stability(|s| (s * 0.5).max(min));
        warn!(
            stability = self.stability_factor(),
            "perception degraded; gain reduced"
        );
    }

    /// Slow additive recovery, invoked every tick.
    pub fn update_internal_state(&self) {
        let rate = self.config.recovery_rate;
        self.update_stability(|s| if s < 1.0 { (s + rate).min(1.0) } else { s });
    }
}
