//! Track-and-fuse of detections into persistent entities
//!
//! Per update: predict entity positions forward, greedily associate
//! detections by IoU within category, blend matched measurements, spawn
//! entities for confident orphans, and prune by age-dependent absence
//! rules. Owned by the tick thread; no internal locking.

use crate::config::MindConfig;
use crate::entity::WorldEntity;
use nalgebra::Vector3;
use soma_core::types::VisualDetection;
use soma_core::Timestamp;
use std::collections::HashMap;
use tracing::{debug, info};

const DEFAULT_DT_SECS: f64 = 0.033;
const VELOCITY_KEEP: f64 = 0.7;
const VELOCITY_BLEND: f64 = 0.3;
const POSITION_PREDICTED: f64 = 0.4;
const POSITION_MEASURED: f64 = 0.6;

pub struct ObjectCognitionEngine {
    config: MindConfig,
    entities: Vec<WorldEntity>,
    next_track_id: u64,
    last_update: Option<Timestamp>,
}

impl ObjectCognitionEngine {
    pub fn new(config: MindConfig) -> Self {
        Self {
            config,
            entities: Vec::new(),
            next_track_id: 1,
            last_update: None,
        }
    }

    /// Advance the world model with one frame's detections.
    pub fn update(&mut self, detections: &[VisualDetection], timestamp: Timestamp) {
        let dt = match self.last_update {
            Some(last) => {
                let dt = timestamp.seconds_since(last);
                if dt <= 0.0 {
                    0.001
                } else {
                    dt
                }
            }
            None => DEFAULT_DT_SECS,
        };
        self.last_update = Some(timestamp);

        // Predict: constant-velocity step.
        for entity in &mut self.entities {
            entity.position += entity.velocity * dt;
        }

        // Associate: per entity, the unmatched same-category detection with
        // the highest IoU above threshold; ties fall to the lower index.
        let mut matched = vec![false; detections.len()];
        for entity in &mut self.entities {
            let mut best: Option<(usize, f64)> = None;
            for (idx, det) in detections.iter().enumerate() {
                if matched[idx] || det.label != entity.category {
                    continue;
                }
                let iou = entity.last_box.iou(&det.box_2d) as f64;
                if iou <= self.config.iou_threshold {
                    continue;
                }
                if best.map_or(true, |(_, best_iou)| iou > best_iou) {
                    best = Some((idx, iou));
                }
            }

            match best {
                Some((idx, _)) => {
                    matched[idx] = true;
                    Self::blend_measurement(entity, &detections[idx], dt, timestamp);
                }
                None => entity.hit_streak = 0,
            }
        }

        // Birth: confident orphan detections become new entities.
        for (idx, det) in detections.iter().enumerate() {
            if matched[idx] || det.confidence <= self.config.new_entity_confidence {
                continue;
            }
            let mut entity = WorldEntity {
                track_id: self.next_track_id,
                category: det.label.clone(),
                last_box: det.box_2d,
                last_mask: det.mask.clone(),
                position: det.position_3d,
                velocity: Vector3::zeros(),
                age: 1,
                hit_streak: 1,
                last_seen: timestamp,
                knowledge_graph: HashMap::new(),
            };
            entity.inject_common_sense();
            info!(track_id = entity.track_id, category = %entity.category, "entity born");
            self.next_track_id += 1;
            self.entities.push(entity);
        }

        // Death: age-dependent absence pruning.
        let config = &self.config;
        let before = self.entities.len();
        self.entities.retain(|entity| {
            let unseen = timestamp.seconds_since(entity.last_seen);

            // Long-lived entities get object permanence across occlusion.
            if entity.age > config.old_entity_age {
                return unseen < config.time_to_live * 2.0;
            }
            // Newborns that vanish immediately are noise.
            if entity.age < config.young_entity_age {
                return unseen <= config.young_prune_secs;
            }
            unseen <= config.time_to_live
        });
        if before != self.entities.len() {
            debug!(pruned = before - self.entities.len(), "entities pruned");
        }
    }

    fn blend_measurement(
        entity: &mut WorldEntity,
        det: &VisualDetection,
        dt: f64,
        timestamp: Timestamp,
    ) {
        let measured_vel = (det.position_3d - entity.position) / dt;
        entity.velocity = entity.velocity * VELOCITY_KEEP + measured_vel * VELOCITY_BLEND;
        entity.position = entity.position * POSITION_PREDICTED + det.position_3d * POSITION_MEASURED;

        entity.last_box = det.box_2d;
        if det.mask.is_some() {
            entity.last_mask = det.mask.clone();
        }
        entity.age += 1;
        entity.hit_streak += 1;
        entity.last_seen = timestamp;
    }

    // --- queries; handles are valid for the current tick only ---

    pub fn get_by_id(&self, track_id: u64) -> Option<&WorldEntity> {
        self.entities.iter().find(|e| e.track_id == track_id)
    }

    /// Entities whose category contains `keyword` as a substring.
    pub fn find_by_category(&self, keyword: &str) -> Vec<&WorldEntity> {
        self.entities
            .iter()
            .filter(|e| e.category.contains(keyword))
            .collect()
    }

    pub fn iter_all(&self) -> impl Iterator<Item = &WorldEntity> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn insert_for_test(&mut self, entity: WorldEntity) {
        self.next_track_id = self.next_track_id.max(entity.track_id + 1);
        self.entities.push(entity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soma_core::types::BoundingBox;

    fn det(label: &str, confidence: f32, x: f32, pos_x: f64) -> VisualDetection {
        VisualDetection {
            label: label.to_string(),
            confidence,
            box_2d: BoundingBox::new(x, 10.0, 50.0, 50.0),
            mask: None,
            position_3d: Vector3::new(pos_x, 0.0, 0.0),
        }
    }

    fn t(secs: f64) -> Timestamp {
        Timestamp::from_secs_f64(secs)
    }

    #[test]
    fn test_confident_detection_births_entity() {
        let mut engine = ObjectCognitionEngine::new(MindConfig::default());
        engine.update(&[det("cup", 0.9, 10.0, 0.5)], t(0.0));
        assert_eq!(engine.len(), 1);
        let cup = engine.find_by_category("cup")[0];
        assert_eq!(cup.track_id, 1);
        assert_eq!(cup.age, 1);
        assert_eq!(cup.hit_streak, 1);
        assert_eq!(cup.knowledge("graspable").unwrap().value, "true");
    }

    #[test]
    fn test_low_confidence_orphan_ignored() {
        let mut engine = ObjectCognitionEngine::new(MindConfig::default());
        engine.update(&[det("cup", 0.3, 10.0, 0.5)], t(0.0));
        assert!(engine.is_empty());
    }

    #[test]
    fn test_association_keeps_track_id() {
        let mut engine = ObjectCognitionEngine::new(MindConfig::default());
        engine.update(&[det("cup", 0.9, 10.0, 0.5)], t(0.0));
        engine.update(&[det("cup", 0.9, 14.0, 0.55)], t(0.033));

        assert_eq!(engine.len(), 1);
        let cup = engine.get_by_id(1).unwrap();
        assert_eq!(cup.age, 2);
        assert_eq!(cup.hit_streak, 2);
        // Velocity EMA pulled toward the measured motion.
        assert!(cup.velocity.x > 0.0);
    }

    #[test]
    fn test_category_mismatch_never_associates() {
        let mut engine = ObjectCognitionEngine::new(MindConfig::default());
        engine.update(&[det("cup", 0.9, 10.0, 0.5)], t(0.0));
        engine.update(&[det("bottle", 0.9, 10.0, 0.5)], t(0.033));
        assert_eq!(engine.len(), 2);
    }

    #[test]
    fn test_age_always_at_least_hit_streak() {
        let mut engine = ObjectCognitionEngine::new(MindConfig::default());
        engine.update(&[det("cup", 0.9, 10.0, 0.5)], t(0.0));
        // Missed frame resets the streak but not the age.
        engine.update(&[], t(0.033));
        engine.update(&[det("cup", 0.9, 10.0, 0.5)], t(0.066));

        let cup = engine.get_by_id(1).unwrap();
        assert!(cup.age >= cup.hit_streak);
        assert_eq!(cup.hit_streak, 1);
    }

    #[test]
    fn test_young_noise_pruned_quickly() {
        let mut engine = ObjectCognitionEngine::new(MindConfig::default());
        engine.update(&[det("cup", 0.9, 10.0, 0.5)], t(0.0));
        engine.update(&[], t(0.6));
        assert!(engine.is_empty());
    }

    #[test]
    fn test_ordinary_entity_pruned_after_ttl() {
        let config = MindConfig::default();
        let mut engine = ObjectCognitionEngine::new(config.clone());
        // Build up age past the noise band.
        for i in 0..(config.young_entity_age + 1) {
            engine.update(&[det("cup", 0.9, 10.0, 0.5)], t(i as f64 * 0.033));
        }
        let last = (config.young_entity_age + 1) as f64 * 0.033;
        engine.update(&[], t(last + 1.9));
        assert_eq!(engine.len(), 1);
        engine.update(&[], t(last + 2.1));
        assert!(engine.is_empty());
    }

    #[test]
    fn test_old_entity_survives_occlusion() {
        // Entity with age 120 unseen for 3s: inside the 2x TTL tolerance.
        let mut engine = ObjectCognitionEngine::new(MindConfig::default());
        let mut veteran = WorldEntity {
            track_id: 7,
            category: "cup".to_string(),
            last_box: BoundingBox::new(10.0, 10.0, 50.0, 50.0),
            last_mask: None,
            position: Vector3::zeros(),
            velocity: Vector3::zeros(),
            age: 120,
            hit_streak: 0,
            last_seen: t(0.0),
            knowledge_graph: HashMap::new(),
        };
        veteran.inject_common_sense();
        engine.insert_for_test(veteran);

        engine.update(&[], t(3.0));
        assert!(engine.get_by_id(7).is_some());

        engine.update(&[], t(4.5));
        assert!(engine.get_by_id(7).is_none());
    }

    #[test]
    fn test_track_ids_never_reused() {
        let mut engine = ObjectCognitionEngine::new(MindConfig::default());
        engine.update(&[det("cup", 0.9, 10.0, 0.5)], t(0.0));
        // Let it die as noise, then birth a new one.
        engine.update(&[], t(0.6));
        engine.update(&[det("cup", 0.9, 10.0, 0.5)], t(0.7));

        assert!(engine.get_by_id(1).is_none());
        assert_eq!(engine.find_by_category("cup")[0].track_id, 2);
    }

    #[test]
    fn test_substring_category_query() {
        let mut engine = ObjectCognitionEngine::new(MindConfig::default());
        engine.update(
            &[det("red cup", 0.9, 10.0, 0.5), det("bottle", 0.9, 200.0, 1.0)],
            t(0.0),
        );
        assert_eq!(engine.find_by_category("cup").len(), 1);
        assert_eq!(engine.find_by_category("").len(), 2);
    }
}
