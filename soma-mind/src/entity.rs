//! Persistent world entities and their common-sense knowledge

use nalgebra::Vector3;
use soma_core::types::BoundingBox;
use soma_core::Timestamp;
use std::collections::HashMap;

/// A weighted fact attached to an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeFact {
    pub confidence: f64,
    pub value: String,
}

impl KnowledgeFact {
    pub fn new(confidence: f64, value: impl Into<String>) -> Self {
        Self {
            confidence,
            value: value.into(),
        }
    }
}

/// A tracked 3D entity fused from successive detections.
///
/// `track_id` is unique for the life of the process and never reassigned
/// after pruning. Velocity is an EMA over measurement differences.
#[derive(Debug, Clone)]
pub struct WorldEntity {
    pub track_id: u64,
    pub category: String,
    pub last_box: BoundingBox,
    pub last_mask: Option<Vec<u8>>,
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    /// Updates survived since birth.
    pub age: u32,
    /// Consecutive matched updates; reset on a missed frame.
    pub hit_streak: u32,
    pub last_seen: Timestamp,
    pub knowledge_graph: HashMap<String, KnowledgeFact>,
}

impl WorldEntity {
    pub fn knowledge(&self, key: &str) -> Option<&KnowledgeFact> {
        self.knowledge_graph.get(key)
    }

    /// Category priors injected at birth. A graph store or LLM would feed
    /// this in a full deployment.
    pub(crate) fn inject_common_sense(&mut self) {
        let graph = &mut self.knowledge_graph;
        match self.category.as_str() {
            "cup" | "mug" => {
                graph.insert("graspable".into(), KnowledgeFact::new(1.0, "true"));
                graph.insert("material".into(), KnowledgeFact::new(0.6, "ceramic"));
                graph.insert("fragile".into(), KnowledgeFact::new(0.8, "true"));
            }
            "bottle" => {
                graph.insert("graspable".into(), KnowledgeFact::new(1.0, "true"));
                graph.insert("shape".into(), KnowledgeFact::new(1.0, "cylinder"));
            }
            "person" => {
                graph.insert("graspable".into(), KnowledgeFact::new(0.0, "false"));
                graph.insert("is_agent".into(), KnowledgeFact::new(1.0, "true"));
            }
            "apple" | "orange" => {
                graph.insert("edible".into(), KnowledgeFact::new(1.0, "true"));
                graph.insert("graspable".into(), KnowledgeFact::new(1.0, "true"));
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(category: &str) -> WorldEntity {
        let mut e = WorldEntity {
            track_id: 1,
            category: category.to_string(),
            last_box: BoundingBox::new(0.0, 0.0, 1.0, 1.0),
            last_mask: None,
            position: Vector3::zeros(),
            velocity: Vector3::zeros(),
            age: 1,
            hit_streak: 1,
            last_seen: Timestamp::ZERO,
            knowledge_graph: HashMap::new(),
        };
        e.inject_common_sense();
        e
    }

    #[test]
    fn test_cup_priors() {
        let cup = entity("cup");
        assert_eq!(cup.knowledge("graspable").unwrap().value, "true");
        assert!(cup.knowledge("fragile").unwrap().confidence > 0.5);
    }

    #[test]
    fn test_person_is_never_graspable() {
        let person = entity("person");
        assert_eq!(person.knowledge("graspable").unwrap().confidence, 0.0);
        assert_eq!(person.knowledge("is_agent").unwrap().value, "true");
    }

    #[test]
    fn test_unknown_category_has_no_priors() {
        assert!(entity("widget").knowledge_graph.is_empty());
    }
}
