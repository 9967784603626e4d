//! Per-entity episodic memory: who did what, when
//!
//! Feeds structured context blocks into planner prompts so decisions can
//! respect an entity's recent history.

use crate::config::MindConfig;
use serde_json::{json, Value as JsonValue};
use soma_core::Timestamp;
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// One observed episode involving an entity.
#[derive(Debug, Clone)]
pub struct EntityEvent {
    pub timestamp: Timestamp,
    pub description: String,
    pub action_type: String,
}

/// Attributes, state tags, and bounded event timeline for one entity.
#[derive(Debug, Clone, Default)]
pub struct EntityProfile {
    pub attributes: HashMap<String, String>,
    pub current_states: Vec<String>,
    pub history: VecDeque<EntityEvent>,
    /// LLM-compressed summary once the timeline outgrows itself.
    pub long_term_summary: String,
}

/// Global entity memory, keyed by track id.
pub struct EntityMemoryManager {
    profiles: HashMap<u64, EntityProfile>,
    max_events: usize,
}

impl EntityMemoryManager {
    pub fn new(config: &MindConfig) -> Self {
        Self {
            profiles: HashMap::new(),
            max_events: config.max_entity_events,
        }
    }

    /// Append an observed episode for an entity.
    pub fn record_observation(
        &mut self,
        entity_id: u64,
        description: impl Into<String>,
        action_type: impl Into<String>,
    ) {
        let profile = self.profiles.entry(entity_id).or_default();
        profile.history.push_back(EntityEvent {
            timestamp: Timestamp::now(),
            description: description.into(),
            action_type: action_type.into(),
        });
        if profile.history.len() > self.max_events {
            profile.history.pop_front();
        }
        debug!(entity_id, "recorded entity observation");
    }

    pub fn update_attribute(
        &mut self,
        entity_id: u64,
        key: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.profiles
            .entry(entity_id)
            .or_default()
            .attributes
            .insert(key.into(), value.into());
    }

    /// JSON context block (attributes + most recent events) for LLM prompts.
    pub fn entity_context(&self, entity_id: u64, limit_events: usize) -> JsonValue {
        let Some(profile) = self.profiles.get(&entity_id) else {
            return json!({});
        };

        let recent: Vec<JsonValue> = profile
            .history
            .iter()
            .rev()
            .take(limit_events)
            .map(|e| {
                json!({
                    "t_us": e.timestamp.as_micros(),
                    "desc": e.description,
                    "action": e.action_type,
                })
            })
            .collect();

        json!({
            "attributes": profile.attributes,
            "states": profile.current_states,
            "summary": profile.long_term_summary,
            "recent_history": recent,
        })
    }

    pub fn profile(&self, entity_id: u64) -> Option<&EntityProfile> {
        self.profiles.get(&entity_id)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
