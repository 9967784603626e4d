//! Bounded stream of consciousness feeding LLM context

use crate::config::MindConfig;
use serde_json::{json, Value as JsonValue};
use soma_core::types::{
    CognitiveEvent, ComponentState, EventType, FrameQuality, FusedContext, SystemStatus,
};
use std::collections::VecDeque;
use tracing::debug;

/// Append-only event log with bounded history.
///
/// Status-transition events are deduplicated: a body event is only emitted
/// when frame quality or arm state actually changes.
pub struct CognitiveStream {
    events: VecDeque<CognitiveEvent>,
    max_history: usize,
    last_frame_quality: FrameQuality,
    last_arm_state: ComponentState,
}

impl CognitiveStream {
    pub fn new(config: &MindConfig) -> Self {
        Self {
            events: VecDeque::with_capacity(config.max_history),
            max_history: config.max_history,
            last_frame_quality: FrameQuality::Valid,
            last_arm_state: ComponentState::Ready,
        }
    }

    pub fn add_event(&mut self, event_type: EventType, summary: impl Into<String>, data: JsonValue) {
        let event = CognitiveEvent::new(event_type, summary, data);
        debug!(event = ?event.event_type, summary = %event.summary, "stream event");
        self.events.push_back(event);
        if self.events.len() > self.max_history {
            self.events.pop_front();
        }
    }

    /// Record the visual side of a fused context: quality transitions as
    /// body events, clear-frame detections as visual events.
    pub fn add_visual_context(&mut self, ctx: &FusedContext) {
        let Some(frame) = &ctx.vision else { return };

        if frame.quality != self.last_frame_quality {
            let summary = match frame.quality {
                FrameQuality::Blurry => "Vision became BLURRY (motion/focus issue).",
                FrameQuality::Dark => "Vision became DARK.",
                FrameQuality::Static => "Vision settled to a STATIC scene.",
                FrameQuality::Valid => "Vision recovered to NORMAL.",
            };
            self.add_event(
                EventType::PerceptionBody,
                summary,
                json!({ "quality": format!("{:?}", frame.quality) }),
            );
            self.last_frame_quality = frame.quality;
        }

        if frame.quality == FrameQuality::Valid && !frame.detections.is_empty() {
            let labels: Vec<&str> = frame.detections.iter().map(|d| d.label.as_str()).collect();
            let payload: Vec<JsonValue> = frame
                .detections
                .iter()
                .map(|d| json!({ "label": d.label, "conf": d.confidence }))
                .collect();
            self.add_event(
                EventType::PerceptionVisual,
                format!("Saw objects: {}", labels.join(", ")),
                JsonValue::Array(payload),
            );
        }
    }

    /// Record arm-state transitions. Other component states are
    /// intentionally not tracked here.
    pub fn add_system_status(&mut self, status: &SystemStatus) {
        if status.arm_state == self.last_arm_state {
            return;
        }
        let summary = match status.arm_state {
            ComponentState::Stalled => "Arm state changed to: STALLED (error).",
            ComponentState::Active => "Arm state changed to: ACTIVE.",
            _ => "Arm state changed to: IDLE.",
        };
        self.add_event(
            EventType::PerceptionBody,
            summary,
            json!({ "arm_state": format!("{:?}", status.arm_state) }),
        );
        self.last_arm_state = status.arm_state;
    }

    /// Serialize the stream for an LLM prompt, oldest first, with
    /// type-prefix markers.
    pub fn build_context_prompt(&self) -> String {
        let mut prompt = String::from("### Recent Stream of Consciousness ###\n");
        for event in &self.events {
            prompt.push_str(event.event_type.marker());
            prompt.push(' ');
            prompt.push_str(&event.summary);
            prompt.push('\n');
        }
        prompt
    }

    /// Full history snapshot for reflective learning.
    pub fn episode_history(&self) -> Vec<CognitiveEvent> {
        self.events.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
