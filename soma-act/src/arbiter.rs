//! Winner-take-all behavior arbitration with switch hysteresis

use serde_json::json;
use soma_core::types::EventType;
use soma_mind::CognitiveStream;
use tracing::{debug, info};

/// What the winning proposal asks the agent to do. Tagged data instead of
/// captured closures so dispatch is exhaustive and testable.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionCommand {
    SafetyStop,
    Grasp { target_id: u64 },
    LookAt { label: String },
    Speak { text: String },
    NoOp,
}

#[derive(Debug, Clone)]
pub struct ActionProposal {
    /// "SafetyReflex", "Task", "Exploration", "Idle".
    pub source: String,
    pub priority: f64,
    pub description: String,
    pub command: ActionCommand,
}

impl ActionProposal {
    pub fn new(
        source: &str,
        priority: f64,
        description: impl Into<String>,
        command: ActionCommand,
    ) -> Self {
        Self {
            source: source.to_string(),
            priority,
            description: description.into(),
            command,
        }
    }

    pub fn idle() -> Self {
        Self::new("Idle", 0.0, "idle", ActionCommand::NoOp)
    }
}

/// Selects one proposal per tick.
///
/// Hysteresis: a challenger that does not beat the runner-up by the
/// configured margin cannot unseat the previous winner while that winner is
/// still on offer. Switches are logged to the cognitive stream.
pub struct BehaviorArbiter {
    hysteresis: f64,
    last_winner: Option<String>,
}

impl BehaviorArbiter {
    pub fn new(hysteresis: f64) -> Self {
        Self {
            hysteresis,
            last_winner: None,
        }
    }

    pub fn last_winner(&self) -> Option<&str> {
        self.last_winner.as_deref()
    }

    pub fn arbitrate(
        &mut self,
        mut proposals: Vec<ActionProposal>,
        stream: &mut CognitiveStream,
    ) -> Option<ActionProposal> {
        if proposals.is_empty() {
            return None;
        }

        proposals.sort_by(|a, b| {
            b.priority
                .partial_cmp(&a.priority)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut winner_idx = 0;
        if let Some(last) = &self.last_winner {
            let advantage = proposals[0].priority
                - proposals.get(1).map(|p| p.priority).unwrap_or(0.0);
            if proposals[0].source != *last && advantage < self.hysteresis {
                // Hold the previous behavior if it is still on offer.
                if let Some(held) = proposals.iter().position(|p| p.source == *last) {
                    debug!(
                        challenger = %proposals[0].source,
                        held = %last,
                        advantage,
                        "hysteresis held previous winner"
                    );
                    winner_idx = held;
                }
            }
        }

        let winner = proposals.swap_remove(winner_idx);

        if self.last_winner.as_deref() != Some(winner.source.as_str()) {
            info!(
                from = self.last_winner.as_deref().unwrap_or("(none)"),
                to = %winner.source,
                priority = winner.priority,
                "behavior switch"
            );
            stream.add_event(
                EventType::DecisionSwitch,
                format!(
                    "Switching behavior: {} -> {}",
                    self.last_winner.as_deref().unwrap_or("(none)"),
                    winner.source
                ),
                json!({ "priority": winner.priority, "description": winner.description }),
            );
            self.last_winner = Some(winner.source.clone());
        }

        Some(winner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soma_mind::MindConfig;

    fn stream() -> CognitiveStream {
        CognitiveStream::new(&MindConfig::default())
    }

    fn proposal(source: &str, priority: f64) -> ActionProposal {
        ActionProposal::new(source, priority, source.to_lowercase(), ActionCommand::NoOp)
    }

    #[test]
    fn test_highest_priority_wins() {
        let mut arbiter = BehaviorArbiter::new(0.1);
        let mut stream = stream();
        let winner = arbiter
            .arbitrate(
                vec![
                    proposal("Idle", 0.0),
                    proposal("Task", 8.0),
                    proposal("Exploration", 3.0),
                ],
                &mut stream,
            )
            .unwrap();
        assert_eq!(winner.source, "Task");
        assert_eq!(arbiter.last_winner(), Some("Task"));
    }

    #[test]
    fn test_safety_always_dominates() {
        let mut arbiter = BehaviorArbiter::new(0.1);
        let mut stream = stream();
        let winner = arbiter
            .arbitrate(
                vec![
                    ActionProposal::new("SafetyReflex", 100.0, "halt", ActionCommand::SafetyStop),
                    proposal("Task", 15.0),
                ],
                &mut stream,
            )
            .unwrap();
        assert_eq!(winner.command, ActionCommand::SafetyStop);
    }

    #[test]
    fn test_hysteresis_holds_previous_winner() {
        let mut arbiter = BehaviorArbiter::new(0.1);
        let mut stream = stream();

        arbiter.arbitrate(
            vec![proposal("Task", 5.0), proposal("Exploration", 2.0)],
            &mut stream,
        );

        // The challenger leads by less than the hysteresis margin.
        let winner = arbiter
            .arbitrate(
                vec![proposal("Exploration", 5.05), proposal("Task", 5.0)],
                &mut stream,
            )
            .unwrap();
        assert_eq!(winner.source, "Task");
        assert_eq!(arbiter.last_winner(), Some("Task"));
    }

    #[test]
    fn test_clear_advantage_switches_and_logs() {
        let mut arbiter = BehaviorArbiter::new(0.1);
        let mut stream = stream();

        arbiter.arbitrate(vec![proposal("Task", 5.0)], &mut stream);
        let events_before = stream.len();

        let winner = arbiter
            .arbitrate(
                vec![proposal("Exploration", 9.0), proposal("Task", 5.0)],
                &mut stream,
            )
            .unwrap();
        assert_eq!(winner.source, "Exploration");
        // Exactly one switch event was appended.
        assert_eq!(stream.len(), events_before + 1);
        let prompt = stream.build_context_prompt();
        assert!(prompt.contains("[Decide] Switching behavior: Task -> Exploration"));
    }

    #[test]
    fn test_hysteresis_ignored_when_last_winner_absent() {
        let mut arbiter = BehaviorArbiter::new(0.1);
        let mut stream = stream();

        arbiter.arbitrate(vec![proposal("Task", 5.0)], &mut stream);
        let winner = arbiter
            .arbitrate(
                vec![proposal("Exploration", 5.05), proposal("Idle", 5.0)],
                &mut stream,
            )
            .unwrap();
        // Task is gone: the hold rule cannot apply.
        assert_eq!(winner.source, "Exploration");
    }

    #[test]
    fn test_empty_proposals_select_nothing() {
        let mut arbiter = BehaviorArbiter::new(0.1);
        let mut stream = stream();
        assert!(arbiter.arbitrate(Vec::new(), &mut stream).is_none());
    }
}
