//! Single-flight asynchronous strategic planning
//!
//! One planning future per executive: triggers while a request is in flight
//! are suppressed, unless the new trigger is critical, in which case it
//! supersedes the stale request. The tick thread polls with zero timeout.

use crate::error::{LlmError, Result};
use crate::model::LanguageModel;
use crate::strategy::strip_code_fences;
use serde::Deserialize;
use std::fmt::Write as _;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One planned step as produced by the oracle.
#[derive(Debug, Clone, Deserialize)]
pub struct PlannedStep {
    #[serde(default = "PlannedStep::fresh_id")]
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub verb: String,
}

impl PlannedStep {
    fn fresh_id() -> String {
        Uuid::new_v4().to_string()
    }
}

/// One planned task with its base priority, named on the LLM side.
#[derive(Debug, Clone, Deserialize)]
pub struct PlannedTask {
    pub instruction: String,
    #[serde(default)]
    pub priority: String,
    pub steps: Vec<PlannedStep>,
}

impl PlannedTask {
    /// Map the named level onto the numeric base-priority scale.
    pub fn base_priority(&self) -> u8 {
        match self.priority.as_str() {
            "BACKGROUND" => 0,
            "URGENT" => 80,
            "CRITICAL" => 100,
            _ => 50,
        }
    }
}

/// Parsed planning result.
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub tasks: Vec<PlannedTask>,
    pub reasoning: String,
}

#[derive(Debug, Deserialize)]
struct PlanResponse {
    #[serde(default)]
    reasoning: String,
    tasks: Vec<PlannedTask>,
}

/// Non-blocking poll result.
#[derive(Debug)]
pub enum PlanPoll {
    /// No request in flight.
    Idle,
    /// Request in flight, no result yet.
    Pending,
    Ready(PlanOutcome),
    Failed(LlmError),
}

struct InFlight {
    rx: oneshot::Receiver<Result<PlanOutcome>>,
    task: tokio::task::JoinHandle<()>,
    critical: bool,
    reason: String,
}

/// Owns the (at most one) planning future.
pub struct StrategicPlanner {
    model: Arc<dyn LanguageModel>,
    handle: Handle,
    inflight: Option<InFlight>,
}

impl StrategicPlanner {
    pub fn new(model: Arc<dyn LanguageModel>, handle: Handle) -> Self {
        Self {
            model,
            handle,
            inflight: None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.inflight.is_some()
    }

    /// Start a planning request. Returns false when suppressed by the
    /// single-flight invariant; a critical trigger supersedes the in-flight
    /// request instead.
    pub fn trigger(&mut self, prompt: String, reason: &str, critical: bool) -> bool {
        if let Some(inflight) = &self.inflight {
            if !critical {
                debug!(reason, suppressed_by = %inflight.reason, "planning trigger suppressed");
                return false;
            }
            warn!(
                stale = %inflight.reason,
                reason, "critical trigger supersedes in-flight planning"
            );
            inflight.task.abort();
        }

        info!(reason, "planning triggered");
        let (tx, rx) = oneshot::channel();
        let model = self.model.clone();
        let task = self.handle.spawn(async move {
            let result = match model.complete(&prompt).await {
                Ok(text) => parse_outcome(&text),
                Err(err) => Err(err),
            };
            let _ = tx.send(result);
        });

        self.inflight = Some(InFlight {
            rx,
            task,
            critical,
            reason: reason.to_string(),
        });
        true
    }

    /// Zero-timeout poll; clears the in-flight slot on completion.
    pub fn poll(&mut self) -> PlanPoll {
        let Some(inflight) = &mut self.inflight else {
            return PlanPoll::Idle;
        };

        match inflight.rx.try_recv() {
            Ok(Ok(outcome)) => {
                info!(
                    tasks = outcome.tasks.len(),
                    reasoning = %outcome.reasoning,
                    "plan ready"
                );
                self.inflight = None;
                PlanPoll::Ready(outcome)
            }
            Ok(Err(err)) => {
                self.inflight = None;
                PlanPoll::Failed(err)
            }
            Err(oneshot::error::TryRecvError::Empty) => PlanPoll::Pending,
            Err(oneshot::error::TryRecvError::Closed) => {
                self.inflight = None;
                PlanPoll::Failed(LlmError::Cancelled)
            }
        }
    }

    /// Detach the in-flight request without awaiting it (Stop handling).
    pub fn detach(&mut self) {
        if let Some(inflight) = self.inflight.take() {
            inflight.task.abort();
            debug!(reason = %inflight.reason, "planning future detached");
        }
    }

    /// Whether the in-flight request, if any, was itself critical.
    pub fn inflight_is_critical(&self) -> bool {
        self.inflight.as_ref().map(|f| f.critical).unwrap_or(false)
    }

    /// Assemble the planning prompt from the goal, the active task summary,
    /// retrieved strategies, and the recent cognitive stream.
    pub fn build_prompt(
        goal: &str,
        active_tasks: &[(String, String, u8)],
        strategies: &str,
        stream_context: &str,
    ) -> String {
        let mut prompt = String::from("You are a robot strategic planner.\n");

        if !active_tasks.is_empty() {
            prompt.push_str("Current Active Tasks:\n");
            for (id, instruction, priority) in active_tasks {
                let _ = writeln!(prompt, "- ID: {id} | Desc: {instruction} | Priority: {priority}");
            }
        }
        let _ = writeln!(prompt, "New Incoming Task: {goal}");

        if !strategies.is_empty() {
            prompt.push('\n');
            prompt.push_str(strategies);
        }
        if !stream_context.is_empty() {
            prompt.push('\n');
            prompt.push_str(stream_context);
        }

        prompt.push_str(
            "\nGOAL:\n\
             1. Assign a priority level (BACKGROUND/NORMAL/URGENT/CRITICAL) to every task.\n\
             2. Decompose new tasks into steps with a target object and an action verb.\n\
             3. If tasks share a location or tool, interleave their steps to save time.\n\
             4. Output JSON: {\"reasoning\": \"...\", \"tasks\": [{\"instruction\": \"...\", \
             \"priority\": \"NORMAL\", \"steps\": [{\"id\": \"s1\", \"description\": \"...\", \
             \"target\": \"...\", \"verb\": \"find|grasp|move|speak\"}]}]}",
        );
        prompt
    }
}

fn parse_outcome(text: &str) -> Result<PlanOutcome> {
    let parsed: PlanResponse = serde_json::from_str(strip_code_fences(text))
        .map_err(|e| LlmError::InvalidResponse(format!("plan JSON: {e}")))?;
    Ok(PlanOutcome {
        tasks: parsed.tasks,
        reasoning: parsed.reasoning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ScriptedModel;
    use std::time::Duration;

    const PLAN_JSON: &str = r#"{
        "reasoning": "simple fetch",
        "tasks": [{
            "instruction": "Find the cup",
            "priority": "NORMAL",
            "steps": [
                {"id": "s1", "description": "Find the cup", "target": "cup", "verb": "find"},
                {"id": "s2", "description": "Grasp the cup", "target": "cup", "verb": "grasp"}
            ]
        }]
    }"#;

    async fn poll_until_done(planner: &mut StrategicPlanner) -> PlanPoll {
        for _ in 0..500 {
            match planner.poll() {
                PlanPoll::Pending => tokio::time::sleep(Duration::from_millis(2)).await,
                done => return done,
            }
        }
        panic!("planner never completed");
    }

    #[tokio::test]
    async fn test_plan_parsed_into_tasks() {
        let model = Arc::new(ScriptedModel::new(vec![PLAN_JSON]));
        let mut planner = StrategicPlanner::new(model, Handle::current());
        assert!(planner.trigger("prompt".into(), "user command", false));

        match poll_until_done(&mut planner).await {
            PlanPoll::Ready(outcome) => {
                assert_eq!(outcome.tasks.len(), 1);
                assert_eq!(outcome.tasks[0].base_priority(), 50);
                assert_eq!(outcome.tasks[0].steps[1].verb, "grasp");
            }
            other => panic!("unexpected poll result: {other:?}"),
        }
        assert!(!planner.is_busy());
    }

    #[tokio::test]
    async fn test_single_flight_suppression() {
        let model = Arc::new(
            ScriptedModel::new(vec![PLAN_JSON]).with_delay(Duration::from_millis(50)),
        );
        let mut planner = StrategicPlanner::new(model.clone(), Handle::current());

        assert!(planner.trigger("a".into(), "first", false));
        // Two rapid re-triggers are no-ops while the first is in flight.
        assert!(!planner.trigger("b".into(), "second", false));
        assert!(!planner.trigger("c".into(), "third", false));

        match poll_until_done(&mut planner).await {
            PlanPoll::Ready(_) => {}
            other => panic!("unexpected poll result: {other:?}"),
        }
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_critical_trigger_supersedes() {
        let model = Arc::new(
            ScriptedModel::new(vec![PLAN_JSON, PLAN_JSON]).with_delay(Duration::from_millis(30)),
        );
        let mut planner = StrategicPlanner::new(model.clone(), Handle::current());

        assert!(planner.trigger("slow".into(), "background", false));
        assert!(planner.trigger("urgent".into(), "fire alarm", true));
        assert!(planner.inflight_is_critical());

        match poll_until_done(&mut planner).await {
            PlanPoll::Ready(_) => {}
            other => panic!("unexpected poll result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_plan_fails() {
        let model = Arc::new(ScriptedModel::new(vec!["not json at all"]));
        let mut planner = StrategicPlanner::new(model, Handle::current());
        planner.trigger("p".into(), "r", false);

        match poll_until_done(&mut planner).await {
            PlanPoll::Failed(LlmError::InvalidResponse(_)) => {}
            other => panic!("unexpected poll result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_detach_clears_inflight() {
        let model = Arc::new(
            ScriptedModel::new(vec![PLAN_JSON]).with_delay(Duration::from_millis(200)),
        );
        let mut planner = StrategicPlanner::new(model, Handle::current());
        planner.trigger("p".into(), "r", false);
        planner.detach();
        assert!(!planner.is_busy());
        assert!(matches!(planner.poll(), PlanPoll::Idle));
    }
}
