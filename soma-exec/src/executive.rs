//! Dynamic scheduling, asynchronous planning, and predictive verification

use crate::config::ExecConfig;
use crate::error::{ExecError, Result};
use crate::task::{PriorityLevel, SubTask, TaskContext, TaskStatus};
use parking_lot::RwLock;
use serde_json::json;
use soma_act::{ActionCommand, ActionProposal};
use soma_core::types::{ComponentState, EventType, FusedContext};
use soma_llm::{PlanPoll, StrategicPlanner, StrategyOptimizer};
use soma_mind::{CognitiveStream, ObjectCognitionEngine};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A task that just left the pool, for reflection and verbal feedback.
#[derive(Debug, Clone)]
pub struct FinishedEpisode {
    pub instruction: String,
    pub success: bool,
}

/// The multi-task executive. Owns the task pool and the single planning
/// future; holds its collaborators (strategy optimizer, cognitive stream)
/// as explicit construction-time dependencies.
pub struct MultiTaskExecutive {
    config: ExecConfig,
    planner: StrategicPlanner,
    optimizer: Arc<StrategyOptimizer>,
    stream: Arc<RwLock<CognitiveStream>>,
    pool: Vec<TaskContext>,
    next_task_seq: u32,
    current_focus: Option<String>,
    consecutive_plan_failures: u32,
    last_prompt: Option<String>,
    surprise: HashMap<String, f64>,
    finished: Vec<FinishedEpisode>,
}

const PLAN_FAILURES_BEFORE_TASK_FAILURE: u32 = 3;

impl MultiTaskExecutive {
    pub fn new(
        config: ExecConfig,
        planner: StrategicPlanner,
        optimizer: Arc<StrategyOptimizer>,
        stream: Arc<RwLock<CognitiveStream>>,
    ) -> Result<Self> {
        config.validate().map_err(ExecError::Configuration)?;
        Ok(Self {
            config,
            planner,
            optimizer,
            stream,
            pool: Vec::new(),
            next_task_seq: 1,
            current_focus: None,
            consecutive_plan_failures: 0,
            last_prompt: None,
            surprise: HashMap::new(),
            finished: Vec::new(),
        })
    }

    // --- instruction intake and planning ---

    /// Route a user instruction into asynchronous planning.
    pub fn add_instruction(&mut self, text: &str) {
        let critical = text.contains("fire") || text.contains("emergency");
        self.trigger_planning("user command", text, critical);
    }

    fn trigger_planning(&mut self, reason: &str, goal: &str, critical: bool) {
        let active: Vec<(String, String, u8)> = self
            .pool
            .iter()
            .filter(|t| !t.is_finished())
            .map(|t| {
                (
                    t.task_id.clone(),
                    t.user_instruction.clone(),
                    t.base_priority.score() as u8,
                )
            })
            .collect();

        let stream_context = self.stream.read().build_context_prompt();
        let strategies = self
            .optimizer
            .retrieve_relevant_strategies(goal, &stream_context);

        let prompt = StrategicPlanner::build_prompt(goal, &active, &strategies, &stream_context);
        self.last_prompt = Some(prompt.clone());
        self.planner.trigger(prompt, reason, critical);
    }

    fn poll_planner(&mut self) {
        match self.planner.poll() {
            PlanPoll::Idle | PlanPoll::Pending => {}
            PlanPoll::Ready(outcome) => {
                self.consecutive_plan_failures = 0;
                let count = outcome.tasks.len();
                for planned in outcome.tasks {
                    let steps: Vec<SubTask> = planned
                        .steps
                        .iter()
                        .map(|s| SubTask::new(&s.id, &s.description, &s.target, &s.verb))
                        .collect();
                    let needs_arm = steps
                        .iter()
                        .any(|s| matches!(s.action_verb.as_str(), "grasp" | "move" | "place"));

                    let mut task = TaskContext::new(
                        format!("task-{:04}", self.next_task_seq),
                        &planned.instruction,
                        PriorityLevel::from_base(planned.base_priority()),
                        steps,
                    );
                    self.next_task_seq += 1;
                    if needs_arm {
                        task.required_resources.push("arm".to_string());
                    }
                    info!(task_id = %task.task_id, instruction = %task.user_instruction, "task admitted");
                    self.pool.push(task);
                }

                self.stream.write().add_event(
                    EventType::ThoughtChain,
                    format!("Plan ready: {count} task(s). {}", outcome.reasoning),
                    json!({ "tasks": count }),
                );
            }
            PlanPoll::Failed(err) => {
                self.consecutive_plan_failures += 1;
                warn!(error = %err, failures = self.consecutive_plan_failures, "planning failed");
                self.stream.write().add_event(
                    EventType::ThoughtChain,
                    format!("Planning failed: {err}"),
                    json!({ "failures": self.consecutive_plan_failures }),
                );

                if self.consecutive_plan_failures >= PLAN_FAILURES_BEFORE_TASK_FAILURE {
                    self.consecutive_plan_failures = 0;
                    if let Some(task) = self.focused_task_mut() {
                        warn!(task_id = %task.task_id, "planning exhausted; task failed");
                        task.status = TaskStatus::Failed;
                    }
                } else if let Some(prompt) = self.last_prompt.clone() {
                    self.planner.trigger(prompt, "planning failed", false);
                }
            }
        }
    }

    // --- tick update ---

    /// One executive step: absorb plan results, retire finished tasks,
    /// re-score the pool, and advance the focused step under verification.
    pub fn update(&mut self, ctx: &FusedContext, cognition: &ObjectCognitionEngine) {
        self.poll_planner();
        self.update_dynamic_scores(ctx, cognition);

        let focus = self.select_focus();
        if focus != self.current_focus {
            debug!(from = ?self.current_focus, to = ?focus, "soft context switch");
            self.current_focus = focus;
        }

        self.run_verification(ctx, cognition);

        // Retire finished tasks into the episode queue.
        let mut retained = Vec::with_capacity(self.pool.len());
        for task in self.pool.drain(..) {
            if task.is_finished() {
                self.finished.push(FinishedEpisode {
                    instruction: task.user_instruction.clone(),
                    success: task.status == TaskStatus::Completed,
                });
            } else {
                retained.push(task);
            }
        }
        self.pool = retained;
    }

    /// score = base + running inertia + starvation − resource − distance.
    fn update_dynamic_scores(&mut self, ctx: &FusedContext, cognition: &ObjectCognitionEngine) {
        let now = ctx.timestamp;
        let arm_busy = ctx.system_status.arm_state == ComponentState::Active;

        for task in &mut self.pool {
            if task.is_finished() {
                task.dynamic_score = -1.0;
                continue;
            }

            let mut score = task.base_priority.score();

            if task.status == TaskStatus::Running {
                score += self.config.running_bonus;
            } else {
                // Starvation bonus: waiting tasks creep upward so even
                // BACKGROUND work eventually runs.
                let waited = now.seconds_since(task.created_at).max(0.0);
                score += waited * self.config.starvation_rate;

                if arm_busy && task.required_resources.iter().any(|r| r == "arm") {
                    score -= self.config.resource_penalty;
                }
            }

            if let Some(step) = task.current_step() {
                if !step.target_object.is_empty() {
                    if let Some(entity) = cognition.find_by_category(&step.target_object).first() {
                        let distance = (entity.position - ctx.robot.ee_pos).norm();
                        score -= distance * self.config.distance_weight;
                    }
                }
            }

            task.dynamic_score = score;
        }
    }

    /// Arg-max of dynamic score; ties go to the earlier task id.
    fn select_focus(&self) -> Option<String> {
        let mut best: Option<&TaskContext> = None;
        for task in self.pool.iter().filter(|t| !t.is_finished()) {
            best = match best {
                None => Some(task),
                Some(current) => {
                    if task.dynamic_score > current.dynamic_score
                        || (task.dynamic_score == current.dynamic_score
                            && task.task_id < current.task_id)
                    {
                        Some(task)
                    } else {
                        Some(current)
                    }
                }
            };
        }
        best.map(|t| t.task_id.clone())
    }

    fn focused_task_mut(&mut self) -> Option<&mut TaskContext> {
        let focus = self.current_focus.clone().or_else(|| self.select_focus())?;
        self.pool.iter_mut().find(|t| t.task_id == focus)
    }

    /// Generate the step's expectation from its action verb.
    fn generate_expectation(config: &ExecConfig, step: &mut SubTask) {
        if !step.expectation.is_empty() {
            return;
        }
        let expectation = &mut step.expectation;
        expectation.expected_duration = config.default_step_timeout;

        if matches!(step.action_verb.as_str(), "find" | "grasp") {
            expectation.has_visual = true;
            expectation.expected_label = step.target_object.clone();
            // A semantic map would refine this; default to view center.
            expectation.expected_roi = Some(config.default_expected_roi);
            expectation.expected_confidence = 0.5;
        }
        if step.action_verb == "grasp" {
            expectation.has_tactile = true;
            expectation.expected_force = config.grasp_expected_force;
            expectation.force_tolerance = config.grasp_force_tolerance;
        }
    }

    /// Predictive-coding check for the focused running step.
    fn run_verification(&mut self, ctx: &FusedContext, _cognition: &ObjectCognitionEngine) {
        let Some(focus) = self.current_focus.clone() else {
            return;
        };
        let Some(idx) = self.pool.iter().position(|t| t.task_id == focus) else {
            return;
        };

        let mut replan_goal: Option<String> = None;
        {
            let config = self.config.clone();
            let task = &mut self.pool[idx];
            if task.is_finished() {
                return;
            }
            let now = ctx.timestamp;

            if task.current_step().is_none() {
                task.status = TaskStatus::Completed;
                return;
            }

            let starting = matches!(
                task.current_step().unwrap().status,
                TaskStatus::Pending | TaskStatus::Retrying
            );
            if starting {
                task.status = TaskStatus::Running;
            }

            let step = task.current_step_mut().unwrap();

            if starting {
                Self::generate_expectation(&config, step);
                step.status = TaskStatus::Running;
                step.started_at = Some(now);
            }

            let mut surprise = 0.0;

            if step.expectation.has_visual {
                if let Some(frame) = &ctx.vision {
                    let hit = frame.detections.iter().any(|det| {
                        det.label == step.expectation.expected_label
                            && step
                                .expectation
                                .expected_roi
                                .map_or(true, |roi| det.box_2d.intersects(&roi))
                    });
                    if hit {
                        step.is_verified = true;
                    } else {
                        surprise += 0.5;
                    }
                }
            }

            if step.expectation.has_tactile {
                let miss = (ctx.robot.ee_force - step.expectation.expected_force).abs();
                if miss > step.expectation.force_tolerance {
                    surprise += 1.0;
                }
            }

            step.prediction_error = surprise;
            let label = step.expectation.expected_label.clone();
            if !label.is_empty() {
                if surprise > 0.0 {
                    self.surprise.insert(label, surprise);
                } else {
                    self.surprise.remove(&label);
                }
            }

            let timeout = if step.expectation.expected_duration > 0.0 {
                step.expectation.expected_duration
            } else {
                config.default_step_timeout
            };

            if step.is_verified {
                debug!(step = %step.id, "step verified; advancing");
                task.advance();
            } else if step.expectation.is_empty() && step.running_secs(now) > timeout {
                // Unverifiable steps (no sensory expectation) complete on
                // their duration budget.
                task.advance();
            } else if step.running_secs(now) > timeout {
                step.retry_count += 1;
                if step.retry_count >= config.max_retries {
                    warn!(step = %step.id, "step failed after retries");
                    step.status = TaskStatus::Failed;
                    task.status = TaskStatus::Failed;
                    replan_goal = Some(format!(
                        "Recover from failure: {}",
                        task.user_instruction
                    ));
                } else {
                    warn!(step = %step.id, retry = step.retry_count, "step timed out; retrying");
                    step.status = TaskStatus::Retrying;
                    step.started_at = Some(now);
                }
            }
        }

        if let Some(goal) = replan_goal {
            self.trigger_planning("recover from failure", &goal, false);
        }
    }

    // --- outputs consumed by the agent ---

    /// The executive's bid for this tick's behavior.
    pub fn best_proposal(&self, cognition: &ObjectCognitionEngine) -> ActionProposal {
        let focus = self
            .current_focus
            .clone()
            .or_else(|| self.select_focus());
        let task = focus.and_then(|id| self.pool.iter().find(|t| t.task_id == id));

        let Some(task) = task else {
            if self.planner.is_busy() {
                return ActionProposal::new("Task", 1.0, "Thinking/planning...", ActionCommand::NoOp);
            }
            return ActionProposal::new("Task", 0.0, "no active task", ActionCommand::NoOp);
        };

        let Some(step) = task.current_step() else {
            return ActionProposal::new("Task", 0.0, "task between steps", ActionCommand::NoOp);
        };

        // Map the 0..~100 dynamic score into the arbiter's 5..15 task band.
        let priority = 5.0 + (task.dynamic_score / 100.0).clamp(0.0, 1.0) * 10.0;
        let description = format!("[{}] {}", task.user_instruction, step.description);

        let command = match step.action_verb.as_str() {
            "grasp" => match cognition.find_by_category(&step.target_object).first() {
                Some(entity) => ActionCommand::Grasp {
                    target_id: entity.track_id,
                },
                None => ActionCommand::LookAt {
                    label: step.target_object.clone(),
                },
            },
            "find" | "look" | "search" => ActionCommand::LookAt {
                label: step.target_object.clone(),
            },
            "speak" | "say" => ActionCommand::Speak {
                text: step.description.clone(),
            },
            _ => ActionCommand::NoOp,
        };

        ActionProposal::new("Task", priority, description, command)
    }

    /// Visual keyword for top-down attention.
    pub fn top_down_target(&self) -> String {
        self.current_focus
            .as_ref()
            .and_then(|id| self.pool.iter().find(|t| t.task_id == *id))
            .and_then(|t| t.current_step())
            .map(|s| s.target_object.clone())
            .unwrap_or_default()
    }

    /// Per-label prediction error from the last verification pass.
    pub fn surprise_map(&self) -> &HashMap<String, f64> {
        &self.surprise
    }

    /// Drain tasks that finished since the last call.
    pub fn take_finished(&mut self) -> Vec<FinishedEpisode> {
        std::mem::take(&mut self.finished)
    }

    /// Stop handling: empty the pool and detach any in-flight planning.
    pub fn clear_all(&mut self) {
        self.pool.clear();
        self.current_focus = None;
        self.planner.detach();
        self.surprise.clear();
        info!("task pool cleared");
    }

    pub fn is_planning(&self) -> bool {
        self.planner.is_busy()
    }

    pub fn tasks(&self) -> &[TaskContext] {
        &self.pool
    }

    /// Admit an externally constructed task (host bring-up and tests).
    pub fn enqueue_task(&mut self, mut task: TaskContext) {
        task.task_id = format!("task-{:04}", self.next_task_seq);
        self.next_task_seq += 1;
        self.pool.push(task);
    }

    pub fn optimizer(&self) -> &Arc<StrategyOptimizer> {
        &self.optimizer
    }
}
