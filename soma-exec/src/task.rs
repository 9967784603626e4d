//! Task pool data model: contexts, steps, and perceptual expectations

use serde::{Deserialize, Serialize};
use soma_core::types::BoundingBox;
use soma_core::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Retrying,
}

/// Base priority bands assigned by the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriorityLevel {
    Background,
    Normal,
    Urgent,
    Critical,
}

impl PriorityLevel {
    pub fn score(&self) -> f64 {
        match self {
            PriorityLevel::Background => 0.0,
            PriorityLevel::Normal => 50.0,
            PriorityLevel::Urgent => 80.0,
            PriorityLevel::Critical => 100.0,
        }
    }

    pub fn from_base(base: u8) -> Self {
        match base {
            0..=24 => PriorityLevel::Background,
            25..=64 => PriorityLevel::Normal,
            65..=89 => PriorityLevel::Urgent,
            _ => PriorityLevel::Critical,
        }
    }
}

/// Perceptual expectation attached to a step before it runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Expectation {
    pub has_visual: bool,
    pub expected_label: String,
    pub expected_roi: Option<BoundingBox>,
    pub expected_confidence: f32,

    pub has_tactile: bool,
    pub expected_force: f64,
    pub force_tolerance: f64,

    /// Timeout budget for the step, seconds.
    pub expected_duration: f64,
}

impl Expectation {
    pub fn is_empty(&self) -> bool {
        !self.has_visual && !self.has_tactile
    }
}

/// One executable step within a task.
#[derive(Debug, Clone)]
pub struct SubTask {
    pub id: String,
    pub description: String,
    /// Target object keyword for top-down attention.
    pub target_object: String,
    pub action_verb: String,
    pub status: TaskStatus,
    pub retry_count: u32,
    pub is_verified: bool,
    pub expectation: Expectation,
    /// Last observed deviation from expectation, fed to attention.
    pub prediction_error: f64,
    /// Set when the step enters RUNNING; owns the step's timeout clock.
    pub started_at: Option<Timestamp>,
}

impl SubTask {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        target_object: impl Into<String>,
        action_verb: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            target_object: target_object.into(),
            action_verb: action_verb.into(),
            status: TaskStatus::Pending,
            retry_count: 0,
            is_verified: false,
            expectation: Expectation::default(),
            prediction_error: 0.0,
            started_at: None,
        }
    }

    /// Seconds this step has been running, against `now`.
    pub fn running_secs(&self, now: Timestamp) -> f64 {
        self.started_at
            .map(|t| now.seconds_since(t))
            .unwrap_or(0.0)
    }
}

/// A competing unit of work in the executive pool.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub task_id: String,
    pub user_instruction: String,
    pub base_priority: PriorityLevel,
    pub dynamic_score: f64,
    pub depends_on_ids: Vec<String>,
    pub required_resources: Vec<String>,
    pub steps: Vec<SubTask>,
    pub current_step_idx: usize,
    pub status: TaskStatus,
    pub created_at: Timestamp,
}

impl TaskContext {
    pub fn new(
        task_id: impl Into<String>,
        user_instruction: impl Into<String>,
        base_priority: PriorityLevel,
        steps: Vec<SubTask>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            user_instruction: user_instruction.into(),
            base_priority,
            dynamic_score: 0.0,
            depends_on_ids: Vec::new(),
            required_resources: Vec::new(),
            steps,
            current_step_idx: 0,
            status: TaskStatus::Pending,
            created_at: Timestamp::now(),
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, TaskStatus::Completed | TaskStatus::Failed)
    }

    pub fn current_step(&self) -> Option<&SubTask> {
        self.steps.get(self.current_step_idx)
    }

    pub fn current_step_mut(&mut self) -> Option<&mut SubTask> {
        self.steps.get_mut(self.current_step_idx)
    }

    /// Complete the current step and move on; completes the task when the
    /// last step finishes.
    pub fn advance(&mut self) {
        if let Some(step) = self.current_step_mut() {
            step.status = TaskStatus::Completed;
        }
        self.current_step_idx += 1;
        if self.current_step_idx >= self.steps.len() {
            self.status = TaskStatus::Completed;
        }
    }
}
