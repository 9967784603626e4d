//! Serialized motor action tracking over the body driver

use parking_lot::Mutex;
use soma_core::types::ComponentState;
use soma_core::Timestamp;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStatus {
    Idle,
    Running,
    Succeeded,
    Failed,
}

/// Non-owning command/state interface to the body driver.
pub trait BodyActuator: Send + Sync {
    /// Non-blocking torque command.
    fn set_command(&self, torques: &[f64]);

    fn state(&self) -> ComponentState;
}

struct CurrentAction {
    name: String,
    status: ActionStatus,
    start_time: Timestamp,
}

/// Tracks at most one motor action at a time. A new `execute` overwrites
/// whatever was running.
pub struct ActionManager {
    driver: Arc<dyn BodyActuator>,
    current: Mutex<CurrentAction>,
    success_secs: f64,
}

impl ActionManager {
    pub fn new(driver: Arc<dyn BodyActuator>, success_secs: f64) -> Self {
        Self {
            driver,
            current: Mutex::new(CurrentAction {
                name: String::new(),
                status: ActionStatus::Idle,
                start_time: Timestamp::ZERO,
            }),
            success_secs,
        }
    }

    /// Send a command and start tracking it under `name`.
    pub fn execute(&self, torques: &[f64], name: &str) {
        self.driver.set_command(torques);
        let mut current = self.current.lock();
        info!(action = name, "action dispatched");
        current.name = name.to_string();
        current.status = ActionStatus::Running;
        current.start_time = Timestamp::now();
    }

    /// Current status with time- and fault-driven transitions applied:
    /// running actions succeed after the duration threshold and fail the
    /// moment the driver reports a stall.
    pub fn get_status(&self) -> ActionStatus {
        let mut current = self.current.lock();

        if current.status == ActionStatus::Running {
            let elapsed = Timestamp::now().seconds_since(current.start_time);
            if elapsed > self.success_secs {
                current.status = ActionStatus::Succeeded;
            }
        }

        if self.driver.state() == ComponentState::Stalled
            && current.status != ActionStatus::Idle
        {
            if current.status != ActionStatus::Failed {
                warn!(action = %current.name, "driver stalled; action failed");
            }
            current.status = ActionStatus::Failed;
        }

        current.status
    }

    pub fn is_busy(&self) -> bool {
        self.get_status() == ActionStatus::Running
    }

    pub fn current_name(&self) -> String {
        self.current.lock().name.clone()
    }
}
