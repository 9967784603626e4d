//! soma-act: the action side of the Soma cognitive core
//!
//! A gain-modulated predictive controller backed by a learned muscle-memory
//! regressor, a serialized action manager over the body driver, and the
//! winner-take-all behavior arbiter with switch hysteresis.

pub mod action;
pub mod arbiter;
pub mod config;
pub mod error;
pub mod fep;
pub mod muscle;

pub use action::{ActionManager, ActionStatus, BodyActuator};
pub use arbiter::{ActionCommand, ActionProposal, BehaviorArbiter};
pub use config::ControlConfig;
pub use error::{ControlError, Result};
pub use fep::{ControlOutput, FepController};
pub use muscle::{KernelMemory, MuscleMemory};
