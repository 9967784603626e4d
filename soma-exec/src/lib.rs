//! soma-exec: the multi-task executive
//!
//! Keeps a pool of competing task contexts, scores them dynamically every
//! tick, advances the focused step under predictive-coding verification,
//! and turns the best task into a behavior proposal for the arbiter.

pub mod config;
pub mod error;
pub mod executive;
pub mod task;

pub use config::ExecConfig;
pub use error::{ExecError, Result};
pub use executive::{FinishedEpisode, MultiTaskExecutive};
pub use task::{Expectation, PriorityLevel, SubTask, TaskContext, TaskStatus};
