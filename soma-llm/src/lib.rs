//! soma-llm: language-model planning for the Soma cognitive core
//!
//! The language model is an opaque text-to-text oracle with latency
//! semantics only. This crate wraps it behind a single-flight asynchronous
//! planner and a retrieval-augmented strategy library with reflective
//! updates.

pub mod config;
pub mod error;
pub mod model;
pub mod planner;
pub mod providers;
pub mod strategy;

pub use config::LlmConfig;
pub use error::{LlmError, Result};
pub use model::LanguageModel;
pub use planner::{PlanOutcome, PlanPoll, PlannedStep, PlannedTask, StrategicPlanner};
pub use providers::ScriptedModel;
pub use strategy::{StrategyDb, StrategyEntry, StrategyOptimizer};
