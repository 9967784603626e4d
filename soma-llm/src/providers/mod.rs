//! Language-model providers
//!
//! Production providers live behind the [`crate::LanguageModel`] trait and
//! are wired in by the host. The scripted provider here exists for
//! deterministic testing and offline bring-up.

mod scripted;

pub use scripted::ScriptedModel;
