//! soma-eye: perception front-end for the Soma cognitive core
//!
//! Ingests multi-rate sensor callbacks into time-ordered ring tracks, gates
//! camera frames by darkness, blur, and motion before expensive detection,
//! segments microphone audio into utterances, and assembles time-aligned
//! fused contexts on demand.

pub mod asr;
pub mod attention;
pub mod config;
pub mod error;
pub mod gating;
pub mod perception;
pub mod vad;

pub use asr::{AsrEngine, Transcription};
pub use attention::{AttentionEngine, AttentionalObject};
pub use config::EyeConfig;
pub use error::{PerceptionError, Result};
pub use gating::{Detector, FrameGate, GateDecision, GrayFrame};
pub use perception::PerceptionSystem;
pub use vad::{VadMachine, VadState};
