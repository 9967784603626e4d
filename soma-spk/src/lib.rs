//! soma-spk: serialized speech output
//!
//! A FIFO utterance queue drained by a worker thread. At most one utterance
//! plays at a time; `stop` drains the queue and signals the backend to
//! abort mid-utterance so a user barge-in silences the robot immediately.

pub mod engine;
pub mod error;

pub use engine::{NullBackend, TtsBackend, TtsEngine};
pub use error::{Result, SpeechError};
