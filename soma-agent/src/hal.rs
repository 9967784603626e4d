//! Hardware abstraction seams
//!
//! Drivers live outside this crate and are specified by their callback
//! contracts only:
//!
//! - camera: calls [`soma_eye::PerceptionSystem::on_camera_frame`] at
//!   ~30 Hz with a capture timestamp that precedes reception;
//! - body bus: calls [`soma_eye::PerceptionSystem::on_imu_joint`] at
//!   ~1 kHz; callbacks must complete in microseconds;
//! - microphone: calls [`soma_eye::PerceptionSystem::on_audio_mic`] with
//!   16-bit signed PCM, 16 kHz recommended.
//!
//! The agent reaches back into drivers only through the narrow traits
//! re-exported here; drivers outlive the agent, and nothing here owns them.

pub use soma_act::BodyActuator;
pub use soma_core::types::StatusProbe;
pub use soma_eye::{AsrEngine, Detector};
pub use soma_llm::LanguageModel;
pub use soma_spk::TtsBackend;
