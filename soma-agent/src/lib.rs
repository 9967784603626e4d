//! soma-agent: the embodied agent's cognitive control loop
//!
//! Wires perception, cognition, the executive, the controller, and the
//! arbiter into a phase-ordered heartbeat, and exposes the host-facing
//! facade: `tick`, `on_user_command`, and the sensor feed methods.

pub mod agent;
pub mod config;
pub mod error;
pub mod hal;
pub mod telemetry;

pub use agent::{Agent, AgentSeams};
pub use config::AgentConfig;
pub use error::{AgentError, Result};
pub use telemetry::init_tracing;
