use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Perception(#[from] soma_eye::PerceptionError),

    #[error(transparent)]
    Cognition(#[from] soma_mind::CognitionError),

    #[error(transparent)]
    Executive(#[from] soma_exec::ExecError),

    #[error(transparent)]
    Control(#[from] soma_act::ControlError),
}

pub type Result<T> = std::result::Result<T, AgentError>;
