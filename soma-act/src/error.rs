use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControlError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Muscle memory load error: {0}")]
    Load(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ControlError>;
