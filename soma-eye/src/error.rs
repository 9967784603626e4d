use thiserror::Error;

#[derive(Error, Debug)]
pub enum PerceptionError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Camera error: {0}")]
    Camera(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Speech recognition error: {0}")]
    Recognition(String),
}

pub type Result<T> = std::result::Result<T, PerceptionError>;
