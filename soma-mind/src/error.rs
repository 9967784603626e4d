use thiserror::Error;

#[derive(Error, Debug)]
pub enum CognitionError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unknown entity: {0}")]
    UnknownEntity(u64),
}

pub type Result<T> = std::result::Result<T, CognitionError>;
