use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Planning cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, LlmError>;
