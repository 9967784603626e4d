use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Engine shut down")]
    ShutDown,
}

pub type Result<T> = std::result::Result<T, SpeechError>;
