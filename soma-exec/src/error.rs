use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unknown task: {0}")]
    UnknownTask(String),
}

pub type Result<T> = std::result::Result<T, ExecError>;
