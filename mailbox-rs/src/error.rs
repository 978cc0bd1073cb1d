use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailboxError {
    #[error("Missing {0} parameter")]
    MissingParameter(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Upstream failure: {0}")]
    Upstream(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MailboxError>;
