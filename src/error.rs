use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("source unavailable: {source_name} ({reason})")]
    SourceUnavailable { source_name: String, reason: String },

    #[error("http request failed: {0}")]
    Http(String),

    #[error("invalid config at {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
