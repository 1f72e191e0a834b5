//! Unified error handling for the inspector.

use crate::config::ConfigError;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Engine error: {0}")]
    Engine(#[from] datatypes_engine::Error),

    #[error("Cannot read payload: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid payload JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for the inspector.
pub type AppResult<T> = Result<T, AppError>;
