//! Error types for sessionscope-core

use thiserror::Error;

/// Main error type for the sessionscope-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// No session log matched a selector
    #[error("session not found: {0}")]
    SessionNotFound(String),
}

/// Result type alias for sessionscope-core
pub type Result<T> = std::result::Result<T, Error>;
