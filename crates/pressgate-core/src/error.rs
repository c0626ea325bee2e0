//! Error types for `PressGate` core library.

use thiserror::Error;

/// Result type alias using `PressGate` Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for `PressGate` operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unknown package kind
    #[error("Unknown package kind: {0}")]
    UnknownKind(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
