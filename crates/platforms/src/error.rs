//! Platform source error types.

use thiserror::Error;

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, PlatformError>;

/// Errors that can occur while talking to a platform.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// Connection-related errors (WebSocket handshake, closed channel, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Protocol parsing/encoding errors
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// JSON payload errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl PlatformError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a protocol error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a generic error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}
