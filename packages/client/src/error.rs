//! Error types for the live sync client.

use thiserror::Error;

/// Client-specific errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// `open()` was called without an auth token
    #[error("No auth token available; cannot join a universe room")]
    MissingToken,

    /// The server rejected the handshake credentials
    #[error("Authentication rejected by server: {0}")]
    Unauthorized(String),

    /// Connection error
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Reconnection gave up after the configured number of attempts
    #[error("Failed to reconnect after {0} attempts")]
    ReconnectExhausted(u32),

    /// Error event pushed by the server
    #[error("Server error: {0}")]
    Server(String),

    /// The connect request could not be built (bad url or header)
    #[error("Invalid connect request: {0}")]
    InvalidRequest(String),
}
