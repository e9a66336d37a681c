//! Transport error types.

use thiserror::Error;

/// Errors raised while acquiring snapshots.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Reading a file or stream failed.
    #[error("Read error: {0}")]
    Read(String),

    /// The payload is not a snapshot.
    #[error("Parse error: {0}")]
    Parse(String),

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for response.
    #[error("Request timed out")]
    Timeout,

    /// The peer closed the connection.
    #[error("Connection closed")]
    Closed,
}

impl From<std::io::Error> for SourceError {
    fn from(err: std::io::Error) -> Self {
        SourceError::Read(err.to_string())
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(err.to_string())
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout
        } else if err.is_connect() {
            SourceError::Connection(err.to_string())
        } else if err.is_decode() {
            SourceError::Parse(err.to_string())
        } else {
            SourceError::Http(err.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SourceError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => SourceError::Closed,
            WsError::Io(e) => SourceError::Connection(e.to_string()),
            other => SourceError::Connection(other.to_string()),
        }
    }
}
