//! Error types for the Messy Notes client.

use thiserror::Error;

/// Result type alias using the client's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for note, chat, and media operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport or connectivity failure (DNS, connect, timeout, reset)
    #[error("Network error: {0}")]
    Network(String),

    /// Missing or rejected credentials
    #[error("Unauthorized: {0}")]
    Auth(String),

    /// Edit or delete target does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Capture, recording, or playback failure
    #[error("Media error: {0}")]
    Media(String),

    /// Invalid input (draft validation, malformed server record)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Server answered with an unexpected status
    #[error("Request error: {0}")]
    Request(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether retrying the same call may succeed.
    ///
    /// Only transport failures qualify here; status-based rules (429, 5xx)
    /// are applied by the HTTP client, which still sees the status code.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Network(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() || e.is_request() {
            Error::Network(e.to_string())
        } else if e.is_decode() {
            Error::Serialization(e.to_string())
        } else {
            Error::Request(e.to_string())
        }
    }
}
