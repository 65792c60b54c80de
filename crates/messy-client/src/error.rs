//! HTTP status classification for the notes API.

use messy_core::Error;

/// Failure categories derived from a non-success response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCode {
    /// Missing, expired, or rejected credentials (401, 403).
    Unauthorized,
    /// Target note does not exist (404).
    NotFound,
    /// Too many requests (429).
    RateLimited,
    /// Server-side failure (5xx).
    ServerError,
    /// Anything else.
    Unknown,
}

impl ApiErrorCode {
    /// Determine the error code from an HTTP status.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Unauthorized,
            404 => Self::NotFound,
            429 => Self::RateLimited,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::ServerError)
    }
}

/// Convert a failed response into the core error taxonomy.
pub fn to_core_error(code: ApiErrorCode, status: u16, op: &str, body: &str) -> Error {
    let detail = if body.is_empty() {
        format!("{} returned {}", op, status)
    } else {
        format!("{} returned {}: {}", op, status, truncate(body, 200))
    };
    match code {
        ApiErrorCode::Unauthorized => Error::Auth(detail),
        ApiErrorCode::NotFound => Error::NotFound(detail),
        ApiErrorCode::RateLimited | ApiErrorCode::ServerError | ApiErrorCode::Unknown => {
            Error::Request(detail)
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
