//! Client configuration.

use std::time::Duration;

use messy_core::defaults::{
    API_URL, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_BASE_MS, DEFAULT_TIMEOUT_SECS,
};

use crate::retry::RetryPolicy;

/// Configuration for [`crate::HttpNotesClient`].
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL of the notes/chat API.
    pub base_url: String,
    /// Bearer token (optional; requests fail with `Error::Auth` without one).
    pub token: Option<String>,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
    /// Retries after the first attempt for transient failures.
    pub max_retries: u32,
    /// Backoff before the first retry, in milliseconds.
    pub retry_base_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: API_URL.to_string(),
            token: None,
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_ms: DEFAULT_RETRY_BASE_MS,
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "SET"))
            .field("timeout_seconds", &self.timeout_seconds)
            .field("max_retries", &self.max_retries)
            .field("retry_base_ms", &self.retry_base_ms)
            .finish()
    }
}

impl ClientConfig {
    /// Read configuration from the environment.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `MESSY_NOTES_API_URL` | [`API_URL`] |
    /// | `MESSY_NOTES_TOKEN` | (none) |
    /// | `MESSY_NOTES_TIMEOUT` | 30 |
    /// | `MESSY_NOTES_MAX_RETRIES` | 3 |
    /// | `MESSY_NOTES_RETRY_BASE_MS` | 250 |
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("MESSY_NOTES_API_URL")
                .unwrap_or_else(|_| API_URL.to_string()),
            token: std::env::var("MESSY_NOTES_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty()),
            timeout_seconds: std::env::var("MESSY_NOTES_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
            max_retries: std::env::var("MESSY_NOTES_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_RETRIES),
            retry_base_ms: std::env::var("MESSY_NOTES_RETRY_BASE_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_RETRY_BASE_MS),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.retry_base_ms))
    }
}
