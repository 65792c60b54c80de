//! Bounded retry with exponential backoff.

use std::time::Duration;

use messy_core::defaults::MAX_RETRY_DELAY_MS;

use crate::error::ApiErrorCode;

/// How many times to retry and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Total attempts including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Sleep before retry number `retry` (1-based): base * 2^(retry-1), capped.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        let delay = self.base_delay.saturating_mul(factor);
        delay.min(Duration::from_millis(MAX_RETRY_DELAY_MS))
    }
}

/// Whether a request may be sent again after it could have reached the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replay {
    /// Sending it twice has the same effect as sending it once.
    Idempotent,
    /// Resent only when the server certainly did not act on it.
    NonIdempotent,
}

impl Replay {
    /// Retry after an error status. A non-idempotent request is only
    /// replayed when the server said it refused the work.
    pub fn after_status(self, status: u16) -> bool {
        match self {
            Replay::Idempotent => ApiErrorCode::from_status(status).is_retryable(),
            Replay::NonIdempotent => status == 429 || status == 503,
        }
    }

    /// Retry after a transport failure. Past the connect phase the request
    /// may already have been processed.
    pub fn after_transport(self, e: &reqwest::Error) -> bool {
        match self {
            Replay::Idempotent => e.is_timeout() || e.is_connect() || e.is_request(),
            Replay::NonIdempotent => e.is_connect(),
        }
    }
}
