//! Retry bookkeeping and backoff.
//!
//! A transient failure (transport error, timeout, 408, 429 or 5xx) is retried
//! while budget remains. The wait before the next attempt prefers a server
//! hint (`retry-after` or `x-ratelimit-reset`) inside `[0, max_hint)`, and
//! otherwise uses capped exponential backoff with jitter in `[0.75, 1.0]`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use http::{HeaderMap, HeaderName};
use http::header::RETRY_AFTER;
use rand::RngExt;

use crate::constants::X_RATELIMIT_RESET;

/// Backoff schedule for retried attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    initial_delay: Duration,
    max_delay: Duration,
    max_hint: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            max_hint: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the given first delay and cap.
    #[must_use]
    pub const fn new(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
            max_hint: Duration::from_secs(60),
        }
    }

    /// Sets the exclusive upper bound for honoring server hints.
    #[must_use]
    pub const fn with_max_hint(mut self, max_hint: Duration) -> Self {
        self.max_hint = max_hint;
        self
    }

    /// Returns the delay before the first retry.
    #[must_use]
    pub const fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Returns the backoff cap.
    #[must_use]
    pub const fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Returns how long to wait before retry number `attempt` (0-based).
    ///
    /// `headers` are the failed response's headers, if a response arrived.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, headers: Option<&HeaderMap>) -> Duration {
        headers
            .and_then(|headers| self.hinted_delay(headers, Utc::now()))
            .unwrap_or_else(|| self.backoff(attempt))
    }

    /// Reads the server's timing hint relative to `now`.
    ///
    /// `x-ratelimit-reset` (epoch seconds) wins over `retry-after` (seconds
    /// or an HTTP-date). Hints outside `[0, max_hint)` are ignored.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hinted_delay(&self, headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
        let header = |name: &HeaderName| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
        };

        let mut millis = header(&RETRY_AFTER).and_then(|value| match value.parse::<f64>() {
            Ok(seconds) => Some(seconds * 1000.0),
            Err(_) => DateTime::parse_from_rfc2822(value)
                .ok()
                .map(|at| (at.with_timezone(&Utc) - now).num_milliseconds() as f64),
        });
        if let Some(reset) = header(&X_RATELIMIT_RESET).and_then(|v| v.parse::<f64>().ok()) {
            millis = Some(reset * 1000.0 - now.timestamp_millis() as f64);
        }

        let max_hint = self.max_hint.as_millis() as f64;
        millis
            .filter(|ms| ms.is_finite() && *ms >= 0.0 && *ms < max_hint)
            .map(|ms| Duration::from_secs_f64(ms / 1000.0))
    }

    /// Exponential backoff: `min(initial * 2^attempt, max) * jitter`.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay);
        let jitter: f64 = rand::rng().random_range(0.75..=1.0);
        base.mul_f64(jitter)
    }
}

/// Progress of one logical call through its retry budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    max_retries: u32,
    retries_remaining: u32,
    correlation_id: String,
}

impl RetryState {
    /// Starts a chain with `max_retries` retries after the first attempt.
    #[must_use]
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            retries_remaining: max_retries,
            correlation_id: new_correlation_id(),
        }
    }

    /// Retries still allowed.
    #[must_use]
    pub const fn retries_remaining(&self) -> u32 {
        self.retries_remaining
    }

    /// Number of retries already consumed; feeds the backoff exponent.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.max_retries - self.retries_remaining
    }

    /// Diagnostic id shared by every attempt in the chain.
    #[must_use]
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Returns `true` if another attempt is allowed.
    #[must_use]
    pub const fn can_retry(&self) -> bool {
        self.retries_remaining > 0
    }

    /// Consumes one retry.
    pub const fn advance(&mut self) {
        self.retries_remaining = self.retries_remaining.saturating_sub(1);
    }
}

/// `log_` followed by six hex digits. For correlating local log lines only.
fn new_correlation_id() -> String {
    let id: u32 = rand::rng().random_range(0..1 << 24);
    format!("log_{id:06x}")
}
