//! Retry with exponential backoff for venue HTTP calls.
//!
//! The caller classifies each failure into an [`HttpFault`]; the policy
//! decides purely from that shape. Rate limits sleep for the advertised
//! delay, transients back off exponentially with jitter, permanents bubble
//! out immediately.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Shape of an HTTP failure, as far as retrying cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpFault {
    /// 408, 5xx, or a network error; retriable.
    Transient { retry_after: Option<Duration> },
    /// 429; retriable after the advertised delay.
    RateLimited { retry_after: Option<Duration> },
    /// Any other status; never retried.
    Permanent { status: Option<u16>, message: String },
}

impl HttpFault {
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        !matches!(self, Self::Permanent { .. })
    }

    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Transient { retry_after } | Self::RateLimited { retry_after } => *retry_after,
            Self::Permanent { .. } => None,
        }
    }

    fn into_error(self) -> Error {
        match self {
            Self::Permanent { status, message } => {
                Error::Upstream(format!("permanent failure (status {status:?}): {message}"))
            }
            Self::Transient { .. } => Error::Upstream("retries exhausted (transient)".into()),
            Self::RateLimited { .. } => {
                Error::Upstream("retries exhausted (rate limited)".into())
            }
        }
    }
}

/// Classify an HTTP status plus optional Retry-After header.
#[must_use]
pub fn classify_status(status: u16, retry_after: Option<&str>, now: DateTime<Utc>) -> HttpFault {
    let retry_after = retry_after.and_then(|v| parse_retry_after(v, now));
    match status {
        429 => HttpFault::RateLimited { retry_after },
        408 => HttpFault::Transient { retry_after },
        s if s >= 500 => HttpFault::Transient { retry_after },
        s => HttpFault::Permanent {
            status: Some(s),
            message: format!("status {s}"),
        },
    }
}

/// A reqwest transport error (DNS, connect, timeout) is always transient.
#[must_use]
pub fn classify_transport(_err: &reqwest::Error) -> HttpFault {
    HttpFault::Transient { retry_after: None }
}

/// Parse a Retry-After value: delta seconds or an HTTP date.
#[must_use]
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let when = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    let delta = when.signed_duration_since(now);
    if delta <= chrono::Duration::zero() {
        return Some(Duration::ZERO);
    }
    delta.to_std().ok()
}

/// Backoff parameters.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before the given retry (attempt is 1-based over completed
    /// tries). A server-directed delay wins but never exceeds the cap;
    /// otherwise exponential backoff plus up to 25% jitter.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, fault: &HttpFault) -> Duration {
        if let Some(advertised) = fault.retry_after() {
            return advertised.min(self.max_delay);
        }
        let exp = self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        let base = self.initial_delay.mul_f64(exp).min(self.max_delay);
        let jitter = rand::thread_rng().gen_range(0.0..=0.25);
        base.mul_f64(1.0 + jitter).min(self.max_delay)
    }
}

/// Run an operation with retries.
///
/// The closure receives the 1-based attempt number and maps its own
/// failures into [`HttpFault`]. Non-retriable faults bubble out
/// immediately; retriable ones are retried until the attempt cap.
///
/// # Errors
/// The terminal fault, converted into a crate error.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    op_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = std::result::Result<T, HttpFault>>,
{
    let mut attempt = 1u32;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(fault) if !fault.is_retriable() => {
                warn!(op = op_name, attempt, ?fault, "Permanent failure");
                return Err(fault.into_error());
            }
            Err(fault) => {
                if attempt >= policy.max_attempts {
                    warn!(op = op_name, attempt, "Retries exhausted");
                    return Err(fault.into_error());
                }
                let delay = policy.delay_for(attempt, &fault);
                debug!(
                    op = op_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying after failure"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
