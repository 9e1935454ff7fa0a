//! Retry with exponential backoff for backend calls.

use std::thread;
use std::time::Duration;

use splitbill_config::settings::RetrySettings;

use crate::error::ExtractError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

/// Outcome of one failed attempt.
#[derive(Debug)]
pub enum AttemptError {
    /// Worth another try (rate limit, 5xx, network). `retry_after` overrides
    /// the backoff for this wait.
    Transient {
        reason: String,
        retry_after: Option<Duration>,
    },
    /// Retrying cannot help.
    Fatal(ExtractError),
}

impl AttemptError {
    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Transient {
            reason: reason.into(),
            retry_after: None,
        }
    }
}

/// Run `op` until it succeeds, fails fatally, or retries run out.
pub fn with_retry<T>(
    policy: RetryPolicy,
    label: &str,
    op: impl FnMut(u32) -> Result<T, AttemptError>,
) -> Result<T, ExtractError> {
    with_retry_using(policy, label, thread::sleep, op)
}

/// [`with_retry`] with an injectable sleep.
pub fn with_retry_using<T>(
    policy: RetryPolicy,
    label: &str,
    mut sleep: impl FnMut(Duration),
    mut op: impl FnMut(u32) -> Result<T, AttemptError>,
) -> Result<T, ExtractError> {
    let mut backoff = policy.initial_backoff;

    for attempt in 0..=policy.max_retries {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(AttemptError::Fatal(e)) => return Err(e),
            Err(AttemptError::Transient { reason, retry_after }) => {
                if attempt == policy.max_retries {
                    return Err(ExtractError::Backend(format!(
                        "{label} failed after {} attempts: {reason}",
                        attempt + 1
                    )));
                }
                let wait = retry_after.unwrap_or(backoff);
                log::warn!(
                    "{label}: retry {}/{} in {}ms ({reason})",
                    attempt + 1,
                    policy.max_retries,
                    wait.as_millis()
                );
                sleep(wait);
                backoff *= 2;
            }
        }
    }

    unreachable!("loop returns on the last attempt")
}
