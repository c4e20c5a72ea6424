//! Bounded retry with exponential backoff for upstream calls.

use std::fmt;
use std::future::Future;

use anyhow::Result;
use tokio::time::sleep;
use tracing::debug;

use crate::core::backoff::BackoffPolicy;

/// A successful value and the 0-based attempt that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempted<T> {
    pub value: T,
    pub attempt: u32,
}

/// Every attempt failed.
#[derive(Debug)]
pub struct RetryExhausted {
    pub attempts: u32,
    /// `None` only when zero attempts were allowed.
    pub last_error: Option<anyhow::Error>,
}

impl fmt::Display for RetryExhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.last_error {
            Some(err) => write!(f, "all {} attempts failed: {err:#}", self.attempts),
            None => write!(f, "no attempts were allowed"),
        }
    }
}

impl std::error::Error for RetryExhausted {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.last_error.as_ref().map(|err| {
            let source: &(dyn std::error::Error + 'static) = err.as_ref();
            source
        })
    }
}

/// Run `op` up to `max_attempts` times, sleeping `backoff.delay_for(k)` after failed attempt `k`.
///
/// `on_retry` observes each failure with its attempt index and cannot alter
/// control flow. There is no sleep after the final attempt.
pub async fn retry<T, Op, Fut, Hook>(
    max_attempts: u32,
    backoff: &BackoffPolicy,
    mut on_retry: Hook,
    mut op: Op,
) -> std::result::Result<Attempted<T>, RetryExhausted>
where
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
    Hook: FnMut(&anyhow::Error, u32),
{
    let mut last_error = None;
    for attempt in 0..max_attempts {
        match op(attempt).await {
            Ok(value) => return Ok(Attempted { value, attempt }),
            Err(err) => {
                on_retry(&err, attempt);
                last_error = Some(err);
                if attempt + 1 < max_attempts {
                    let delay = backoff.delay_for(attempt);
                    debug!(attempt, delay_ms = delay.as_millis() as u64, "backing off");
                    sleep(delay).await;
                }
            }
        }
    }
    Err(RetryExhausted {
        attempts: max_attempts,
        last_error,
    })
}
