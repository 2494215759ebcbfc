//! Bounded retry with fixed or exponential backoff.
//!
//! Used for transient faults: a handshake not yet visible on the
//! arbitrator, a peer that did not answer. Every failed attempt is logged
//! and reported to the caller's callback before sleeping.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on a single backoff delay.
const MAX_DELAY_MS: u64 = 60_000;

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed,
    /// Delay doubles after every failed attempt.
    Exponential,
}

/// Retry bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_backoff")]
    pub backoff: Backoff,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_delay_ms() -> u64 {
    200
}

fn default_backoff() -> Backoff {
    Backoff::Exponential
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
            backoff: default_backoff(),
        }
    }
}

impl RetryPolicy {
    /// A policy with a constant delay.
    pub fn fixed(max_attempts: u32, delay_ms: u64) -> Self {
        Self {
            max_attempts,
            delay_ms,
            backoff: Backoff::Fixed,
        }
    }

    /// A policy whose delay doubles after each failure.
    pub fn exponential(max_attempts: u32, delay_ms: u64) -> Self {
        Self {
            max_attempts,
            delay_ms,
            backoff: Backoff::Exponential,
        }
    }

    /// Delay after the `failed`-th failed attempt (1-based).
    pub fn delay_after(&self, failed: u32) -> Duration {
        let ms = match self.backoff {
            Backoff::Fixed => self.delay_ms,
            Backoff::Exponential => {
                let shift = failed.saturating_sub(1).min(32);
                self.delay_ms.saturating_mul(1u64 << shift)
            }
        };
        Duration::from_millis(ms.min(MAX_DELAY_MS))
    }
}

/// Returned when every attempt failed.
#[derive(Error, Debug)]
#[error("gave up after {attempts} attempts: {last}")]
pub struct RetryError<E> {
    /// Attempts made.
    pub attempts: u32,
    /// The error of the final attempt.
    pub last: E,
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        self.last
    }
}

/// Run `f` until it succeeds or the policy's attempts are exhausted.
///
/// `on_attempt(n, &err)` is called after the n-th failed attempt, before
/// sleeping. A policy with `max_attempts == 0` still makes one attempt.
pub async fn retry_with_backoff<T, E, F, Fut, C>(
    policy: &RetryPolicy,
    on_attempt: C,
    f: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: FnMut(u32, &E),
    E: std::fmt::Display,
{
    run(policy, on_attempt, |_| true, f).await
}

/// [`retry_with_backoff`] without a per-attempt callback.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, f: F) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    run(policy, |_, _| {}, |_| true, f).await
}

/// Like [`retry`], but gives up at once on errors `should_retry` rejects.
pub async fn retry_if<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    should_retry: P,
    f: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    run(policy, |_, _| {}, should_retry, f).await
}

async fn run<T, E, F, Fut, C, P>(
    policy: &RetryPolicy,
    mut on_attempt: C,
    should_retry: P,
    mut f: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: FnMut(u32, &E),
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let max = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                on_attempt(attempt, &e);
                if !should_retry(&e) {
                    return Err(RetryError {
                        attempts: attempt,
                        last: e,
                    });
                }
                if attempt >= max {
                    tracing::warn!(attempts = attempt, "retries exhausted: {e}");
                    return Err(RetryError {
                        attempts: attempt,
                        last: e,
                    });
                }
                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts = max,
                    "attempt failed, retrying in {delay:?}: {e}"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
