//! Retry policy with exponential backoff, shared by the quote fetcher and the
//! webhook dispatcher.
//!
//! Delays are computed by [`RetryPolicy::delay_for`], a pure function, so a
//! backoff schedule can be checked without sleeping. [`RetryPolicy::run`]
//! drives an async operation and sleeps on the tokio clock between attempts.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::debug;

/// Maps a computed backoff delay to the delay actually slept.
pub type JitterFn = fn(Duration) -> Duration;

/// Adds up to 25% random extra delay.
pub fn random_jitter(delay: Duration) -> Duration {
    let spread_ms = (delay.as_millis() / 4) as u64;
    if spread_ms == 0 {
        return delay;
    }
    delay + Duration::from_millis(rand::thread_rng().gen_range(0..=spread_ms))
}

pub fn no_jitter(delay: Duration) -> Duration {
    delay
}

/// How a single attempt failed
#[derive(Debug)]
pub enum AttemptError<E> {
    /// Worth retrying; `retry_after` is a server-requested delay
    Transient {
        error: E,
        retry_after: Option<Duration>,
    },
    /// Retrying cannot help
    Permanent(E),
}

impl<E> AttemptError<E> {
    pub fn transient(error: E) -> Self {
        AttemptError::Transient {
            error,
            retry_after: None,
        }
    }
}

/// Final failure after the policy stopped retrying
#[derive(Debug)]
pub struct RetryFailure<E> {
    pub error: E,
    /// Attempts made, including the first
    pub attempts: u32,
    /// True when retries ran out on a transient error
    pub exhausted: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubles for each further retry
    pub base_delay: Duration,
    /// Upper bound on any single delay, server-requested ones included
    pub max_delay: Duration,
    pub jitter: JitterFn,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: random_jitter,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: JitterFn) -> Self {
        self.jitter = jitter;
        self
    }

    /// Attempts allowed in total
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before the given retry (1 = first retry).
    pub fn delay_for(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }

        let factor = 2u32.saturating_pow(retry - 1);
        let backoff = self.base_delay.saturating_mul(factor).min(self.max_delay);

        (self.jitter)(backoff).min(self.max_delay)
    }

    /// Run `operation` until it succeeds, fails permanently, or retries run out.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, RetryFailure<E>>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AttemptError<E>>>,
    {
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}", label, attempt);
                    }
                    return Ok(value);
                }
                Err(AttemptError::Permanent(error)) => {
                    return Err(RetryFailure {
                        error,
                        attempts: attempt,
                        exhausted: false,
                    });
                }
                Err(AttemptError::Transient { error, retry_after }) => {
                    if attempt >= self.max_attempts() {
                        return Err(RetryFailure {
                            error,
                            attempts: attempt,
                            exhausted: true,
                        });
                    }

                    let delay = match retry_after {
                        Some(requested) => requested.min(self.max_delay),
                        None => self.delay_for(attempt),
                    };

                    debug!(
                        "{} attempt {} failed: {} (retrying in {:?})",
                        label, attempt, error, delay
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}
