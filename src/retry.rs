//! Retry logic with exponential backoff
//!
//! This module provides the bounded retry loop used by the fetch engine.
//! Delays follow `initial_delay * multiplier^attempt`, capped at `max_delay`,
//! with optional additive jitter to keep concurrent retries from lining up.
//!
//! # Example
//!
//! ```no_run
//! use media_fetch::config::RetryConfig;
//! use media_fetch::retry::{RetryFailure, with_retry};
//! use media_fetch::{ExtractorError, ExtractorErrorKind};
//!
//! # async fn example() -> Result<(), RetryFailure<ExtractorError>> {
//! let config = RetryConfig::default();
//! let attempts_needed = with_retry(&config, |attempt| async move {
//!     if attempt < 2 {
//!         // Throttling is transient, so the loop backs off and tries again
//!         Err(ExtractorError::new(ExtractorErrorKind::RateLimited, "HTTP Error 429"))
//!     } else {
//!         Ok(attempt)
//!     }
//! })
//! .await?;
//! assert_eq!(attempts_needed, 2);
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{Error, ExtractorError, ExtractorErrorKind};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (anti-automation challenges, throttling, timeouts) should return `true`.
/// Permanent failures (malformed link, unsupported content, missing resource) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for ExtractorErrorKind {
    fn is_retryable(&self) -> bool {
        match self {
            ExtractorErrorKind::BotDetection
            | ExtractorErrorKind::RateLimited
            | ExtractorErrorKind::NetworkTimeout => true,
            ExtractorErrorKind::UnsupportedContent | ExtractorErrorKind::NotFound => false,
            // Unknown failures - be conservative and don't retry
            ExtractorErrorKind::Unknown => false,
        }
    }
}

impl IsRetryable for ExtractorError {
    fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::Interrupted
            ),
            // Fetch errors already went through the retry engine; everything else is permanent
            _ => false,
        }
    }
}

/// Why [`with_retry`] gave up
#[derive(Debug)]
pub enum RetryFailure<E> {
    /// A non-retryable error ended the sequence
    Fatal {
        /// Attempt on which it happened (1-based)
        attempt: u32,
        /// The error
        error: E,
    },
    /// All attempts failed with retryable errors
    Exhausted {
        /// Attempts made
        attempts: u32,
        /// Error of the last attempt
        last: E,
    },
}

impl<E: std::fmt::Display> std::fmt::Display for RetryFailure<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryFailure::Fatal { attempt, error } => {
                write!(f, "attempt {attempt} failed permanently: {error}")
            }
            RetryFailure::Exhausted { attempts, last } => {
                write!(f, "all {attempts} attempts failed, last error: {last}")
            }
        }
    }
}

/// Execute an async operation with exponential backoff retry logic
///
/// `operation` receives the 1-based attempt number. At most `config.max_attempts`
/// calls are made (a value of 0 is treated as 1). Non-retryable errors stop the loop
/// immediately.
///
/// # Returns
///
/// The first successful value, or a [`RetryFailure`] describing how the sequence ended.
pub async fn with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    mut operation: F,
) -> std::result::Result<T, RetryFailure<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if !e.is_retryable() => {
                tracing::error!(
                    error = %e,
                    attempt,
                    "Operation failed with non-retryable error"
                );
                return Err(RetryFailure::Fatal { attempt, error: e });
            }
            Err(e) if attempt >= max_attempts => {
                tracing::error!(
                    error = %e,
                    attempts = attempt,
                    "Operation failed after all retry attempts exhausted"
                );
                return Err(RetryFailure::Exhausted {
                    attempts: attempt,
                    last: e,
                });
            }
            Err(e) => {
                let delay = backoff_delay(config, attempt);

                tracing::warn!(
                    error = %e,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis(),
                    "Operation failed, retrying"
                );

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Backoff to sleep after failed attempt number `attempt` (1-based)
///
/// `initial_delay * backoff_multiplier^attempt`, plus jitter when enabled, never
/// exceeding `max_delay`.
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let cap = config.max_delay.as_secs_f64();
    let secs = (config.initial_delay.as_secs_f64() * config.backoff_multiplier.powi(exponent))
        .min(cap);
    let base = Duration::from_secs_f64(secs.max(0.0));

    let delay = if config.jitter {
        add_jitter(base, config.initial_delay)
    } else {
        base
    };
    delay.min(config.max_delay)
}

/// Add random jitter to a delay to prevent thundering herd
///
/// Jitter is uniformly distributed between zero and `spread`, so the result lies
/// between `delay` and `delay + spread`.
fn add_jitter(delay: Duration, spread: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    delay + Duration::from_secs_f64(spread.as_secs_f64() * jitter_factor)
}
