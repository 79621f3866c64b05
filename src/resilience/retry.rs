// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Exponential backoff for document store calls.
//!
//! Every store call goes through [`retry_if`] with a predicate that accepts
//! only transient failures (connection errors, 429/5xx). Each call site has
//! its own preset:
//!
//! | Preset      | Attempts | Used by                                |
//! |-------------|----------|----------------------------------------|
//! | `startup`   | 5        | index creation, alias swaps            |
//! | `sync`      | 3        | per-document sync, bulk batches        |
//! | `query`     | 2        | search, export pages, autocomplete     |
//! | `none`      | 1        | tests, callers doing their own retry   |
//!
//! ```
//! use datahub_search::RetryConfig;
//! use std::time::Duration;
//!
//! let sync = RetryConfig::sync();
//! assert_eq!(sync.max_attempts, 3);
//! assert_eq!(sync.backoff(1), Duration::from_millis(100));
//! assert_eq!(sync.backoff(2), Duration::from_millis(200));
//! assert_eq!(RetryConfig::none().max_attempts, 1);
//! ```

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Backoff policy for one kind of store call.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts including the first; 0 behaves like 1
    pub max_attempts: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::sync()
    }
}

impl RetryConfig {
    #[must_use]
    pub fn startup() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
            factor: 2.0,
        }
    }

    #[must_use]
    pub fn sync() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            factor: 2.0,
        }
    }

    /// Short, so a user request is never held for long.
    #[must_use]
    pub fn query() -> Self {
        Self {
            max_attempts: 2,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(500),
            factor: 2.0,
        }
    }

    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            factor: 1.0,
        }
    }

    #[cfg(test)]
    pub fn test() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            factor: 2.0,
        }
    }

    /// Pause after the `failures`-th failed attempt (1-based), capped at
    /// `max_delay`.
    pub fn backoff(&self, failures: usize) -> Duration {
        let exponent = failures.saturating_sub(1).min(32) as i32;
        let scaled = self.initial_delay.as_secs_f64() * self.factor.powi(exponent);
        Duration::from_secs_f64(scaled.min(self.max_delay.as_secs_f64()).max(0.0))
    }
}

/// [`retry_if`] that treats every error as transient.
pub async fn retry<F, Fut, T, E>(operation: &str, config: &RetryConfig, call: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    retry_if(operation, config, call, |_| true).await
}

/// Run `call` until it succeeds, `is_transient` rejects the error, or the
/// attempts run out. The last error is returned.
pub async fn retry_if<F, Fut, T, E, P>(
    operation: &str,
    config: &RetryConfig,
    mut call: F,
    is_transient: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = config.max_attempts.max(1);
    let mut failures = 0;
    loop {
        let error = match call().await {
            Ok(value) => {
                if failures > 0 {
                    debug!(operation, failures, "Store call recovered");
                }
                return Ok(value);
            }
            Err(error) => error,
        };
        failures += 1;
        if failures >= max_attempts || !is_transient(&error) {
            return Err(error);
        }
        let delay = config.backoff(failures);
        warn!(
            operation,
            attempt = failures,
            max_attempts,
            error = %error,
            delay_ms = delay.as_millis() as u64,
            "Store call failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}
