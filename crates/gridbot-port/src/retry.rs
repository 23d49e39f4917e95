//! Retry and deadline policies for port calls.
//!
//! Only transient failures are retried, up to `max_attempts`, with
//! bounded exponential backoff. A per-operation wall-clock budget from
//! `DeadlinePolicy` caps the whole sequence: exhausting the budget
//! aborts retries even if attempts remain.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{ErrorKind, PortError, PortResult};
use crate::port::BoxFuture;

/// Whether an operation reads or writes exchange state.
///
/// Rate-limit responses are retried for reads only: a rate-limited
/// write may or may not have been accepted, so it surfaces instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpClass {
    Read,
    Write,
}

/// Retry policy: attempt cap and backoff shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum attempts including the first.
    pub max_attempts: u32,
    /// First backoff delay (ms); doubles per retry.
    pub base_backoff_ms: u64,
    /// Backoff ceiling (ms).
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 50,
            max_backoff_ms: 1000,
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `retry` (1-based).
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(16);
        let ms = self
            .base_backoff_ms
            .saturating_mul(1u64 << exp)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }

    /// Whether `error` may be retried for an operation of `class`.
    #[must_use]
    pub fn should_retry(&self, error: &PortError, class: OpClass) -> bool {
        if !error.is_transient() {
            return false;
        }
        if error.kind() == Some(ErrorKind::RateLimited) {
            return class == OpClass::Read;
        }
        true
    }
}

/// Per-operation wall-clock budgets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlinePolicy {
    pub place_ms: u64,
    pub cancel_ms: u64,
    pub replace_ms: u64,
    pub fetch_ms: u64,
}

impl Default for DeadlinePolicy {
    fn default() -> Self {
        Self {
            place_ms: 5_000,
            cancel_ms: 5_000,
            replace_ms: 5_000,
            fetch_ms: 10_000,
        }
    }
}

impl DeadlinePolicy {
    /// Budget for a named operation; unknown names get the tightest budget.
    #[must_use]
    pub fn budget(&self, operation: &str) -> Duration {
        let ms = match operation {
            "place" => self.place_ms,
            "cancel" => self.cancel_ms,
            "replace" => self.replace_ms,
            "fetch_open_orders" => self.fetch_ms,
            _ => self.place_ms.min(self.cancel_ms).min(self.replace_ms),
        };
        Duration::from_millis(ms)
    }
}

/// Run `call` under retry and deadline policy.
///
/// Returns the final result together with the number of attempts made.
/// Each attempt is bounded by the remaining budget; an attempt that
/// outlives it counts as a timeout. Non-retryable failures surface
/// with `attempts == 1` when they occur on the first attempt.
pub async fn run_with_retry<T>(
    operation: &str,
    class: OpClass,
    retry: &RetryPolicy,
    deadline: &DeadlinePolicy,
    mut call: impl FnMut() -> BoxFuture<'static, PortResult<T>>,
) -> (PortResult<T>, u32) {
    let budget = deadline.budget(operation);
    let started = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let remaining = budget.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            return (
                Err(PortError::DeadlineExceeded {
                    operation: operation.to_string(),
                    attempts: attempts - 1,
                }),
                attempts - 1,
            );
        }

        let result = match tokio::time::timeout(remaining, call()).await {
            Ok(res) => res,
            Err(_) => Err(PortError::timeout(format!(
                "attempt outlived remaining budget of {remaining:?}"
            ))),
        };

        match result {
            Ok(value) => return (Ok(value), attempts),
            Err(err) => {
                if attempts >= retry.max_attempts || !retry.should_retry(&err, class) {
                    if err.is_transient() {
                        warn!(operation, attempts, error = %err, "retries exhausted");
                    }
                    return (Err(err), attempts);
                }

                let backoff = retry.backoff(attempts);
                if started.elapsed() + backoff >= budget {
                    debug!(operation, attempts, "backoff would exceed deadline budget");
                    return (
                        Err(PortError::DeadlineExceeded {
                            operation: operation.to_string(),
                            attempts,
                        }),
                        attempts,
                    );
                }

                debug!(operation, attempts, ?backoff, error = %err, "retrying after backoff");
                tokio::time::sleep(backoff).await;
            }
        }
    }
}
