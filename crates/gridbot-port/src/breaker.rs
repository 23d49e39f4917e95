//! Per-operation circuit breaker.
//!
//! Consecutive failures trip the breaker OPEN; after `open_interval_ms`
//! it moves to HALF_OPEN and lets a bounded number of probes through;
//! enough consecutive probe successes close it, any probe failure
//! re-opens it. Breakers are independent per operation name: a trip on
//! `place` never affects `cancel`.
//!
//! All transitions take `now_ms` so tests drive time directly.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{PortError, PortResult};

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Breaker thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures that trip CLOSED -> OPEN.
    pub failure_threshold: u32,
    /// Time OPEN before probing is allowed (ms).
    pub open_interval_ms: u64,
    /// Probe calls admitted while HALF_OPEN.
    pub half_open_probe_count: u32,
    /// Consecutive probe successes that close the breaker.
    pub success_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_interval_ms: 30_000,
            half_open_probe_count: 3,
            success_threshold: 1,
        }
    }
}

impl BreakerConfig {
    /// Validate thresholds; invalid configuration is fatal at startup.
    pub fn validate(&self) -> Result<(), String> {
        if self.failure_threshold == 0 {
            return Err("failure_threshold must be positive".to_string());
        }
        if self.open_interval_ms == 0 {
            return Err("open_interval_ms must be positive".to_string());
        }
        if self.half_open_probe_count == 0 {
            return Err("half_open_probe_count must be positive".to_string());
        }
        if self.success_threshold == 0 || self.success_threshold > self.half_open_probe_count {
            return Err(
                "success_threshold must be in 1..=half_open_probe_count".to_string(),
            );
        }
        Ok(())
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at_ms: u64,
    probes_admitted: u32,
    consecutive_probe_successes: u32,
}

/// Failure tripwire for one operation name.
#[derive(Debug)]
pub struct CircuitBreaker {
    operation: String,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(operation: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            operation: operation.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at_ms: 0,
                probes_admitted: 0,
                consecutive_probe_successes: 0,
            }),
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Ask permission to make one call at `now_ms`.
    ///
    /// Handles the OPEN -> HALF_OPEN transition and probe admission.
    pub fn try_acquire(&self, now_ms: u64) -> PortResult<()> {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                if now_ms.saturating_sub(inner.opened_at_ms) >= self.config.open_interval_ms {
                    inner.state = CircuitState::HalfOpen;
                    inner.probes_admitted = 1;
                    inner.consecutive_probe_successes = 0;
                    info!(operation = %self.operation, "breaker half-open, admitting probe");
                    Ok(())
                } else {
                    Err(PortError::CircuitOpen {
                        operation: self.operation.clone(),
                    })
                }
            }
            CircuitState::HalfOpen => {
                if inner.probes_admitted < self.config.half_open_probe_count {
                    inner.probes_admitted += 1;
                    Ok(())
                } else {
                    Err(PortError::CircuitOpen {
                        operation: self.operation.clone(),
                    })
                }
            }
        }
    }

    /// Record a successful call.
    pub fn record_success(&self, _now_ms: u64) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                inner.consecutive_probe_successes += 1;
                if inner.consecutive_probe_successes >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.consecutive_failures = 0;
                    inner.probes_admitted = 0;
                    inner.consecutive_probe_successes = 0;
                    info!(operation = %self.operation, "breaker closed");
                }
            }
            // Success while OPEN can only be a late response from before
            // the trip; the trip stands.
            CircuitState::Open => {}
        }
    }

    /// Record a failed call.
    pub fn record_failure(&self, now_ms: u64) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at_ms = now_ms;
                    warn!(
                        operation = %self.operation,
                        failures = inner.consecutive_failures,
                        "breaker opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at_ms = now_ms;
                inner.probes_admitted = 0;
                inner.consecutive_probe_successes = 0;
                warn!(operation = %self.operation, "probe failed, breaker re-opened");
            }
            CircuitState::Open => {}
        }
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Current consecutive failure count (CLOSED state).
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.inner.lock().consecutive_failures
    }
}

/// Shared registry of breakers keyed by operation name.
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    config: BreakerConfig,
}

impl BreakerRegistry {
    #[must_use]
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            config,
        }
    }

    /// Get or create the breaker for an operation name.
    #[must_use]
    pub fn get(&self, operation: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(operation.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(operation, self.config.clone()))
            })
            .clone()
    }

    /// Snapshot of all breaker states, for metrics export.
    #[must_use]
    pub fn states(&self) -> Vec<(String, CircuitState)> {
        self.breakers
            .iter()
            .map(|e| (e.key().clone(), e.value().state()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BreakerConfig {
        BreakerConfig {
            failure_threshold: 3,
            open_interval_ms: 1000,
            half_open_probe_count: 2,
            success_threshold: 1,
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(config().validate().is_ok());

        let mut bad = config();
        bad.failure_threshold = 0;
        assert!(bad.validate().is_err());

        let mut bad = config();
        bad.success_threshold = 5; // > probe count
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_trips_after_threshold_consecutive_failures() {
        let breaker = CircuitBreaker::new("place", config());

        breaker.record_failure(0);
        breaker.record_failure(1);
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.try_acquire(2).is_ok());

        breaker.record_failure(2);
        assert_eq!(breaker.state(), CircuitState::Open);
        let err = breaker.try_acquire(3).unwrap_err();
        match err {
            PortError::CircuitOpen { operation } => assert_eq!(operation, "place"),
            other => panic!("expected circuit open, got {other:?}"),
        }
    }

    #[test]
    fn test_success_resets_failure_streak() {
        let breaker = CircuitBreaker::new("place", config());
        breaker.record_failure(0);
        breaker.record_failure(1);
        breaker.record_success(2);
        breaker.record_failure(3);
        breaker.record_failure(4);
        // Streak was broken; still closed
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_open_to_half_open_after_interval() {
        let breaker = CircuitBreaker::new("place", config());
        for t in 0..3 {
            breaker.record_failure(t);
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        // Too early
        assert!(breaker.try_acquire(500).is_err());

        // Interval elapsed: probe admitted
        assert!(breaker.try_acquire(1002).is_ok());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        // Successful probe closes (success_threshold = 1)
        breaker.record_success(1003);
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.try_acquire(1004).is_ok());
    }

    #[test]
    fn test_probe_failure_reopens() {
        let breaker = CircuitBreaker::new("cancel", config());
        for t in 0..3 {
            breaker.record_failure(t);
        }
        assert!(breaker.try_acquire(1500).is_ok());
        breaker.record_failure(1501);
        assert_eq!(breaker.state(), CircuitState::Open);

        // New open interval counts from the re-open
        assert!(breaker.try_acquire(2000).is_err());
        assert!(breaker.try_acquire(2502).is_ok());
    }

    #[test]
    fn test_probe_budget_limited() {
        let breaker = CircuitBreaker::new("place", config());
        for t in 0..3 {
            breaker.record_failure(t);
        }
        // Two probes admitted, third rejected
        assert!(breaker.try_acquire(1500).is_ok());
        assert!(breaker.try_acquire(1501).is_ok());
        assert!(breaker.try_acquire(1502).is_err());
    }

    #[test]
    fn test_success_threshold_above_one() {
        let cfg = BreakerConfig {
            success_threshold: 2,
            ..config()
        };
        let breaker = CircuitBreaker::new("replace", cfg);
        for t in 0..3 {
            breaker.record_failure(t);
        }
        assert!(breaker.try_acquire(1500).is_ok());
        breaker.record_success(1501);
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        assert!(breaker.try_acquire(1502).is_ok());
        breaker.record_success(1503);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_registry_isolates_operations() {
        let registry = BreakerRegistry::new(config());
        let place = registry.get("place");
        let cancel = registry.get("cancel");

        for t in 0..3 {
            place.record_failure(t);
        }
        assert_eq!(place.state(), CircuitState::Open);
        assert_eq!(cancel.state(), CircuitState::Closed);
        assert!(cancel.try_acquire(10).is_ok());

        // Same name returns the same breaker
        assert_eq!(registry.get("place").state(), CircuitState::Open);
    }
}
