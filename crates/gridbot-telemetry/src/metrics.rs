//! Prometheus metrics for the grid execution engine.
//!
//! Covers the write path end to end:
//! - reconciler actions and skip events
//! - risk intents and gate blocks
//! - executed/failed writes and attempt latency
//! - circuit breaker state per operation
//! - idempotency store hit/miss/conflict counters
//! - open order gauges per symbol/side
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. If registration fails,
//! it indicates a fatal configuration error (e.g., duplicate metric names)
//! that should cause an immediate crash at startup rather than silent failure.
//! These panics only occur during static initialization, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, register_int_gauge,
    CounterVec, GaugeVec, HistogramVec, IntGauge,
};

/// Reconciler actions emitted per tick.
/// Labels: symbol, kind (place/cancel/replace), reason
pub static ACTIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "gridbot_actions_total",
        "Total reconciler actions emitted",
        &["symbol", "kind", "reason"]
    )
    .unwrap()
});

/// Skip and summary events from the reconciler.
/// Labels: symbol, event, reason
pub static EXEC_EVENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "gridbot_exec_events_total",
        "Total reconciler events (skips, cancel-all summaries, unchanged plans)",
        &["symbol", "event", "reason"]
    )
    .unwrap()
});

/// Risk intents seen by the gate chain.
/// Labels: symbol, intent (cancel/increase_risk/reduce_risk)
pub static INTENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "gridbot_intents_total",
        "Total actions classified by risk intent",
        &["symbol", "intent"]
    )
    .unwrap()
});

/// Gate chain blocks.
/// Labels: symbol, reason (NOT_ARMED, KILL_SWITCH_ACTIVE, ...)
pub static GATE_BLOCKED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "gridbot_gate_blocked_total",
        "Total actions blocked by the safety gate chain",
        &["symbol", "reason"]
    )
    .unwrap()
});

/// Writes that reached the exchange and succeeded.
/// Labels: symbol, operation
pub static EXECUTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "gridbot_executed_total",
        "Total successfully executed exchange writes",
        &["symbol", "operation"]
    )
    .unwrap()
});

/// Writes that failed after gating.
/// Labels: symbol, operation, reason
pub static FAILED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "gridbot_failed_total",
        "Total failed exchange writes",
        &["symbol", "operation", "reason"]
    )
    .unwrap()
});

/// Wall-clock latency of one write through the idempotent port.
/// Labels: operation
pub static WRITE_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "gridbot_write_latency_ms",
        "Write latency through the idempotent port in milliseconds",
        &["operation"],
        vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0]
    )
    .unwrap()
});

/// Circuit breaker state per operation (0=closed, 1=half_open, 2=open).
pub static BREAKER_STATE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "gridbot_breaker_state",
        "Circuit breaker state per operation (0=closed, 1=half_open, 2=open)",
        &["operation"]
    )
    .unwrap()
});

/// Idempotency store outcomes.
/// Labels: outcome (hit/miss/conflict)
pub static IDEMPOTENCY_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "gridbot_idempotency_total",
        "Idempotency store lookups by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Open orders per symbol/side.
pub static OPEN_ORDERS: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "gridbot_open_orders",
        "Currently open orders per symbol and side",
        &["symbol", "side"]
    )
    .unwrap()
});

/// Ticks processed.
pub static TICKS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "gridbot_ticks_total",
        "Total snapshot ticks processed",
        &["symbol"]
    )
    .unwrap()
});

/// Engine up flag.
pub static ENGINE_UP: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("gridbot_engine_up", "Engine process liveness (1=up)").unwrap()
});

/// Convenience wrapper so call sites stay one-liners.
pub struct Metrics;

impl Metrics {
    pub fn action(symbol: &str, kind: &str, reason: &str) {
        ACTIONS_TOTAL.with_label_values(&[symbol, kind, reason]).inc();
    }

    pub fn exec_event(symbol: &str, event: &str, reason: &str) {
        EXEC_EVENTS_TOTAL
            .with_label_values(&[symbol, event, reason])
            .inc();
    }

    pub fn intent(symbol: &str, intent: &str) {
        INTENTS_TOTAL.with_label_values(&[symbol, intent]).inc();
    }

    pub fn gate_blocked(symbol: &str, reason: &str) {
        GATE_BLOCKED_TOTAL
            .with_label_values(&[symbol, reason])
            .inc();
    }

    pub fn executed(symbol: &str, operation: &str) {
        EXECUTED_TOTAL
            .with_label_values(&[symbol, operation])
            .inc();
    }

    pub fn failed(symbol: &str, operation: &str, reason: &str) {
        FAILED_TOTAL
            .with_label_values(&[symbol, operation, reason])
            .inc();
    }

    pub fn write_latency(operation: &str, latency_ms: f64) {
        WRITE_LATENCY_MS
            .with_label_values(&[operation])
            .observe(latency_ms);
    }

    /// Record breaker state; encodes closed=0, half_open=1, open=2.
    pub fn breaker_state(operation: &str, state: &str) {
        let value = match state {
            "half_open" => 1.0,
            "open" => 2.0,
            _ => 0.0,
        };
        BREAKER_STATE.with_label_values(&[operation]).set(value);
    }

    pub fn idempotency(outcome: &str) {
        IDEMPOTENCY_TOTAL.with_label_values(&[outcome]).inc();
    }

    pub fn open_orders(symbol: &str, side: &str, count: i64) {
        OPEN_ORDERS
            .with_label_values(&[symbol, side])
            .set(count as f64);
    }

    pub fn tick(symbol: &str) {
        TICKS_TOTAL.with_label_values(&[symbol]).inc();
    }

    pub fn engine_up() {
        ENGINE_UP.set(1);
    }

    pub fn engine_down() {
        ENGINE_UP.set(0);
    }
}
