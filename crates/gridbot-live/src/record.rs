//! Per-action outcome records.
//!
//! One record per `ExecutionAction` per tick, never mutated after
//! creation. Observability reads these; no action is ever silently
//! dropped.

use gridbot_core::{ActionKind, ExecutionAction, OrderId, Symbol};
use gridbot_port::PortError;
use gridbot_risk::{BlockReason, RiskIntent};

/// Stable failure reason codes surfaced in records.
pub mod fail_reason {
    pub const NON_RETRYABLE_ERROR: &str = "NON_RETRYABLE_ERROR";
    pub const CIRCUIT_BREAKER_OPEN: &str = "CIRCUIT_BREAKER_OPEN";
}

/// Final status of one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStatus {
    /// The write reached the exchange and succeeded (or was served
    /// from the idempotency cache).
    Executed,
    /// A safety gate blocked it; zero exchange calls.
    Blocked,
    /// It passed the gates but the port call failed.
    Failed,
}

impl ActionStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Executed => "executed",
            Self::Blocked => "blocked",
            Self::Failed => "failed",
        }
    }
}

/// Outcome of one action in one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveActionRecord {
    pub symbol: Symbol,
    pub kind: ActionKind,
    pub level_id: i32,
    pub intent: RiskIntent,
    pub status: ActionStatus,
    /// Block or failure reason code; `None` when executed.
    pub reason: Option<String>,
    /// Exchange calls made; 0 for blocked or cache-hit actions.
    pub attempts: u32,
    /// Resulting (or targeted) order id, when known.
    pub order_id: Option<OrderId>,
    /// Error detail for failed actions.
    pub error: Option<String>,
    pub latency_ms: u64,
}

impl LiveActionRecord {
    #[must_use]
    pub fn executed(
        action: &ExecutionAction,
        intent: RiskIntent,
        attempts: u32,
        order_id: Option<OrderId>,
        latency_ms: u64,
    ) -> Self {
        Self {
            symbol: action.symbol.clone(),
            kind: action.kind,
            level_id: action.level_id,
            intent,
            status: ActionStatus::Executed,
            reason: None,
            attempts,
            order_id,
            error: None,
            latency_ms,
        }
    }

    #[must_use]
    pub fn blocked(action: &ExecutionAction, intent: RiskIntent, reason: &BlockReason) -> Self {
        Self {
            symbol: action.symbol.clone(),
            kind: action.kind,
            level_id: action.level_id,
            intent,
            status: ActionStatus::Blocked,
            reason: Some(reason.code().to_string()),
            attempts: 0,
            order_id: action.order_id.clone(),
            error: Some(reason.detail()),
            latency_ms: 0,
        }
    }

    #[must_use]
    pub fn failed(
        action: &ExecutionAction,
        intent: RiskIntent,
        error: &PortError,
        attempts: u32,
        latency_ms: u64,
    ) -> Self {
        Self {
            symbol: action.symbol.clone(),
            kind: action.kind,
            level_id: action.level_id,
            intent,
            status: ActionStatus::Failed,
            reason: Some(failure_reason(error).to_string()),
            attempts,
            order_id: action.order_id.clone(),
            error: Some(error.to_string()),
            latency_ms,
        }
    }
}

/// Map a port error to the stable failure reason code.
#[must_use]
pub fn failure_reason(error: &PortError) -> &'static str {
    match error {
        PortError::CircuitOpen { .. } => fail_reason::CIRCUIT_BREAKER_OPEN,
        PortError::NonRetryable { .. } => fail_reason::NON_RETRYABLE_ERROR,
        other => other.code(),
    }
}
