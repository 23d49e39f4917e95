//! Reconciliation events: skips and tick summaries.
//!
//! Skip conditions (quantity floor, depth guard) are represented as
//! explicit events, never as errors; no action is silently dropped.

use crate::Symbol;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What happened, expressed as a stable machine-readable code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// All orders cancelled because the plan mode is PAUSE.
    CancelAllPause,
    /// All orders cancelled because the plan mode is EMERGENCY.
    CancelAllEmergency,
    /// A would-be PLACE was skipped; the reason code says why.
    OrderSkipped,
    /// Plan unchanged since last tick; reconcile short-circuited.
    PlanUnchanged,
}

impl EventKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CancelAllPause => "CANCEL_ALL_PAUSE",
            Self::CancelAllEmergency => "CANCEL_ALL_EMERGENCY",
            Self::OrderSkipped => "ORDER_SKIPPED",
            Self::PlanUnchanged => "PLAN_UNCHANGED",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stable skip reason codes.
pub mod skip {
    pub const QTY_BELOW_MIN_QTY: &str = "EXEC_QTY_BELOW_MIN_QTY";
    pub const L2_STALE: &str = "EXEC_L2_STALE";
    pub const L2_INSUFFICIENT_DEPTH_BUY: &str = "EXEC_L2_INSUFFICIENT_DEPTH_BUY";
    pub const L2_INSUFFICIENT_DEPTH_SELL: &str = "EXEC_L2_INSUFFICIENT_DEPTH_SELL";
    pub const L2_IMPACT_BUY_HIGH: &str = "EXEC_L2_IMPACT_BUY_HIGH";
    pub const L2_IMPACT_SELL_HIGH: &str = "EXEC_L2_IMPACT_SELL_HIGH";
}

/// One reconciliation event for one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecEvent {
    /// Event kind.
    pub kind: EventKind,
    /// Traded symbol.
    pub symbol: Symbol,
    /// Grid level the event refers to, when applicable.
    pub level_id: Option<i32>,
    /// Detail reason code (for `OrderSkipped`).
    pub reason: Option<String>,
}

impl ExecEvent {
    /// Tick-level summary event (cancel-all, plan-unchanged).
    pub fn summary(kind: EventKind, symbol: Symbol) -> Self {
        Self {
            kind,
            symbol,
            level_id: None,
            reason: None,
        }
    }

    /// Per-level skip event with a detail reason code.
    pub fn skipped(symbol: Symbol, level_id: i32, reason: impl Into<String>) -> Self {
        Self {
            kind: EventKind::OrderSkipped,
            symbol,
            level_id: Some(level_id),
            reason: Some(reason.into()),
        }
    }
}
