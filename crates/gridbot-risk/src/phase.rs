//! Engine lifecycle phase consumed by the gate chain.

use serde::{Deserialize, Serialize};

/// Lifecycle phase of the trading engine.
///
/// Only `Active` permits risk-bearing writes. During `Init` and
/// `Ready` the orchestrator does not invoke the planner or reconciler
/// at all, so no order actions can even be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnginePhase {
    /// Starting up, wiring not complete.
    Init,
    /// Wired and waiting for go-live.
    Ready,
    /// Fully operational.
    Active,
    /// Temporarily suspended by operator or strategy.
    Paused,
    /// Emergency halt; only cancels may proceed.
    Emergency,
}

impl EnginePhase {
    /// Whether risk-bearing writes are permitted.
    #[must_use]
    pub fn is_operational(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Whether the engine is still starting up. Planner and reconciler
    /// are skipped entirely in these phases.
    #[must_use]
    pub fn is_initializing(&self) -> bool {
        matches!(self, Self::Init | Self::Ready)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Ready => "ready",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Emergency => "emergency",
        }
    }
}
