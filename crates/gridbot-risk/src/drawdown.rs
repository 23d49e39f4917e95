//! Drawdown guard seam.
//!
//! The budget accounting itself lives outside this crate; the gate
//! chain consumes only the allow/block verdict through this trait.

use gridbot_core::Symbol;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::intent::RiskIntent;

/// Guard health as reported alongside a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardState {
    Normal,
    Warning,
    Breach,
}

/// A single allow/block decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardVerdict {
    pub allowed: bool,
    /// Guard-supplied detail, carried into the block record verbatim.
    pub reason: Option<String>,
    pub state: GuardState,
}

impl GuardVerdict {
    #[must_use]
    pub fn allow(state: GuardState) -> Self {
        Self {
            allowed: true,
            reason: None,
            state,
        }
    }

    #[must_use]
    pub fn block(reason: impl Into<String>, state: GuardState) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            state,
        }
    }
}

/// Allow/block authority over risk-increasing actions.
///
/// Implementations must answer from already-computed state; `allow` is
/// called on the hot path once per action per tick.
pub trait DrawdownGuard: Send + Sync {
    fn allow(&self, intent: RiskIntent, symbol: &Symbol) -> GuardVerdict;
}

/// Guard that never blocks. Used in dry-run and tests.
#[derive(Debug, Default)]
pub struct AlwaysAllowGuard;

impl DrawdownGuard for AlwaysAllowGuard {
    fn allow(&self, _intent: RiskIntent, _symbol: &Symbol) -> GuardVerdict {
        GuardVerdict::allow(GuardState::Normal)
    }
}

/// Operator-settable guard: a set breach blocks risk increases while
/// still letting reductions through.
#[derive(Debug, Default)]
pub struct ManualGuard {
    breach: RwLock<Option<String>>,
}

impl ManualGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_breach(&self, reason: impl Into<String>) {
        *self.breach.write() = Some(reason.into());
    }

    pub fn clear_breach(&self) {
        *self.breach.write() = None;
    }
}

impl DrawdownGuard for ManualGuard {
    fn allow(&self, intent: RiskIntent, _symbol: &Symbol) -> GuardVerdict {
        match self.breach.read().as_ref() {
            Some(reason) if intent == RiskIntent::IncreaseRisk => {
                GuardVerdict::block(reason.clone(), GuardState::Breach)
            }
            Some(_) => GuardVerdict::allow(GuardState::Breach),
            None => GuardVerdict::allow(GuardState::Normal),
        }
    }
}
