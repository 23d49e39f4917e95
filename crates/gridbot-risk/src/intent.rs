//! Risk intent classification of execution actions.

use gridbot_core::{ActionKind, ExecutionAction};
use serde::{Deserialize, Serialize};

/// How an action affects market exposure.
///
/// Gates treat `Cancel` as always safe; `IncreaseRisk` faces the full
/// chain; `ReduceRisk` sits in between (kill switch still blocks it,
/// the drawdown guard usually allows it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskIntent {
    Cancel,
    IncreaseRisk,
    ReduceRisk,
}

impl RiskIntent {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cancel => "cancel",
            Self::IncreaseRisk => "increase_risk",
            Self::ReduceRisk => "reduce_risk",
        }
    }
}

/// Classify one action's risk intent.
///
/// NOOP classifies as `Cancel`: it touches nothing, so it is always
/// safe to let through.
#[must_use]
pub fn classify_intent(action: &ExecutionAction) -> RiskIntent {
    match action.kind {
        ActionKind::Cancel | ActionKind::Noop => RiskIntent::Cancel,
        ActionKind::Place | ActionKind::Replace => {
            if action.reduce_only {
                RiskIntent::ReduceRisk
            } else {
                RiskIntent::IncreaseRisk
            }
        }
    }
}
