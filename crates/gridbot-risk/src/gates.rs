//! The safety gate chain.
//!
//! Gates are evaluated in a fixed numbered order and short-circuit at
//! the first block. Each block carries a stable reason code; a blocked
//! action makes zero exchange calls.

use std::collections::HashSet;
use std::sync::Arc;

use gridbot_core::Symbol;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::drawdown::DrawdownGuard;
use crate::error::{RiskError, RiskResult};
use crate::intent::RiskIntent;
use crate::kill_switch::KillSwitchLatch;
use crate::phase::EnginePhase;

/// Process trading mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradingMode {
    /// Writes are enabled; they go to whatever adapter is wired.
    LiveTrade,
    /// Pipeline runs but every write is blocked at the mode gate.
    DryRun,
    /// Read-only observation.
    Observe,
}

impl TradingMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LiveTrade => "live_trade",
            Self::DryRun => "dry_run",
            Self::Observe => "observe",
        }
    }
}

/// Readiness flags read fresh each tick.
///
/// Owned by the orchestrator's lifecycle and passed in explicitly;
/// never module-level globals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyControls {
    pub armed: bool,
    pub mode: TradingMode,
    /// Empty set means all symbols are allowed.
    pub whitelist: HashSet<Symbol>,
}

impl SafetyControls {
    #[must_use]
    pub fn new(armed: bool, mode: TradingMode, whitelist: HashSet<Symbol>) -> Self {
        Self {
            armed,
            mode,
            whitelist,
        }
    }

    /// Whitelist entries must be non-empty. Fatal at startup.
    pub fn validate(&self) -> RiskResult<()> {
        for symbol in &self.whitelist {
            if symbol.as_str().trim().is_empty() {
                return Err(RiskError::InvalidConfig(
                    "whitelist contains an empty symbol".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Why an action was blocked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    NotArmed,
    ModeNotLiveTrade { mode: TradingMode },
    KillSwitchActive,
    SymbolNotWhitelisted { symbol: Symbol },
    DrawdownBlocked { detail: String },
    FsmStateBlocked { phase: EnginePhase },
}

impl BlockReason {
    /// Stable machine-readable code, recorded per blocked action.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotArmed => "NOT_ARMED",
            Self::ModeNotLiveTrade { .. } => "MODE_NOT_LIVE_TRADE",
            Self::KillSwitchActive => "KILL_SWITCH_ACTIVE",
            Self::SymbolNotWhitelisted { .. } => "SYMBOL_NOT_WHITELISTED",
            Self::DrawdownBlocked { .. } => "DRAWDOWN_BLOCKED",
            Self::FsmStateBlocked { .. } => "FSM_STATE_BLOCKED",
        }
    }

    /// Human-readable detail for the action record.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::NotArmed => "engine not armed".to_string(),
            Self::ModeNotLiveTrade { mode } => {
                format!("trading mode is {}, not live_trade", mode.as_str())
            }
            Self::KillSwitchActive => "kill switch active".to_string(),
            Self::SymbolNotWhitelisted { symbol } => {
                format!("{symbol} not in whitelist")
            }
            Self::DrawdownBlocked { detail } => detail.clone(),
            Self::FsmStateBlocked { phase } => {
                format!("engine phase is {}, not active", phase.as_str())
            }
        }
    }
}

/// Outcome of one gate chain evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Block(BlockReason),
}

impl GateDecision {
    #[must_use]
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// The six-gate chain in front of every write.
///
/// Evaluation order is load-bearing and must not be reordered:
/// 1. Armed
/// 2. Trading mode
/// 3. Kill switch (CANCEL passes)
/// 4. Symbol whitelist
/// 5. Drawdown guard (CANCEL passes)
/// 6. Engine phase (CANCEL passes)
pub struct GateChain {
    kill_switch: Arc<KillSwitchLatch>,
    drawdown: Arc<dyn DrawdownGuard>,
}

impl GateChain {
    #[must_use]
    pub fn new(kill_switch: Arc<KillSwitchLatch>, drawdown: Arc<dyn DrawdownGuard>) -> Self {
        Self {
            kill_switch,
            drawdown,
        }
    }

    /// Evaluate all gates for one action, short-circuiting at the
    /// first block.
    #[must_use]
    pub fn evaluate(
        &self,
        intent: RiskIntent,
        symbol: &Symbol,
        controls: &SafetyControls,
        phase: EnginePhase,
    ) -> GateDecision {
        // Gate 1: armed
        if !controls.armed {
            return GateDecision::Block(BlockReason::NotArmed);
        }

        // Gate 2: trading mode
        if controls.mode != TradingMode::LiveTrade {
            return GateDecision::Block(BlockReason::ModeNotLiveTrade {
                mode: controls.mode,
            });
        }

        // Gate 3: kill switch; cancels always pass so the engine can
        // still unwind exposure under emergency stop
        if self.kill_switch.is_triggered() && intent != RiskIntent::Cancel {
            return GateDecision::Block(BlockReason::KillSwitchActive);
        }

        // Gate 4: whitelist; empty whitelist allows everything
        if !controls.whitelist.is_empty() && !controls.whitelist.contains(symbol) {
            return GateDecision::Block(BlockReason::SymbolNotWhitelisted {
                symbol: symbol.clone(),
            });
        }

        // Gate 5: drawdown guard; cancels never consult the guard
        if intent != RiskIntent::Cancel {
            let verdict = self.drawdown.allow(intent, symbol);
            if !verdict.allowed {
                let detail = verdict
                    .reason
                    .unwrap_or_else(|| "drawdown guard blocked".to_string());
                debug!(%symbol, intent = intent.as_str(), detail, "drawdown guard block");
                return GateDecision::Block(BlockReason::DrawdownBlocked { detail });
            }
        }

        // Gate 6: engine phase; only ACTIVE permits risk-bearing writes
        if !phase.is_operational() && intent != RiskIntent::Cancel {
            return GateDecision::Block(BlockReason::FsmStateBlocked { phase });
        }

        GateDecision::Allow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawdown::{AlwaysAllowGuard, ManualGuard};
    use crate::kill_switch::KillSwitchReason;

    fn live_controls() -> SafetyControls {
        SafetyControls::new(true, TradingMode::LiveTrade, HashSet::new())
    }

    fn chain() -> GateChain {
        GateChain::new(
            Arc::new(KillSwitchLatch::new()),
            Arc::new(AlwaysAllowGuard),
        )
    }

    fn sym() -> Symbol {
        Symbol::from("BTCUSDT")
    }

    #[test]
    fn test_all_gates_pass() {
        let decision = chain().evaluate(
            RiskIntent::IncreaseRisk,
            &sym(),
            &live_controls(),
            EnginePhase::Active,
        );
        assert!(decision.is_allow());
    }

    #[test]
    fn test_gate1_not_armed_blocks_everything() {
        let mut controls = live_controls();
        controls.armed = false;

        // Even cancels are blocked when disarmed
        for intent in [
            RiskIntent::Cancel,
            RiskIntent::IncreaseRisk,
            RiskIntent::ReduceRisk,
        ] {
            let decision = chain().evaluate(intent, &sym(), &controls, EnginePhase::Active);
            match decision {
                GateDecision::Block(reason) => assert_eq!(reason.code(), "NOT_ARMED"),
                GateDecision::Allow => panic!("expected block for {intent:?}"),
            }
        }
    }

    #[test]
    fn test_gate2_mode_blocks_when_not_live() {
        let mut controls = live_controls();
        controls.mode = TradingMode::DryRun;

        let decision = chain().evaluate(
            RiskIntent::IncreaseRisk,
            &sym(),
            &controls,
            EnginePhase::Active,
        );
        match decision {
            GateDecision::Block(reason) => {
                assert_eq!(reason.code(), "MODE_NOT_LIVE_TRADE");
            }
            GateDecision::Allow => panic!("expected block"),
        }
    }

    #[test]
    fn test_gate3_kill_switch_spares_cancels() {
        let latch = Arc::new(KillSwitchLatch::new());
        latch.trigger(
            KillSwitchReason::Manual {
                message: "test".to_string(),
            },
            1000,
        );
        let chain = GateChain::new(latch, Arc::new(AlwaysAllowGuard));
        let controls = live_controls();

        let place = chain.evaluate(
            RiskIntent::IncreaseRisk,
            &sym(),
            &controls,
            EnginePhase::Active,
        );
        match place {
            GateDecision::Block(reason) => assert_eq!(reason.code(), "KILL_SWITCH_ACTIVE"),
            GateDecision::Allow => panic!("expected block"),
        }

        // Reduce-only is still blocked; only cancels pass
        assert!(!chain
            .evaluate(
                RiskIntent::ReduceRisk,
                &sym(),
                &controls,
                EnginePhase::Active
            )
            .is_allow());
        assert!(chain
            .evaluate(RiskIntent::Cancel, &sym(), &controls, EnginePhase::Active)
            .is_allow());
    }

    #[test]
    fn test_gate4_whitelist() {
        let mut controls = live_controls();
        controls.whitelist.insert(Symbol::from("ETHUSDT"));

        let decision = chain().evaluate(
            RiskIntent::IncreaseRisk,
            &sym(),
            &controls,
            EnginePhase::Active,
        );
        match decision {
            GateDecision::Block(reason) => {
                assert_eq!(reason.code(), "SYMBOL_NOT_WHITELISTED");
            }
            GateDecision::Allow => panic!("expected block"),
        }

        controls.whitelist.insert(sym());
        assert!(chain()
            .evaluate(
                RiskIntent::IncreaseRisk,
                &sym(),
                &controls,
                EnginePhase::Active
            )
            .is_allow());
    }

    #[test]
    fn test_gate5_drawdown_carries_guard_reason() {
        let guard = Arc::new(ManualGuard::new());
        guard.set_breach("daily loss cap hit");
        let chain = GateChain::new(Arc::new(KillSwitchLatch::new()), guard);
        let controls = live_controls();

        let decision = chain.evaluate(
            RiskIntent::IncreaseRisk,
            &sym(),
            &controls,
            EnginePhase::Active,
        );
        match decision {
            GateDecision::Block(BlockReason::DrawdownBlocked { detail }) => {
                assert_eq!(detail, "daily loss cap hit");
            }
            other => panic!("expected drawdown block, got {other:?}"),
        }

        // Cancels skip the guard entirely
        assert!(chain
            .evaluate(RiskIntent::Cancel, &sym(), &controls, EnginePhase::Active)
            .is_allow());
    }

    #[test]
    fn test_gate6_phase_spares_cancels() {
        let controls = live_controls();
        for phase in [EnginePhase::Paused, EnginePhase::Emergency] {
            let decision = chain().evaluate(RiskIntent::IncreaseRisk, &sym(), &controls, phase);
            match decision {
                GateDecision::Block(reason) => assert_eq!(reason.code(), "FSM_STATE_BLOCKED"),
                GateDecision::Allow => panic!("expected block in {phase:?}"),
            }
            assert!(chain()
                .evaluate(RiskIntent::Cancel, &sym(), &controls, phase)
                .is_allow());
        }
    }

    #[test]
    fn test_gate_order_armed_beats_kill_switch() {
        let latch = Arc::new(KillSwitchLatch::new());
        latch.trigger(
            KillSwitchReason::Manual {
                message: "test".to_string(),
            },
            1000,
        );
        let chain = GateChain::new(latch, Arc::new(AlwaysAllowGuard));
        let mut controls = live_controls();
        controls.armed = false;

        let decision = chain.evaluate(
            RiskIntent::IncreaseRisk,
            &sym(),
            &controls,
            EnginePhase::Active,
        );
        match decision {
            GateDecision::Block(reason) => assert_eq!(reason.code(), "NOT_ARMED"),
            GateDecision::Allow => panic!("expected block"),
        }
    }

    #[test]
    fn test_controls_validation() {
        let mut controls = live_controls();
        assert!(controls.validate().is_ok());
        controls.whitelist.insert(Symbol::from("  "));
        assert!(controls.validate().is_err());
    }
}
