//! Safety authorities for the live write path.
//!
//! Every order action must clear a fixed chain of independent gates
//! before it may reach the exchange:
//! 1. Armed flag
//! 2. Trading mode
//! 3. Kill switch (cancels always pass)
//! 4. Symbol whitelist
//! 5. Drawdown guard (cancels always pass)
//! 6. Engine phase (cancels always pass)
//!
//! The chain short-circuits at the first blocking gate and reports a
//! stable machine-readable reason code per block.

pub mod drawdown;
pub mod error;
pub mod gates;
pub mod intent;
pub mod kill_switch;
pub mod phase;

pub use drawdown::{AlwaysAllowGuard, DrawdownGuard, GuardState, GuardVerdict, ManualGuard};
pub use error::{RiskError, RiskResult};
pub use gates::{BlockReason, GateChain, GateDecision, SafetyControls, TradingMode};
pub use intent::{classify_intent, RiskIntent};
pub use kill_switch::{KillSwitchLatch, KillSwitchReason};
pub use phase::EnginePhase;
