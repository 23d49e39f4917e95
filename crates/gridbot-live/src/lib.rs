//! The live engine: snapshot in, gated exchange writes out.
//!
//! Per tick and symbol: run the planner, reconcile the ladder, classify
//! each action's risk intent, evaluate the safety gate chain, execute
//! allowed actions through the idempotent port, and record every
//! outcome. One action's failure never aborts its siblings.

pub mod orchestrator;
pub mod planner;
pub mod record;
pub mod runner;

pub use orchestrator::{SafetyGateOrchestrator, TickOutcome};
pub use planner::{GridPlanner, MarketTick, StaticPlanner};
pub use record::{failure_reason, ActionStatus, LiveActionRecord};
pub use runner::EngineRunner;
