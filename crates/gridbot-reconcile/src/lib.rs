//! Grid reconciliation engine.
//!
//! Turns a `GridPlan` plus the current `ExecutionState` into a minimal
//! ordered set of CANCEL/PLACE/REPLACE actions and the next state:
//! - PAUSE/EMERGENCY: cancel everything, place nothing
//! - HARD reset: cancel everything, rebuild the full ladder
//! - SOFT reset: replace only orders that drifted from their level
//! - plain reconcile: three-way diff keyed by grid level
//!
//! Reconcile is idempotent: re-running it against its own output
//! produces zero actions.

pub mod depth;
pub mod digest;
pub mod levels;
pub mod reconciler;

pub use depth::{DepthGuard, DepthGuardConfig, L2Snapshot};
pub use digest::plan_digest;
pub use levels::{desired_levels, DesiredLevel, LevelOutcome};
pub use reconciler::{GridReconciler, ReconcileOutcome};
