//! Core domain types for the grid execution engine.
//!
//! This crate provides fundamental types used throughout the system:
//! - `Symbol`, `SymbolSpec`: market identification and exchange constraints
//! - `Price`, `Size`: precision-safe numeric types
//! - `GridPlan`: desired ladder of resting orders (produced upstream)
//! - `OrderRecord`, `ExecutionState`: actual order state per symbol
//! - `ExecutionAction`, `ExecEvent`: reconciliation output

pub mod action;
pub mod decimal;
pub mod event;
pub mod order;
pub mod plan;
pub mod state;
pub mod symbol;

pub use action::{ActionKind, ExecutionAction};
pub use decimal::{Price, Size};
pub use event::{EventKind, ExecEvent};
pub use order::{OrderId, OrderRecord, OrderSide, OrderState};
pub use plan::{GridMode, GridPlan, QtySchedule, ResetDirective};
pub use state::ExecutionState;
pub use symbol::{Symbol, SymbolSpec};
