//! Execution actions produced by reconciliation.
//!
//! Actions are produced fresh each tick and never persisted; only their
//! effects persist via `ExecutionState`.

use crate::{OrderId, OrderSide, Price, Size, Symbol};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of execution action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Place a new resting order.
    Place,
    /// Cancel an existing order.
    Cancel,
    /// Atomically replace price/quantity of an existing order.
    Replace,
    /// Nothing to do (kept for complete per-level reporting).
    Noop,
}

impl ActionKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Place => "place",
            Self::Cancel => "cancel",
            Self::Replace => "replace",
            Self::Noop => "noop",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One write the engine wants to perform against the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionAction {
    /// Action kind.
    pub kind: ActionKind,
    /// Target order id (cancel/replace only).
    pub order_id: Option<OrderId>,
    /// Traded symbol.
    pub symbol: Symbol,
    /// Order side.
    pub side: OrderSide,
    /// Limit price.
    pub price: Price,
    /// Order quantity.
    pub qty: Size,
    /// Grid level the action targets.
    pub level_id: i32,
    /// Whether the resulting order may only reduce exposure.
    pub reduce_only: bool,
    /// Stable machine-readable reason code (e.g. `RECONCILE_ADD`).
    pub reason: String,
}

impl ExecutionAction {
    /// Build a PLACE action.
    pub fn place(
        symbol: Symbol,
        side: OrderSide,
        price: Price,
        qty: Size,
        level_id: i32,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            kind: ActionKind::Place,
            order_id: None,
            symbol,
            side,
            price,
            qty,
            level_id,
            reduce_only: false,
            reason: reason.into(),
        }
    }

    /// Build a CANCEL action for an existing order.
    pub fn cancel(
        order_id: OrderId,
        symbol: Symbol,
        side: OrderSide,
        price: Price,
        qty: Size,
        level_id: i32,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            kind: ActionKind::Cancel,
            order_id: Some(order_id),
            symbol,
            side,
            price,
            qty,
            level_id,
            reduce_only: false,
            reason: reason.into(),
        }
    }

    /// Build a REPLACE action for an existing order.
    pub fn replace(
        order_id: OrderId,
        symbol: Symbol,
        side: OrderSide,
        new_price: Price,
        new_qty: Size,
        level_id: i32,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            kind: ActionKind::Replace,
            order_id: Some(order_id),
            symbol,
            side,
            price: new_price,
            qty: new_qty,
            level_id,
            reduce_only: false,
            reason: reason.into(),
        }
    }

    /// Mark this action reduce-only.
    #[must_use]
    pub fn reduce_only(mut self) -> Self {
        self.reduce_only = true;
        self
    }
}

/// Stable reason codes attached to reconciliation actions.
pub mod reason {
    pub const CANCEL_ALL_PAUSE: &str = "CANCEL_ALL_PAUSE";
    pub const CANCEL_ALL_EMERGENCY: &str = "CANCEL_ALL_EMERGENCY";
    pub const HARD_RESET: &str = "HARD_RESET";
    pub const SOFT_RESET_REPLACE: &str = "SOFT_RESET_REPLACE";
    pub const RECONCILE_ADD: &str = "RECONCILE_ADD";
    pub const RECONCILE_REMOVE: &str = "RECONCILE_REMOVE";
}
