//! Per-symbol execution state.
//!
//! One instance per traded symbol. Replaced wholesale each tick by the
//! reconciler's output; never mutated in place by anything else.

use crate::{OrderId, OrderRecord, OrderSide};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Actual order state for one symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionState {
    /// Open orders keyed by order id.
    pub open_orders: HashMap<OrderId, OrderRecord>,
    /// Digest of the last applied plan's canonical fields.
    pub last_plan_digest: Option<String>,
    /// Monotonic tick counter.
    pub tick: u64,
}

impl ExecutionState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open orders.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.open_orders.len()
    }

    /// Number of open orders on one side.
    #[must_use]
    pub fn open_count_side(&self, side: OrderSide) -> usize {
        self.open_orders.values().filter(|o| o.side == side).count()
    }

    /// Find the open order occupying a grid level, if any.
    #[must_use]
    pub fn order_at_level(&self, level_id: i32) -> Option<&OrderRecord> {
        self.open_orders.values().find(|o| o.level_id == level_id)
    }

    /// Insert an open order (builder-style, used by tests and the live engine).
    #[must_use]
    pub fn with_order(mut self, order: OrderRecord) -> Self {
        self.open_orders.insert(order.id.clone(), order);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{OrderSide, Price, Size, Symbol};
    use rust_decimal_macros::dec;

    fn order(id: &str, side: OrderSide, level: i32) -> OrderRecord {
        OrderRecord::new(
            OrderId::from(id),
            Symbol::from("BTCUSDT"),
            side,
            Price::new(dec!(50000)),
            Size::new(dec!(0.1)),
            level,
            0,
        )
    }

    #[test]
    fn test_empty_state() {
        let state = ExecutionState::new();
        assert_eq!(state.open_count(), 0);
        assert!(state.last_plan_digest.is_none());
        assert_eq!(state.tick, 0);
    }

    #[test]
    fn test_side_counts_and_level_lookup() {
        let state = ExecutionState::new()
            .with_order(order("a", OrderSide::Buy, -1))
            .with_order(order("b", OrderSide::Sell, 1))
            .with_order(order("c", OrderSide::Sell, 2));

        assert_eq!(state.open_count(), 3);
        assert_eq!(state.open_count_side(OrderSide::Sell), 2);
        assert_eq!(state.order_at_level(-1).unwrap().id.as_str(), "a");
        assert!(state.order_at_level(5).is_none());
    }
}
