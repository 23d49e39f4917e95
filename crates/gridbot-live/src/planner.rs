//! Planner seam and market tick input.
//!
//! The strategy math that decides spacing, level counts, and sizes
//! lives outside this crate; the engine only consumes the resulting
//! `GridPlan` through the `GridPlanner` trait.

use gridbot_core::{ExecutionState, GridPlan, Price, Symbol};
use gridbot_reconcile::L2Snapshot;
use parking_lot::RwLock;

/// One market snapshot driving one engine tick.
#[derive(Debug, Clone)]
pub struct MarketTick {
    pub symbol: Symbol,
    pub mid_price: Price,
    /// Latest top-of-book snapshot, consumed by the depth guard.
    pub depth: Option<L2Snapshot>,
    /// Snapshot timestamp (Unix milliseconds).
    pub ts_ms: u64,
}

/// Source of the desired grid for a symbol.
///
/// Returning `None` means "no opinion this tick": the engine leaves
/// the ladder untouched.
pub trait GridPlanner: Send + Sync {
    fn plan(&self, tick: &MarketTick, state: &ExecutionState) -> Option<GridPlan>;
}

/// Planner that replays an operator-set plan until it is replaced.
///
/// The production deployment drives this from the control surface;
/// tests drive it directly.
#[derive(Debug, Default)]
pub struct StaticPlanner {
    plan: RwLock<Option<GridPlan>>,
}

impl StaticPlanner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_plan(plan: GridPlan) -> Self {
        Self {
            plan: RwLock::new(Some(plan)),
        }
    }

    pub fn set_plan(&self, plan: GridPlan) {
        *self.plan.write() = Some(plan);
    }

    pub fn clear_plan(&self) {
        *self.plan.write() = None;
    }
}

impl GridPlanner for StaticPlanner {
    fn plan(&self, _tick: &MarketTick, _state: &ExecutionState) -> Option<GridPlan> {
        self.plan.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridbot_core::{GridMode, GridPlan, QtySchedule, ResetDirective, Size};
    use rust_decimal_macros::dec;

    fn tick() -> MarketTick {
        MarketTick {
            symbol: Symbol::from("BTCUSDT"),
            mid_price: Price::new(dec!(50000)),
            depth: None,
            ts_ms: 1000,
        }
    }

    #[test]
    fn test_static_planner_replays_until_replaced() {
        let planner = StaticPlanner::new();
        let state = ExecutionState::new();
        assert!(planner.plan(&tick(), &state).is_none());

        let plan = GridPlan {
            mode: GridMode::Bilateral,
            center: Price::new(dec!(50000)),
            spacing_bps: dec!(10),
            levels_up: 2,
            levels_down: 2,
            qty: QtySchedule::Uniform(Size::new(dec!(0.1))),
            reset: ResetDirective::None,
            reason: "steady".to_string(),
        };
        planner.set_plan(plan.clone());

        assert_eq!(planner.plan(&tick(), &state), Some(plan.clone()));
        assert_eq!(planner.plan(&tick(), &state), Some(plan));

        planner.clear_plan();
        assert!(planner.plan(&tick(), &state).is_none());
    }
}
