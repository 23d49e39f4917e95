//! Desired ladder computation.
//!
//! Level `+k` is the k-th sell level above center, `-k` the k-th buy
//! level below. Prices and quantities are floored to the symbol's tick
//! and step sizes; quantities that floor below the minimum produce a
//! skip outcome instead of a level.

use gridbot_core::event::skip;
use gridbot_core::{GridPlan, OrderSide, Price, Size, SymbolSpec};
use rust_decimal::Decimal;

/// A single desired grid level after constraint rounding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredLevel {
    /// Signed level id (positive = sell above center, negative = buy below).
    pub level_id: i32,
    /// Order side.
    pub side: OrderSide,
    /// Tick-floored limit price.
    pub price: Price,
    /// Step-floored quantity.
    pub qty: Size,
}

/// Outcome for one candidate level: either a placeable level or a skip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LevelOutcome {
    Level(DesiredLevel),
    /// Level suppressed, with the signed level id and a stable reason code.
    Skipped { level_id: i32, reason: &'static str },
}

/// Compute the desired ladder for a plan under symbol constraints.
///
/// Mode side restrictions are applied here: uni-directional modes never
/// emit the opposite side, halt modes emit nothing.
#[must_use]
pub fn desired_levels(plan: &GridPlan, spec: &SymbolSpec) -> Vec<LevelOutcome> {
    let mut out = Vec::with_capacity((plan.levels_up + plan.levels_down) as usize);

    // Buy levels below center, nearest first.
    if plan.mode.allows_side(OrderSide::Buy) {
        for k in 1..=plan.levels_down {
            out.push(level_at(plan, spec, -(k as i32)));
        }
    }

    // Sell levels above center, nearest first.
    if plan.mode.allows_side(OrderSide::Sell) {
        for k in 1..=plan.levels_up {
            out.push(level_at(plan, spec, k as i32));
        }
    }

    out
}

fn level_at(plan: &GridPlan, spec: &SymbolSpec, level_id: i32) -> LevelOutcome {
    let k = Decimal::from(level_id.unsigned_abs());
    let bps = Decimal::from(10000);
    let offset = k * plan.spacing_bps / bps;

    let (side, raw_price) = if level_id > 0 {
        (
            OrderSide::Sell,
            plan.center.inner() * (Decimal::ONE + offset),
        )
    } else {
        (
            OrderSide::Buy,
            plan.center.inner() * (Decimal::ONE - offset),
        )
    };

    let price = Price::new(raw_price).floor_to_tick(spec.tick_size);
    let qty = plan
        .qty
        .qty_for(level_id.unsigned_abs())
        .floor_to_step(spec.step_size);

    if spec.enforced && !spec.min_qty.is_zero() && qty < spec.min_qty {
        return LevelOutcome::Skipped {
            level_id,
            reason: skip::QTY_BELOW_MIN_QTY,
        };
    }

    LevelOutcome::Level(DesiredLevel {
        level_id,
        side,
        price,
        qty,
    })
}
