//! Order-book depth guard for PLACE actions.
//!
//! Runs before a PLACE is emitted, never for CANCELs: pulling an order
//! must stay possible regardless of market-data quality. Three checks,
//! in order: snapshot freshness, top-of-book depth on the relevant
//! side, projected price impact.

use gridbot_core::event::skip;
use gridbot_core::{OrderSide, Price, Size, Symbol};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Top-of-book depth snapshot for one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct L2Snapshot {
    pub symbol: Symbol,
    pub bid_price: Price,
    pub bid_qty: Size,
    pub ask_price: Price,
    pub ask_qty: Size,
    /// Timestamp the snapshot was received (Unix milliseconds).
    pub received_at_ms: u64,
}

impl L2Snapshot {
    /// Age of this snapshot relative to `now_ms`.
    #[must_use]
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.received_at_ms)
    }

    /// Spread in basis points relative to mid, if computable.
    #[must_use]
    pub fn spread_bps(&self) -> Option<Decimal> {
        let mid = (self.bid_price.inner() + self.ask_price.inner()) / Decimal::TWO;
        if mid.is_zero() {
            return None;
        }
        Some((self.ask_price.inner() - self.bid_price.inner()) / mid * Decimal::from(10000))
    }
}

/// Depth guard thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthGuardConfig {
    /// Maximum snapshot age before PLACEs are suppressed (ms).
    pub max_age_ms: u64,
    /// Minimum top-of-book quantity on the relevant side.
    pub min_top_qty: Size,
    /// Maximum projected impact in basis points.
    pub max_impact_bps: Decimal,
}

/// Pre-trade depth checks for PLACE actions.
#[derive(Debug, Clone)]
pub struct DepthGuard {
    config: DepthGuardConfig,
}

impl DepthGuard {
    #[must_use]
    pub fn new(config: DepthGuardConfig) -> Self {
        Self { config }
    }

    /// Check a candidate PLACE against the latest depth snapshot.
    ///
    /// Returns a stable skip reason code when the PLACE must be
    /// suppressed, `None` when it may proceed. A missing snapshot
    /// counts as stale.
    #[must_use]
    pub fn check_place(
        &self,
        side: OrderSide,
        qty: Size,
        snapshot: Option<&L2Snapshot>,
        now_ms: u64,
    ) -> Option<&'static str> {
        let snap = match snapshot {
            Some(s) if s.age_ms(now_ms) <= self.config.max_age_ms => s,
            _ => return Some(skip::L2_STALE),
        };

        let top_qty = match side {
            OrderSide::Buy => snap.bid_qty,
            OrderSide::Sell => snap.ask_qty,
        };

        if top_qty < self.config.min_top_qty {
            return Some(match side {
                OrderSide::Buy => skip::L2_INSUFFICIENT_DEPTH_BUY,
                OrderSide::Sell => skip::L2_INSUFFICIENT_DEPTH_SELL,
            });
        }

        // Projected impact: order size relative to resting top-of-book
        // depth, scaled by the current spread. Crude but monotone in
        // both size and book thinness, which is all the gate needs.
        if let Some(spread_bps) = snap.spread_bps() {
            if !top_qty.is_zero() {
                let impact = qty.inner() / top_qty.inner() * spread_bps;
                if impact > self.config.max_impact_bps {
                    return Some(match side {
                        OrderSide::Buy => skip::L2_IMPACT_BUY_HIGH,
                        OrderSide::Sell => skip::L2_IMPACT_SELL_HIGH,
                    });
                }
            }
        }

        None
    }
}
