//! Grid plan: the desired ladder of resting orders for one symbol.
//!
//! Produced upstream by the strategy planner each tick; consumed, never
//! mutated, by the reconciler.

use crate::{OrderSide, Price, Size};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating mode of a grid plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridMode {
    /// Quote both sides of the ladder.
    Bilateral,
    /// Only place buy levels (accumulate long).
    UniLong,
    /// Only place sell levels (accumulate short).
    UniShort,
    /// Pull all orders, place nothing.
    Pause,
    /// Pull all orders immediately, place nothing.
    Emergency,
}

impl GridMode {
    /// Whether this mode places orders on the given side.
    #[must_use]
    pub fn allows_side(&self, side: OrderSide) -> bool {
        match self {
            Self::Bilateral => true,
            Self::UniLong => side == OrderSide::Buy,
            Self::UniShort => side == OrderSide::Sell,
            Self::Pause | Self::Emergency => false,
        }
    }

    /// Whether this mode cancels everything and places nothing.
    #[must_use]
    pub fn is_halt(&self) -> bool {
        matches!(self, Self::Pause | Self::Emergency)
    }
}

impl fmt::Display for GridMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bilateral => write!(f, "bilateral"),
            Self::UniLong => write!(f, "uni_long"),
            Self::UniShort => write!(f, "uni_short"),
            Self::Pause => write!(f, "pause"),
            Self::Emergency => write!(f, "emergency"),
        }
    }
}

/// Reset directive: how aggressively the existing ladder is rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetDirective {
    /// Plain reconcile: minimal diff against the existing ladder.
    #[default]
    None,
    /// Replace only orders that no longer match their level.
    Soft,
    /// Cancel everything and rebuild the full ladder.
    Hard,
}

impl fmt::Display for ResetDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Soft => write!(f, "soft"),
            Self::Hard => write!(f, "hard"),
        }
    }
}

/// Per-level quantity schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QtySchedule {
    /// Same quantity at every level.
    Uniform(Size),
    /// Explicit quantity per level distance (index 0 = level 1).
    /// Levels past the end reuse the last entry.
    PerLevel(Vec<Size>),
}

impl QtySchedule {
    /// Quantity for level distance `k` (1-based, k >= 1).
    #[must_use]
    pub fn qty_for(&self, k: u32) -> Size {
        match self {
            Self::Uniform(size) => *size,
            Self::PerLevel(sizes) => {
                if sizes.is_empty() {
                    return Size::ZERO;
                }
                let idx = (k.saturating_sub(1) as usize).min(sizes.len() - 1);
                sizes[idx]
            }
        }
    }
}

/// Desired grid of resting orders around a center price.
///
/// Immutable per tick. The canonical field string feeds the plan digest
/// so two consecutive ticks with an unchanged plan are cheap no-ops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridPlan {
    /// Operating mode.
    pub mode: GridMode,
    /// Center price of the ladder.
    pub center: Price,
    /// Spacing between adjacent levels in basis points.
    pub spacing_bps: Decimal,
    /// Number of sell levels above center.
    pub levels_up: u32,
    /// Number of buy levels below center.
    pub levels_down: u32,
    /// Per-level quantity schedule.
    pub qty: QtySchedule,
    /// Reset directive.
    pub reset: ResetDirective,
    /// Human-readable reason for this plan (strategy-provided).
    pub reason: String,
}

impl GridPlan {
    /// Canonical representation of the fields that define the ladder.
    ///
    /// Numeric values are normalized so trailing-zero variance never
    /// changes the digest. The reason string is descriptive only and
    /// deliberately excluded.
    #[must_use]
    pub fn canonical_fields(&self) -> String {
        format!(
            "mode={};center={};spacing={};up={};down={};qty={};reset={}",
            self.mode,
            self.center.canonical(),
            self.spacing_bps.normalize(),
            self.levels_up,
            self.levels_down,
            self.qty_canonical(),
            self.reset,
        )
    }

    fn qty_canonical(&self) -> String {
        match &self.qty {
            QtySchedule::Uniform(size) => format!("u:{}", size.canonical()),
            QtySchedule::PerLevel(sizes) => {
                let parts: Vec<String> = sizes.iter().map(|s| s.canonical()).collect();
                format!("p:{}", parts.join(","))
            }
        }
    }
}
