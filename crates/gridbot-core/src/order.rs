//! Order-related types and identifiers.

use crate::{Price, Size, Symbol};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Order side: buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Returns the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    /// Returns 1 for buy, -1 for sell (for exposure calculations).
    pub fn sign(&self) -> i8 {
        match self {
            Self::Buy => 1,
            Self::Sell => -1,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Exchange order identifier.
///
/// Orders the exchange has not yet acknowledged carry a provisional id
/// derived from the grid level, so reconciliation output stays
/// deterministic; the live engine re-keys to the exchange id on ack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Generate a fresh random order id (used by the paper adapter).
    pub fn random() -> Self {
        let short = &Uuid::new_v4().to_string()[..8];
        Self(format!("ord_{short}"))
    }

    /// Deterministic provisional id for a not-yet-acknowledged grid order.
    pub fn provisional(symbol: &Symbol, level_id: i32) -> Self {
        Self(format!("pending:{symbol}:{level_id}"))
    }

    /// Whether this id is a provisional grid-level id.
    pub fn is_provisional(&self) -> bool {
        self.0.starts_with("pending:")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderState {
    /// Resting on the book.
    Open,
    /// Partially filled, remainder still resting.
    PartiallyFilled,
    /// Completely filled.
    Filled,
    /// Cancelled.
    Cancelled,
    /// Rejected by the exchange.
    Rejected,
    /// Expired (time-in-force elapsed).
    Expired,
}

impl OrderState {
    /// Returns true if the order is in a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Filled | Self::Cancelled | Self::Rejected | Self::Expired
        )
    }

    /// Returns true if the order is still resting (can be cancelled).
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Open | Self::PartiallyFilled)
    }
}

/// An order as tracked by per-symbol execution state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    /// Exchange order id (or provisional grid id before ack).
    pub id: OrderId,
    /// Traded symbol.
    pub symbol: Symbol,
    /// Order side.
    pub side: OrderSide,
    /// Limit price.
    pub price: Price,
    /// Order quantity.
    pub qty: Size,
    /// Lifecycle state.
    pub state: OrderState,
    /// Grid level this order occupies (positive = above center, negative = below).
    pub level_id: i32,
    /// Creation timestamp (Unix milliseconds).
    pub created_at_ms: u64,
}

impl OrderRecord {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: OrderId,
        symbol: Symbol,
        side: OrderSide,
        price: Price,
        qty: Size,
        level_id: i32,
        created_at_ms: u64,
    ) -> Self {
        Self {
            id,
            symbol,
            side,
            price,
            qty,
            state: OrderState::Open,
            level_id,
            created_at_ms,
        }
    }

    /// Returns a copy with the given lifecycle state.
    #[must_use]
    pub fn with_state(mut self, state: OrderState) -> Self {
        self.state = state;
        self
    }
}
