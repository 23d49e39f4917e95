//! Raw exchange port trait.
//!
//! Trait-based abstraction over the exchange's order API so that
//! adapters (paper, live HTTP, venue-specific) are interchangeable and
//! the reliability layer can be tested against scripted fakes.

use std::pin::Pin;

use gridbot_core::{OrderId, OrderRecord, OrderSide, Price, Size, Symbol};

use crate::error::PortResult;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Parameters of a new order submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceRequest {
    pub symbol: Symbol,
    pub side: OrderSide,
    pub price: Price,
    pub qty: Size,
    /// Grid level the order occupies.
    pub level_id: i32,
    /// Submission timestamp (Unix milliseconds). Not part of the
    /// order's identity: retries carry fresh timestamps.
    pub ts_ms: u64,
    pub reduce_only: bool,
}

/// Parameters of an order modification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceRequest {
    pub order_id: OrderId,
    pub symbol: Symbol,
    pub new_price: Price,
    pub new_qty: Size,
    pub ts_ms: u64,
}

/// Raw exchange order API.
///
/// Every call may fail transiently or permanently; callers go through
/// `IdempotentPort`, never through this trait directly, on the live
/// write path.
pub trait ExchangePort: Send + Sync {
    /// Submit a new resting order. Returns the exchange order id.
    fn place(&self, req: PlaceRequest) -> BoxFuture<'_, PortResult<OrderId>>;

    /// Cancel an order. Returns whether the order was actually open.
    fn cancel(&self, order_id: OrderId) -> BoxFuture<'_, PortResult<bool>>;

    /// Replace price/quantity of an order. Returns the (possibly new)
    /// exchange order id.
    fn replace(&self, req: ReplaceRequest) -> BoxFuture<'_, PortResult<OrderId>>;

    /// Fetch currently open orders for a symbol (read-back path).
    fn fetch_open_orders(&self, symbol: Symbol) -> BoxFuture<'_, PortResult<Vec<OrderRecord>>>;
}
