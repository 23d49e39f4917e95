//! In-memory paper adapter.
//!
//! Implements `ExchangePort` without touching a network: synthetic
//! order ids, an open-order book in a `DashMap`, call counters, and a
//! scriptable failure queue so tests can inject transient and
//! permanent errors per call.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use gridbot_core::{OrderId, OrderRecord, OrderState, Symbol};
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{PortError, PortResult};
use crate::port::{BoxFuture, ExchangePort, PlaceRequest, ReplaceRequest};

/// No-network exchange adapter for dry-run and tests.
#[derive(Debug, Default)]
pub struct PaperPort {
    orders: DashMap<OrderId, OrderRecord>,
    next_id: AtomicU64,
    place_calls: AtomicU64,
    cancel_calls: AtomicU64,
    replace_calls: AtomicU64,
    /// Errors to return on upcoming calls, consumed front-first.
    scripted_failures: Mutex<VecDeque<PortError>>,
}

impl PaperPort {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an error for the next write call; each queued error is
    /// consumed by exactly one call.
    pub fn fail_next(&self, error: PortError) {
        self.scripted_failures.lock().push_back(error);
    }

    /// Total raw place calls seen (including failed ones).
    pub fn place_calls(&self) -> u64 {
        self.place_calls.load(Ordering::SeqCst)
    }

    pub fn cancel_calls(&self) -> u64 {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    pub fn replace_calls(&self) -> u64 {
        self.replace_calls.load(Ordering::SeqCst)
    }

    /// Total write calls of any kind.
    pub fn total_calls(&self) -> u64 {
        self.place_calls() + self.cancel_calls() + self.replace_calls()
    }

    /// Number of open orders on the simulated book.
    pub fn open_order_count(&self) -> usize {
        self.orders.len()
    }

    fn take_scripted_failure(&self) -> Option<PortError> {
        self.scripted_failures.lock().pop_front()
    }

    fn mint_id(&self) -> OrderId {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        OrderId::new(format!("paper_{n}"))
    }
}

impl ExchangePort for PaperPort {
    fn place(&self, req: PlaceRequest) -> BoxFuture<'_, PortResult<OrderId>> {
        Box::pin(async move {
            self.place_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.take_scripted_failure() {
                return Err(err);
            }

            let id = self.mint_id();
            let record = OrderRecord::new(
                id.clone(),
                req.symbol.clone(),
                req.side,
                req.price,
                req.qty,
                req.level_id,
                req.ts_ms,
            );
            self.orders.insert(id.clone(), record);
            debug!(order_id = %id, symbol = %req.symbol, side = %req.side, "paper place");
            Ok(id)
        })
    }

    fn cancel(&self, order_id: OrderId) -> BoxFuture<'_, PortResult<bool>> {
        Box::pin(async move {
            self.cancel_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.take_scripted_failure() {
                return Err(err);
            }

            let was_open = self.orders.remove(&order_id).is_some();
            debug!(order_id = %order_id, was_open, "paper cancel");
            Ok(was_open)
        })
    }

    fn replace(&self, req: ReplaceRequest) -> BoxFuture<'_, PortResult<OrderId>> {
        Box::pin(async move {
            self.replace_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.take_scripted_failure() {
                return Err(err);
            }

            let old = self
                .orders
                .remove(&req.order_id)
                .map(|(_, rec)| rec)
                .ok_or_else(|| {
                    PortError::rejected(format!("unknown order {} on replace", req.order_id))
                })?;

            let id = self.mint_id();
            let mut record = old;
            record.id = id.clone();
            record.price = req.new_price;
            record.qty = req.new_qty;
            record.state = OrderState::Open;
            self.orders.insert(id.clone(), record);
            debug!(old_id = %req.order_id, new_id = %id, "paper replace");
            Ok(id)
        })
    }

    fn fetch_open_orders(&self, symbol: Symbol) -> BoxFuture<'_, PortResult<Vec<OrderRecord>>> {
        Box::pin(async move {
            let mut open: Vec<OrderRecord> = self
                .orders
                .iter()
                .filter(|e| e.value().symbol == symbol)
                .map(|e| e.value().clone())
                .collect();
            open.sort_by(|a, b| a.id.cmp(&b.id));
            Ok(open)
        })
    }
}
