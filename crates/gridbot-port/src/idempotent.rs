//! `IdempotentPort`: the reliability wrapper every live write goes through.
//!
//! Write protocol, in order:
//! 1. derive the idempotency key from the request's semantic fields
//! 2. claim the key; a DONE duplicate replays the cached result with
//!    zero exchange calls, an INFLIGHT duplicate is a conflict
//! 3. ask the operation's circuit breaker for permission
//! 4. execute through retry/deadline policy
//! 5. mark the key DONE or FAILED and feed the breaker
//!
//! The store is consulted before the breaker: only a call that will
//! actually reach the exchange consumes breaker budget, so a dedup hit
//! can never eat a HALF_OPEN probe slot.
//!
//! Reads (`fetch_open_orders`) skip the store but still go through the
//! breaker and retry policy.

use std::fmt;
use std::sync::Arc;

use gridbot_core::{OrderId, OrderRecord, Symbol};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::breaker::{BreakerConfig, BreakerRegistry};
use crate::error::{PortError, PortResult};
use crate::idempotency::{
    derive_key, CachedResult, EntryStatus, IdempotencyStore, StoreConfig,
};
use crate::port::{BoxFuture, ExchangePort, PlaceRequest, ReplaceRequest};
use crate::retry::{run_with_retry, DeadlinePolicy, OpClass, RetryPolicy};

/// Configuration for the reliability wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdempotentPortConfig {
    /// Key namespace, usually the deployment environment ("live", "paper").
    pub scope: String,
    pub store: StoreConfig,
    pub breaker: BreakerConfig,
    pub retry: RetryPolicy,
    pub deadline: DeadlinePolicy,
}

impl Default for IdempotentPortConfig {
    fn default() -> Self {
        Self {
            scope: "live".to_string(),
            store: StoreConfig::default(),
            breaker: BreakerConfig::default(),
            retry: RetryPolicy::default(),
            deadline: DeadlinePolicy::default(),
        }
    }
}

impl IdempotentPortConfig {
    /// Validate all nested configuration; invalid config is fatal at startup.
    pub fn validate(&self) -> Result<(), String> {
        if self.scope.is_empty() {
            return Err("idempotency scope must not be empty".to_string());
        }
        self.store.validate()?;
        self.breaker.validate()?;
        if self.retry.max_attempts == 0 {
            return Err("retry max_attempts must be positive".to_string());
        }
        Ok(())
    }
}

/// Result of a write through the idempotent path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome<T> {
    pub value: T,
    /// Exchange calls made for this submission; 0 when deduplicated.
    pub attempts: u32,
    /// Whether the result came from the idempotency cache.
    pub deduped: bool,
}

/// A write that failed, with the number of raw exchange calls made.
#[derive(Debug)]
pub struct WriteError {
    pub error: PortError,
    /// Exchange calls made before the error surfaced; 0 when the
    /// breaker or an in-flight duplicate rejected the call up front.
    pub attempts: u32,
}

impl WriteError {
    /// An error raised before any exchange call was made.
    #[must_use]
    pub fn upfront(error: PortError) -> Self {
        Self { error, attempts: 0 }
    }

    /// Stable short code of the underlying error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        self.error.code()
    }
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

impl std::error::Error for WriteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Result type for writes through the idempotent path.
pub type WriteResult<T> = Result<WriteOutcome<T>, WriteError>;

/// Reliability wrapper around a raw `ExchangePort`.
pub struct IdempotentPort {
    inner: Arc<dyn ExchangePort>,
    store: Arc<IdempotencyStore>,
    breakers: Arc<BreakerRegistry>,
    retry: RetryPolicy,
    deadline: DeadlinePolicy,
    scope: String,
}

impl IdempotentPort {
    #[must_use]
    pub fn new(inner: Arc<dyn ExchangePort>, config: IdempotentPortConfig) -> Self {
        Self {
            inner,
            store: Arc::new(IdempotencyStore::new(config.store)),
            breakers: Arc::new(BreakerRegistry::new(config.breaker)),
            retry: config.retry,
            deadline: config.deadline,
            scope: config.scope,
        }
    }

    /// Idempotency store handle, for metrics export and purge ticks.
    #[must_use]
    pub fn store(&self) -> &IdempotencyStore {
        &self.store
    }

    /// Breaker registry handle, for metrics export.
    #[must_use]
    pub fn breakers(&self) -> &BreakerRegistry {
        &self.breakers
    }

    /// Submit a new order. Duplicate submissions of the same logical
    /// intent return the cached order id without touching the exchange.
    pub async fn place(
        &self,
        req: PlaceRequest,
        now_ms: u64,
    ) -> WriteResult<OrderId> {
        let (key, fingerprint) = derive_key(
            &self.scope,
            "place",
            &[
                ("symbol", Some(req.symbol.to_string())),
                ("side", Some(req.side.to_string())),
                ("price", Some(req.price.canonical())),
                ("qty", Some(req.qty.canonical())),
                ("level", Some(req.level_id.to_string())),
                ("reduce_only", req.reduce_only.then(|| "true".to_string())),
            ],
        );
        let inner = self.inner.clone();
        self.write_op(
            "place",
            key,
            fingerprint,
            now_ms,
            |cached| match cached {
                CachedResult::Order(id) => Some(id.clone()),
                CachedResult::Cancelled(_) => None,
            },
            |id| CachedResult::Order(id.clone()),
            move || {
                let inner = inner.clone();
                let req = req.clone();
                Box::pin(async move { inner.place(req).await })
            },
        )
        .await
    }

    /// Cancel an order. Duplicate cancels collapse into one call.
    pub async fn cancel(
        &self,
        order_id: OrderId,
        now_ms: u64,
    ) -> WriteResult<bool> {
        let (key, fingerprint) = derive_key(
            &self.scope,
            "cancel",
            &[("order_id", Some(order_id.to_string()))],
        );
        let inner = self.inner.clone();
        self.write_op(
            "cancel",
            key,
            fingerprint,
            now_ms,
            |cached| match cached {
                CachedResult::Cancelled(open) => Some(*open),
                CachedResult::Order(_) => None,
            },
            |open| CachedResult::Cancelled(*open),
            move || {
                let inner = inner.clone();
                let order_id = order_id.clone();
                Box::pin(async move { inner.cancel(order_id).await })
            },
        )
        .await
    }

    /// Replace price/quantity of an order.
    pub async fn replace(
        &self,
        req: ReplaceRequest,
        now_ms: u64,
    ) -> WriteResult<OrderId> {
        let (key, fingerprint) = derive_key(
            &self.scope,
            "replace",
            &[
                ("order_id", Some(req.order_id.to_string())),
                ("symbol", Some(req.symbol.to_string())),
                ("price", Some(req.new_price.canonical())),
                ("qty", Some(req.new_qty.canonical())),
            ],
        );
        let inner = self.inner.clone();
        self.write_op(
            "replace",
            key,
            fingerprint,
            now_ms,
            |cached| match cached {
                CachedResult::Order(id) => Some(id.clone()),
                CachedResult::Cancelled(_) => None,
            },
            |id| CachedResult::Order(id.clone()),
            move || {
                let inner = inner.clone();
                let req = req.clone();
                Box::pin(async move { inner.replace(req).await })
            },
        )
        .await
    }

    /// Fetch open orders (read-back path). Not deduplicated; retried
    /// under the read policy, including rate-limit responses.
    pub async fn fetch_open_orders(
        &self,
        symbol: Symbol,
        now_ms: u64,
    ) -> PortResult<Vec<OrderRecord>> {
        let breaker = self.breakers.get("fetch_open_orders");
        breaker.try_acquire(now_ms)?;

        let inner = self.inner.clone();
        let (result, _attempts) = run_with_retry(
            "fetch_open_orders",
            OpClass::Read,
            &self.retry,
            &self.deadline,
            move || {
                let inner = inner.clone();
                let symbol = symbol.clone();
                Box::pin(async move { inner.fetch_open_orders(symbol).await })
            },
        )
        .await;

        match &result {
            Ok(_) => breaker.record_success(now_ms),
            Err(_) => breaker.record_failure(now_ms),
        }
        result
    }

    async fn write_op<T, F>(
        &self,
        op: &'static str,
        key: String,
        fingerprint: String,
        now_ms: u64,
        from_cache: impl Fn(&CachedResult) -> Option<T>,
        to_cache: impl Fn(&T) -> CachedResult,
        call: F,
    ) -> WriteResult<T>
    where
        F: FnMut() -> BoxFuture<'static, PortResult<T>>,
    {
        loop {
            if self.store.put_if_absent(&key, &fingerprint, now_ms) {
                break;
            }
            match self.store.get(&key, now_ms) {
                Some(entry) if entry.status == EntryStatus::Done => {
                    // A DONE entry whose cached result does not match
                    // this operation's shape means two distinct intents
                    // collided on one key; surface it rather than
                    // replay the wrong result.
                    if let Some(value) = entry.result.as_ref().and_then(&from_cache) {
                        self.store.count_hit();
                        debug!(key = %key, op, "duplicate submission served from cache");
                        return Ok(WriteOutcome {
                            value,
                            attempts: 0,
                            deduped: true,
                        });
                    }
                    self.store.count_conflict();
                    return Err(WriteError::upfront(PortError::IdempotencyConflict { key }));
                }
                Some(entry) if entry.status == EntryStatus::Inflight => {
                    self.store.count_conflict();
                    return Err(WriteError::upfront(PortError::IdempotencyConflict { key }));
                }
                // Expired or FAILED since the claim attempt; claim again.
                _ => continue,
            }
        }

        let breaker = self.breakers.get(op);
        if let Err(err) = breaker.try_acquire(now_ms) {
            // Release the claim so a later submission can re-execute.
            self.store.mark_failed(&key, err.code(), now_ms);
            return Err(WriteError::upfront(err));
        }

        self.store.count_miss();
        let (result, attempts) =
            run_with_retry(op, OpClass::Write, &self.retry, &self.deadline, call).await;

        match result {
            Ok(value) => {
                self.store.mark_done(&key, to_cache(&value), now_ms);
                breaker.record_success(now_ms);
                Ok(WriteOutcome {
                    value,
                    attempts,
                    deduped: false,
                })
            }
            Err(err) => {
                self.store.mark_failed(&key, err.code(), now_ms);
                breaker.record_failure(now_ms);
                Err(WriteError { error: err, attempts })
            }
        }
    }
}
