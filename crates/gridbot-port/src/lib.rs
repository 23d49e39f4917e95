//! Exchange port layer: the single write path to the exchange.
//!
//! Composes three independent reliability mechanisms around a raw
//! `ExchangePort`:
//! - `IdempotencyStore`: duplicate submissions of the same logical
//!   intent collapse into one side effect
//! - `CircuitBreaker`: per-operation failure tripwire that fast-fails
//!   when the exchange is unhealthy
//! - `RetryPolicy`/`DeadlinePolicy`: bounded retries for transient
//!   failures under a wall-clock budget
//!
//! `IdempotentPort` is the composition; `PaperPort` is an in-memory
//! adapter for dry-run and tests.

pub mod breaker;
pub mod error;
pub mod idempotency;
pub mod idempotent;
pub mod paper;
pub mod port;
pub mod retry;

pub use breaker::{BreakerConfig, BreakerRegistry, CircuitBreaker, CircuitState};
pub use error::{ErrorKind, PortError, PortResult};
pub use idempotency::{
    CachedResult, EntryStatus, IdempotencyEntry, IdempotencyStore, StoreConfig, StoreStats,
};
pub use idempotent::{IdempotentPort, IdempotentPortConfig, WriteError, WriteOutcome, WriteResult};
pub use paper::PaperPort;
pub use port::{BoxFuture, ExchangePort, PlaceRequest, ReplaceRequest};
pub use retry::{run_with_retry, DeadlinePolicy, OpClass, RetryPolicy};
