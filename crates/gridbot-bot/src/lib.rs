//! Grid trading execution engine, assembled.
//!
//! Wires the strategy-agnostic pieces into a running application:
//! - config-seeded grid planner
//! - ladder reconciler with optional depth guard
//! - safety gate chain (arm, mode, kill switch, whitelist, drawdown, phase)
//! - idempotent exchange port with circuit breaker and retry
//! - tick runner with graceful shutdown

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
