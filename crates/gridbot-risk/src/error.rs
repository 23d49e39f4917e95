//! Risk crate errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RiskError {
    /// Invalid gate configuration. Fatal at startup, never at tick time.
    #[error("invalid safety configuration: {0}")]
    InvalidConfig(String),
}

pub type RiskResult<T> = Result<T, RiskError>;
