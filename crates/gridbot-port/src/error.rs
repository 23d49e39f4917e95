//! Port error taxonomy.
//!
//! Retryability is an explicit tag, never inferred from error
//! hierarchy: transient failures may be retried under policy,
//! everything else surfaces immediately.

use thiserror::Error;

/// Failure category within the transient/non-retryable split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Request timed out.
    Timeout,
    /// Connection-level failure.
    Connection,
    /// Server-side error (5xx-class).
    ServerError,
    /// Rate limited (429-class). Retryable only for read operations.
    RateLimited,
    /// Malformed request (4xx-class, excluding 429).
    BadRequest,
    /// Explicit business rejection from the exchange.
    Rejected,
}

/// Errors produced by the exchange port layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PortError {
    /// Transient failure, retryable under policy.
    #[error("transient failure ({kind:?}): {message}")]
    Transient { kind: ErrorKind, message: String },

    /// Permanent failure, never retried.
    #[error("non-retryable failure ({kind:?}): {message}")]
    NonRetryable { kind: ErrorKind, message: String },

    /// Circuit breaker rejected the call before it reached the port.
    #[error("circuit open for operation '{operation}'")]
    CircuitOpen { operation: String },

    /// A concurrent duplicate of the same intent is already executing.
    #[error("idempotency conflict: request in flight for key {key}")]
    IdempotencyConflict { key: String },

    /// Wall-clock budget exhausted before the call succeeded.
    #[error("deadline exceeded for operation '{operation}' after {attempts} attempts")]
    DeadlineExceeded { operation: String, attempts: u32 },
}

impl PortError {
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Transient {
            kind: ErrorKind::Timeout,
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::Transient {
            kind: ErrorKind::Connection,
            message: message.into(),
        }
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::Transient {
            kind: ErrorKind::ServerError,
            message: message.into(),
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::Transient {
            kind: ErrorKind::RateLimited,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::NonRetryable {
            kind: ErrorKind::BadRequest,
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::NonRetryable {
            kind: ErrorKind::Rejected,
            message: message.into(),
        }
    }

    /// Whether this failure is transient.
    ///
    /// Note: rate limits are transient but only retried for reads;
    /// `RetryPolicy::should_retry` applies that distinction.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// The failure kind, when one applies.
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Transient { kind, .. } | Self::NonRetryable { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Stable short code for records and idempotency entries.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Transient { kind, .. } | Self::NonRetryable { kind, .. } => match kind {
                ErrorKind::Timeout => "TIMEOUT",
                ErrorKind::Connection => "CONNECTION",
                ErrorKind::ServerError => "SERVER_ERROR",
                ErrorKind::RateLimited => "RATE_LIMITED",
                ErrorKind::BadRequest => "BAD_REQUEST",
                ErrorKind::Rejected => "REJECTED",
            },
            Self::CircuitOpen { .. } => "CIRCUIT_OPEN",
            Self::IdempotencyConflict { .. } => "IDEMPOTENCY_CONFLICT",
            Self::DeadlineExceeded { .. } => "DEADLINE_EXCEEDED",
        }
    }
}

/// Result type alias for port operations.
pub type PortResult<T> = Result<T, PortError>;
