//! Kill switch latch.
//!
//! Once triggered it stays triggered until an operator resets it.
//! While active, every intent except CANCEL is blocked at the gate
//! chain, so the engine can only unwind exposure, never add to it.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{error, info, warn};

/// Reason the kill switch fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KillSwitchReason {
    /// Operator-initiated.
    Manual { message: String },
    /// Too many consecutive write failures.
    ConsecutiveFailures { count: u32 },
    /// External monitor detected a violation.
    Monitor { event: String },
}

impl std::fmt::Display for KillSwitchReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Manual { message } => write!(f, "manual: {message}"),
            Self::ConsecutiveFailures { count } => {
                write!(f, "consecutive failures: {count}")
            }
            Self::Monitor { event } => write!(f, "monitor: {event}"),
        }
    }
}

/// Sticky emergency stop.
///
/// Thread-safe; share via `Arc<KillSwitchLatch>`. Auto-reset is
/// prohibited: only an operator who has investigated the trigger may
/// call `reset`.
pub struct KillSwitchLatch {
    triggered: AtomicBool,
    /// Unix milliseconds of trigger, 0 when not triggered.
    triggered_at: AtomicU64,
    reason: RwLock<Option<KillSwitchReason>>,
}

impl Default for KillSwitchLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl KillSwitchLatch {
    #[must_use]
    pub fn new() -> Self {
        Self {
            triggered: AtomicBool::new(false),
            triggered_at: AtomicU64::new(0),
            reason: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Trigger the latch. A second trigger keeps the original reason.
    pub fn trigger(&self, reason: KillSwitchReason, now_ms: u64) {
        if self
            .triggered
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.triggered_at.store(now_ms, Ordering::SeqCst);
            *self.reason.write() = Some(reason.clone());
            error!(reason = %reason, "KILL SWITCH TRIGGERED");
        } else {
            warn!(new_reason = %reason, "kill switch already triggered, keeping original reason");
        }
    }

    /// Trigger timestamp, if triggered.
    #[must_use]
    pub fn triggered_at(&self) -> Option<u64> {
        if self.is_triggered() {
            let ts = self.triggered_at.load(Ordering::SeqCst);
            if ts > 0 {
                return Some(ts);
            }
        }
        None
    }

    #[must_use]
    pub fn reason(&self) -> Option<KillSwitchReason> {
        if self.is_triggered() {
            self.reason.read().clone()
        } else {
            None
        }
    }

    /// Operator reset after investigating the trigger.
    pub fn reset(&self) {
        if self.is_triggered() {
            let previous = self.reason.read().clone();
            info!(previous_reason = ?previous, "kill switch manually reset");
            self.triggered.store(false, Ordering::SeqCst);
            self.triggered_at.store(0, Ordering::SeqCst);
            *self.reason.write() = None;
        }
    }
}
