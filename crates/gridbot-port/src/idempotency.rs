//! Idempotency store: deduplicates retried write submissions.
//!
//! Keyed by `{scope}:{op}:{digest}` where the digest covers only the
//! operation's semantic parameters. The submission timestamp is
//! deliberately excluded: every retry carries a fresh timestamp but
//! represents the same intent, and including it would defeat
//! deduplication entirely.
//!
//! `put_if_absent` is the single atomic primitive; no other pair of
//! calls may be assumed atomic together.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use gridbot_core::OrderId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::trace;

/// Status of an idempotency entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryStatus {
    /// The operation is executing right now.
    Inflight,
    /// The operation committed; the cached result is authoritative.
    Done,
    /// The operation failed without committing; the key may be re-claimed.
    Failed,
}

/// Result cached for DONE entries and replayed on duplicate submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CachedResult {
    /// Place/replace result.
    Order(OrderId),
    /// Cancel result.
    Cancelled(bool),
}

/// One deduplication record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyEntry {
    pub key: String,
    pub status: EntryStatus,
    /// Canonical parameter string the key was derived from.
    pub fingerprint: String,
    pub created_at_ms: u64,
    /// Entries past this instant are logically absent.
    pub expires_at_ms: u64,
    /// Cached result (DONE only).
    pub result: Option<CachedResult>,
    /// Failure code (FAILED only).
    pub error_code: Option<String>,
}

impl IdempotencyEntry {
    fn inflight(key: String, fingerprint: String, now_ms: u64, ttl_ms: u64) -> Self {
        Self {
            key,
            status: EntryStatus::Inflight,
            fingerprint,
            created_at_ms: now_ms,
            expires_at_ms: now_ms + ttl_ms,
            result: None,
            error_code: None,
        }
    }

    /// Whether this entry is past its expiry at `now_ms`.
    #[must_use]
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }
}

/// TTL configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Retention of INFLIGHT claims (ms). Conservative: an in-memory
    /// store loses INFLIGHT state on restart, so this bounds the window
    /// in which a restarted process could double-submit.
    pub inflight_ttl_ms: u64,
    /// Retention of DONE results (ms); mark_done extends the entry to this.
    pub done_ttl_ms: u64,
    /// Retention of FAILED markers (ms); informational only, since
    /// FAILED keys are immediately re-claimable.
    pub failed_ttl_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            inflight_ttl_ms: 30_000,
            done_ttl_ms: 3_600_000,
            failed_ttl_ms: 60_000,
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.inflight_ttl_ms == 0 || self.done_ttl_ms == 0 || self.failed_ttl_ms == 0 {
            return Err("idempotency TTLs must be positive".to_string());
        }
        if self.done_ttl_ms < self.inflight_ttl_ms {
            return Err("done_ttl_ms must be >= inflight_ttl_ms".to_string());
        }
        Ok(())
    }
}

/// Hit/miss/conflict counters, for metrics export.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub hits: u64,
    pub misses: u64,
    pub conflicts: u64,
}

/// In-memory idempotency store.
///
/// Safe for concurrent use from multiple symbol workers; all claim
/// logic goes through the atomic `put_if_absent`.
#[derive(Debug, Default)]
pub struct IdempotencyStore {
    entries: DashMap<String, IdempotencyEntry>,
    config: StoreConfig,
    hits: AtomicU64,
    misses: AtomicU64,
    conflicts: AtomicU64,
}

impl IdempotencyStore {
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            conflicts: AtomicU64::new(0),
        }
    }

    /// Claim a key with a fresh INFLIGHT entry.
    ///
    /// Succeeds only when no live entry holds the key: expired and
    /// FAILED entries count as absent (failed operations are assumed
    /// non-committing and may be re-executed). Returns whether the
    /// claim succeeded; on `false` nothing was mutated.
    pub fn put_if_absent(&self, key: &str, fingerprint: &str, now_ms: u64) -> bool {
        let fresh =
            IdempotencyEntry::inflight(key.to_string(), fingerprint.to_string(), now_ms, self.config.inflight_ttl_ms);

        match self.entries.entry(key.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(fresh);
                trace!(key, "idempotency key claimed");
                true
            }
            Entry::Occupied(mut slot) => {
                let existing = slot.get();
                if existing.is_expired(now_ms) || existing.status == EntryStatus::Failed {
                    slot.insert(fresh);
                    trace!(key, "idempotency key re-claimed");
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Look up a live entry.
    #[must_use]
    pub fn get(&self, key: &str, now_ms: u64) -> Option<IdempotencyEntry> {
        self.entries
            .get(key)
            .filter(|e| !e.is_expired(now_ms))
            .map(|e| e.clone())
    }

    /// Transition an INFLIGHT entry to DONE, caching its result and
    /// extending retention to the done TTL.
    pub fn mark_done(&self, key: &str, result: CachedResult, now_ms: u64) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.status = EntryStatus::Done;
            entry.result = Some(result);
            entry.error_code = None;
            entry.expires_at_ms = now_ms + self.config.done_ttl_ms;
        }
    }

    /// Transition an INFLIGHT entry to FAILED.
    ///
    /// FAILED keys are re-claimable on the next `put_if_absent`: a
    /// failed call is assumed not to have committed on the exchange.
    /// When an exchange can partially commit before erroring this
    /// weakens at-most-once to at-least-once; operators resync via the
    /// port's open-order read-back in that case.
    pub fn mark_failed(&self, key: &str, error_code: &str, now_ms: u64) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.status = EntryStatus::Failed;
            entry.error_code = Some(error_code.to_string());
            entry.result = None;
            entry.expires_at_ms = now_ms + self.config.failed_ttl_ms;
        }
    }

    /// Reclaim storage for expired entries. Safe to run concurrently
    /// with all other operations.
    pub fn purge_expired(&self, now_ms: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now_ms));
        before - self.entries.len()
    }

    /// Live entry count (expired-but-unpurged entries included).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn count_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn count_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn count_conflict(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    /// Counter snapshot for metrics export.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
        }
    }
}

/// Derive an idempotency key from canonical semantic fields.
///
/// Fields with `None` values are omitted so optional parameters never
/// shift the digest. Numeric canonicalization is the caller's job
/// (`Price::canonical` / `Size::canonical`).
#[must_use]
pub fn derive_key(scope: &str, op: &str, fields: &[(&str, Option<String>)]) -> (String, String) {
    let fingerprint: String = fields
        .iter()
        .filter_map(|(name, value)| value.as_ref().map(|v| format!("{name}={v}")))
        .collect::<Vec<_>>()
        .join(";");

    let mut hasher = Sha256::new();
    hasher.update(op.as_bytes());
    hasher.update(b"|");
    hasher.update(fingerprint.as_bytes());
    let digest = hex::encode(&hasher.finalize()[..16]);

    (format!("{scope}:{op}:{digest}"), fingerprint)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> IdempotencyStore {
        IdempotencyStore::new(StoreConfig {
            inflight_ttl_ms: 1000,
            done_ttl_ms: 10_000,
            failed_ttl_ms: 2000,
        })
    }

    #[test]
    fn test_put_if_absent_claims_once() {
        let s = store();
        assert!(s.put_if_absent("k1", "fp", 0));
        assert!(!s.put_if_absent("k1", "fp", 10));
        assert_eq!(s.get("k1", 10).unwrap().status, EntryStatus::Inflight);
    }

    #[test]
    fn test_expired_inflight_reclaimable() {
        let s = store();
        assert!(s.put_if_absent("k1", "fp", 0));
        // inflight_ttl is 1000
        assert!(!s.put_if_absent("k1", "fp", 999));
        assert!(s.put_if_absent("k1", "fp", 1000));
    }

    #[test]
    fn test_mark_done_caches_and_extends() {
        let s = store();
        assert!(s.put_if_absent("k1", "fp", 0));
        s.mark_done("k1", CachedResult::Order(OrderId::from("o1")), 100);

        let entry = s.get("k1", 5000).unwrap();
        assert_eq!(entry.status, EntryStatus::Done);
        assert_eq!(entry.result, Some(CachedResult::Order(OrderId::from("o1"))));

        // DONE entries are not re-claimable while live
        assert!(!s.put_if_absent("k1", "fp", 5000));
        // ...but expire after the done TTL
        assert!(s.put_if_absent("k1", "fp", 10_100));
    }

    #[test]
    fn test_failed_entry_reclaimable_immediately() {
        let s = store();
        assert!(s.put_if_absent("k1", "fp", 0));
        s.mark_failed("k1", "TIMEOUT", 100);

        let entry = s.get("k1", 200).unwrap();
        assert_eq!(entry.status, EntryStatus::Failed);
        assert_eq!(entry.error_code.as_deref(), Some("TIMEOUT"));

        // Fresh attempt allowed without waiting for expiry
        assert!(s.put_if_absent("k1", "fp", 200));
        assert_eq!(s.get("k1", 200).unwrap().status, EntryStatus::Inflight);
    }

    #[test]
    fn test_get_hides_expired() {
        let s = store();
        assert!(s.put_if_absent("k1", "fp", 0));
        assert!(s.get("k1", 999).is_some());
        assert!(s.get("k1", 1000).is_none());
        // Still physically present until purged
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn test_purge_expired() {
        let s = store();
        assert!(s.put_if_absent("a", "fp", 0));
        assert!(s.put_if_absent("b", "fp", 0));
        s.mark_done("b", CachedResult::Cancelled(true), 0);

        // At t=5000 the inflight "a" (ttl 1000) is gone, done "b" (ttl 10000) lives
        let purged = s.purge_expired(5000);
        assert_eq!(purged, 1);
        assert_eq!(s.len(), 1);
        assert!(s.get("b", 5000).is_some());
    }

    #[test]
    fn test_derive_key_excludes_none_fields() {
        let (with_none, _) = derive_key(
            "live",
            "place",
            &[
                ("symbol", Some("BTCUSDT".to_string())),
                ("note", None),
            ],
        );
        let (without, _) = derive_key("live", "place", &[("symbol", Some("BTCUSDT".to_string()))]);
        assert_eq!(with_none, without);
    }

    #[test]
    fn test_derive_key_shape_and_sensitivity() {
        let (key, fingerprint) = derive_key(
            "live",
            "place",
            &[
                ("symbol", Some("BTCUSDT".to_string())),
                ("side", Some("buy".to_string())),
                ("price", Some("49950".to_string())),
            ],
        );
        assert!(key.starts_with("live:place:"));
        assert_eq!(fingerprint, "symbol=BTCUSDT;side=buy;price=49950");

        let (other, _) = derive_key(
            "live",
            "place",
            &[
                ("symbol", Some("BTCUSDT".to_string())),
                ("side", Some("buy".to_string())),
                ("price", Some("49951".to_string())),
            ],
        );
        assert_ne!(key, other);
    }

    #[test]
    fn test_store_config_validation() {
        assert!(StoreConfig::default().validate().is_ok());
        let bad = StoreConfig {
            inflight_ttl_ms: 0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let bad = StoreConfig {
            inflight_ttl_ms: 10_000,
            done_ttl_ms: 500,
            failed_ttl_ms: 100,
        };
        assert!(bad.validate().is_err());
    }
}
