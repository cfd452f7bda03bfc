//! Dedup store: in-memory TTL map of transaction hash to first-seen time.
//!
//! Several ingestion paths can observe the same native transfer. The first one
//! to call [`DedupStore::check_and_set`] wins; later callers within the TTL are
//! told to suppress. Records are never refreshed by repeat observations.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use alloy::primitives::B256;

/// Default record lifetime (10 minutes).
pub const DEFAULT_DEDUP_TTL: Duration = Duration::from_secs(600);

/// Shared, lock-guarded dedup records.
#[derive(Debug)]
pub struct DedupStore {
    ttl: Duration,
    seen: Mutex<HashMap<B256, Instant>>,
}

impl DedupStore {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_DEDUP_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Record `tx_hash` unless a live record exists.
    ///
    /// Returns `true` if the caller should proceed (first observation or the
    /// previous record expired), `false` if the transfer was already reported.
    pub fn check_and_set(&self, tx_hash: B256) -> bool {
        self.check_and_set_at(tx_hash, Instant::now())
    }

    pub fn check_and_set_at(&self, tx_hash: B256, now: Instant) -> bool {
        let mut seen = self.lock();
        if let Some(first_seen) = seen.get(&tx_hash)
            && now.saturating_duration_since(*first_seen) < self.ttl
        {
            tracing::debug!(tx = %tx_hash, "Duplicate native transfer suppressed");
            return false;
        }
        seen.insert(tx_hash, now);
        true
    }

    /// Whether a live record exists, without recording anything.
    pub fn contains_at(&self, tx_hash: &B256, now: Instant) -> bool {
        self.lock()
            .get(tx_hash)
            .is_some_and(|t| now.saturating_duration_since(*t) < self.ttl)
    }

    /// Drop expired records. Returns the number removed.
    pub fn evict_expired(&self) -> usize {
        self.evict_expired_at(Instant::now())
    }

    pub fn evict_expired_at(&self, now: Instant) -> usize {
        let mut seen = self.lock();
        let before = seen.len();
        seen.retain(|_, t| now.saturating_duration_since(*t) < self.ttl);
        before - seen.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<B256, Instant>> {
        self.seen.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Default for DedupStore {
    fn default() -> Self {
        Self::new()
    }
}
