//! Per-user snapshot store with TTL and lazy expiry.
//!
//! Expiry is evaluated on read; an expired entry is a miss but is kept in
//! place so the resolution fallback can still serve it when the directory is
//! unreachable. Entry lifecycle: Absent -> Resolving -> Present(TTL) ->
//! Stale -> Absent (explicit invalidate).

use dashmap::DashMap;
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::authz::models::UserId;
use crate::authz::snapshot::PermissionSnapshot;

// ═══════════════════════════════════════════════════════════════════════════════
// Cache Statistics
// ═══════════════════════════════════════════════════════════════════════════════

/// Snapshot store statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Total number of fresh cache hits
    pub hits: u64,

    /// Total number of misses (absent or expired)
    pub misses: u64,

    /// Total number of stale reads served by the fallback path
    pub stale_reads: u64,

    /// Current number of entries (including expired, pending lazy eviction)
    pub entries: u64,

    /// Entries removed by invalidation
    pub evictions: u64,

    /// Hit rate (0.0 - 1.0)
    pub hit_rate: f64,
}

impl CacheStats {
    /// Calculate the hit rate.
    pub fn calculate_hit_rate(&mut self) {
        let total = self.hits + self.misses;
        self.hit_rate = if total > 0 {
            self.hits as f64 / total as f64
        } else {
            0.0
        };
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Snapshot Store
// ═══════════════════════════════════════════════════════════════════════════════

struct StoreEntry {
    snapshot: PermissionSnapshot,
    inserted_at: Instant,
}

impl StoreEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.inserted_at.elapsed() >= ttl
    }
}

/// TTL'd, schema-aware snapshot store keyed by user.
pub struct SnapshotStore {
    entries: DashMap<UserId, StoreEntry>,
    ttl: Duration,

    hits: AtomicU64,
    misses: AtomicU64,
    stale_reads: AtomicU64,
    evictions: AtomicU64,
}

impl SnapshotStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            stale_reads: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// A fresh snapshot, if present, unexpired, and on the current schema.
    ///
    /// A schema-mismatched entry is dropped immediately; an expired entry is
    /// a miss but stays in place for [`get_stale`].
    ///
    /// [`get_stale`]: Self::get_stale
    pub fn get(&self, user: &UserId) -> Option<PermissionSnapshot> {
        if let Some(entry) = self.entries.get(user) {
            if !entry.snapshot.is_current_schema() {
                drop(entry);
                self.entries.remove(user);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                self.miss(user);
                return None;
            }
            if entry.is_expired(self.ttl) {
                self.miss(user);
                return None;
            }
            self.hits.fetch_add(1, Ordering::Relaxed);
            counter!("authz_cache_reads_total", "outcome" => "hit").increment(1);
            return Some(entry.snapshot.clone());
        }
        self.miss(user);
        None
    }

    /// The snapshot regardless of TTL, for the fetch-failure fallback path.
    /// Schema-mismatched entries are still rejected.
    pub fn get_stale(&self, user: &UserId) -> Option<PermissionSnapshot> {
        let entry = self.entries.get(user)?;
        if !entry.snapshot.is_current_schema() {
            return None;
        }
        self.stale_reads.fetch_add(1, Ordering::Relaxed);
        Some(entry.snapshot.clone())
    }

    /// Unconditionally overwrite the user's entry.
    pub fn put(&self, user: UserId, snapshot: PermissionSnapshot) {
        self.entries.insert(
            user,
            StoreEntry {
                snapshot,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Remove one user's entry; the next `get` is a miss, forcing a rebuild.
    pub fn invalidate(&self, user: &UserId) -> bool {
        let removed = self.entries.remove(user).is_some();
        if removed {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            counter!("authz_cache_invalidations_total", "scope" => "user").increment(1);
            debug!(user = %user, "snapshot invalidated");
        }
        removed
    }

    /// Remove every entry.
    pub fn invalidate_all(&self) -> u64 {
        let count = self.entries.len() as u64;
        self.entries.clear();
        self.evictions.fetch_add(count, Ordering::Relaxed);
        counter!("authz_cache_invalidations_total", "scope" => "all").increment(count);
        debug!(count, "all snapshots invalidated");
        count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stale_reads: self.stale_reads.load(Ordering::Relaxed),
            entries: self.entries.len() as u64,
            evictions: self.evictions.load(Ordering::Relaxed),
            hit_rate: 0.0,
        };
        stats.calculate_hit_rate();
        stats
    }

    fn miss(&self, user: &UserId) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        counter!("authz_cache_reads_total", "outcome" => "miss").increment(1);
        debug!(user = %user, "snapshot cache miss");
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
