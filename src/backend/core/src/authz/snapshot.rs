//! Versioned permission snapshots: the cache-safe representation of a
//! resolved permission set.
//!
//! Every snapshot is stamped with the engine's schema version. The hydrator
//! rejects anything that does not match: a stale-format snapshot is never
//! trusted or partially repaired, only rebuilt. This guards against deploying
//! a new permission-code taxonomy while cached snapshots from a previous
//! version are still stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::models::{ResolvedPermissionSet, RoleSlug};

/// Current snapshot schema version. Bump when the snapshot shape or the
/// permission-code taxonomy changes incompatibly.
pub const SCHEMA_VERSION: u32 = 3;

// ═══════════════════════════════════════════════════════════════════════════════
// Permission Snapshot
// ═══════════════════════════════════════════════════════════════════════════════

/// A versioned, cacheable, fully-resolved permission decision for one user
/// at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSnapshot {
    /// Schema discriminant; consumers must discard mismatched snapshots.
    pub schema_version: u32,
    /// Assigned roles at build time.
    pub roles: Vec<RoleSlug>,
    /// The resolved permission set.
    pub resolved: ResolvedPermissionSet,
    /// When the snapshot was built.
    pub built_at: DateTime<Utc>,
}

impl PermissionSnapshot {
    /// Build a snapshot from a resolved set, stamping the current schema
    /// version and build timestamp.
    pub fn build(roles: Vec<RoleSlug>, resolved: ResolvedPermissionSet) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            roles,
            resolved,
            built_at: Utc::now(),
        }
    }

    /// An empty snapshot that denies every action and route; the last-resort
    /// fallback when no cached or persisted snapshot exists.
    pub fn deny_all() -> Self {
        Self::build(Vec::new(), ResolvedPermissionSet::deny_all())
    }

    /// Whether this snapshot carries the engine's current schema version.
    pub fn is_current_schema(&self) -> bool {
        self.schema_version == SCHEMA_VERSION
    }

    /// Hydrate a snapshot from a raw JSON value.
    ///
    /// Returns `None` on a schema version mismatch or any missing/invalid
    /// field, never a partially-valid snapshot, so callers treat the input
    /// as a cache miss and rebuild.
    pub fn hydrate(raw: &serde_json::Value) -> Option<Self> {
        let snapshot: Self = serde_json::from_value(raw.clone()).ok()?;
        if !snapshot.is_current_schema() {
            debug!(
                found = snapshot.schema_version,
                expected = SCHEMA_VERSION,
                "discarding snapshot with stale schema version"
            );
            return None;
        }
        Some(snapshot)
    }

    /// Hydrate a snapshot from raw bytes; same contract as [`hydrate`].
    ///
    /// [`hydrate`]: Self::hydrate
    pub fn hydrate_slice(raw: &[u8]) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_slice(raw).ok()?;
        Self::hydrate(&value)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
