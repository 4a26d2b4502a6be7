//! The permission engine: resolution, caching, and the sync check facade.
//!
//! Resolution order for a user:
//! 1. fresh cache entry -> served as-is
//! 2. single-flight rebuild from the directory
//! 3. on recoverable failure: stale cache entry, then the persisted
//!    last-known-good snapshot, then an uncached deny-all
//!
//! Concurrent resolves for the same user coalesce onto one shared rebuild
//! flight so the directory sees at most one rebuild per user at a time. The
//! flight is backed by a detached task: a caller that abandons its resolve
//! does not cancel the rebuild, and the result still lands in the cache for
//! the next caller. The deny-all fallback is never cached: the next check
//! retries the directory instead of pinning a locked-out state for a full
//! TTL.

use futures::FutureExt;
use metrics::counter;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::authz::evaluator::AccessEvaluator;
use crate::authz::flatten::flatten;
use crate::authz::models::{PermissionCode, RoleCatalog, UserId};
use crate::authz::overrides::apply_overrides;
use crate::authz::routes::RouteMap;
use crate::authz::snapshot::PermissionSnapshot;
use crate::cache::{CacheStats, SingleFlight, SnapshotFileStore, SnapshotStore};
use crate::config::EngineConfig;
use crate::directory::{DirectoryService, HttpDirectory};
use crate::error::{AuthzError, Result};
use crate::superadmin::SuperAdminState;
use crate::sync::ChangeFeed;

// ═══════════════════════════════════════════════════════════════════════════════
// Engine
// ═══════════════════════════════════════════════════════════════════════════════

/// Point-in-time engine statistics.
#[derive(Debug, Clone)]
pub struct EngineStats {
    pub cache: CacheStats,
    pub pending_rebuilds: usize,
}

pub struct PermissionEngine {
    directory: Arc<dyn DirectoryService>,
    routes: Arc<RouteMap>,
    evaluator: AccessEvaluator,
    store: Arc<SnapshotStore>,
    flights: Arc<SingleFlight<UserId, Result<PermissionSnapshot>>>,
    super_admin: Arc<SuperAdminState>,
    persist: Option<Arc<SnapshotFileStore>>,
}

impl PermissionEngine {
    pub fn new(directory: Arc<dyn DirectoryService>, routes: RouteMap, ttl: Duration) -> Self {
        let routes = Arc::new(routes);
        info!(
            directory = directory.name(),
            ttl_secs = ttl.as_secs(),
            "permission engine initialized"
        );
        Self {
            directory,
            evaluator: AccessEvaluator::new(Arc::clone(&routes)),
            routes,
            store: Arc::new(SnapshotStore::new(ttl)),
            flights: Arc::new(SingleFlight::new()),
            super_admin: Arc::new(SuperAdminState::new()),
            persist: None,
        }
    }

    /// Build an engine and its change feed from loaded configuration.
    ///
    /// Wires the HTTP directory, cache TTL, snapshot persistence, super-admin
    /// persistence, and the change-feed capacity; feed the returned
    /// [`ChangeFeed`] into a [`SyncService`] to keep the cache coherent.
    ///
    /// [`SyncService`]: crate::sync::SyncService
    pub fn from_config(config: &EngineConfig) -> Result<(Self, ChangeFeed)> {
        let directory = HttpDirectory::new(config.directory.clone())?;
        let mut engine = Self::new(
            Arc::new(directory),
            RouteMap::back_office_defaults(),
            config.cache.ttl,
        );
        if let Some(path) = &config.cache.persist_path {
            engine = engine.with_snapshot_persistence(SnapshotFileStore::new(path));
        }
        if let Some(path) = &config.superadmin.persist_path {
            engine = engine.with_super_admin_state(SuperAdminState::with_persistence(path));
        }
        let feed = ChangeFeed::new(config.sync.channel_capacity);
        Ok((engine, feed))
    }

    /// Enable the on-disk last-known-good snapshot file.
    pub fn with_snapshot_persistence(mut self, store: SnapshotFileStore) -> Self {
        self.persist = Some(Arc::new(store));
        self
    }

    /// Replace the super-admin state, typically with a file-backed one.
    pub fn with_super_admin_state(mut self, state: SuperAdminState) -> Self {
        self.super_admin = Arc::new(state);
        self
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Resolution
    // ───────────────────────────────────────────────────────────────────────────

    /// Resolve the user's current permission snapshot.
    ///
    /// With `skip_cache` the cached entry is ignored and a rebuild is forced;
    /// concurrent callers still coalesce, and a forced refresh joins a
    /// rebuild already in progress rather than queueing a second one.
    #[instrument(skip(self), fields(user = %user))]
    pub async fn resolve(&self, user: &UserId, skip_cache: bool) -> Result<PermissionSnapshot> {
        if !skip_cache {
            if let Some(snapshot) = self.store.get(user) {
                return Ok(snapshot);
            }
        }

        let flight = self.flights.join_or_start(user, || {
            let directory = Arc::clone(&self.directory);
            let routes = Arc::clone(&self.routes);
            let store = Arc::clone(&self.store);
            let super_admin = Arc::clone(&self.super_admin);
            let persist = self.persist.clone();
            let flights = Arc::clone(&self.flights);
            let user = user.clone();

            // Detached so the rebuild outlives its callers: an abandoned
            // resolve must not cancel the shared rebuild, and the result is
            // published to the cache either way.
            let task = tokio::spawn(async move {
                let result =
                    rebuild_and_publish(directory, routes, store, super_admin, persist, &user)
                        .await;
                // Removed only after the result is published, so a late
                // joiner finds either the flight or the cached entry.
                flights.finish(&user);
                result
            });
            async move {
                match task.await {
                    Ok(result) => result,
                    Err(err) => Err(AuthzError::Internal(format!("rebuild task failed: {err}"))),
                }
            }
            .boxed()
        });

        flight.await
    }

    /// Force a rebuild, bypassing the cached entry.
    pub async fn refresh(&self, user: &UserId) -> Result<PermissionSnapshot> {
        self.resolve(user, true).await
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Invalidation
    // ───────────────────────────────────────────────────────────────────────────

    /// Drop one user's cached snapshot.
    pub fn invalidate(&self, user: &UserId) -> bool {
        self.store.invalidate(user)
    }

    /// Drop every cached snapshot, returning the count removed.
    pub fn invalidate_all(&self) -> u64 {
        self.store.invalidate_all()
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Sync check facade
    // ───────────────────────────────────────────────────────────────────────────
    //
    // These never await and never fail. They read whatever snapshot is on
    // hand, TTL-expired included, because a stale answer beats a denied one
    // while a background refresh is pending.

    pub fn has_action_access(&self, user: &UserId, code: &PermissionCode) -> bool {
        let snapshot = self.store.get_stale(user);
        self.evaluator
            .has_action_access(self.super_admin.is_super_admin(user), snapshot.as_ref(), code)
    }

    pub fn has_route_access(&self, user: &UserId, pathname: &str) -> bool {
        let snapshot = self.store.get_stale(user);
        self.evaluator
            .has_route_access(self.super_admin.is_super_admin(user), snapshot.as_ref(), pathname)
    }

    pub fn check_batch(
        &self,
        user: &UserId,
        codes: &[PermissionCode],
    ) -> HashMap<PermissionCode, bool> {
        let snapshot = self.store.get_stale(user);
        self.evaluator
            .check_batch(self.super_admin.is_super_admin(user), snapshot.as_ref(), codes)
    }

    /// Resolve-then-check: the authoritative async form of
    /// [`has_action_access`].
    ///
    /// [`has_action_access`]: Self::has_action_access
    pub async fn check_action(&self, user: &UserId, code: &PermissionCode) -> bool {
        if self.super_admin.is_super_admin(user) {
            return true;
        }
        match self.resolve(user, false).await {
            Ok(snapshot) => snapshot.resolved.allows(code),
            Err(err) => {
                warn!(user = %user, permission = %code, error = %err, "check failed, denying");
                false
            }
        }
    }

    pub fn is_super_admin(&self, user: &UserId) -> bool {
        self.super_admin.is_super_admin(user)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Introspection
    // ───────────────────────────────────────────────────────────────────────────

    /// Drop all cached snapshots and flight slots. Shutdown only: a rebuild
    /// already in flight keeps running, but new callers no longer coalesce
    /// onto it.
    pub fn dispose(&self) {
        self.store.invalidate_all();
        self.flights.clear();
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            cache: self.store.stats(),
            pending_rebuilds: self.flights.len(),
        }
    }

    pub fn routes(&self) -> &RouteMap {
        &self.routes
    }

    pub fn evaluator(&self) -> &AccessEvaluator {
        &self.evaluator
    }

    pub fn directory(&self) -> &Arc<dyn DirectoryService> {
        &self.directory
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Rebuild Pipeline
// ═══════════════════════════════════════════════════════════════════════════════

/// Rebuild, then publish the outcome: cache and persist on success, fall
/// back on recoverable failure. Runs inside the detached flight task.
async fn rebuild_and_publish(
    directory: Arc<dyn DirectoryService>,
    routes: Arc<RouteMap>,
    store: Arc<SnapshotStore>,
    super_admin: Arc<SuperAdminState>,
    persist: Option<Arc<SnapshotFileStore>>,
    user: &UserId,
) -> Result<PermissionSnapshot> {
    match rebuild(directory.as_ref(), &routes, &super_admin, user).await {
        Ok(snapshot) => {
            counter!("authz_rebuilds_total", "outcome" => "ok").increment(1);
            store.put(user.clone(), snapshot.clone());
            if let Some(persist) = &persist {
                if let Err(err) = persist.save(user, &snapshot) {
                    warn!(user = %user, error = %err, "failed to persist snapshot");
                }
            }
            Ok(snapshot)
        }
        Err(err) if err.is_recoverable() => {
            counter!("authz_rebuilds_total", "outcome" => "recovered").increment(1);
            warn!(user = %user, error = %err, "rebuild failed, serving fallback");
            Ok(fallback(&store, persist.as_deref(), user))
        }
        Err(err) => {
            counter!("authz_rebuilds_total", "outcome" => "error").increment(1);
            Err(err)
        }
    }
}

/// Rebuild a snapshot from the directory.
async fn rebuild(
    directory: &dyn DirectoryService,
    routes: &RouteMap,
    super_admin: &SuperAdminState,
    user: &UserId,
) -> Result<PermissionSnapshot> {
    let roles = directory.fetch_roles(user).await?;

    // Profile failures keep the prior super-admin flag; a transient
    // profile outage must not strip an admin mid-session.
    match directory.fetch_profile(user).await {
        Ok(profile) => super_admin.set(user, profile.is_super_admin),
        Err(err) => {
            warn!(user = %user, error = %err, "profile fetch failed, keeping prior super-admin flag");
        }
    }

    let mut catalog = RoleCatalog::new();
    for role in &roles {
        match directory.fetch_role_permissions(role).await {
            Ok(codes) => catalog.insert(role.clone(), codes),
            Err(AuthzError::UnknownRole(_)) => {
                // An unknown role contributes nothing; the rest of the
                // user's roles still resolve.
                warn!(user = %user, role = %role, "role not in directory, skipped");
            }
            Err(err) => return Err(err),
        }
    }

    let base = flatten(&roles, &catalog, routes);
    let overrides = directory.fetch_overrides(user).await?;
    let resolved = apply_overrides(base, &overrides, routes)?;

    debug!(
        user = %user,
        roles = roles.len(),
        permissions = resolved.permissions.len(),
        "snapshot rebuilt"
    );
    Ok(PermissionSnapshot::build(roles, resolved))
}

/// Degraded-mode snapshot when the directory cannot be reached.
fn fallback(
    store: &SnapshotStore,
    persist: Option<&SnapshotFileStore>,
    user: &UserId,
) -> PermissionSnapshot {
    if let Some(stale) = store.get_stale(user) {
        counter!("authz_fallbacks_total", "source" => "stale").increment(1);
        return stale;
    }
    if let Some(persisted) = persist.and_then(|p| p.load(user)) {
        counter!("authz_fallbacks_total", "source" => "persisted").increment(1);
        // Inserted so the sync facade sees it until a rebuild succeeds.
        store.put(user.clone(), persisted.clone());
        return persisted;
    }
    counter!("authz_fallbacks_total", "source" => "deny_all").increment(1);
    warn!(user = %user, "no fallback snapshot available, denying all");
    PermissionSnapshot::deny_all()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
