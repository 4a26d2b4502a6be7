//! The sync service: consumes the change feed and keeps cached snapshots
//! consistent with directory writes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::engine::PermissionEngine;

use super::{ChangeEvent, ChangeFeed, TableKind};

/// Statistics for a running sync service.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Events consumed from the feed
    pub events: Arc<AtomicU64>,
    /// Single-user invalidations performed
    pub user_invalidations: Arc<AtomicU64>,
    /// Full-cache invalidations performed
    pub full_invalidations: Arc<AtomicU64>,
}

impl SyncStats {
    pub fn events(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }

    pub fn user_invalidations(&self) -> u64 {
        self.user_invalidations.load(Ordering::Relaxed)
    }

    pub fn full_invalidations(&self) -> u64 {
        self.full_invalidations.load(Ordering::Relaxed)
    }
}

/// Handle for controlling a running sync service.
pub struct SyncHandle {
    shutdown: tokio::sync::watch::Sender<bool>,
    stats: SyncStats,
}

impl SyncHandle {
    /// Signal the service to shut down gracefully.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }
}

/// Applies change-feed events to the engine's cache.
///
/// User-scoped changes (role assignments, overrides) invalidate that one
/// user; role-permission changes affect every holder of the role and
/// invalidate the whole cache. A lagged feed subscription also invalidates
/// everything, since the missed events are unknowable.
pub struct SyncService {
    engine: Arc<PermissionEngine>,
    stats: SyncStats,
}

impl SyncService {
    pub fn new(engine: Arc<PermissionEngine>) -> Self {
        Self {
            engine,
            stats: SyncStats::default(),
        }
    }

    /// Start the service on the given feed, returning a control handle.
    pub fn start(self, feed: &ChangeFeed) -> SyncHandle {
        let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);
        let mut events = feed.subscribe();
        let engine = Arc::clone(&self.engine);
        let stats = self.stats.clone();
        let loop_stats = self.stats.clone();

        tokio::spawn(async move {
            tracing::info!("sync service started");

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::info!("sync service shutting down");
                            break;
                        }
                    }
                    received = events.recv() => {
                        match received {
                            Ok(event) => {
                                loop_stats.events.fetch_add(1, Ordering::Relaxed);
                                Self::apply(&engine, &loop_stats, event);
                            }
                            Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                                tracing::warn!(missed, "change feed lagged, invalidating all snapshots");
                                engine.invalidate_all();
                                loop_stats.full_invalidations.fetch_add(1, Ordering::Relaxed);
                            }
                            Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                                tracing::info!("change feed closed, sync service stopping");
                                break;
                            }
                        }
                    }
                }
            }

            tracing::info!("sync service stopped");
        });

        SyncHandle {
            shutdown: shutdown_tx,
            stats,
        }
    }

    fn apply(engine: &PermissionEngine, stats: &SyncStats, event: ChangeEvent) {
        match (&event.table, event.user_id()) {
            (TableKind::RolePermissions, _) => {
                let dropped = engine.invalidate_all();
                stats.full_invalidations.fetch_add(1, Ordering::Relaxed);
                tracing::info!(
                    kind = ?event.kind,
                    dropped,
                    "role permissions changed, full cache invalidation"
                );
            }
            (_, Some(user)) => {
                engine.invalidate(&user);
                stats.user_invalidations.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(event = %event.id, user = %user, table = ?event.table, "snapshot invalidated");
            }
            (table, None) => {
                // A user-scoped table without a user id in the payload; the
                // safe reading is that anyone may be affected.
                let dropped = engine.invalidate_all();
                stats.full_invalidations.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(table = ?table, dropped, "change event without user id, full invalidation");
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
