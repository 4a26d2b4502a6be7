//! # Ledgerline Core
//!
//! Authorization resolution and caching for the Ledgerline back office.
//!
//! ## Architecture
//!
//! - **Flattening**: Role assignments resolve to a flat permission union
//! - **Overrides**: Per-user grants and revokes layered over role grants
//! - **Snapshots**: Versioned, cacheable permission decisions with a schema
//!   discriminant guarding hydration
//! - **Cache**: Per-user TTL store with stale fallback, shared single-flight
//!   rebuilds, and an on-disk last-known-good file
//! - **Engine**: Resolution pipeline, super-admin bypass, and the sync check
//!   facade for UI consumers
//! - **Sync**: Change-feed driven invalidation and post-write verification
//! - **Directory**: HTTP and in-memory backends for the system of record

pub mod authz;
pub mod cache;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod superadmin;
pub mod sync;
pub mod telemetry;

pub use error::{AuthzError, ErrorCode, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::authz::evaluator::AccessEvaluator;
    pub use crate::authz::models::{
        PermissionCode, ResolvedPermissionSet, RoleCatalog, RoleSlug, UserId, UserOverride,
    };
    pub use crate::authz::routes::{RouteMap, RouteRule};
    pub use crate::authz::snapshot::{PermissionSnapshot, SCHEMA_VERSION};
    pub use crate::cache::{CacheStats, SingleFlight, SnapshotFileStore, SnapshotStore};
    pub use crate::config::EngineConfig;
    pub use crate::directory::{
        DirectoryProfile, DirectoryService, HttpDirectory, HttpDirectoryConfig, InMemoryDirectory,
    };
    pub use crate::engine::{EngineStats, PermissionEngine};
    pub use crate::error::{AuthzError, ErrorCode, Result};
    pub use crate::superadmin::SuperAdminState;
    pub use crate::sync::{
        ChangeEvent, ChangeFeed, ChangeKind, SyncHandle, SyncService, TableKind,
        VerificationReport,
    };
}
