//! The directory service: the external system of record for roles,
//! role-permission grants, per-user overrides, and user profiles.
//!
//! The engine only ever reads from it, and must tolerate failures and
//! timeouts; the resolution pipeline recovers locally per the cache
//! fallback policy.

pub mod http;
pub mod memory;

pub use http::{HttpDirectory, HttpDirectoryConfig};
pub use memory::{DirectoryCallCounts, InMemoryDirectory};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::authz::models::{PermissionCode, RoleSlug, UserId, UserOverride};
use crate::error::Result;

/// A user's directory profile, reduced to what the engine consumes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryProfile {
    /// Whether the user is a designated super-admin.
    #[serde(default)]
    pub is_super_admin: bool,
}

/// Read access to the directory service.
///
/// Any method may fail with `DirectoryUnavailable`; `fetch_role_permissions`
/// fails with `UnknownRole` for a role the directory does not know.
#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// The roles assigned to a user, in directory order.
    async fn fetch_roles(&self, user: &UserId) -> Result<Vec<RoleSlug>>;

    /// The user's active override rows.
    async fn fetch_overrides(&self, user: &UserId) -> Result<Vec<UserOverride>>;

    /// The user's profile.
    async fn fetch_profile(&self, user: &UserId) -> Result<DirectoryProfile>;

    /// The permission codes granted by a role, as persisted.
    ///
    /// Used both by resolution and by post-write verification, which must
    /// bypass every cache.
    async fn fetch_role_permissions(&self, role: &RoleSlug) -> Result<Vec<PermissionCode>>;

    /// The backend name, for logs.
    fn name(&self) -> &'static str;
}
