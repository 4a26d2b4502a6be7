//! Authorization data models: identifiers, overrides, the role catalog, and
//! the resolved permission set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

// ═══════════════════════════════════════════════════════════════════════════════
// Identifiers
// ═══════════════════════════════════════════════════════════════════════════════

/// Strongly-typed user identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Stable identifier for a named role (e.g. `accountant`, `super_admin`).
///
/// Unique within the directory service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleSlug(pub String);

impl RoleSlug {
    pub fn new(slug: impl Into<String>) -> Self {
        Self(slug.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoleSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RoleSlug {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RoleSlug {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Stable identifier for a single permitted action, of the form
/// `resource.action` (e.g. `transactions.post`).
///
/// Case-sensitive, globally unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PermissionCode(pub String);

impl PermissionCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The resource part of `resource.action`, if the code is well-formed.
    pub fn resource(&self) -> Option<&str> {
        self.0.split_once('.').map(|(r, _)| r)
    }

    /// The action part of `resource.action`, if the code is well-formed.
    pub fn action(&self) -> Option<&str> {
        self.0.split_once('.').map(|(_, a)| a)
    }
}

impl fmt::Display for PermissionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PermissionCode {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PermissionCode {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// User Override
// ═══════════════════════════════════════════════════════════════════════════════

/// A per-user exception that grants or revokes one permission code
/// independent of role membership.
///
/// At most one active override may exist per (user, code) pair:
/// `granted = true` is a direct grant, `granted = false` a direct revoke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserOverride {
    /// The user this override applies to.
    pub user_id: UserId,
    /// The permission code being granted or revoked.
    pub code: PermissionCode,
    /// `true` grants the code, `false` revokes it.
    pub granted: bool,
    /// Who created this override.
    pub granted_by: Option<UserId>,
    /// When the override was created.
    pub granted_at: DateTime<Utc>,
}

impl UserOverride {
    /// Create a direct grant.
    pub fn grant(user_id: UserId, code: PermissionCode) -> Self {
        Self {
            user_id,
            code,
            granted: true,
            granted_by: None,
            granted_at: Utc::now(),
        }
    }

    /// Create a direct revoke.
    pub fn revoke(user_id: UserId, code: PermissionCode) -> Self {
        Self {
            user_id,
            code,
            granted: false,
            granted_by: None,
            granted_at: Utc::now(),
        }
    }

    /// Record who created this override.
    pub fn granted_by(mut self, user_id: UserId) -> Self {
        self.granted_by = Some(user_id);
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Role Catalog
// ═══════════════════════════════════════════════════════════════════════════════

/// The role → permission-codes relation, as read from the directory service.
///
/// Read-only to the engine; the directory service owns the relation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleCatalog {
    grants: HashMap<RoleSlug, HashSet<PermissionCode>>,
}

impl RoleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the permission codes granted by a role.
    pub fn insert(&mut self, role: RoleSlug, codes: impl IntoIterator<Item = PermissionCode>) {
        self.grants.insert(role, codes.into_iter().collect());
    }

    /// The codes granted by a role, if the role is known.
    pub fn permissions_of(&self, role: &RoleSlug) -> Option<&HashSet<PermissionCode>> {
        self.grants.get(role)
    }

    pub fn contains(&self, role: &RoleSlug) -> bool {
        self.grants.contains_key(role)
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Resolved Permission Set
// ═══════════════════════════════════════════════════════════════════════════════

/// A fully-resolved permission decision for one user.
///
/// Invariant: before override resolution, `permissions` is monotonic in
/// `roles`; adding a role may only add inherited codes, never remove them.
/// Role order never affects the set; it is preserved for display and audit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPermissionSet {
    /// Assigned roles, in the order the directory returned them.
    pub roles: Vec<RoleSlug>,
    /// The effective permission codes.
    pub permissions: HashSet<PermissionCode>,
    /// Route patterns reachable with the effective permissions.
    pub route_patterns: BTreeSet<String>,
}

impl ResolvedPermissionSet {
    /// An empty, deny-everything set.
    pub fn deny_all() -> Self {
        Self::default()
    }

    /// Whether the set contains a permission code.
    pub fn allows(&self, code: &PermissionCode) -> bool {
        self.permissions.contains(code)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
