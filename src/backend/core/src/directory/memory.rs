//! In-memory directory backend for tests and fixtures.
//!
//! Supports failure injection (`set_offline`), latency injection
//! (`set_latency`), and per-method call counters so tests can assert read
//! de-duplication.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use crate::authz::models::{PermissionCode, RoleSlug, UserId, UserOverride};
use crate::error::{AuthzError, Result};

use super::{DirectoryProfile, DirectoryService};

/// A point-in-time snapshot of how many reads each method has served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectoryCallCounts {
    pub roles: u64,
    pub overrides: u64,
    pub profile: u64,
    pub role_permissions: u64,
}

/// In-memory directory backend.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    roles: DashMap<UserId, Vec<RoleSlug>>,
    overrides: DashMap<UserId, Vec<UserOverride>>,
    profiles: DashMap<UserId, DirectoryProfile>,
    role_permissions: DashMap<RoleSlug, Vec<PermissionCode>>,
    offline: AtomicBool,
    latency_ms: AtomicU64,

    roles_reads: AtomicU64,
    overrides_reads: AtomicU64,
    profile_reads: AtomicU64,
    role_permissions_reads: AtomicU64,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_roles(&self, user: UserId, roles: Vec<RoleSlug>) {
        self.roles.insert(user, roles);
    }

    pub fn set_overrides(&self, user: UserId, overrides: Vec<UserOverride>) {
        self.overrides.insert(user, overrides);
    }

    pub fn set_profile(&self, user: UserId, profile: DirectoryProfile) {
        self.profiles.insert(user, profile);
    }

    pub fn set_role_permissions(&self, role: RoleSlug, codes: Vec<PermissionCode>) {
        self.role_permissions.insert(role, codes);
    }

    /// Simulate total directory unavailability.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Delay every read by the given duration, simulating a slow network.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    async fn simulate_latency(&self) {
        let ms = self.latency_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    /// Reads served so far, per method.
    pub fn call_counts(&self) -> DirectoryCallCounts {
        DirectoryCallCounts {
            roles: self.roles_reads.load(Ordering::SeqCst),
            overrides: self.overrides_reads.load(Ordering::SeqCst),
            profile: self.profile_reads.load(Ordering::SeqCst),
            role_permissions: self.role_permissions_reads.load(Ordering::SeqCst),
        }
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(AuthzError::DirectoryUnavailable(
                "directory offline".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DirectoryService for InMemoryDirectory {
    async fn fetch_roles(&self, user: &UserId) -> Result<Vec<RoleSlug>> {
        self.roles_reads.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.check_online()?;
        Ok(self.roles.get(user).map(|r| r.clone()).unwrap_or_default())
    }

    async fn fetch_overrides(&self, user: &UserId) -> Result<Vec<UserOverride>> {
        self.overrides_reads.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.check_online()?;
        Ok(self
            .overrides
            .get(user)
            .map(|o| o.clone())
            .unwrap_or_default())
    }

    async fn fetch_profile(&self, user: &UserId) -> Result<DirectoryProfile> {
        self.profile_reads.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.check_online()?;
        Ok(self
            .profiles
            .get(user)
            .map(|p| p.clone())
            .unwrap_or_default())
    }

    async fn fetch_role_permissions(&self, role: &RoleSlug) -> Result<Vec<PermissionCode>> {
        self.role_permissions_reads.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.check_online()?;
        self.role_permissions
            .get(role)
            .map(|c| c.clone())
            .ok_or_else(|| AuthzError::UnknownRole(role.clone()))
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_user_is_empty_not_error() {
        let dir = InMemoryDirectory::new();
        let user = UserId::new("nobody");

        assert!(dir.fetch_roles(&user).await.unwrap().is_empty());
        assert!(dir.fetch_overrides(&user).await.unwrap().is_empty());
        assert!(!dir.fetch_profile(&user).await.unwrap().is_super_admin);
    }

    #[tokio::test]
    async fn test_unknown_role_errors() {
        let dir = InMemoryDirectory::new();
        let err = dir
            .fetch_role_permissions(&RoleSlug::new("ghost"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::UnknownRole(_)));
    }

    #[tokio::test]
    async fn test_offline_injection() {
        let dir = InMemoryDirectory::new();
        let user = UserId::new("u-1");
        dir.set_roles(user.clone(), vec![RoleSlug::new("accountant")]);

        dir.set_offline(true);
        assert!(matches!(
            dir.fetch_roles(&user).await.unwrap_err(),
            AuthzError::DirectoryUnavailable(_)
        ));

        dir.set_offline(false);
        assert_eq!(dir.fetch_roles(&user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_call_counters() {
        let dir = InMemoryDirectory::new();
        let user = UserId::new("u-1");

        let _ = dir.fetch_roles(&user).await;
        let _ = dir.fetch_roles(&user).await;
        let _ = dir.fetch_profile(&user).await;

        let counts = dir.call_counts();
        assert_eq!(counts.roles, 2);
        assert_eq!(counts.profile, 1);
        assert_eq!(counts.overrides, 0);
    }
}
