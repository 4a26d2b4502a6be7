//! Post-write verification.
//!
//! After an admin saves a role's permission grants, the expected set is
//! re-read from the directory and diffed against what was actually
//! persisted. The read bypasses every cache; verifying against a cached
//! snapshot would only confirm the cache agrees with itself.

use std::collections::HashSet;
use tracing::{info, warn};

use crate::authz::models::{PermissionCode, RoleSlug};
use crate::directory::DirectoryService;
use crate::error::{AuthzError, Result};

/// The outcome of verifying one role's persisted grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    pub role: RoleSlug,
    /// Codes expected but not persisted.
    pub missing: Vec<PermissionCode>,
    /// Codes persisted but not expected.
    pub extra: Vec<PermissionCode>,
}

impl VerificationReport {
    pub fn matches(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty()
    }
}

/// Re-read a role's persisted grants and diff them against `expected`.
///
/// Directory failures propagate; an unreachable directory is not a
/// verification success.
pub async fn verify_role(
    directory: &dyn DirectoryService,
    role: &RoleSlug,
    expected: &[PermissionCode],
) -> Result<VerificationReport> {
    let persisted: HashSet<PermissionCode> = directory
        .fetch_role_permissions(role)
        .await?
        .into_iter()
        .collect();
    let expected: HashSet<PermissionCode> = expected.iter().cloned().collect();

    let mut missing: Vec<PermissionCode> = expected.difference(&persisted).cloned().collect();
    let mut extra: Vec<PermissionCode> = persisted.difference(&expected).cloned().collect();
    missing.sort();
    extra.sort();

    let report = VerificationReport {
        role: role.clone(),
        missing,
        extra,
    };
    if report.matches() {
        info!(role = %role, grants = expected.len(), "role grants verified");
    } else {
        warn!(
            role = %role,
            missing = report.missing.len(),
            extra = report.extra.len(),
            "role grants diverge from expected"
        );
    }
    Ok(report)
}

/// Like [`verify_role`], but a divergence is an error.
pub async fn verify_role_strict(
    directory: &dyn DirectoryService,
    role: &RoleSlug,
    expected: &[PermissionCode],
) -> Result<()> {
    let report = verify_role(directory, role, expected).await?;
    if report.matches() {
        Ok(())
    } else {
        Err(AuthzError::VerificationMismatch {
            role: report.role,
            missing: report.missing,
            extra: report.extra,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::InMemoryDirectory;

    fn codes(raw: &[&str]) -> Vec<PermissionCode> {
        raw.iter().map(|c| PermissionCode::new(*c)).collect()
    }

    #[tokio::test]
    async fn test_verify_matching_grants() {
        let dir = InMemoryDirectory::new();
        let role = RoleSlug::new("accountant");
        dir.set_role_permissions(role.clone(), codes(&["transactions.view", "transactions.create"]));

        let report = verify_role(&dir, &role, &codes(&["transactions.create", "transactions.view"]))
            .await
            .unwrap();
        assert!(report.matches());
        assert!(verify_role_strict(&dir, &role, &codes(&["transactions.view", "transactions.create"]))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_verify_reports_missing_and_extra() {
        let dir = InMemoryDirectory::new();
        let role = RoleSlug::new("accountant");
        dir.set_role_permissions(role.clone(), codes(&["transactions.view", "reports.export"]));

        let report = verify_role(&dir, &role, &codes(&["transactions.view", "transactions.post"]))
            .await
            .unwrap();
        assert!(!report.matches());
        assert_eq!(report.missing, codes(&["transactions.post"]));
        assert_eq!(report.extra, codes(&["reports.export"]));
    }

    #[tokio::test]
    async fn test_strict_verification_errors_on_divergence() {
        let dir = InMemoryDirectory::new();
        let role = RoleSlug::new("auditor");
        dir.set_role_permissions(role.clone(), codes(&["reports.view"]));

        let err = verify_role_strict(&dir, &role, &codes(&["reports.view", "reports.export"]))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::VerificationMismatch { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_directory_is_not_a_success() {
        let dir = InMemoryDirectory::new();
        let role = RoleSlug::new("accountant");
        dir.set_role_permissions(role.clone(), codes(&["transactions.view"]));
        dir.set_offline(true);

        assert!(verify_role(&dir, &role, &codes(&["transactions.view"]))
            .await
            .is_err());
    }
}
