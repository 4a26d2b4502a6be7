//! Override resolution: merging per-user grants and revokes into the
//! role-derived permission set.
//!
//! Precedence for every code: direct grant > direct revoke > role-derived
//! membership. The merged set is always recomputed fresh from the role
//! snapshot and the full override list; there is no incremental patching.

use std::collections::HashMap;
use tracing::debug;

use crate::error::{AuthzError, Result};

use super::models::{PermissionCode, ResolvedPermissionSet, UserOverride};
use super::routes::RouteMap;

/// Apply a user's override rows to a flattened permission set.
///
/// A grant forces the code into the final set regardless of role membership;
/// a revoke forces it out. Route patterns are recomputed from the final set.
///
/// At most one active override may exist per code: a grant and a revoke for
/// the same code is a `ConflictingOverride` error, never a tie-break.
pub fn apply_overrides(
    base: ResolvedPermissionSet,
    overrides: &[UserOverride],
    routes: &RouteMap,
) -> Result<ResolvedPermissionSet> {
    let mut decisions: HashMap<&PermissionCode, bool> = HashMap::with_capacity(overrides.len());
    for row in overrides {
        match decisions.insert(&row.code, row.granted) {
            Some(previous) if previous != row.granted => {
                return Err(AuthzError::ConflictingOverride {
                    code: row.code.clone(),
                });
            }
            _ => {}
        }
    }

    let mut set = base;
    for (code, granted) in &decisions {
        if *granted {
            set.permissions.insert((*code).clone());
        } else {
            set.permissions.remove(*code);
        }
    }

    set.route_patterns = routes.patterns_for(&set.permissions);

    debug!(
        overrides = overrides.len(),
        permissions = set.permissions.len(),
        "applied user overrides"
    );
    Ok(set)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::flatten::flatten;
    use crate::authz::models::{RoleCatalog, RoleSlug, UserId};

    fn accountant_base() -> ResolvedPermissionSet {
        let mut catalog = RoleCatalog::new();
        catalog.insert(
            RoleSlug::new("accountant"),
            vec![
                PermissionCode::new("transactions.create"),
                PermissionCode::new("transactions.view"),
            ],
        );
        flatten(
            &[RoleSlug::new("accountant")],
            &catalog,
            &RouteMap::back_office_defaults(),
        )
    }

    #[test]
    fn test_revoke_removes_inherited_code() {
        let user = UserId::new("u-1");
        let overrides = vec![UserOverride::revoke(
            user,
            PermissionCode::new("transactions.create"),
        )];

        let set =
            apply_overrides(accountant_base(), &overrides, &RouteMap::back_office_defaults())
                .unwrap();

        assert!(!set.allows(&PermissionCode::new("transactions.create")));
        assert!(set.allows(&PermissionCode::new("transactions.view")));
    }

    #[test]
    fn test_grant_adds_code_outside_roles() {
        let user = UserId::new("u-1");
        let overrides = vec![UserOverride::grant(
            user,
            PermissionCode::new("reports.view"),
        )];

        let set =
            apply_overrides(accountant_base(), &overrides, &RouteMap::back_office_defaults())
                .unwrap();

        assert!(set.allows(&PermissionCode::new("reports.view")));
        assert!(set.route_patterns.contains("/reports"));
    }

    #[test]
    fn test_grant_wins_even_without_roles() {
        let user = UserId::new("u-2");
        let overrides = vec![UserOverride::grant(
            user,
            PermissionCode::new("settings.manage"),
        )];

        let set = apply_overrides(
            ResolvedPermissionSet::deny_all(),
            &overrides,
            &RouteMap::back_office_defaults(),
        )
        .unwrap();

        assert!(set.allows(&PermissionCode::new("settings.manage")));
        assert!(set.route_patterns.contains("/settings/*"));
    }

    #[test]
    fn test_no_override_leaves_role_membership() {
        let set =
            apply_overrides(accountant_base(), &[], &RouteMap::back_office_defaults()).unwrap();
        assert!(set.allows(&PermissionCode::new("transactions.create")));
        assert!(set.allows(&PermissionCode::new("transactions.view")));
    }

    #[test]
    fn test_conflicting_grant_and_revoke_rejected() {
        let user = UserId::new("u-3");
        let code = PermissionCode::new("transactions.post");
        let overrides = vec![
            UserOverride::grant(user.clone(), code.clone()),
            UserOverride::revoke(user, code.clone()),
        ];

        let err = apply_overrides(
            ResolvedPermissionSet::deny_all(),
            &overrides,
            &RouteMap::back_office_defaults(),
        )
        .unwrap_err();

        match err {
            AuthzError::ConflictingOverride { code: conflicted } => {
                assert_eq!(conflicted, code);
            }
            other => panic!("expected ConflictingOverride, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_agreeing_rows_tolerated() {
        let user = UserId::new("u-4");
        let code = PermissionCode::new("reports.view");
        let overrides = vec![
            UserOverride::grant(user.clone(), code.clone()),
            UserOverride::grant(user, code.clone()),
        ];

        let set = apply_overrides(
            ResolvedPermissionSet::deny_all(),
            &overrides,
            &RouteMap::back_office_defaults(),
        )
        .unwrap();
        assert!(set.allows(&code));
    }

    #[test]
    fn test_route_patterns_recomputed_after_revoke() {
        let user = UserId::new("u-5");
        let overrides = vec![
            UserOverride::revoke(user.clone(), PermissionCode::new("transactions.view")),
            UserOverride::revoke(user, PermissionCode::new("transactions.create")),
        ];

        let set =
            apply_overrides(accountant_base(), &overrides, &RouteMap::back_office_defaults())
                .unwrap();

        assert!(!set.route_patterns.contains("/transactions"));
        assert!(set.route_patterns.contains("/dashboard"));
    }
}
