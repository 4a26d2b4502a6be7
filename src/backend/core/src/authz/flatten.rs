//! Flattening: roles → the union of their granted permission codes.
//!
//! Pure and deterministic, no I/O. An unknown role contributes nothing and is
//! logged; it never aborts resolution for the whole user. An unrecognized
//! role grants nothing, while a recognized permission is only ever granted
//! through an explicit rule.

use tracing::warn;

use super::models::{ResolvedPermissionSet, RoleCatalog, RoleSlug};
use super::routes::RouteMap;

/// Flatten an ordered set of roles into a resolved permission set.
///
/// `permissions` is the union over roles of their granted codes, so the
/// result is monotonic in the role set. Role order is preserved in `roles`
/// for display and audit only; it never affects the permission set.
pub fn flatten(roles: &[RoleSlug], catalog: &RoleCatalog, routes: &RouteMap) -> ResolvedPermissionSet {
    let mut set = ResolvedPermissionSet {
        roles: roles.to_vec(),
        ..Default::default()
    };

    for role in roles {
        match catalog.permissions_of(role) {
            Some(codes) => {
                set.permissions.extend(codes.iter().cloned());
            }
            None => {
                warn!(role = %role, "unknown role contributes no permissions");
            }
        }
    }

    set.route_patterns = routes.patterns_for(&set.permissions);
    set
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::models::PermissionCode;

    fn catalog() -> RoleCatalog {
        let mut catalog = RoleCatalog::new();
        catalog.insert(
            RoleSlug::new("accountant"),
            vec![
                PermissionCode::new("transactions.view"),
                PermissionCode::new("transactions.create"),
            ],
        );
        catalog.insert(
            RoleSlug::new("auditor"),
            vec![
                PermissionCode::new("transactions.view"),
                PermissionCode::new("reports.view"),
            ],
        );
        catalog
    }

    #[test]
    fn test_union_over_roles() {
        let set = flatten(
            &[RoleSlug::new("accountant"), RoleSlug::new("auditor")],
            &catalog(),
            &RouteMap::back_office_defaults(),
        );

        assert_eq!(set.permissions.len(), 3);
        assert!(set.allows(&PermissionCode::new("transactions.view")));
        assert!(set.allows(&PermissionCode::new("transactions.create")));
        assert!(set.allows(&PermissionCode::new("reports.view")));
    }

    #[test]
    fn test_monotonic_in_roles() {
        let routes = RouteMap::back_office_defaults();
        let catalog = catalog();

        let smaller = flatten(&[RoleSlug::new("accountant")], &catalog, &routes);
        let larger = flatten(
            &[RoleSlug::new("accountant"), RoleSlug::new("auditor")],
            &catalog,
            &routes,
        );

        assert!(smaller.permissions.is_subset(&larger.permissions));
    }

    #[test]
    fn test_role_order_does_not_change_set() {
        let routes = RouteMap::back_office_defaults();
        let catalog = catalog();

        let a = flatten(
            &[RoleSlug::new("accountant"), RoleSlug::new("auditor")],
            &catalog,
            &routes,
        );
        let b = flatten(
            &[RoleSlug::new("auditor"), RoleSlug::new("accountant")],
            &catalog,
            &routes,
        );

        assert_eq!(a.permissions, b.permissions);
        assert_eq!(a.route_patterns, b.route_patterns);
        // Ordering is preserved per input for audit purposes.
        assert_ne!(a.roles, b.roles);
    }

    #[test]
    fn test_unknown_role_contributes_nothing() {
        let set = flatten(
            &[RoleSlug::new("accountant"), RoleSlug::new("ghost")],
            &catalog(),
            &RouteMap::back_office_defaults(),
        );

        assert_eq!(set.permissions.len(), 2);
        assert_eq!(set.roles.len(), 2);
    }

    #[test]
    fn test_route_patterns_follow_permissions() {
        let set = flatten(
            &[RoleSlug::new("auditor")],
            &catalog(),
            &RouteMap::back_office_defaults(),
        );

        assert!(set.route_patterns.contains("/reports"));
        assert!(set.route_patterns.contains("/transactions"));
        assert!(set.route_patterns.contains("/dashboard"));
        assert!(!set.route_patterns.contains("/settings/*"));
    }

    #[test]
    fn test_empty_roles_only_public_routes() {
        let set = flatten(&[], &catalog(), &RouteMap::back_office_defaults());
        assert!(set.permissions.is_empty());
        assert!(set.route_patterns.contains("/dashboard"));
        assert!(!set.route_patterns.contains("/reports"));
    }
}
