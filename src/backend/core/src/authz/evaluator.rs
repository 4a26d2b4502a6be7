//! Access evaluators: the UI-facing predicate functions over a resolved
//! snapshot.
//!
//! Evaluation order for every check:
//! 1. super-admin flag -> allow, without consulting the snapshot
//! 2. snapshot present -> set membership / route match
//! 3. deny
//!
//! Evaluators are total, synchronous, boolean-returning functions. They never
//! touch the directory service, and internal errors degrade to deny rather
//! than propagate.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::models::PermissionCode;
use super::routes::RouteMap;
use super::snapshot::PermissionSnapshot;

/// Evaluates action and route access against a cached snapshot.
#[derive(Debug, Clone)]
pub struct AccessEvaluator {
    routes: Arc<RouteMap>,
}

impl AccessEvaluator {
    pub fn new(routes: Arc<RouteMap>) -> Self {
        Self { routes }
    }

    /// Whether the permission code is held.
    pub fn has_action_access(
        &self,
        super_admin: bool,
        snapshot: Option<&PermissionSnapshot>,
        code: &PermissionCode,
    ) -> bool {
        if super_admin {
            debug!(permission = %code, "super_admin bypass");
            return true;
        }
        match snapshot {
            Some(snapshot) => snapshot.resolved.allows(code),
            None => false,
        }
    }

    /// Whether the pathname is reachable.
    ///
    /// The governing rule is the longest pattern matching the pathname; a
    /// public rule allows unconditionally, otherwise the rule's required
    /// permission must be held.
    pub fn has_route_access(
        &self,
        super_admin: bool,
        snapshot: Option<&PermissionSnapshot>,
        pathname: &str,
    ) -> bool {
        if super_admin {
            debug!(pathname = %pathname, "super_admin bypass");
            return true;
        }
        let Some(rule) = self.routes.governing_rule(pathname) else {
            return false;
        };
        match &rule.required {
            None => true,
            Some(code) => snapshot.map_or(false, |s| s.resolved.allows(code)),
        }
    }

    /// Evaluate many codes against one snapshot, O(len(codes)).
    ///
    /// Never performs a directory round-trip. Any internal failure degrades
    /// the whole batch to all-false so UI consumers render "nothing visible"
    /// instead of crashing.
    pub fn check_batch(
        &self,
        super_admin: bool,
        snapshot: Option<&PermissionSnapshot>,
        codes: &[PermissionCode],
    ) -> HashMap<PermissionCode, bool> {
        if super_admin {
            return codes.iter().map(|c| (c.clone(), true)).collect();
        }
        match snapshot {
            Some(snapshot) => codes
                .iter()
                .map(|c| (c.clone(), snapshot.resolved.allows(c)))
                .collect(),
            None => codes.iter().map(|c| (c.clone(), false)).collect(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
