//! Static route map: which permission a UI route requires.
//!
//! Patterns are path-shaped with prefix/wildcard semantics:
//! - An exact pattern (`/reports`) matches only that pathname.
//! - A wildcard pattern (`/transactions/*`) matches the prefix itself and any
//!   deeper path below it.
//!
//! When several patterns match a pathname, the longest pattern governs.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use super::models::PermissionCode;

// ═══════════════════════════════════════════════════════════════════════════════
// Route Rule
// ═══════════════════════════════════════════════════════════════════════════════

/// One route pattern and the permission it requires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRule {
    /// Path pattern, optionally ending in `/*`.
    pub pattern: String,
    /// The permission required to visit a matching path (None = public).
    pub required: Option<PermissionCode>,
}

impl RouteRule {
    pub fn new(pattern: impl Into<String>, required: PermissionCode) -> Self {
        Self {
            pattern: pattern.into(),
            required: Some(required),
        }
    }

    pub fn public(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            required: None,
        }
    }

    /// Whether a pathname matches this rule's pattern.
    pub fn matches(&self, pathname: &str) -> bool {
        pattern_matches(&self.pattern, pathname)
    }
}

fn pattern_matches(pattern: &str, pathname: &str) -> bool {
    if let Some(prefix) = pattern.strip_suffix("/*") {
        pathname == prefix
            || (pathname.starts_with(prefix)
                && pathname.as_bytes().get(prefix.len()) == Some(&b'/'))
    } else {
        pathname == pattern
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Route Map
// ═══════════════════════════════════════════════════════════════════════════════

/// The static route → permission map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteMap {
    rules: Vec<RouteRule>,
}

impl RouteMap {
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self { rules }
    }

    /// The back-office default map.
    pub fn back_office_defaults() -> Self {
        Self::new(vec![
            RouteRule::public("/"),
            RouteRule::public("/dashboard"),
            RouteRule::new("/transactions", PermissionCode::new("transactions.view")),
            RouteRule::new("/transactions/*", PermissionCode::new("transactions.view")),
            RouteRule::new(
                "/transactions/post/*",
                PermissionCode::new("transactions.post"),
            ),
            RouteRule::new("/documents", PermissionCode::new("documents.view")),
            RouteRule::new("/documents/*", PermissionCode::new("documents.view")),
            RouteRule::new("/reports", PermissionCode::new("reports.view")),
            RouteRule::new("/reports/*", PermissionCode::new("reports.view")),
            RouteRule::new("/users", PermissionCode::new("users.view")),
            RouteRule::new("/users/*", PermissionCode::new("users.manage")),
            RouteRule::new("/roles", PermissionCode::new("roles.view")),
            RouteRule::new("/roles/*", PermissionCode::new("roles.manage")),
            RouteRule::new("/settings/*", PermissionCode::new("settings.manage")),
        ])
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    /// The rule governing a pathname: among all matching rules, the one with
    /// the longest pattern.
    pub fn governing_rule(&self, pathname: &str) -> Option<&RouteRule> {
        self.rules
            .iter()
            .filter(|r| r.matches(pathname))
            .max_by_key(|r| r.pattern.len())
    }

    /// The patterns reachable with a given permission set: every public
    /// pattern plus every pattern whose required permission is present.
    pub fn patterns_for(&self, permissions: &HashSet<PermissionCode>) -> BTreeSet<String> {
        self.rules
            .iter()
            .filter(|r| match &r.required {
                None => true,
                Some(code) => permissions.contains(code),
            })
            .map(|r| r.pattern.clone())
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_pattern_matching() {
        let rule = RouteRule::new("/reports", PermissionCode::new("reports.view"));
        assert!(rule.matches("/reports"));
        assert!(!rule.matches("/reports/monthly"));
        assert!(!rule.matches("/report"));
    }

    #[test]
    fn test_wildcard_pattern_matching() {
        let rule = RouteRule::new("/transactions/*", PermissionCode::new("transactions.view"));
        assert!(rule.matches("/transactions"));
        assert!(rule.matches("/transactions/123"));
        assert!(rule.matches("/transactions/123/lines"));
        assert!(!rule.matches("/transaction"));
        assert!(!rule.matches("/transactionsabc"));
    }

    #[test]
    fn test_longest_pattern_governs() {
        let map = RouteMap::back_office_defaults();

        // Both /transactions/* and /transactions/post/* match; the longer
        // pattern's permission must govern.
        let rule = map.governing_rule("/transactions/post/42").unwrap();
        assert_eq!(rule.required, Some(PermissionCode::new("transactions.post")));

        let rule = map.governing_rule("/transactions/42").unwrap();
        assert_eq!(rule.required, Some(PermissionCode::new("transactions.view")));
    }

    #[test]
    fn test_governing_rule_unknown_path() {
        let map = RouteMap::back_office_defaults();
        assert!(map.governing_rule("/nonexistent").is_none());
    }

    #[test]
    fn test_patterns_for_includes_public() {
        let map = RouteMap::back_office_defaults();
        let perms: HashSet<PermissionCode> =
            [PermissionCode::new("reports.view")].into_iter().collect();

        let patterns = map.patterns_for(&perms);
        assert!(patterns.contains("/dashboard"));
        assert!(patterns.contains("/reports"));
        assert!(patterns.contains("/reports/*"));
        assert!(!patterns.contains("/transactions"));
    }
}
