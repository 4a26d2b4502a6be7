//! Authorization resolution: flattening, override merging, snapshots, and
//! access evaluation.
//!
//! Precedence for every check: super-admin flag > direct grant > direct
//! revoke > role-inherited permission > default-deny.

pub mod evaluator;
pub mod flatten;
pub mod models;
pub mod overrides;
pub mod routes;
pub mod snapshot;

pub use evaluator::AccessEvaluator;
pub use flatten::flatten;
pub use models::{
    PermissionCode, ResolvedPermissionSet, RoleCatalog, RoleSlug, UserId, UserOverride,
};
pub use overrides::apply_overrides;
pub use routes::{RouteMap, RouteRule};
pub use snapshot::{PermissionSnapshot, SCHEMA_VERSION};
