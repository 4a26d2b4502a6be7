//! Snapshot caching.
//!
//! Three cooperating pieces:
//! - [`store`]: the in-memory per-user TTL cache with lazy expiry and stale
//!   reads for degraded operation
//! - [`singleflight`]: per-user shared rebuild flights guaranteeing at most
//!   one concurrent rebuild per user, detached from any single caller
//! - [`persist`]: the on-disk last-known-good snapshot file, consulted only
//!   when the directory is unreachable

pub mod persist;
pub mod singleflight;
pub mod store;

pub use persist::SnapshotFileStore;
pub use singleflight::{Flight, SingleFlight};
pub use store::{CacheStats, SnapshotStore};
