//! Super-admin flag tracking.
//!
//! The flag is sourced from the directory profile during snapshot rebuilds
//! and cached here so access checks can consult it before touching any
//! snapshot. It is checked first and unconditionally wins; a super admin
//! with zero roles and zero permissions is still allowed everything.
//!
//! The state optionally persists to a small JSON file so the flag survives
//! restarts while the directory is unreachable.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::authz::models::UserId;

pub struct SuperAdminState {
    flags: DashMap<UserId, bool>,
    persist_path: Option<PathBuf>,
    // Serializes snapshot-and-write in persist; concurrent set() calls must
    // not interleave full-file writes.
    file_lock: Mutex<()>,
}

impl SuperAdminState {
    /// In-memory only state.
    pub fn new() -> Self {
        Self {
            flags: DashMap::new(),
            persist_path: None,
            file_lock: Mutex::new(()),
        }
    }

    /// State backed by a JSON file. Existing flags are loaded up front; an
    /// unreadable file is logged and treated as empty.
    pub fn with_persistence(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let flags = DashMap::new();
        match fs::read(&path) {
            Ok(raw) => match serde_json::from_slice::<HashMap<String, bool>>(&raw) {
                Ok(entries) => {
                    for (user, flag) in entries {
                        flags.insert(UserId::new(user), flag);
                    }
                    debug!(count = flags.len(), "loaded persisted super-admin flags");
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "persisted super-admin flags unreadable");
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(path = %path.display(), error = %err, "persisted super-admin flags unreadable");
            }
        }
        Self {
            flags,
            persist_path: Some(path),
            file_lock: Mutex::new(()),
        }
    }

    /// Whether the user currently holds the super-admin flag.
    pub fn is_super_admin(&self, user: &UserId) -> bool {
        self.flags.get(user).map(|f| *f).unwrap_or(false)
    }

    /// Record the flag as observed from the directory profile.
    ///
    /// Persistence failures are logged, never propagated; the in-memory flag
    /// is authoritative for the running process.
    pub fn set(&self, user: &UserId, flag: bool) {
        let changed = self
            .flags
            .insert(user.clone(), flag)
            .map(|prev| prev != flag)
            .unwrap_or(flag);
        if changed {
            debug!(user = %user, super_admin = flag, "super-admin flag updated");
        }
        self.persist();
    }

    fn persist(&self) {
        let Some(path) = &self.persist_path else {
            return;
        };
        // The map snapshot must happen under the lock: a writer that
        // snapshots before a concurrent insert but writes after it would
        // drop the just-set flag from the file.
        let _guard = self.file_lock.lock();
        let entries: HashMap<String, bool> = self
            .flags
            .iter()
            .map(|e| (e.key().as_str().to_string(), *e.value()))
            .collect();
        let body = match serde_json::to_vec_pretty(&entries) {
            Ok(body) => body,
            Err(err) => {
                warn!(error = %err, "failed to serialize super-admin flags");
                return;
            }
        };
        if let Err(err) = fs::write(path, body) {
            warn!(path = %path.display(), error = %err, "failed to persist super-admin flags");
        }
    }
}

impl Default for SuperAdminState {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_false() {
        let state = SuperAdminState::new();
        assert!(!state.is_super_admin(&UserId::new("u-1")));
    }

    #[test]
    fn test_set_and_query() {
        let state = SuperAdminState::new();
        let user = UserId::new("u-1");

        state.set(&user, true);
        assert!(state.is_super_admin(&user));

        state.set(&user, false);
        assert!(!state.is_super_admin(&user));
    }

    #[test]
    fn test_flags_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("superadmins.json");
        let user = UserId::new("u-root");

        {
            let state = SuperAdminState::with_persistence(&path);
            state.set(&user, true);
            state.set(&UserId::new("u-plain"), false);
        }

        let reloaded = SuperAdminState::with_persistence(&path);
        assert!(reloaded.is_super_admin(&user));
        assert!(!reloaded.is_super_admin(&UserId::new("u-plain")));
    }

    #[test]
    fn test_concurrent_sets_all_reach_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("superadmins.json");
        let state = std::sync::Arc::new(SuperAdminState::with_persistence(&path));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let state = std::sync::Arc::clone(&state);
                std::thread::spawn(move || {
                    state.set(&UserId::new(format!("u-{i}")), true);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let reloaded = SuperAdminState::with_persistence(&path);
        for i in 0..8 {
            assert!(reloaded.is_super_admin(&UserId::new(format!("u-{i}"))));
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let state = SuperAdminState::with_persistence(dir.path().join("absent.json"));
        assert!(!state.is_super_admin(&UserId::new("u-1")));
    }

    #[test]
    fn test_corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("superadmins.json");
        fs::write(&path, b"not json").unwrap();

        let state = SuperAdminState::with_persistence(&path);
        assert!(!state.is_super_admin(&UserId::new("u-1")));
    }
}
