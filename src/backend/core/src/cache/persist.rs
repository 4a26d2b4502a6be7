//! Last-known-good snapshot persistence.
//!
//! A JSON file keyed by user id, consulted only when the directory is
//! unreachable and no in-memory entry exists. Loads always pass through the
//! hydrator, so a schema bump discards the file's contents rather than
//! trusting them.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::authz::models::UserId;
use crate::authz::snapshot::PermissionSnapshot;
use crate::error::{AuthzError, Result};

/// File-backed store of each user's last successfully built snapshot.
pub struct SnapshotFileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file.
    file_lock: Mutex<()>,
}

impl SnapshotFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file_lock: Mutex::new(()),
        }
    }

    /// Persist a user's snapshot, replacing any previous one.
    pub fn save(&self, user: &UserId, snapshot: &PermissionSnapshot) -> Result<()> {
        let _guard = self.file_lock.lock();
        let mut entries = self.read_all()?;
        entries.insert(user.as_str().to_string(), serde_json::to_value(snapshot)?);
        let body = serde_json::to_vec_pretty(&entries)?;
        fs::write(&self.path, body)?;
        debug!(user = %user, path = %self.path.display(), "snapshot persisted");
        Ok(())
    }

    /// Load a user's last-known-good snapshot, if one exists and hydrates on
    /// the current schema.
    pub fn load(&self, user: &UserId) -> Option<PermissionSnapshot> {
        let _guard = self.file_lock.lock();
        let entries = match self.read_all() {
            Ok(entries) => entries,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "persisted snapshots unreadable");
                return None;
            }
        };
        entries.get(user.as_str()).and_then(PermissionSnapshot::hydrate)
    }

    /// Remove a user's persisted snapshot.
    pub fn remove(&self, user: &UserId) -> Result<()> {
        let _guard = self.file_lock.lock();
        let mut entries = self.read_all()?;
        if entries.remove(user.as_str()).is_some() {
            let body = serde_json::to_vec_pretty(&entries)?;
            fs::write(&self.path, body)?;
        }
        Ok(())
    }

    fn read_all(&self) -> Result<HashMap<String, serde_json::Value>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let raw = fs::read(&self.path)?;
        serde_json::from_slice(&raw).map_err(|e| AuthzError::Persistence(e.to_string()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
