//! Change-feed driven cache synchronization.
//!
//! Writes to the directory's authorization tables publish [`ChangeEvent`]s
//! onto a [`ChangeFeed`]; the [`service::SyncService`] consumes them and
//! invalidates cached snapshots so a changed grant is observable on the
//! next resolve rather than after a TTL expiry.

pub mod service;
pub mod verify;

pub use service::{SyncHandle, SyncService};
pub use verify::{verify_role, verify_role_strict, VerificationReport};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::authz::models::UserId;

// ═══════════════════════════════════════════════════════════════════════════════
// Change Events
// ═══════════════════════════════════════════════════════════════════════════════

/// The authorization table a change touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    RolePermissions,
    UserOverrides,
    UserRoles,
    Other(String),
}

impl TableKind {
    pub fn from_table_name(name: &str) -> Self {
        match name {
            "role_permissions" => Self::RolePermissions,
            "user_overrides" => Self::UserOverrides,
            "user_roles" => Self::UserRoles,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One row-level change observed on an authorization table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Unique event id, for log correlation across subscribers.
    pub id: Uuid,
    pub table: TableKind,
    pub kind: ChangeKind,
    /// The changed row, as published by the feed.
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(table: TableKind, kind: ChangeKind, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            table,
            kind,
            payload,
            occurred_at: Utc::now(),
        }
    }

    /// The user the change is scoped to, when the payload names one.
    ///
    /// Role-permission changes carry no user id; they affect every holder of
    /// the role and map to a full invalidation.
    pub fn user_id(&self) -> Option<UserId> {
        self.payload
            .get("user_id")
            .and_then(|v| v.as_str())
            .map(UserId::new)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Change Feed
// ═══════════════════════════════════════════════════════════════════════════════

/// A broadcast channel of [`ChangeEvent`]s.
///
/// Slow subscribers lag rather than block publishers; a lagged subscriber
/// must treat its cache as suspect.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. The number of live subscribers is returned; zero
    /// subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(256)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_table_kind_from_name() {
        assert_eq!(
            TableKind::from_table_name("user_overrides"),
            TableKind::UserOverrides
        );
        assert_eq!(
            TableKind::from_table_name("journal_entries"),
            TableKind::Other("journal_entries".to_string())
        );
    }

    #[test]
    fn test_user_id_extraction() {
        let event = ChangeEvent::new(
            TableKind::UserRoles,
            ChangeKind::Insert,
            json!({"user_id": "u-1", "role": "accountant"}),
        );
        assert_eq!(event.user_id(), Some(UserId::new("u-1")));

        let event = ChangeEvent::new(
            TableKind::RolePermissions,
            ChangeKind::Update,
            json!({"role": "accountant", "permission": "transactions.post"}),
        );
        assert_eq!(event.user_id(), None);
    }

    #[tokio::test]
    async fn test_feed_delivers_to_subscribers() {
        let feed = ChangeFeed::new(16);
        let mut rx = feed.subscribe();

        let delivered = feed.publish(ChangeEvent::new(
            TableKind::UserOverrides,
            ChangeKind::Delete,
            json!({"user_id": "u-2"}),
        ));
        assert_eq!(delivered, 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.table, TableKind::UserOverrides);
        assert_eq!(event.user_id(), Some(UserId::new("u-2")));
    }

    #[test]
    fn test_publish_without_subscribers_is_fine() {
        let feed = ChangeFeed::new(16);
        let delivered = feed.publish(ChangeEvent::new(
            TableKind::UserRoles,
            ChangeKind::Insert,
            json!({}),
        ));
        assert_eq!(delivered, 0);
    }
}
