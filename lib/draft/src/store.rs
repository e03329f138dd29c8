//! Session storage.
//!
//! Two backends implement `SessionStore`: an in-process map swept on a
//! timer (`memory`) and a NATS key-value bucket with server-side expiry
//! (`nats`). The builder only sees the trait; the backend is picked at boot.

use crate::session::{DraftSession, SessionStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flowwright_core::SessionId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Compact view of a session for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub name: String,
    pub status: SessionStatus,
    pub nodes_count: usize,
    pub connections_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<&DraftSession> for SessionSummary {
    fn from(session: &DraftSession) -> Self {
        Self {
            session_id: session.id(),
            name: session.name().to_string(),
            status: session.status(),
            nodes_count: session.draft().nodes.len(),
            connections_count: session.draft().connections.len(),
            created_at: session.created_at(),
            updated_at: session.updated_at(),
            expires_at: session.expires_at(),
        }
    }
}

/// Errors from session storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend could not be reached.
    ConnectionFailed { message: String },
    /// A session could not be encoded or decoded.
    Serialization { message: String },
    /// The backend rejected an operation.
    OperationFailed {
        operation: &'static str,
        message: String,
    },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed { message } => {
                write!(f, "session store connection failed: {message}")
            }
            Self::Serialization { message } => {
                write!(f, "session serialization failed: {message}")
            }
            Self::OperationFailed { operation, message } => {
                write!(f, "session store {operation} failed: {message}")
            }
        }
    }
}

impl std::error::Error for StoreError {}

/// Persistence for draft sessions.
///
/// Every operation is idempotent under retry: `create` with an existing
/// id overwrites and `delete` of a missing id succeeds. `get` returns
/// expired sessions labelled `expired` until the backend drops them.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Stores a new session.
    async fn create(&self, session: &DraftSession) -> Result<(), StoreError>;

    /// Loads a session.
    async fn get(&self, id: SessionId) -> Result<Option<DraftSession>, StoreError>;

    /// Replaces a session. Last writer wins.
    async fn update(&self, session: &DraftSession) -> Result<(), StoreError>;

    /// Removes a session.
    async fn delete(&self, id: SessionId) -> Result<(), StoreError>;

    /// Summaries of stored sessions, oldest first.
    async fn list(&self, include_expired: bool) -> Result<Vec<SessionSummary>, StoreError>;
}

/// Behavior every backend must share.
#[cfg(test)]
pub(crate) mod contract {
    use super::*;
    use crate::draft::WorkflowDraft;
    use chrono::Duration;
    use serde_json::json;

    fn session(name: &str, ttl: Duration) -> DraftSession {
        DraftSession::new(WorkflowDraft::new(name), ttl)
    }

    pub async fn create_then_get(store: &dyn SessionStore) {
        let session = session("create-get", Duration::minutes(30));
        store.create(&session).await.expect("create");
        let loaded = store.get(session.id()).await.expect("get").expect("present");
        assert_eq!(loaded, session);
    }

    pub async fn missing_session_is_none(store: &dyn SessionStore) {
        assert!(store.get(SessionId::new()).await.expect("get").is_none());
    }

    pub async fn create_overwrites(store: &dyn SessionStore) {
        let mut session = session("overwrite", Duration::minutes(30));
        store.create(&session).await.expect("create");
        session.record("add_node", json!({ "name": "Webhook" }));
        store.create(&session).await.expect("re-create");
        let loaded = store.get(session.id()).await.expect("get").expect("present");
        assert_eq!(loaded.operations().len(), 1);
    }

    pub async fn update_is_last_writer_wins(store: &dyn SessionStore) {
        let session = session("update", Duration::minutes(30));
        store.create(&session).await.expect("create");
        let mut first = session.clone();
        first.record("connect", json!({ "writer": 1 }));
        let mut second = session.clone();
        second.record("connect", json!({ "writer": 2 }));
        store.update(&first).await.expect("update first");
        store.update(&second).await.expect("update second");
        let loaded = store.get(session.id()).await.expect("get").expect("present");
        assert_eq!(loaded.operations()[0].detail["writer"], 2);
    }

    pub async fn delete_is_idempotent(store: &dyn SessionStore) {
        let session = session("delete", Duration::minutes(30));
        store.create(&session).await.expect("create");
        store.delete(session.id()).await.expect("delete");
        store.delete(session.id()).await.expect("delete again");
        assert!(store.get(session.id()).await.expect("get").is_none());
    }

    pub async fn expired_sessions_are_labelled(store: &dyn SessionStore) {
        let session = session("expired", Duration::seconds(-1));
        store.create(&session).await.expect("create");
        let loaded = store.get(session.id()).await.expect("get").expect("present");
        assert_eq!(loaded.status(), SessionStatus::Expired);
    }

    pub async fn list_filters_expired(store: &dyn SessionStore) {
        let live = session("listed-live", Duration::minutes(30));
        let stale = session("listed-stale", Duration::seconds(-1));
        store.create(&live).await.expect("create live");
        store.create(&stale).await.expect("create stale");

        let active = store.list(false).await.expect("list");
        assert!(active.iter().any(|s| s.session_id == live.id()));
        assert!(!active.iter().any(|s| s.session_id == stale.id()));

        let all = store.list(true).await.expect("list all");
        let expired = all
            .iter()
            .find(|s| s.session_id == stale.id())
            .expect("expired listed");
        assert_eq!(expired.status, SessionStatus::Expired);
    }

    pub async fn run_all(store: &dyn SessionStore) {
        create_then_get(store).await;
        missing_session_is_none(store).await;
        create_overwrites(store).await;
        update_is_last_writer_wins(store).await;
        delete_is_idempotent(store).await;
        expired_sessions_are_labelled(store).await;
        list_filters_expired(store).await;
    }
}
