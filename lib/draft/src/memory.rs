//! In-process session store.

use crate::session::DraftSession;
use crate::store::{SessionStore, SessionSummary, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use flowwright_core::SessionId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, instrument};

/// Session store backed by a shared map.
///
/// Expired sessions stay readable for `retention` past their expiry so
/// they can be resumed; the sweep removes them after that.
#[derive(Debug, Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, DraftSession>>>,
    retention: Duration,
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new(retention: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            retention,
        }
    }

    /// Removes sessions past their retention window and sessions that
    /// reached a terminal status. Returns how many were removed.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| {
            !session.status().is_terminal() && now < session.expires_at() + self.retention
        });
        before - sessions.len()
    }

    /// Spawns the periodic sweep.
    pub fn spawn_sweeper(&self, interval: std::time::Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let removed = store.sweep_expired(Utc::now()).await;
                if removed > 0 {
                    debug!(removed_sessions = removed, "swept expired draft sessions");
                }
            }
        })
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(Duration::minutes(30))
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    #[instrument(skip_all, fields(session_id = %session.id()))]
    async fn create(&self, session: &DraftSession) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .insert(session.id(), session.clone());
        Ok(())
    }

    async fn get(&self, id: SessionId) -> Result<Option<DraftSession>, StoreError> {
        let sessions = self.sessions.read().await;
        let mut session = sessions.get(&id).cloned();
        if let Some(session) = session.as_mut() {
            session.label_expiry(Utc::now());
        }
        Ok(session)
    }

    async fn update(&self, session: &DraftSession) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .insert(session.id(), session.clone());
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: SessionId) -> Result<(), StoreError> {
        self.sessions.write().await.remove(&id);
        Ok(())
    }

    async fn list(&self, include_expired: bool) -> Result<Vec<SessionSummary>, StoreError> {
        let now = Utc::now();
        let sessions = self.sessions.read().await;
        let mut summaries: Vec<SessionSummary> = sessions
            .values()
            .filter(|session| include_expired || !session.is_past_expiry(now))
            .map(|session| {
                let mut labelled = session.clone();
                labelled.label_expiry(now);
                SessionSummary::from(&labelled)
            })
            .collect();
        summaries.sort_by_key(|summary| summary.created_at);
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::WorkflowDraft;
    use crate::store::contract;

    #[tokio::test]
    async fn satisfies_store_contract() {
        let store = InMemorySessionStore::default();
        contract::run_all(&store).await;
    }

    #[tokio::test]
    async fn sweep_honours_retention() {
        let store = InMemorySessionStore::new(Duration::minutes(10));
        let fresh = DraftSession::new(WorkflowDraft::new("fresh"), Duration::minutes(5));
        let recently_expired = DraftSession::new(WorkflowDraft::new("recent"), Duration::minutes(-5));
        let long_expired = DraftSession::new(WorkflowDraft::new("old"), Duration::minutes(-20));
        for session in [&fresh, &recently_expired, &long_expired] {
            store.create(session).await.expect("create");
        }

        let removed = store.sweep_expired(Utc::now()).await;
        assert_eq!(removed, 1);
        assert!(store.get(fresh.id()).await.expect("get").is_some());
        assert!(store.get(recently_expired.id()).await.expect("get").is_some());
        assert!(store.get(long_expired.id()).await.expect("get").is_none());
    }

    #[tokio::test]
    async fn sweep_drops_terminal_leftovers() {
        let store = InMemorySessionStore::default();
        let mut session = DraftSession::new(WorkflowDraft::new("done"), Duration::minutes(30));
        session.mark_committed();
        store.create(&session).await.expect("create");
        assert_eq!(store.sweep_expired(Utc::now()).await, 1);
    }

    #[tokio::test]
    async fn sweeper_runs_in_background() {
        let store = InMemorySessionStore::new(Duration::zero());
        let stale = DraftSession::new(WorkflowDraft::new("stale"), Duration::seconds(-1));
        store.create(&stale).await.expect("create");

        let handle = store.spawn_sweeper(std::time::Duration::from_millis(10));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        handle.abort();

        assert!(store.get(stale.id()).await.expect("get").is_none());
    }
}
