//! NATS key-value session store.
//!
//! One KV entry per session, keyed by session id. The bucket's `max_age`
//! expires untouched entries server-side; every mutation rewrites the
//! entry, so the server TTL slides with `expires_at`.

use crate::session::DraftSession;
use crate::store::{SessionStore, SessionSummary, StoreError};
use async_nats::jetstream::{self, kv};
use async_trait::async_trait;
use chrono::Utc;
use flowwright_core::SessionId;
use futures::TryStreamExt;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Default bucket name for draft sessions.
const SESSIONS_BUCKET_NAME: &str = "flowwright-drafts";

/// Configuration for the NATS session store.
#[derive(Debug, Clone)]
pub struct NatsStoreConfig {
    /// NATS server URL.
    pub url: String,
    /// KV bucket name (defaults to flowwright-drafts).
    pub bucket_name: Option<String>,
    /// How long an untouched entry survives.
    pub max_age: Duration,
}

impl NatsStoreConfig {
    /// Creates a new config with the given NATS URL and entry lifetime.
    #[must_use]
    pub fn new(url: impl Into<String>, max_age: Duration) -> Self {
        Self {
            url: url.into(),
            bucket_name: None,
            max_age,
        }
    }

    fn bucket(&self) -> &str {
        self.bucket_name.as_deref().unwrap_or(SESSIONS_BUCKET_NAME)
    }
}

/// Session store backed by a JetStream KV bucket.
pub struct NatsSessionStore {
    kv: kv::Store,
}

impl NatsSessionStore {
    /// Connects and opens the bucket, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or bucket setup fails.
    pub async fn connect(config: &NatsStoreConfig) -> Result<Self, StoreError> {
        let client = async_nats::connect(&config.url)
            .await
            .map_err(|e| StoreError::ConnectionFailed {
                message: e.to_string(),
            })?;

        let jetstream = jetstream::new(client);

        let kv = match jetstream.get_key_value(config.bucket()).await {
            Ok(kv) => kv,
            Err(_) => jetstream
                .create_key_value(kv::Config {
                    bucket: config.bucket().to_string(),
                    history: 1,
                    max_age: config.max_age,
                    storage: jetstream::stream::StorageType::File,
                    ..Default::default()
                })
                .await
                .map_err(|e| StoreError::ConnectionFailed {
                    message: format!("failed to create session bucket: {e}"),
                })?,
        };

        debug!(bucket = config.bucket(), "opened session bucket");
        Ok(Self { kv })
    }

    fn key(id: SessionId) -> String {
        id.to_string()
    }

    async fn put(&self, session: &DraftSession) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(session).map_err(|e| StoreError::Serialization {
            message: e.to_string(),
        })?;

        self.kv
            .put(Self::key(session.id()), bytes.into())
            .await
            .map_err(|e| StoreError::OperationFailed {
                operation: "put",
                message: e.to_string(),
            })?;

        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<DraftSession>, StoreError> {
        let Some(bytes) = self
            .kv
            .get(key)
            .await
            .map_err(|e| StoreError::OperationFailed {
                operation: "get",
                message: e.to_string(),
            })?
        else {
            return Ok(None);
        };

        let mut session: DraftSession =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
                message: e.to_string(),
            })?;
        session.label_expiry(Utc::now());
        Ok(Some(session))
    }
}

#[async_trait]
impl SessionStore for NatsSessionStore {
    #[instrument(skip_all, fields(session_id = %session.id()))]
    async fn create(&self, session: &DraftSession) -> Result<(), StoreError> {
        self.put(session).await
    }

    async fn get(&self, id: SessionId) -> Result<Option<DraftSession>, StoreError> {
        self.load(&Self::key(id)).await
    }

    #[instrument(skip_all, fields(session_id = %session.id()))]
    async fn update(&self, session: &DraftSession) -> Result<(), StoreError> {
        self.put(session).await
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: SessionId) -> Result<(), StoreError> {
        self.kv
            .delete(Self::key(id))
            .await
            .map_err(|e| StoreError::OperationFailed {
                operation: "delete",
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn list(&self, include_expired: bool) -> Result<Vec<SessionSummary>, StoreError> {
        let keys: Vec<String> = self
            .kv
            .keys()
            .await
            .map_err(|e| StoreError::OperationFailed {
                operation: "keys",
                message: e.to_string(),
            })?
            .try_collect()
            .await
            .map_err(|e| StoreError::OperationFailed {
                operation: "keys",
                message: e.to_string(),
            })?;

        let now = Utc::now();
        let mut summaries = Vec::with_capacity(keys.len());
        for key in keys {
            // Entries can vanish between listing and loading.
            match self.load(&key).await {
                Ok(Some(session)) if include_expired || !session.is_past_expiry(now) => {
                    summaries.push(SessionSummary::from(&session));
                }
                Ok(_) => {}
                Err(e) => warn!(key = %key, error = %e, "skipping unreadable session"),
            }
        }
        summaries.sort_by_key(|summary| summary.created_at);
        Ok(summaries)
    }
}
