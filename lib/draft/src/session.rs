//! Draft sessions.
//!
//! A session owns one workflow draft from `start` until it is committed,
//! discarded or garbage-collected after expiry. Every command appends to
//! the session's operations log; the commit retry count is derived from
//! that log rather than stored separately.

use crate::draft::WorkflowDraft;
use chrono::{DateTime, Duration, Utc};
use flowwright_core::SessionId;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

/// Operation name recorded for a failed commit.
pub const COMMIT_FAILED: &str = "commit_failed";

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    /// Past `expires_at`; must be resumed before further mutation.
    Expired,
    Committed,
    Discarded,
}

impl SessionStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Committed => "committed",
            Self::Discarded => "discarded",
        }
    }

    /// Returns true for `committed` and `discarded`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed | Self::Discarded)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in a session's operations log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationEntry {
    pub operation: String,
    pub at: DateTime<Utc>,
    #[serde(default)]
    pub detail: JsonValue,
}

/// An in-progress workflow build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftSession {
    id: SessionId,
    status: SessionStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    #[serde(default)]
    operations: Vec<OperationEntry>,
    /// Credential name to credential id.
    #[serde(default)]
    credentials: BTreeMap<String, String>,
    draft: WorkflowDraft,
}

impl DraftSession {
    /// Creates an active session that expires after `ttl`.
    #[must_use]
    pub fn new(draft: WorkflowDraft, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            status: SessionStatus::Active,
            created_at: now,
            updated_at: now,
            expires_at: now + ttl,
            operations: Vec::new(),
            credentials: BTreeMap::new(),
            draft,
        }
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: BTreeMap<String, String>) -> Self {
        self.credentials = credentials;
        self
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.draft.name
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    #[must_use]
    pub fn operations(&self) -> &[OperationEntry] {
        &self.operations
    }

    #[must_use]
    pub fn credentials(&self) -> &BTreeMap<String, String> {
        &self.credentials
    }

    #[must_use]
    pub fn draft(&self) -> &WorkflowDraft {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut WorkflowDraft {
        &mut self.draft
    }

    /// Returns true once `now` has reached `expires_at`.
    #[must_use]
    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Labels an active session `expired` once its expiry has passed.
    ///
    /// Stores call this on every read so callers see the effective status.
    pub fn label_expiry(&mut self, now: DateTime<Utc>) {
        if self.status == SessionStatus::Active && self.is_past_expiry(now) {
            self.status = SessionStatus::Expired;
        }
    }

    /// Appends an entry to the operations log.
    pub fn record(&mut self, operation: impl Into<String>, detail: JsonValue) {
        let now = Utc::now();
        self.operations.push(OperationEntry {
            operation: operation.into(),
            at: now,
            detail,
        });
        self.updated_at = now;
    }

    /// Pushes `expires_at` to `ttl` from now.
    pub fn extend(&mut self, ttl: Duration) {
        let now = Utc::now();
        self.expires_at = now + ttl;
        self.updated_at = now;
    }

    /// Remembers a resolved credential.
    pub fn add_credential(&mut self, name: impl Into<String>, id: impl Into<String>) {
        self.credentials.insert(name.into(), id.into());
    }

    /// Number of failed commits so far.
    #[must_use]
    pub fn commit_failures(&self) -> usize {
        self.operations
            .iter()
            .filter(|entry| entry.operation == COMMIT_FAILED)
            .count()
    }

    /// Moves an active or expired session back to active with a fresh expiry.
    ///
    /// # Errors
    ///
    /// Returns the current status if the session is committed or discarded.
    pub fn resume(&mut self, ttl: Duration) -> Result<(), SessionStatus> {
        if self.status.is_terminal() {
            return Err(self.status);
        }
        self.status = SessionStatus::Active;
        self.extend(ttl);
        Ok(())
    }

    /// Marks the session committed.
    pub fn mark_committed(&mut self) {
        self.status = SessionStatus::Committed;
        self.updated_at = Utc::now();
    }

    /// Marks the session discarded.
    pub fn mark_discarded(&mut self) {
        if !self.status.is_terminal() {
            self.status = SessionStatus::Discarded;
            self.updated_at = Utc::now();
        }
    }
}
