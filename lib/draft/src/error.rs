//! Error types for the draft crate.
//!
//! Every error carries a stable code and a category so tool callers can
//! branch on it, plus a structured detail object for self-correction.

use crate::compiler::CompileError;
use crate::session::SessionStatus;
use crate::store::StoreError;
use chrono::{DateTime, Utc};
use flowwright_core::SessionId;
use flowwright_schema::{NodeKind, SchemaError};
use serde::Serialize;
use serde_json::{Value as JsonValue, json};
use std::fmt;

/// Coarse error class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    NotFound,
    State,
    Validation,
    Remote,
    Storage,
}

impl ErrorCategory {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::State => "state",
            Self::Validation => "validation",
            Self::Remote => "remote",
            Self::Storage => "storage",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An existing connection of the node a bad `connect` started from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExistingConnection {
    pub to: String,
    pub from_output: usize,
    pub to_input: usize,
    /// Whether `from_output` is within the node's output range.
    pub valid: bool,
}

/// Details of a `connect` whose output index exceeds the source's outputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputIndexError {
    pub session_id: SessionId,
    pub from: String,
    pub to: String,
    pub node_type: NodeKind,
    pub requested_output: usize,
    pub expected_outputs: usize,
    pub valid_range: String,
    pub explanation: String,
    pub suggested_output: usize,
    pub corrected_call: JsonValue,
    pub existing_connections: Vec<ExistingConnection>,
}

impl OutputIndexError {
    /// Explains the output layout of a node type in plain words.
    #[must_use]
    pub fn explain(node_type: NodeKind, name: &str, expected_outputs: usize) -> String {
        match node_type {
            NodeKind::If => format!(
                "'{name}' is an IF node with exactly 2 outputs: output 0 is the true branch and output 1 is the false branch."
            ),
            NodeKind::Switch => format!(
                "'{name}' is a Switch node with {expected_outputs} outputs, one per rule (outputs 0 to {}). Add a rule to the node to get another output.",
                expected_outputs.saturating_sub(1)
            ),
            _ => format!(
                "'{name}' ({node_type}) has a single output. Use from_output 0 or leave it out."
            ),
        }
    }
}

/// A commit that failed and left the session in place for a retry.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitFailure {
    pub session_id: SessionId,
    pub retry_count: usize,
    pub cause: DraftError,
    pub recovery_hint: String,
    /// Set once `retry_count` reaches the escalation threshold.
    pub escalation: Option<String>,
}

impl CommitFailure {
    #[must_use]
    pub fn new(
        session_id: SessionId,
        retry_count: usize,
        cause: DraftError,
        escalation_threshold: usize,
    ) -> Self {
        let escalation = (retry_count >= escalation_threshold).then(|| {
            format!(
                "commit has failed {retry_count} times; if the cause cannot be fixed, discard the session and rebuild"
            )
        });
        Self {
            session_id,
            retry_count,
            cause,
            recovery_hint: format!(
                "the session was kept; fix the problem and retry commit with session {session_id}"
            ),
            escalation,
        }
    }
}

/// Errors from draft builder operations.
#[derive(Debug, Clone, PartialEq)]
pub enum DraftError {
    SessionNotFound {
        session_id: String,
        available: Vec<String>,
    },
    NodeNotFound {
        session_id: SessionId,
        reference: String,
        available: Vec<String>,
    },
    UnknownNodeType {
        node_type: String,
        supported: Vec<String>,
    },
    SessionNotActive {
        session_id: SessionId,
        status: SessionStatus,
    },
    SessionExpired {
        session_id: SessionId,
        expired_at: DateTime<Utc>,
    },
    EmptyWorkflow,
    MissingTrigger {
        node_types: Vec<String>,
    },
    UnresolvedCredential {
        names: Vec<String>,
        known: Vec<String>,
    },
    InvalidConfig {
        field: String,
        reason: String,
    },
    OutputIndexOutOfRange(Box<OutputIndexError>),
    SelfLoop {
        node: String,
    },
    DuplicateConnection {
        from: String,
        to: String,
    },
    Compile(CompileError),
    CommitFailed(Box<CommitFailure>),
    Remote {
        operation: &'static str,
        message: String,
    },
    Store(StoreError),
}

impl DraftError {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::SessionNotFound { .. } => "SESSION_NOT_FOUND",
            Self::NodeNotFound { .. } => "NODE_NOT_FOUND",
            Self::UnknownNodeType { .. } => "UNKNOWN_NODE_TYPE",
            Self::SessionNotActive { .. } => "SESSION_NOT_ACTIVE",
            Self::SessionExpired { .. } => "SESSION_EXPIRED",
            Self::EmptyWorkflow => "EMPTY_WORKFLOW",
            Self::MissingTrigger { .. } => "MISSING_TRIGGER",
            Self::UnresolvedCredential { .. } => "UNRESOLVED_CREDENTIAL",
            Self::InvalidConfig { .. } => "INVALID_CONFIG",
            Self::OutputIndexOutOfRange(_) => "OUTPUT_INDEX_OUT_OF_RANGE",
            Self::SelfLoop { .. } => "SELF_LOOP",
            Self::DuplicateConnection { .. } => "DUPLICATE_CONNECTION",
            Self::Compile(_) => "COMPILE_FAILED",
            Self::CommitFailed(_) => "COMMIT_FAILED",
            Self::Remote { .. } => "REMOTE_FAILED",
            Self::Store(_) => "STORE_FAILED",
        }
    }

    /// Error class. A failed commit takes the class of its cause.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::SessionNotFound { .. }
            | Self::NodeNotFound { .. }
            | Self::UnknownNodeType { .. } => ErrorCategory::NotFound,
            Self::SessionNotActive { .. }
            | Self::SessionExpired { .. }
            | Self::EmptyWorkflow
            | Self::MissingTrigger { .. }
            | Self::UnresolvedCredential { .. } => ErrorCategory::State,
            Self::InvalidConfig { .. }
            | Self::OutputIndexOutOfRange(_)
            | Self::SelfLoop { .. }
            | Self::DuplicateConnection { .. } => ErrorCategory::Validation,
            Self::Compile(e) if e.is_corrupted_state() => ErrorCategory::State,
            Self::Compile(_) => ErrorCategory::Validation,
            Self::CommitFailed(failure) => failure.cause.category(),
            Self::Remote { .. } => ErrorCategory::Remote,
            Self::Store(_) => ErrorCategory::Storage,
        }
    }

    /// Structured detail object for callers.
    #[must_use]
    pub fn details(&self) -> JsonValue {
        match self {
            Self::SessionNotFound {
                session_id,
                available,
            } => json!({ "session_id": session_id, "available_sessions": available }),
            Self::NodeNotFound {
                session_id,
                reference,
                available,
            } => json!({
                "session_id": session_id,
                "reference": reference,
                "available_nodes": available,
            }),
            Self::UnknownNodeType {
                node_type,
                supported,
            } => json!({ "node_type": node_type, "supported_types": supported }),
            Self::SessionNotActive { session_id, status } => {
                json!({ "session_id": session_id, "status": status })
            }
            Self::SessionExpired {
                session_id,
                expired_at,
            } => json!({
                "session_id": session_id,
                "expired_at": expired_at,
                "hint": "call draft_resume to continue this session",
            }),
            Self::EmptyWorkflow => json!({ "hint": "add a trigger node with draft_add_node" }),
            Self::MissingTrigger { node_types } => json!({
                "node_types": node_types,
                "hint": "add a manual_trigger, webhook or schedule node",
            }),
            Self::UnresolvedCredential { names, known } => {
                json!({ "unresolved": names, "known_credentials": known })
            }
            Self::InvalidConfig { field, reason } => json!({ "field": field, "reason": reason }),
            Self::OutputIndexOutOfRange(details) => {
                serde_json::to_value(details.as_ref()).unwrap_or(JsonValue::Null)
            }
            Self::SelfLoop { node } => json!({ "node": node }),
            Self::DuplicateConnection { from, to } => json!({ "from": from, "to": to }),
            Self::Compile(e) => e.details(),
            Self::CommitFailed(failure) => json!({
                "session_id": failure.session_id,
                "retry_count": failure.retry_count,
                "recovery_hint": failure.recovery_hint,
                "escalation": failure.escalation,
                "cause": failure.cause.to_json(),
            }),
            Self::Remote { operation, message } => {
                json!({ "operation": operation, "message": message })
            }
            Self::Store(e) => json!({ "message": e.to_string() }),
        }
    }

    /// `{code, category, message, details}`.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        json!({
            "code": self.code(),
            "category": self.category(),
            "message": self.to_string(),
            "details": self.details(),
        })
    }
}

impl fmt::Display for DraftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionNotFound { session_id, .. } => {
                write!(f, "draft session {session_id} not found")
            }
            Self::NodeNotFound {
                reference,
                available,
                ..
            } => {
                write!(
                    f,
                    "node '{reference}' not found; available nodes: {}",
                    available.join(", ")
                )
            }
            Self::UnknownNodeType {
                node_type,
                supported,
            } => {
                write!(
                    f,
                    "unknown node type '{node_type}'; supported types: {}",
                    supported.join(", ")
                )
            }
            Self::SessionNotActive { session_id, status } => {
                write!(f, "draft session {session_id} is {status}")
            }
            Self::SessionExpired {
                session_id,
                expired_at,
            } => {
                write!(
                    f,
                    "draft session {session_id} expired at {}; resume it first",
                    expired_at.to_rfc3339()
                )
            }
            Self::EmptyWorkflow => write!(f, "workflow has no nodes"),
            Self::MissingTrigger { .. } => write!(f, "workflow has no trigger node"),
            Self::UnresolvedCredential { names, .. } => {
                write!(f, "unresolved credentials: {}", names.join(", "))
            }
            Self::InvalidConfig { field, reason } => {
                write!(f, "invalid {field}: {reason}")
            }
            Self::OutputIndexOutOfRange(details) => {
                write!(
                    f,
                    "output {} of '{}' does not exist; valid outputs are {}. {}",
                    details.requested_output,
                    details.from,
                    details.valid_range,
                    details.explanation
                )
            }
            Self::SelfLoop { node } => write!(f, "cannot connect '{node}' to itself"),
            Self::DuplicateConnection { from, to } => {
                write!(f, "'{from}' is already connected to '{to}'")
            }
            Self::Compile(e) => write!(f, "compile failed: {e}"),
            Self::CommitFailed(failure) => {
                write!(
                    f,
                    "commit failed (attempt {}): {}",
                    failure.retry_count, failure.cause
                )
            }
            Self::Remote { operation, message } => {
                write!(f, "platform {operation} failed: {message}")
            }
            Self::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for DraftError {}

impl From<StoreError> for DraftError {
    fn from(error: StoreError) -> Self {
        Self::Store(error)
    }
}

impl From<CompileError> for DraftError {
    fn from(error: CompileError) -> Self {
        Self::Compile(error)
    }
}

impl From<SchemaError> for DraftError {
    fn from(error: SchemaError) -> Self {
        match error {
            SchemaError::UnknownNodeType {
                node_type,
                supported,
            } => Self::UnknownNodeType {
                node_type,
                supported,
            },
        }
    }
}
