//! The draft builder: session commands over a store and a platform.
//!
//! Each command loads the session, applies one change and writes it back
//! with a single `update`. Commands against one session are expected to
//! arrive one at a time; different sessions never share mutable state.

use crate::compiler::{self, StepSpec};
use crate::config::BuilderConfig;
use crate::draft::{DraftConnection, DraftNode, WorkflowDraft};
use crate::error::{CommitFailure, DraftError, ExistingConnection, OutputIndexError};
use crate::preview::{self, PreviewReport};
use crate::session::{COMMIT_FAILED, DraftSession, SessionStatus};
use crate::store::{SessionStore, SessionSummary};
use flowwright_core::{NodeId, SessionId};
use flowwright_platform::{WorkflowPayload, WorkflowPlatform};
use flowwright_schema::{KnowledgeBase, NodeKind, QuirkSeverity, ValidationResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// A node to add.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Simplified node type, e.g. `if` or `http_request`.
    #[serde(rename = "type", alias = "node_type")]
    pub node_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub config: Map<String, JsonValue>,
    /// Credential name the node authenticates with.
    #[serde(default)]
    pub credential: Option<String>,
}

/// A connection to add. Endpoints are node ids or names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectRequest {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub from_output: usize,
    #[serde(default)]
    pub to_input: usize,
}

/// A quirk detected in a node's parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuirkNotice {
    pub id: &'static str,
    pub title: &'static str,
    pub severity: QuirkSeverity,
    pub workaround: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddNodeResult {
    pub session_id: SessionId,
    pub node_id: NodeId,
    pub name: String,
    pub node_type: NodeKind,
    pub target_type: String,
    pub type_version: f64,
    pub position: [i64; 2],
    pub expected_outputs: usize,
    /// Advisory only; a failed validation never blocks the add.
    pub validation: ValidationResult,
    pub quirks: Vec<QuirkNotice>,
    pub nodes_count: usize,
    pub next_step: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectResult {
    pub session_id: SessionId,
    pub from: String,
    pub to: String,
    pub from_output: usize,
    pub to_input: usize,
    pub connections_count: usize,
}

/// Outcome of a successful commit or step-list creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitResult {
    pub workflow_id: String,
    pub name: String,
    pub active: bool,
    pub nodes_count: usize,
    pub connections_count: usize,
    /// Problems that did not fail the commit, such as a failed activation.
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscardResult {
    pub session_id: String,
    /// False when the session was already gone.
    pub discarded: bool,
}

/// Runs draft commands.
pub struct DraftBuilder {
    store: Arc<dyn SessionStore>,
    platform: Arc<dyn WorkflowPlatform>,
    knowledge: Arc<KnowledgeBase>,
    config: BuilderConfig,
}

impl DraftBuilder {
    #[must_use]
    pub fn new(
        store: Arc<dyn SessionStore>,
        platform: Arc<dyn WorkflowPlatform>,
        knowledge: Arc<KnowledgeBase>,
        config: BuilderConfig,
    ) -> Self {
        Self {
            store,
            platform,
            knowledge,
            config,
        }
    }

    #[must_use]
    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    /// Starts a session for a new workflow.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for a blank name and `Store` if the session
    /// cannot be saved.
    #[instrument(skip(self, credentials))]
    pub async fn start(
        &self,
        name: &str,
        description: Option<&str>,
        credentials: BTreeMap<String, String>,
    ) -> Result<SessionSummary, DraftError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DraftError::InvalidConfig {
                field: "name".to_string(),
                reason: "workflow name must not be blank".to_string(),
            });
        }

        let mut draft = WorkflowDraft::new(name);
        if let Some(description) = description.map(str::trim).filter(|d| !d.is_empty()) {
            draft = draft.with_description(description);
        }
        let mut session = DraftSession::new(draft, self.config.ttl()).with_credentials(credentials);
        session.record("start", json!({ "name": name }));
        self.store.create(&session).await?;

        info!(session_id = %session.id(), "started draft session");
        Ok(SessionSummary::from(&session))
    }

    /// Adds a node to an active session.
    ///
    /// # Errors
    ///
    /// Fails if the session is missing or not active, or the node type is
    /// unknown. Parameter validation problems are reported in the result.
    #[instrument(skip(self, spec), fields(node_type = %spec.node_type))]
    pub async fn add_node(&self, session: &str, spec: NodeSpec) -> Result<AddNodeResult, DraftError> {
        let mut session = self.load_active(session).await?;
        let type_spec = self.knowledge.registry().resolve(&spec.node_type)?;

        let node = session
            .draft_mut()
            .add_node(type_spec, spec.name.as_deref(), &spec.config, spec.credential)
            .clone();
        let validation =
            self.knowledge
                .validate(node.node_type, &node.parameters, Some(node.type_version));
        let quirks = self
            .knowledge
            .detect_quirks(node.node_type, &node.parameters)
            .into_iter()
            .map(|quirk| QuirkNotice {
                id: quirk.id,
                title: quirk.title,
                severity: quirk.severity,
                workaround: quirk.workaround,
            })
            .collect();

        session.record(
            "add_node",
            json!({ "node_id": node.id, "name": node.name, "type": node.node_type }),
        );
        session.extend(self.config.ttl());
        self.store.update(&session).await?;

        if !validation.valid {
            debug!(node = %node.name, errors = ?validation.errors, "added node with invalid parameters");
        }

        let draft = session.draft();
        Ok(AddNodeResult {
            session_id: session.id(),
            node_id: node.id,
            next_step: next_step_after_add(draft.has_trigger(), draft.nodes.len(), &node),
            name: node.name,
            node_type: node.node_type,
            target_type: node.target_type,
            type_version: node.type_version,
            position: node.position,
            expected_outputs: node.expected_outputs,
            validation,
            quirks,
            nodes_count: draft.nodes.len(),
        })
    }

    /// Connects two nodes of an active session.
    ///
    /// # Errors
    ///
    /// Fails for unknown endpoints, self-loops, duplicate connections and
    /// output indexes the source node does not have. The output index
    /// error carries a corrected call.
    #[instrument(skip(self, request), fields(from = %request.from, to = %request.to))]
    pub async fn connect(
        &self,
        session: &str,
        request: ConnectRequest,
    ) -> Result<ConnectResult, DraftError> {
        let mut session = self.load_active(session).await?;
        let draft = session.draft();

        let resolve = |reference: &str| {
            draft
                .find_node(reference)
                .cloned()
                .ok_or_else(|| DraftError::NodeNotFound {
                    session_id: session.id(),
                    reference: reference.to_string(),
                    available: draft.node_names(),
                })
        };
        let source = resolve(&request.from)?;
        let target = resolve(&request.to)?;

        if source.id == target.id {
            return Err(DraftError::SelfLoop { node: source.name });
        }

        if request.from_output >= source.expected_outputs {
            return Err(self.output_index_error(&session, &source, &target, &request));
        }

        if draft.has_connection(source.id, target.id) {
            return Err(DraftError::DuplicateConnection {
                from: source.name,
                to: target.name,
            });
        }

        session.draft_mut().connections.push(DraftConnection {
            from: source.id,
            to: target.id,
            from_output: request.from_output,
            to_input: request.to_input,
        });
        session.record(
            "connect",
            json!({
                "from": source.name,
                "to": target.name,
                "from_output": request.from_output,
                "to_input": request.to_input,
            }),
        );
        session.extend(self.config.ttl());
        self.store.update(&session).await?;

        Ok(ConnectResult {
            session_id: session.id(),
            from: source.name,
            to: target.name,
            from_output: request.from_output,
            to_input: request.to_input,
            connections_count: session.draft().connections.len(),
        })
    }

    fn output_index_error(
        &self,
        session: &DraftSession,
        source: &DraftNode,
        target: &DraftNode,
        request: &ConnectRequest,
    ) -> DraftError {
        let draft = session.draft();
        let suggested_output = source.max_output();
        let existing_connections = draft
            .connections_from(source.id)
            .map(|connection| ExistingConnection {
                to: draft
                    .node(connection.to)
                    .map_or_else(|| connection.to.to_string(), |node| node.name.clone()),
                from_output: connection.from_output,
                to_input: connection.to_input,
                valid: connection.from_output < source.expected_outputs,
            })
            .collect();

        DraftError::OutputIndexOutOfRange(Box::new(OutputIndexError {
            session_id: session.id(),
            from: source.name.clone(),
            to: target.name.clone(),
            node_type: source.node_type,
            requested_output: request.from_output,
            expected_outputs: source.expected_outputs,
            valid_range: format!("0 to {suggested_output}"),
            explanation: OutputIndexError::explain(
                source.node_type,
                &source.name,
                source.expected_outputs,
            ),
            suggested_output,
            corrected_call: json!({
                "session_id": session.id(),
                "from": source.name,
                "to": target.name,
                "from_output": suggested_output,
                "to_input": request.to_input,
            }),
            existing_connections,
        }))
    }

    /// Checks the draft without changing it. Expired sessions can be
    /// previewed.
    ///
    /// # Errors
    ///
    /// Fails only if the session cannot be loaded.
    pub async fn preview(&self, session: &str) -> Result<PreviewReport, DraftError> {
        let session = self.load(session).await?;
        Ok(preview::preview(
            session.draft(),
            session.credentials(),
            &self.knowledge,
        ))
    }

    /// Compiles the draft, creates the remote workflow and deletes the
    /// session.
    ///
    /// On failure the session is kept: the attempt is logged, the expiry
    /// is extended and the error carries the retry count.
    ///
    /// # Errors
    ///
    /// Returns `CommitFailed` wrapping the cause, or a load error if the
    /// session is missing or not active.
    #[instrument(skip(self))]
    pub async fn commit(&self, session: &str, activate: bool) -> Result<CommitResult, DraftError> {
        let mut session = self.load_active(session).await?;
        let id = session.id();

        match self.try_commit(&mut session, activate).await {
            Ok(result) => {
                session.mark_committed();
                session.record("commit", json!({ "workflow_id": result.workflow_id }));
                self.store.update(&session).await?;
                self.store.delete(id).await?;
                info!(session_id = %id, workflow_id = %result.workflow_id, "committed draft");
                Ok(result)
            }
            Err(cause) => {
                let retry_count = session.commit_failures() + 1;
                session.record(
                    COMMIT_FAILED,
                    json!({ "retry_count": retry_count, "error": cause.to_json() }),
                );
                session.extend(self.config.ttl());
                self.store.update(&session).await?;
                warn!(session_id = %id, retry_count, error = %cause, "commit failed; session kept");
                Err(DraftError::CommitFailed(Box::new(CommitFailure::new(
                    id,
                    retry_count,
                    cause,
                    self.config.escalation_threshold,
                ))))
            }
        }
    }

    async fn try_commit(
        &self,
        session: &mut DraftSession,
        activate: bool,
    ) -> Result<CommitResult, DraftError> {
        let draft = session.draft();
        if draft.is_empty() {
            return Err(DraftError::EmptyWorkflow);
        }
        if !draft.has_trigger() {
            return Err(DraftError::MissingTrigger {
                node_types: draft
                    .nodes
                    .iter()
                    .map(|node| node.node_type.to_string())
                    .collect(),
            });
        }

        let needed: Vec<String> = draft
            .nodes
            .iter()
            .filter_map(|node| node.credential.clone())
            .collect();
        let resolved = self.resolve_credentials(needed, session.credentials()).await?;
        for (name, id) in resolved {
            session.add_credential(name, id);
        }

        let payload = compiler::compile(
            session.draft(),
            session.credentials(),
            self.knowledge.registry(),
        )?;
        self.publish(&payload, activate).await
    }

    /// Looks up credential names missing from `known` on the platform.
    /// Returns the newly resolved name to id pairs.
    async fn resolve_credentials(
        &self,
        needed: Vec<String>,
        known: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, String>, DraftError> {
        let mut missing: Vec<String> = needed
            .into_iter()
            .filter(|name| !known.contains_key(name))
            .collect();
        missing.sort();
        missing.dedup();
        if missing.is_empty() {
            return Ok(BTreeMap::new());
        }

        let remote = self
            .platform
            .list_credentials()
            .await
            .map_err(|e| DraftError::Remote {
                operation: "list_credentials",
                message: e.to_string(),
            })?;

        let mut resolved = BTreeMap::new();
        let mut unresolved = Vec::new();
        for name in missing {
            match remote.iter().find(|credential| credential.name == name) {
                Some(credential) => {
                    resolved.insert(name, credential.id.clone());
                }
                None => unresolved.push(name),
            }
        }

        if unresolved.is_empty() {
            Ok(resolved)
        } else {
            let mut known: Vec<String> = known.keys().cloned().collect();
            known.extend(remote.into_iter().map(|credential| credential.name));
            Err(DraftError::UnresolvedCredential {
                names: unresolved,
                known,
            })
        }
    }

    /// Creates the workflow and optionally activates it. A failed
    /// activation is reported as a warning.
    async fn publish(
        &self,
        payload: &WorkflowPayload,
        activate: bool,
    ) -> Result<CommitResult, DraftError> {
        let created = self
            .platform
            .create_workflow(payload)
            .await
            .map_err(|e| DraftError::Remote {
                operation: "create_workflow",
                message: e.to_string(),
            })?;

        let mut warnings = Vec::new();
        let mut active = created.active;
        if activate && !self.config.activation_enabled {
            warnings.push("activation is disabled; the workflow was created inactive".to_string());
        } else if activate {
            match self.platform.activate_workflow(&created.id).await {
                Ok(activated) => active = activated.active,
                Err(e) => {
                    warn!(workflow_id = %created.id, error = %e, "workflow created but activation failed");
                    warnings.push(format!("workflow created but activation failed: {e}"));
                }
            }
        }

        Ok(CommitResult {
            workflow_id: created.id,
            name: created.name,
            active,
            nodes_count: payload.nodes.len(),
            connections_count: payload
                .connections
                .values()
                .flat_map(|connections| connections.main.iter())
                .map(Vec::len)
                .sum(),
            warnings,
        })
    }

    /// Deletes a session. A session that is already gone is not an error.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the backend fails.
    #[instrument(skip(self))]
    pub async fn discard(&self, session: &str) -> Result<DiscardResult, DraftError> {
        let Ok(id) = session.trim().parse::<SessionId>() else {
            return Ok(DiscardResult {
                session_id: session.to_string(),
                discarded: false,
            });
        };

        let discarded = self.store.get(id).await?.is_some();
        self.store.delete(id).await?;
        debug!(session_id = %id, discarded, "discard");
        Ok(DiscardResult {
            session_id: id.to_string(),
            discarded,
        })
    }

    /// Reactivates an expired session with a fresh expiry.
    ///
    /// # Errors
    ///
    /// Fails if the session is missing, committed or discarded.
    #[instrument(skip(self))]
    pub async fn resume(&self, session: &str) -> Result<SessionSummary, DraftError> {
        let mut session = self.load(session).await?;
        let previous = session.status();
        session
            .resume(self.config.ttl())
            .map_err(|status| DraftError::SessionNotActive {
                session_id: session.id(),
                status,
            })?;
        session.record("resume", json!({ "previous_status": previous }));
        self.store.update(&session).await?;
        Ok(SessionSummary::from(&session))
    }

    /// The full session, labelled `expired` when past its expiry.
    ///
    /// # Errors
    ///
    /// Fails if the session cannot be loaded.
    pub async fn status(&self, session: &str) -> Result<DraftSession, DraftError> {
        self.load(session).await
    }

    /// # Errors
    ///
    /// Returns `Store` if the backend fails.
    pub async fn list(&self, include_expired: bool) -> Result<Vec<SessionSummary>, DraftError> {
        Ok(self.store.list(include_expired).await?)
    }

    /// Compiles a step list and creates the workflow without a session.
    ///
    /// # Errors
    ///
    /// Fails for a blank name, unknown node types or step targets,
    /// unresolved credentials and remote failures.
    #[instrument(skip(self, steps, credentials), fields(steps = steps.len()))]
    pub async fn create_from_steps(
        &self,
        name: &str,
        steps: &[StepSpec],
        activate: bool,
        credentials: BTreeMap<String, String>,
    ) -> Result<CommitResult, DraftError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DraftError::InvalidConfig {
                field: "name".to_string(),
                reason: "workflow name must not be blank".to_string(),
            });
        }

        let draft = compiler::draft_from_steps(name, steps, self.knowledge.registry())?;
        if draft.is_empty() {
            return Err(DraftError::EmptyWorkflow);
        }
        if !draft.has_trigger() {
            return Err(DraftError::MissingTrigger {
                node_types: steps.iter().map(|step| step.node_type.clone()).collect(),
            });
        }

        let needed = steps.iter().filter_map(|step| step.credential.clone()).collect();
        let mut credentials = credentials;
        let resolved = self.resolve_credentials(needed, &credentials).await?;
        credentials.extend(resolved);

        let payload = compiler::compile(&draft, &credentials, self.knowledge.registry())?;
        let result = self.publish(&payload, activate).await?;
        info!(workflow_id = %result.workflow_id, "created workflow from steps");
        Ok(result)
    }

    async fn load(&self, reference: &str) -> Result<DraftSession, DraftError> {
        let found = match reference.trim().parse::<SessionId>() {
            Ok(id) => self.store.get(id).await?,
            Err(_) => None,
        };
        match found {
            Some(session) => Ok(session),
            None => Err(DraftError::SessionNotFound {
                session_id: reference.to_string(),
                available: self.available_sessions().await,
            }),
        }
    }

    async fn load_active(&self, reference: &str) -> Result<DraftSession, DraftError> {
        let session = self.load(reference).await?;
        match session.status() {
            SessionStatus::Active => Ok(session),
            SessionStatus::Expired => Err(DraftError::SessionExpired {
                session_id: session.id(),
                expired_at: session.expires_at(),
            }),
            status => Err(DraftError::SessionNotActive {
                session_id: session.id(),
                status,
            }),
        }
    }

    async fn available_sessions(&self) -> Vec<String> {
        match self.store.list(false).await {
            Ok(summaries) => summaries
                .into_iter()
                .map(|summary| summary.session_id.to_string())
                .collect(),
            Err(e) => {
                warn!(error = %e, "could not list sessions");
                Vec::new()
            }
        }
    }
}

fn next_step_after_add(has_trigger: bool, nodes_count: usize, node: &DraftNode) -> String {
    if !has_trigger {
        return "add a trigger node (manual_trigger, webhook or schedule) so the workflow can run"
            .to_string();
    }
    if nodes_count == 1 {
        return format!("add the next node, then connect '{}' to it", node.name);
    }
    if node.expected_outputs > 1 {
        return format!(
            "connect into '{}', then wire its outputs 0 to {} with draft_connect",
            node.name,
            node.max_output()
        );
    }
    format!(
        "connect '{}' with draft_connect, or call draft_preview to check the graph",
        node.name
    )
}
