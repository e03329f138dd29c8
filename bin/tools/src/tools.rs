//! JSON-in/JSON-out tool dispatch.
//!
//! Every tool takes one JSON object and returns one JSON value. Responses
//! are wrapped as `{"ok": true, "result": ...}` or
//! `{"ok": false, "error": {code, category, message, details}}`.

use flowwright_draft::{
    ConnectRequest, DraftBuilder, DraftError, NodeSpec, StepSpec,
};
use flowwright_platform::{ExecutionFilter, WorkflowPlatform};
use flowwright_schema::KnowledgeBase;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Every tool the host answers to.
pub const TOOLS: &[&str] = &[
    "draft_start",
    "draft_add_node",
    "draft_connect",
    "draft_preview",
    "draft_commit",
    "draft_discard",
    "draft_resume",
    "draft_status",
    "draft_list",
    "workflow_create_from_steps",
    "schema_list",
    "schema_get",
    "schema_validate",
    "quirks_check",
    "quirks_search",
    "workflow_get",
    "workflow_list",
    "workflow_activate",
    "workflow_deactivate",
    "workflow_delete",
    "credentials_list",
    "execution_get",
    "execution_list",
];

/// One line of input.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolRequest {
    pub tool: String,
    #[serde(default)]
    pub input: JsonValue,
}

/// Errors raised by the host itself rather than by a tool.
#[derive(Debug)]
pub enum ToolError {
    /// The request line was not a tool request.
    InvalidRequest { reason: String },
    /// No tool has this name.
    UnknownTool { name: String },
    /// The input did not fit the tool's shape.
    InvalidInput { tool: String, reason: String },
    /// A result could not be encoded.
    Encode { reason: String },
    /// The tool ran and failed.
    Draft(DraftError),
}

impl ToolError {
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Draft(error) => error.to_json(),
            Self::InvalidRequest { reason } => json!({
                "code": "INVALID_REQUEST",
                "category": "validation",
                "message": self.to_string(),
                "details": { "reason": reason, "expected": { "tool": "name", "input": {} } },
            }),
            Self::UnknownTool { name } => json!({
                "code": "UNKNOWN_TOOL",
                "category": "not_found",
                "message": self.to_string(),
                "details": { "tool": name, "available_tools": TOOLS },
            }),
            Self::InvalidInput { tool, reason } => json!({
                "code": "INVALID_INPUT",
                "category": "validation",
                "message": self.to_string(),
                "details": { "tool": tool, "reason": reason },
            }),
            Self::Encode { reason } => json!({
                "code": "ENCODE_FAILED",
                "category": "internal",
                "message": self.to_string(),
                "details": { "reason": reason },
            }),
        }
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRequest { reason } => write!(f, "invalid request: {reason}"),
            Self::UnknownTool { name } => write!(f, "unknown tool '{name}'"),
            Self::InvalidInput { tool, reason } => write!(f, "invalid input for {tool}: {reason}"),
            Self::Encode { reason } => write!(f, "failed to encode result: {reason}"),
            Self::Draft(error) => write!(f, "{error}"),
        }
    }
}

impl std::error::Error for ToolError {}

impl From<DraftError> for ToolError {
    fn from(error: DraftError) -> Self {
        Self::Draft(error)
    }
}

#[derive(Deserialize)]
struct StartInput {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    credentials: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct AddNodeInput {
    session_id: String,
    #[serde(flatten)]
    node: NodeSpec,
}

#[derive(Deserialize)]
struct ConnectInput {
    session_id: String,
    #[serde(flatten)]
    connection: ConnectRequest,
}

#[derive(Deserialize)]
struct SessionInput {
    session_id: String,
}

#[derive(Deserialize)]
struct CommitInput {
    session_id: String,
    #[serde(default)]
    activate: bool,
}

#[derive(Deserialize)]
struct ListInput {
    #[serde(default)]
    include_expired: bool,
}

#[derive(Deserialize)]
struct StepsInput {
    name: String,
    steps: Vec<StepSpec>,
    #[serde(default)]
    activate: bool,
    #[serde(default)]
    credentials: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct NodeTypeInput {
    node_type: String,
}

#[derive(Deserialize)]
struct ValidateInput {
    node_type: String,
    #[serde(default)]
    parameters: Option<JsonValue>,
    #[serde(default)]
    version: Option<f64>,
}

#[derive(Deserialize)]
struct SymptomsInput {
    #[serde(alias = "keywords")]
    symptoms: Vec<String>,
}

#[derive(Deserialize)]
struct WorkflowInput {
    workflow_id: String,
}

#[derive(Deserialize)]
struct ExecutionInput {
    execution_id: String,
}

#[derive(Deserialize)]
struct ExecutionListInput {
    #[serde(default)]
    workflow_id: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    limit: Option<u32>,
    #[serde(default)]
    include_data: bool,
}

/// Answers tool calls.
pub struct ToolHost {
    builder: DraftBuilder,
    platform: Arc<dyn WorkflowPlatform>,
    knowledge: Arc<KnowledgeBase>,
}

impl ToolHost {
    #[must_use]
    pub fn new(
        builder: DraftBuilder,
        platform: Arc<dyn WorkflowPlatform>,
        knowledge: Arc<KnowledgeBase>,
    ) -> Self {
        Self {
            builder,
            platform,
            knowledge,
        }
    }

    /// Handles one request line and returns the response envelope.
    pub async fn handle_line(&self, line: &str) -> JsonValue {
        match serde_json::from_str::<ToolRequest>(line) {
            Ok(request) => self.handle(request).await,
            Err(e) => respond(Err(ToolError::InvalidRequest {
                reason: e.to_string(),
            })),
        }
    }

    /// Runs a request and wraps the outcome.
    pub async fn handle(&self, request: ToolRequest) -> JsonValue {
        respond(self.call(&request.tool, request.input).await)
    }

    /// Runs one tool.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown tools, malformed input or a failed tool.
    #[instrument(skip(self, input))]
    pub async fn call(&self, tool: &str, input: JsonValue) -> Result<JsonValue, ToolError> {
        match tool {
            "draft_start" => {
                let input: StartInput = parse(tool, input)?;
                encode(
                    self.builder
                        .start(&input.name, input.description.as_deref(), input.credentials)
                        .await?,
                )
            }
            "draft_add_node" => {
                let input: AddNodeInput = parse(tool, input)?;
                encode(self.builder.add_node(&input.session_id, input.node).await?)
            }
            "draft_connect" => {
                let input: ConnectInput = parse(tool, input)?;
                encode(
                    self.builder
                        .connect(&input.session_id, input.connection)
                        .await?,
                )
            }
            "draft_preview" => {
                let input: SessionInput = parse(tool, input)?;
                encode(self.builder.preview(&input.session_id).await?)
            }
            "draft_commit" => {
                let input: CommitInput = parse(tool, input)?;
                encode(self.builder.commit(&input.session_id, input.activate).await?)
            }
            "draft_discard" => {
                let input: SessionInput = parse(tool, input)?;
                encode(self.builder.discard(&input.session_id).await?)
            }
            "draft_resume" => {
                let input: SessionInput = parse(tool, input)?;
                encode(self.builder.resume(&input.session_id).await?)
            }
            "draft_status" => {
                let input: SessionInput = parse(tool, input)?;
                let session = self.builder.status(&input.session_id).await?;
                encode(json!({
                    "session": session,
                    "retry_count": session.commit_failures(),
                }))
            }
            "draft_list" => {
                let input: ListInput = parse(tool, input)?;
                encode(self.builder.list(input.include_expired).await?)
            }
            "workflow_create_from_steps" => {
                let input: StepsInput = parse(tool, input)?;
                encode(
                    self.builder
                        .create_from_steps(&input.name, &input.steps, input.activate, input.credentials)
                        .await?,
                )
            }
            "schema_list" => encode(self.knowledge.list_schemas()),
            "schema_get" => {
                let input: NodeTypeInput = parse(tool, input)?;
                self.schema_get(&input.node_type)
            }
            "schema_validate" => {
                let input: ValidateInput = parse(tool, input)?;
                let kind = self.resolve_kind(&input.node_type)?;
                let parameters = input
                    .parameters
                    .unwrap_or_else(|| JsonValue::Object(Map::new()));
                encode(self.knowledge.validate(kind, &parameters, input.version))
            }
            "quirks_check" => {
                let input: ValidateInput = parse(tool, input)?;
                let kind = self.resolve_kind(&input.node_type)?;
                let quirks = match &input.parameters {
                    Some(parameters) => self.knowledge.detect_quirks(kind, parameters),
                    None => self.knowledge.quirks_for(kind),
                };
                encode(quirks)
            }
            "quirks_search" => {
                let input: SymptomsInput = parse(tool, input)?;
                encode(self.knowledge.search_by_symptom(&input.symptoms))
            }
            "workflow_get" => {
                let input: WorkflowInput = parse(tool, input)?;
                let result = self.platform.get_workflow(&input.workflow_id).await;
                encode(remote("get_workflow", result)?)
            }
            "workflow_list" => encode(remote("list_workflows", self.platform.list_workflows().await)?),
            "workflow_activate" => {
                let input: WorkflowInput = parse(tool, input)?;
                let result = self.platform.activate_workflow(&input.workflow_id).await;
                encode(remote("activate_workflow", result)?)
            }
            "workflow_deactivate" => {
                let input: WorkflowInput = parse(tool, input)?;
                let result = self.platform.deactivate_workflow(&input.workflow_id).await;
                encode(remote("deactivate_workflow", result)?)
            }
            "workflow_delete" => {
                let input: WorkflowInput = parse(tool, input)?;
                let result = self.platform.delete_workflow(&input.workflow_id).await;
                remote("delete_workflow", result)?;
                encode(json!({ "workflow_id": input.workflow_id, "deleted": true }))
            }
            "credentials_list" => {
                encode(remote("list_credentials", self.platform.list_credentials().await)?)
            }
            "execution_get" => {
                let input: ExecutionInput = parse(tool, input)?;
                let result = self.platform.get_execution(&input.execution_id).await;
                encode(remote("get_execution", result)?)
            }
            "execution_list" => {
                let input: ExecutionListInput = parse(tool, input)?;
                let filter = ExecutionFilter {
                    workflow_id: input.workflow_id,
                    status: input.status,
                    limit: input.limit,
                    include_data: input.include_data,
                };
                encode(remote("list_executions", self.platform.list_executions(&filter).await)?)
            }
            other => Err(ToolError::UnknownTool {
                name: other.to_string(),
            }),
        }
    }

    fn resolve_kind(&self, node_type: &str) -> Result<flowwright_schema::NodeKind, ToolError> {
        let spec = self
            .knowledge
            .registry()
            .resolve(node_type)
            .map_err(DraftError::from)?;
        Ok(spec.kind)
    }

    fn schema_get(&self, node_type: &str) -> Result<JsonValue, ToolError> {
        let kind = self.resolve_kind(node_type)?;
        let spec = self.knowledge.registry().get(kind);
        let schema = self.knowledge.schema(kind);
        encode(json!({
            "node_type": kind,
            "registry": spec,
            "formats": schema.map(|s| s.formats.as_slice()).unwrap_or_default(),
            "recommended": schema.and_then(|s| s.recommended()).map(|f| f.name),
            "quirks": self.knowledge.quirks_for(kind),
        }))
    }
}

fn parse<T: DeserializeOwned>(tool: &str, input: JsonValue) -> Result<T, ToolError> {
    let input = if input.is_null() {
        JsonValue::Object(Map::new())
    } else {
        input
    };
    serde_json::from_value(input).map_err(|e| ToolError::InvalidInput {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

fn encode<T: Serialize>(value: T) -> Result<JsonValue, ToolError> {
    serde_json::to_value(value).map_err(|e| ToolError::Encode {
        reason: e.to_string(),
    })
}

fn remote<T, E: fmt::Display>(operation: &'static str, result: Result<T, E>) -> Result<T, ToolError> {
    result.map_err(|e| {
        ToolError::Draft(DraftError::Remote {
            operation,
            message: e.to_string(),
        })
    })
}

fn respond(outcome: Result<JsonValue, ToolError>) -> JsonValue {
    match outcome {
        Ok(result) => json!({ "ok": true, "result": result }),
        Err(error) => {
            debug!(error = %error, "tool call failed");
            json!({ "ok": false, "error": error.to_json() })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use flowwright_draft::{BuilderConfig, InMemorySessionStore};
    use flowwright_platform::{
        Credential, Execution, PlatformError, RemoteWorkflow, WorkflowPayload,
    };

    type PlatformResult<T> = flowwright_core::Result<T, PlatformError>;

    /// Accepts every workflow; knows no executions.
    struct StubPlatform;

    fn workflow(id: &str, name: &str, active: bool) -> RemoteWorkflow {
        RemoteWorkflow {
            id: id.to_string(),
            name: name.to_string(),
            active,
            nodes: Vec::new(),
            connections: Default::default(),
            created_at: None,
            updated_at: None,
        }
    }

    #[async_trait]
    impl WorkflowPlatform for StubPlatform {
        async fn create_workflow(&self, payload: &WorkflowPayload) -> PlatformResult<RemoteWorkflow> {
            Ok(workflow("101", &payload.name, false))
        }

        async fn update_workflow(
            &self,
            id: &str,
            payload: &WorkflowPayload,
        ) -> PlatformResult<RemoteWorkflow> {
            Ok(workflow(id, &payload.name, false))
        }

        async fn activate_workflow(&self, id: &str) -> PlatformResult<RemoteWorkflow> {
            Ok(workflow(id, "stub", true))
        }

        async fn deactivate_workflow(&self, id: &str) -> PlatformResult<RemoteWorkflow> {
            Ok(workflow(id, "stub", false))
        }

        async fn delete_workflow(&self, _id: &str) -> PlatformResult<()> {
            Ok(())
        }

        async fn get_workflow(&self, id: &str) -> PlatformResult<RemoteWorkflow> {
            Ok(workflow(id, "stub", false))
        }

        async fn list_workflows(&self) -> PlatformResult<Vec<RemoteWorkflow>> {
            Ok(vec![workflow("101", "stub", true)])
        }

        async fn list_credentials(&self) -> PlatformResult<Vec<Credential>> {
            Ok(Vec::new())
        }

        async fn get_execution(&self, id: &str) -> PlatformResult<Execution> {
            Err(PlatformError::NotFound {
                resource: format!("execution {id}"),
            }
            .into())
        }

        async fn list_executions(&self, _filter: &ExecutionFilter) -> PlatformResult<Vec<Execution>> {
            Ok(Vec::new())
        }
    }

    fn host() -> ToolHost {
        let knowledge = Arc::new(KnowledgeBase::builtin());
        let platform: Arc<dyn WorkflowPlatform> = Arc::new(StubPlatform);
        let builder = DraftBuilder::new(
            Arc::new(InMemorySessionStore::default()),
            platform.clone(),
            knowledge.clone(),
            BuilderConfig::default(),
        );
        ToolHost::new(builder, platform, knowledge)
    }

    async fn ok(host: &ToolHost, tool: &str, input: JsonValue) -> JsonValue {
        let response = host
            .handle(ToolRequest {
                tool: tool.to_string(),
                input,
            })
            .await;
        assert_eq!(response["ok"], true, "{tool} failed: {response}");
        response["result"].clone()
    }

    #[tokio::test]
    async fn builds_and_commits_through_tools() {
        let host = host();
        let session = ok(&host, "draft_start", json!({ "name": "S1" })).await;
        let id = session["session_id"].as_str().expect("id").to_string();

        ok(&host, "draft_add_node", json!({ "session_id": id, "type": "manual_trigger", "name": "Start" })).await;
        ok(&host, "draft_add_node", json!({ "session_id": id, "type": "if", "name": "Check" })).await;
        ok(&host, "draft_add_node", json!({ "session_id": id, "type": "no_op", "name": "Yes" })).await;
        ok(&host, "draft_add_node", json!({ "session_id": id, "type": "no_op", "name": "No" })).await;
        ok(&host, "draft_connect", json!({ "session_id": id, "from": "Start", "to": "Check" })).await;
        ok(&host, "draft_connect", json!({ "session_id": id, "from": "Check", "to": "Yes" })).await;
        ok(&host, "draft_connect", json!({ "session_id": id, "from": "Check", "to": "No", "from_output": 1 })).await;

        let preview = ok(&host, "draft_preview", json!({ "session_id": id })).await;
        assert_eq!(preview["valid"], true, "{preview}");
        assert_eq!(preview["summary"]["nodes_count"], 4);

        let status = ok(&host, "draft_status", json!({ "session_id": id })).await;
        assert_eq!(status["retry_count"], 0);
        assert_eq!(status["session"]["status"], "active");

        let committed = ok(&host, "draft_commit", json!({ "session_id": id, "activate": true })).await;
        assert_eq!(committed["workflow_id"], "101");
        assert_eq!(committed["active"], true);

        let listed = ok(&host, "draft_list", json!({ "include_expired": true })).await;
        assert_eq!(listed, json!([]));
    }

    #[tokio::test]
    async fn connect_errors_carry_a_corrected_call() {
        let host = host();
        let session = ok(&host, "draft_start", json!({ "name": "S1" })).await;
        let id = session["session_id"].as_str().expect("id").to_string();
        ok(&host, "draft_add_node", json!({ "session_id": id, "type": "if", "name": "Check" })).await;
        ok(&host, "draft_add_node", json!({ "session_id": id, "type": "no_op", "name": "A" })).await;

        let response = host
            .handle_line(&json!({ "tool": "draft_connect", "input": { "session_id": id, "from": "Check", "to": "A", "from_output": 2 } }).to_string())
            .await;
        assert_eq!(response["ok"], false);
        let error = &response["error"];
        assert_eq!(error["code"], "OUTPUT_INDEX_OUT_OF_RANGE");
        assert_eq!(error["category"], "validation");
        assert_eq!(error["details"]["valid_range"], "0 to 1");
        assert_eq!(error["details"]["corrected_call"]["from_output"], 1);
    }

    #[tokio::test]
    async fn unknown_tools_and_bad_input_are_reported() {
        let host = host();
        let response = host.handle_line(r#"{"tool": "draft_explode"}"#).await;
        assert_eq!(response["error"]["code"], "UNKNOWN_TOOL");
        assert_eq!(response["error"]["category"], "not_found");

        let response = host.handle_line(r#"{"tool": "draft_start", "input": {}}"#).await;
        assert_eq!(response["error"]["code"], "INVALID_INPUT");

        let response = host.handle_line("not json").await;
        assert_eq!(response["error"]["code"], "INVALID_REQUEST");
    }

    #[tokio::test]
    async fn knowledge_tools_answer_without_a_session() {
        let host = host();
        let schemas = ok(&host, "schema_list", JsonValue::Null).await;
        assert_eq!(schemas.as_array().map(Vec::len), Some(16));

        let schema = ok(&host, "schema_get", json!({ "node_type": "if" })).await;
        assert_eq!(schema["recommended"], "conditions_v2");

        let validation = ok(
            &host,
            "schema_validate",
            json!({ "node_type": "switch", "parameters": { "rules": { "rules": [] } } }),
        )
        .await;
        assert_eq!(validation["matched_format"], "rules_rules_v2");

        let all = ok(&host, "quirks_check", json!({ "node_type": "switch" })).await;
        let triggered = ok(
            &host,
            "quirks_check",
            json!({ "node_type": "switch", "parameters": { "options": { "fallbackOutput": "extra" } } }),
        )
        .await;
        assert!(all.as_array().map_or(0, Vec::len) > triggered.as_array().map_or(0, Vec::len));
        assert_eq!(triggered[0]["id"], "switch-fallback-extra-output");

        let found = ok(&host, "quirks_search", json!({ "symptoms": ["FALSE BRANCH"] })).await;
        assert!(
            found
                .as_array()
                .expect("list")
                .iter()
                .any(|quirk| quirk["id"] == "branch-single-slot-connections")
        );
    }

    #[tokio::test]
    async fn platform_failures_become_remote_errors() {
        let host = host();
        let response = host
            .handle(ToolRequest {
                tool: "execution_get".to_string(),
                input: json!({ "execution_id": "9" }),
            })
            .await;
        assert_eq!(response["error"]["code"], "REMOTE_FAILED");
        assert_eq!(response["error"]["category"], "remote");

        let workflows = ok(&host, "workflow_list", JsonValue::Null).await;
        assert_eq!(workflows[0]["id"], "101");
    }
}
