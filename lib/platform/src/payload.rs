//! Wire types for the platform's REST API.
//!
//! `WorkflowPayload` is both what the compiler produces and what
//! create/update accept, so a compiled draft is sent unchanged.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Connection type used for every data connection.
pub const MAIN_CONNECTION: &str = "main";

/// One end of a connection: the target node and its input index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTarget {
    pub node: String,
    #[serde(rename = "type")]
    pub connection_type: String,
    pub index: usize,
}

impl ConnectionTarget {
    /// A `main` connection into input `index` of `node`.
    #[must_use]
    pub fn main(node: impl Into<String>, index: usize) -> Self {
        Self {
            node: node.into(),
            connection_type: MAIN_CONNECTION.to_string(),
            index,
        }
    }
}

/// Outgoing connections of one node.
///
/// `main[i]` lists the targets wired to output port `i`. The array only
/// grows as far as the highest used port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConnections {
    #[serde(default)]
    pub main: Vec<Vec<ConnectionTarget>>,
}

impl NodeConnections {
    /// Appends `target` to output port `output`, growing the port list
    /// only as far as needed.
    pub fn push(&mut self, output: usize, target: ConnectionTarget) {
        if self.main.len() <= output {
            self.main.resize_with(output + 1, Vec::new);
        }
        self.main[output].push(target);
    }

    /// Highest output port with at least one target.
    #[must_use]
    pub fn max_used_output(&self) -> Option<usize> {
        self.main.iter().rposition(|targets| !targets.is_empty())
    }
}

/// Connection map keyed by source node name.
pub type ConnectionMap = BTreeMap<String, NodeConnections>;

/// Credential attached to a node, keyed by credential kind in the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRef {
    pub id: String,
    pub name: String,
}

/// A node as stored by the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub type_version: f64,
    pub position: [i64; 2],
    #[serde(default)]
    pub parameters: JsonValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<BTreeMap<String, CredentialRef>>,
}

/// Body of create and update calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowPayload {
    pub name: String,
    pub nodes: Vec<WorkflowNode>,
    pub connections: ConnectionMap,
    #[serde(default = "default_settings")]
    pub settings: JsonValue,
}

/// Settings sent when the caller supplies none.
#[must_use]
pub fn default_settings() -> JsonValue {
    serde_json::json!({ "executionOrder": "v1" })
}

fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match JsonValue::deserialize(deserializer)? {
        JsonValue::String(s) => Ok(s),
        JsonValue::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

fn optional_id_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<JsonValue>::deserialize(deserializer)? {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::String(s)) => Ok(Some(s)),
        Some(JsonValue::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

/// A workflow as returned by the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteWorkflow {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub nodes: Vec<WorkflowNode>,
    #[serde(default)]
    pub connections: ConnectionMap,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// A stored credential. Secrets are never returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub credential_type: String,
}

/// One workflow execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default, deserialize_with = "optional_id_string")]
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub finished: bool,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub stopped_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
}

/// Filter for listing executions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionFilter {
    #[serde(default)]
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub include_data: bool,
}

/// Paged list envelope used by every list endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Page<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn push_grows_ports_sparsely() {
        let mut connections = NodeConnections::default();
        connections.push(1, ConnectionTarget::main("False", 0));
        assert_eq!(connections.main.len(), 2);
        assert!(connections.main[0].is_empty());
        connections.push(0, ConnectionTarget::main("True", 0));
        assert_eq!(connections.main.len(), 2);
        assert_eq!(connections.main[0][0].node, "True");
        assert_eq!(connections.max_used_output(), Some(1));
    }

    #[test]
    fn node_serializes_with_platform_keys() {
        let node = WorkflowNode {
            id: "n1".to_string(),
            name: "If".to_string(),
            node_type: "n8n-nodes-base.if".to_string(),
            type_version: 2.0,
            position: [250, 300],
            parameters: json!({}),
            credentials: None,
        };
        let value = serde_json::to_value(&node).expect("serialize");
        assert_eq!(value["type"], "n8n-nodes-base.if");
        assert_eq!(value["typeVersion"], 2.0);
        assert!(value.get("credentials").is_none());
    }

    #[test]
    fn connection_target_uses_type_key() {
        let value = serde_json::to_value(ConnectionTarget::main("B", 0)).expect("serialize");
        assert_eq!(value, json!({ "node": "B", "type": "main", "index": 0 }));
    }

    #[test]
    fn numeric_ids_are_accepted() {
        let execution: Execution = serde_json::from_value(json!({
            "id": 42,
            "workflowId": "wf1",
            "finished": true,
            "status": "success"
        }))
        .expect("deserialize");
        assert_eq!(execution.id, "42");
        assert_eq!(execution.workflow_id.as_deref(), Some("wf1"));
    }

    #[test]
    fn remote_workflow_tolerates_missing_fields() {
        let workflow: RemoteWorkflow =
            serde_json::from_value(json!({ "id": "abc", "name": "S1" })).expect("deserialize");
        assert!(!workflow.active);
        assert!(workflow.nodes.is_empty());
    }
}
