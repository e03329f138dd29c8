//! Workflow compiler.
//!
//! Turns a draft, or a flat list of steps, into the platform payload.
//! Connection maps are grown per output index as connections are added;
//! a pre-filled single-slot array would route every branch to output 0.

use crate::draft::{DraftConnection, WorkflowDraft};
use flowwright_platform::{
    ConnectionMap, ConnectionTarget, CredentialRef, NodeConnections, WorkflowNode,
    WorkflowPayload, default_settings,
};
use flowwright_schema::NodeTypeRegistry;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::error::DraftError;

/// Errors from compiling a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// The draft lost its name; sessions always start with one.
    MissingName,
    /// Two nodes share a name; the connection map is keyed by name.
    DuplicateNodeName { name: String },
    /// A connection points at a node that is not in the draft.
    DanglingConnection { reference: String },
    /// A connection uses an output the source node does not have.
    OutputCardinality {
        node: String,
        expected_outputs: usize,
        max_used_output: usize,
    },
    /// A step's `next` names a step that does not exist.
    UnknownStepTarget { step: String, target: String },
}

impl CompileError {
    /// Returns true for errors that mean the stored draft is inconsistent.
    #[must_use]
    pub fn is_corrupted_state(&self) -> bool {
        matches!(self, Self::MissingName | Self::DanglingConnection { .. })
    }

    #[must_use]
    pub fn details(&self) -> JsonValue {
        match self {
            Self::MissingName => json!({ "field": "name" }),
            Self::DuplicateNodeName { name } => json!({ "name": name }),
            Self::DanglingConnection { reference } => json!({ "reference": reference }),
            Self::OutputCardinality {
                node,
                expected_outputs,
                max_used_output,
            } => json!({
                "node": node,
                "expected_outputs": expected_outputs,
                "max_used_output": max_used_output,
            }),
            Self::UnknownStepTarget { step, target } => json!({ "step": step, "target": target }),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingName => write!(f, "workflow name is empty; the session state is corrupted"),
            Self::DuplicateNodeName { name } => {
                write!(f, "more than one node is named '{name}'")
            }
            Self::DanglingConnection { reference } => {
                write!(f, "connection references missing node {reference}")
            }
            Self::OutputCardinality {
                node,
                expected_outputs,
                max_used_output,
            } => {
                write!(
                    f,
                    "'{node}' has {expected_outputs} output(s) but is wired from output {max_used_output}"
                )
            }
            Self::UnknownStepTarget { step, target } => {
                write!(f, "step '{step}' points to unknown step '{target}'")
            }
        }
    }
}

impl std::error::Error for CompileError {}

/// Compiles a draft into the platform payload.
///
/// `credentials` maps credential names to ids. Nodes whose credential name
/// is missing from the map are emitted without credentials; callers that
/// require every credential resolve names before compiling.
///
/// # Errors
///
/// Returns an error for an empty name, duplicate node names, dangling
/// connections or connections from outputs the source does not have.
pub fn compile(
    draft: &WorkflowDraft,
    credentials: &BTreeMap<String, String>,
    registry: &NodeTypeRegistry,
) -> Result<WorkflowPayload, CompileError> {
    if draft.name.trim().is_empty() {
        return Err(CompileError::MissingName);
    }

    let mut seen = HashSet::new();
    for node in &draft.nodes {
        if !seen.insert(node.name.as_str()) {
            return Err(CompileError::DuplicateNodeName {
                name: node.name.clone(),
            });
        }
    }

    let nodes = draft
        .nodes
        .iter()
        .map(|node| {
            let spec = registry.get(node.node_type);
            let node_type = spec.map_or_else(|| node.target_type.clone(), |s| s.target_type.to_string());
            let type_version = spec.map_or(node.type_version, |s| s.version);
            let credentials = spec
                .and_then(|s| s.credential_kind)
                .zip(node.credential.as_ref())
                .and_then(|(kind, name)| {
                    let id = credentials.get(name)?;
                    let reference = CredentialRef {
                        id: id.clone(),
                        name: name.clone(),
                    };
                    Some(BTreeMap::from([(kind.to_string(), reference)]))
                });
            WorkflowNode {
                id: node.id.to_string(),
                name: node.name.clone(),
                node_type,
                type_version,
                position: node.position,
                parameters: node.parameters.clone(),
                credentials,
            }
        })
        .collect();

    check_output_cardinality(draft)?;
    let connections = build_connections(draft)?;

    let settings = if draft.settings.is_empty() {
        default_settings()
    } else {
        JsonValue::Object(draft.settings.clone())
    };

    Ok(WorkflowPayload {
        name: draft.name.clone(),
        nodes,
        connections,
        settings,
    })
}

fn check_output_cardinality(draft: &WorkflowDraft) -> Result<(), CompileError> {
    let mut max_used: BTreeMap<_, usize> = BTreeMap::new();
    for connection in &draft.connections {
        let entry = max_used.entry(connection.from).or_insert(0);
        *entry = (*entry).max(connection.from_output);
    }

    for (id, max_used_output) in max_used {
        let Some(node) = draft.node(id) else {
            return Err(CompileError::DanglingConnection {
                reference: id.to_string(),
            });
        };
        if max_used_output >= node.expected_outputs {
            return Err(CompileError::OutputCardinality {
                node: node.name.clone(),
                expected_outputs: node.expected_outputs,
                max_used_output,
            });
        }
    }
    Ok(())
}

fn build_connections(draft: &WorkflowDraft) -> Result<ConnectionMap, CompileError> {
    let mut map = ConnectionMap::new();
    for DraftConnection {
        from,
        to,
        from_output,
        to_input,
    } in &draft.connections
    {
        let source = draft.node(*from).ok_or_else(|| CompileError::DanglingConnection {
            reference: from.to_string(),
        })?;
        let target = draft.node(*to).ok_or_else(|| CompileError::DanglingConnection {
            reference: to.to_string(),
        })?;
        map.entry(source.name.clone())
            .or_insert_with(NodeConnections::default)
            .push(*from_output, ConnectionTarget::main(&target.name, *to_input));
    }
    Ok(map)
}

/// One entry of a declarative step list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSpec {
    /// Simplified node type.
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub config: Map<String, JsonValue>,
    #[serde(default)]
    pub credential: Option<String>,
    /// Explicit targets, one per output port. Absent means "the next
    /// step"; empty means the step ends its branch.
    #[serde(default)]
    pub next: Option<Vec<String>>,
}

/// Builds a draft from a step list, inferring connections.
///
/// # Errors
///
/// Returns `UnknownNodeType` for unregistered types and a compile error
/// for `next` targets that name no step.
pub fn draft_from_steps(
    name: &str,
    steps: &[StepSpec],
    registry: &NodeTypeRegistry,
) -> Result<WorkflowDraft, DraftError> {
    let mut draft = WorkflowDraft::new(name);
    for step in steps {
        let spec = registry.resolve(&step.node_type)?;
        draft.add_node(
            spec,
            step.name.as_deref(),
            &step.config,
            step.credential.clone(),
        );
    }

    let mut connections = Vec::new();
    for (index, step) in steps.iter().enumerate() {
        let source = &draft.nodes[index];
        match &step.next {
            Some(targets) => {
                for (output, target) in targets.iter().enumerate() {
                    let target_node = draft.find_node(target).ok_or_else(|| {
                        CompileError::UnknownStepTarget {
                            step: source.name.clone(),
                            target: target.clone(),
                        }
                    })?;
                    connections.push(DraftConnection {
                        from: source.id,
                        to: target_node.id,
                        from_output: output,
                        to_input: 0,
                    });
                }
            }
            None => {
                if let Some(next) = draft.nodes.get(index + 1) {
                    connections.push(DraftConnection {
                        from: source.id,
                        to: next.id,
                        from_output: 0,
                        to_input: 0,
                    });
                }
            }
        }
    }
    draft.connections = connections;
    Ok(draft)
}

/// Compiles a step list straight into the platform payload.
///
/// # Errors
///
/// See [`draft_from_steps`] and [`compile`].
pub fn compile_steps(
    name: &str,
    steps: &[StepSpec],
    credentials: &BTreeMap<String, String>,
    registry: &NodeTypeRegistry,
) -> Result<WorkflowPayload, DraftError> {
    let draft = draft_from_steps(name, steps, registry)?;
    Ok(compile(&draft, credentials, registry)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowwright_schema::{NodeKind, NodeTypeSpec};

    fn registry() -> NodeTypeRegistry {
        NodeTypeRegistry::builtin()
    }

    fn spec(kind: NodeKind) -> NodeTypeSpec {
        registry().get(kind).cloned().expect("registered")
    }

    fn branching_draft() -> WorkflowDraft {
        let mut draft = WorkflowDraft::new("S1");
        let trigger = draft
            .add_node(&spec(NodeKind::ManualTrigger), None, &Map::new(), None)
            .id;
        let router = draft.add_node(&spec(NodeKind::If), Some("A"), &Map::new(), None).id;
        let b = draft.add_node(&spec(NodeKind::NoOp), Some("B"), &Map::new(), None).id;
        let c = draft.add_node(&spec(NodeKind::NoOp), Some("C"), &Map::new(), None).id;
        draft.connections = vec![
            DraftConnection { from: trigger, to: router, from_output: 0, to_input: 0 },
            DraftConnection { from: router, to: b, from_output: 0, to_input: 0 },
            DraftConnection { from: router, to: c, from_output: 1, to_input: 0 },
        ];
        draft
    }

    #[test]
    fn branches_land_on_their_own_outputs() {
        let payload = compile(&branching_draft(), &BTreeMap::new(), &registry()).expect("compile");
        let main = &payload.connections["A"].main;
        assert_eq!(main.len(), 2);
        assert_eq!(main[0], vec![ConnectionTarget::main("B", 0)]);
        assert_eq!(main[1], vec![ConnectionTarget::main("C", 0)]);
    }

    #[test]
    fn false_branch_alone_leaves_true_branch_empty() {
        let mut draft = branching_draft();
        draft.connections.remove(1);
        let payload = compile(&draft, &BTreeMap::new(), &registry()).expect("compile");
        let main = &payload.connections["A"].main;
        assert_eq!(main.len(), 2);
        assert!(main[0].is_empty());
    }

    #[test]
    fn nodes_carry_registry_types() {
        let payload = compile(&branching_draft(), &BTreeMap::new(), &registry()).expect("compile");
        let router = payload.nodes.iter().find(|n| n.name == "A").expect("router");
        assert_eq!(router.node_type, "n8n-nodes-base.if");
        assert!((router.type_version - 2.0).abs() < f64::EPSILON);
        assert_eq!(payload.settings["executionOrder"], "v1");
    }

    #[test]
    fn blank_name_is_a_corrupted_state() {
        let mut draft = branching_draft();
        draft.name = "  ".to_string();
        let err = compile(&draft, &BTreeMap::new(), &registry()).unwrap_err();
        assert_eq!(err, CompileError::MissingName);
        assert!(err.is_corrupted_state());
    }

    #[test]
    fn stale_output_index_is_caught() {
        let mut draft = branching_draft();
        draft.connections[2].from_output = 2;
        let err = compile(&draft, &BTreeMap::new(), &registry()).unwrap_err();
        assert_eq!(
            err,
            CompileError::OutputCardinality {
                node: "A".to_string(),
                expected_outputs: 2,
                max_used_output: 2,
            }
        );
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut draft = branching_draft();
        draft.nodes[3].name = "B".to_string();
        let err = compile(&draft, &BTreeMap::new(), &registry()).unwrap_err();
        assert_eq!(err, CompileError::DuplicateNodeName { name: "B".to_string() });
    }

    #[test]
    fn resolved_credentials_are_attached_by_kind() {
        let mut draft = WorkflowDraft::new("Notify");
        draft.add_node(&spec(NodeKind::ManualTrigger), None, &Map::new(), None);
        draft.add_node(
            &spec(NodeKind::Slack),
            None,
            &Map::new(),
            Some("Team Slack".to_string()),
        );
        let credentials = BTreeMap::from([("Team Slack".to_string(), "17".to_string())]);
        let payload = compile(&draft, &credentials, &registry()).expect("compile");
        let slack = &payload.nodes[1];
        let attached = slack.credentials.as_ref().expect("credentials");
        assert_eq!(attached["slackApi"].id, "17");
        assert!(payload.nodes[0].credentials.is_none());
    }

    fn step(node_type: &str, name: &str, next: Option<Vec<&str>>) -> StepSpec {
        StepSpec {
            node_type: node_type.to_string(),
            name: Some(name.to_string()),
            config: Map::new(),
            credential: None,
            next: next.map(|targets| targets.into_iter().map(String::from).collect()),
        }
    }

    #[test]
    fn steps_chain_by_default_and_fan_out_on_next() {
        let steps = vec![
            step("webhook", "Hook", None),
            step("if", "Check", Some(vec!["Yes", "No"])),
            step("set", "Yes", Some(vec![])),
            step("no_op", "No", None),
        ];
        let payload = compile_steps("Flow", &steps, &BTreeMap::new(), &registry()).expect("compile");
        assert_eq!(payload.connections["Hook"].main[0][0].node, "Check");
        assert_eq!(payload.connections["Check"].main[0][0].node, "Yes");
        assert_eq!(payload.connections["Check"].main[1][0].node, "No");
        assert!(!payload.connections.contains_key("Yes"));
        assert!(!payload.connections.contains_key("No"));
    }

    #[test]
    fn unknown_step_target_is_reported() {
        let steps = vec![step("manual_trigger", "Start", Some(vec!["Nowhere"]))];
        let err = compile_steps("Flow", &steps, &BTreeMap::new(), &registry()).unwrap_err();
        assert_eq!(err.code(), "COMPILE_FAILED");
    }

    #[test]
    fn unknown_step_type_lists_supported_types() {
        let steps = vec![step("ftp", "Upload", None)];
        let err = compile_steps("Flow", &steps, &BTreeMap::new(), &registry()).unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_NODE_TYPE");
    }

    #[test]
    fn too_many_next_targets_for_plain_node_fails() {
        let steps = vec![
            step("manual_trigger", "Start", Some(vec!["A", "B"])),
            step("no_op", "A", None),
            step("no_op", "B", None),
        ];
        let err = compile_steps("Flow", &steps, &BTreeMap::new(), &registry()).unwrap_err();
        assert!(matches!(
            err,
            DraftError::Compile(CompileError::OutputCardinality { .. })
        ));
    }
}
