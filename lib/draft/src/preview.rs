//! Read-only structural check of a draft.
//!
//! Preview never mutates the session. Errors here are the problems that
//! would make a commit fail or produce a broken workflow; warnings are
//! graph hygiene and editor-compatibility advice.

use crate::draft::{DraftNode, WorkflowDraft};
use crate::graph::DraftGraph;
use flowwright_core::NodeId;
use flowwright_schema::{FormatStatus, KnowledgeBase, NodeKind, Severity, path};
use serde::Serialize;
use serde_json::{Value as JsonValue, json};
use std::collections::{BTreeMap, HashMap};

/// One finding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewIssue {
    pub code: &'static str,
    pub severity: Severity,
    pub message: String,
    /// Name of the node the issue is about, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    #[serde(skip_serializing_if = "JsonValue::is_null")]
    pub details: JsonValue,
}

impl PreviewIssue {
    fn new(code: &'static str, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            node: None,
            details: JsonValue::Null,
        }
    }

    fn error(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Error, message)
    }

    fn warning(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Warning, message)
    }

    fn on(mut self, node: &DraftNode) -> Self {
        self.node = Some(node.name.clone());
        self
    }

    fn with_details(mut self, details: JsonValue) -> Self {
        self.details = details;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphSummary {
    pub nodes_count: usize,
    pub connections_count: usize,
    pub trigger_type: Option<NodeKind>,
    /// Distinct node types, in order of first use.
    pub node_types: Vec<NodeKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewReport {
    pub valid: bool,
    pub errors: Vec<PreviewIssue>,
    pub warnings: Vec<PreviewIssue>,
    pub summary: GraphSummary,
}

/// Parameters that must be non-empty for a node to do anything useful.
const REQUIRED_PARAMETERS: &[(NodeKind, &[&str])] = &[
    (NodeKind::HttpRequest, &["url"]),
    (NodeKind::Webhook, &["path"]),
    (NodeKind::Slack, &["channel", "text"]),
    (NodeKind::EmailSend, &["fromEmail", "toEmail", "subject"]),
    (NodeKind::Postgres, &["query"]),
    (NodeKind::GoogleSheets, &["documentId", "sheetName"]),
];

/// Checks `draft`. `credentials` are the names the session already
/// resolved to ids.
#[must_use]
pub fn preview(
    draft: &WorkflowDraft,
    credentials: &BTreeMap<String, String>,
    knowledge: &KnowledgeBase,
) -> PreviewReport {
    let mut issues = Vec::new();

    if draft.is_empty() {
        issues.push(PreviewIssue::error(
            "EMPTY_WORKFLOW",
            "workflow has no nodes; add a trigger node first",
        ));
        return report(draft, issues);
    }

    if !draft.has_trigger() {
        issues.push(
            PreviewIssue::error(
                "MISSING_TRIGGER",
                "workflow has no trigger node; add manual_trigger, webhook or schedule",
            )
            .with_details(json!({ "node_types": node_types(draft) })),
        );
    }

    check_names(draft, &mut issues);
    check_structure(draft, knowledge, &mut issues);
    for node in &draft.nodes {
        check_parameters(node, &mut issues);
        check_credential(node, credentials, &mut issues);
        check_format(node, knowledge, &mut issues);
    }

    report(draft, issues)
}

fn report(draft: &WorkflowDraft, issues: Vec<PreviewIssue>) -> PreviewReport {
    let (errors, warnings): (Vec<_>, Vec<_>) = issues
        .into_iter()
        .partition(|issue| issue.severity == Severity::Error);
    PreviewReport {
        valid: errors.is_empty(),
        errors,
        warnings,
        summary: GraphSummary {
            nodes_count: draft.nodes.len(),
            connections_count: draft.connections.len(),
            trigger_type: draft
                .nodes
                .iter()
                .find(|node| node.is_trigger())
                .map(|node| node.node_type),
            node_types: node_types(draft),
        },
    }
}

fn node_types(draft: &WorkflowDraft) -> Vec<NodeKind> {
    let mut kinds = Vec::new();
    for node in &draft.nodes {
        if !kinds.contains(&node.node_type) {
            kinds.push(node.node_type);
        }
    }
    kinds
}

fn check_names(draft: &WorkflowDraft, issues: &mut Vec<PreviewIssue>) {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for node in &draft.nodes {
        *counts.entry(node.name.as_str()).or_default() += 1;
    }
    let mut reported = Vec::new();
    for node in &draft.nodes {
        let count = counts[node.name.as_str()];
        if count > 1 && !reported.contains(&node.name.as_str()) {
            reported.push(node.name.as_str());
            issues.push(
                PreviewIssue::warning(
                    "DUPLICATE_NODE_NAME",
                    format!(
                        "{count} nodes are named '{}'; connections are keyed by name and commit will fail",
                        node.name
                    ),
                )
                .on(node)
                .with_details(json!({ "count": count })),
            );
        }
    }
}

fn check_structure(
    draft: &WorkflowDraft,
    knowledge: &KnowledgeBase,
    issues: &mut Vec<PreviewIssue>,
) {
    let graph = DraftGraph::new(draft);
    let name_of = |id: NodeId| {
        draft
            .node(id)
            .map_or_else(|| id.to_string(), |node| node.name.clone())
    };

    for connection in graph.dangling() {
        let missing: Vec<String> = [connection.from, connection.to]
            .into_iter()
            .filter(|id| draft.node(*id).is_none())
            .map(|id| id.to_string())
            .collect();
        issues.push(
            PreviewIssue::error(
                "INVALID_CONNECTION_REFERENCE",
                format!(
                    "connection {} -> {} references missing node(s): {}",
                    name_of(connection.from),
                    name_of(connection.to),
                    missing.join(", ")
                ),
            )
            .with_details(json!({ "missing": missing })),
        );
    }

    for connection in &draft.connections {
        let Some(source) = draft.node(connection.from) else {
            continue;
        };
        if connection.from_output >= source.expected_outputs {
            issues.push(
                PreviewIssue::error(
                    "OUTPUT_INDEX_OUT_OF_RANGE",
                    format!(
                        "'{}' is wired from output {} but has outputs 0 to {}",
                        source.name,
                        connection.from_output,
                        source.max_output()
                    ),
                )
                .on(source)
                .with_details(json!({
                    "from_output": connection.from_output,
                    "expected_outputs": source.expected_outputs,
                    "to": name_of(connection.to),
                })),
            );
        }
    }

    for node in &draft.nodes {
        if !node.is_trigger() && graph.incoming_count(node.id) == 0 {
            issues.push(
                PreviewIssue::warning(
                    "ORPHANED_NODE",
                    format!("'{}' has no incoming connection and will never run", node.name),
                )
                .on(node),
            );
        }

        let terminal = knowledge
            .registry()
            .get(node.node_type)
            .is_some_and(|spec| spec.terminal);
        if !terminal && graph.outgoing_count(node.id) == 0 {
            issues.push(
                PreviewIssue::warning(
                    "DEAD_END_NODE",
                    format!("'{}' has no outgoing connection; its output is discarded", node.name),
                )
                .on(node),
            );
        }
    }

    for cycle in graph.cycles() {
        let names: Vec<String> = cycle.iter().map(|id| name_of(*id)).collect();
        issues.push(
            PreviewIssue::error(
                "CIRCULAR_CONNECTION",
                format!("connections form a cycle: {}", names.join(" -> ")),
            )
            .with_details(json!({ "path": names })),
        );
    }
}

fn check_parameters(node: &DraftNode, issues: &mut Vec<PreviewIssue>) {
    let Some((_, required)) = REQUIRED_PARAMETERS
        .iter()
        .find(|(kind, _)| *kind == node.node_type)
    else {
        return;
    };

    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|field| match path::lookup(&node.parameters, field) {
            None | Some(JsonValue::Null) => true,
            Some(JsonValue::String(value)) => value.trim().is_empty(),
            Some(_) => false,
        })
        .collect();

    if !missing.is_empty() {
        issues.push(
            PreviewIssue::warning(
                "MISSING_PARAMETER",
                format!("'{}' is missing {}", node.name, missing.join(", ")),
            )
            .on(node)
            .with_details(json!({ "missing": missing })),
        );
    }
}

fn check_credential(
    node: &DraftNode,
    credentials: &BTreeMap<String, String>,
    issues: &mut Vec<PreviewIssue>,
) {
    let Some(name) = &node.credential else {
        return;
    };
    if !credentials.contains_key(name) {
        issues.push(
            PreviewIssue::warning(
                "UNRESOLVED_CREDENTIAL",
                format!(
                    "credential '{name}' of '{}' is not mapped in this session; commit will look it up by name",
                    node.name
                ),
            )
            .on(node)
            .with_details(json!({ "credential": name })),
        );
    }
}

fn check_format(node: &DraftNode, knowledge: &KnowledgeBase, issues: &mut Vec<PreviewIssue>) {
    let result = knowledge.validate(node.node_type, &node.parameters, Some(node.type_version));

    match (result.matched_format, result.format_status) {
        (None, _) if knowledge.schema(node.node_type).is_some() => {
            issues.push(
                PreviewIssue::error(
                    "PARAMETER_FORMAT_INVALID",
                    format!(
                        "parameters of '{}' match no known {} format",
                        node.name, node.node_type
                    ),
                )
                .on(node)
                .with_details(json!({ "suggestion": result.suggestion })),
            );
        }
        (Some(format), Some(status @ (FormatStatus::Deprecated | FormatStatus::Experimental))) => {
            let status = if status == FormatStatus::Deprecated {
                "deprecated"
            } else {
                "experimental"
            };
            issues.push(
                PreviewIssue::warning(
                    "DEPRECATED_FORMAT",
                    format!("'{}' uses the {status} format {format}", node.name),
                )
                .on(node)
                .with_details(json!({ "format": format, "suggestion": result.suggestion })),
            );
        }
        _ => {}
    }

    let renders = |name: &str| {
        knowledge
            .schema(node.node_type)
            .and_then(|schema| schema.formats.iter().find(|f| f.name == name))
            .is_none_or(|format| format.editor_compatible)
    };
    if let Some(format) = result.matched_format.filter(|name| !renders(name)) {
        issues.push(
            PreviewIssue::warning(
                "EDITOR_INCOMPATIBLE",
                format!(
                    "'{}' is stored as {format}, which the editor cannot display",
                    node.name
                ),
            )
            .on(node),
        );
    }

    for issue in &result.editor_issues {
        issues.push(
            PreviewIssue::new(
                "EDITOR_REQUIREMENT",
                issue.severity,
                format!("'{}': {} at {}", node.name, issue.message, issue.path),
            )
            .on(node)
            .with_details(json!({ "path": issue.path, "fix": issue.fix })),
        );
    }

    for quirk in knowledge.detect_quirks(node.node_type, &node.parameters) {
        issues.push(
            PreviewIssue::warning(
                "KNOWN_QUIRK",
                format!("'{}' triggers known issue: {}", node.name, quirk.title),
            )
            .on(node)
            .with_details(json!({
                "quirk_id": quirk.id,
                "severity": quirk.severity,
                "workaround": quirk.workaround,
            })),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::DraftConnection;
    use flowwright_schema::NodeTypeSpec;
    use serde_json::Map;

    fn knowledge() -> KnowledgeBase {
        KnowledgeBase::builtin()
    }

    fn spec(kind: NodeKind) -> NodeTypeSpec {
        knowledge().registry().get(kind).cloned().expect("registered")
    }

    fn link(from: NodeId, to: NodeId, from_output: usize) -> DraftConnection {
        DraftConnection {
            from,
            to,
            from_output,
            to_input: 0,
        }
    }

    fn codes(issues: &[PreviewIssue]) -> Vec<&'static str> {
        issues.iter().map(|issue| issue.code).collect()
    }

    fn branching_draft() -> (WorkflowDraft, [NodeId; 4]) {
        let mut draft = WorkflowDraft::new("S1");
        let trigger = draft
            .add_node(&spec(NodeKind::ManualTrigger), None, &Map::new(), None)
            .id;
        let router = draft.add_node(&spec(NodeKind::If), None, &Map::new(), None).id;
        let a = draft.add_node(&spec(NodeKind::NoOp), Some("A"), &Map::new(), None).id;
        let b = draft.add_node(&spec(NodeKind::NoOp), Some("B"), &Map::new(), None).id;
        draft.connections = vec![link(trigger, router, 0), link(router, a, 0), link(router, b, 1)];
        (draft, [trigger, router, a, b])
    }

    #[test]
    fn empty_draft_reports_only_empty_workflow() {
        let report = preview(&WorkflowDraft::new("empty"), &BTreeMap::new(), &knowledge());
        assert!(!report.valid);
        assert_eq!(codes(&report.errors), vec!["EMPTY_WORKFLOW"]);
        assert_eq!(report.summary.nodes_count, 0);
    }

    #[test]
    fn branching_flow_is_valid() {
        let (draft, _) = branching_draft();
        let report = preview(&draft, &BTreeMap::new(), &knowledge());
        assert!(report.valid, "unexpected errors: {:?}", report.errors);
        assert_eq!(report.summary.nodes_count, 4);
        assert_eq!(report.summary.connections_count, 3);
        assert_eq!(report.summary.trigger_type, Some(NodeKind::ManualTrigger));
        assert_eq!(
            report.summary.node_types,
            vec![NodeKind::ManualTrigger, NodeKind::If, NodeKind::NoOp]
        );
    }

    #[test]
    fn two_node_loop_is_reported_once() {
        let (mut draft, [_, _, a, b]) = branching_draft();
        draft.connections.push(link(a, b, 0));
        draft.connections.push(link(b, a, 0));
        let report = preview(&draft, &BTreeMap::new(), &knowledge());
        let cycles: Vec<_> = report
            .errors
            .iter()
            .filter(|issue| issue.code == "CIRCULAR_CONNECTION")
            .collect();
        assert_eq!(cycles.len(), 1);
        let path = cycles[0].details["path"].as_array().expect("path");
        assert!(path.contains(&json!("A")));
        assert!(path.contains(&json!("B")));
    }

    #[test]
    fn missing_trigger_is_an_error() {
        let mut draft = WorkflowDraft::new("no trigger");
        draft.add_node(&spec(NodeKind::NoOp), None, &Map::new(), None);
        let report = preview(&draft, &BTreeMap::new(), &knowledge());
        assert!(codes(&report.errors).contains(&"MISSING_TRIGGER"));
        assert!(codes(&report.warnings).contains(&"ORPHANED_NODE"));
    }

    #[test]
    fn dead_ends_skip_terminal_types() {
        let mut draft = WorkflowDraft::new("dead end");
        let trigger = draft
            .add_node(&spec(NodeKind::ManualTrigger), None, &Map::new(), None)
            .id;
        let code = draft.add_node(&spec(NodeKind::Code), None, &Map::new(), None).id;
        draft.connections = vec![link(trigger, code, 0)];
        let report = preview(&draft, &BTreeMap::new(), &knowledge());
        let dead_ends: Vec<_> = report
            .warnings
            .iter()
            .filter(|issue| issue.code == "DEAD_END_NODE")
            .collect();
        assert_eq!(dead_ends.len(), 1);
        assert_eq!(dead_ends[0].node.as_deref(), Some("Code"));
    }

    #[test]
    fn duplicate_names_warn_once() {
        let (mut draft, _) = branching_draft();
        draft.nodes[3].name = "A".to_string();
        let report = preview(&draft, &BTreeMap::new(), &knowledge());
        let duplicates = report
            .warnings
            .iter()
            .filter(|issue| issue.code == "DUPLICATE_NODE_NAME")
            .count();
        assert_eq!(duplicates, 1);
    }

    #[test]
    fn dangling_and_stale_connections_are_errors() {
        let (mut draft, [_, router, a, _]) = branching_draft();
        draft.connections.push(link(a, NodeId::new(), 0));
        draft.connections.push(link(router, a, 5));
        let report = preview(&draft, &BTreeMap::new(), &knowledge());
        let errors = codes(&report.errors);
        assert!(errors.contains(&"INVALID_CONNECTION_REFERENCE"));
        assert!(errors.contains(&"OUTPUT_INDEX_OUT_OF_RANGE"));
    }

    #[test]
    fn spot_checks_flag_empty_required_fields() {
        let mut draft = WorkflowDraft::new("notify");
        let trigger = draft
            .add_node(&spec(NodeKind::ManualTrigger), None, &Map::new(), None)
            .id;
        let slack = draft
            .add_node(
                &spec(NodeKind::Slack),
                None,
                &Map::new(),
                Some("Team Slack".to_string()),
            )
            .id;
        draft.connections = vec![link(trigger, slack, 0)];
        let report = preview(&draft, &BTreeMap::new(), &knowledge());
        let missing = report
            .warnings
            .iter()
            .find(|issue| issue.code == "MISSING_PARAMETER")
            .expect("missing parameter warning");
        assert_eq!(missing.details["missing"], json!(["channel", "text"]));
        assert!(codes(&report.warnings).contains(&"UNRESOLVED_CREDENTIAL"));

        let resolved = BTreeMap::from([("Team Slack".to_string(), "7".to_string())]);
        let report = preview(&draft, &resolved, &knowledge());
        assert!(!codes(&report.warnings).contains(&"UNRESOLVED_CREDENTIAL"));
    }

    #[test]
    fn legacy_switch_rules_surface_format_and_quirk_warnings() {
        let mut draft = WorkflowDraft::new("legacy");
        let trigger = draft
            .add_node(&spec(NodeKind::ManualTrigger), None, &Map::new(), None)
            .id;
        let config = json!({
            "rules": { "rules": [{ "operation": "equal", "value2": "a" }, { "operation": "equal", "value2": "b" }] }
        });
        let config = config.as_object().cloned().expect("object");
        let switch = draft.add_node(&spec(NodeKind::Switch), None, &config, None).id;
        draft.connections = vec![link(trigger, switch, 0)];
        let report = preview(&draft, &BTreeMap::new(), &knowledge());
        let warnings = codes(&report.warnings);
        assert!(warnings.contains(&"DEPRECATED_FORMAT"));
        assert!(warnings.contains(&"KNOWN_QUIRK"));
    }
}
