//! Node type registry.
//!
//! Callers address node types by a small simplified vocabulary (`if`,
//! `http_request`, ...). The registry maps each simplified name to the
//! platform's type string, its schema version and its structural metadata.

use crate::error::SchemaError;
use crate::shaping;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;
use std::str::FromStr;

/// Simplified node type names understood by the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    ManualTrigger,
    Webhook,
    Schedule,
    HttpRequest,
    Code,
    Set,
    If,
    Switch,
    Merge,
    Wait,
    Slack,
    EmailSend,
    Postgres,
    GoogleSheets,
    RespondToWebhook,
    NoOp,
}

impl NodeKind {
    /// Every kind, in registry order.
    pub const ALL: [Self; 16] = [
        Self::ManualTrigger,
        Self::Webhook,
        Self::Schedule,
        Self::HttpRequest,
        Self::Code,
        Self::Set,
        Self::If,
        Self::Switch,
        Self::Merge,
        Self::Wait,
        Self::Slack,
        Self::EmailSend,
        Self::Postgres,
        Self::GoogleSheets,
        Self::RespondToWebhook,
        Self::NoOp,
    ];

    /// Returns the simplified name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ManualTrigger => "manual_trigger",
            Self::Webhook => "webhook",
            Self::Schedule => "schedule",
            Self::HttpRequest => "http_request",
            Self::Code => "code",
            Self::Set => "set",
            Self::If => "if",
            Self::Switch => "switch",
            Self::Merge => "merge",
            Self::Wait => "wait",
            Self::Slack => "slack",
            Self::EmailSend => "email_send",
            Self::Postgres => "postgres",
            Self::GoogleSheets => "google_sheets",
            Self::RespondToWebhook => "respond_to_webhook",
            Self::NoOp => "no_op",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| SchemaError::UnknownNodeType {
                node_type: s.to_string(),
                supported: Self::ALL.iter().map(|k| k.as_str().to_string()).collect(),
            })
    }
}

/// Coarse node category used for graph checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    /// Originates workflow execution; needs no inbound connection.
    Trigger,
    /// Exposes more than one output port.
    Branching,
    /// Everything else.
    Action,
}

/// Registry entry for one node type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeTypeSpec {
    /// Simplified name.
    pub kind: NodeKind,
    /// Platform type string, e.g. `n8n-nodes-base.if`.
    pub target_type: &'static str,
    /// Platform `typeVersion` the defaults and formats are written for.
    pub version: f64,
    /// Category.
    pub category: NodeCategory,
    /// Base for auto-generated node names.
    pub display_name: &'static str,
    /// Whether a node of this type may legitimately end a branch.
    pub terminal: bool,
    /// Credential kind the platform expects, if the node authenticates.
    pub credential_kind: Option<&'static str>,
}

impl NodeTypeSpec {
    /// Expands caller configuration into the platform parameter object.
    #[must_use]
    pub fn shape_parameters(&self, config: &Map<String, JsonValue>) -> JsonValue {
        shaping::shape(self.kind, config)
    }

    /// Number of output ports a node with these parameters exposes.
    #[must_use]
    pub fn expected_outputs(&self, parameters: &JsonValue) -> usize {
        shaping::expected_outputs(self.kind, parameters)
    }

    /// Returns true for trigger nodes.
    #[must_use]
    pub fn is_trigger(&self) -> bool {
        self.category == NodeCategory::Trigger
    }
}

/// The fixed registry of supported node types.
#[derive(Debug, Clone)]
pub struct NodeTypeRegistry {
    entries: Vec<NodeTypeSpec>,
}

impl NodeTypeRegistry {
    /// Builds the registry of built-in node types.
    #[must_use]
    pub fn builtin() -> Self {
        use NodeCategory::{Action, Branching, Trigger};

        let spec = |kind, target_type, version, category, display_name, terminal, credential_kind| {
            NodeTypeSpec {
                kind,
                target_type,
                version,
                category,
                display_name,
                terminal,
                credential_kind,
            }
        };

        Self {
            entries: vec![
                spec(NodeKind::ManualTrigger, "n8n-nodes-base.manualTrigger", 1.0, Trigger, "Manual Trigger", false, None),
                spec(NodeKind::Webhook, "n8n-nodes-base.webhook", 2.0, Trigger, "Webhook", false, None),
                spec(NodeKind::Schedule, "n8n-nodes-base.scheduleTrigger", 1.2, Trigger, "Schedule Trigger", false, None),
                spec(NodeKind::HttpRequest, "n8n-nodes-base.httpRequest", 4.2, Action, "HTTP Request", false, Some("httpHeaderAuth")),
                spec(NodeKind::Code, "n8n-nodes-base.code", 2.0, Action, "Code", false, None),
                spec(NodeKind::Set, "n8n-nodes-base.set", 3.4, Action, "Edit Fields", false, None),
                spec(NodeKind::If, "n8n-nodes-base.if", 2.0, Branching, "If", false, None),
                spec(NodeKind::Switch, "n8n-nodes-base.switch", 3.0, Branching, "Switch", false, None),
                spec(NodeKind::Merge, "n8n-nodes-base.merge", 3.0, Action, "Merge", false, None),
                spec(NodeKind::Wait, "n8n-nodes-base.wait", 1.1, Action, "Wait", false, None),
                spec(NodeKind::Slack, "n8n-nodes-base.slack", 2.2, Action, "Slack", true, Some("slackApi")),
                spec(NodeKind::EmailSend, "n8n-nodes-base.emailSend", 2.1, Action, "Send Email", true, Some("smtp")),
                spec(NodeKind::Postgres, "n8n-nodes-base.postgres", 2.5, Action, "Postgres", true, Some("postgres")),
                spec(NodeKind::GoogleSheets, "n8n-nodes-base.googleSheets", 4.5, Action, "Google Sheets", true, Some("googleSheetsOAuth2Api")),
                spec(NodeKind::RespondToWebhook, "n8n-nodes-base.respondToWebhook", 1.1, Action, "Respond to Webhook", true, None),
                spec(NodeKind::NoOp, "n8n-nodes-base.noOp", 1.0, Action, "No Operation", true, None),
            ],
        }
    }

    /// Returns the entry for a kind.
    ///
    /// Every `NodeKind` is registered by `builtin`, so this only returns
    /// `None` for registries assembled by hand.
    #[must_use]
    pub fn get(&self, kind: NodeKind) -> Option<&NodeTypeSpec> {
        self.entries.iter().find(|entry| entry.kind == kind)
    }

    /// Looks a type up by simplified name or platform type string.
    ///
    /// # Errors
    ///
    /// Returns `UnknownNodeType` listing every supported simplified name.
    pub fn resolve(&self, name: &str) -> Result<&NodeTypeSpec, SchemaError> {
        let by_target = self
            .entries
            .iter()
            .find(|entry| entry.target_type.eq_ignore_ascii_case(name.trim()));
        if let Some(entry) = by_target {
            return Ok(entry);
        }

        let unknown = || SchemaError::UnknownNodeType {
            node_type: name.to_string(),
            supported: self.supported_names(),
        };
        let kind = name.parse::<NodeKind>().map_err(|_| unknown())?;
        self.get(kind).ok_or_else(unknown)
    }

    /// Simplified names of every registered type.
    #[must_use]
    pub fn supported_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| entry.kind.as_str().to_string())
            .collect()
    }

    /// All entries in registry order.
    pub fn entries(&self) -> impl Iterator<Item = &NodeTypeSpec> {
        self.entries.iter()
    }
}

impl Default for NodeTypeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_is_registered() {
        let registry = NodeTypeRegistry::builtin();
        for kind in NodeKind::ALL {
            assert!(registry.get(kind).is_some(), "{kind} missing");
        }
    }

    #[test]
    fn resolves_simplified_and_target_names() {
        let registry = NodeTypeRegistry::builtin();
        assert_eq!(registry.resolve("if").unwrap().kind, NodeKind::If);
        assert_eq!(registry.resolve("HTTP-Request").unwrap().kind, NodeKind::HttpRequest);
        assert_eq!(
            registry.resolve("n8n-nodes-base.switch").unwrap().kind,
            NodeKind::Switch
        );
    }

    #[test]
    fn unknown_type_enumerates_supported() {
        let registry = NodeTypeRegistry::builtin();
        match registry.resolve("ftp") {
            Err(SchemaError::UnknownNodeType { supported, .. }) => {
                assert_eq!(supported.len(), NodeKind::ALL.len());
                assert!(supported.contains(&"webhook".to_string()));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn branching_types_are_categorized() {
        let registry = NodeTypeRegistry::builtin();
        assert_eq!(registry.get(NodeKind::If).unwrap().category, NodeCategory::Branching);
        assert_eq!(registry.get(NodeKind::Switch).unwrap().category, NodeCategory::Branching);
        assert!(registry.get(NodeKind::Webhook).unwrap().is_trigger());
    }

    #[test]
    fn kind_serializes_as_simplified_name() {
        let json = serde_json::to_string(&NodeKind::RespondToWebhook).expect("serialize");
        assert_eq!(json, "\"respond_to_webhook\"");
    }
}
