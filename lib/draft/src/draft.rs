//! The mutable workflow graph held by a session.

use flowwright_core::NodeId;
use flowwright_schema::{NodeCategory, NodeKind, NodeTypeSpec};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Position of the first node on the canvas.
pub const LAYOUT_ORIGIN: [i64; 2] = [250, 300];

/// Horizontal distance between consecutive nodes.
pub const LAYOUT_STEP_X: i64 = 250;

/// One node in a draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftNode {
    pub id: NodeId,
    pub name: String,
    pub node_type: NodeKind,
    /// Platform type string resolved at add time.
    pub target_type: String,
    pub type_version: f64,
    pub parameters: JsonValue,
    pub position: [i64; 2],
    /// Name of the credential this node authenticates with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
    /// Output port count, fixed when the node was added.
    pub expected_outputs: usize,
    pub category: NodeCategory,
}

impl DraftNode {
    /// Returns true for trigger nodes.
    #[must_use]
    pub fn is_trigger(&self) -> bool {
        self.category == NodeCategory::Trigger
    }

    /// Highest valid output index.
    #[must_use]
    pub fn max_output(&self) -> usize {
        self.expected_outputs.saturating_sub(1)
    }
}

/// A directed connection between two draft nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftConnection {
    pub from: NodeId,
    pub to: NodeId,
    #[serde(default)]
    pub from_output: usize,
    #[serde(default)]
    pub to_input: usize,
}

/// The in-progress workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDraft {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub nodes: Vec<DraftNode>,
    #[serde(default)]
    pub connections: Vec<DraftConnection>,
    #[serde(default)]
    pub settings: Map<String, JsonValue>,
}

impl WorkflowDraft {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            nodes: Vec::new(),
            connections: Vec::new(),
            settings: Map::new(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&DraftNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// Finds a node by id, falling back to name.
    #[must_use]
    pub fn find_node(&self, reference: &str) -> Option<&DraftNode> {
        let reference = reference.trim();
        if let Ok(id) = reference.parse::<NodeId>() {
            if let Some(node) = self.node(id) {
                return Some(node);
            }
        }
        self.nodes.iter().find(|node| node.name == reference)
    }

    #[must_use]
    pub fn node_names(&self) -> Vec<String> {
        self.nodes.iter().map(|node| node.name.clone()).collect()
    }

    #[must_use]
    pub fn has_trigger(&self) -> bool {
        self.nodes.iter().any(DraftNode::is_trigger)
    }

    /// Connections leaving `id`.
    pub fn connections_from(&self, id: NodeId) -> impl Iterator<Item = &DraftConnection> {
        self.connections.iter().filter(move |c| c.from == id)
    }

    /// Returns true if any connection already links `from` to `to`.
    #[must_use]
    pub fn has_connection(&self, from: NodeId, to: NodeId) -> bool {
        self.connections.iter().any(|c| c.from == from && c.to == to)
    }

    /// Name for a new node of `spec`'s type: the display name, or the
    /// display name with an ordinal when same-type nodes already exist.
    #[must_use]
    pub fn auto_name(&self, spec: &NodeTypeSpec) -> String {
        let taken = |candidate: &str| self.nodes.iter().any(|node| node.name == candidate);
        let same_type = self
            .nodes
            .iter()
            .filter(|node| node.node_type == spec.kind)
            .count();

        if same_type == 0 && !taken(spec.display_name) {
            return spec.display_name.to_string();
        }

        let mut ordinal = same_type.max(1) + 1;
        loop {
            let candidate = format!("{} {ordinal}", spec.display_name);
            if !taken(&candidate) {
                return candidate;
            }
            ordinal += 1;
        }
    }

    /// Position for the next node: right of the rightmost node, at the
    /// mean height of existing nodes.
    #[must_use]
    pub fn next_position(&self) -> [i64; 2] {
        let Some(max_x) = self.nodes.iter().map(|node| node.position[0]).max() else {
            return LAYOUT_ORIGIN;
        };
        let total_y: i64 = self.nodes.iter().map(|node| node.position[1]).sum();
        #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
        let mean_y = (total_y as f64 / self.nodes.len() as f64).round() as i64;
        [max_x + LAYOUT_STEP_X, mean_y]
    }

    /// Adds a node of `spec`'s type, shaping `config` into platform
    /// parameters. Blank names are replaced with a generated one.
    pub fn add_node(
        &mut self,
        spec: &NodeTypeSpec,
        name: Option<&str>,
        config: &Map<String, JsonValue>,
        credential: Option<String>,
    ) -> &DraftNode {
        let name = match name.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.auto_name(spec),
        };
        let parameters = spec.shape_parameters(config);
        let expected_outputs = spec.expected_outputs(&parameters);
        let node = DraftNode {
            id: NodeId::new(),
            name,
            node_type: spec.kind,
            target_type: spec.target_type.to_string(),
            type_version: spec.version,
            parameters,
            position: self.next_position(),
            credential: credential.filter(|c| !c.trim().is_empty()),
            expected_outputs,
            category: spec.category,
        };
        let index = self.nodes.len();
        self.nodes.push(node);
        &self.nodes[index]
    }
}
