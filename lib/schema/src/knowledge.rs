//! The read-only knowledge base: registry, formats and quirks.

use crate::catalog;
use crate::format::NodeSchema;
use crate::quirk::Quirk;
use crate::registry::{NodeCategory, NodeKind, NodeTypeRegistry};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Compact description of one node type's registered formats.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaSummary {
    pub node_type: NodeKind,
    pub target_type: &'static str,
    pub version: f64,
    pub category: NodeCategory,
    pub formats: Vec<String>,
    pub recommended: Option<&'static str>,
    pub quirk_count: usize,
}

/// Node type knowledge shared by every session.
///
/// Built once and passed around behind an `Arc`; nothing mutates it.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    registry: NodeTypeRegistry,
    schemas: BTreeMap<NodeKind, NodeSchema>,
    quirks: Vec<Quirk>,
}

impl KnowledgeBase {
    #[must_use]
    pub fn new(registry: NodeTypeRegistry, schemas: Vec<NodeSchema>, quirks: Vec<Quirk>) -> Self {
        let schemas = schemas
            .into_iter()
            .map(|schema| (schema.node_type, schema))
            .collect();
        Self {
            registry,
            schemas,
            quirks,
        }
    }

    /// The built-in registry, formats and quirks.
    #[must_use]
    pub fn builtin() -> Self {
        let registry = NodeTypeRegistry::builtin();
        let schemas = catalog::schemas(&registry);
        let quirks = catalog::quirks();
        tracing::debug!(
            node_types = registry.entries().count(),
            schemas = schemas.len(),
            quirks = quirks.len(),
            "loaded node knowledge"
        );
        Self::new(registry, schemas, quirks)
    }

    #[must_use]
    pub fn registry(&self) -> &NodeTypeRegistry {
        &self.registry
    }

    /// Registered formats for a node type.
    #[must_use]
    pub fn schema(&self, kind: NodeKind) -> Option<&NodeSchema> {
        self.schemas.get(&kind)
    }

    /// Summaries of every node type, in registry order. Types without
    /// registered formats are listed with an empty format list.
    #[must_use]
    pub fn list_schemas(&self) -> Vec<SchemaSummary> {
        self.registry
            .entries()
            .map(|spec| {
                let schema = self.schema(spec.kind);
                SchemaSummary {
                    node_type: spec.kind,
                    target_type: spec.target_type,
                    version: spec.version,
                    category: spec.category,
                    formats: schema.map(NodeSchema::format_names).unwrap_or_default(),
                    recommended: schema.and_then(NodeSchema::recommended).map(|f| f.name),
                    quirk_count: self.quirks_for(spec.kind).len(),
                }
            })
            .collect()
    }

    /// Looks a quirk up by id.
    #[must_use]
    pub fn quirk(&self, id: &str) -> Option<&Quirk> {
        self.quirks.iter().find(|quirk| quirk.id == id)
    }

    /// Every quirk that concerns `kind`.
    #[must_use]
    pub fn quirks_for(&self, kind: NodeKind) -> Vec<&Quirk> {
        self.quirks.iter().filter(|quirk| quirk.affects(kind)).collect()
    }

    /// Quirks for `kind` whose detector recognizes `parameters`.
    #[must_use]
    pub fn detect_quirks(&self, kind: NodeKind, parameters: &JsonValue) -> Vec<&Quirk> {
        self.quirks
            .iter()
            .filter(|quirk| quirk.affects(kind) && quirk.detected_in(parameters))
            .collect()
    }

    /// Quirks whose symptoms mention any of the keywords.
    #[must_use]
    pub fn search_by_symptom<S: AsRef<str>>(&self, keywords: &[S]) -> Vec<&Quirk> {
        self.quirks
            .iter()
            .filter(|quirk| quirk.matches_symptoms(keywords))
            .collect()
    }
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn false_branch_symptom_finds_connection_quirk() {
        let kb = KnowledgeBase::builtin();
        let found = kb.search_by_symptom(&["false branch never executes"]);
        assert!(found.iter().any(|q| q.id == "branch-single-slot-connections"));
    }

    #[test]
    fn unmatched_symptom_finds_nothing() {
        let kb = KnowledgeBase::builtin();
        assert!(kb.search_by_symptom(&["printer on fire"]).is_empty());
    }

    #[test]
    fn detects_legacy_switch_rules() {
        let kb = KnowledgeBase::builtin();
        let params = json!({ "mode": "rules", "rules": { "rules": [{ "value2": "a", "output": 0 }] } });
        let ids: Vec<_> = kb
            .detect_quirks(NodeKind::Switch, &params)
            .into_iter()
            .map(|q| q.id)
            .collect();
        assert_eq!(ids, vec!["switch-legacy-rules-array"]);
    }

    #[test]
    fn detection_is_scoped_to_node_type() {
        let kb = KnowledgeBase::builtin();
        let params = json!({ "values": { "string": [] } });
        assert!(!kb.detect_quirks(NodeKind::Set, &params).is_empty());
        assert!(kb.detect_quirks(NodeKind::Code, &params).is_empty());
    }

    #[test]
    fn lists_every_registered_type() {
        let kb = KnowledgeBase::builtin();
        let summaries = kb.list_schemas();
        assert_eq!(summaries.len(), NodeKind::ALL.len());
        let switch = summaries
            .iter()
            .find(|s| s.node_type == NodeKind::Switch)
            .expect("switch summary");
        assert_eq!(switch.recommended, Some("rules_values_v3"));
        assert!(switch.quirk_count >= 2);
        let noop = summaries
            .iter()
            .find(|s| s.node_type == NodeKind::NoOp)
            .expect("noop summary");
        assert!(noop.formats.is_empty());
    }
}
