//! Validation engine.
//!
//! Two tracks run against a node's parameters. Format matching mirrors the
//! permissive storage API: does any known shape fit at all? Editor
//! requirements mirror the strict editor: will the matched shape render?

use crate::format::{FormatStatus, Severity};
use crate::knowledge::KnowledgeBase;
use crate::registry::NodeKind;
use serde::Serialize;
use serde_json::Value as JsonValue;

/// A failed editor requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditorIssue {
    pub path: String,
    pub severity: Severity,
    pub message: String,
    pub fix: String,
}

/// Outcome of validating one parameter object.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub node_type: NodeKind,
    pub matched_format: Option<&'static str>,
    pub format_status: Option<FormatStatus>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub editor_compatible: bool,
    pub editor_issues: Vec<EditorIssue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ValidationResult {
    fn new(node_type: NodeKind) -> Self {
        Self {
            valid: true,
            node_type,
            matched_format: None,
            format_status: None,
            errors: Vec::new(),
            warnings: Vec::new(),
            editor_compatible: true,
            editor_issues: Vec::new(),
            suggestion: None,
        }
    }

    /// Returns true if nothing at all was reported.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

impl KnowledgeBase {
    /// Validates `parameters` against the formats registered for `kind`.
    ///
    /// Formats are tried in declaration order and the first match wins.
    /// Never fails; every problem is reported in the result.
    #[must_use]
    pub fn validate(
        &self,
        kind: NodeKind,
        parameters: &JsonValue,
        version: Option<f64>,
    ) -> ValidationResult {
        let mut result = ValidationResult::new(kind);

        let Some(schema) = self.schema(kind) else {
            result.warnings.push(format!(
                "no formats are registered for {kind}; parameters were not checked"
            ));
            return result;
        };

        if let Some(requested) = version {
            if (requested - schema.version).abs() > f64::EPSILON {
                result.warnings.push(format!(
                    "formats for {kind} describe typeVersion {}, not {requested}",
                    schema.version
                ));
            }
        }

        let Some(format) = schema.formats.iter().find(|f| f.matches(parameters)) else {
            result.valid = false;
            result.editor_compatible = false;
            result.errors.push(format!(
                "parameters for {kind} match no known format"
            ));
            result.suggestion = Some(format!(
                "use one of: {}",
                schema.format_names().join(", ")
            ));
            tracing::debug!(node_type = %kind, "no format matched");
            return result;
        };

        result.matched_format = Some(format.name);
        result.format_status = Some(format.status);

        match format.status {
            FormatStatus::Recommended => {}
            FormatStatus::Deprecated => result.warnings.push(format!(
                "format '{}' is deprecated for {kind}",
                format.name
            )),
            FormatStatus::Experimental => result.warnings.push(format!(
                "format '{}' is experimental for {kind}",
                format.name
            )),
        }

        if !format.editor_compatible {
            result.editor_compatible = false;
            result.warnings.push(format!(
                "format '{}' is accepted by the API but will not render in the editor",
                format.name
            ));
        }

        for requirement in &format.editor_requirements {
            if requirement.is_satisfied(parameters) {
                continue;
            }
            let line = format!(
                "{}: {} (fix: {})",
                requirement.path, requirement.message, requirement.fix
            );
            match requirement.severity {
                Severity::Error => {
                    result.editor_compatible = false;
                    result.errors.push(line);
                }
                Severity::Warning => result.warnings.push(line),
            }
            result.editor_issues.push(EditorIssue {
                path: requirement.path.to_string(),
                severity: requirement.severity,
                message: requirement.message.to_string(),
                fix: requirement.fix.to_string(),
            });
        }

        if let Some(recommended) = schema.recommended() {
            if recommended.name != format.name {
                result.suggestion = Some(format!(
                    "migrate to the '{}' format: {}",
                    recommended.name, recommended.description
                ));
            }
        }

        result.valid = result.errors.is_empty();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shaping;
    use serde_json::{Map, json};

    fn kb() -> KnowledgeBase {
        KnowledgeBase::builtin()
    }

    #[test]
    fn shaped_if_is_valid_and_editor_compatible() {
        let mut config = Map::new();
        config.insert(
            "conditions".into(),
            json!([{ "left": "={{ $json.status }}", "operator": "equals", "right": "ok" }]),
        );
        let params = shaping::shape(NodeKind::If, &config);
        let result = kb().validate(NodeKind::If, &params, None);
        assert!(result.valid, "{result:?}");
        assert!(result.editor_compatible);
        assert_eq!(result.matched_format, Some("conditions_v2"));
        assert!(result.is_clean(), "{result:?}");
    }

    #[test]
    fn missing_condition_ids_are_errors() {
        let params = json!({
            "conditions": {
                "options": { "caseSensitive": true, "leftValue": "", "typeValidation": "strict" },
                "conditions": [{
                    "leftValue": "a",
                    "rightValue": "b",
                    "operator": { "type": "string", "operation": "equals" }
                }],
                "combinator": "and"
            }
        });
        let result = kb().validate(NodeKind::If, &params, None);
        assert!(!result.valid);
        assert!(!result.editor_compatible);
        assert_eq!(result.editor_issues.len(), 1);
        assert_eq!(result.editor_issues[0].path, "conditions.conditions");
        assert_eq!(result.editor_issues[0].severity, Severity::Error);
    }

    #[test]
    fn deprecated_format_warns_but_stays_valid() {
        let params = json!({ "conditions": { "string": [{ "value1": "a", "value2": "b" }] } });
        let result = kb().validate(NodeKind::If, &params, None);
        assert!(result.valid);
        assert_eq!(result.matched_format, Some("typed_conditions_v1"));
        assert_eq!(result.format_status, Some(FormatStatus::Deprecated));
        assert!(!result.editor_compatible);
        assert!(result.warnings.iter().any(|w| w.contains("deprecated")));
        assert!(result.suggestion.is_some());
    }

    #[test]
    fn unmatched_parameters_list_known_formats() {
        let result = kb().validate(NodeKind::Switch, &json!({ "mode": "rules" }), None);
        assert!(!result.valid);
        assert!(result.matched_format.is_none());
        let suggestion = result.suggestion.expect("suggestion");
        assert!(suggestion.contains("rules_values_v3 (recommended)"));
        assert!(suggestion.contains("rules_rules_v2 (deprecated)"));
    }

    #[test]
    fn types_without_formats_pass_with_warning() {
        let result = kb().validate(NodeKind::NoOp, &json!({}), None);
        assert!(result.valid);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn version_mismatch_warns() {
        let params = shaping::shape(NodeKind::Merge, &Map::new());
        let result = kb().validate(NodeKind::Merge, &params, Some(2.0));
        assert!(result.valid);
        assert!(result.warnings.iter().any(|w| w.contains("typeVersion")));
    }

    #[test]
    fn empty_webhook_path_is_an_error() {
        let params = json!({ "path": "", "httpMethod": "POST" });
        let result = kb().validate(NodeKind::Webhook, &params, None);
        assert!(!result.valid);
        assert!(result.errors[0].starts_with("path:"));
    }
}
