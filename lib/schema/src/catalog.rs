//! Built-in formats and quirks.
//!
//! Registered once at startup by `KnowledgeBase::builtin`; never mutated.

use crate::format::{
    EditorRequirement, FieldRule, Format, FormatStatus, JsonKind, NodeSchema, RequirementCheck,
    Severity,
};
use crate::path;
use crate::quirk::{Quirk, QuirkSeverity};
use crate::registry::{NodeKind, NodeTypeRegistry};
use serde_json::Value as JsonValue;

const TYPE_VALIDATION_MODES: &[&str] = &["strict", "loose"];
const WEBHOOK_RESPONSE_MODES: &[&str] = &["onReceived", "lastNode", "responseNode"];
const MERGE_MODES: &[&str] = &[
    "append",
    "combine",
    "combineByPosition",
    "combineByFields",
    "chooseBranch",
    "combineBySql",
];

fn non_empty_string(value: &JsonValue) -> bool {
    value.as_str().is_some_and(|s| !s.trim().is_empty())
}

fn non_empty_array(value: &JsonValue) -> bool {
    value.as_array().is_some_and(|items| !items.is_empty())
}

fn has_id(item: &JsonValue) -> bool {
    item.get("id").is_some_and(non_empty_string)
}

fn all_conditions_have_ids(value: &JsonValue) -> bool {
    value.as_array().is_none_or(|items| items.iter().all(has_id))
}

fn all_operators_complete(value: &JsonValue) -> bool {
    value.as_array().is_none_or(|items| {
        items.iter().all(|condition| {
            condition.get("operator").is_some_and(|op| {
                op.get("type").is_some_and(non_empty_string)
                    && op.get("operation").is_some_and(non_empty_string)
            })
        })
    })
}

fn all_rules_have_condition_options(value: &JsonValue) -> bool {
    value.as_array().is_none_or(|rules| {
        rules
            .iter()
            .all(|rule| path::lookup(rule, "conditions.options").is_some_and(JsonValue::is_object))
    })
}

fn all_rule_conditions_have_ids(value: &JsonValue) -> bool {
    value.as_array().is_none_or(|rules| {
        rules.iter().all(|rule| {
            path::lookup(rule, "conditions.conditions").is_some_and(all_conditions_have_ids)
        })
    })
}

fn all_assignments_complete(value: &JsonValue) -> bool {
    value.as_array().is_none_or(|items| {
        items.iter().all(|assignment| {
            has_id(assignment)
                && assignment.get("name").is_some_and(non_empty_string)
                && assignment.get("type").is_some_and(non_empty_string)
        })
    })
}

fn requirement(
    path: &'static str,
    check: RequirementCheck,
    severity: Severity,
    message: &'static str,
    fix: &'static str,
) -> EditorRequirement {
    EditorRequirement {
        path,
        check,
        severity,
        message,
        fix,
    }
}

fn custom(description: &'static str, predicate: fn(&JsonValue) -> bool) -> RequirementCheck {
    RequirementCheck::Custom {
        description,
        predicate,
    }
}

fn schema(registry: &NodeTypeRegistry, kind: NodeKind, formats: Vec<Format>) -> Option<NodeSchema> {
    let spec = registry.get(kind)?;
    Some(NodeSchema {
        node_type: kind,
        target_type: spec.target_type,
        version: spec.version,
        formats,
    })
}

fn if_formats() -> Vec<Format> {
    vec![
        Format {
            name: "conditions_v2",
            status: FormatStatus::Recommended,
            description: "Condition block with options, id-tagged conditions and a combinator",
            editor_compatible: true,
            storage_compatible: true,
            rules: vec![
                FieldRule::new("conditions.conditions", JsonKind::Array),
                FieldRule::new("conditions.combinator", JsonKind::String),
            ],
            editor_requirements: vec![
                requirement(
                    "conditions.options",
                    RequirementCheck::Type(JsonKind::Object),
                    Severity::Error,
                    "conditions.options must be an object",
                    "set conditions.options to {\"caseSensitive\": true, \"leftValue\": \"\", \"typeValidation\": \"strict\"}",
                ),
                requirement(
                    "conditions.options",
                    RequirementCheck::Exists,
                    Severity::Error,
                    "the editor cannot load an IF node without conditions.options",
                    "add conditions.options with caseSensitive, leftValue and typeValidation",
                ),
                requirement(
                    "conditions.options.typeValidation",
                    RequirementCheck::OneOf(TYPE_VALIDATION_MODES),
                    Severity::Warning,
                    "unknown typeValidation mode",
                    "use \"strict\" or \"loose\"",
                ),
                requirement(
                    "conditions.conditions",
                    custom("every condition has a non-empty id", all_conditions_have_ids),
                    Severity::Error,
                    "conditions without an id crash the editor",
                    "give every condition a unique string id",
                ),
                requirement(
                    "conditions.conditions",
                    custom("every operator has type and operation", all_operators_complete),
                    Severity::Error,
                    "condition operators need both type and operation",
                    "use operator objects like {\"type\": \"string\", \"operation\": \"equals\"}",
                ),
                requirement(
                    "conditions.conditions",
                    custom("at least one condition", non_empty_array),
                    Severity::Warning,
                    "the IF node has no conditions, so every item goes to the true branch",
                    "add at least one condition",
                ),
            ],
        },
        Format {
            name: "typed_conditions_v1",
            status: FormatStatus::Deprecated,
            description: "Conditions grouped by data type (string/number/boolean) with value1/operation/value2",
            editor_compatible: false,
            storage_compatible: true,
            rules: vec![FieldRule::new("conditions", JsonKind::Object)],
            editor_requirements: Vec::new(),
        },
        Format {
            name: "flat_condition_list",
            status: FormatStatus::Experimental,
            description: "A bare array of conditions without the surrounding block",
            editor_compatible: false,
            storage_compatible: true,
            rules: vec![FieldRule::new("conditions", JsonKind::Array)],
            editor_requirements: Vec::new(),
        },
    ]
}

fn switch_formats() -> Vec<Format> {
    vec![
        Format {
            name: "rules_values_v3",
            status: FormatStatus::Recommended,
            description: "Rules mode with rules.values, each rule holding a full condition block",
            editor_compatible: true,
            storage_compatible: true,
            rules: vec![FieldRule::new("rules.values", JsonKind::Array)],
            editor_requirements: vec![
                requirement(
                    "mode",
                    RequirementCheck::OneOf(&["rules"]),
                    Severity::Warning,
                    "rules.values is only read in rules mode",
                    "set mode to \"rules\"",
                ),
                requirement(
                    "rules.values",
                    custom("every rule has conditions.options", all_rules_have_condition_options),
                    Severity::Error,
                    "rules without conditions.options fail to load in the editor",
                    "give each rule a conditions block with options",
                ),
                requirement(
                    "rules.values",
                    custom("every rule condition has an id", all_rule_conditions_have_ids),
                    Severity::Error,
                    "rule conditions without an id crash the editor",
                    "give every rule condition a unique string id",
                ),
                requirement(
                    "rules.values",
                    custom("at least one rule", non_empty_array),
                    Severity::Warning,
                    "the switch has no rules and will expose the default two outputs",
                    "add one rule per output",
                ),
            ],
        },
        Format {
            name: "rules_rules_v2",
            status: FormatStatus::Deprecated,
            description: "Legacy rules.rules list with value2/output per rule",
            editor_compatible: false,
            storage_compatible: true,
            rules: vec![FieldRule::new("rules.rules", JsonKind::Array)],
            editor_requirements: Vec::new(),
        },
    ]
}

fn set_formats() -> Vec<Format> {
    vec![
        Format {
            name: "assignments_v3",
            status: FormatStatus::Recommended,
            description: "Manual mode with assignments.assignments entries of id/name/value/type",
            editor_compatible: true,
            storage_compatible: true,
            rules: vec![FieldRule::new("assignments.assignments", JsonKind::Array)],
            editor_requirements: vec![requirement(
                "assignments.assignments",
                custom("every assignment has id, name and type", all_assignments_complete),
                Severity::Error,
                "incomplete assignments are dropped by the editor",
                "give each assignment an id, a name and a type",
            )],
        },
        Format {
            name: "typed_values_v2",
            status: FormatStatus::Deprecated,
            description: "Legacy values object grouped by data type",
            editor_compatible: false,
            storage_compatible: true,
            rules: vec![FieldRule::new("values", JsonKind::Object)],
            editor_requirements: Vec::new(),
        },
    ]
}

fn http_request_formats() -> Vec<Format> {
    vec![
        Format {
            name: "method_url_v4",
            status: FormatStatus::Recommended,
            description: "method + url with an options object",
            editor_compatible: true,
            storage_compatible: true,
            rules: vec![
                FieldRule::new("url", JsonKind::String),
                FieldRule::new("method", JsonKind::String),
            ],
            editor_requirements: vec![
                requirement(
                    "url",
                    custom("url is non-empty", non_empty_string),
                    Severity::Warning,
                    "the request has no URL",
                    "set url to the endpoint to call",
                ),
                requirement(
                    "options",
                    RequirementCheck::Exists,
                    Severity::Warning,
                    "the editor expects an options object",
                    "add \"options\": {}",
                ),
            ],
        },
        Format {
            name: "request_method_v1",
            status: FormatStatus::Deprecated,
            description: "Legacy requestMethod + url",
            editor_compatible: false,
            storage_compatible: true,
            rules: vec![
                FieldRule::new("url", JsonKind::String),
                FieldRule::new("requestMethod", JsonKind::String),
            ],
            editor_requirements: Vec::new(),
        },
    ]
}

fn code_formats() -> Vec<Format> {
    vec![
        Format {
            name: "js_code",
            status: FormatStatus::Recommended,
            description: "JavaScript in jsCode",
            editor_compatible: true,
            storage_compatible: true,
            rules: vec![FieldRule::new("jsCode", JsonKind::String)],
            editor_requirements: vec![requirement(
                "jsCode",
                custom("code is non-empty", non_empty_string),
                Severity::Warning,
                "the code node has no code",
                "put the script in jsCode",
            )],
        },
        Format {
            name: "python_code",
            status: FormatStatus::Experimental,
            description: "Python in pythonCode with language set to python",
            editor_compatible: true,
            storage_compatible: true,
            rules: vec![FieldRule::new("pythonCode", JsonKind::String)],
            editor_requirements: vec![requirement(
                "language",
                RequirementCheck::OneOf(&["python", "pythonNative"]),
                Severity::Error,
                "pythonCode is ignored unless language is python",
                "set language to \"python\"",
            )],
        },
        Format {
            name: "function_code",
            status: FormatStatus::Deprecated,
            description: "Legacy Function node functionCode",
            editor_compatible: false,
            storage_compatible: true,
            rules: vec![FieldRule::new("functionCode", JsonKind::String)],
            editor_requirements: Vec::new(),
        },
    ]
}

fn webhook_formats() -> Vec<Format> {
    vec![Format {
        name: "path_method_v2",
        status: FormatStatus::Recommended,
        description: "path + httpMethod with a response mode",
        editor_compatible: true,
        storage_compatible: true,
        rules: vec![
            FieldRule::new("path", JsonKind::String),
            FieldRule::new("httpMethod", JsonKind::String),
        ],
        editor_requirements: vec![
            requirement(
                "path",
                custom("path is non-empty", non_empty_string),
                Severity::Error,
                "a webhook without a path cannot be registered",
                "set path to a unique URL segment",
            ),
            requirement(
                "responseMode",
                RequirementCheck::OneOf(WEBHOOK_RESPONSE_MODES),
                Severity::Warning,
                "unknown response mode",
                "use onReceived, lastNode or responseNode",
            ),
        ],
    }]
}

fn schedule_formats() -> Vec<Format> {
    vec![
        Format {
            name: "rule_interval",
            status: FormatStatus::Recommended,
            description: "rule.interval list of interval definitions",
            editor_compatible: true,
            storage_compatible: true,
            rules: vec![FieldRule::new("rule.interval", JsonKind::Array)],
            editor_requirements: vec![requirement(
                "rule.interval",
                custom("at least one interval", non_empty_array),
                Severity::Error,
                "a schedule without intervals never fires",
                "add an interval such as {\"field\": \"hours\", \"hoursInterval\": 1}",
            )],
        },
        Format {
            name: "cron_trigger_times",
            status: FormatStatus::Deprecated,
            description: "Legacy Cron node triggerTimes.item list",
            editor_compatible: false,
            storage_compatible: true,
            rules: vec![FieldRule::new("triggerTimes.item", JsonKind::Array)],
            editor_requirements: Vec::new(),
        },
    ]
}

fn merge_formats() -> Vec<Format> {
    vec![Format {
        name: "mode_v3",
        status: FormatStatus::Recommended,
        description: "mode selects how the two inputs combine",
        editor_compatible: true,
        storage_compatible: true,
        rules: vec![FieldRule::new("mode", JsonKind::String)],
        editor_requirements: vec![requirement(
            "mode",
            RequirementCheck::OneOf(MERGE_MODES),
            Severity::Warning,
            "unknown merge mode",
            "use append, combine or chooseBranch",
        )],
    }]
}

/// Formats for every node type that has them.
#[must_use]
pub fn schemas(registry: &NodeTypeRegistry) -> Vec<NodeSchema> {
    [
        (NodeKind::If, if_formats()),
        (NodeKind::Switch, switch_formats()),
        (NodeKind::Set, set_formats()),
        (NodeKind::HttpRequest, http_request_formats()),
        (NodeKind::Code, code_formats()),
        (NodeKind::Webhook, webhook_formats()),
        (NodeKind::Schedule, schedule_formats()),
        (NodeKind::Merge, merge_formats()),
    ]
    .into_iter()
    .filter_map(|(kind, formats)| schema(registry, kind, formats))
    .collect()
}

fn if_has_typed_conditions(params: &JsonValue) -> bool {
    ["string", "number", "boolean", "dateTime"]
        .iter()
        .any(|key| path::lookup(params, &format!("conditions.{key}")).is_some_and(JsonValue::is_array))
}

fn if_condition_missing_id(params: &JsonValue) -> bool {
    path::lookup_array(params, "conditions.conditions")
        .is_some_and(|items| !items.iter().all(has_id))
}

fn if_block_missing_options(params: &JsonValue) -> bool {
    path::lookup_array(params, "conditions.conditions").is_some()
        && path::lookup(params, "conditions.options").is_none()
}

fn switch_uses_legacy_rules(params: &JsonValue) -> bool {
    path::lookup_array(params, "rules.rules").is_some()
}

fn switch_has_extra_fallback(params: &JsonValue) -> bool {
    path::lookup_str(params, "options.fallbackOutput") == Some("extra")
}

fn set_uses_legacy_values(params: &JsonValue) -> bool {
    params.get("values").is_some_and(JsonValue::is_object)
}

fn http_uses_request_method(params: &JsonValue) -> bool {
    params.get("requestMethod").is_some()
}

fn webhook_path_has_leading_slash(params: &JsonValue) -> bool {
    path::lookup_str(params, "path").is_some_and(|p| p.starts_with('/'))
}

/// The documented quirks.
#[must_use]
pub fn quirks() -> Vec<Quirk> {
    vec![
        Quirk {
            id: "if-typed-conditions-blank-editor",
            title: "IF v2 renders typed v1 conditions as empty",
            node_types: vec![NodeKind::If],
            affected_versions: vec![2.0],
            severity: QuirkSeverity::Critical,
            symptoms: vec![
                "conditions appear empty in the editor",
                "IF node shows no conditions after import",
                "workflow saves but conditions disappear",
            ],
            root_cause: "typeVersion 2 reads conditions.conditions; the storage API still accepts the v1 string/number/boolean groups",
            workaround: "convert each typed entry into a condition with leftValue, rightValue and an operator object",
            auto_fix_available: true,
            detector: Some(if_has_typed_conditions),
        },
        Quirk {
            id: "if-condition-missing-id",
            title: "IF conditions without ids crash the editor",
            node_types: vec![NodeKind::If],
            affected_versions: vec![2.0],
            severity: QuirkSeverity::Critical,
            symptoms: vec![
                "editor crashes when opening IF node",
                "Cannot read properties of undefined (reading 'id')",
                "node panel fails to open",
            ],
            root_cause: "the editor keys condition rows by id and does not tolerate missing ids",
            workaround: "assign a unique string id to every condition",
            auto_fix_available: true,
            detector: Some(if_condition_missing_id),
        },
        Quirk {
            id: "if-missing-condition-options",
            title: "IF condition block without options fails to load",
            node_types: vec![NodeKind::If],
            affected_versions: vec![2.0],
            severity: QuirkSeverity::Critical,
            symptoms: vec![
                "Could not find property option",
                "IF node parameters fail to load",
            ],
            root_cause: "the editor reads conditions.options.typeValidation before rendering any row",
            workaround: "add conditions.options with caseSensitive, leftValue and typeValidation",
            auto_fix_available: true,
            detector: Some(if_block_missing_options),
        },
        Quirk {
            id: "switch-legacy-rules-array",
            title: "Switch v3 ignores legacy rules.rules",
            node_types: vec![NodeKind::Switch],
            affected_versions: vec![3.0],
            severity: QuirkSeverity::Critical,
            symptoms: vec![
                "switch rules not shown in the editor",
                "all items routed to the first output",
                "switch node has no outputs in editor",
            ],
            root_cause: "typeVersion 3 reads rules.values; rules.rules from version 2 is stored but never evaluated",
            workaround: "rewrite every rule as a rules.values entry with a full condition block",
            auto_fix_available: false,
            detector: Some(switch_uses_legacy_rules),
        },
        Quirk {
            id: "switch-fallback-extra-output",
            title: "Switch fallback output adds an unindexed port",
            node_types: vec![NodeKind::Switch],
            affected_versions: vec![3.0],
            severity: QuirkSeverity::Warning,
            symptoms: vec![
                "extra output appears on switch node",
                "fallback branch connected to wrong output",
                "items routed to unexpected output",
            ],
            root_cause: "fallbackOutput \"extra\" appends a port after the rule outputs that is not counted as a rule",
            workaround: "add an explicit catch-all rule instead of the extra fallback output",
            auto_fix_available: false,
            detector: Some(switch_has_extra_fallback),
        },
        Quirk {
            id: "set-legacy-values",
            title: "Set v3 drops legacy typed values",
            node_types: vec![NodeKind::Set],
            affected_versions: vec![3.4],
            severity: QuirkSeverity::Warning,
            symptoms: vec![
                "set node fields missing in editor",
                "fields disappear after opening node",
            ],
            root_cause: "version 3 reads assignments.assignments; values.string/number are only understood by version 2",
            workaround: "express each field as an assignment with id, name, value and type",
            auto_fix_available: false,
            detector: Some(set_uses_legacy_values),
        },
        Quirk {
            id: "http-request-legacy-method",
            title: "HTTP Request v4 ignores requestMethod",
            node_types: vec![NodeKind::HttpRequest],
            affected_versions: vec![4.2],
            severity: QuirkSeverity::Warning,
            symptoms: vec!["request always sent as GET", "method setting ignored"],
            root_cause: "version 4 reads method; requestMethod is a version 1 field",
            workaround: "use method instead of requestMethod",
            auto_fix_available: false,
            detector: Some(http_uses_request_method),
        },
        Quirk {
            id: "webhook-leading-slash-path",
            title: "Webhook path with a leading slash",
            node_types: vec![NodeKind::Webhook],
            affected_versions: vec![2.0],
            severity: QuirkSeverity::Warning,
            symptoms: vec!["webhook URL contains double slash", "webhook returns 404"],
            root_cause: "the platform joins its webhook prefix and the path with a slash",
            workaround: "drop the leading slash from path",
            auto_fix_available: true,
            detector: Some(webhook_path_has_leading_slash),
        },
        Quirk {
            id: "branch-single-slot-connections",
            title: "Branch outputs collapse into a single connection slot",
            node_types: vec![NodeKind::If, NodeKind::Switch],
            affected_versions: vec![2.0, 3.0],
            severity: QuirkSeverity::Critical,
            symptoms: vec![
                "false branch never executes",
                "second output never fires",
                "all items go to first output",
                "branches connected to wrong output",
            ],
            root_cause: "a connection map built with a single pre-filled output slot puts every target on output 0",
            workaround: "wire each branch to its own output index and let the output array grow per index",
            auto_fix_available: true,
            detector: None,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shaping;
    use serde_json::{Map, json};

    #[test]
    fn schemas_cover_branching_types() {
        let registry = NodeTypeRegistry::builtin();
        let schemas = schemas(&registry);
        assert!(schemas.iter().any(|s| s.node_type == NodeKind::If));
        assert!(schemas.iter().any(|s| s.node_type == NodeKind::Switch));
        for schema in &schemas {
            assert!(schema.recommended().is_some(), "{} lacks a recommended format", schema.node_type);
        }
    }

    #[test]
    fn shaped_defaults_match_recommended_formats() {
        let registry = NodeTypeRegistry::builtin();
        for schema in schemas(&registry) {
            let params = shaping::shape(schema.node_type, &Map::new());
            let recommended = schema.recommended().expect("recommended");
            assert!(recommended.matches(&params), "{} defaults", schema.node_type);
            for requirement in &recommended.editor_requirements {
                if requirement.severity == Severity::Error {
                    assert!(
                        requirement.is_satisfied(&params),
                        "{} defaults fail {}",
                        schema.node_type,
                        requirement.message
                    );
                }
            }
        }
    }

    #[test]
    fn quirk_ids_are_unique() {
        let quirks = quirks();
        let mut ids: Vec<_> = quirks.iter().map(|q| q.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), quirks.len());
    }

    #[test]
    fn detectors_recognize_their_shapes() {
        assert!(if_has_typed_conditions(&json!({ "conditions": { "string": [] } })));
        assert!(if_condition_missing_id(&json!({ "conditions": { "conditions": [{}] } })));
        assert!(switch_has_extra_fallback(&json!({ "options": { "fallbackOutput": "extra" } })));
        assert!(!switch_uses_legacy_rules(&json!({ "rules": { "values": [] } })));
    }
}
