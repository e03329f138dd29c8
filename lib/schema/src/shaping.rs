//! Per-type parameter shaping.
//!
//! Each simplified node type owns a pure function that merges caller
//! configuration into the type's default parameters. Conditional and
//! multi-way routers additionally expand simplified condition blocks into
//! the structure the editor requires, synthesizing any missing condition ids.

use crate::path;
use crate::registry::NodeKind;
use serde_json::{Map, Value as JsonValue, json};
use ulid::Ulid;

/// Shapes caller configuration into platform parameters for `kind`.
#[must_use]
pub fn shape(kind: NodeKind, config: &Map<String, JsonValue>) -> JsonValue {
    match kind {
        NodeKind::Webhook => shape_webhook(config),
        NodeKind::Code => shape_code(config),
        NodeKind::Set => shape_set(config),
        NodeKind::If => shape_if(config),
        NodeKind::Switch => shape_switch(config),
        _ => merged(defaults(kind), config),
    }
}

/// Output ports exposed by a node of `kind` with `parameters`.
///
/// A conditional router always has two. A multi-way router has one per
/// configured rule, falling back to two when no rules are configured.
#[must_use]
pub fn expected_outputs(kind: NodeKind, parameters: &JsonValue) -> usize {
    match kind {
        NodeKind::If => 2,
        NodeKind::Switch => match rule_count(parameters) {
            0 => 2,
            rules => rules,
        },
        _ => 1,
    }
}

/// Number of rules configured on a multi-way router, in either rule layout.
#[must_use]
pub fn rule_count(parameters: &JsonValue) -> usize {
    path::lookup_array(parameters, "rules.values")
        .or_else(|| path::lookup_array(parameters, "rules.rules"))
        .map_or(0, Vec::len)
}

/// Default parameters for each type.
#[must_use]
pub fn defaults(kind: NodeKind) -> JsonValue {
    match kind {
        NodeKind::ManualTrigger | NodeKind::NoOp => json!({}),
        NodeKind::Webhook => json!({
            "httpMethod": "POST",
            "path": Ulid::new().to_string().to_lowercase(),
            "responseMode": "onReceived",
            "options": {},
        }),
        NodeKind::Schedule => json!({
            "rule": { "interval": [{ "field": "hours", "hoursInterval": 1 }] },
        }),
        NodeKind::HttpRequest => json!({
            "method": "GET",
            "url": "",
            "options": {},
        }),
        NodeKind::Code => json!({
            "mode": "runOnceForAllItems",
            "jsCode": "return $input.all();",
        }),
        NodeKind::Set => json!({
            "mode": "manual",
            "assignments": { "assignments": [] },
            "options": {},
        }),
        NodeKind::If => json!({
            "conditions": condition_block(Vec::new(), "and"),
            "options": {},
        }),
        NodeKind::Switch => json!({
            "mode": "rules",
            "rules": { "values": [] },
            "options": {},
        }),
        NodeKind::Merge => json!({ "mode": "append" }),
        NodeKind::Wait => json!({ "amount": 1, "unit": "minutes" }),
        NodeKind::Slack => json!({
            "resource": "message",
            "operation": "post",
            "channel": "",
            "text": "",
            "otherOptions": {},
        }),
        NodeKind::EmailSend => json!({
            "fromEmail": "",
            "toEmail": "",
            "subject": "",
            "emailFormat": "text",
            "text": "",
            "options": {},
        }),
        NodeKind::Postgres => json!({
            "operation": "executeQuery",
            "query": "",
            "options": {},
        }),
        NodeKind::GoogleSheets => json!({
            "operation": "append",
            "documentId": "",
            "sheetName": "",
            "columns": { "mappingMode": "autoMapInputData", "value": {} },
            "options": {},
        }),
        NodeKind::RespondToWebhook => json!({
            "respondWith": "json",
            "responseBody": "={{ $json }}",
            "options": {},
        }),
    }
}

/// Recursively merges `overlay` into `base`. Objects merge key by key;
/// everything else is replaced.
pub fn deep_merge(base: &mut JsonValue, overlay: &JsonValue) {
    match (base, overlay) {
        (JsonValue::Object(base_map), JsonValue::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

fn merged(mut base: JsonValue, config: &Map<String, JsonValue>) -> JsonValue {
    deep_merge(&mut base, &JsonValue::Object(config.clone()));
    base
}

/// Merges every key of `config` except `skip` into the defaults.
fn merged_except(kind: NodeKind, config: &Map<String, JsonValue>, skip: &[&str]) -> JsonValue {
    let rest: Map<String, JsonValue> = config
        .iter()
        .filter(|(key, _)| !skip.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    merged(defaults(kind), &rest)
}

fn new_id() -> String {
    Ulid::new().to_string().to_lowercase()
}

fn shape_webhook(config: &Map<String, JsonValue>) -> JsonValue {
    let mut params = merged_except(NodeKind::Webhook, config, &["method"]);
    if let Some(method) = config.get("method").and_then(JsonValue::as_str) {
        if !config.contains_key("httpMethod") {
            params["httpMethod"] = json!(method.to_ascii_uppercase());
        }
    }
    if let Some(trimmed) = params["path"].as_str().map(|p| p.trim_start_matches('/').to_string()) {
        params["path"] = json!(trimmed);
    }
    params
}

fn shape_code(config: &Map<String, JsonValue>) -> JsonValue {
    if config.contains_key("pythonCode") {
        let mut params = json!({ "mode": "runOnceForAllItems", "language": "python" });
        deep_merge(&mut params, &JsonValue::Object(config.clone()));
        return params;
    }
    if config.contains_key("functionCode") {
        return JsonValue::Object(config.clone());
    }
    merged(defaults(NodeKind::Code), config)
}

fn shape_set(config: &Map<String, JsonValue>) -> JsonValue {
    if config.contains_key("values") {
        // Legacy layout: leave the structure alone so validation can flag it.
        let mut params = json!({ "options": {} });
        deep_merge(&mut params, &JsonValue::Object(config.clone()));
        return params;
    }

    let mut params = merged_except(NodeKind::Set, config, &["fields", "assignments"]);
    let mut assignments = match config.get("assignments") {
        Some(JsonValue::Array(items)) => items.clone(),
        Some(JsonValue::Object(block)) => block
            .get("assignments")
            .and_then(JsonValue::as_array)
            .cloned()
            .unwrap_or_default(),
        _ => Vec::new(),
    };
    if let Some(JsonValue::Object(fields)) = config.get("fields") {
        assignments.extend(
            fields
                .iter()
                .map(|(name, value)| json!({ "name": name, "value": value })),
        );
    }

    let assignments: Vec<JsonValue> = assignments.iter().map(complete_assignment).collect();
    params["assignments"] = json!({ "assignments": assignments });
    params
}

fn complete_assignment(raw: &JsonValue) -> JsonValue {
    let mut assignment = raw.clone();
    if let JsonValue::Object(map) = &mut assignment {
        if !map.get("id").is_some_and(|id| id.as_str().is_some_and(|s| !s.is_empty())) {
            map.insert("id".to_string(), json!(new_id()));
        }
        if !map.contains_key("type") {
            let kind = map.get("value").map_or("string", value_type_name);
            map.insert("type".to_string(), json!(kind));
        }
    }
    assignment
}

fn value_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Number(_) => "number",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
        JsonValue::Null | JsonValue::String(_) => "string",
    }
}

fn condition_options() -> JsonValue {
    json!({ "caseSensitive": true, "leftValue": "", "typeValidation": "strict" })
}

fn condition_block(conditions: Vec<JsonValue>, combinator: &str) -> JsonValue {
    json!({
        "options": condition_options(),
        "conditions": conditions,
        "combinator": combinator,
    })
}

fn combinator_of(config: &Map<String, JsonValue>) -> &'static str {
    let raw = config
        .get("combinator")
        .or_else(|| config.get("combineOperation"))
        .and_then(JsonValue::as_str)
        .unwrap_or("and");
    match raw.to_ascii_lowercase().as_str() {
        "or" | "any" => "or",
        _ => "and",
    }
}

fn shape_if(config: &Map<String, JsonValue>) -> JsonValue {
    let mut params = merged_except(
        NodeKind::If,
        config,
        &["conditions", "condition", "combinator", "combineOperation"],
    );
    let combinator = combinator_of(config);

    let block = match (config.get("conditions"), config.get("condition")) {
        (Some(JsonValue::Array(items)), _) => {
            condition_block(items.iter().map(expand_condition).collect(), combinator)
        }
        (Some(JsonValue::Object(existing)), _) if is_typed_legacy(existing) => {
            condition_block(expand_typed_legacy(existing), combinator)
        }
        (Some(JsonValue::Object(existing)), _) => complete_block(existing, combinator),
        (None, Some(single)) => condition_block(vec![expand_condition(single)], combinator),
        _ => condition_block(Vec::new(), combinator),
    };
    params["conditions"] = block;
    params
}

fn shape_switch(config: &Map<String, JsonValue>) -> JsonValue {
    let mut params = merged_except(
        NodeKind::Switch,
        config,
        &["rules", "fallback_output"],
    );

    match config.get("rules") {
        Some(JsonValue::Array(rules)) => {
            let values: Vec<JsonValue> = rules.iter().map(expand_rule).collect();
            params["rules"] = json!({ "values": values });
        }
        Some(JsonValue::Object(block)) if block.contains_key("rules") => {
            // Legacy layout is kept verbatim; it has no automatic conversion.
            params["rules"] = JsonValue::Object(block.clone());
        }
        Some(JsonValue::Object(block)) => {
            let values: Vec<JsonValue> = block
                .get("values")
                .and_then(JsonValue::as_array)
                .map(|rules| rules.iter().map(expand_rule).collect())
                .unwrap_or_default();
            params["rules"] = json!({ "values": values });
        }
        _ => {}
    }

    if let Some(fallback) = config.get("fallback_output") {
        if !params["options"].is_object() {
            params["options"] = json!({});
        }
        params["options"]["fallbackOutput"] = fallback.clone();
    }
    params
}

/// Expands one multi-way router rule.
///
/// A rule is either a bare condition or an object with its own
/// `conditions` list; `output_key` renames the rule's output.
fn expand_rule(raw: &JsonValue) -> JsonValue {
    let Some(map) = raw.as_object() else {
        return json!({ "conditions": condition_block(Vec::new(), "and") });
    };

    let combinator = combinator_of(map);
    let conditions = match map.get("conditions") {
        Some(JsonValue::Array(items)) => {
            condition_block(items.iter().map(expand_condition).collect(), combinator)
        }
        Some(JsonValue::Object(existing)) => complete_block(existing, combinator),
        _ => condition_block(vec![expand_condition(raw)], combinator),
    };

    let mut rule = json!({ "conditions": conditions });
    let output_key = map.get("output_key").or_else(|| map.get("outputKey"));
    if let Some(key) = output_key {
        rule["renameOutput"] = json!(true);
        rule["outputKey"] = key.clone();
    }
    rule
}

/// Fills in a condition block that already uses the editor layout.
fn complete_block(existing: &Map<String, JsonValue>, combinator: &str) -> JsonValue {
    let conditions: Vec<JsonValue> = existing
        .get("conditions")
        .and_then(JsonValue::as_array)
        .map(|items| items.iter().map(expand_condition).collect())
        .unwrap_or_default();

    let mut options = condition_options();
    if let Some(provided) = existing.get("options") {
        deep_merge(&mut options, provided);
    }
    let combinator = existing
        .get("combinator")
        .and_then(JsonValue::as_str)
        .unwrap_or(combinator);

    json!({
        "options": options,
        "conditions": conditions,
        "combinator": combinator,
    })
}

fn is_typed_legacy(block: &Map<String, JsonValue>) -> bool {
    ["string", "number", "boolean", "dateTime"]
        .iter()
        .any(|key| block.get(*key).is_some_and(JsonValue::is_array))
}

fn expand_typed_legacy(block: &Map<String, JsonValue>) -> Vec<JsonValue> {
    ["string", "number", "boolean", "dateTime"]
        .iter()
        .filter_map(|data_type| {
            block
                .get(*data_type)
                .and_then(JsonValue::as_array)
                .map(|items| (*data_type, items))
        })
        .flat_map(|(data_type, items)| {
            items.iter().map(move |item| {
                let operation = item
                    .get("operation")
                    .and_then(JsonValue::as_str)
                    .unwrap_or("equal");
                let (operation, single) = normalize_operation(operation);
                let mut operator = json!({ "type": data_type, "operation": operation });
                if single {
                    operator["singleValue"] = json!(true);
                }
                json!({
                    "id": new_id(),
                    "leftValue": item.get("value1").cloned().unwrap_or_else(|| json!("")),
                    "rightValue": item.get("value2").cloned().unwrap_or_else(|| json!("")),
                    "operator": operator,
                })
            })
        })
        .collect()
}

/// Expands a simplified condition into the editor layout.
///
/// Accepts `left`/`leftValue`/`value1`, `right`/`rightValue`/`value2`, and an
/// operator given either as a name (`"equals"`, `">"`) or as an object.
fn expand_condition(raw: &JsonValue) -> JsonValue {
    let pick = |keys: &[&str]| {
        keys.iter()
            .find_map(|key| raw.get(*key))
            .cloned()
            .unwrap_or_else(|| json!(""))
    };
    let left = pick(&["leftValue", "left", "value1"]);
    let right = pick(&["rightValue", "right", "value2"]);

    let operator = match raw.get("operator").or_else(|| raw.get("operation")) {
        Some(JsonValue::Object(op)) => {
            let mut operator = JsonValue::Object(op.clone());
            if operator.get("type").is_none() {
                operator["type"] = json!(infer_operand_type(&right));
            }
            if operator.get("operation").is_none() {
                operator["operation"] = json!("equals");
            }
            operator
        }
        Some(JsonValue::String(name)) => operator_from_name(name, &right),
        _ => json!({ "type": infer_operand_type(&right), "operation": "equals" }),
    };

    let id = raw
        .get("id")
        .and_then(JsonValue::as_str)
        .filter(|id| !id.is_empty())
        .map_or_else(new_id, str::to_string);

    json!({
        "id": id,
        "leftValue": left,
        "rightValue": right,
        "operator": operator,
    })
}

fn infer_operand_type(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Number(_) => "number",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
        JsonValue::Null | JsonValue::String(_) => "string",
    }
}

/// Maps operator aliases to the editor's operation name. The flag marks
/// unary operations.
fn normalize_operation(name: &str) -> (&'static str, bool) {
    match name.trim() {
        "==" | "=" | "eq" | "equal" | "equals" | "is" => ("equals", false),
        "!=" | "ne" | "notEqual" | "notEquals" | "isNot" => ("notEquals", false),
        ">" | "gt" | "larger" => ("gt", false),
        ">=" | "gte" | "largerEqual" => ("gte", false),
        "<" | "lt" | "smaller" => ("lt", false),
        "<=" | "lte" | "smallerEqual" => ("lte", false),
        "contains" => ("contains", false),
        "notContains" => ("notContains", false),
        "startsWith" => ("startsWith", false),
        "endsWith" => ("endsWith", false),
        "regex" => ("regex", false),
        "isEmpty" | "empty" => ("empty", true),
        "isNotEmpty" | "notEmpty" => ("notEmpty", true),
        "true" | "isTrue" => ("true", true),
        "false" | "isFalse" => ("false", true),
        "exists" => ("exists", true),
        _ => ("equals", false),
    }
}

fn operator_from_name(name: &str, right: &JsonValue) -> JsonValue {
    let (operation, single) = normalize_operation(name);
    let operand_type = match operation {
        "gt" | "gte" | "lt" | "lte" => "number",
        "contains" | "notContains" | "startsWith" | "endsWith" | "regex" => "string",
        "true" | "false" => "boolean",
        _ => infer_operand_type(right),
    };

    let mut operator = json!({ "type": operand_type, "operation": operation });
    if single {
        operator["singleValue"] = json!(true);
    }
    operator
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(value: JsonValue) -> Map<String, JsonValue> {
        value.as_object().cloned().expect("object config")
    }

    #[test]
    fn if_without_config_has_editor_block() {
        let params = shape(NodeKind::If, &Map::new());
        assert_eq!(params["conditions"]["combinator"], "and");
        assert_eq!(params["conditions"]["options"]["typeValidation"], "strict");
        assert_eq!(params["conditions"]["conditions"], json!([]));
        assert_eq!(expected_outputs(NodeKind::If, &params), 2);
    }

    #[test]
    fn if_expands_simplified_conditions_with_ids() {
        let params = shape(
            NodeKind::If,
            &config(json!({
                "conditions": [{ "left": "={{ $json.total }}", "operator": ">", "right": 100 }],
                "combinator": "any",
            })),
        );
        let condition = &params["conditions"]["conditions"][0];
        assert!(condition["id"].as_str().is_some_and(|id| !id.is_empty()));
        assert_eq!(condition["operator"]["type"], "number");
        assert_eq!(condition["operator"]["operation"], "gt");
        assert_eq!(condition["rightValue"], 100);
        assert_eq!(params["conditions"]["combinator"], "or");
    }

    #[test]
    fn if_keeps_existing_ids_and_fills_options() {
        let params = shape(
            NodeKind::If,
            &config(json!({
                "conditions": {
                    "conditions": [{
                        "id": "keep-me",
                        "leftValue": "a",
                        "rightValue": "a",
                        "operator": { "type": "string", "operation": "equals" },
                    }],
                    "combinator": "and",
                }
            })),
        );
        assert_eq!(params["conditions"]["conditions"][0]["id"], "keep-me");
        assert_eq!(params["conditions"]["options"]["caseSensitive"], true);
    }

    #[test]
    fn if_converts_typed_legacy_conditions() {
        let params = shape(
            NodeKind::If,
            &config(json!({
                "conditions": { "string": [{ "value1": "x", "operation": "contains", "value2": "y" }] }
            })),
        );
        let condition = &params["conditions"]["conditions"][0];
        assert_eq!(condition["operator"]["type"], "string");
        assert_eq!(condition["operator"]["operation"], "contains");
        assert_eq!(condition["leftValue"], "x");
    }

    #[test]
    fn switch_output_count_tracks_rules() {
        let none = shape(NodeKind::Switch, &Map::new());
        assert_eq!(expected_outputs(NodeKind::Switch, &none), 2);

        let one = shape(
            NodeKind::Switch,
            &config(json!({ "rules": [{ "left": "={{ $json.kind }}", "operator": "equals", "right": "a" }] })),
        );
        assert_eq!(expected_outputs(NodeKind::Switch, &one), 1);

        let three = shape(
            NodeKind::Switch,
            &config(json!({ "rules": [
                { "left": "={{ $json.kind }}", "right": "a", "output_key": "A" },
                { "left": "={{ $json.kind }}", "right": "b" },
                { "left": "={{ $json.kind }}", "right": "c" },
            ] })),
        );
        assert_eq!(expected_outputs(NodeKind::Switch, &three), 3);
        assert_eq!(three["rules"]["values"][0]["outputKey"], "A");
        assert_eq!(three["rules"]["values"][0]["renameOutput"], true);
        assert!(three["rules"]["values"][1]["conditions"]["conditions"][0]["id"].is_string());
    }

    #[test]
    fn switch_legacy_rules_are_counted_but_not_rewritten() {
        let params = shape(
            NodeKind::Switch,
            &config(json!({ "rules": { "rules": [{ "value2": 1 }, { "value2": 2 }, { "value2": 3 }] } })),
        );
        assert!(params["rules"].get("values").is_none());
        assert_eq!(rule_count(&params), 3);
    }

    #[test]
    fn switch_fallback_goes_into_options() {
        let params = shape(NodeKind::Switch, &config(json!({ "fallback_output": "extra" })));
        assert_eq!(params["options"]["fallbackOutput"], "extra");
    }

    #[test]
    fn set_fields_become_assignments() {
        let params = shape(
            NodeKind::Set,
            &config(json!({ "fields": { "count": 3, "label": "x" } })),
        );
        let assignments = params["assignments"]["assignments"].as_array().expect("array");
        assert_eq!(assignments.len(), 2);
        assert!(assignments.iter().all(|a| a["id"].is_string()));
        let count = assignments.iter().find(|a| a["name"] == "count").expect("count");
        assert_eq!(count["type"], "number");
    }

    #[test]
    fn webhook_strips_leading_slash_and_maps_method() {
        let params = shape(
            NodeKind::Webhook,
            &config(json!({ "path": "/orders", "method": "get" })),
        );
        assert_eq!(params["path"], "orders");
        assert_eq!(params["httpMethod"], "GET");
        assert!(params.get("method").is_none());
    }

    #[test]
    fn plain_types_merge_over_defaults() {
        let params = shape(
            NodeKind::HttpRequest,
            &config(json!({ "url": "https://example.com", "options": { "timeout": 5000 } })),
        );
        assert_eq!(params["method"], "GET");
        assert_eq!(params["url"], "https://example.com");
        assert_eq!(params["options"]["timeout"], 5000);
        assert_eq!(expected_outputs(NodeKind::HttpRequest, &params), 1);
    }

    #[test]
    fn python_code_replaces_js_default() {
        let params = shape(
            NodeKind::Code,
            &config(json!({ "pythonCode": "return items" })),
        );
        assert_eq!(params["language"], "python");
        assert!(params.get("jsCode").is_none());
    }
}
