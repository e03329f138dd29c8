//! Parameter formats.
//!
//! A format is one historically accepted parameter shape for a node type.
//! Structural rules decide whether parameters match the format at all;
//! editor requirements decide whether the matched shape will render.

use crate::path;
use crate::registry::NodeKind;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Value as JsonValue, json};

/// Lifecycle status of a format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatStatus {
    Recommended,
    Deprecated,
    Experimental,
}

/// JSON value kinds used by structural rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonKind {
    Any,
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl JsonKind {
    /// Returns true if `value` is of this kind.
    #[must_use]
    pub fn matches(&self, value: &JsonValue) -> bool {
        match self {
            Self::Any => true,
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }
}

/// A field that must be present with the given kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldRule {
    /// Dotted path into the parameters.
    pub path: &'static str,
    /// Required kind.
    pub kind: JsonKind,
}

impl FieldRule {
    #[must_use]
    pub const fn new(path: &'static str, kind: JsonKind) -> Self {
        Self { path, kind }
    }

    /// Returns true if the rule holds for `parameters`.
    #[must_use]
    pub fn holds(&self, parameters: &JsonValue) -> bool {
        path::lookup(parameters, self.path).is_some_and(|value| self.kind.matches(value))
    }
}

/// Severity of a failed editor requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// How an editor requirement inspects its field.
///
/// `Type` and `OneOf` only apply when the field is present; absence is
/// caught by `Exists`. `Custom` predicates receive `null` for absent fields.
#[derive(Debug, Clone)]
pub enum RequirementCheck {
    Exists,
    Type(JsonKind),
    OneOf(&'static [&'static str]),
    Custom {
        description: &'static str,
        predicate: fn(&JsonValue) -> bool,
    },
}

impl RequirementCheck {
    fn passes(&self, value: Option<&JsonValue>) -> bool {
        match (self, value) {
            (Self::Exists, found) => found.is_some_and(|v| !v.is_null()),
            (Self::Type(_) | Self::OneOf(_), None) => true,
            (Self::Type(kind), Some(v)) => kind.matches(v),
            (Self::OneOf(allowed), Some(v)) => v.as_str().is_some_and(|s| allowed.contains(&s)),
            (Self::Custom { predicate, .. }, found) => predicate(found.unwrap_or(&JsonValue::Null)),
        }
    }

    fn describe(&self) -> JsonValue {
        match self {
            Self::Exists => json!({ "check": "exists" }),
            Self::Type(kind) => json!({ "check": "type", "kind": kind }),
            Self::OneOf(allowed) => json!({ "check": "value", "allowed": allowed }),
            Self::Custom { description, .. } => {
                json!({ "check": "custom", "description": description })
            }
        }
    }
}

impl Serialize for RequirementCheck {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.describe().serialize(serializer)
    }
}

/// A check the editor needs to pass to render the node.
#[derive(Debug, Clone, Serialize)]
pub struct EditorRequirement {
    /// Dotted path of the inspected field.
    pub path: &'static str,
    /// The check applied.
    pub check: RequirementCheck,
    /// Whether failure is an error or a warning.
    pub severity: Severity,
    /// What goes wrong when the check fails.
    pub message: &'static str,
    /// How to fix it.
    pub fix: &'static str,
}

impl EditorRequirement {
    /// Returns true if `parameters` satisfy the requirement.
    #[must_use]
    pub fn is_satisfied(&self, parameters: &JsonValue) -> bool {
        self.check.passes(path::lookup(parameters, self.path))
    }
}

/// One accepted parameter shape.
#[derive(Debug, Clone, Serialize)]
pub struct Format {
    pub name: &'static str,
    pub status: FormatStatus,
    pub description: &'static str,
    /// Renders correctly in the visual editor.
    pub editor_compatible: bool,
    /// Accepted by the storage API.
    pub storage_compatible: bool,
    pub rules: Vec<FieldRule>,
    pub editor_requirements: Vec<EditorRequirement>,
}

impl Format {
    /// Returns true if every structural rule holds.
    #[must_use]
    pub fn matches(&self, parameters: &JsonValue) -> bool {
        self.rules.iter().all(|rule| rule.holds(parameters))
    }
}

/// Registered formats for one node type.
#[derive(Debug, Clone, Serialize)]
pub struct NodeSchema {
    pub node_type: NodeKind,
    pub target_type: &'static str,
    pub version: f64,
    /// Formats in matching order.
    pub formats: Vec<Format>,
}

impl NodeSchema {
    /// The recommended format, if one is registered.
    #[must_use]
    pub fn recommended(&self) -> Option<&Format> {
        self.formats
            .iter()
            .find(|format| format.status == FormatStatus::Recommended)
    }

    /// Names of every format, with status.
    #[must_use]
    pub fn format_names(&self) -> Vec<String> {
        self.formats
            .iter()
            .map(|format| {
                let status = match format.status {
                    FormatStatus::Recommended => "recommended",
                    FormatStatus::Deprecated => "deprecated",
                    FormatStatus::Experimental => "experimental",
                };
                format!("{} ({status})", format.name)
            })
            .collect()
    }
}
