//! Known storage/editor mismatches.

use crate::registry::NodeKind;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// How badly a quirk breaks the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuirkSeverity {
    Critical,
    Warning,
}

/// A documented case where the storage API accepts a shape the editor
/// cannot render or the runtime misinterprets.
#[derive(Debug, Clone, Serialize)]
pub struct Quirk {
    pub id: &'static str,
    pub title: &'static str,
    pub node_types: Vec<NodeKind>,
    pub affected_versions: Vec<f64>,
    pub severity: QuirkSeverity,
    pub symptoms: Vec<&'static str>,
    pub root_cause: &'static str,
    pub workaround: &'static str,
    pub auto_fix_available: bool,
    /// Recognizes the quirk in a node's parameters. Quirks without a
    /// detector live at the graph level and are only found by search.
    #[serde(skip)]
    pub detector: Option<fn(&JsonValue) -> bool>,
}

impl Quirk {
    /// Returns true if the quirk concerns `kind`.
    #[must_use]
    pub fn affects(&self, kind: NodeKind) -> bool {
        self.node_types.contains(&kind)
    }

    /// Returns true if the detector recognizes `parameters`.
    #[must_use]
    pub fn detected_in(&self, parameters: &JsonValue) -> bool {
        self.detector.is_some_and(|detect| detect(parameters))
    }

    /// Case-insensitive substring match: any keyword against any symptom.
    #[must_use]
    pub fn matches_symptoms<S: AsRef<str>>(&self, keywords: &[S]) -> bool {
        let symptoms: Vec<String> = self.symptoms.iter().map(|s| s.to_lowercase()).collect();
        keywords
            .iter()
            .map(|keyword| keyword.as_ref().trim().to_lowercase())
            .filter(|keyword| !keyword.is_empty())
            .any(|keyword| symptoms.iter().any(|symptom| symptom.contains(&keyword)))
    }
}
