//! Node-type knowledge for the target workflow platform.
//!
//! The platform's storage API accepts far more parameter shapes than its
//! editor can render. This crate captures what is known about each node type:
//!
//! - **Registry**: simplified type names mapped to platform type strings,
//!   versions, categories and default parameters
//! - **Shaping**: per-type functions that expand simplified configuration into
//!   the shape the editor expects
//! - **Formats**: historically accepted parameter shapes with editor requirements
//! - **Quirks**: documented storage/editor mismatches, searchable by symptom
//! - **Validation**: matching parameters against formats and requirements

pub mod catalog;
pub mod error;
pub mod format;
pub mod knowledge;
pub mod path;
pub mod quirk;
pub mod registry;
pub mod shaping;
pub mod validation;

pub use error::SchemaError;
pub use format::{
    EditorRequirement, FieldRule, Format, FormatStatus, JsonKind, NodeSchema, RequirementCheck,
    Severity,
};
pub use knowledge::{KnowledgeBase, SchemaSummary};
pub use quirk::{Quirk, QuirkSeverity};
pub use registry::{NodeCategory, NodeKind, NodeTypeRegistry, NodeTypeSpec};
pub use validation::{EditorIssue, ValidationResult};
