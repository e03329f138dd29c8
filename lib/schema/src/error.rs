//! Error types for the schema crate.

use std::fmt;

/// Errors from registry and knowledge-base lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The node type is not part of the registry.
    UnknownNodeType {
        node_type: String,
        supported: Vec<String>,
    },
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownNodeType {
                node_type,
                supported,
            } => write!(
                f,
                "unknown node type '{node_type}'; supported types: {}",
                supported.join(", ")
            ),
        }
    }
}

impl std::error::Error for SchemaError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_type_lists_alternatives() {
        let err = SchemaError::UnknownNodeType {
            node_type: "ftp".to_string(),
            supported: vec!["webhook".to_string(), "if".to_string()],
        };
        let message = err.to_string();
        assert!(message.contains("'ftp'"));
        assert!(message.contains("webhook, if"));
    }
}
