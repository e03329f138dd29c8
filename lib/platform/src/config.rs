//! Platform connection configuration.

use serde::{Deserialize, Serialize};

/// Where the platform lives and how to authenticate.
///
/// Fields with defaults can be omitted when loading from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Base URL of the platform, without the `/api/v1` suffix.
    pub base_url: String,
    /// API key sent in the `X-N8N-API-KEY` header.
    #[serde(default)]
    pub api_key: String,
    /// Request timeout in seconds.
    /// Default: 30
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    30
}

impl PlatformConfig {
    /// Creates a config with the default timeout.
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout_seconds: default_timeout_seconds(),
        }
    }

    /// The REST API root, e.g. `http://localhost:5678/api/v1`.
    #[must_use]
    pub fn api_root(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/api/v1") {
            base.to_string()
        } else {
            format!("{base}/api/v1")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_root_appends_prefix_once() {
        assert_eq!(
            PlatformConfig::new("http://localhost:5678/", "k").api_root(),
            "http://localhost:5678/api/v1"
        );
        assert_eq!(
            PlatformConfig::new("http://localhost:5678/api/v1", "k").api_root(),
            "http://localhost:5678/api/v1"
        );
    }

    #[test]
    fn timeout_defaults_when_absent() {
        let config: PlatformConfig =
            serde_json::from_str(r#"{"base_url": "http://n8n:5678"}"#).expect("deserialize");
        assert_eq!(config.timeout_seconds, 30);
        assert!(config.api_key.is_empty());
    }
}
