//! Tool host configuration.
//!
//! Loaded from environment variables prefixed with `FLOWWRIGHT_`, using
//! `__` between nested keys, e.g. `FLOWWRIGHT_PLATFORM__BASE_URL` or
//! `FLOWWRIGHT_SESSION__BACKEND=nats`.

use flowwright_draft::{BuilderConfig, SessionStoreConfig};
use flowwright_platform::PlatformConfig;
use serde::Deserialize;

/// Tool host configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ToolsConfig {
    /// Remote platform connection.
    pub platform: PlatformConfig,

    /// Session store backend.
    #[serde(default)]
    pub session: SessionStoreConfig,

    /// Draft builder behavior.
    #[serde(default)]
    pub builder: BuilderConfig,
}

impl ToolsConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_source(
            config::Environment::with_prefix("FLOWWRIGHT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
    }

    fn from_source<S>(source: S) -> Result<Self, config::ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        config::Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowwright_draft::StoreBackend;
    use std::collections::HashMap;

    fn environment(vars: &[(&str, &str)]) -> config::Environment {
        let source: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        config::Environment::with_prefix("FLOWWRIGHT")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .source(Some(source))
    }

    #[test]
    fn nested_keys_load_with_defaults() {
        let config = ToolsConfig::from_source(environment(&[
            ("FLOWWRIGHT_PLATFORM__BASE_URL", "http://n8n:5678"),
            ("FLOWWRIGHT_PLATFORM__API_KEY", "secret"),
            ("FLOWWRIGHT_SESSION__BACKEND", "nats"),
            ("FLOWWRIGHT_SESSION__NATS_URL", "nats://nats:4222"),
        ]))
        .expect("load");

        assert_eq!(config.platform.base_url, "http://n8n:5678");
        assert_eq!(config.platform.timeout_seconds, 30);
        assert_eq!(config.session.backend, StoreBackend::Nats);
        assert_eq!(config.session.nats_bucket, "flowwright-drafts");
        assert_eq!(config.builder.session_ttl_minutes, 30);
    }

    #[test]
    fn platform_base_url_is_required() {
        let result = ToolsConfig::from_source(environment(&[("FLOWWRIGHT_SESSION__BACKEND", "memory")]));
        assert!(result.is_err());
    }
}
