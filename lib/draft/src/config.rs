//! Builder and session store configuration.

use serde::Deserialize;

/// Draft builder behavior.
#[derive(Debug, Clone, Deserialize)]
pub struct BuilderConfig {
    /// Session lifetime in minutes. Every successful mutation renews it.
    #[serde(default = "default_session_ttl_minutes")]
    pub session_ttl_minutes: i64,

    /// Failed commit attempts after which errors carry an escalation note.
    #[serde(default = "default_escalation_threshold")]
    pub escalation_threshold: usize,

    /// Whether `commit` may activate the created workflow.
    #[serde(default = "default_activation_enabled")]
    pub activation_enabled: bool,
}

fn default_session_ttl_minutes() -> i64 {
    30
}

fn default_escalation_threshold() -> usize {
    3
}

fn default_activation_enabled() -> bool {
    true
}

impl BuilderConfig {
    /// Session lifetime as a duration.
    #[must_use]
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.session_ttl_minutes)
    }
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            session_ttl_minutes: default_session_ttl_minutes(),
            escalation_threshold: default_escalation_threshold(),
            activation_enabled: default_activation_enabled(),
        }
    }
}

/// Which session store to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Memory,
    Nats,
}

/// Session store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionStoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// NATS server URL. Required for the `nats` backend.
    #[serde(default)]
    pub nats_url: Option<String>,

    /// KV bucket holding sessions.
    #[serde(default = "default_nats_bucket")]
    pub nats_bucket: String,

    /// Interval between in-memory sweeps, in seconds.
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,

    /// How long an expired session stays resumable, in minutes.
    #[serde(default = "default_expired_retention_minutes")]
    pub expired_retention_minutes: i64,
}

fn default_nats_bucket() -> String {
    "flowwright-drafts".to_string()
}

fn default_sweep_interval_seconds() -> u64 {
    60
}

fn default_expired_retention_minutes() -> i64 {
    30
}

impl SessionStoreConfig {
    #[must_use]
    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_seconds)
    }

    #[must_use]
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.expired_retention_minutes)
    }

    /// Server-side entry lifetime: the session TTL plus the retention window.
    #[must_use]
    pub fn entry_max_age(&self, ttl: chrono::Duration) -> std::time::Duration {
        (ttl + self.retention())
            .to_std()
            .unwrap_or(std::time::Duration::ZERO)
    }
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            nats_url: None,
            nats_bucket: default_nats_bucket(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
            expired_retention_minutes: default_expired_retention_minutes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let config = BuilderConfig::default();
        assert_eq!(config.session_ttl_minutes, 30);
        assert_eq!(config.escalation_threshold, 3);
        assert!(config.activation_enabled);
        assert_eq!(config.ttl(), chrono::Duration::minutes(30));
    }

    #[test]
    fn store_defaults_to_memory() {
        let config = SessionStoreConfig::default();
        assert_eq!(config.backend, StoreBackend::Memory);
        assert_eq!(config.nats_bucket, "flowwright-drafts");
        assert_eq!(config.sweep_interval(), std::time::Duration::from_secs(60));
    }

    #[test]
    fn entry_max_age_adds_retention() {
        let config = SessionStoreConfig::default();
        let max_age = config.entry_max_age(chrono::Duration::minutes(30));
        assert_eq!(max_age, std::time::Duration::from_secs(60 * 60));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: SessionStoreConfig =
            serde_json::from_str(r#"{"backend":"nats","nats_url":"nats://localhost:4222"}"#)
                .expect("deserialize");
        assert_eq!(config.backend, StoreBackend::Nats);
        assert_eq!(config.expired_retention_minutes, 30);
    }
}
