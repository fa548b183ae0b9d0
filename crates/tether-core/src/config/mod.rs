mod database;
mod endpoint;
mod observability;
mod service;

pub use database::DatabaseConfig;
pub use endpoint::EndpointConfig;
pub use observability::{LogFormat, ObservabilityConfig};
pub use service::ServiceConfig;

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, TetherError};

/// Placeholder logged instead of sensitive values.
pub const REDACTED: &str = "***";

/// Root configuration for a tether node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TetherConfig {
    /// Service node configuration.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Endpoint listener configuration.
    #[serde(default)]
    pub endpoint: EndpointConfig,

    /// Directory database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Manager name per topic, e.g. `volume = "volume"`.
    #[serde(default)]
    pub managers: BTreeMap<String, String>,

    /// Logging configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl TetherConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| TetherError::Config(format!("Failed to read config file: {}", e)))?;

        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let content = substitute_env_vars(content);

        toml::from_str(&content)
            .map_err(|e| TetherError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Look up the manager configured for a topic.
    pub fn manager_for(&self, topic: &str) -> Option<&str> {
        self.managers.get(topic).map(String::as_str)
    }

    /// Flatten the configuration into dotted `key = value` pairs with
    /// secrets masked.
    pub fn redacted_entries(&self) -> Vec<(String, String)> {
        let mut entries = Vec::new();
        match serde_json::to_value(self) {
            Ok(value) => flatten("", &value, &mut entries),
            Err(e) => tracing::debug!("Failed to serialize config: {}", e),
        }
        entries
    }
}

fn flatten(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten(&path, child, out);
            }
        }
        Value::Null => out.push((prefix.to_string(), "<unset>".to_string())),
        other => {
            let rendered = if is_sensitive(prefix) {
                REDACTED.to_string()
            } else {
                match other {
                    Value::String(s) => s.clone(),
                    v => v.to_string(),
                }
            };
            out.push((prefix.to_string(), rendered));
        }
    }
}

fn is_sensitive(path: &str) -> bool {
    let leaf = path.rsplit('.').next().unwrap_or(path);
    leaf.contains("password")
        || leaf.contains("secret")
        || leaf == "key"
        || leaf.ends_with("_key")
        || path == "database.url"
}

/// Substitute environment variables in the format ${VAR_NAME}.
fn substitute_env_vars(content: &str) -> String {
    let mut result = content.to_string();
    let re = match regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}") {
        Ok(re) => re,
        Err(_) => return result,
    };

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TetherConfig::default();
        assert_eq!(config.service.report_interval_secs, 10);
        assert_eq!(config.endpoint.port, 8776);
        assert!(config.database.url.is_none());
        assert!(config.managers.is_empty());
    }

    #[test]
    fn test_parse_empty_config() {
        let config = TetherConfig::parse_toml("").unwrap();
        assert_eq!(config.service.periodic_interval_secs, 60);
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [service]
            host = "storage-01"
            report_interval_secs = 5
            periodic_interval_secs = 30
            periodic_fuzzy_delay_secs = 0
            availability_zone = "az-1"
            considered_dead_after_secs = 20

            [endpoint]
            listen = "127.0.0.1"
            port = 9100

            [database]
            url = "postgres://localhost/tether"

            [managers]
            volume = "volume"
            backup = "status"

            [observability]
            log_level = "debug"
            log_format = "json"
        "#;

        let config = TetherConfig::parse_toml(toml).unwrap();
        assert_eq!(config.service.host.as_deref(), Some("storage-01"));
        assert_eq!(config.service.considered_dead_after_secs, 20);
        assert_eq!(config.endpoint.port, 9100);
        assert_eq!(config.manager_for("volume"), Some("volume"));
        assert_eq!(config.manager_for("backup"), Some("status"));
        assert_eq!(config.manager_for("scheduler"), None);
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = TetherConfig::parse_toml("[service]\nreport_interval_secs = \"soon\"");
        assert!(matches!(result, Err(TetherError::Config(_))));
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("TETHER_TEST_ZONE", "az-9");

        let toml = r#"
            [service]
            availability_zone = "${TETHER_TEST_ZONE}"
        "#;

        let config = TetherConfig::parse_toml(toml).unwrap();
        assert_eq!(config.service.availability_zone, "az-9");

        std::env::remove_var("TETHER_TEST_ZONE");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tether.toml");
        std::fs::write(&path, "[endpoint]\nport = 9200\n").unwrap();

        let config = TetherConfig::from_file(&path).unwrap();
        assert_eq!(config.endpoint.port, 9200);

        let missing = TetherConfig::from_file(dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(TetherError::Config(_))));
    }

    #[test]
    fn test_redacted_entries_mask_secrets() {
        let mut config = TetherConfig::default();
        config.database.url = Some("postgres://admin:hunter2@db/tether".to_string());
        config
            .managers
            .insert("volume".to_string(), "volume".to_string());

        let entries = config.redacted_entries();
        let lookup = |key: &str| {
            entries
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        };

        assert_eq!(lookup("database.url").as_deref(), Some(REDACTED));
        assert_eq!(lookup("service.host").as_deref(), Some("<unset>"));
        assert_eq!(lookup("service.report_interval_secs").as_deref(), Some("10"));
        assert_eq!(lookup("managers.volume").as_deref(), Some("volume"));
        assert!(entries.iter().all(|(_, v)| !v.contains("hunter2")));
    }

    #[test]
    fn test_sensitive_keys() {
        assert!(is_sensitive("database.url"));
        assert!(is_sensitive("auth.admin_password"));
        assert!(is_sensitive("signing_key"));
        assert!(!is_sensitive("endpoint.port"));
    }
}
