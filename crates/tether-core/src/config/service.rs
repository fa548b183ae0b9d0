use serde::{Deserialize, Serialize};

/// Service node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Host name this node registers under (defaults to the machine hostname).
    #[serde(default)]
    pub host: Option<String>,

    /// Seconds between reports to the directory (0 disables the heartbeat).
    #[serde(default = "default_report_interval")]
    pub report_interval_secs: u64,

    /// Seconds between periodic task runs (0 disables periodic tasks).
    #[serde(default = "default_periodic_interval")]
    pub periodic_interval_secs: u64,

    /// Upper bound of the random delay before the first periodic task run
    /// (0 disables the delay).
    #[serde(default = "default_periodic_fuzzy_delay")]
    pub periodic_fuzzy_delay_secs: u64,

    /// Availability zone reported in the directory record.
    #[serde(default = "default_availability_zone")]
    pub availability_zone: String,

    /// Seconds without a report after which a node is considered dead.
    #[serde(default = "default_considered_dead_after")]
    pub considered_dead_after_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: None,
            report_interval_secs: default_report_interval(),
            periodic_interval_secs: default_periodic_interval(),
            periodic_fuzzy_delay_secs: default_periodic_fuzzy_delay(),
            availability_zone: default_availability_zone(),
            considered_dead_after_secs: default_considered_dead_after(),
        }
    }
}

fn default_report_interval() -> u64 {
    10
}

fn default_periodic_interval() -> u64 {
    60
}

fn default_periodic_fuzzy_delay() -> u64 {
    60
}

fn default_availability_zone() -> String {
    "default".to_string()
}

fn default_considered_dead_after() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_service_config() {
        let config = ServiceConfig::default();
        assert!(config.host.is_none());
        assert_eq!(config.report_interval_secs, 10);
        assert_eq!(config.periodic_interval_secs, 60);
        assert_eq!(config.periodic_fuzzy_delay_secs, 60);
        assert_eq!(config.availability_zone, "default");
        assert_eq!(config.considered_dead_after_secs, 60);
    }

    #[test]
    fn test_parse_service_config() {
        let toml = r#"
            host = "node-7"
            report_interval_secs = 0
            availability_zone = "az-2"
        "#;

        let config: ServiceConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.host.as_deref(), Some("node-7"));
        assert_eq!(config.report_interval_secs, 0);
        assert_eq!(config.periodic_interval_secs, 60);
        assert_eq!(config.availability_zone, "az-2");
    }
}
