use std::time::Duration;

use tether_core::config::ServiceConfig;
use tether_core::{Result, TetherError};

/// Factor applied to the report interval when the dead threshold is too low.
const DEAD_THRESHOLD_FACTOR: f64 = 2.5;

/// Fully resolved parameters of one service.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSettings {
    pub host: String,
    pub binary: String,
    pub topic: String,
    /// Zero disables the heartbeat.
    pub report_interval: Duration,
    /// Zero disables the periodic task.
    pub periodic_interval: Duration,
    /// Zero disables the random initial delay of the periodic task.
    pub periodic_fuzzy_delay: Duration,
    pub availability_zone: String,
    pub considered_dead_after: Duration,
    /// Abort the periodic task on its first failure instead of logging it.
    pub raise_on_error: bool,
    pub service_name: Option<String>,
}

impl ServiceSettings {
    /// Settings with the configuration defaults for everything but the
    /// node identity.
    pub fn new(
        host: impl Into<String>,
        binary: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self::from_config(host, binary, topic, &ServiceConfig::default())
    }

    /// Settings taking intervals, zone and dead threshold from `config`.
    pub fn from_config(
        host: impl Into<String>,
        binary: impl Into<String>,
        topic: impl Into<String>,
        config: &ServiceConfig,
    ) -> Self {
        Self {
            host: host.into(),
            binary: binary.into(),
            topic: topic.into(),
            report_interval: Duration::from_secs(config.report_interval_secs),
            periodic_interval: Duration::from_secs(config.periodic_interval_secs),
            periodic_fuzzy_delay: Duration::from_secs(config.periodic_fuzzy_delay_secs),
            availability_zone: config.availability_zone.clone(),
            considered_dead_after: Duration::from_secs(config.considered_dead_after_secs),
            raise_on_error: false,
            service_name: None,
        }
    }

    /// Reject names the directory and the endpoint cannot address.
    pub fn validate(&self) -> Result<()> {
        validate_name("host", &self.host)?;
        validate_name("binary", &self.binary)?;
        validate_name("topic", &self.topic)?;

        if self.availability_zone.trim().is_empty() {
            return Err(TetherError::InvalidConfiguration(
                "availability zone must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Raise the dead threshold when it does not exceed the report interval.
    ///
    /// Returns whether anything was adjusted.
    pub fn reconcile(&mut self) -> bool {
        if self.report_interval.is_zero() || self.considered_dead_after > self.report_interval {
            return false;
        }

        let adjusted = self.report_interval.mul_f64(DEAD_THRESHOLD_FACTOR);
        tracing::warn!(
            report_interval_secs = self.report_interval.as_secs_f64(),
            considered_dead_after_secs = self.considered_dead_after.as_secs_f64(),
            adjusted_secs = adjusted.as_secs_f64(),
            "Report interval must be less than the dead threshold, raising the threshold"
        );
        self.considered_dead_after = adjusted;
        true
    }
}

fn validate_name(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(TetherError::InvalidConfiguration(format!(
            "{} must not be empty",
            field
        )));
    }

    if let Some(bad) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(TetherError::InvalidConfiguration(format!(
            "{} '{}' contains invalid character '{}'",
            field, value, bad
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_defaults_from_config() {
        let settings = ServiceSettings::new("h1", "worker", "worker");
        assert_eq!(settings.report_interval, Duration::from_secs(10));
        assert_eq!(settings.periodic_interval, Duration::from_secs(60));
        assert_eq!(settings.periodic_fuzzy_delay, Duration::from_secs(60));
        assert_eq!(settings.considered_dead_after, Duration::from_secs(60));
        assert!(!settings.raise_on_error);
        assert_ok!(settings.validate());
    }

    #[test]
    fn test_invalid_names_are_rejected() {
        let mut settings = ServiceSettings::new("", "worker", "worker");
        assert!(matches!(
            settings.validate(),
            Err(TetherError::InvalidConfiguration(_))
        ));

        settings.host = "h1".into();
        settings.topic = "work queue".into();
        assert!(matches!(
            settings.validate(),
            Err(TetherError::InvalidConfiguration(_))
        ));

        settings.topic = "tether-volume.v2".into();
        assert_ok!(settings.validate());

        settings.availability_zone = " ".into();
        assert_err!(settings.validate());
    }

    #[test]
    fn test_reconcile_raises_dead_threshold() {
        let mut settings = ServiceSettings::new("h1", "worker", "worker");
        settings.report_interval = Duration::from_secs(60);
        settings.considered_dead_after = Duration::from_secs(60);

        assert!(settings.reconcile());
        assert_eq!(settings.considered_dead_after, Duration::from_secs(150));
        assert!(!settings.reconcile());
    }

    #[test]
    fn test_reconcile_leaves_consistent_settings() {
        let mut settings = ServiceSettings::new("h1", "worker", "worker");
        assert!(!settings.reconcile());
        assert_eq!(settings.considered_dead_after, Duration::from_secs(60));

        settings.report_interval = Duration::ZERO;
        settings.considered_dead_after = Duration::from_secs(1);
        assert!(!settings.reconcile());
    }
}
