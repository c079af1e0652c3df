use std::collections::HashSet;

use thiserror::Error;

use super::schema::{Config, ProbeKind};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("unknown context: {0}")]
    UnknownContext(String),
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Validation(
                "concurrency must be at least 1".to_string(),
            ));
        }

        if let Some(registry) = &self.registry {
            if registry.url.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "registry.url must not be empty".to_string(),
                ));
            }
            if registry.keep_count == 0 {
                return Err(ConfigError::Validation(
                    "registry.keep_count must be at least 1".to_string(),
                ));
            }
            if registry.request_timeout_secs == 0 {
                return Err(ConfigError::Validation(
                    "registry.request_timeout_secs must be at least 1".to_string(),
                ));
            }
        }

        validate_positive("thresholds.disk_free_gb", self.thresholds.disk_free_gb)?;
        validate_percentage("thresholds.cpu_percent", self.thresholds.cpu_percent)?;
        validate_percentage("thresholds.memory_percent", self.thresholds.memory_percent)?;

        let mut seen = HashSet::new();
        for host in &self.hosts {
            if host.name.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "host name must not be empty".to_string(),
                ));
            }
            if !seen.insert(host.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate host name: {}",
                    host.name
                )));
            }
            if host.probe == ProbeKind::Agent && host.endpoint.is_none() {
                return Err(ConfigError::Validation(format!(
                    "host {} uses the agent probe but has no endpoint",
                    host.name
                )));
            }
        }

        if let Some(email) = &self.channels.email {
            if email.to.is_empty() {
                return Err(ConfigError::Validation(
                    "channels.email.to must list at least one recipient".to_string(),
                ));
            }
        }
        if let Some(sms) = &self.channels.sms {
            if sms.to.is_empty() {
                return Err(ConfigError::Validation(
                    "channels.sms.to must list at least one recipient".to_string(),
                ));
            }
        }

        Ok(())
    }
}

fn validate_positive(field: &str, value: f64) -> Result<(), ConfigError> {
    if value <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "{field} must be greater than zero, got {value}"
        )));
    }
    Ok(())
}

fn validate_percentage(field: &str, value: f64) -> Result<(), ConfigError> {
    if value <= 0.0 || value > 100.0 {
        return Err(ConfigError::Validation(format!(
            "{field} must be between 0 and 100, got {value}"
        )));
    }
    Ok(())
}
