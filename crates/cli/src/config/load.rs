use std::path::Path;

use super::schema::Config;
use super::validate::ConfigError;

/// Loads, layers and validates the configuration.
///
/// Environment variables override file values for the secret fields, file
/// values override built-in defaults. Context narrowing happens before
/// validation so the validated config is the one the run will use.
pub fn load(path: &Path, context: Option<&str>) -> Result<Config, ConfigError> {
    let path_str = path.display().to_string();
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path_str.clone(),
        source,
    })?;
    let mut config: Config = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path_str,
        source,
    })?;

    apply_env_overrides(&mut config);
    if let Some(name) = context {
        config.apply_context(name)?;
    }
    config.validate()?;
    Ok(config)
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(password) = std::env::var("SHIPSHAPE_REGISTRY_PASSWORD") {
        if let Some(registry) = config.registry.as_mut() {
            registry.password = Some(password);
        }
    }
    if let Ok(key) = std::env::var("SHIPSHAPE_EMAIL_API_KEY") {
        if let Some(email) = config.channels.email.as_mut() {
            email.api_key = Some(key);
        }
    }
    if let Ok(token) = std::env::var("SHIPSHAPE_SMS_AUTH_TOKEN") {
        if let Some(sms) = config.channels.sms.as_mut() {
            sms.auth_token = Some(token);
        }
    }
}

impl Config {
    /// Narrows the configuration to a named context.
    pub fn apply_context(&mut self, name: &str) -> Result<(), ConfigError> {
        let context = self
            .contexts
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownContext(name.to_string()))?;

        if let Some(registry) = context.registry {
            self.registry = Some(registry);
        }
        if let Some(names) = context.hosts {
            for host_name in &names {
                if !self.hosts.iter().any(|h| &h.name == host_name) {
                    return Err(ConfigError::Validation(format!(
                        "context {name} references unknown host {host_name}"
                    )));
                }
            }
            self.hosts.retain(|h| names.contains(&h.name));
        }
        Ok(())
    }
}
