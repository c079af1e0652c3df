use std::collections::HashMap;

use serde::Deserialize;

use super::defaults::*;

/// Root configuration for the toolkit.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Registry the prune pipeline targets. Optional so a health-only
    /// deployment needs no registry section.
    #[serde(default)]
    pub registry: Option<RegistryConfig>,

    #[serde(default)]
    pub thresholds: Thresholds,

    #[serde(default)]
    pub hosts: Vec<HostConfig>,

    #[serde(default)]
    pub channels: Channels,

    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Default path for the append-only run log; the CLI flag overrides it.
    #[serde(default)]
    pub run_log: Option<String>,

    #[serde(default)]
    pub contexts: HashMap<String, ContextConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    pub url: String,

    #[serde(default)]
    pub username: Option<String>,

    /// Overridden by SHIPSHAPE_REGISTRY_PASSWORD so it can stay out of
    /// checked-in files.
    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_keep_count")]
    pub keep_count: u32,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Thresholds {
    #[serde(default = "default_disk_free_gb")]
    pub disk_free_gb: f64,
    #[serde(default = "default_cpu_percent")]
    pub cpu_percent: f64,
    #[serde(default = "default_memory_percent")]
    pub memory_percent: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            disk_free_gb: default_disk_free_gb(),
            cpu_percent: default_cpu_percent(),
            memory_percent: default_memory_percent(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostConfig {
    pub name: String,

    #[serde(default)]
    pub probe: ProbeKind,

    /// Base URL of the stats agent; required when `probe = "agent"`.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Services to check and restart when stopped.
    #[serde(default)]
    pub services: Vec<String>,

    /// Whether to check reachability before probing.
    #[serde(default = "default_ping")]
    pub ping: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    #[default]
    Agent,
    Local,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Channels {
    #[serde(default)]
    pub email: Option<EmailChannel>,
    #[serde(default)]
    pub slack: Option<SlackChannel>,
    #[serde(default)]
    pub teams: Option<TeamsChannel>,
    #[serde(default)]
    pub sms: Option<SmsChannel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailChannel {
    pub api_url: String,
    /// Overridden by SHIPSHAPE_EMAIL_API_KEY.
    #[serde(default)]
    pub api_key: Option<String>,
    pub from: String,
    pub to: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackChannel {
    pub webhook_url: String,
    /// Optional Tera template replacing the built-in message body.
    #[serde(default)]
    pub body_template: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamsChannel {
    pub webhook_url: String,
    #[serde(default)]
    pub body_template: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmsChannel {
    pub api_url: String,
    pub account_sid: String,
    /// Overridden by SHIPSHAPE_SMS_AUTH_TOKEN.
    #[serde(default)]
    pub auth_token: Option<String>,
    pub from: String,
    pub to: Vec<String>,
}

/// A named slice of the fleet: its registry override replaces the top-level
/// one and its host list narrows `hosts` to a subset.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContextConfig {
    #[serde(default)]
    pub registry: Option<RegistryConfig>,
    #[serde(default)]
    pub hosts: Option<Vec<String>>,
}
