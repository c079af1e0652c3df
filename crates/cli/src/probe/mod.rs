mod agent;
mod local;

pub use agent::AgentProbe;
pub use local::LocalProbe;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::config::{HostConfig, ProbeKind};

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("agent returned {status} for {url}: {body}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
        body: String,
    },
    #[error("host {0} has no agent endpoint")]
    MissingEndpoint(String),
    #[error("invalid agent endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("failed to run {command}: {source}")]
    Command {
        command: String,
        source: std::io::Error,
    },
    #[error("{command} failed: {detail}")]
    CommandFailed { command: String, detail: String },
}

/// Point-in-time resource usage of one host.
#[derive(Debug, Clone, Deserialize)]
pub struct HostSnapshot {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub drives: Vec<DriveSpace>,
}

/// Free space on one mounted filesystem, in gigabytes.
#[derive(Debug, Clone, Deserialize)]
pub struct DriveSpace {
    pub mount: String,
    pub free_gb: f64,
    pub total_gb: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Running,
    Stopped,
}

/// A way to observe and act on one host.
///
/// `ping` reports reachability rather than erroring: unreachable is an
/// expected answer, not a failure of the probe itself.
#[async_trait]
pub trait HostProbe: Send + Sync {
    async fn ping(&self) -> bool;

    async fn snapshot(&self) -> Result<HostSnapshot, ProbeError>;

    async fn service_status(&self, service: &str) -> Result<ServiceState, ProbeError>;

    async fn restart_service(&self, service: &str) -> Result<(), ProbeError>;
}

/// The probe a host's configuration selects.
#[derive(Debug)]
pub enum AnyProbe {
    Agent(AgentProbe),
    Local(LocalProbe),
}

impl AnyProbe {
    pub fn for_host(host: &HostConfig) -> Result<Self, ProbeError> {
        match host.probe {
            ProbeKind::Agent => {
                let endpoint = host
                    .endpoint
                    .as_deref()
                    .ok_or_else(|| ProbeError::MissingEndpoint(host.name.clone()))?;
                Ok(Self::Agent(AgentProbe::new(endpoint, host.ping)?))
            }
            ProbeKind::Local => Ok(Self::Local(LocalProbe::new())),
        }
    }
}

#[async_trait]
impl HostProbe for AnyProbe {
    async fn ping(&self) -> bool {
        match self {
            AnyProbe::Agent(probe) => probe.ping().await,
            AnyProbe::Local(probe) => probe.ping().await,
        }
    }

    async fn snapshot(&self) -> Result<HostSnapshot, ProbeError> {
        match self {
            AnyProbe::Agent(probe) => probe.snapshot().await,
            AnyProbe::Local(probe) => probe.snapshot().await,
        }
    }

    async fn service_status(&self, service: &str) -> Result<ServiceState, ProbeError> {
        match self {
            AnyProbe::Agent(probe) => probe.service_status(service).await,
            AnyProbe::Local(probe) => probe.service_status(service).await,
        }
    }

    async fn restart_service(&self, service: &str) -> Result<(), ProbeError> {
        match self {
            AnyProbe::Agent(probe) => probe.restart_service(service).await,
            AnyProbe::Local(probe) => probe.restart_service(service).await,
        }
    }
}

#[cfg(test)]
#[derive(Clone)]
pub(crate) struct MockProbe {
    reachable: bool,
    snapshot: HostSnapshot,
    fail_snapshot: bool,
    stopped_services: Vec<String>,
    fail_restart: Vec<String>,
    restarted: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
}

#[cfg(test)]
impl MockProbe {
    pub(crate) fn healthy() -> Self {
        Self {
            reachable: true,
            snapshot: HostSnapshot {
                cpu_percent: 20.0,
                memory_percent: 40.0,
                drives: vec![DriveSpace {
                    mount: "/".to_string(),
                    free_gb: 120.0,
                    total_gb: 200.0,
                }],
            },
            fail_snapshot: false,
            stopped_services: Vec::new(),
            fail_restart: Vec::new(),
            restarted: std::sync::Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn unreachable() -> Self {
        let mut probe = Self::healthy();
        probe.reachable = false;
        probe
    }

    pub(crate) fn with_cpu(mut self, cpu_percent: f64) -> Self {
        self.snapshot.cpu_percent = cpu_percent;
        self
    }

    pub(crate) fn with_memory(mut self, memory_percent: f64) -> Self {
        self.snapshot.memory_percent = memory_percent;
        self
    }

    /// Replaces the drive list with a single drive at `mount`.
    pub(crate) fn with_drive(mut self, mount: &str, free_gb: f64) -> Self {
        self.snapshot.drives = vec![DriveSpace {
            mount: mount.to_string(),
            free_gb,
            total_gb: free_gb.max(100.0),
        }];
        self
    }

    pub(crate) fn with_stopped_service(mut self, service: &str) -> Self {
        self.stopped_services.push(service.to_string());
        self
    }

    pub(crate) fn with_failing_restart(mut self, service: &str) -> Self {
        self.fail_restart.push(service.to_string());
        self
    }

    pub(crate) fn with_failing_snapshot(mut self) -> Self {
        self.fail_snapshot = true;
        self
    }

    /// Services restarted so far, in call order. Shared across clones.
    pub(crate) fn restarted(&self) -> Vec<String> {
        self.restarted.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl HostProbe for MockProbe {
    async fn ping(&self) -> bool {
        self.reachable
    }

    async fn snapshot(&self) -> Result<HostSnapshot, ProbeError> {
        if self.fail_snapshot {
            return Err(ProbeError::Status {
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                url: "mock://snapshot".to_string(),
                body: "snapshot unavailable".to_string(),
            });
        }
        Ok(self.snapshot.clone())
    }

    async fn service_status(&self, service: &str) -> Result<ServiceState, ProbeError> {
        if self.stopped_services.iter().any(|s| s == service) {
            Ok(ServiceState::Stopped)
        } else {
            Ok(ServiceState::Running)
        }
    }

    async fn restart_service(&self, service: &str) -> Result<(), ProbeError> {
        if self.fail_restart.iter().any(|s| s == service) {
            return Err(ProbeError::CommandFailed {
                command: format!("systemctl restart {service}"),
                detail: "mock restart failure".to_string(),
            });
        }
        self.restarted.lock().unwrap().push(service.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(name: &str, probe: ProbeKind, endpoint: Option<&str>) -> HostConfig {
        HostConfig {
            name: name.to_string(),
            probe,
            endpoint: endpoint.map(str::to_string),
            services: Vec::new(),
            ping: true,
        }
    }

    #[test]
    fn agent_host_without_endpoint_is_rejected() {
        let err = AnyProbe::for_host(&host("db-1", ProbeKind::Agent, None)).unwrap_err();
        assert!(matches!(err, ProbeError::MissingEndpoint(name) if name == "db-1"));
    }

    #[test]
    fn malformed_endpoint_is_rejected() {
        let err =
            AnyProbe::for_host(&host("db-1", ProbeKind::Agent, Some("not a url"))).unwrap_err();
        assert!(matches!(err, ProbeError::InvalidEndpoint(_)));
    }

    #[test]
    fn local_host_gets_the_local_probe() {
        let probe = AnyProbe::for_host(&host("this-box", ProbeKind::Local, None)).unwrap();
        assert!(matches!(probe, AnyProbe::Local(_)));
    }
}
