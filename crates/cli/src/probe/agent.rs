use std::time::Duration;

use async_trait::async_trait;
use rand::random;
use reqwest::{Client, Response};
use serde::Deserialize;

use super::{HostProbe, HostSnapshot, ProbeError, ServiceState};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Talks to the shipshape agent running on a remote host.
///
/// The agent exposes `GET /v1/snapshot`, `GET /v1/services/{name}` and
/// `POST /v1/services/{name}/restart`. Reachability is checked with an
/// ICMP ping against the endpoint's hostname before any HTTP traffic.
#[derive(Debug)]
pub struct AgentProbe {
    client: Client,
    base_url: String,
    ping_host: String,
    ping_enabled: bool,
}

/// Wire form of `GET /v1/services/{name}`. `state` is `running` or
/// `stopped`.
#[derive(Debug, Deserialize)]
struct ServiceStatus {
    state: String,
}

impl AgentProbe {
    pub fn new(endpoint: &str, ping_enabled: bool) -> Result<Self, ProbeError> {
        let url = reqwest::Url::parse(endpoint)
            .map_err(|_| ProbeError::InvalidEndpoint(endpoint.to_string()))?;
        let ping_host = url
            .host_str()
            .ok_or_else(|| ProbeError::InvalidEndpoint(endpoint.to_string()))?
            .to_string();
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: endpoint.trim_end_matches('/').to_string(),
            ping_host,
            ping_enabled,
        })
    }

    async fn read_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ProbeError> {
        let url = format!("{}{path}", self.base_url);
        let response = self.client.get(&url).send().await?;
        let response = check_status(&url, response).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl HostProbe for AgentProbe {
    async fn ping(&self) -> bool {
        if !self.ping_enabled {
            return true;
        }
        // The endpoint may name a domain or an IP address.
        let host = self.ping_host.clone();
        let resolved = tokio::task::spawn_blocking(move || {
            use std::net::ToSocketAddrs;
            let host_with_port = format!("{host}:0");
            host_with_port.to_socket_addrs()
        })
        .await;
        let addr = match resolved {
            Ok(Ok(mut addrs)) => match addrs.next() {
                Some(addr) => addr.ip(),
                None => return false,
            },
            _ => return false,
        };
        let Ok(client) = surge_ping::Client::new(&surge_ping::Config::default()) else {
            return false;
        };
        let mut pinger = client
            .pinger(addr, surge_ping::PingIdentifier(random()))
            .await;
        pinger.ping(surge_ping::PingSequence(0), &[]).await.is_ok()
    }

    async fn snapshot(&self) -> Result<HostSnapshot, ProbeError> {
        self.read_json("/v1/snapshot").await
    }

    async fn service_status(&self, service: &str) -> Result<ServiceState, ProbeError> {
        let status: ServiceStatus = self.read_json(&format!("/v1/services/{service}")).await?;
        if status.state == "running" {
            Ok(ServiceState::Running)
        } else {
            Ok(ServiceState::Stopped)
        }
    }

    async fn restart_service(&self, service: &str) -> Result<(), ProbeError> {
        let url = format!("{}/v1/services/{service}/restart", self.base_url);
        let response = self.client.post(&url).send().await?;
        check_status(&url, response).await?;
        Ok(())
    }
}

async fn check_status(url: &str, response: Response) -> Result<Response, ProbeError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error body".to_string());
        return Err(ProbeError::Status {
            status,
            url: url.to_string(),
            body,
        });
    }
    Ok(response)
}
