use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use tracing::debug;

use crate::config::RegistryConfig;

use super::models::{Catalog, ImageConfig, Manifest, TagList};
use super::{sort_newest_first, RegistryApi, RegistryError, TagEntry};

const MANIFEST_V2: &str = "application/vnd.docker.distribution.manifest.v2+json";

/// Client for the Docker Registry HTTP API v2.
///
/// Resolving a tag takes three requests: the manifest (for the deletable
/// digest), then the image config blob (for the creation time). Both are
/// needed before any retention decision can be made.
pub struct HttpRegistry {
    client: Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
}

impl HttpRegistry {
    pub fn new(config: &RegistryConfig) -> Result<Self, RegistryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    /// Anonymous registries get unauthenticated requests.
    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.username {
            Some(username) => request.basic_auth(username, self.password.as_deref()),
            None => request,
        }
    }

    async fn get(&self, url: &str, accept: Option<&str>) -> Result<Response, RegistryError> {
        let mut request = self.authorized(self.client.get(url));
        if let Some(accept) = accept {
            request = request.header(reqwest::header::ACCEPT, accept);
        }
        let response = request.send().await?;
        check_status(url, response).await
    }

    async fn fetch_tag_entry(&self, repository: &str, tag: &str) -> Result<TagEntry, RegistryError> {
        let url = format!("{}/v2/{repository}/manifests/{tag}", self.base_url);
        let response = self.get(&url, Some(MANIFEST_V2)).await?;
        let digest = response
            .headers()
            .get("Docker-Content-Digest")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| RegistryError::MissingDigest {
                repository: repository.to_string(),
                tag: tag.to_string(),
            })?;
        let manifest: Manifest = response.json().await?;
        let pushed_at = match manifest.config {
            Some(descriptor) => self.fetch_created(repository, &descriptor.digest).await?,
            None => None,
        };
        Ok(TagEntry {
            name: tag.to_string(),
            digest,
            pushed_at,
        })
    }

    async fn fetch_created(
        &self,
        repository: &str,
        config_digest: &str,
    ) -> Result<Option<DateTime<Utc>>, RegistryError> {
        let url = format!("{}/v2/{repository}/blobs/{config_digest}", self.base_url);
        let response = self.get(&url, None).await?;
        let config: ImageConfig = response.json().await?;
        Ok(config.created)
    }
}

#[async_trait]
impl RegistryApi for HttpRegistry {
    async fn list_repositories(&self) -> Result<Vec<String>, RegistryError> {
        let url = format!("{}/v2/_catalog", self.base_url);
        let response = self.get(&url, None).await?;
        let catalog: Catalog = response.json().await?;
        Ok(catalog.repositories)
    }

    async fn list_tags(&self, repository: &str) -> Result<Vec<TagEntry>, RegistryError> {
        let url = format!("{}/v2/{repository}/tags/list", self.base_url);
        let response = self.get(&url, None).await?;
        let list: TagList = response.json().await?;
        let mut entries = Vec::new();
        for tag in list.tags.unwrap_or_default() {
            entries.push(self.fetch_tag_entry(repository, &tag).await?);
        }
        sort_newest_first(&mut entries);
        debug!(repository, tags = entries.len(), "resolved repository tags");
        Ok(entries)
    }

    async fn delete_tag(&self, repository: &str, entry: &TagEntry) -> Result<(), RegistryError> {
        let url = format!("{}/v2/{repository}/manifests/{}", self.base_url, entry.digest);
        let response = self
            .authorized(self.client.delete(&url))
            .send()
            .await?;
        check_status(&url, response).await?;
        Ok(())
    }
}

async fn check_status(url: &str, response: Response) -> Result<Response, RegistryError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error body".to_string());
        return Err(RegistryError::Status {
            status,
            url: url.to_string(),
            body,
        });
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_config(url: &str) -> RegistryConfig {
        RegistryConfig {
            url: url.to_string(),
            username: Some("pruner".to_string()),
            password: None,
            keep_count: 10,
            request_timeout_secs: 30,
        }
    }

    #[test]
    fn trailing_slash_is_trimmed_from_the_base_url() {
        let registry = HttpRegistry::new(&registry_config("https://registry.example.com/")).unwrap();
        assert_eq!(registry.base_url, "https://registry.example.com");
    }

    #[test]
    fn bare_base_url_is_kept_as_is() {
        let registry = HttpRegistry::new(&registry_config("http://10.0.0.7:5000")).unwrap();
        assert_eq!(registry.base_url, "http://10.0.0.7:5000");
    }
}
