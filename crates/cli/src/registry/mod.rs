mod http;
mod models;

pub use http::HttpRegistry;
pub use models::TagEntry;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("registry returned {status} for {url}: {body}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
        body: String,
    },
    #[error("registry returned no digest for {repository}:{tag}")]
    MissingDigest { repository: String, tag: String },
}

/// A Docker Registry HTTP API v2 endpoint.
#[async_trait]
pub trait RegistryApi: Send + Sync {
    async fn list_repositories(&self) -> Result<Vec<String>, RegistryError>;

    /// Lists a repository's tags, newest first. Tags without a push time
    /// come last.
    async fn list_tags(&self, repository: &str) -> Result<Vec<TagEntry>, RegistryError>;

    /// Deletes a tag through its manifest digest.
    async fn delete_tag(&self, repository: &str, entry: &TagEntry) -> Result<(), RegistryError>;
}

/// Orders tags newest first; entries without a push time sort last. The
/// sort is stable so tags the registry listed adjacently stay adjacent.
pub(crate) fn sort_newest_first(entries: &mut [TagEntry]) {
    entries.sort_by(|a, b| match (&a.pushed_at, &b.pushed_at) {
        (Some(left), Some(right)) => right.cmp(left),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

#[cfg(test)]
pub(crate) struct MockRegistry {
    repositories: Vec<(String, Vec<TagEntry>)>,
    fail_catalog: bool,
    fail_tags_for: Option<String>,
    fail_delete_digests: Vec<String>,
    deleted: std::sync::Mutex<Vec<(String, String)>>,
}

#[cfg(test)]
impl MockRegistry {
    pub(crate) fn new(repositories: Vec<(&str, Vec<TagEntry>)>) -> Self {
        Self {
            repositories: repositories
                .into_iter()
                .map(|(name, tags)| (name.to_string(), tags))
                .collect(),
            fail_catalog: false,
            fail_tags_for: None,
            fail_delete_digests: Vec::new(),
            deleted: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing_catalog() -> Self {
        let mut mock = Self::new(Vec::new());
        mock.fail_catalog = true;
        mock
    }

    pub(crate) fn with_failing_tags(mut self, repository: &str) -> Self {
        self.fail_tags_for = Some(repository.to_string());
        self
    }

    pub(crate) fn with_failing_delete(mut self, digest: &str) -> Self {
        self.fail_delete_digests.push(digest.to_string());
        self
    }

    /// The `(repository, digest)` pairs deleted so far, in call order.
    pub(crate) fn deleted(&self) -> Vec<(String, String)> {
        self.deleted.lock().unwrap().clone()
    }

    fn mock_error(url: String, body: &str) -> RegistryError {
        RegistryError::Status {
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            url,
            body: body.to_string(),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl RegistryApi for MockRegistry {
    async fn list_repositories(&self) -> Result<Vec<String>, RegistryError> {
        if self.fail_catalog {
            return Err(Self::mock_error(
                "mock://catalog".to_string(),
                "catalog unavailable",
            ));
        }
        Ok(self
            .repositories
            .iter()
            .map(|(name, _)| name.clone())
            .collect())
    }

    async fn list_tags(&self, repository: &str) -> Result<Vec<TagEntry>, RegistryError> {
        if self.fail_tags_for.as_deref() == Some(repository) {
            return Err(Self::mock_error(
                format!("mock://{repository}/tags/list"),
                "tag listing unavailable",
            ));
        }
        let mut tags = self
            .repositories
            .iter()
            .find(|(name, _)| name == repository)
            .map(|(_, tags)| tags.clone())
            .unwrap_or_default();
        sort_newest_first(&mut tags);
        Ok(tags)
    }

    async fn delete_tag(&self, repository: &str, entry: &TagEntry) -> Result<(), RegistryError> {
        if self.fail_delete_digests.contains(&entry.digest) {
            return Err(RegistryError::Status {
                status: reqwest::StatusCode::NOT_FOUND,
                url: format!("mock://{repository}/manifests/{}", entry.digest),
                body: "manifest unknown".to_string(),
            });
        }
        self.deleted
            .lock()
            .unwrap()
            .push((repository.to_string(), entry.digest.clone()));
        Ok(())
    }
}
