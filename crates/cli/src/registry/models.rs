use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Response of `GET /v2/_catalog`.
#[derive(Debug, Deserialize)]
pub struct Catalog {
    pub repositories: Vec<String>,
}

/// Response of `GET /v2/{repository}/tags/list`.
///
/// Registries return `"tags": null` for repositories whose tags have all
/// been deleted, so the field has to be optional.
#[derive(Debug, Deserialize)]
pub struct TagList {
    pub tags: Option<Vec<String>>,
}

/// The parts of an image manifest the pruner cares about.
#[derive(Debug, Deserialize)]
pub struct Manifest {
    pub config: Option<ManifestDescriptor>,
}

#[derive(Debug, Deserialize)]
pub struct ManifestDescriptor {
    pub digest: String,
}

/// The parts of an image config blob the pruner cares about.
#[derive(Debug, Deserialize)]
pub struct ImageConfig {
    pub created: Option<DateTime<Utc>>,
}

/// A tag resolved far enough to be ordered and deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct TagEntry {
    pub name: String,
    /// Manifest digest, the handle the registry deletes by.
    pub digest: String,
    /// Push time taken from the image config blob. Images built without a
    /// creation timestamp sort as oldest.
    pub pushed_at: Option<DateTime<Utc>>,
}
