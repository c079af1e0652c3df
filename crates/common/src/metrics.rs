use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The health measurements the toolkit evaluates. Disk is measured as free
/// gigabytes, cpu and memory as used percentages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    DiskFreeGb,
    CpuPercent,
    MemoryPercent,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::DiskFreeGb => "disk_free_gb",
            MetricKind::CpuPercent => "cpu_percent",
            MetricKind::MemoryPercent => "memory_percent",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single observed measurement on one host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSample {
    pub kind: MetricKind,
    pub value: f64,
    pub sampled_at: DateTime<Utc>,
    /// Locator within the host, e.g. the mount point for disk samples.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl MetricSample {
    pub fn new(kind: MetricKind, value: f64) -> Self {
        Self {
            kind,
            value,
            sampled_at: Utc::now(),
            detail: None,
        }
    }

    pub fn with_detail(kind: MetricKind, value: f64, detail: impl Into<String>) -> Self {
        Self {
            kind,
            value,
            sampled_at: Utc::now(),
            detail: Some(detail.into()),
        }
    }

    /// Metric name with the locator appended, e.g. `disk_free_gb(/var)`.
    pub fn label(&self) -> String {
        match &self.detail {
            Some(detail) => format!("{}({})", self.kind, detail),
            None => self.kind.to_string(),
        }
    }
}
