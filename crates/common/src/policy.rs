use thiserror::Error;

use crate::metrics::{MetricKind, MetricSample};

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("keep_count must be at least 1, got {0}")]
    InvalidKeepCount(u32),
    #[error("invalid threshold {field}: {reason}")]
    InvalidThreshold { field: &'static str, reason: String },
}

/// How many of the newest observations of a resource survive a cleanup run.
///
/// The field is private so a zero keep count cannot be smuggled past the
/// constructor; retaining nothing would turn a cleanup into a wipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    keep_count: u32,
}

impl RetentionPolicy {
    pub fn new(keep_count: u32) -> Result<Self, PolicyError> {
        if keep_count == 0 {
            return Err(PolicyError::InvalidKeepCount(keep_count));
        }
        Ok(Self { keep_count })
    }

    pub fn keep_count(&self) -> u32 {
        self.keep_count
    }

    /// Splits a newest-first observation list into retained and pruned
    /// halves. Purely positional: the caller is responsible for the order.
    /// A list no longer than the keep count prunes nothing.
    pub fn split<T>(&self, mut newest_first: Vec<T>) -> RetentionSplit<T> {
        let keep = self.keep_count as usize;
        if newest_first.len() <= keep {
            return RetentionSplit {
                retained: newest_first,
                pruned: Vec::new(),
            };
        }
        let pruned = newest_first.split_off(keep);
        RetentionSplit {
            retained: newest_first,
            pruned,
        }
    }
}

/// Outcome of applying a retention policy to one resource.
#[derive(Debug)]
pub struct RetentionSplit<T> {
    pub retained: Vec<T>,
    pub pruned: Vec<T>,
}

/// Per-metric alarm limits. Disk alarms when free space drops below the
/// limit; cpu and memory alarm when usage rises above it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdPolicy {
    pub disk_free_gb: f64,
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

impl ThresholdPolicy {
    pub fn validate(&self) -> Result<(), PolicyError> {
        if !(self.disk_free_gb > 0.0) {
            return Err(PolicyError::InvalidThreshold {
                field: "disk_free_gb",
                reason: "must be positive".to_string(),
            });
        }
        validate_percent("cpu_percent", self.cpu_percent)?;
        validate_percent("memory_percent", self.memory_percent)?;
        Ok(())
    }

    pub fn limit_for(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::DiskFreeGb => self.disk_free_gb,
            MetricKind::CpuPercent => self.cpu_percent,
            MetricKind::MemoryPercent => self.memory_percent,
        }
    }

    /// Checks one sample against its limit.
    pub fn breach(&self, sample: &MetricSample) -> Option<Breach> {
        let limit = self.limit_for(sample.kind);
        let breached = match sample.kind {
            MetricKind::DiskFreeGb => sample.value < limit,
            MetricKind::CpuPercent | MetricKind::MemoryPercent => sample.value > limit,
        };
        breached.then(|| Breach {
            sample: sample.clone(),
            limit,
        })
    }

    pub fn select_breaches(&self, samples: &[MetricSample]) -> Vec<Breach> {
        samples.iter().filter_map(|s| self.breach(s)).collect()
    }
}

fn validate_percent(field: &'static str, value: f64) -> Result<(), PolicyError> {
    if !(value > 0.0 && value <= 100.0) {
        return Err(PolicyError::InvalidThreshold {
            field,
            reason: "must be between 0 and 100".to_string(),
        });
    }
    Ok(())
}

/// A sample that crossed its configured limit.
#[derive(Debug, Clone)]
pub struct Breach {
    pub sample: MetricSample,
    pub limit: f64,
}

impl Breach {
    /// Human-readable line for alert bodies.
    pub fn describe(&self) -> String {
        match self.sample.kind {
            MetricKind::DiskFreeGb => format!(
                "{} at {:.1} GB free, below the {:.1} GB minimum",
                self.sample.label(),
                self.sample.value,
                self.limit
            ),
            MetricKind::CpuPercent | MetricKind::MemoryPercent => format!(
                "{} at {:.1}%, above the {:.1}% limit",
                self.sample.label(),
                self.sample.value,
                self.limit
            ),
        }
    }
}
