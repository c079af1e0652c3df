pub mod health;
pub mod prune;

use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use thiserror::Error;
use tokio::sync::{watch, Semaphore};
use tracing::error;

use shipshape_common::outcome::{ActionOutcome, RunAggregator, RunSummary};
use shipshape_common::policy::PolicyError;
use shipshape_common::run::PhaseError;

use crate::config::ConfigError;
use crate::probe::ProbeError;
use crate::registry::RegistryError;
use crate::runlog::RunLog;

/// Failures that end a whole run. Per-resource failures never surface
/// here; they become failed outcomes in the summary instead.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error("registry enumeration failed: {0}")]
    Registry(#[from] RegistryError),
    #[error("probe setup failed: {0}")]
    Probe(#[from] ProbeError),
    #[error(transparent)]
    Phase(#[from] PhaseError),
    #[error("run cancelled")]
    Cancelled,
    #[error("no registry section in the configuration")]
    RegistryNotConfigured,
    #[error("unknown host: {0}")]
    UnknownHost(String),
}

/// Knobs shared by every pipeline run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub run_id: String,
    /// When set, actions are planned and reported but never executed.
    pub simulate: bool,
    pub concurrency: usize,
    pub run_log: Option<PathBuf>,
}

/// Couples the in-memory aggregate with the optional on-disk run log so
/// call sites record an outcome exactly once.
pub(crate) struct RunRecorder {
    aggregator: RunAggregator,
    log: Option<RunLog>,
}

impl RunRecorder {
    pub(crate) fn new(options: &RunOptions) -> Self {
        Self {
            aggregator: RunAggregator::new(options.run_id.clone()),
            log: options.run_log.clone().map(RunLog::new),
        }
    }

    pub(crate) fn record(&self, outcome: ActionOutcome) {
        if let Some(log) = &self.log {
            log.append(&outcome);
        }
        self.aggregator.record(outcome);
    }

    pub(crate) fn recorded_so_far(&self) -> usize {
        self.aggregator.snapshot().len()
    }

    pub(crate) fn seal(self) -> RunSummary {
        self.aggregator.seal()
    }
}

/// Runs `work` over every resource on a bounded worker pool.
///
/// Cancellation is honored between resources: work already started runs
/// to completion, queued work is dropped and the call reports
/// [`RunError::Cancelled`].
pub(crate) async fn for_each_resource<T, F, Fut>(
    resources: Vec<T>,
    concurrency: usize,
    cancel: &watch::Receiver<bool>,
    work: F,
) -> Result<(), RunError>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let skipped = Arc::new(AtomicBool::new(false));
    let mut cancelled = false;
    let mut handles = Vec::with_capacity(resources.len());

    for resource in resources {
        if *cancel.borrow() {
            cancelled = true;
            break;
        }
        let semaphore = Arc::clone(&semaphore);
        let skipped = Arc::clone(&skipped);
        let cancel = cancel.clone();
        let future = work(resource);
        handles.push(tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };
            // A cancel that lands while this resource queued behind the
            // semaphore still skips it.
            if *cancel.borrow() {
                skipped.store(true, Ordering::Relaxed);
                return;
            }
            future.await;
        }));
    }

    for result in join_all(handles).await {
        if let Err(e) = result {
            error!(error = %e, "worker task panicked");
        }
    }

    if cancelled || skipped.load(Ordering::Relaxed) {
        return Err(RunError::Cancelled);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use shipshape_common::outcome::ActionKind;

    use super::*;

    fn options() -> RunOptions {
        RunOptions {
            run_id: "test-run".to_string(),
            simulate: true,
            concurrency: 2,
            run_log: None,
        }
    }

    #[tokio::test]
    async fn every_resource_is_processed() {
        let (_tx, rx) = watch::channel(false);
        let seen = Arc::new(AtomicUsize::new(0));

        let result = for_each_resource((0..5).collect(), 2, &rx, |_n: usize| {
            let seen = Arc::clone(&seen);
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(seen.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_the_pool_size() {
        let (_tx, rx) = watch::channel(false);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let result = for_each_resource((0..8).collect(), 2, &rx, |_n: usize| {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }
        })
        .await;

        assert!(result.is_ok());
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn cancelled_run_does_no_work_and_reports_it() {
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let seen = Arc::new(AtomicUsize::new(0));

        let result = for_each_resource((0..3).collect(), 2, &rx, |_n: usize| {
            let seen = Arc::clone(&seen);
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        })
        .await;

        assert!(matches!(result, Err(RunError::Cancelled)));
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn recorder_feeds_both_the_aggregate_and_the_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.jsonl");
        let mut options = options();
        options.run_log = Some(path.clone());

        let recorder = RunRecorder::new(&options);
        recorder.record(ActionOutcome::simulated("app:v1", ActionKind::DeleteTag));
        assert_eq!(recorder.recorded_so_far(), 1);

        let summary = recorder.seal();
        assert_eq!(summary.simulated(), 1);
        let raw = std::fs::read_to_string(path).unwrap();
        assert_eq!(raw.lines().count(), 1);
    }
}
