use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use shipshape_common::outcome::{ActionKind, ActionOutcome, RunSummary};
use shipshape_common::policy::RetentionPolicy;
use shipshape_common::run::{PhaseTracker, RunPhase};

use crate::config::Config;
use crate::registry::{HttpRegistry, RegistryApi, TagEntry};

use super::{for_each_resource, RunError, RunOptions, RunRecorder};

/// One repository's tags, already split by the retention policy. Only
/// repositories with something to prune get a plan.
struct RepositoryPlan {
    repository: String,
    retained: usize,
    pruned: Vec<TagEntry>,
}

/// Prunes old image tags, keeping the newest `keep_count` per repository.
pub async fn run(
    config: &Config,
    repository: Option<&str>,
    keep: Option<u32>,
    options: &RunOptions,
    cancel: watch::Receiver<bool>,
) -> Result<RunSummary, RunError> {
    let registry_config = config
        .registry
        .as_ref()
        .ok_or(RunError::RegistryNotConfigured)?;
    let policy = RetentionPolicy::new(keep.unwrap_or(registry_config.keep_count))?;
    let registry = Arc::new(HttpRegistry::new(registry_config)?);
    run_with(registry, repository, policy, options, cancel).await
}

pub(crate) async fn run_with<R: RegistryApi + 'static>(
    registry: Arc<R>,
    repository: Option<&str>,
    policy: RetentionPolicy,
    options: &RunOptions,
    cancel: watch::Receiver<bool>,
) -> Result<RunSummary, RunError> {
    let mut phase = PhaseTracker::new();
    info!(run_id = %options.run_id, keep = policy.keep_count(), "starting prune run");

    // The whole plan is materialized before any delete: a registry that
    // cannot be fully enumerated must not be partially pruned.
    let tags = match enumerate(registry.as_ref(), repository).await {
        Ok(tags) => tags,
        Err(e) => {
            phase.advance(RunPhase::Aborted)?;
            warn!(error = %e, "enumeration failed, no tags were deleted");
            return Err(e);
        }
    };

    phase.advance(RunPhase::Evaluating)?;
    let mut plans = Vec::new();
    for (repository, entries) in tags {
        let total = entries.len();
        let split = policy.split(entries);
        if split.pruned.is_empty() {
            info!(repository = %repository, tags = total, "nothing to prune");
            continue;
        }
        plans.push(RepositoryPlan {
            repository,
            retained: split.retained.len(),
            pruned: split.pruned,
        });
    }

    phase.advance(RunPhase::Acting)?;
    if options.simulate {
        info!("simulate is on; reporting deletes without performing them");
    }
    let recorder = Arc::new(RunRecorder::new(options));
    let simulate = options.simulate;

    let pool = for_each_resource(plans, options.concurrency, &cancel, |plan| {
        let registry = Arc::clone(&registry);
        let recorder = Arc::clone(&recorder);
        async move {
            prune_repository(registry.as_ref(), plan, simulate, &recorder).await;
        }
    })
    .await;
    if let Err(e) = pool {
        warn!(recorded = recorder.recorded_so_far(), "prune run stopped early");
        return Err(e);
    }

    phase.advance(RunPhase::Aggregated)?;
    let recorder = Arc::into_inner(recorder).expect("worker tasks have joined");
    let summary = recorder.seal();
    info!(
        run_id = %summary.run_id,
        completed = summary.completed(),
        simulated = summary.simulated(),
        failed = summary.failed(),
        "prune run finished"
    );
    Ok(summary)
}

async fn enumerate<R: RegistryApi>(
    registry: &R,
    repository: Option<&str>,
) -> Result<Vec<(String, Vec<TagEntry>)>, RunError> {
    let repositories = match repository {
        Some(name) => vec![name.to_string()],
        None => registry.list_repositories().await?,
    };
    let mut tags = Vec::with_capacity(repositories.len());
    for repository in repositories {
        let entries = registry.list_tags(&repository).await?;
        tags.push((repository, entries));
    }
    Ok(tags)
}

async fn prune_repository<R: RegistryApi>(
    registry: &R,
    plan: RepositoryPlan,
    simulate: bool,
    recorder: &RunRecorder,
) {
    info!(
        repository = %plan.repository,
        retained = plan.retained,
        pruned = plan.pruned.len(),
        "pruning repository"
    );
    for entry in &plan.pruned {
        let target = format!("{}:{}", plan.repository, entry.name);
        if simulate {
            info!(target = %target, digest = %entry.digest, "would delete tag");
            recorder.record(ActionOutcome::simulated(target, ActionKind::DeleteTag));
            continue;
        }
        match registry.delete_tag(&plan.repository, entry).await {
            Ok(()) => {
                info!(target = %target, "deleted tag");
                recorder.record(ActionOutcome::completed(target, ActionKind::DeleteTag));
            }
            Err(e) => {
                warn!(target = %target, error = %e, "failed to delete tag");
                recorder.record(ActionOutcome::failed(
                    target,
                    ActionKind::DeleteTag,
                    e.to_string(),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use shipshape_common::outcome::ActionStatus;

    use crate::registry::MockRegistry;

    use super::*;

    fn tag(name: &str, hours_ago: i64) -> TagEntry {
        TagEntry {
            name: name.to_string(),
            digest: format!("sha256:{name}"),
            pushed_at: Some(Utc::now() - Duration::hours(hours_ago)),
        }
    }

    fn options(simulate: bool) -> RunOptions {
        RunOptions {
            run_id: "prune-test".to_string(),
            simulate,
            concurrency: 2,
            run_log: None,
        }
    }

    fn keep(count: u32) -> RetentionPolicy {
        RetentionPolicy::new(count).unwrap()
    }

    #[tokio::test]
    async fn twelve_tags_keep_five_prunes_the_seven_oldest() {
        let entries: Vec<TagEntry> = (0..12).map(|i| tag(&format!("v{i}"), i)).collect();
        let registry = Arc::new(MockRegistry::new(vec![("app", entries)]));
        let (_tx, cancel) = watch::channel(false);

        let summary = run_with(Arc::clone(&registry), None, keep(5), &options(false), cancel)
            .await
            .unwrap();

        assert_eq!(summary.completed(), 7);
        assert_eq!(summary.failed(), 0);
        let deleted = registry.deleted();
        assert_eq!(deleted.len(), 7);
        // v0 is the newest push; v5 through v11 are the seven oldest.
        for i in 5..12 {
            assert!(deleted.contains(&("app".to_string(), format!("sha256:v{i}"))));
        }
    }

    #[tokio::test]
    async fn fewer_tags_than_keep_is_a_clean_noop() {
        let entries: Vec<TagEntry> = (0..3).map(|i| tag(&format!("v{i}"), i)).collect();
        let registry = Arc::new(MockRegistry::new(vec![("app", entries)]));
        let (_tx, cancel) = watch::channel(false);

        let summary = run_with(Arc::clone(&registry), None, keep(5), &options(false), cancel)
            .await
            .unwrap();

        assert_eq!(summary.total(), 0);
        assert!(registry.deleted().is_empty());
    }

    #[tokio::test]
    async fn simulate_reports_without_deleting() {
        let entries: Vec<TagEntry> = (0..4).map(|i| tag(&format!("v{i}"), i)).collect();
        let registry = Arc::new(MockRegistry::new(vec![("app", entries)]));
        let (_tx, cancel) = watch::channel(false);

        let summary = run_with(Arc::clone(&registry), None, keep(1), &options(true), cancel)
            .await
            .unwrap();

        assert_eq!(summary.simulated(), 3);
        assert!(registry.deleted().is_empty());
        assert!(summary
            .outcomes
            .iter()
            .all(|o| o.status == ActionStatus::Simulated));
    }

    #[tokio::test]
    async fn delete_failure_is_isolated_to_that_tag() {
        let entries: Vec<TagEntry> = (0..4).map(|i| tag(&format!("v{i}"), i)).collect();
        let registry = Arc::new(
            MockRegistry::new(vec![("app", entries)]).with_failing_delete("sha256:v2"),
        );
        let (_tx, cancel) = watch::channel(false);

        let summary = run_with(Arc::clone(&registry), None, keep(1), &options(false), cancel)
            .await
            .unwrap();

        assert_eq!(summary.completed(), 2);
        assert_eq!(summary.failed(), 1);
        let failed: Vec<_> = summary
            .outcomes
            .iter()
            .filter(|o| o.status == ActionStatus::Failed)
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].target, "app:v2");
        assert!(failed[0].error.is_some());
        assert_eq!(registry.deleted().len(), 2);
    }

    #[tokio::test]
    async fn catalog_failure_aborts_before_any_delete() {
        let registry = Arc::new(MockRegistry::failing_catalog());
        let (_tx, cancel) = watch::channel(false);

        let result = run_with(Arc::clone(&registry), None, keep(5), &options(false), cancel).await;

        assert!(matches!(result, Err(RunError::Registry(_))));
        assert!(registry.deleted().is_empty());
    }

    #[tokio::test]
    async fn one_unlistable_repository_aborts_the_whole_run() {
        let entries: Vec<TagEntry> = (0..4).map(|i| tag(&format!("v{i}"), i)).collect();
        let registry = Arc::new(
            MockRegistry::new(vec![("app", entries), ("broken", Vec::new())])
                .with_failing_tags("broken"),
        );
        let (_tx, cancel) = watch::channel(false);

        let result = run_with(Arc::clone(&registry), None, keep(1), &options(false), cancel).await;

        // Even though "app" enumerated fine, nothing may be deleted.
        assert!(matches!(result, Err(RunError::Registry(_))));
        assert!(registry.deleted().is_empty());
    }

    #[tokio::test]
    async fn empty_catalog_is_a_successful_noop() {
        let registry = Arc::new(MockRegistry::new(Vec::new()));
        let (_tx, cancel) = watch::channel(false);

        let summary = run_with(Arc::clone(&registry), None, keep(5), &options(false), cancel)
            .await
            .unwrap();

        assert_eq!(summary.total(), 0);
    }

    #[tokio::test]
    async fn cancelled_run_deletes_nothing_and_reports_it() {
        let entries: Vec<TagEntry> = (0..12).map(|i| tag(&format!("v{i}"), i)).collect();
        let registry = Arc::new(MockRegistry::new(vec![("app", entries)]));
        let (tx, cancel) = watch::channel(false);
        tx.send(true).unwrap();

        let result = run_with(Arc::clone(&registry), None, keep(5), &options(false), cancel).await;

        assert!(matches!(result, Err(RunError::Cancelled)));
        assert!(registry.deleted().is_empty());
    }

    #[tokio::test]
    async fn scoped_run_touches_only_that_repository() {
        let app: Vec<TagEntry> = (0..3).map(|i| tag(&format!("v{i}"), i)).collect();
        let other: Vec<TagEntry> = (0..3).map(|i| tag(&format!("r{i}"), i)).collect();
        let registry = Arc::new(MockRegistry::new(vec![("app", app), ("other", other)]));
        let (_tx, cancel) = watch::channel(false);

        let summary = run_with(
            Arc::clone(&registry),
            Some("app"),
            keep(1),
            &options(false),
            cancel,
        )
        .await
        .unwrap();

        assert_eq!(summary.completed(), 2);
        assert!(registry
            .deleted()
            .iter()
            .all(|(repository, _)| repository == "app"));
    }
}
