use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use shipshape_common::alert::{Alert, AlertCategory, Severity};
use shipshape_common::metrics::{MetricKind, MetricSample};
use shipshape_common::outcome::{ActionKind, ActionOutcome, RunSummary};
use shipshape_common::policy::ThresholdPolicy;
use shipshape_common::run::{PhaseTracker, RunPhase};

use crate::alerting::AlertDispatcher;
use crate::config::{Config, HostConfig};
use crate::probe::{AnyProbe, HostProbe, HostSnapshot, ProbeError, ServiceState};

use super::{for_each_resource, RunError, RunOptions, RunRecorder};

/// Per-invocation threshold replacements from the command line. `None`
/// falls through to the configured value.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdOverrides {
    pub disk_free_gb: Option<f64>,
    pub cpu_percent: Option<f64>,
    pub memory_percent: Option<f64>,
}

/// What a health run produced: the action summary plus every alert raised
/// along the way.
pub struct HealthReport {
    pub summary: RunSummary,
    pub alerts: Vec<Alert>,
}

/// Checks every configured host and restarts stopped services.
pub async fn run(
    config: &Config,
    host: Option<&str>,
    overrides: ThresholdOverrides,
    options: &RunOptions,
    cancel: watch::Receiver<bool>,
) -> Result<HealthReport, RunError> {
    let dispatcher = AlertDispatcher::from_config(&config.channels, options.simulate);
    run_with(
        config,
        host,
        overrides,
        options,
        cancel,
        dispatcher,
        AnyProbe::for_host,
    )
    .await
}

pub(crate) async fn run_with<P, F>(
    config: &Config,
    host: Option<&str>,
    overrides: ThresholdOverrides,
    options: &RunOptions,
    cancel: watch::Receiver<bool>,
    dispatcher: AlertDispatcher,
    make_probe: F,
) -> Result<HealthReport, RunError>
where
    P: HostProbe + 'static,
    F: Fn(&HostConfig) -> Result<P, ProbeError>,
{
    let mut phase = PhaseTracker::new();
    let thresholds = ThresholdPolicy {
        disk_free_gb: overrides
            .disk_free_gb
            .unwrap_or(config.thresholds.disk_free_gb),
        cpu_percent: overrides.cpu_percent.unwrap_or(config.thresholds.cpu_percent),
        memory_percent: overrides
            .memory_percent
            .unwrap_or(config.thresholds.memory_percent),
    };
    info!(
        run_id = %options.run_id,
        disk_free_gb = thresholds.disk_free_gb,
        cpu_percent = thresholds.cpu_percent,
        memory_percent = thresholds.memory_percent,
        "starting health run"
    );

    if let Err(e) = thresholds.validate() {
        phase.advance(RunPhase::Aborted)?;
        warn!(error = %e, "invalid thresholds, no hosts were checked");
        return Err(e.into());
    }

    // A host whose probe cannot even be constructed points at broken
    // configuration, so the whole run stops before any host is touched.
    let targets = match enumerate_targets(config, host, &make_probe) {
        Ok(targets) => targets,
        Err(e) => {
            phase.advance(RunPhase::Aborted)?;
            warn!(error = %e, "enumeration failed, no hosts were checked");
            return Err(e);
        }
    };

    phase.advance(RunPhase::Evaluating)?;
    phase.advance(RunPhase::Acting)?;
    if options.simulate {
        info!("simulate is on; reporting restarts without performing them");
    }
    let recorder = Arc::new(RunRecorder::new(options));
    let dispatcher = Arc::new(dispatcher);
    let alerts: Arc<Mutex<Vec<Alert>>> = Arc::new(Mutex::new(Vec::new()));
    let simulate = options.simulate;

    let pool = for_each_resource(targets, options.concurrency, &cancel, |(host, probe)| {
        let recorder = Arc::clone(&recorder);
        let dispatcher = Arc::clone(&dispatcher);
        let alerts = Arc::clone(&alerts);
        async move {
            check_host(
                host, probe, thresholds, simulate, &recorder, &dispatcher, &alerts,
            )
            .await;
        }
    })
    .await;
    if let Err(e) = pool {
        warn!(recorded = recorder.recorded_so_far(), "health run stopped early");
        return Err(e);
    }

    phase.advance(RunPhase::Aggregated)?;
    let recorder = Arc::into_inner(recorder).expect("worker tasks have joined");
    let alerts = Arc::into_inner(alerts)
        .expect("worker tasks have joined")
        .into_inner()
        .unwrap();
    let summary = recorder.seal();
    info!(
        run_id = %summary.run_id,
        completed = summary.completed(),
        simulated = summary.simulated(),
        failed = summary.failed(),
        alerts = alerts.len(),
        "health run finished"
    );
    Ok(HealthReport { summary, alerts })
}

fn enumerate_targets<P, F>(
    config: &Config,
    host: Option<&str>,
    make_probe: &F,
) -> Result<Vec<(HostConfig, P)>, RunError>
where
    F: Fn(&HostConfig) -> Result<P, ProbeError>,
{
    let hosts: Vec<HostConfig> = match host {
        Some(name) => {
            let found = config
                .hosts
                .iter()
                .find(|h| h.name == name)
                .cloned()
                .ok_or_else(|| RunError::UnknownHost(name.to_string()))?;
            vec![found]
        }
        None => config.hosts.clone(),
    };
    let mut targets = Vec::with_capacity(hosts.len());
    for host in hosts {
        let probe = make_probe(&host)?;
        targets.push((host, probe));
    }
    Ok(targets)
}

async fn check_host<P: HostProbe>(
    host: HostConfig,
    probe: P,
    thresholds: ThresholdPolicy,
    simulate: bool,
    recorder: &RunRecorder,
    dispatcher: &AlertDispatcher,
    alerts: &Mutex<Vec<Alert>>,
) {
    if !probe.ping().await {
        warn!(host = %host.name, "host is unreachable");
        let alert = Alert::new(
            Severity::Critical,
            AlertCategory::Service,
            host.name.clone(),
            format!("host {} is unreachable", host.name),
        );
        record_alert(alert, dispatcher, alerts).await;
        recorder.record(ActionOutcome::failed(
            host.name.clone(),
            ActionKind::Probe,
            "host is unreachable",
        ));
        return;
    }

    match probe.snapshot().await {
        Ok(snapshot) => {
            recorder.record(ActionOutcome::completed(host.name.clone(), ActionKind::Probe));
            for drive in &snapshot.drives {
                debug!(
                    host = %host.name,
                    mount = %drive.mount,
                    free_gb = drive.free_gb,
                    total_gb = drive.total_gb,
                    "drive space"
                );
            }
            let samples = samples_from(&snapshot);
            for breach in thresholds.select_breaches(&samples) {
                info!(host = %host.name, breach = %breach.describe(), "threshold breached");
                let alert = Alert::new(
                    Severity::Warning,
                    category_for(breach.sample.kind),
                    host.name.clone(),
                    format!("{}: {}", host.name, breach.describe()),
                );
                record_alert(alert, dispatcher, alerts).await;
            }
        }
        Err(e) => {
            // Metrics trouble does not make service checks pointless, so
            // the host stays in the run.
            warn!(host = %host.name, error = %e, "failed to read host metrics");
            let alert = Alert::new(
                Severity::Critical,
                AlertCategory::Other,
                host.name.clone(),
                format!("{}: metrics probe failed: {e}", host.name),
            );
            record_alert(alert, dispatcher, alerts).await;
            recorder.record(ActionOutcome::failed(
                host.name.clone(),
                ActionKind::Probe,
                e.to_string(),
            ));
        }
    }

    for service in &host.services {
        let target = format!("{}/{}", host.name, service);
        match probe.service_status(service).await {
            Ok(ServiceState::Running) => {}
            Ok(ServiceState::Stopped) => {
                warn!(target = %target, "service is stopped");
                let alert = Alert::new(
                    Severity::Critical,
                    AlertCategory::Service,
                    target.clone(),
                    format!("service {service} on {} is stopped", host.name),
                );
                record_alert(alert, dispatcher, alerts).await;
                if simulate {
                    info!(target = %target, "would restart service");
                    recorder.record(ActionOutcome::simulated(target, ActionKind::RestartService));
                    continue;
                }
                match probe.restart_service(service).await {
                    Ok(()) => {
                        info!(target = %target, "service restarted");
                        recorder
                            .record(ActionOutcome::completed(target, ActionKind::RestartService));
                    }
                    Err(e) => {
                        warn!(target = %target, error = %e, "failed to restart service");
                        recorder.record(ActionOutcome::failed(
                            target,
                            ActionKind::RestartService,
                            e.to_string(),
                        ));
                    }
                }
            }
            Err(e) => {
                warn!(target = %target, error = %e, "failed to read service status");
                recorder.record(ActionOutcome::failed(target, ActionKind::Probe, e.to_string()));
            }
        }
    }
}

async fn record_alert(alert: Alert, dispatcher: &AlertDispatcher, alerts: &Mutex<Vec<Alert>>) {
    let report = dispatcher.dispatch(&alert).await;
    if report.failed() > 0 {
        warn!(
            subject = %alert.subject,
            sent = report.sent(),
            failed = report.failed(),
            "some alert channels failed"
        );
    }
    alerts.lock().unwrap().push(alert);
}

fn samples_from(snapshot: &HostSnapshot) -> Vec<MetricSample> {
    let mut samples = Vec::with_capacity(snapshot.drives.len() + 2);
    for drive in &snapshot.drives {
        samples.push(MetricSample::with_detail(
            MetricKind::DiskFreeGb,
            drive.free_gb,
            drive.mount.clone(),
        ));
    }
    samples.push(MetricSample::new(MetricKind::CpuPercent, snapshot.cpu_percent));
    samples.push(MetricSample::new(
        MetricKind::MemoryPercent,
        snapshot.memory_percent,
    ));
    samples
}

fn category_for(kind: MetricKind) -> AlertCategory {
    match kind {
        MetricKind::DiskFreeGb => AlertCategory::Disk,
        MetricKind::CpuPercent => AlertCategory::Cpu,
        MetricKind::MemoryPercent => AlertCategory::Memory,
    }
}
