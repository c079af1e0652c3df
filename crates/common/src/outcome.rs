use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a pipeline did, or would have done, to one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    DeleteTag,
    RestartService,
    Probe,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::DeleteTag => "delete_tag",
            ActionKind::RestartService => "restart_service",
            ActionKind::Probe => "probe",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Completed,
    Simulated,
    Failed,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Completed => "completed",
            ActionStatus::Simulated => "simulated",
            ActionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of acting on a single item. `error` carries detail exactly when
/// the status is `Failed`; the constructors keep the two in step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub target: String,
    pub action: ActionKind,
    pub status: ActionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl ActionOutcome {
    pub fn completed(target: impl Into<String>, action: ActionKind) -> Self {
        Self {
            target: target.into(),
            action,
            status: ActionStatus::Completed,
            error: None,
            recorded_at: Utc::now(),
        }
    }

    pub fn simulated(target: impl Into<String>, action: ActionKind) -> Self {
        Self {
            target: target.into(),
            action,
            status: ActionStatus::Simulated,
            error: None,
            recorded_at: Utc::now(),
        }
    }

    pub fn failed(
        target: impl Into<String>,
        action: ActionKind,
        error: impl Into<String>,
    ) -> Self {
        Self {
            target: target.into(),
            action,
            status: ActionStatus::Failed,
            error: Some(error.into()),
            recorded_at: Utc::now(),
        }
    }
}

/// Final, sealed view of one run. Counters are derived from the outcome
/// list, never stored, so they cannot drift from it.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<ActionOutcome>,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn completed(&self) -> usize {
        self.count(ActionStatus::Completed)
    }

    pub fn simulated(&self) -> usize {
        self.count(ActionStatus::Simulated)
    }

    pub fn failed(&self) -> usize {
        self.count(ActionStatus::Failed)
    }

    fn count(&self, status: ActionStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let elapsed = (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0;
        write!(
            f,
            "run {}: {} actions ({} completed, {} simulated, {} failed) in {:.1}s",
            self.run_id,
            self.total(),
            self.completed(),
            self.simulated(),
            self.failed(),
            elapsed
        )
    }
}

/// Append-only collector for action outcomes.
///
/// Worker tasks share the aggregator behind an `Arc` and append through the
/// interior lock; nothing is ever mutated or removed. `snapshot` gives the
/// mid-run partial view, `seal` consumes the aggregator so no outcome can be
/// added after the final summary exists.
pub struct RunAggregator {
    run_id: String,
    started_at: DateTime<Utc>,
    outcomes: Mutex<Vec<ActionOutcome>>,
}

impl RunAggregator {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            started_at: Utc::now(),
            outcomes: Mutex::new(Vec::new()),
        }
    }

    pub fn record(&self, outcome: ActionOutcome) {
        self.outcomes.lock().unwrap().push(outcome);
    }

    /// Copy of everything recorded so far, in append order.
    pub fn snapshot(&self) -> Vec<ActionOutcome> {
        self.outcomes.lock().unwrap().clone()
    }

    pub fn seal(self) -> RunSummary {
        RunSummary {
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at: Utc::now(),
            outcomes: self.outcomes.into_inner().unwrap(),
        }
    }
}
