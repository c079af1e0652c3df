use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Lifecycle phases of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Enumerating,
    Evaluating,
    Acting,
    Aggregated,
    Aborted,
}

impl RunPhase {
    /// Legal forward transitions. Aborting is only possible while
    /// enumerating; once acting may have started, the run must finish and
    /// report whatever it did.
    pub fn can_advance_to(self, next: RunPhase) -> bool {
        matches!(
            (self, next),
            (RunPhase::Enumerating, RunPhase::Evaluating)
                | (RunPhase::Enumerating, RunPhase::Aborted)
                | (RunPhase::Evaluating, RunPhase::Acting)
                | (RunPhase::Acting, RunPhase::Aggregated)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Enumerating => "enumerating",
            RunPhase::Evaluating => "evaluating",
            RunPhase::Acting => "acting",
            RunPhase::Aggregated => "aggregated",
            RunPhase::Aborted => "aborted",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("illegal run phase transition: {from} -> {to}")]
pub struct PhaseError {
    pub from: RunPhase,
    pub to: RunPhase,
}

/// Tracks the current phase of a run and refuses illegal transitions.
#[derive(Debug)]
pub struct PhaseTracker {
    current: RunPhase,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            current: RunPhase::Enumerating,
        }
    }

    pub fn current(&self) -> RunPhase {
        self.current
    }

    pub fn advance(&mut self, next: RunPhase) -> Result<(), PhaseError> {
        if !self.current.can_advance_to(next) {
            return Err(PhaseError {
                from: self.current,
                to: next,
            });
        }
        self.current = next;
        Ok(())
    }
}
