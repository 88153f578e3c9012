//! Outcome aggregation - decides whether a run may continue after a step

use crate::core::{Outcome, OutcomeStatus};
use serde::Serialize;
use std::fmt;

/// One failed invocation in an abort report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub target: String,
    pub stage: String,
    pub diagnostic: String,
}

/// Every failure of the step that aborted the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AbortReport {
    pub step_index: usize,
    pub stage: String,
    pub failures: Vec<FailureRecord>,
}

impl AbortReport {
    pub fn failed_targets(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.target.as_str()).collect()
    }
}

impl fmt::Display for AbortReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "step {} ({}) failed on {} target(s)",
            self.step_index + 1,
            self.stage,
            self.failures.len()
        )?;
        for failure in &self.failures {
            write!(f, "\n  {} [{}]: {}", failure.target, failure.stage, failure.diagnostic)?;
        }
        Ok(())
    }
}

/// Counts of a step's outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StepSummary {
    pub ok: usize,
    pub idempotent: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl StepSummary {
    pub fn from_outcomes(outcomes: &[Outcome]) -> Self {
        let mut summary = Self::default();
        for outcome in outcomes {
            match outcome.status {
                OutcomeStatus::Ok => summary.ok += 1,
                OutcomeStatus::OkIdempotent => summary.idempotent += 1,
                OutcomeStatus::OkSkipped => summary.skipped += 1,
                OutcomeStatus::Failed => summary.failed += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.ok + self.idempotent + self.skipped + self.failed
    }
}

/// Decision after a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepVerdict {
    Continue(StepSummary),
    Abort(AbortReport),
}

/// Fail-fast aggregation: any failed outcome aborts the run
#[derive(Debug, Clone, Copy, Default)]
pub struct OutcomeAggregator;

impl OutcomeAggregator {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, step_index: usize, stage: &str, outcomes: &[Outcome]) -> StepVerdict {
        let failures: Vec<FailureRecord> = outcomes
            .iter()
            .filter(|o| !o.status.permits_continuation())
            .map(|o| FailureRecord {
                target: o.target.clone(),
                stage: o.stage.clone(),
                diagnostic: o.diagnostic.clone(),
            })
            .collect();

        if failures.is_empty() {
            StepVerdict::Continue(StepSummary::from_outcomes(outcomes))
        } else {
            StepVerdict::Abort(AbortReport {
                step_index,
                stage: stage.to_string(),
                failures,
            })
        }
    }
}
