//! Per-invocation outcomes

use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Status of one (stage, target) invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeStatus {
    Ok,
    /// Failed with a diagnostic the stage considers harmless
    OkIdempotent,
    /// Stage does not apply to the target
    OkSkipped,
    Failed,
}

impl OutcomeStatus {
    /// Whether the pipeline may advance past this outcome
    pub fn permits_continuation(&self) -> bool {
        !matches!(self, OutcomeStatus::Failed)
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutcomeStatus::Ok => "ok",
            OutcomeStatus::OkIdempotent => "ok-idempotent",
            OutcomeStatus::OkSkipped => "ok-skipped",
            OutcomeStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Result of running one stage against one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub target: String,
    pub stage: String,
    pub status: OutcomeStatus,
    /// Collaborator output or failure text, kept verbatim
    pub diagnostic: String,
    #[serde(skip)]
    pub duration: Duration,
}

impl Outcome {
    pub fn ok(target: &str, stage: &str, diagnostic: impl Into<String>, duration: Duration) -> Self {
        Self::with_status(target, stage, OutcomeStatus::Ok, diagnostic.into(), duration)
    }

    pub fn idempotent(
        target: &str,
        stage: &str,
        diagnostic: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self::with_status(target, stage, OutcomeStatus::OkIdempotent, diagnostic.into(), duration)
    }

    pub fn skipped(target: &str, stage: &str) -> Self {
        Self::with_status(
            target,
            stage,
            OutcomeStatus::OkSkipped,
            String::new(),
            Duration::ZERO,
        )
    }

    pub fn failed(target: &str, stage: &str, diagnostic: impl Into<String>, duration: Duration) -> Self {
        Self::with_status(target, stage, OutcomeStatus::Failed, diagnostic.into(), duration)
    }

    fn with_status(
        target: &str,
        stage: &str,
        status: OutcomeStatus,
        diagnostic: String,
        duration: Duration,
    ) -> Self {
        Self {
            target: target.to_string(),
            stage: stage.to_string(),
            status,
            diagnostic,
            duration,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == OutcomeStatus::Failed
    }
}
