//! Run-level errors

use crate::execution::AbortReport;
use thiserror::Error;

/// Why a run did not complete
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// A step produced at least one failed outcome
    #[error("pipeline aborted: {0}")]
    Aborted(AbortReport),

    /// One or more targets could not be destroyed
    #[error("teardown failed: {0}")]
    TeardownFailed(AbortReport),
}

impl ProvisionError {
    pub fn report(&self) -> &AbortReport {
        match self {
            ProvisionError::Aborted(report) | ProvisionError::TeardownFailed(report) => report,
        }
    }
}
