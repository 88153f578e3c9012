//! meshup - provision clusters and join them into a network mesh

pub mod cli;
pub mod collab;
pub mod core;
pub mod error;
pub mod execution;
pub mod stages;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use crate::core::{Outcome, OutcomeStatus, Pipeline, RunContext, SharedSecret, Stage, StageAction, TargetSet};
pub use collab::{CloudInventory, ClusterApi, CollaboratorError, Collaborators, ProcessRunner, StateStore};
pub use error::ProvisionError;
pub use execution::{ExecutionEngine, ExecutionEvent, FanOutScheduler, PollWatcher};
