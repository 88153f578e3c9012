//! Core domain models
//!
//! Targets, stages, pipelines and the outcomes they produce, plus the
//! configuration and run context they are built from.

pub mod config;
pub mod context;
pub mod matcher;
pub mod outcome;
pub mod pipeline;
pub mod stage;
pub mod target;

pub use context::{PollSpec, PollTimeouts, RunContext, SharedSecret};
pub use matcher::{ConditionPattern, IdempotencyMatcher};
pub use outcome::{Outcome, OutcomeStatus};
pub use pipeline::{ExecutionMode, Pipeline, PipelineStep};
pub use stage::{Applicability, Stage, StageAction};
pub use target::{
    ClusterDescriptor, NetworkParams, NodeCounts, Platform, Role, Target, TargetSelector,
    TargetSet, TargetSetError,
};
