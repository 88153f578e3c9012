//! Pipeline domain model

use crate::core::stage::Stage;
use crate::core::target::TargetSelector;
use std::sync::Arc;

/// How one step runs across its target subset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// One concurrent invocation per target, joined at a barrier
    Parallel,
    /// One target at a time, in input order
    Sequential,
    /// Only the first target of the subset
    Once,
}

/// One entry of a pipeline
#[derive(Debug, Clone)]
pub struct PipelineStep {
    pub stage: Arc<Stage>,
    pub selector: TargetSelector,
    pub mode: ExecutionMode,
}

/// Fixed, ordered sequence of steps
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,

    steps: Vec<PipelineStep>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step
    pub fn step(mut self, stage: Stage, selector: TargetSelector, mode: ExecutionMode) -> Self {
        self.steps.push(PipelineStep {
            stage: Arc::new(stage),
            selector,
            mode,
        });
        self
    }

    /// Append a step run concurrently across `selector`
    pub fn parallel(self, stage: Stage, selector: TargetSelector) -> Self {
        self.step(stage, selector, ExecutionMode::Parallel)
    }

    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Stage names in execution order
    pub fn stage_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.stage.name()).collect()
    }
}
