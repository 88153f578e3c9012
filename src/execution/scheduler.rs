//! Fan-out scheduler - runs one stage across a target subset and joins

use crate::core::{ExecutionMode, Outcome, Stage, Target};
use crate::execution::StageRunner;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::Duration;
use tracing::error;

/// Runs a stage over many targets with a barrier at the end
#[derive(Debug, Clone, Default)]
pub struct FanOutScheduler {
    limit: Option<Arc<Semaphore>>,
}

impl FanOutScheduler {
    /// Unbounded fan-out: one live invocation per target
    pub fn new() -> Self {
        Self::default()
    }

    /// At most `max_parallel` invocations at a time (`0` means unbounded)
    pub fn with_max_parallel(max_parallel: usize) -> Self {
        if max_parallel == 0 {
            return Self::new();
        }
        Self {
            limit: Some(Arc::new(Semaphore::new(max_parallel))),
        }
    }

    /// Run `stage` against every target and return one outcome per target,
    /// in target order.
    ///
    /// Returns only after every invocation has finished. Failures do not
    /// cancel or skip the remaining invocations.
    pub async fn run_stage(
        &self,
        runner: &StageRunner,
        stage: Arc<Stage>,
        targets: &[Arc<Target>],
        mode: ExecutionMode,
    ) -> Vec<Outcome> {
        match mode {
            ExecutionMode::Parallel => self.run_parallel(runner, stage, targets).await,
            ExecutionMode::Sequential => {
                let mut outcomes = Vec::with_capacity(targets.len());
                for target in targets {
                    outcomes.push(runner.run(&stage, target).await);
                }
                outcomes
            }
            ExecutionMode::Once => match targets.first() {
                Some(target) => vec![runner.run(&stage, target).await],
                None => Vec::new(),
            },
        }
    }

    async fn run_parallel(
        &self,
        runner: &StageRunner,
        stage: Arc<Stage>,
        targets: &[Arc<Target>],
    ) -> Vec<Outcome> {
        let handles: Vec<_> = targets
            .iter()
            .map(|target| {
                let runner = runner.clone();
                let stage = stage.clone();
                let target = target.clone();
                let limit = self.limit.clone();

                tokio::spawn(async move {
                    let _permit = match limit {
                        Some(semaphore) => semaphore.acquire_owned().await.ok(),
                        None => None,
                    };
                    runner.run(&stage, &target).await
                })
            })
            .collect();

        // Awaiting in input order keeps each result in its target's slot
        let mut outcomes = Vec::with_capacity(handles.len());
        for (target, handle) in targets.iter().zip(handles) {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("{} on {} did not complete: {}", stage.name(), target.name, e);
                    Outcome::failed(
                        &target.name,
                        stage.name(),
                        format!("invocation aborted: {e}"),
                        Duration::ZERO,
                    )
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }
}
