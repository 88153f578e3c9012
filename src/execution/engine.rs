//! Main execution engine - drives a pipeline step by step across targets

use crate::{
    core::{Outcome, Pipeline, RunContext, Stage, TargetSelector, TargetSet},
    error::ProvisionError,
    execution::{AbortReport, FanOutScheduler, OutcomeAggregator, StageRunner, StepSummary, StepVerdict},
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::{error, info};
use uuid::Uuid;

/// Events that can occur during a run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted {
        run_id: Uuid,
        pipeline: String,
        steps: usize,
        targets: Vec<String>,
        at: DateTime<Utc>,
    },
    StepStarted {
        index: usize,
        total: usize,
        stage: String,
        targets: Vec<String>,
    },
    OutcomeRecorded {
        index: usize,
        outcome: Outcome,
    },
    StepCompleted {
        index: usize,
        stage: String,
        summary: StepSummary,
    },
    RunAborted {
        run_id: Uuid,
        report: AbortReport,
    },
    RunCompleted {
        run_id: Uuid,
        pipeline: String,
        elapsed: Duration,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Summary of a completed run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub pipeline: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Stage name and outcome counts per step, in order
    pub steps: Vec<(String, StepSummary)>,
}

/// Pipeline execution engine
pub struct ExecutionEngine {
    scheduler: FanOutScheduler,
    aggregator: OutcomeAggregator,
    event_handlers: Arc<Mutex<Vec<EventHandler>>>,
}

impl ExecutionEngine {
    pub fn new(scheduler: FanOutScheduler) -> Self {
        Self {
            scheduler,
            aggregator: OutcomeAggregator::new(),
            event_handlers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add an event handler
    pub async fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.lock().await.push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    async fn emit_event(&self, event: ExecutionEvent) {
        let handlers = self.event_handlers.lock().await;
        for handler in handlers.iter() {
            handler(event.clone());
        }
    }

    /// Run every step of `pipeline` in order.
    ///
    /// A step starts only after every invocation of the previous step has
    /// finished. The first step with a failed outcome aborts the run.
    pub async fn execute(
        &self,
        pipeline: &Pipeline,
        targets: &TargetSet,
        ctx: Arc<RunContext>,
    ) -> Result<RunReport, ProvisionError> {
        self.run_steps(pipeline, targets, ctx, ProvisionError::Aborted).await
    }

    /// Destroy every target concurrently.
    ///
    /// All targets are attempted; failures are reported together.
    pub async fn teardown(
        &self,
        stage: Stage,
        targets: &TargetSet,
        ctx: Arc<RunContext>,
    ) -> Result<RunReport, ProvisionError> {
        let pipeline = Pipeline::new("teardown").parallel(stage, TargetSelector::All);
        self.run_steps(&pipeline, targets, ctx, ProvisionError::TeardownFailed)
            .await
    }

    async fn run_steps(
        &self,
        pipeline: &Pipeline,
        targets: &TargetSet,
        ctx: Arc<RunContext>,
        on_abort: fn(AbortReport) -> ProvisionError,
    ) -> Result<RunReport, ProvisionError> {
        let run_id = ctx.run_id;
        let started_at = Utc::now();
        let clock = Instant::now();

        info!(
            "Starting {} ({}) across {} cluster(s)",
            pipeline.name,
            run_id,
            targets.len()
        );
        self.emit_event(ExecutionEvent::RunStarted {
            run_id,
            pipeline: pipeline.name.clone(),
            steps: pipeline.len(),
            targets: targets.names(),
            at: started_at,
        })
        .await;

        let runner = StageRunner::new(ctx);
        let mut steps = Vec::with_capacity(pipeline.len());

        for (index, step) in pipeline.steps().iter().enumerate() {
            let subset = targets.select(step.selector);
            let stage = step.stage.name().to_string();

            info!("Step {}/{}: {}", index + 1, pipeline.len(), stage);
            self.emit_event(ExecutionEvent::StepStarted {
                index,
                total: pipeline.len(),
                stage: stage.clone(),
                targets: subset.iter().map(|t| t.name.clone()).collect(),
            })
            .await;

            let outcomes = self
                .scheduler
                .run_stage(&runner, step.stage.clone(), &subset, step.mode)
                .await;

            for outcome in &outcomes {
                self.emit_event(ExecutionEvent::OutcomeRecorded {
                    index,
                    outcome: outcome.clone(),
                })
                .await;
            }

            match self.aggregator.evaluate(index, &stage, &outcomes) {
                StepVerdict::Continue(summary) => {
                    self.emit_event(ExecutionEvent::StepCompleted {
                        index,
                        stage: stage.clone(),
                        summary,
                    })
                    .await;
                    steps.push((stage, summary));
                }
                StepVerdict::Abort(report) => {
                    error!("Aborting {}: {}", pipeline.name, report);
                    self.emit_event(ExecutionEvent::RunAborted {
                        run_id,
                        report: report.clone(),
                    })
                    .await;
                    return Err(on_abort(report));
                }
            }
        }

        let elapsed = clock.elapsed();
        info!("{} completed in {}s", pipeline.name, elapsed.as_secs());
        self.emit_event(ExecutionEvent::RunCompleted {
            run_id,
            pipeline: pipeline.name.clone(),
            elapsed,
        })
        .await;

        Ok(RunReport {
            run_id,
            pipeline: pipeline.name.clone(),
            started_at,
            finished_at: Utc::now(),
            steps,
        })
    }
}
