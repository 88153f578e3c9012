//! Stage runner - runs one stage against one target

use crate::core::{Outcome, RunContext, Stage, Target};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

/// Runs single (stage, target) invocations
#[derive(Debug, Clone)]
pub struct StageRunner {
    ctx: Arc<RunContext>,
}

impl StageRunner {
    pub fn new(ctx: Arc<RunContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<RunContext> {
        &self.ctx
    }

    /// Run `stage` against `target` exactly once.
    ///
    /// Inapplicable pairs are skipped without touching any collaborator. A
    /// failure whose diagnostic matches the stage's idempotency matcher is
    /// reported as ok-idempotent.
    pub async fn run(&self, stage: &Stage, target: &Target) -> Outcome {
        if !stage.applies_to(target) {
            debug!("Skipping {} on {}", stage.name(), target.name);
            return Outcome::skipped(&target.name, stage.name());
        }

        let span = info_span!("stage", stage = stage.name(), cluster = %target.name);
        async {
            let started = Instant::now();
            let result = stage.action().invoke(target, &self.ctx).await;
            let elapsed = started.elapsed();

            match result {
                Ok(summary) => {
                    info!("Completed in {:.1}s", elapsed.as_secs_f64());
                    Outcome::ok(&target.name, stage.name(), summary, elapsed)
                }
                Err(e) => {
                    let diagnostic = e.to_string();
                    if stage.matcher().matches(&diagnostic) {
                        info!("Already applied ({})", stage.matcher().name());
                        debug!("{}", diagnostic);
                        Outcome::idempotent(&target.name, stage.name(), diagnostic, elapsed)
                    } else {
                        warn!("Failed: {}", diagnostic);
                        Outcome::failed(&target.name, stage.name(), diagnostic, elapsed)
                    }
                }
            }
        }
        .instrument(span)
        .await
    }
}
