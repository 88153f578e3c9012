//! Bounded readiness polling
//!
//! A [`PollWatcher`] evaluates a predicate immediately and then on a fixed
//! cadence until it holds or the deadline passes. An evaluation still in
//! flight when the deadline fires is dropped.

use crate::collab::CollaboratorError;
use crate::core::PollSpec;
use std::fmt::Display;
use std::future::Future;
use tokio::time::{interval_at, sleep_until, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// How a poll ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollResult {
    Satisfied {
        attempts: u32,
        elapsed: Duration,
    },
    TimedOut {
        attempts: u32,
        elapsed: Duration,
        /// Most recent predicate error, if any
        last_error: Option<String>,
    },
}

impl PollResult {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, PollResult::Satisfied { .. })
    }

    /// Map to a stage result; a timeout is a failure
    pub fn into_stage_result(self, condition: &str) -> Result<String, CollaboratorError> {
        match self {
            PollResult::Satisfied { attempts, elapsed } => Ok(format!(
                "{} after {} check(s) in {}s",
                condition,
                attempts,
                elapsed.as_secs()
            )),
            PollResult::TimedOut {
                elapsed,
                last_error,
                ..
            } => Err(CollaboratorError::Timeout {
                condition: condition.to_string(),
                elapsed_secs: elapsed.as_secs(),
                last_error,
            }),
        }
    }
}

/// Polls a predicate with a fixed interval and an overall deadline
#[derive(Debug, Clone, Copy)]
pub struct PollWatcher {
    interval: Duration,
    timeout: Duration,
}

impl PollWatcher {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval: interval.max(MIN_INTERVAL),
            timeout,
        }
    }

    pub fn from_spec(spec: PollSpec) -> Self {
        Self::new(spec.interval, spec.timeout)
    }

    /// Wait until `predicate` yields `Ok(true)` or the timeout elapses.
    ///
    /// `Err` from the predicate is logged and counts as "not yet".
    pub async fn wait_until<F, Fut, E>(&self, description: &str, mut predicate: F) -> PollResult
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool, E>>,
        E: Display,
    {
        let start = Instant::now();
        let deadline = sleep_until(start + self.timeout);
        tokio::pin!(deadline);

        let mut ticks = interval_at(start + self.interval, self.interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Waiting for {} (every {}s, up to {}s)",
            description,
            self.interval.as_secs(),
            self.timeout.as_secs()
        );

        let mut attempts = 0;
        let mut last_error = None;

        loop {
            attempts += 1;

            tokio::select! {
                biased;
                _ = &mut deadline => {
                    warn!("Timed out waiting for {} after {} check(s)", description, attempts);
                    return PollResult::TimedOut { attempts, elapsed: start.elapsed(), last_error };
                }
                result = predicate() => match result {
                    Ok(true) => {
                        debug!("{} satisfied after {} check(s)", description, attempts);
                        return PollResult::Satisfied { attempts, elapsed: start.elapsed() };
                    }
                    Ok(false) => debug!("Still waiting for {}", description),
                    Err(e) => {
                        warn!(error = %e, "Still waiting for {}", description);
                        last_error = Some(e.to_string());
                    }
                },
            }

            tokio::select! {
                biased;
                _ = &mut deadline => {
                    warn!("Timed out waiting for {} after {} check(s)", description, attempts);
                    return PollResult::TimedOut { attempts, elapsed: start.elapsed(), last_error };
                }
                _ = ticks.tick() => {}
            }
        }
    }
}
