//! Pipeline execution engine

pub mod aggregator;
pub mod engine;
pub mod poll;
pub mod runner;
pub mod scheduler;

pub use aggregator::{AbortReport, FailureRecord, OutcomeAggregator, StepSummary, StepVerdict};
pub use engine::{EventHandler, ExecutionEngine, ExecutionEvent, RunReport};
pub use poll::{PollResult, PollWatcher};
pub use runner::StageRunner;
pub use scheduler::FanOutScheduler;
