//! CLI output formatting

use crate::core::{Outcome, OutcomeStatus};
use crate::execution::{ExecutionEvent, StepSummary};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a progress bar over pipeline steps
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let template = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress.set_style(template.progress_chars("#>-"));
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format an outcome status for display
pub fn format_status(status: OutcomeStatus) -> String {
    match status {
        OutcomeStatus::Ok => style("OK").green().to_string(),
        OutcomeStatus::OkIdempotent => style("OK (idempotent)").green().to_string(),
        OutcomeStatus::OkSkipped => style("SKIPPED").dim().to_string(),
        OutcomeStatus::Failed => style("FAILED").red().to_string(),
    }
}

/// One outcome line, `<target> STATUS: diagnostic`
pub fn format_outcome(outcome: &Outcome) -> String {
    let icon = match outcome.status {
        OutcomeStatus::Failed => CROSS,
        OutcomeStatus::OkSkipped => INFO,
        _ => CHECK,
    };
    let mut line = format!(
        "  {} {} {}",
        icon,
        style(&outcome.target).bold(),
        format_status(outcome.status)
    );
    if !outcome.diagnostic.is_empty() {
        line.push_str(&format!(": {}", style(last_line(&outcome.diagnostic)).dim()));
    }
    line
}

fn last_line(text: &str) -> &str {
    text.trim_end().lines().last().unwrap_or_default()
}

/// Step totals, e.g. `2 ok, 1 skipped`
pub fn format_summary(summary: &StepSummary) -> String {
    let parts: Vec<String> = [
        (summary.ok, "ok"),
        (summary.idempotent, "idempotent"),
        (summary.skipped, "skipped"),
        (summary.failed, "failed"),
    ]
    .iter()
    .filter(|(n, _)| *n > 0)
    .map(|(n, label)| format!("{} {}", n, label))
    .collect();

    if parts.is_empty() {
        "no targets".to_string()
    } else {
        parts.join(", ")
    }
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::RunStarted {
            run_id,
            pipeline,
            steps,
            targets,
            ..
        } => format!(
            "{} Starting {} ({}): {} step(s) across {}",
            ROCKET,
            style(pipeline).bold(),
            style(&run_id.to_string()[..8]).dim(),
            steps,
            style(targets.join(", ")).cyan()
        ),
        ExecutionEvent::StepStarted {
            index,
            total,
            stage,
            targets,
        } => format!(
            "{} [{}/{}] {} on {}",
            SPINNER,
            index + 1,
            total,
            style(stage).cyan(),
            targets.join(", ")
        ),
        ExecutionEvent::OutcomeRecorded { outcome, .. } => format_outcome(outcome),
        ExecutionEvent::StepCompleted { stage, summary, .. } => {
            format!("{} {} ({})", CHECK, style(stage).green(), format_summary(summary))
        }
        ExecutionEvent::RunAborted { report, .. } => {
            format!("{} {}", CROSS, style(report).red())
        }
        ExecutionEvent::RunCompleted {
            pipeline, elapsed, ..
        } => format!(
            "{} {} completed {} in {}",
            CHECK,
            style(pipeline).bold(),
            style("successfully").green(),
            format_duration(*elapsed)
        ),
    }
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
