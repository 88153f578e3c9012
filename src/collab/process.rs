//! Subprocess execution via tokio

use crate::collab::{CollaboratorError, ProcessRunner};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, warn};

/// Exit status and captured output of a finished program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: i32,
    /// stdout only, for machine-readable output
    pub stdout: String,
    /// stdout followed by stderr
    pub combined_output: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Last non-empty line, for short progress messages
    pub fn last_line(&self) -> &str {
        self.combined_output
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("")
    }
}

/// Runs programs as child processes of this one
#[derive(Debug, Clone, Default)]
pub struct TokioProcessRunner;

impl TokioProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn execute(&self, program: &Path, args: &[String]) -> Result<ProcessOutput, CollaboratorError> {
        debug!("Spawning {} {}", program.display(), args.join(" "));

        let output = Command::new(program)
            .args(args)
            .stdin(std::process::Stdio::null())
            .output()
            .await
            .map_err(|source| CollaboratorError::Spawn {
                program: program.display().to_string(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let mut combined_output = stdout.clone();
        combined_output.push_str(&String::from_utf8_lossy(&output.stderr));

        // Killed by a signal
        let exit_code = output.status.code().unwrap_or(-1);
        if exit_code != 0 {
            warn!("{} exited with code {}", program.display(), exit_code);
        }

        Ok(ProcessOutput {
            exit_code,
            stdout,
            combined_output,
        })
    }
}

/// Run a program and treat a non-zero exit as an error carrying its output
pub async fn run_checked(
    runner: &dyn ProcessRunner,
    program: &Path,
    args: &[String],
) -> Result<ProcessOutput, CollaboratorError> {
    let output = runner.execute(program, args).await?;
    debug!("{}: {}", program.display(), output.combined_output.trim_end());

    if !output.success() {
        return Err(CollaboratorError::Exit {
            program: program_name(program),
            code: output.exit_code,
            output: output.combined_output,
        });
    }

    Ok(output)
}

fn program_name(program: &Path) -> String {
    program
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string())
}

/// Build an owned argument vector from string-likes
#[macro_export]
macro_rules! args {
    ($($arg:expr),* $(,)?) => {
        vec![$(::std::string::ToString::to_string(&$arg)),*]
    };
}
