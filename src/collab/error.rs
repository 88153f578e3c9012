//! Collaborator error types

use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by an external collaborator.
///
/// The `Display` output is the diagnostic carried in a failed outcome and is
/// what idempotency matchers inspect, so tool output is included verbatim.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// Program could not be started
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Program ran and exited non-zero
    #[error("{program} exited with code {code}: {output}")]
    Exit {
        program: String,
        code: i32,
        output: String,
    },

    /// Cluster or cloud API returned something unusable
    #[error("API error: {0}")]
    Api(String),

    /// Tool output could not be parsed
    #[error("failed to parse {what}: {message}")]
    Parse { what: String, message: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Poll deadline elapsed before the condition held
    #[error("timed out after {elapsed_secs}s waiting for {condition}{}", last_error.as_ref().map(|e| format!(" (last error: {e})")).unwrap_or_default())]
    Timeout {
        condition: String,
        elapsed_secs: u64,
        last_error: Option<String>,
    },

    /// Required local state is missing or inconsistent
    #[error("precondition failed: {0}")]
    Precondition(String),
}

impl CollaboratorError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CollaboratorError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(what: impl Into<String>, message: impl ToString) -> Self {
        CollaboratorError::Parse {
            what: what.into(),
            message: message.to_string(),
        }
    }
}
