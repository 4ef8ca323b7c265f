//! Error types for provisioning workflows

use command_executor::{CommandResult, Mismatch};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while provisioning or maintaining an instance
#[derive(Error, Debug)]
pub enum Error {
    /// A command could not be run, or ran past its deadline
    #[error("Execution error: {0}")]
    Execution(#[from] command_executor::Error),

    /// Something required before an irreversible step is missing
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// A command ran but its output was not the expected success signature
    #[error("{step} failed: expected {expected}, got {result}")]
    Verification {
        /// What the orchestrator was doing
        step: String,
        /// Description of the expected outcome
        expected: String,
        /// Raw captured output
        result: CommandResult,
    },

    /// Restore target database already exists
    #[error("Database already exists: {database}")]
    AlreadyExists {
        /// The database name
        database: String,
    },

    /// Filesystem failure
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Path involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A service or firewall verb failed
    #[error(transparent)]
    Host(#[from] host_control::Error),
}

impl Error {
    pub(crate) fn precondition(msg: impl Into<String>) -> Self {
        Error::Precondition(msg.into())
    }

    pub(crate) fn mismatch(step: impl Into<String>, mismatch: Mismatch) -> Self {
        Error::Verification {
            step: step.into(),
            expected: format!(
                "stdout {} and stderr {}",
                mismatch.expected_out, mismatch.expected_err
            ),
            result: mismatch.result,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether a command was killed for missing its deadline
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Execution(e) => e.is_timeout(),
            Error::Host(host_control::Error::Command(e)) => e.is_timeout(),
            _ => false,
        }
    }

    /// The raw output of the command that failed verification, if any
    pub fn result(&self) -> Option<&CommandResult> {
        match self {
            Error::Verification { result, .. } => Some(result),
            Error::Host(e) => e.result(),
            _ => None,
        }
    }
}

/// Result type for orchestration operations
pub type Result<T> = std::result::Result<T, Error>;
