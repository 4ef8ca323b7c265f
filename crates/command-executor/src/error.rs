//! Error types for command execution

use std::time::Duration;
use thiserror::Error;

/// Unified error type for command execution
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to spawn a process
    #[error("failed to spawn process: {reason}")]
    SpawnFailed {
        /// The reason for the spawn failure
        reason: String,
    },

    /// The process did not finish before its deadline and was killed
    #[error("command `{command}` timed out after {timeout:?}")]
    TimedOut {
        /// The redacted command line
        command: String,
        /// The deadline that expired
        timeout: Duration,
    },

    /// A process that overran its deadline could not be killed
    #[error("failed to kill process: {reason}")]
    KillFailed {
        /// Why the kill failed
        reason: String,
    },

    /// Output of the process could not be read to the end
    #[error("unreadable {stream} of `{command}`: {reason}")]
    UnreadableOutput {
        /// The redacted command line
        command: String,
        /// `stdout` or `stderr`
        stream: &'static str,
        /// The read error
        reason: String,
    },

    /// A command line could not be split into program and arguments
    #[error("invalid command line: {reason}")]
    InvalidCommandLine {
        /// What is wrong with the line
        reason: String,
    },

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a spawn failed error
    pub fn spawn_failed(reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            reason: reason.into(),
        }
    }

    /// Create a kill failed error
    pub fn kill_failed(reason: impl Into<String>) -> Self {
        Self::KillFailed {
            reason: reason.into(),
        }
    }

    /// Create an invalid command line error
    pub fn invalid_command_line(reason: impl Into<String>) -> Self {
        Self::InvalidCommandLine {
            reason: reason.into(),
        }
    }

    /// Returns true if the error is a deadline expiry rather than a spawn or I/O failure
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::TimedOut { .. })
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
