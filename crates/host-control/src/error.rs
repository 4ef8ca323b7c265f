//! Error types for host control

use command_executor::{CommandResult, Mismatch};
use thiserror::Error;

/// Errors raised by service and firewall verbs
#[derive(Error, Debug)]
pub enum Error {
    /// A service command ran but did not report success
    #[error("service {action} failed: {service}: {mismatch}")]
    ServiceVerification {
        /// The service name
        service: String,
        /// The verb that failed
        action: &'static str,
        /// What was expected and what was printed
        mismatch: Mismatch,
    },

    /// The service manager did not report any state for the service
    #[error("service state not available: {service} {result}")]
    ServiceUnavailable {
        /// The service name
        service: String,
        /// The raw query output
        result: CommandResult,
    },

    /// A firewall command ran but did not report success
    #[error("firewall rule {action} failed: {rule}: {mismatch}")]
    FirewallVerification {
        /// The rule name
        rule: String,
        /// The verb that failed
        action: &'static str,
        /// What was expected and what was printed
        mismatch: Mismatch,
    },

    /// The command could not be run at all
    #[error("Command execution error: {0}")]
    Command(#[from] command_executor::Error),
}

impl Error {
    /// The raw output of the command that failed verification, if any
    pub fn result(&self) -> Option<&CommandResult> {
        match self {
            Error::ServiceVerification { mismatch, .. }
            | Error::FirewallVerification { mismatch, .. } => Some(&mismatch.result),
            Error::ServiceUnavailable { result, .. } => Some(result),
            Error::Command(_) => None,
        }
    }
}

/// Result type for host control operations
pub type Result<T> = std::result::Result<T, Error>;
