//! Main executor type that wraps a launcher

use crate::command::Command;
use crate::error::Result;
use crate::launcher::Launcher;
use crate::output::CommandResult;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Anything that can run a command to completion and hand back its output.
///
/// Higher layers depend on this trait rather than on [`Executor`], so a
/// scripted runner can stand in for the real host.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` and capture its output.
    ///
    /// Fails only when the process cannot be run (or misses its deadline);
    /// a non-zero exit code still yields a [`CommandResult`].
    async fn run(&self, command: Command) -> Result<CommandResult>;
}

/// An executor that runs commands via a specific launcher
pub struct Executor<L: Launcher> {
    /// The name used for logging/identification
    name: String,
    /// The launcher implementation
    launcher: L,
    /// Deadline applied to every command
    timeout: Option<Duration>,
}

impl<L: Launcher> Executor<L> {
    /// Create a new executor with the given launcher
    pub fn new(name: String, launcher: L) -> Self {
        Self {
            name,
            launcher,
            timeout: None,
        }
    }

    /// Kill any command that runs longer than `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Get the executor name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the configured deadline
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Launch a command and return event stream and process handle
    pub async fn launch(&self, command: Command) -> Result<(L::EventStream, L::Handle)> {
        self.launcher.launch(command).await
    }

    /// Execute a command with the executor's deadline
    pub async fn execute(&self, command: Command) -> Result<CommandResult> {
        self.execute_with_deadline(command, self.timeout).await
    }

    /// Execute a command with an explicit deadline, overriding the default
    pub async fn execute_with_deadline(
        &self,
        command: Command,
        timeout: Option<Duration>,
    ) -> Result<CommandResult> {
        let envs: Vec<String> = command
            .get_envs()
            .keys()
            .map(|k| k.to_string_lossy().into_owned())
            .collect();
        debug!(executor = %self.name, "exec {} [envs={:?}]", command, envs);

        let result = self.launcher.execute(command, timeout).await?;
        debug!(executor = %self.name, "result {}", result);
        Ok(result)
    }
}

#[async_trait]
impl<L: Launcher> CommandRunner for Executor<L> {
    async fn run(&self, command: Command) -> Result<CommandResult> {
        self.execute(command).await
    }
}
