//! Launcher trait for executing commands

use crate::command::Command;
use crate::error::{Error, Result};
use crate::event::{LogSource, ProcessEvent, ProcessEventType};
use crate::output::{CommandResult, Flattener};
use crate::process::ProcessHandle;
use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use std::time::Duration;
use tracing::{debug, trace};

/// A launcher that can start commands and collect what they print
#[async_trait]
pub trait Launcher: Send + Sync + 'static {
    /// The event stream type this launcher produces
    type EventStream: Stream<Item = ProcessEvent> + Send + Unpin;

    /// The process handle type this launcher produces
    type Handle: ProcessHandle;

    /// Launch a command, returning event stream and control handle
    async fn launch(&self, command: Command) -> Result<(Self::EventStream, Self::Handle)>;

    /// Execute a command, wait for it to complete and capture its output.
    ///
    /// Both output streams are drained completely before the exit status is
    /// awaited. A stream that fails mid-read yields
    /// [`Error::UnreadableOutput`] rather than a truncated result. With a
    /// `timeout` the child is killed once it expires and [`Error::TimedOut`]
    /// is returned instead of a result.
    async fn execute(&self, command: Command, timeout: Option<Duration>) -> Result<CommandResult> {
        let display = command.to_string();
        let (mut events, mut handle) = self.launch(command).await?;

        let outcome = match timeout {
            Some(limit) => {
                futures_lite::future::or(
                    async { Some(collect_output(&display, &mut events, &mut handle).await) },
                    async {
                        async_io::Timer::after(limit).await;
                        None
                    },
                )
                .await
            }
            None => Some(collect_output(&display, &mut events, &mut handle).await),
        };

        match outcome {
            Some(result) => result,
            None => {
                handle.kill().await?;
                // Reap the child; its status no longer matters.
                let _ = handle.wait().await;
                Err(Error::TimedOut {
                    command: display,
                    timeout: timeout.unwrap_or_default(),
                })
            }
        }
    }
}

async fn collect_output<S, H>(command: &str, events: &mut S, handle: &mut H) -> Result<CommandResult>
where
    S: Stream<Item = ProcessEvent> + Send + Unpin,
    H: ProcessHandle,
{
    let mut out = Flattener::default();
    let mut err = Flattener::default();
    let mut unreadable = None;

    while let Some(event) = events.next().await {
        let at = event.timestamp.format("%H:%M:%S%.3f");
        match (&event.event_type, event.data) {
            (ProcessEventType::Stdout, Some(line)) => {
                trace!("{} cmdOut: {}", at, line);
                out.push_line(&line);
            }
            (ProcessEventType::Stderr, Some(line)) => {
                trace!("{} cmdErr: {}", at, line);
                err.push_line(&line);
            }
            (ProcessEventType::ReadFailed(source), reason) => {
                let stream = match source {
                    LogSource::Stdout => "stdout",
                    LogSource::Stderr => "stderr",
                };
                if unreadable.is_none() {
                    unreadable = Some(Error::UnreadableOutput {
                        command: command.to_string(),
                        stream,
                        reason: reason.unwrap_or_default(),
                    });
                }
            }
            _ => {}
        }
    }

    let status = handle.wait().await?;
    if let Some(e) = unreadable {
        return Err(e);
    }
    if !status.success() {
        debug!("`{}` exited with {:?}", command, status.code);
    }
    Ok(CommandResult::new(out.finish(), err.finish()).with_code(status.code))
}
