//! Local process execution backend

use async_process::{Child, Stdio};
use async_trait::async_trait;
use futures::stream::Stream;
use futures_lite::io::{AsyncBufReadExt, AsyncRead, BufReader, Split};
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::command::Command;
use crate::error::{Error, Result};
use crate::event::{BlankLineFilter, LogFilter, LogSource, ProcessEvent, ProcessEventType};
use crate::launcher::Launcher;
use crate::process::{ExitStatus, ProcessHandle};

/// Launcher for executing processes locally
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalLauncher;

/// A handle to control a local process
pub struct LocalProcessHandle {
    /// The underlying child process
    child: Child,
    /// Whether to kill the process on drop
    kill_on_drop: bool,
}

type OutputPipe = Pin<Box<dyn AsyncRead + Send>>;

/// Raw lines of one pipe, split on `\n` without decoding
type PipeLines = Split<BufReader<OutputPipe>>;

/// Stream of process events
pub struct ProcessEventStream {
    stdout: Option<PipeLines>,
    stderr: Option<PipeLines>,
    filter: Box<dyn LogFilter + Send>,
}

fn pipe_lines(pipe: impl AsyncRead + Send + 'static) -> PipeLines {
    let pipe: OutputPipe = Box::pin(pipe);
    BufReader::new(pipe).split(b'\n')
}

/// Decode one raw line. Tools print in the console code page, so bytes that
/// are not UTF-8 become U+FFFD instead of ending the stream.
fn decode_line(mut raw: Vec<u8>) -> String {
    if raw.last() == Some(&b'\r') {
        raw.pop();
    }
    match String::from_utf8(raw) {
        Ok(line) => line,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

#[async_trait]
impl Launcher for LocalLauncher {
    type EventStream = ProcessEventStream;
    type Handle = LocalProcessHandle;

    async fn launch(&self, command: Command) -> Result<(Self::EventStream, Self::Handle)> {
        let mut async_cmd = command.prepare();

        // The tools we run never read input; a closed stdin keeps an
        // installer from blocking on a prompt.
        async_cmd.stdin(Stdio::null());
        async_cmd.stdout(Stdio::piped());
        async_cmd.stderr(Stdio::piped());

        let mut child = async_cmd
            .spawn()
            .map_err(|e| Error::spawn_failed(format!("Failed to spawn `{}`: {}", command, e)))?;

        let stdout = child.stdout.take().map(pipe_lines);
        let stderr = child.stderr.take().map(pipe_lines);

        let events = ProcessEventStream {
            stdout,
            stderr,
            filter: Box::new(BlankLineFilter),
        };

        let handle = LocalProcessHandle {
            child,
            kill_on_drop: true,
        };

        Ok((events, handle))
    }
}

#[async_trait]
impl ProcessHandle for LocalProcessHandle {
    fn pid(&self) -> Option<u32> {
        Some(self.child.id())
    }

    async fn wait(&mut self) -> Result<ExitStatus> {
        let status = self
            .child
            .status()
            .await
            .map_err(|e| Error::spawn_failed(format!("Failed to wait for process: {}", e)))?;

        // Once reaped there is nothing left to kill.
        self.kill_on_drop = false;

        Ok(ExitStatus {
            code: status.code(),
        })
    }

    async fn kill(&mut self) -> Result<()> {
        self.child
            .kill()
            .map_err(|e| Error::kill_failed(e.to_string()))
    }
}

impl Drop for LocalProcessHandle {
    fn drop(&mut self) {
        if self.kill_on_drop {
            // Synchronous kill; the async method cannot run here
            let _ = self.child.kill();
        }
    }
}

impl ProcessEventStream {
    fn pipe(&mut self, source: LogSource) -> &mut Option<PipeLines> {
        match source {
            LogSource::Stdout => &mut self.stdout,
            LogSource::Stderr => &mut self.stderr,
        }
    }

    fn poll_source(
        &mut self,
        source: LogSource,
        cx: &mut Context<'_>,
    ) -> Poll<Option<ProcessEvent>> {
        loop {
            let Some(lines) = self.pipe(source).as_mut() else {
                return Poll::Ready(None);
            };

            match Pin::new(lines).poll_next(cx) {
                Poll::Ready(Some(Ok(raw))) => {
                    let line = decode_line(raw);
                    if let Some(filtered) = self.filter.filter(&line, source) {
                        let event_type = match source {
                            LogSource::Stdout => ProcessEventType::Stdout,
                            LogSource::Stderr => ProcessEventType::Stderr,
                        };
                        return Poll::Ready(Some(ProcessEvent::line(
                            event_type,
                            filtered.to_string(),
                        )));
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    *self.pipe(source) = None;
                    return Poll::Ready(Some(ProcessEvent::line(
                        ProcessEventType::ReadFailed(source),
                        e.to_string(),
                    )));
                }
                Poll::Ready(None) => {
                    *self.pipe(source) = None;
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl Stream for ProcessEventStream {
    type Item = ProcessEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        // Poll both pipes every time so neither can fill up and stall the child
        if let Poll::Ready(Some(event)) = self.poll_source(LogSource::Stdout, cx) {
            return Poll::Ready(Some(event));
        }
        if let Poll::Ready(Some(event)) = self.poll_source(LogSource::Stderr, cx) {
            return Poll::Ready(Some(event));
        }

        if self.stdout.is_none() && self.stderr.is_none() {
            return Poll::Ready(None);
        }

        Poll::Pending
    }
}

// Convenience constructor for Executor with LocalLauncher
impl crate::executor::Executor<LocalLauncher> {
    /// Create an executor for local process execution
    pub fn local(name: impl Into<String>) -> Self {
        Self::new(name.into(), LocalLauncher)
    }
}
