//! Control over a launched process

use crate::error::Result;
use async_trait::async_trait;

/// A handle on a running child process
#[async_trait]
pub trait ProcessHandle: Send + Sync {
    /// OS process id, when the backend knows it
    fn pid(&self) -> Option<u32>;

    /// Wait for the process to exit
    async fn wait(&mut self) -> Result<ExitStatus>;

    /// Forcefully stop the process
    async fn kill(&mut self) -> Result<()>;
}

/// How a process ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitStatus {
    /// Exit code, absent when the process was killed by a signal
    pub code: Option<i32>,
}

impl ExitStatus {
    /// Whether the process exited with code 0
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}
