//! Captured output of one command run

use std::fmt;

/// Text captured from one command execution.
///
/// Each stream is flattened: blank lines are dropped and the remaining lines
/// are concatenated without a separator. Equality is structural.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CommandResult {
    out: String,
    err: String,
    code: Option<i32>,
}

impl CommandResult {
    /// Create a result from already flattened stdout and stderr text
    pub fn new(out: impl Into<String>, err: impl Into<String>) -> Self {
        Self {
            out: out.into(),
            err: err.into(),
            code: None,
        }
    }

    /// Attach the exit code reported by the process
    pub fn with_code(mut self, code: Option<i32>) -> Self {
        self.code = code;
        self
    }

    /// Flattened standard output
    pub fn out(&self) -> &str {
        &self.out
    }

    /// Flattened standard error
    pub fn err(&self) -> &str {
        &self.err
    }

    /// Exit code, if the process exited normally and it was recorded
    pub fn code(&self) -> Option<i32> {
        self.code
    }
}

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommandResult[out='{}', err='{}'", self.out, self.err)?;
        if let Some(code) = self.code {
            write!(f, ", code={}", code)?;
        }
        write!(f, "]")
    }
}

/// Accumulates the lines of one stream into flattened text
#[derive(Debug, Default)]
pub(crate) struct Flattener {
    text: String,
}

impl Flattener {
    pub(crate) fn push_line(&mut self, line: &str) {
        if !line.trim().is_empty() {
            self.text.push_str(line);
        }
    }

    pub(crate) fn finish(self) -> String {
        self.text
    }
}
