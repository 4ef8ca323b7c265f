//! Judging captured output against an expected success signature
//!
//! The tools wrapped by this crate report success in free-form text, and the
//! exact wording differs between tools, locales and versions. Orchestration
//! code states what it expects as an [`OutputVerifier`] and never inspects
//! strings itself, so a verifier can switch from literal matching to a regex
//! or an exit code without touching the caller.

use crate::output::CommandResult;
use regex::Regex;
use std::fmt;
use thiserror::Error;

/// What one output stream must look like
#[derive(Debug, Clone)]
pub enum Expectation {
    /// Any text is accepted
    Anything,
    /// Only whitespace (or nothing)
    Blank,
    /// Exactly this text
    Equals(String),
    /// Text ending with this suffix
    EndsWith(String),
    /// Text containing this fragment
    Contains(String),
    /// Text matching this pattern
    Matches(Regex),
    /// The process exit code equals this value; the text itself is ignored
    ExitCode(i32),
    /// At least one of the nested expectations holds
    AnyOf(Vec<Expectation>),
}

impl Expectation {
    /// Check a stream's text (and the run's exit code) against this expectation
    pub fn holds(&self, text: &str, code: Option<i32>) -> bool {
        match self {
            Expectation::Anything => true,
            Expectation::Blank => text.trim().is_empty(),
            Expectation::Equals(expected) => text == expected,
            Expectation::EndsWith(suffix) => text.ends_with(suffix.as_str()),
            Expectation::Contains(fragment) => text.contains(fragment.as_str()),
            Expectation::Matches(re) => re.is_match(text),
            Expectation::ExitCode(expected) => code == Some(*expected),
            Expectation::AnyOf(options) => options.iter().any(|e| e.holds(text, code)),
        }
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expectation::Anything => write!(f, "anything"),
            Expectation::Blank => write!(f, "blank"),
            Expectation::Equals(s) => write!(f, "equal to '{}'", s),
            Expectation::EndsWith(s) => write!(f, "ending with '{}'", s),
            Expectation::Contains(s) => write!(f, "containing '{}'", s),
            Expectation::Matches(re) => write!(f, "matching /{}/", re.as_str()),
            Expectation::ExitCode(c) => write!(f, "exit code {}", c),
            Expectation::AnyOf(options) => {
                write!(f, "one of [")?;
                for (i, option) in options.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}", option)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Expected shape of a command's stdout and stderr
#[derive(Debug, Clone)]
pub struct OutputVerifier {
    out: Expectation,
    err: Expectation,
}

/// A command result that did not match its verifier
#[derive(Debug, Clone, Error)]
#[error("expected stdout {expected_out} and stderr {expected_err}, got {result}")]
pub struct Mismatch {
    /// Description of the stdout expectation
    pub expected_out: String,
    /// Description of the stderr expectation
    pub expected_err: String,
    /// The raw captured output
    pub result: CommandResult,
}

impl OutputVerifier {
    /// Constrain stdout only
    pub fn stdout(out: Expectation) -> Self {
        Self {
            out,
            err: Expectation::Anything,
        }
    }

    /// Stdout must equal `marker` and stderr must be blank
    pub fn marker(marker: impl Into<String>) -> Self {
        Self {
            out: Expectation::Equals(marker.into()),
            err: Expectation::Blank,
        }
    }

    /// Both streams must be blank; for tools that are silent on success
    pub fn silent() -> Self {
        Self {
            out: Expectation::Blank,
            err: Expectation::Blank,
        }
    }

    /// Success is judged by exit code alone
    pub fn exit_code(code: i32) -> Self {
        Self {
            out: Expectation::ExitCode(code),
            err: Expectation::Anything,
        }
    }

    /// Replace the stderr expectation
    pub fn with_stderr(mut self, err: Expectation) -> Self {
        self.err = err;
        self
    }

    /// True if `result` satisfies both expectations
    pub fn accepts(&self, result: &CommandResult) -> bool {
        self.out.holds(result.out(), result.code()) && self.err.holds(result.err(), result.code())
    }

    /// Check `result`, returning a [`Mismatch`] with the raw output if it does not satisfy both expectations
    pub fn verify(&self, result: &CommandResult) -> Result<(), Mismatch> {
        if self.accepts(result) {
            Ok(())
        } else {
            Err(Mismatch {
                expected_out: self.out.to_string(),
                expected_err: self.err.to_string(),
                result: result.clone(),
            })
        }
    }
}
