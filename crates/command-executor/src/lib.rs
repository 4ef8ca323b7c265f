//! Command execution for host provisioning tools
//!
//! This crate runs external command-line tools (installers, database
//! utilities, service and firewall control programs), captures everything they
//! print and hands back a [`CommandResult`]. Whether a run succeeded is judged
//! by the caller from the captured text, with the help of an
//! [`OutputVerifier`], because the wrapped tools are inconsistent about exit
//! codes.

#![warn(missing_docs)]

pub mod backends;
pub mod command;
pub mod error;
pub mod event;
pub mod executor;
pub mod launcher;
pub mod output;
pub mod process;
pub mod verify;

pub use backends::LocalLauncher;
pub use command::{Command, CommandBuilder};
pub use error::{Error, Result};
pub use event::{BlankLineFilter, LogFilter, LogSource, ProcessEvent, ProcessEventType};
pub use executor::{CommandRunner, Executor};
pub use launcher::Launcher;
pub use output::CommandResult;
pub use process::{ExitStatus, ProcessHandle};
pub use verify::{Expectation, Mismatch, OutputVerifier};
