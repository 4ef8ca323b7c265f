//! # Host Control
//!
//! Verbs for the two host subsystems a database instance depends on: the OS
//! service manager and the OS firewall. Both are reached only by running their
//! command-line tools through a [`CommandRunner`](command_executor::CommandRunner)
//! and judging the printed text with an
//! [`OutputVerifier`](command_executor::OutputVerifier).
//!
//! The built-in implementations follow Windows conventions (`sc`, `net`,
//! `netsh`). The literal strings they look for are kept in
//! [`ServiceMessages`] and [`FirewallMessages`] so a localized host can
//! supply its own wording.

#![warn(missing_docs)]

mod error;
mod firewall;
mod messages;
mod service;

pub use error::{Error, Result};
pub use firewall::{FirewallControl, NetshFirewall};
pub use messages::{FirewallMessages, ServiceMessages};
pub use service::{ServiceControl, WindowsServices};
