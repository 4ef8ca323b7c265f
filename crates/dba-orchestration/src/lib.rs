//! # DBA Orchestration
//!
//! Provisioning workflows for a standalone database instance: install,
//! uninstall, data-directory backup, logical backup and restore, and
//! backup-then-drop.
//!
//! ## Example
//!
//! ```rust,no_run
//! use command_executor::Executor;
//! use dba_config::{InstallPlan, InstanceConfig};
//! use dba_orchestration::Orchestrator;
//! use std::sync::Arc;
//!
//! # async fn example() -> dba_orchestration::Result<()> {
//! let config = InstanceConfig::builder()
//!     .super_pass("S3cr3t!")
//!     .build()
//!     .expect("valid config");
//! let plan = InstallPlan::new(config)
//!     .installer_path("c:/setup/postgresql-16-windows-x64.exe")
//!     .allow_client_addresses(["10.0.0.0/8"]);
//!
//! let orchestrator = Orchestrator::new(Arc::new(Executor::local("dba")));
//! orchestrator.install(&plan).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod engine;
pub mod error;
mod fs;
mod orchestrator;
pub mod patch;

pub use engine::{AnchoredFile, Engine, Login, Postgres, Statement};
pub use error::{Error, Result};
pub use orchestrator::Orchestrator;
