//! Connection and filesystem coordinates of one instance

use crate::{ConfigError, Result, validate_identifier};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Dump format for logical backups
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackupFormat {
    /// Plain SQL script
    Plain,
    /// Compressed archive readable only by the restore tool
    CustomArchive,
    /// One file per table in a directory; the only format dumped in parallel
    #[default]
    Directory,
}

impl BackupFormat {
    /// The dump tool's `-F` letter for this format
    pub fn flag(&self) -> &'static str {
        match self {
            BackupFormat::Plain => "p",
            BackupFormat::CustomArchive => "c",
            BackupFormat::Directory => "d",
        }
    }
}

/// Connection and filesystem settings of one database instance.
///
/// Built once through [`InstanceConfig::builder`] and read-only afterwards.
/// The data and tools directories fall back to locations under the home
/// directory; the fallback is resolved on first read and then cached.
#[derive(Clone)]
pub struct InstanceConfig {
    host: String,
    port: u16,
    super_user: String,
    super_pass: Option<String>,
    home_path: PathBuf,
    data_path: Option<PathBuf>,
    tools_path: Option<PathBuf>,
    backup_format: BackupFormat,
    backup_restore_parallelism: u32,
    resolved_data_path: OnceLock<PathBuf>,
    resolved_tools_path: OnceLock<PathBuf>,
}

impl InstanceConfig {
    /// Start building a configuration from defaults
    pub fn builder() -> InstanceConfigBuilder {
        InstanceConfigBuilder::default()
    }

    /// Database server host
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Database server port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Superuser role name
    pub fn super_user(&self) -> &str {
        &self.super_user
    }

    /// Superuser password, if configured
    pub fn super_pass(&self) -> Option<&str> {
        self.super_pass.as_deref()
    }

    /// Superuser password, or empty when none is configured
    pub fn super_pass_or_empty(&self) -> &str {
        self.super_pass.as_deref().unwrap_or_default()
    }

    /// Instance home directory
    pub fn home_path(&self) -> &Path {
        &self.home_path
    }

    /// Cluster data directory
    pub fn data_path(&self) -> &Path {
        self.resolved_data_path.get_or_init(|| {
            self.data_path
                .clone()
                .unwrap_or_else(|| self.home_path.join("db_data"))
        })
    }

    /// Directory the installer extracts the engine into
    pub fn system_path(&self) -> PathBuf {
        self.home_path.join("db_system")
    }

    /// Directory holding the engine's command-line tools
    pub fn tools_path(&self) -> &Path {
        self.resolved_tools_path.get_or_init(|| {
            self.tools_path
                .clone()
                .unwrap_or_else(|| self.system_path().join("bin"))
        })
    }

    /// Path of an engine tool, with the platform executable suffix
    pub fn tool(&self, name: &str) -> PathBuf {
        self.tools_path()
            .join(format!("{}{}", name, std::env::consts::EXE_SUFFIX))
    }

    /// File name of the data directory
    pub fn data_dir_name(&self) -> String {
        self.data_path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "db_data".to_string())
    }

    /// Sibling of the data directory that receives backups
    pub fn backup_parent_path(&self) -> PathBuf {
        let parent = self.data_path().parent().unwrap_or_else(|| Path::new(""));
        parent.join(format!("{}_backup", self.data_dir_name()))
    }

    /// Dump format used by exports
    pub fn backup_format(&self) -> BackupFormat {
        self.backup_format
    }

    /// Worker count for dumps and restores, at least 1
    pub fn backup_restore_parallelism(&self) -> u32 {
        self.backup_restore_parallelism
    }
}

impl fmt::Debug for InstanceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("super_user", &self.super_user)
            .field("super_pass", &self.super_pass.as_ref().map(|_| "*****"))
            .field("home_path", &self.home_path)
            .field("data_path", &self.data_path)
            .field("tools_path", &self.tools_path)
            .field("backup_format", &self.backup_format)
            .field("backup_restore_parallelism", &self.backup_restore_parallelism)
            .finish()
    }
}

impl fmt::Display for InstanceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "InstanceConfig[host='{}', port={}, superUser='{}', home={}, data={}, tools={}, backupFormat={:?}, parallelism={}]",
            self.host,
            self.port,
            self.super_user,
            self.home_path.display(),
            self.data_path().display(),
            self.tools_path().display(),
            self.backup_format,
            self.backup_restore_parallelism
        )
    }
}

/// Builder for [`InstanceConfig`]
#[derive(Debug, Clone)]
pub struct InstanceConfigBuilder {
    host: String,
    port: u16,
    super_user: String,
    super_pass: Option<String>,
    home_path: Option<PathBuf>,
    data_path: Option<PathBuf>,
    tools_path: Option<PathBuf>,
    backup_format: BackupFormat,
    backup_restore_parallelism: u32,
}

impl Default for InstanceConfigBuilder {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            super_user: "postgres".to_string(),
            super_pass: None,
            home_path: None,
            data_path: None,
            tools_path: None,
            backup_format: BackupFormat::default(),
            backup_restore_parallelism: 1,
        }
    }
}

impl InstanceConfigBuilder {
    /// Set the server host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the server port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the superuser role name
    pub fn super_user(mut self, user: impl Into<String>) -> Self {
        self.super_user = user.into();
        self
    }

    /// Set the superuser password
    pub fn super_pass(mut self, pass: impl Into<String>) -> Self {
        self.super_pass = Some(pass.into());
        self
    }

    /// Set the home directory
    pub fn home_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.home_path = Some(path.into());
        self
    }

    /// Override the data directory
    pub fn data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_path = Some(path.into());
        self
    }

    /// Override the tools directory
    pub fn tools_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.tools_path = Some(path.into());
        self
    }

    /// Set the export format
    pub fn backup_format(mut self, format: BackupFormat) -> Self {
        self.backup_format = format;
        self
    }

    /// Set the dump/restore worker count
    pub fn backup_restore_parallelism(mut self, jobs: u32) -> Self {
        self.backup_restore_parallelism = jobs;
        self
    }

    /// Validate and build the configuration
    pub fn build(self) -> Result<InstanceConfig> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::ValidationError("host must not be blank".into()));
        }
        if self.port == 0 {
            return Err(ConfigError::ValidationError("port must not be 0".into()));
        }
        if self.backup_restore_parallelism == 0 {
            return Err(ConfigError::ValidationError(
                "backup_restore_parallelism must be at least 1".into(),
            ));
        }
        validate_identifier("superuser", &self.super_user)?;

        Ok(InstanceConfig {
            host: self.host,
            port: self.port,
            super_user: self.super_user,
            super_pass: self.super_pass,
            home_path: self.home_path.unwrap_or_else(default_home_path),
            data_path: self.data_path,
            tools_path: self.tools_path,
            backup_format: self.backup_format,
            backup_restore_parallelism: self.backup_restore_parallelism,
            resolved_data_path: OnceLock::new(),
            resolved_tools_path: OnceLock::new(),
        })
    }
}

fn default_home_path() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("c:/postgresql")
    } else {
        PathBuf::from("/opt/postgresql")
    }
}
