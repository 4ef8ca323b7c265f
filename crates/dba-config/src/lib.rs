//! # DBA Configuration
//!
//! Settings describing one database instance ([`InstanceConfig`]), the extra
//! facts needed to provision it ([`InstallPlan`]), and the YAML file format
//! that carries both.
//!
//! Both types are immutable once built. Paths that derive from the home
//! directory are computed on first read and cached for the object's lifetime.

#![warn(missing_docs)]

use thiserror::Error;

mod instance;
pub mod parser;
mod plan;

pub use instance::{BackupFormat, InstanceConfig, InstanceConfigBuilder};
pub use parser::{Config, Settings};
pub use plan::{DEFAULT_ENV_NAME, InstallPlan};

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse YAML
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// Environment variable not found
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Check that `name` can be spliced into SQL as a bare identifier.
///
/// Accepts an ASCII letter or underscore followed by letters, digits,
/// underscores or dollar signs.
pub fn validate_identifier(kind: &str, name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(format!(
            "{} '{}' is not a valid identifier",
            kind, name
        )))
    }
}
