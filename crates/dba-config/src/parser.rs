//! YAML configuration file with environment variable substitution
//!
//! ```yaml
//! version: "1.0"
//! settings:
//!   command_timeout_secs: 600
//! instance:
//!   port: 5432
//!   super_pass: ${PG_SUPER_PASS}
//!   home_path: c:/postgresql
//! install:
//!   env_name: Acme
//!   allowed_client_addresses: [10.0.0.0/8]
//!   app_users: { app: "${APP_PASS:-changeme}" }
//!   app_databases: { appdb: app }
//! ```

use crate::{BackupFormat, ConfigError, InstallPlan, InstanceConfig, Result};
use host_control::{FirewallMessages, ServiceMessages};
use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A loaded configuration file
#[derive(Debug, Clone)]
pub struct Config {
    /// Tool behavior settings
    pub settings: Settings,
    /// Provisioning plan, carrying the instance configuration
    pub plan: InstallPlan,
}

impl Config {
    /// Instance the file describes
    pub fn instance(&self) -> &InstanceConfig {
        self.plan.base()
    }
}

/// Tool behavior that is not part of the instance itself
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Deadline for any single external command, in seconds
    pub command_timeout_secs: Option<u64>,
    /// Service manager wording to verify against
    pub service_messages: ServiceMessages,
    /// Firewall tool wording to verify against
    pub firewall_messages: FirewallMessages,
}

impl Settings {
    /// Command deadline, if configured. Zero never becomes a deadline.
    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    version: String,
    #[serde(default)]
    settings: Settings,
    #[serde(default)]
    instance: InstanceSection,
    #[serde(default)]
    install: InstallSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct InstanceSection {
    host: Option<String>,
    port: Option<u16>,
    super_user: Option<String>,
    super_pass: Option<String>,
    home_path: Option<PathBuf>,
    data_path: Option<PathBuf>,
    tools_path: Option<PathBuf>,
    backup_format: Option<BackupFormat>,
    backup_restore_parallelism: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct InstallSection {
    env_name: Option<String>,
    service_name: Option<String>,
    firewall_rule_name: Option<String>,
    installer_path: Option<PathBuf>,
    locale: Option<String>,
    listen_addresses: Option<String>,
    allowed_client_addresses: IndexSet<String>,
    system_settings: IndexSet<String>,
    extensions: IndexSet<String>,
    app_users: IndexMap<String, String>,
    app_databases: IndexMap<String, String>,
}

impl InstanceSection {
    fn build(self) -> Result<InstanceConfig> {
        let mut builder = InstanceConfig::builder();
        if let Some(host) = self.host {
            builder = builder.host(host);
        }
        if let Some(port) = self.port {
            builder = builder.port(port);
        }
        if let Some(user) = self.super_user {
            builder = builder.super_user(user);
        }
        if let Some(pass) = self.super_pass {
            builder = builder.super_pass(pass);
        }
        if let Some(home) = self.home_path {
            builder = builder.home_path(home);
        }
        if let Some(data) = self.data_path {
            builder = builder.data_path(data);
        }
        if let Some(tools) = self.tools_path {
            builder = builder.tools_path(tools);
        }
        if let Some(format) = self.backup_format {
            builder = builder.backup_format(format);
        }
        if let Some(jobs) = self.backup_restore_parallelism {
            builder = builder.backup_restore_parallelism(jobs);
        }
        builder.build()
    }
}

impl InstallSection {
    fn into_plan(self, base: InstanceConfig) -> InstallPlan {
        let mut plan = InstallPlan::new(base)
            .allow_client_addresses(self.allowed_client_addresses)
            .system_settings(self.system_settings)
            .extensions(self.extensions)
            .app_users(self.app_users)
            .app_databases(self.app_databases);
        if let Some(env) = self.env_name {
            plan = plan.env_name(env);
        }
        if let Some(service) = self.service_name {
            plan = plan.service_name(service);
        }
        if let Some(rule) = self.firewall_rule_name {
            plan = plan.firewall_rule_name(rule);
        }
        if let Some(installer) = self.installer_path {
            plan = plan.installer_path(installer);
        }
        if let Some(locale) = self.locale {
            plan = plan.locale(locale);
        }
        if let Some(listen) = self.listen_addresses {
            plan = plan.listen_addresses(listen);
        }
        plan
    }
}

/// Parse a YAML configuration file
pub fn parse_file(path: impl AsRef<Path>) -> Result<Config> {
    let content = std::fs::read_to_string(path)?;
    parse_str(&content)
}

/// Parse YAML configuration from a string
pub fn parse_str(content: &str) -> Result<Config> {
    let content = substitute_env_vars(content)?;
    let file: ConfigFile = serde_yaml::from_str(&content)?;

    if file.version != "1.0" {
        return Err(ConfigError::ValidationError(format!(
            "Unsupported version: {}, expected 1.0",
            file.version
        )));
    }
    if file.settings.command_timeout_secs == Some(0) {
        return Err(ConfigError::ValidationError(
            "command_timeout_secs must be positive".into(),
        ));
    }

    let base = file.instance.build()?;
    let plan = file.install.into_plan(base);
    plan.validate()?;

    Ok(Config {
        settings: file.settings,
        plan,
    })
}

/// Substitute `${VAR}` and `${VAR:-default}` with environment values
pub fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
    let mut missing = Vec::new();

    let result = re.replace_all(input, |cap: &regex::Captures<'_>| {
        let expr = &cap[1];
        let (name, default) = match expr.find(":-") {
            Some(pos) => (&expr[..pos], Some(&expr[pos + 2..])),
            None => (expr, None),
        };
        match (std::env::var(name), default) {
            (Ok(value), _) => value,
            (Err(_), Some(default)) => default.to_string(),
            (Err(_), None) => {
                missing.push(name.to_string());
                String::new()
            }
        }
    });

    if !missing.is_empty() {
        return Err(ConfigError::EnvVarNotFound(missing.join(", ")));
    }
    Ok(result.into_owned())
}
