//! Provisioning plan layered on top of an instance configuration

use crate::{ConfigError, InstanceConfig, Result, validate_identifier};
use indexmap::{IndexMap, IndexSet};
use ipnet::IpNet;
use std::fmt;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

/// Environment name used when none is configured
pub const DEFAULT_ENV_NAME: &str = "BrinvexDBA";

/// Everything needed to install an instance on a host.
///
/// Ordered collections keep the order they were given in, which is the
/// order the provisioning steps apply them.
#[derive(Clone)]
pub struct InstallPlan {
    base: InstanceConfig,
    env_name: Option<String>,
    service_name: Option<String>,
    firewall_rule_name: Option<String>,
    installer_path: Option<PathBuf>,
    locale: String,
    listen_addresses: String,
    allowed_client_addresses: IndexSet<String>,
    system_settings: IndexSet<String>,
    extensions: IndexSet<String>,
    app_users: IndexMap<String, String>,
    app_databases: IndexMap<String, String>,
}

impl InstallPlan {
    /// Start a plan for `base` with default names and no app objects
    pub fn new(base: InstanceConfig) -> Self {
        Self {
            base,
            env_name: None,
            service_name: None,
            firewall_rule_name: None,
            installer_path: None,
            locale: "English_United States.UTF8".to_string(),
            listen_addresses: "*".to_string(),
            allowed_client_addresses: IndexSet::new(),
            system_settings: IndexSet::new(),
            extensions: IndexSet::new(),
            app_users: IndexMap::new(),
            app_databases: IndexMap::new(),
        }
    }

    /// Set the environment name that prefixes service and rule names
    pub fn env_name(mut self, name: impl Into<String>) -> Self {
        self.env_name = Some(name.into());
        self
    }

    /// Override the OS service name
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Override the firewall rule name
    pub fn firewall_rule_name(mut self, name: impl Into<String>) -> Self {
        self.firewall_rule_name = Some(name.into());
        self
    }

    /// Set the installer executable
    pub fn installer_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.installer_path = Some(path.into());
        self
    }

    /// Set the cluster locale
    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    /// Set the `listen_addresses` server setting
    pub fn listen_addresses(mut self, addresses: impl Into<String>) -> Self {
        self.listen_addresses = addresses.into();
        self
    }

    /// Add client networks allowed to connect
    pub fn allow_client_addresses<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_client_addresses
            .extend(addresses.into_iter().map(Into::into));
        self
    }

    /// Add raw `ALTER SYSTEM` assignments such as `max_connections=200`
    pub fn system_settings<I, S>(mut self, settings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.system_settings
            .extend(settings.into_iter().map(Into::into));
        self
    }

    /// Add extensions to create in every app database
    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions
            .extend(extensions.into_iter().map(Into::into));
        self
    }

    /// Add app login roles as `(user, password)` pairs
    pub fn app_users<I, U, P>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = (U, P)>,
        U: Into<String>,
        P: Into<String>,
    {
        self.app_users
            .extend(users.into_iter().map(|(u, p)| (u.into(), p.into())));
        self
    }

    /// Add app databases as `(database, owner)` pairs
    pub fn app_databases<I, D, O>(mut self, databases: I) -> Self
    where
        I: IntoIterator<Item = (D, O)>,
        D: Into<String>,
        O: Into<String>,
    {
        self.app_databases
            .extend(databases.into_iter().map(|(d, o)| (d.into(), o.into())));
        self
    }

    /// The instance this plan provisions
    pub fn base(&self) -> &InstanceConfig {
        &self.base
    }

    /// Environment name
    pub fn env(&self) -> &str {
        self.env_name.as_deref().unwrap_or(DEFAULT_ENV_NAME)
    }

    /// OS service name, `<env>_Postgresql` unless overridden
    pub fn service(&self) -> String {
        self.service_name
            .clone()
            .unwrap_or_else(|| format!("{}_Postgresql", self.env()))
    }

    /// Firewall rule name, `<env>_PG - open <port>` unless overridden
    pub fn firewall_rule(&self) -> String {
        self.firewall_rule_name
            .clone()
            .unwrap_or_else(|| format!("{}_PG - open {}", self.env(), self.base.port()))
    }

    /// Installer executable, if one is configured
    pub fn installer(&self) -> Option<&Path> {
        self.installer_path.as_deref()
    }

    /// Cluster locale
    pub fn cluster_locale(&self) -> &str {
        &self.locale
    }

    /// Value of the `listen_addresses` server setting
    pub fn listen(&self) -> &str {
        &self.listen_addresses
    }

    /// Client networks allowed to connect, in insertion order
    pub fn allowed_client_addresses(&self) -> &IndexSet<String> {
        &self.allowed_client_addresses
    }

    /// Raw system settings, in insertion order
    pub fn settings(&self) -> &IndexSet<String> {
        &self.system_settings
    }

    /// Extensions to create in every app database
    pub fn extension_names(&self) -> &IndexSet<String> {
        &self.extensions
    }

    /// App users and their passwords
    pub fn users(&self) -> &IndexMap<String, String> {
        &self.app_users
    }

    /// App databases and their owners
    pub fn databases(&self) -> &IndexMap<String, String> {
        &self.app_databases
    }

    /// Password of an app user
    pub fn password_of(&self, user: &str) -> Option<&str> {
        self.app_users.get(user).map(String::as_str)
    }

    /// Check names and addresses before anything touches the host
    pub fn validate(&self) -> Result<()> {
        for user in self.app_users.keys() {
            validate_identifier("app user", user)?;
        }
        for (database, owner) in &self.app_databases {
            validate_identifier("app database", database)?;
            validate_identifier("database owner", owner)?;
        }
        for extension in &self.extensions {
            validate_identifier("extension", extension)?;
        }
        for address in &self.allowed_client_addresses {
            validate_client_address(address)?;
        }
        for setting in &self.system_settings {
            if !setting.contains('=') {
                return Err(ConfigError::ValidationError(format!(
                    "system setting '{}' is not of the form name=value",
                    setting
                )));
            }
        }
        if !self.extensions.is_empty() {
            for (database, owner) in &self.app_databases {
                if !self.app_users.contains_key(owner) {
                    return Err(ConfigError::ValidationError(format!(
                        "owner '{}' of database '{}' needs a password in app_users to create extensions",
                        owner, database
                    )));
                }
            }
        }
        Ok(())
    }
}

fn validate_client_address(address: &str) -> Result<()> {
    let valid = if address.contains('/') {
        address.parse::<IpNet>().is_ok()
    } else {
        address.parse::<IpAddr>().is_ok() || is_hostname(address)
    };
    if valid {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(format!(
            "client address '{}' is neither a CIDR block nor a host",
            address
        )))
    }
}

fn is_hostname(s: &str) -> bool {
    !s.is_empty()
        && s.split('.').all(|label| {
            !label.is_empty() && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

impl fmt::Debug for InstallPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let users: Vec<&String> = self.app_users.keys().collect();
        f.debug_struct("InstallPlan")
            .field("base", &self.base)
            .field("env", &self.env())
            .field("service", &self.service())
            .field("firewall_rule", &self.firewall_rule())
            .field("installer_path", &self.installer_path)
            .field("locale", &self.locale)
            .field("listen_addresses", &self.listen_addresses)
            .field("allowed_client_addresses", &self.allowed_client_addresses)
            .field("system_settings", &self.system_settings)
            .field("extensions", &self.extensions)
            .field("app_users", &users)
            .field("app_databases", &self.app_databases)
            .finish()
    }
}
