//! Install, uninstall, backup and restore workflows
//!
//! Every step probes host state first and skips work that is already done,
//! so a failed workflow is recovered by fixing the cause and running it
//! again. Nothing is rolled back.

use crate::engine::{Engine, Login, Postgres, Statement};
use crate::error::{Error, Result};
use crate::fs;
use crate::patch::ensure_lines_under_anchor;
use command_executor::{Command, CommandResult, CommandRunner, Expectation, OutputVerifier};
use dba_config::{BackupFormat, InstallPlan, InstanceConfig, validate_identifier};
use host_control::{FirewallControl, NetshFirewall, ServiceControl, WindowsServices};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Drives an instance through its lifecycle.
///
/// Holds the command runner plus the service, firewall and engine
/// strategies it delegates to; all of them can be replaced for other hosts
/// or for tests.
pub struct Orchestrator {
    runner: Arc<dyn CommandRunner>,
    services: Box<dyn ServiceControl>,
    firewall: Box<dyn FirewallControl>,
    engine: Box<dyn Engine>,
}

impl Orchestrator {
    /// Orchestrator for PostgreSQL on a Windows host
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            services: Box::new(WindowsServices::new(runner.clone())),
            firewall: Box::new(NetshFirewall::new(runner.clone())),
            engine: Box::new(Postgres),
            runner,
        }
    }

    /// Replace the service controller
    pub fn with_services(mut self, services: impl ServiceControl + 'static) -> Self {
        self.services = Box::new(services);
        self
    }

    /// Replace the firewall controller
    pub fn with_firewall(mut self, firewall: impl FirewallControl + 'static) -> Self {
        self.firewall = Box::new(firewall);
        self
    }

    /// Replace the engine command templates
    pub fn with_engine(mut self, engine: impl Engine + 'static) -> Self {
        self.engine = Box::new(engine);
        self
    }

    /// Bring the host from any partial state to a fully provisioned instance
    pub async fn install(&self, plan: &InstallPlan) -> Result<()> {
        plan.validate()
            .map_err(|e| Error::precondition(e.to_string()))?;
        let config = plan.base();
        let service = plan.service();
        info!("Installing {} instance {}", self.engine.name(), service);

        fs::ensure_dir(config.home_path())?;
        self.ensure_installed(plan).await?;
        self.ensure_cluster(plan).await?;
        self.ensure_service_registered(plan).await?;
        self.services.start_if_not_running(&service).await?;

        self.patch_client_access(plan)?;
        self.patch_connection_settings(plan)?;
        self.services.restart(&service).await?;

        self.apply_system_settings(plan).await?;
        self.create_app_users(plan).await?;
        self.create_app_databases(plan).await?;
        self.create_extensions(plan).await?;
        self.ensure_firewall_rule(plan).await?;

        self.services.restart(&service).await?;
        info!("Instance {} installed", service);
        Ok(())
    }

    /// Remove the service, firewall rule and binaries; the data directory is
    /// moved aside, never deleted
    pub async fn uninstall(&self, plan: &InstallPlan) -> Result<()> {
        let config = plan.base();
        let service = plan.service();
        info!("Uninstalling instance {}", service);

        if self.services.exists(&service).await? {
            if self.services.is_running(&service).await? {
                info!("Stopping service {}", service);
                self.services.stop(&service).await?;
            }
            warn!("Unregistering service {}", service);
            let result = self
                .run(self.engine.unregister_service(config, &service))
                .await?;
            if self.services.exists(&service).await? {
                return Err(Error::Verification {
                    step: format!("unregister service {}", service),
                    expected: "service to be gone".into(),
                    result,
                });
            }
        } else {
            info!("Service {} not registered", service);
        }

        if config.data_path().exists() {
            self.backup_data(config).await?;
        } else {
            info!("No data directory at {}", config.data_path().display());
        }

        let system = config.system_path();
        if system.exists() {
            warn!("Deleting {}", system.display());
            fs::remove_tree(&system)?;
        } else {
            info!("No system directory at {}", system.display());
        }

        let rule = plan.firewall_rule();
        if self.firewall.rule_exists(&rule).await? {
            info!("Removing firewall rule {}", rule);
            self.firewall.remove_rule(&rule).await?;
        } else {
            info!("Firewall rule {} not present", rule);
        }

        info!("Instance {} uninstalled", service);
        Ok(())
    }

    /// Move the data directory into a timestamped directory under the backup
    /// parent.
    ///
    /// Returns where the data went, or `None` when there was no data directory.
    pub async fn backup_data(&self, config: &InstanceConfig) -> Result<Option<PathBuf>> {
        let parent = config.backup_parent_path();
        fs::ensure_dir(&parent)?;

        let data = config.data_path();
        if !data.exists() {
            info!("No data directory to back up at {}", data.display());
            return Ok(None);
        }

        let stem = format!("{}_{}", config.data_dir_name(), fs::timestamp());
        let dest = fs::unique_path(&parent, &stem, "");
        info!("Moving {} to {}", data.display(), dest.display());
        std::fs::rename(data, &dest).map_err(|e| Error::io(data, e))?;
        Ok(Some(dest))
    }

    /// Dump `database` as a custom archive to `dest`
    pub async fn backup_database(
        &self,
        config: &InstanceConfig,
        database: &str,
        dest: &Path,
    ) -> Result<()> {
        check_identifier("database", database)?;
        info!("Backing up {} to {}", database, dest.display());
        let cmd = self
            .engine
            .dump(config, database, dest, BackupFormat::CustomArchive, 1);
        self.run_verified(format!("backup of {}", database), cmd, &OutputVerifier::silent())
            .await
    }

    /// Dump `database` to `dest` in the configured backup format
    pub async fn export_database(
        &self,
        config: &InstanceConfig,
        database: &str,
        dest: &Path,
    ) -> Result<()> {
        check_identifier("database", database)?;
        let format = config.backup_format();
        info!("Exporting {} as {:?} to {}", database, format, dest.display());
        let cmd = self.engine.dump(
            config,
            database,
            dest,
            format,
            config.backup_restore_parallelism(),
        );
        self.run_verified(format!("export of {}", database), cmd, &OutputVerifier::silent())
            .await
    }

    /// Create `database` owned by `owner` and restore `archive` into it.
    ///
    /// Refuses to touch a database that already exists.
    pub async fn restore_database(
        &self,
        config: &InstanceConfig,
        archive: &Path,
        database: &str,
        owner: &str,
    ) -> Result<()> {
        check_identifier("database", database)?;
        check_identifier("owner", owner)?;
        if self.database_exists(config, database).await? {
            return Err(Error::AlreadyExists {
                database: database.to_string(),
            });
        }
        if !archive.exists() {
            return Err(Error::precondition(format!(
                "backup {} not found",
                archive.display()
            )));
        }

        self.create_database(config, database, owner).await?;
        info!("Restoring {} into {}", archive.display(), database);
        let cmd = self.engine.restore(config, archive, database, owner);
        self.run_verified(format!("restore of {}", database), cmd, &OutputVerifier::silent())
            .await
    }

    /// Back `database` up under the backup parent, then drop it.
    ///
    /// Returns the backup file. A failed drop leaves the backup in place.
    pub async fn backup_and_drop_database(
        &self,
        config: &InstanceConfig,
        database: &str,
    ) -> Result<PathBuf> {
        check_identifier("database", database)?;
        let parent = config.backup_parent_path();
        fs::ensure_dir(&parent)?;

        let stem = format!("{}_{}", database, fs::timestamp());
        let dest = fs::unique_path(&parent, &stem, ".backup");
        self.backup_database(config, database, &dest).await?;
        self.drop_database(config, database).await?;
        Ok(dest)
    }

    /// Drop `database`, disconnecting its sessions
    pub async fn drop_database(&self, config: &InstanceConfig, database: &str) -> Result<()> {
        check_identifier("database", database)?;
        warn!("Dropping database {}", database);
        self.superuser_statement(config, Statement::DropDatabase { database })
            .await
    }

    /// Whether `database` exists
    pub async fn database_exists(&self, config: &InstanceConfig, database: &str) -> Result<bool> {
        let cmd = self
            .engine
            .database_probe(config, Login::superuser(config), database);
        let result = self.probe(format!("lookup of database {}", database), cmd).await?;
        Ok(self.engine.database_present(result.out()))
    }

    /// Whether a role named exactly `role` exists
    pub async fn role_exists(&self, config: &InstanceConfig, role: &str) -> Result<bool> {
        Ok(self.roles(config).await?.iter().any(|r| r == role))
    }

    /// Create `database` owned by `owner`
    pub async fn create_database(
        &self,
        config: &InstanceConfig,
        database: &str,
        owner: &str,
    ) -> Result<()> {
        check_identifier("database", database)?;
        check_identifier("owner", owner)?;
        info!("Creating database {} owned by {}", database, owner);
        self.superuser_statement(config, Statement::CreateDatabase { database, owner })
            .await
    }

    /// Apply every system setting of the plan
    pub async fn apply_system_settings(&self, plan: &InstallPlan) -> Result<()> {
        for setting in plan.settings() {
            info!("Applying system setting {}", setting);
            self.superuser_statement(plan.base(), Statement::AlterSystem { setting })
                .await?;
        }
        Ok(())
    }

    /// Create each app user that does not exist yet
    pub async fn create_app_users(&self, plan: &InstallPlan) -> Result<()> {
        if plan.users().is_empty() {
            return Ok(());
        }
        let roles = self.roles(plan.base()).await?;
        for (user, password) in plan.users() {
            if roles.iter().any(|r| r == user) {
                info!("Role {} already exists", user);
                continue;
            }
            info!("Creating role {}", user);
            self.superuser_statement(plan.base(), Statement::CreateRole { user, password })
                .await?;
        }
        Ok(())
    }

    /// Create each app database that does not exist yet
    pub async fn create_app_databases(&self, plan: &InstallPlan) -> Result<()> {
        for (database, owner) in plan.databases() {
            if self.database_exists(plan.base(), database).await? {
                info!("Database {} already exists", database);
                continue;
            }
            self.create_database(plan.base(), database, owner).await?;
        }
        Ok(())
    }

    /// Create every extension in every app database, as the database owner
    pub async fn create_extensions(&self, plan: &InstallPlan) -> Result<()> {
        if plan.extension_names().is_empty() {
            return Ok(());
        }
        let config = plan.base();
        for (database, owner) in plan.databases() {
            let password = plan.password_of(owner).ok_or_else(|| {
                Error::precondition(format!(
                    "no password for {}, owner of {}",
                    owner, database
                ))
            })?;
            let login = Login {
                user: owner,
                password,
            };
            for extension in plan.extension_names() {
                info!("Ensuring extension {} in {}", extension, database);
                let statement = Statement::CreateExtension { extension };
                let cmd = self.engine.statement(config, login, database, &statement);
                self.run_verified(
                    format!("{} in {}", statement, database),
                    cmd,
                    &self.engine.verifier(&statement),
                )
                .await?;
            }
        }
        Ok(())
    }

    /// Restart the instance service
    pub async fn restart_service(&self, plan: &InstallPlan) -> Result<()> {
        let service = plan.service();
        info!("Restarting service {}", service);
        Ok(self.services.restart(&service).await?)
    }

    /// Restart the instance service only if it is running
    pub async fn restart_service_if_running(&self, plan: &InstallPlan) -> Result<bool> {
        let service = plan.service();
        if self.services.exists(&service).await? && self.services.is_running(&service).await? {
            self.services.restart(&service).await?;
            Ok(true)
        } else {
            info!("Service {} not running, not restarting", service);
            Ok(false)
        }
    }

    async fn ensure_installed(&self, plan: &InstallPlan) -> Result<()> {
        let config = plan.base();
        let system = config.system_path();
        if system.exists() {
            info!("Already installed at {}", system.display());
            return Ok(());
        }

        let installer = plan
            .installer()
            .ok_or_else(|| Error::precondition("no installer configured"))?;
        if !installer.is_file() {
            return Err(Error::precondition(format!(
                "installer {} not found",
                installer.display()
            )));
        }
        require_super_pass(config)?;

        info!("Extracting {} into {}", installer.display(), system.display());
        let result = self.run(self.engine.install(installer, config)).await?;
        require_exists(&system, "installer", result)
    }

    async fn ensure_cluster(&self, plan: &InstallPlan) -> Result<()> {
        let config = plan.base();
        let data = config.data_path();
        if data.exists() {
            info!("Cluster already initialised at {}", data.display());
            return Ok(());
        }
        require_super_pass(config)?;

        // Removed on drop, whatever initdb does
        let mut pwfile = tempfile::Builder::new()
            .prefix("pwfile")
            .tempfile_in(config.home_path())
            .map_err(|e| Error::io(config.home_path(), e))?;
        if let Err(e) = pwfile
            .write_all(config.super_pass_or_empty().as_bytes())
            .and_then(|_| pwfile.flush())
        {
            return Err(Error::io(pwfile.path(), e));
        }

        info!("Initialising cluster at {}", data.display());
        let cmd = self
            .engine
            .init_cluster(config, plan.cluster_locale(), pwfile.path());
        let result = self.run(cmd).await?;
        drop(pwfile);
        require_exists(data, "cluster initialisation", result)
    }

    async fn ensure_service_registered(&self, plan: &InstallPlan) -> Result<()> {
        let service = plan.service();
        if self.services.exists(&service).await? {
            info!("Service {} already registered", service);
            return Ok(());
        }

        info!("Registering service {}", service);
        let result = self
            .run(self.engine.register_service(plan.base(), &service))
            .await?;
        if !self.services.exists(&service).await? {
            return Err(Error::Verification {
                step: format!("register service {}", service),
                expected: "service to exist".into(),
                result,
            });
        }
        Ok(())
    }

    fn patch_client_access(&self, plan: &InstallPlan) -> Result<()> {
        let target = self.engine.client_access();
        let path = plan.base().data_path().join(target.file_name);
        let content = fs::read(&path)?;

        let mut lines = Vec::new();
        for network in plan.allowed_client_addresses() {
            if content.contains(network.as_str()) {
                info!("Client network {} already allowed", network);
            } else {
                lines.push(self.engine.client_access_line(network));
            }
        }
        self.patch_file(&path, &content, target.anchor, &lines)
    }

    fn patch_connection_settings(&self, plan: &InstallPlan) -> Result<()> {
        let target = self.engine.connection_settings();
        let path = plan.base().data_path().join(target.file_name);
        let content = fs::read(&path)?;
        let lines = self
            .engine
            .connection_lines(plan.base().port(), plan.listen());
        self.patch_file(&path, &content, target.anchor, &lines)
    }

    fn patch_file(&self, path: &Path, content: &str, anchor: &str, lines: &[String]) -> Result<()> {
        let patched = ensure_lines_under_anchor(content, anchor, lines).map_err(|e| {
            Error::precondition(format!("cannot patch {}: {}", path.display(), e))
        })?;
        if patched == content {
            info!("{} already up to date", path.display());
            return Ok(());
        }
        info!("Patching {}", path.display());
        fs::write(path, &patched)
    }

    async fn ensure_firewall_rule(&self, plan: &InstallPlan) -> Result<()> {
        let rule = plan.firewall_rule();
        if self.firewall.rule_exists(&rule).await? {
            info!("Firewall rule {} already exists", rule);
            return Ok(());
        }
        info!("Creating firewall rule {}", rule);
        Ok(self
            .firewall
            .create_tcp_allow_rule(&rule, plan.base().port())
            .await?)
    }

    async fn roles(&self, config: &InstanceConfig) -> Result<Vec<String>> {
        let cmd = self.engine.list_roles(config, Login::superuser(config));
        let result = self.probe("role listing", cmd).await?;
        Ok(self.engine.parse_roles(result.out()))
    }

    async fn superuser_statement(
        &self,
        config: &InstanceConfig,
        statement: Statement<'_>,
    ) -> Result<()> {
        let cmd = self.engine.statement(
            config,
            Login::superuser(config),
            self.engine.maintenance_database(),
            &statement,
        );
        self.run_verified(statement.to_string(), cmd, &self.engine.verifier(&statement))
            .await
    }

    async fn probe(&self, step: impl Into<String>, cmd: Command) -> Result<CommandResult> {
        let result = self.run(cmd).await?;
        OutputVerifier::stdout(Expectation::Anything)
            .with_stderr(Expectation::Blank)
            .verify(&result)
            .map_err(|m| Error::mismatch(step, m))?;
        Ok(result)
    }

    async fn run_verified(
        &self,
        step: impl Into<String>,
        cmd: Command,
        verifier: &OutputVerifier,
    ) -> Result<()> {
        let result = self.run(cmd).await?;
        verifier
            .verify(&result)
            .map_err(|m| Error::mismatch(step, m))
    }

    async fn run(&self, cmd: Command) -> Result<CommandResult> {
        Ok(self.runner.run(cmd).await?)
    }
}

fn check_identifier(kind: &str, name: &str) -> Result<()> {
    validate_identifier(kind, name).map_err(|e| Error::precondition(e.to_string()))
}

fn require_super_pass(config: &InstanceConfig) -> Result<()> {
    if config.super_pass_or_empty().trim().is_empty() {
        return Err(Error::precondition("superuser password is blank"));
    }
    Ok(())
}

fn require_exists(path: &Path, step: &str, result: CommandResult) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(Error::Verification {
            step: step.to_string(),
            expected: format!("{} to exist", path.display()),
            result,
        })
    }
}
