//! Engine-specific command templates
//!
//! The orchestrator only knows the shape of the workflow. Everything that
//! names a tool, spells a SQL statement or recognises a success marker comes
//! from an [`Engine`].

use command_executor::{Command, Expectation, OutputVerifier};
use dba_config::{BackupFormat, InstanceConfig};
use std::fmt;
use std::path::Path;

/// Credentials a SQL command runs under
#[derive(Clone, Copy)]
pub struct Login<'a> {
    /// Role name
    pub user: &'a str,
    /// Role password
    pub password: &'a str,
}

impl<'a> Login<'a> {
    /// The instance superuser
    pub fn superuser(config: &'a InstanceConfig) -> Self {
        Self {
            user: config.super_user(),
            password: config.super_pass_or_empty(),
        }
    }
}

/// A state-changing SQL statement
#[derive(Clone, Copy)]
pub enum Statement<'a> {
    /// Persist a server setting given as `name=value`
    AlterSystem {
        /// Raw assignment
        setting: &'a str,
    },
    /// Create a login role
    CreateRole {
        /// Role name
        user: &'a str,
        /// Role password
        password: &'a str,
    },
    /// Create a database
    CreateDatabase {
        /// Database name
        database: &'a str,
        /// Owning role
        owner: &'a str,
    },
    /// Create an extension unless present
    CreateExtension {
        /// Extension name
        extension: &'a str,
    },
    /// Drop a database, disconnecting its sessions
    DropDatabase {
        /// Database name
        database: &'a str,
    },
}

/// Statement description without secrets, for logs and errors
impl fmt::Display for Statement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::AlterSystem { setting } => write!(f, "ALTER SYSTEM SET {}", setting),
            Statement::CreateRole { user, .. } => write!(f, "CREATE ROLE {}", user),
            Statement::CreateDatabase { database, owner } => {
                write!(f, "CREATE DATABASE {} OWNER {}", database, owner)
            }
            Statement::CreateExtension { extension } => write!(f, "CREATE EXTENSION {}", extension),
            Statement::DropDatabase { database } => write!(f, "DROP DATABASE {}", database),
        }
    }
}

/// A configuration file patched under an anchor line
#[derive(Debug, Clone, Copy)]
pub struct AnchoredFile {
    /// File name inside the data directory
    pub file_name: &'static str,
    /// Line new directives go beneath
    pub anchor: &'static str,
}

/// Command templates for one database engine
pub trait Engine: Send + Sync {
    /// Engine name for logs
    fn name(&self) -> &str;

    /// Unattended, extract-only installer run into the system directory
    fn install(&self, installer: &Path, config: &InstanceConfig) -> Command;

    /// Cluster initialisation reading the superuser password from `pwfile`
    fn init_cluster(&self, config: &InstanceConfig, locale: &str, pwfile: &Path) -> Command;

    /// Register the cluster with the OS service manager
    fn register_service(&self, config: &InstanceConfig, service: &str) -> Command;

    /// Remove the cluster from the OS service manager
    fn unregister_service(&self, config: &InstanceConfig, service: &str) -> Command;

    /// Database superuser commands connect to
    fn maintenance_database(&self) -> &str;

    /// Run one SQL statement
    fn sql(&self, config: &InstanceConfig, login: Login<'_>, database: &str, sql: &str) -> Command;

    /// Run one state-changing statement, with any secret it carries masked
    fn statement(
        &self,
        config: &InstanceConfig,
        login: Login<'_>,
        database: &str,
        statement: &Statement<'_>,
    ) -> Command;

    /// Success signature of a statement
    fn verifier(&self, statement: &Statement<'_>) -> OutputVerifier;

    /// Probe listing every role name
    fn list_roles(&self, config: &InstanceConfig, login: Login<'_>) -> Command;

    /// Role names from the output of [`Engine::list_roles`]
    fn parse_roles(&self, out: &str) -> Vec<String>;

    /// Probe for a database
    fn database_probe(&self, config: &InstanceConfig, login: Login<'_>, database: &str) -> Command;

    /// Whether the output of [`Engine::database_probe`] reports the database
    fn database_present(&self, out: &str) -> bool;

    /// Logical dump of one database
    fn dump(
        &self,
        config: &InstanceConfig,
        database: &str,
        dest: &Path,
        format: BackupFormat,
        jobs: u32,
    ) -> Command;

    /// Restore an archive into an existing database
    fn restore(&self, config: &InstanceConfig, archive: &Path, database: &str, owner: &str) -> Command;

    /// File holding port and listen address
    fn connection_settings(&self) -> AnchoredFile;

    /// Directives for the connection settings file
    fn connection_lines(&self, port: u16, listen_addresses: &str) -> Vec<String>;

    /// File holding client access rules
    fn client_access(&self) -> AnchoredFile;

    /// Directive allowing `network` to connect
    fn client_access_line(&self, network: &str) -> String;
}

/// PostgreSQL command-line tools
#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl Postgres {
    fn psql(config: &InstanceConfig, login: Login<'_>, database: &str) -> Command {
        let mut cmd = Command::new(config.tool("psql"));
        cmd.arg("-U")
            .arg(login.user)
            .arg("-h")
            .arg(config.host())
            .arg("-p")
            .arg(config.port().to_string())
            .arg("-d")
            .arg(database);
        with_password(&mut cmd, login.password);
        cmd
    }

    fn probe(&self, config: &InstanceConfig, login: Login<'_>, sql: String) -> Command {
        let mut cmd = Self::psql(config, login, self.maintenance_database());
        cmd.args(["-X", "-t", "-A"]);
        cmd.arg("-c").arg(sql);
        cmd
    }

    fn render(statement: &Statement<'_>) -> String {
        match statement {
            Statement::AlterSystem { setting } => format!("ALTER SYSTEM SET {};", setting),
            Statement::CreateRole { user, password } => {
                format!("CREATE ROLE {} LOGIN PASSWORD {};", ident(user), literal(password))
            }
            Statement::CreateDatabase { database, owner } => {
                format!("CREATE DATABASE {} OWNER {};", ident(database), ident(owner))
            }
            Statement::CreateExtension { extension } => {
                format!("CREATE EXTENSION IF NOT EXISTS {};", ident(extension))
            }
            Statement::DropDatabase { database } => {
                format!("DROP DATABASE {} WITH (FORCE);", ident(database))
            }
        }
    }
}

fn with_password(cmd: &mut Command, password: &str) {
    cmd.env("PGPASSWORD", password);
    if !password.is_empty() {
        cmd.redact(password);
    }
}

/// Quote a SQL string literal
fn literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Quote a SQL identifier, keeping its case
fn ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl Engine for Postgres {
    fn name(&self) -> &str {
        "postgresql"
    }

    fn install(&self, installer: &Path, config: &InstanceConfig) -> Command {
        let pass = config.super_pass_or_empty();
        let mut cmd = Command::new(installer);
        cmd.args(["--mode", "unattended"])
            .args(["--enable-components", "server,commandlinetools"])
            .args(["--disable-components", "pgAdmin,stackbuilder"])
            .args(["--create_shortcuts", "0"])
            .arg("--prefix")
            .arg(config.system_path())
            .arg("--superaccount")
            .arg(config.super_user())
            .arg("--superpassword")
            .arg(pass)
            .args(["--extract-only", "1"]);
        if !pass.is_empty() {
            cmd.redact(pass);
        }
        cmd
    }

    fn init_cluster(&self, config: &InstanceConfig, locale: &str, pwfile: &Path) -> Command {
        let mut cmd = Command::new(config.tool("initdb"));
        cmd.arg("-D")
            .arg(config.data_path())
            .arg("-U")
            .arg(config.super_user())
            .arg("--pwfile")
            .arg(pwfile)
            .arg("--auth=scram-sha-256")
            .arg(format!("--locale={}", locale));
        cmd
    }

    fn register_service(&self, config: &InstanceConfig, service: &str) -> Command {
        Command::builder(config.tool("pg_ctl"))
            .args(["register", "-N", service, "-D"])
            .arg(config.data_path())
            .build()
    }

    fn unregister_service(&self, config: &InstanceConfig, service: &str) -> Command {
        Command::builder(config.tool("pg_ctl"))
            .args(["unregister", "-N", service, "-D"])
            .arg(config.data_path())
            .build()
    }

    fn maintenance_database(&self) -> &str {
        "postgres"
    }

    fn sql(&self, config: &InstanceConfig, login: Login<'_>, database: &str, sql: &str) -> Command {
        let mut cmd = Self::psql(config, login, database);
        cmd.arg("-c").arg(sql);
        cmd
    }

    fn statement(
        &self,
        config: &InstanceConfig,
        login: Login<'_>,
        database: &str,
        statement: &Statement<'_>,
    ) -> Command {
        let mut cmd = self.sql(config, login, database, &Self::render(statement));
        if let Statement::CreateRole { password, .. } = statement {
            if !password.is_empty() {
                cmd.redact(literal(password)).redact(*password);
            }
        }
        cmd
    }

    fn verifier(&self, statement: &Statement<'_>) -> OutputVerifier {
        match statement {
            Statement::AlterSystem { .. } => OutputVerifier::marker("ALTER SYSTEM"),
            Statement::CreateRole { .. } => OutputVerifier::marker("CREATE ROLE"),
            Statement::CreateDatabase { .. } => OutputVerifier::marker("CREATE DATABASE"),
            // psql prints the notice on stderr and the tag on stdout
            Statement::CreateExtension { extension } => {
                OutputVerifier::stdout(Expectation::Equals("CREATE EXTENSION".into()))
                    .with_stderr(Expectation::AnyOf(vec![
                        Expectation::Blank,
                        Expectation::Equals(format!(
                            "NOTICE:  extension \"{}\" already exists, skipping",
                            extension
                        )),
                    ]))
            }
            Statement::DropDatabase { .. } => OutputVerifier::marker("DROP DATABASE"),
        }
    }

    fn list_roles(&self, config: &InstanceConfig, login: Login<'_>) -> Command {
        let mut cmd = self.probe(config, login, "SELECT rolname FROM pg_roles".into());
        cmd.args(["-R", ","]);
        cmd
    }

    fn parse_roles(&self, out: &str) -> Vec<String> {
        out.split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(String::from)
            .collect()
    }

    fn database_probe(&self, config: &InstanceConfig, login: Login<'_>, database: &str) -> Command {
        self.probe(
            config,
            login,
            format!("SELECT 1 FROM pg_database WHERE datname={}", literal(database)),
        )
    }

    fn database_present(&self, out: &str) -> bool {
        out.trim() == "1"
    }

    fn dump(
        &self,
        config: &InstanceConfig,
        database: &str,
        dest: &Path,
        format: BackupFormat,
        jobs: u32,
    ) -> Command {
        let mut cmd = Command::new(config.tool("pg_dump"));
        cmd.arg(format!("-F{}", format.flag()))
            .arg("-d")
            .arg(format!(
                "postgresql://{}@{}:{}/{}",
                config.super_user(),
                config.host(),
                config.port(),
                database
            ))
            .args(["--encoding", "UTF-8"])
            .arg("--file")
            .arg(dest);
        if format == BackupFormat::Directory && jobs > 1 {
            cmd.arg(format!("--jobs={}", jobs));
        }
        with_password(&mut cmd, config.super_pass_or_empty());
        cmd
    }

    fn restore(&self, config: &InstanceConfig, archive: &Path, database: &str, owner: &str) -> Command {
        let mut cmd = Command::new(config.tool("pg_restore"));
        cmd.arg("-U")
            .arg(config.super_user())
            .arg("-h")
            .arg(config.host())
            .arg("-p")
            .arg(config.port().to_string())
            .arg("-d")
            .arg(database)
            .arg("--no-owner")
            .arg(format!("--role={}", owner));
        let jobs = config.backup_restore_parallelism();
        if jobs > 1 {
            cmd.arg(format!("--jobs={}", jobs));
        }
        cmd.arg(archive);
        with_password(&mut cmd, config.super_pass_or_empty());
        cmd
    }

    fn connection_settings(&self) -> AnchoredFile {
        AnchoredFile {
            file_name: "postgresql.conf",
            anchor: "# - Connection Settings -",
        }
    }

    fn connection_lines(&self, port: u16, listen_addresses: &str) -> Vec<String> {
        vec![
            format!("port = {}", port),
            format!("listen_addresses = {}", literal(listen_addresses)),
        ]
    }

    fn client_access(&self) -> AnchoredFile {
        AnchoredFile {
            file_name: "pg_hba.conf",
            anchor: "# IPv4 local connections:",
        }
    }

    fn client_access_line(&self, network: &str) -> String {
        format!("host    all    all    {}    scram-sha-256", network)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use command_executor::CommandResult;

    fn config() -> InstanceConfig {
        InstanceConfig::builder()
            .home_path("/srv/pg")
            .super_pass("S3cr3t!")
            .backup_restore_parallelism(4)
            .build()
            .unwrap()
    }

    #[test]
    fn test_role_password_is_quoted_and_masked() {
        let conf = config();
        let statement = Statement::CreateRole {
            user: "app",
            password: "it's",
        };
        let cmd = Postgres.statement(&conf, Login::superuser(&conf), "postgres", &statement);

        assert_eq!(
            cmd.arg_after("-c").as_deref(),
            Some("CREATE ROLE \"app\" LOGIN PASSWORD 'it''s';")
        );
        assert!(!cmd.to_string().contains("it''s"));
        assert!(!cmd.to_string().contains("it's"));
        assert_eq!(statement.to_string(), "CREATE ROLE app");
    }

    #[test]
    fn test_identifiers_keep_their_case() {
        let conf = config();
        let create = Postgres.statement(
            &conf,
            Login::superuser(&conf),
            "postgres",
            &Statement::CreateDatabase {
                database: "AppDb",
                owner: "AppUser",
            },
        );
        assert_eq!(
            create.arg_after("-c").as_deref(),
            Some("CREATE DATABASE \"AppDb\" OWNER \"AppUser\";")
        );

        let probe = Postgres.database_probe(&conf, Login::superuser(&conf), "AppDb");
        assert_eq!(probe.arg_after("-d").as_deref(), Some(Postgres.maintenance_database()));
        assert_eq!(
            probe.arg_after("-c").as_deref(),
            Some("SELECT 1 FROM pg_database WHERE datname='AppDb'")
        );
    }

    #[test]
    fn test_passwords_are_masked_in_command_lines() {
        let conf = config();
        let cmd = Postgres.sql(&conf, Login::superuser(&conf), "postgres", "SELECT 1");
        assert!(!cmd.to_string().contains("S3cr3t!"));
        assert_eq!(
            cmd.get_envs().get(std::ffi::OsStr::new("PGPASSWORD")).map(|v| v.to_string_lossy().into_owned()),
            Some("S3cr3t!".to_string())
        );

        let install = Postgres.install(Path::new("/tmp/setup.exe"), &conf);
        assert!(install.has_arg("S3cr3t!"));
        assert!(!install.to_string().contains("S3cr3t!"));
    }

    #[test]
    fn test_role_probe_parsing() {
        let roles = Postgres.parse_roles("postgres,pg_monitor,app_user");
        assert!(roles.iter().any(|r| r == "app_user"));
        assert!(!roles.iter().any(|r| r == "app"));
        assert!(Postgres.parse_roles("").is_empty());
    }

    #[test]
    fn test_extension_verifier_accepts_notice() {
        let verifier = Postgres.verifier(&Statement::CreateExtension { extension: "pgcrypto" });
        assert!(verifier.accepts(&CommandResult::new("CREATE EXTENSION", "")));
        assert!(verifier.accepts(&CommandResult::new(
            "CREATE EXTENSION",
            "NOTICE:  extension \"pgcrypto\" already exists, skipping"
        )));
        assert!(!verifier.accepts(&CommandResult::new(
            "",
            "ERROR:  permission denied to create extension \"pgcrypto\""
        )));
    }

    #[test]
    fn test_restore_adds_jobs_before_archive() {
        let conf = config();
        let cmd = Postgres.restore(&conf, Path::new("/b/sales.backup"), "sales_copy", "app");
        let args: Vec<String> = cmd
            .get_args()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            &args[6..],
            ["-d", "sales_copy", "--no-owner", "--role=app", "--jobs=4", "/b/sales.backup"]
        );
    }

    #[test]
    fn test_dump_format_flags() {
        let conf = config();
        let dir = Postgres.dump(&conf, "sales", Path::new("/b/d"), BackupFormat::Directory, 4);
        assert!(dir.has_arg("-Fd"));
        assert!(dir.has_arg("--jobs=4"));

        let archive = Postgres.dump(&conf, "sales", Path::new("/b/f"), BackupFormat::CustomArchive, 4);
        assert!(archive.has_arg("-Fc"));
        assert!(!archive.has_arg("--jobs=4"));
        assert_eq!(
            archive.arg_after("-d").as_deref(),
            Some("postgresql://postgres@localhost:5432/sales")
        );
    }
}
