//! Simulated Windows host with a PostgreSQL toolchain
//!
//! `FakeHost` answers the command lines the orchestrator issues the way the
//! real tools would, keeping services, firewall rules, roles and databases in
//! memory and the instance directories on a real temp directory.

#![allow(dead_code)]

use async_trait::async_trait;
use command_executor::{Command, CommandResult, CommandRunner};
use dba_config::{InstallPlan, InstanceConfig};
use dba_orchestration::Orchestrator;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tempfile::TempDir;

pub const SERVICE: &str = "BrinvexDBA_Postgresql";
pub const RULE: &str = "BrinvexDBA_PG - open 5433";
pub const SUPER_PASS: &str = "S3cr3t!123";
pub const APP_PASS: &str = "it's-Secret";

#[derive(Debug, Clone, Default)]
pub struct Database {
    pub owner: String,
    pub rows: u32,
    pub extensions: BTreeSet<String>,
}

#[derive(Debug, Default)]
pub struct HostState {
    /// Service name to running flag
    pub services: BTreeMap<String, bool>,
    pub firewall: BTreeSet<String>,
    /// Role name to password
    pub roles: BTreeMap<String, String>,
    pub databases: BTreeMap<String, Database>,
    pub settings: Vec<String>,
    pub commands: Vec<String>,
    /// Password files seen by initdb
    pub pwfiles: Vec<PathBuf>,
    /// `(user, database, sql)` of every extension statement
    pub extension_logins: Vec<(String, String, String)>,
    pub fail_drop: bool,
    /// Program that hangs until its deadline
    pub hang: Option<String>,
}

pub struct FakeHost {
    root: TempDir,
    state: Mutex<HostState>,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            root: tempfile::tempdir().unwrap(),
            state: Mutex::new(HostState::default()),
        })
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn home(&self) -> PathBuf {
        self.root.path().join("pg")
    }

    /// An installer file that exists on disk
    pub fn installer(&self) -> PathBuf {
        let path = self.root.path().join("postgresql-16.4-1-windows-x64.exe");
        if !path.exists() {
            std::fs::write(&path, b"MZ").unwrap();
        }
        path
    }

    pub fn config(&self) -> InstanceConfig {
        InstanceConfig::builder()
            .home_path(self.home())
            .port(5433)
            .super_pass(SUPER_PASS)
            .build()
            .unwrap()
    }

    pub fn plan(&self) -> InstallPlan {
        InstallPlan::new(self.config())
            .installer_path(self.installer())
            .allow_client_addresses(["10.0.0.0/8"])
            .system_settings(["max_connections=200"])
            .extensions(["pgcrypto"])
            .app_users([("app", APP_PASS)])
            .app_databases([("appdb", "app")])
    }

    pub fn orchestrator(self: &Arc<Self>) -> Orchestrator {
        Orchestrator::new(self.clone())
    }

    pub fn state(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap()
    }

    pub fn commands(&self) -> Vec<String> {
        self.state().commands.clone()
    }

    pub fn clear_commands(&self) {
        self.state().commands.clear();
    }

    /// A running server with a superuser, as after a completed install
    pub fn seed_running_server(&self) {
        let mut state = self.state();
        state.services.insert(SERVICE.to_string(), true);
        state.roles.insert("postgres".to_string(), SUPER_PASS.to_string());
        state.roles.insert("app".to_string(), APP_PASS.to_string());
    }

    pub fn seed_database(&self, name: &str, owner: &str, rows: u32) {
        self.state().databases.insert(
            name.to_string(),
            Database {
                owner: owner.to_string(),
                rows,
                extensions: BTreeSet::new(),
            },
        );
    }

    pub fn database(&self, name: &str) -> Option<Database> {
        self.state().databases.get(name).cloned()
    }

    fn handle(&self, state: &mut HostState, cmd: &Command) -> CommandResult {
        match cmd.program_name().as_str() {
            "sc" => sc(state, cmd),
            "net" => net(state, cmd),
            "netsh" => netsh(state, cmd),
            "pg_ctl" => pg_ctl(state, cmd),
            "initdb" => initdb(state, cmd),
            "psql" => psql(state, cmd),
            "pg_dump" => pg_dump(state, cmd),
            "pg_restore" => pg_restore(state, cmd),
            _ if cmd.has_arg("--extract-only") => installer(cmd),
            other => CommandResult::new(
                "",
                format!("'{}' is not recognized as an internal or external command", other),
            ),
        }
    }
}

#[async_trait]
impl CommandRunner for FakeHost {
    async fn run(&self, command: Command) -> command_executor::Result<CommandResult> {
        let mut state = self.state();
        state.commands.push(command.to_string());
        if state.hang.as_deref() == Some(command.program_name().as_str()) {
            return Err(command_executor::Error::TimedOut {
                command: command.to_string(),
                timeout: Duration::from_secs(1),
            });
        }
        Ok(self.handle(&mut state, &command))
    }
}

fn args(cmd: &Command) -> Vec<String> {
    cmd.get_args()
        .iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect()
}

fn sc(state: &HostState, cmd: &Command) -> CommandResult {
    let name = &args(cmd)[1];
    match state.services.get(name) {
        Some(running) => CommandResult::new(
            format!(
                "SERVICE_NAME: {}        TYPE               : 10  WIN32_OWN_PROCESS          STATE              : {}",
                name,
                if *running { "4  RUNNING" } else { "1  STOPPED" }
            ),
            "",
        ),
        None => CommandResult::new(
            "[SC] EnumQueryServicesStatus:OpenService FAILED 1060:The specified service does not exist as an installed service.",
            "",
        ),
    }
}

fn net(state: &mut HostState, cmd: &Command) -> CommandResult {
    let args = args(cmd);
    let (verb, name) = (args[0].as_str(), args[1].clone());
    let Some(running) = state.services.get_mut(&name) else {
        return CommandResult::new("", "The service name is invalid.");
    };
    match (verb, *running) {
        ("start", false) => {
            *running = true;
            CommandResult::new(
                format!(
                    "The {0} service is starting.The {0} service was started successfully.",
                    name
                ),
                "",
            )
        }
        ("start", true) => CommandResult::new("", "The requested service has already been started."),
        ("stop", true) => {
            *running = false;
            CommandResult::new(
                format!(
                    "The {0} service is stopping.The {0} service was stopped successfully.",
                    name
                ),
                "",
            )
        }
        _ => CommandResult::new("", format!("The {} service is not started.", name)),
    }
}

fn netsh(state: &mut HostState, cmd: &Command) -> CommandResult {
    let args = args(cmd);
    let rule = args
        .iter()
        .find_map(|a| a.strip_prefix("name="))
        .unwrap_or_default()
        .to_string();
    let no_match = CommandResult::new("No rules match the specified criteria.", "");
    match args[2].as_str() {
        "show" if state.firewall.contains(&rule) => CommandResult::new(
            format!("Rule Name:                            {}----------------------------------------------------------------------Enabled:                              Yes", rule),
            "",
        ),
        "add" => {
            state.firewall.insert(rule);
            CommandResult::new("Ok.", "")
        }
        "delete" if state.firewall.remove(&rule) => CommandResult::new("Deleted 1 rule(s).Ok.", ""),
        _ => no_match,
    }
}

fn pg_ctl(state: &mut HostState, cmd: &Command) -> CommandResult {
    let verb = args(cmd)[0].clone();
    let name = cmd.arg_after("-N").unwrap_or_default();
    match verb.as_str() {
        "register" if !state.services.contains_key(&name) => {
            state.services.insert(name, false);
            CommandResult::default()
        }
        "unregister" if state.services.remove(&name).is_some() => CommandResult::default(),
        _ => CommandResult::new("", format!("pg_ctl: could not {} service \"{}\"", verb, name)),
    }
}

fn installer(cmd: &Command) -> CommandResult {
    let prefix = PathBuf::from(cmd.arg_after("--prefix").unwrap_or_default());
    std::fs::create_dir_all(prefix.join("bin")).unwrap();
    CommandResult::default()
}

fn initdb(state: &mut HostState, cmd: &Command) -> CommandResult {
    let data = PathBuf::from(cmd.arg_after("-D").unwrap_or_default());
    let user = cmd.arg_after("-U").unwrap_or_default();
    let pwfile = PathBuf::from(cmd.arg_after("--pwfile").unwrap_or_default());
    let Ok(password) = std::fs::read_to_string(&pwfile) else {
        return CommandResult::new("", "initdb: error: could not open file for reading");
    };
    state.pwfiles.push(pwfile);
    state.roles.insert(user, password);

    std::fs::create_dir_all(&data).unwrap();
    std::fs::write(data.join("postgresql.conf"), postgresql_conf()).unwrap();
    std::fs::write(data.join("pg_hba.conf"), pg_hba_conf()).unwrap();
    CommandResult::new(
        "The files belonging to this database system will be owned by user \"postgres\".Success. You can now start the database server.",
        "",
    )
}

fn psql(state: &mut HostState, cmd: &Command) -> CommandResult {
    if !state.services.values().any(|running| *running) {
        return CommandResult::new(
            "",
            "psql: error: connection to server at \"localhost\" (::1), port 5433 failed: Connection refused",
        );
    }
    let user = cmd.arg_after("-U").unwrap_or_default();
    let database = cmd.arg_after("-d").unwrap_or_default();
    let password = env(cmd, "PGPASSWORD");
    if state.roles.get(&user) != Some(&password) {
        return CommandResult::new(
            "",
            format!("psql: error: FATAL:  password authentication failed for user \"{}\"", user),
        );
    }
    let sql = cmd.arg_after("-c").unwrap_or_default();
    let words: Vec<&str> = sql.split_whitespace().collect();
    let word = |i: usize| words.get(i).map(|w| w.trim_end_matches(';').to_string()).unwrap_or_default();
    // Unquoted names fold to lower case, quoted ones are kept as written
    let name = |i: usize| {
        let w = word(i);
        match w.strip_prefix('"').and_then(|w| w.strip_suffix('"')) {
            Some(quoted) => quoted.replace("\"\"", "\""),
            None => w.to_lowercase(),
        }
    };

    if sql.starts_with("SELECT rolname FROM pg_roles") {
        let roles: Vec<&str> = state.roles.keys().map(String::as_str).collect();
        CommandResult::new(roles.join(","), "")
    } else if sql.starts_with("SELECT 1 FROM pg_database") {
        let db_name = quoted(&sql);
        let out = if state.databases.contains_key(&db_name) { "1" } else { "" };
        CommandResult::new(out, "")
    } else if sql.starts_with("ALTER SYSTEM SET ") {
        state.settings.push(sql["ALTER SYSTEM SET ".len()..].trim_end_matches(';').to_string());
        CommandResult::new("ALTER SYSTEM", "")
    } else if sql.starts_with("CREATE ROLE ") {
        let role = name(2);
        if state.roles.contains_key(&role) {
            return CommandResult::new("", format!("ERROR:  role \"{}\" already exists", role));
        }
        state.roles.insert(role, quoted(&sql));
        CommandResult::new("CREATE ROLE", "")
    } else if sql.starts_with("CREATE DATABASE ") {
        let db_name = name(2);
        if state.databases.contains_key(&db_name) {
            return CommandResult::new("", format!("ERROR:  database \"{}\" already exists", db_name));
        }
        state.databases.insert(
            db_name,
            Database {
                owner: name(4),
                ..Database::default()
            },
        );
        CommandResult::new("CREATE DATABASE", "")
    } else if sql.starts_with("CREATE EXTENSION IF NOT EXISTS ") {
        let extension = name(5);
        state
            .extension_logins
            .push((user.clone(), database.clone(), sql.clone()));
        let Some(db) = state.databases.get_mut(&database) else {
            return CommandResult::new("", format!("psql: error: FATAL:  database \"{}\" does not exist", database));
        };
        if db.owner != user {
            return CommandResult::new(
                "",
                format!("ERROR:  permission denied to create extension \"{}\"", extension),
            );
        }
        if db.extensions.insert(extension.clone()) {
            CommandResult::new("CREATE EXTENSION", "")
        } else {
            CommandResult::new(
                "CREATE EXTENSION",
                format!("NOTICE:  extension \"{}\" already exists, skipping", extension),
            )
        }
    } else if sql.starts_with("DROP DATABASE ") {
        let db_name = name(2);
        if state.fail_drop {
            return CommandResult::new(
                "",
                format!("ERROR:  database \"{}\" is being accessed by other users", db_name),
            );
        }
        match state.databases.remove(&db_name) {
            Some(_) => CommandResult::new("DROP DATABASE", ""),
            None => CommandResult::new("", format!("ERROR:  database \"{}\" does not exist", db_name)),
        }
    } else {
        CommandResult::new("", format!("ERROR:  syntax error at or near \"{}\"", word(0)))
    }
}

fn pg_dump(state: &mut HostState, cmd: &Command) -> CommandResult {
    let uri = cmd.arg_after("-d").unwrap_or_default();
    let name = uri.rsplit('/').next().unwrap_or_default().to_string();
    let dest = PathBuf::from(cmd.arg_after("--file").unwrap_or_default());
    let Some(db) = state.databases.get(&name) else {
        return CommandResult::new(
            "",
            format!("pg_dump: error: connection to server failed: FATAL:  database \"{}\" does not exist", name),
        );
    };
    let archive = format!("fake-archive {} {}", name, db.rows);
    if cmd.has_arg("-Fd") {
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("toc.dat"), archive).unwrap();
    } else {
        std::fs::write(&dest, archive).unwrap();
    }
    CommandResult::default()
}

fn pg_restore(state: &mut HostState, cmd: &Command) -> CommandResult {
    let target = cmd.arg_after("-d").unwrap_or_default();
    let archive = args(cmd).last().cloned().unwrap_or_default();
    let Ok(content) = std::fs::read_to_string(&archive) else {
        return CommandResult::new("", format!("pg_restore: error: could not open input file \"{}\"", archive));
    };
    let rows = content
        .rsplit(' ')
        .next()
        .and_then(|r| r.parse().ok())
        .unwrap_or(0);
    match state.databases.get_mut(&target) {
        Some(db) => {
            db.rows = rows;
            CommandResult::default()
        }
        None => CommandResult::new("", format!("pg_restore: error: database \"{}\" does not exist", target)),
    }
}

fn env(cmd: &Command, key: &str) -> String {
    cmd.get_envs()
        .get(std::ffi::OsStr::new(key))
        .map(|v| v.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Text between the first and last single quote, with doubled quotes folded
fn quoted(sql: &str) -> String {
    match (sql.find('\''), sql.rfind('\'')) {
        (Some(start), Some(end)) if end > start => sql[start + 1..end].replace("''", "'"),
        _ => String::new(),
    }
}

fn postgresql_conf() -> String {
    [
        "# -----------------------------",
        "# PostgreSQL configuration file",
        "# -----------------------------",
        "",
        "#------------------------------------------------------------------------------",
        "# CONNECTIONS AND AUTHENTICATION",
        "#------------------------------------------------------------------------------",
        "",
        "# - Connection Settings -",
        "",
        "#listen_addresses = 'localhost'\t\t# what IP address(es) to listen on;",
        "#port = 5432\t\t\t\t# (change requires restart)",
        "max_connections = 100\t\t\t# (change requires restart)",
        "",
    ]
    .join("\r\n")
}

/// A 50-line client access file
pub fn pg_hba_conf() -> String {
    let mut lines: Vec<String> = (0..42)
        .map(|i| format!("# PostgreSQL Client Authentication Configuration File, line {}", i))
        .collect();
    lines.extend(
        [
            "# TYPE  DATABASE        USER            ADDRESS                 METHOD",
            "local   all             all                                     scram-sha-256",
            "# IPv4 local connections:",
            "host    all             all             127.0.0.1/32            scram-sha-256",
            "# IPv6 local connections:",
            "host    all             all             ::1/128                 scram-sha-256",
            "# Allow replication connections from localhost.",
            "host    replication     all             127.0.0.1/32            scram-sha-256",
        ]
        .map(String::from),
    );
    let mut content = lines.join("\n");
    content.push('\n');
    content
}
