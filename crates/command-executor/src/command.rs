//! Command type for building executable commands

use async_process::Command as AsyncCommand;
use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::PathBuf;

use crate::error::{Error, Result};

const REDACTED: &str = "*****";

/// A command to be executed
///
/// This is a builder for creating commands that can be converted to `async_process::Command`
/// when needed. Unlike `AsyncCommand`, this type is `Clone` and can be reused multiple times.
///
/// Values registered with [`Command::redact`] are masked wherever the command is displayed,
/// so a command carrying a password can be logged safely.
#[derive(Debug, Clone)]
pub struct Command {
    /// The program to execute
    program: OsString,
    /// The arguments to pass to the program
    args: Vec<OsString>,
    /// Environment variables laid over the inherited environment
    env: HashMap<OsString, OsString>,
    /// Working directory for the command
    current_dir: Option<PathBuf>,
    /// Values masked in the display form
    redacted: Vec<String>,
}

impl Command {
    /// Create a new command for the given program
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            args: Vec::new(),
            env: HashMap::new(),
            current_dir: None,
            redacted: Vec::new(),
        }
    }

    /// Build a command from a single whitespace-delimited line.
    ///
    /// Runs of whitespace separate arguments; a double-quoted section is kept
    /// together (quotes removed), so `psql -c "SELECT 1"` yields three arguments.
    pub fn parse_line(line: &str) -> Result<Self> {
        let mut parts = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut has_token = false;

        for ch in line.chars() {
            match ch {
                '"' => {
                    in_quotes = !in_quotes;
                    has_token = true;
                }
                c if c.is_whitespace() && !in_quotes => {
                    if has_token {
                        parts.push(std::mem::take(&mut current));
                        has_token = false;
                    }
                }
                c => {
                    current.push(c);
                    has_token = true;
                }
            }
        }
        if in_quotes {
            return Err(Error::invalid_command_line(format!(
                "unterminated quote in `{}`",
                line
            )));
        }
        if has_token {
            parts.push(current);
        }

        let mut parts = parts.into_iter();
        let program = parts
            .next()
            .ok_or_else(|| Error::invalid_command_line("empty command line"))?;
        let mut cmd = Command::new(program);
        cmd.args(parts);
        Ok(cmd)
    }

    /// Add an argument to the command
    pub fn arg<S: AsRef<OsStr>>(&mut self, arg: S) -> &mut Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    /// Add multiple arguments to the command
    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.arg(arg);
        }
        self
    }

    /// Set an environment variable
    pub fn env<K, V>(&mut self, key: K, val: V) -> &mut Self
    where
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        self.env
            .insert(key.as_ref().to_owned(), val.as_ref().to_owned());
        self
    }

    /// Set environment variables from `KEY=VALUE` entries.
    ///
    /// Entries without `=` are rejected.
    pub fn env_entries<I, S>(&mut self, entries: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for entry in entries {
            let entry = entry.as_ref();
            let (key, val) = entry.split_once('=').ok_or_else(|| {
                Error::invalid_command_line(format!("environment entry without '=': {}", entry))
            })?;
            self.env(key, val);
        }
        Ok(self)
    }

    /// Set the working directory for the command
    pub fn current_dir<P: AsRef<std::path::Path>>(&mut self, dir: P) -> &mut Self {
        self.current_dir = Some(dir.as_ref().to_owned());
        self
    }

    /// Mask `secret` wherever this command is displayed
    pub fn redact(&mut self, secret: impl Into<String>) -> &mut Self {
        let secret = secret.into();
        if !secret.is_empty() {
            self.redacted.push(secret);
        }
        self
    }

    /// Get the program name
    pub fn get_program(&self) -> &OsStr {
        &self.program
    }

    /// Get the arguments
    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    /// Get the environment variables
    pub fn get_envs(&self) -> &HashMap<OsString, OsString> {
        &self.env
    }

    /// Get the current directory
    pub fn get_current_dir(&self) -> Option<&std::path::Path> {
        self.current_dir.as_deref()
    }

    /// Check whether any argument equals `value`
    pub fn has_arg(&self, value: &str) -> bool {
        self.args.iter().any(|a| a == value)
    }

    /// Get the argument following `flag`, if both are present
    pub fn arg_after(&self, flag: &str) -> Option<String> {
        let pos = self.args.iter().position(|a| a == flag)?;
        self.args
            .get(pos + 1)
            .map(|a| a.to_string_lossy().into_owned())
    }

    /// Get the program file name without directories or executable suffix
    pub fn program_name(&self) -> String {
        let path = std::path::Path::new(&self.program);
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.to_string_lossy().into_owned())
    }

    /// Prepare this command for execution by converting to an `async_process::Command`
    pub fn prepare(&self) -> AsyncCommand {
        let mut cmd = AsyncCommand::new(&self.program);

        cmd.args(&self.args);
        for (key, val) in &self.env {
            cmd.env(key, val);
        }
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }

        cmd
    }

    fn mask(&self, text: &str) -> String {
        self.redacted
            .iter()
            .fold(text.to_string(), |acc, secret| acc.replace(secret.as_str(), REDACTED))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mask(&self.program.to_string_lossy()))?;
        for arg in &self.args {
            let arg = self.mask(&arg.to_string_lossy());
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Builder pattern helper
impl Command {
    /// Create a builder for this command (for chaining)
    pub fn builder<S: AsRef<OsStr>>(program: S) -> CommandBuilder {
        CommandBuilder(Command::new(program))
    }
}

/// Builder wrapper for more ergonomic command construction
pub struct CommandBuilder(Command);

impl CommandBuilder {
    /// Add an argument
    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.0.arg(arg);
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.0.args(args);
        self
    }

    /// Set an environment variable
    pub fn env<K, V>(mut self, key: K, val: V) -> Self
    where
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        self.0.env(key, val);
        self
    }

    /// Set the working directory
    pub fn current_dir<P: AsRef<std::path::Path>>(mut self, dir: P) -> Self {
        self.0.current_dir(dir);
        self
    }

    /// Mask a secret in the display form
    pub fn redact(mut self, secret: impl Into<String>) -> Self {
        self.0.redact(secret);
        self
    }

    /// Build the command
    pub fn build(self) -> Command {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_with_args() {
        let mut cmd = Command::new("ls");
        cmd.arg("-la").arg("/tmp");

        assert_eq!(cmd.get_args().len(), 2);
        assert_eq!(cmd.get_args()[0], "-la");
        assert_eq!(cmd.get_args()[1], "/tmp");
    }

    #[test]
    fn test_command_builder() {
        let cmd = Command::builder("echo")
            .arg("hello")
            .arg("world")
            .env("TEST_VAR", "test_value")
            .current_dir("/tmp")
            .build();

        assert_eq!(cmd.get_program(), "echo");
        assert_eq!(cmd.get_args().len(), 2);
        assert_eq!(
            cmd.get_envs().get(OsStr::new("TEST_VAR")),
            Some(&OsString::from("test_value"))
        );
        assert_eq!(cmd.get_current_dir(), Some(std::path::Path::new("/tmp")));
    }

    #[test]
    fn test_parse_line_collapses_whitespace_and_keeps_quotes_together() {
        let cmd = Command::parse_line("psql   -U postgres\t-c \"SELECT 1 FROM x\"  ").unwrap();

        assert_eq!(cmd.get_program(), "psql");
        assert_eq!(cmd.get_args(), &["-U", "postgres", "-c", "SELECT 1 FROM x"]);
    }

    #[test]
    fn test_parse_line_rejects_empty_and_unterminated() {
        assert!(Command::parse_line("   ").is_err());
        assert!(Command::parse_line("echo \"oops").is_err());
    }

    #[test]
    fn test_env_entries() {
        let mut cmd = Command::new("psql");
        cmd.env_entries(["PGPASSWORD=se=cret"]).unwrap();
        assert_eq!(
            cmd.get_envs().get(OsStr::new("PGPASSWORD")),
            Some(&OsString::from("se=cret"))
        );

        assert!(Command::new("psql").env_entries(["NOEQUALS"]).is_err());
    }

    #[test]
    fn test_display_masks_redacted_values() {
        let cmd = Command::builder("installer")
            .arg("--superpassword")
            .arg("S3cr3t!")
            .arg("--prefix")
            .arg("c:/pg home/db_system")
            .redact("S3cr3t!")
            .build();

        assert_eq!(
            cmd.to_string(),
            "installer --superpassword ***** --prefix \"c:/pg home/db_system\""
        );
    }

    #[test]
    fn test_arg_after_and_program_name() {
        let cmd = Command::builder("/opt/pg/bin/pg_ctl.exe")
            .args(["register", "-N", "svc", "-D", "/data"])
            .build();

        assert_eq!(cmd.program_name(), "pg_ctl");
        assert_eq!(cmd.arg_after("-N").as_deref(), Some("svc"));
        assert_eq!(cmd.arg_after("-X"), None);
        assert!(cmd.has_arg("register"));
    }
}
