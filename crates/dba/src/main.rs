//! `dba` - provision and maintain a database instance from a YAML file

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

mod commands;

#[derive(Parser)]
#[command(name = "dba")]
#[command(about = "Database instance provisioning tool")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, default_value = "dba.yaml")]
    config: PathBuf,

    /// More output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration file
    Validate,

    /// Install and configure the instance
    Install,

    /// Remove the instance, keeping its data directory as a backup
    Uninstall,

    /// Move the data directory into the backup directory
    BackupData,

    /// Dump a database as a custom archive
    Backup {
        /// Database to dump
        database: String,
        /// Archive file to write
        dest: PathBuf,
    },

    /// Dump a database in the configured backup format
    Export {
        /// Database to dump
        database: String,
        /// File or directory to write
        dest: PathBuf,
    },

    /// Restore an archive into a new database
    Restore {
        /// Archive to restore
        archive: PathBuf,
        /// Database to create; must not exist
        database: String,
        /// Role owning the restored objects
        owner: String,
    },

    /// Back a database up, then drop it
    BackupAndDrop {
        /// Database to back up and drop
        database: String,
    },

    /// Drop a database without a backup
    Drop {
        /// Database to drop
        database: String,

        /// Confirm dropping without a backup
        #[arg(long)]
        yes: bool,
    },

    /// Restart the instance service
    Restart,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .init();

    smol::block_on(async {
        match cli.command {
            Commands::Validate => commands::validate::run(&cli.config),
            Commands::Install => commands::instance::install(&cli.config).await,
            Commands::Uninstall => commands::instance::uninstall(&cli.config).await,
            Commands::BackupData => commands::instance::backup_data(&cli.config).await,
            Commands::Backup { database, dest } => {
                commands::database::backup(&cli.config, &database, &dest).await
            }
            Commands::Export { database, dest } => {
                commands::database::export(&cli.config, &database, &dest).await
            }
            Commands::Restore {
                archive,
                database,
                owner,
            } => commands::database::restore(&cli.config, &archive, &database, &owner).await,
            Commands::BackupAndDrop { database } => {
                commands::database::backup_and_drop(&cli.config, &database).await
            }
            Commands::Drop { database, yes } => {
                commands::database::drop(&cli.config, &database, yes).await
            }
            Commands::Restart => commands::instance::restart(&cli.config).await,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_restore_takes_archive_database_and_owner() {
        let cli = Cli::try_parse_from(["dba", "-c", "x.yaml", "restore", "a.backup", "appdb", "app"])
            .unwrap();
        assert_eq!(cli.config, PathBuf::from("x.yaml"));
        match cli.command {
            Commands::Restore {
                archive,
                database,
                owner,
            } => {
                assert_eq!(archive, PathBuf::from("a.backup"));
                assert_eq!(database, "appdb");
                assert_eq!(owner, "app");
            }
            _ => panic!("expected restore"),
        }
    }

    #[test]
    fn test_drop_without_yes_is_refused_before_loading_config() {
        let result = smol::block_on(commands::database::drop(
            std::path::Path::new("does-not-exist.yaml"),
            "appdb",
            false,
        ));
        let message = result.unwrap_err().to_string();
        assert!(message.contains("--yes"));
    }
}
