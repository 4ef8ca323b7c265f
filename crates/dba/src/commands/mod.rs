pub mod database;
pub mod instance;
pub mod validate;

use anyhow::{Context, Result};
use command_executor::{CommandRunner, Executor};
use dba_config::{Config, parser};
use dba_orchestration::Orchestrator;
use host_control::{NetshFirewall, WindowsServices};
use std::path::Path;
use std::sync::Arc;

/// Load the configuration file and build an orchestrator from its settings
pub fn load(config_path: &Path) -> Result<(Config, Orchestrator)> {
    let config = parser::parse_file(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    let mut executor = Executor::local("dba");
    if let Some(timeout) = config.settings.command_timeout() {
        executor = executor.with_timeout(timeout);
    }
    let runner: Arc<dyn CommandRunner> = Arc::new(executor);

    let orchestrator = Orchestrator::new(runner.clone())
        .with_services(WindowsServices::with_messages(
            runner.clone(),
            config.settings.service_messages.clone(),
        ))
        .with_firewall(NetshFirewall::with_messages(
            runner,
            config.settings.firewall_messages.clone(),
        ));

    Ok((config, orchestrator))
}
