use super::load;
use anyhow::{Context, Result};
use std::path::Path;

pub async fn install(config_path: &Path) -> Result<()> {
    let (config, orchestrator) = load(config_path)?;
    orchestrator
        .install(&config.plan)
        .await
        .context("Install failed")?;
    println!("✓ Instance {} installed", config.plan.service());
    Ok(())
}

pub async fn uninstall(config_path: &Path) -> Result<()> {
    let (config, orchestrator) = load(config_path)?;
    orchestrator
        .uninstall(&config.plan)
        .await
        .context("Uninstall failed")?;
    println!("✓ Instance {} uninstalled", config.plan.service());
    Ok(())
}

pub async fn backup_data(config_path: &Path) -> Result<()> {
    let (config, orchestrator) = load(config_path)?;
    match orchestrator
        .backup_data(config.instance())
        .await
        .context("Data backup failed")?
    {
        Some(dest) => println!("✓ Data directory moved to {}", dest.display()),
        None => println!("No data directory to back up"),
    }
    Ok(())
}

pub async fn restart(config_path: &Path) -> Result<()> {
    let (config, orchestrator) = load(config_path)?;
    orchestrator
        .restart_service(&config.plan)
        .await
        .context("Restart failed")?;
    println!("✓ Service {} restarted", config.plan.service());
    Ok(())
}
