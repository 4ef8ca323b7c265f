use super::load;
use anyhow::{Context, Result, bail};
use std::path::Path;

pub async fn backup(config_path: &Path, database: &str, dest: &Path) -> Result<()> {
    let (config, orchestrator) = load(config_path)?;
    orchestrator
        .backup_database(config.instance(), database, dest)
        .await
        .with_context(|| format!("Backup of {} failed", database))?;
    println!("✓ {} backed up to {}", database, dest.display());
    Ok(())
}

pub async fn export(config_path: &Path, database: &str, dest: &Path) -> Result<()> {
    let (config, orchestrator) = load(config_path)?;
    orchestrator
        .export_database(config.instance(), database, dest)
        .await
        .with_context(|| format!("Export of {} failed", database))?;
    println!("✓ {} exported to {}", database, dest.display());
    Ok(())
}

pub async fn restore(config_path: &Path, archive: &Path, database: &str, owner: &str) -> Result<()> {
    let (config, orchestrator) = load(config_path)?;
    orchestrator
        .restore_database(config.instance(), archive, database, owner)
        .await
        .with_context(|| format!("Restore into {} failed", database))?;
    println!("✓ {} restored into {}", archive.display(), database);
    Ok(())
}

pub async fn backup_and_drop(config_path: &Path, database: &str) -> Result<()> {
    let (config, orchestrator) = load(config_path)?;
    let dest = orchestrator
        .backup_and_drop_database(config.instance(), database)
        .await
        .with_context(|| format!("Backup and drop of {} failed", database))?;
    println!("✓ {} backed up to {} and dropped", database, dest.display());
    Ok(())
}

pub async fn drop(config_path: &Path, database: &str, yes: bool) -> Result<()> {
    if !yes {
        bail!("Refusing to drop {} without --yes; use backup-and-drop to keep a copy", database);
    }
    let (config, orchestrator) = load(config_path)?;
    orchestrator
        .drop_database(config.instance(), database)
        .await
        .with_context(|| format!("Drop of {} failed", database))?;
    println!("✓ {} dropped", database);
    Ok(())
}
