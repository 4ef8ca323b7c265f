use anyhow::{Context, Result};
use dba_config::parser;
use std::path::Path;

pub fn run(config_path: &Path) -> Result<()> {
    println!("Validating {}...", config_path.display());

    let config = parser::parse_file(config_path).context("Failed to parse configuration")?;
    let instance = config.instance();
    let plan = &config.plan;

    println!("✓ Configuration valid");
    println!("  Instance: {}:{}", instance.host(), instance.port());
    println!("  Data: {}", instance.data_path().display());
    println!("  Tools: {}", instance.tools_path().display());
    println!("  Service: {}", plan.service());
    println!("  Firewall rule: {}", plan.firewall_rule());
    println!("  App users: {}", plan.users().len());
    println!("  App databases: {}", plan.databases().len());

    if plan.installer().is_none() {
        println!("  ⚠ No installer configured; install only works on a host that already has the binaries");
    }
    if instance.super_pass().is_none() {
        println!("  ⚠ No superuser password; install and database commands will fail");
    }

    Ok(())
}
