//! Loading full configuration files from disk

use dba_config::{BackupFormat, ConfigError, parser};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_full_file() {
    unsafe {
        std::env::set_var("DBA_IT_SUPER_PASS", "S3cr3t!123");
    }

    let file = write_config(
        r#"
version: "1.0"
settings:
  command_timeout_secs: 900
  service_messages:
    started: "Der Dienst {service} wurde erfolgreich gestartet."
instance:
  host: db.internal
  port: 5433
  super_pass: ${DBA_IT_SUPER_PASS}
  home_path: /srv/pg
  backup_format: custom-archive
  backup_restore_parallelism: 4
install:
  env_name: Acme
  locale: en_US.UTF-8
  allowed_client_addresses:
    - 10.0.0.0/8
    - 192.168.1.0/24
  system_settings:
    - max_connections=200
    - shared_buffers='1GB'
  extensions: [pgcrypto, pg_trgm]
  app_users:
    app: "${DBA_IT_APP_PASS:-changeme}"
    reporting: r3port
  app_databases:
    appdb: app
    reports: reporting
"#,
    );

    let config = parser::parse_file(file.path()).unwrap();
    let instance = config.instance();

    assert_eq!(instance.host(), "db.internal");
    assert_eq!(instance.port(), 5433);
    assert_eq!(instance.super_pass(), Some("S3cr3t!123"));
    assert_eq!(instance.data_path(), Path::new("/srv/pg/db_data"));
    assert_eq!(instance.backup_format(), BackupFormat::CustomArchive);
    assert_eq!(instance.backup_restore_parallelism(), 4);

    assert_eq!(config.settings.command_timeout(), Some(Duration::from_secs(900)));
    assert_eq!(
        config.settings.service_messages.started_for("Acme_Postgresql"),
        "Der Dienst Acme_Postgresql wurde erfolgreich gestartet."
    );
    assert_eq!(config.settings.service_messages.stopped_state, "STOPPED");

    let plan = &config.plan;
    assert_eq!(plan.service(), "Acme_Postgresql");
    assert_eq!(plan.firewall_rule(), "Acme_PG - open 5433");
    assert_eq!(plan.cluster_locale(), "en_US.UTF-8");
    assert_eq!(plan.password_of("app"), Some("changeme"));
    let settings: Vec<&str> = plan.settings().iter().map(String::as_str).collect();
    assert_eq!(settings, ["max_connections=200", "shared_buffers='1GB'"]);
    let dbs: Vec<(&str, &str)> = plan
        .databases()
        .iter()
        .map(|(d, o)| (d.as_str(), o.as_str()))
        .collect();
    assert_eq!(dbs, [("appdb", "app"), ("reports", "reporting")]);

    unsafe {
        std::env::remove_var("DBA_IT_SUPER_PASS");
    }
}

#[test]
fn test_missing_file() {
    let err = parser::parse_file("/nonexistent/dba.yaml").unwrap_err();
    assert!(matches!(err, ConfigError::ReadError(_)));
}

#[test]
fn test_invalid_values_are_rejected() {
    let cases = [
        "version: \"1.0\"\ninstance:\n  port: 0\n",
        "version: \"1.0\"\ninstance:\n  backup_restore_parallelism: 0\n",
        "version: \"1.0\"\nsettings:\n  command_timeout_secs: 0\n",
        "version: \"1.0\"\ninstall:\n  allowed_client_addresses: [\"300.1.1.1/8\"]\n",
        "version: \"1.0\"\ninstall:\n  app_databases:\n    \"app; drop\": app\n",
    ];
    for case in cases {
        let err = parser::parse_str(case).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)), "{case}: {err}");
    }
}

#[test]
fn test_unset_variable_without_default() {
    let err = parser::parse_str("version: \"1.0\"\ninstance:\n  super_pass: ${DBA_IT_NEVER_SET}\n")
        .unwrap_err();
    assert!(matches!(err, ConfigError::EnvVarNotFound(_)));
}
