//! Configuration resolution tests
//!
//! Tests that touch CRM_* environment variables are marked #[serial] so they
//! never race each other.

use crm_common::config::{
    CliOverrides, CompiledDefaults, ServiceConfig, TomlConfig, DATABASE_FILE_NAME, ENV_LOG_LEVEL,
    ENV_PORT, ENV_ROOT_FOLDER, MAX_SESSION_TTL_HOURS,
};
use crm_common::Error;
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

fn clear_env() {
    env::remove_var(ENV_ROOT_FOLDER);
    env::remove_var(ENV_PORT);
    env::remove_var(ENV_LOG_LEVEL);
}

fn defaults() -> CompiledDefaults {
    CompiledDefaults {
        root_folder: PathBuf::from("/var/lib/crm-default"),
        bind_address: "127.0.0.1".to_string(),
        port: 5730,
        log_level: "info".to_string(),
        session_ttl_hours: 168,
    }
}

fn write_toml(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_compiled_defaults_for_current_platform() {
    let defaults = CompiledDefaults::for_current_platform();

    assert!(!defaults.root_folder.as_os_str().is_empty());
    assert!(defaults.root_folder.ends_with("crm") || defaults.root_folder.ends_with("crm_data"));
    assert_eq!(defaults.port, 5730);
    assert_eq!(defaults.log_level, "info");
}

#[test]
#[serial]
fn test_no_sources_uses_defaults() {
    clear_env();

    let config = ServiceConfig::merge(&CliOverrides::default(), TomlConfig::default(), defaults()).unwrap();

    assert_eq!(config.root_folder, PathBuf::from("/var/lib/crm-default"));
    assert_eq!(config.port, 5730);
    assert_eq!(config.log_level, "info");
    assert_eq!(config.session_ttl_hours, 168);
    assert!(config.admin_password.is_none());
    assert_eq!(config.listen_address(), "127.0.0.1:5730");
    assert_eq!(
        config.database_path(),
        PathBuf::from("/var/lib/crm-default").join(DATABASE_FILE_NAME)
    );
}

#[test]
#[serial]
fn test_toml_overrides_defaults() {
    clear_env();

    let file = write_toml(
        r#"
root_folder = "/srv/crm"
port = 8080
session_ttl_hours = 12
admin_password = "changeme"

[logging]
level = "debug"
"#,
    );
    let toml = TomlConfig::load(file.path()).unwrap();
    let config = ServiceConfig::merge(&CliOverrides::default(), toml, defaults()).unwrap();

    assert_eq!(config.root_folder, PathBuf::from("/srv/crm"));
    assert_eq!(config.port, 8080);
    assert_eq!(config.log_level, "debug");
    assert_eq!(config.session_ttl_hours, 12);
    assert_eq!(config.admin_password.as_deref(), Some("changeme"));
}

#[test]
#[serial]
fn test_env_overrides_toml() {
    clear_env();
    env::set_var(ENV_ROOT_FOLDER, "/tmp/crm-env");
    env::set_var(ENV_PORT, "9000");
    env::set_var(ENV_LOG_LEVEL, "warn");

    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/srv/crm")),
        port: Some(8080),
        ..Default::default()
    };
    let config = ServiceConfig::merge(&CliOverrides::default(), toml, defaults()).unwrap();

    assert_eq!(config.root_folder, PathBuf::from("/tmp/crm-env"));
    assert_eq!(config.port, 9000);
    assert_eq!(config.log_level, "warn");

    clear_env();
}

#[test]
#[serial]
fn test_cli_overrides_everything() {
    clear_env();
    env::set_var(ENV_ROOT_FOLDER, "/tmp/crm-env");
    env::set_var(ENV_PORT, "9000");

    let cli = CliOverrides {
        root_folder: Some(PathBuf::from("/tmp/crm-cli")),
        port: Some(7000),
        log_level: Some("trace".to_string()),
        bind_address: Some("0.0.0.0".to_string()),
        ..Default::default()
    };
    let config = ServiceConfig::merge(&cli, TomlConfig::default(), defaults()).unwrap();

    assert_eq!(config.root_folder, PathBuf::from("/tmp/crm-cli"));
    assert_eq!(config.port, 7000);
    assert_eq!(config.log_level, "trace");
    assert_eq!(config.listen_address(), "0.0.0.0:7000");

    clear_env();
}

#[test]
#[serial]
fn test_invalid_env_port_is_config_error() {
    clear_env();
    env::set_var(ENV_PORT, "not-a-port");

    let result = ServiceConfig::merge(&CliOverrides::default(), TomlConfig::default(), defaults());
    assert!(matches!(result, Err(Error::Config(_))));

    clear_env();
}

#[test]
#[serial]
fn test_non_positive_session_ttl_rejected() {
    clear_env();

    let toml = TomlConfig {
        session_ttl_hours: Some(0),
        ..Default::default()
    };
    let result = ServiceConfig::merge(&CliOverrides::default(), toml, defaults());
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_session_ttl_upper_bound() {
    clear_env();

    let at_limit = TomlConfig {
        session_ttl_hours: Some(MAX_SESSION_TTL_HOURS),
        ..Default::default()
    };
    let config = ServiceConfig::merge(&CliOverrides::default(), at_limit, defaults()).unwrap();
    assert_eq!(config.session_ttl_hours, MAX_SESSION_TTL_HOURS);

    // Large enough to overflow a chrono::Duration if it got through
    let huge = TomlConfig {
        session_ttl_hours: Some(i64::MAX / 1000),
        ..Default::default()
    };
    let result = ServiceConfig::merge(&CliOverrides::default(), huge, defaults());
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_malformed_toml_is_config_error() {
    let file = write_toml("port = \"eighty\"\n");
    assert!(matches!(TomlConfig::load(file.path()), Err(Error::Config(_))));
}

#[test]
fn test_missing_logging_section_defaults_to_info() {
    let file = write_toml("port = 8081\n");
    let toml = TomlConfig::load(file.path()).unwrap();
    assert_eq!(toml.logging.level, "info");
    assert_eq!(toml.port, Some(8081));
}

#[test]
#[serial]
fn test_explicit_config_file_must_exist() {
    clear_env();

    let cli = CliOverrides {
        config_file: Some(PathBuf::from("/nonexistent/crm/config.toml")),
        ..Default::default()
    };
    assert!(matches!(ServiceConfig::resolve(&cli), Err(Error::Io(_))));
}

#[test]
#[serial]
fn test_ensure_root_folder_creates_directory() {
    clear_env();
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path().join("nested").join("crm");

    let mut config = ServiceConfig::merge(&CliOverrides::default(), TomlConfig::default(), defaults()).unwrap();
    config.root_folder = root.clone();

    config.ensure_root_folder().unwrap();
    assert!(root.is_dir());
}
