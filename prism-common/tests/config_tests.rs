//! Tests for bootstrap configuration loading and graceful degradation
//!
//! Tests that manipulate XDG_CONFIG_HOME are marked with #[serial] so they do
//! not race each other.

use std::env;
use std::fs;
use std::path::PathBuf;

use prism_common::config::{default_config_path, ConfigOverrides, TomlConfig};
use serial_test::serial;
use tempfile::TempDir;

#[test]
fn test_missing_explicit_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let config = TomlConfig::load(Some(&dir.path().join("nope.toml"))).unwrap();
    assert_eq!(config, TomlConfig::default());
}

#[test]
fn test_full_file_is_loaded() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
[server]
host = "0.0.0.0"
port = 4100
max_body_bytes = 2048
request_timeout_ms = 500

[store]
snapshot_path = "/var/lib/prism/snapshot.json"

[import]
max_rows = 10

[cache]
snapshot_ttl_secs = 0

[logging]
level = "debug"
"#,
    )
    .unwrap();

    let config = TomlConfig::load(Some(&path)).unwrap();
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 4100);
    assert_eq!(config.server.max_body_bytes, 2048);
    assert_eq!(config.server.request_timeout_ms, 500);
    assert_eq!(
        config.store.snapshot_path,
        PathBuf::from("/var/lib/prism/snapshot.json")
    );
    assert_eq!(config.import.max_rows, 10);
    assert_eq!(config.cache.snapshot_ttl_secs, 0);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_unparsable_file_is_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[server]\nport = -1\n").unwrap();

    assert!(TomlConfig::load(Some(&path)).is_err());
}

#[test]
fn test_overrides_take_priority_over_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[server]\nport = 4100\n[logging]\nlevel = \"warn\"\n").unwrap();

    let config = TomlConfig::load(Some(&path))
        .unwrap()
        .with_overrides(ConfigOverrides {
            host: Some("0.0.0.0".to_string()),
            log_level: Some("trace".to_string()),
            ..Default::default()
        });
    assert_eq!(config.server.port, 4100);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.logging.level, "trace");
}

#[cfg(target_os = "linux")]
#[test]
#[serial]
fn test_default_location_under_xdg_config_home() {
    let dir = TempDir::new().unwrap();
    let previous = env::var_os("XDG_CONFIG_HOME");
    env::set_var("XDG_CONFIG_HOME", dir.path());

    let expected = dir.path().join("prism").join("config.toml");
    assert_eq!(default_config_path(), Some(expected.clone()));

    fs::create_dir_all(expected.parent().unwrap()).unwrap();
    fs::write(&expected, "[import]\nmax_rows = 7\n").unwrap();
    let config = TomlConfig::load(None).unwrap();

    match previous {
        Some(value) => env::set_var("XDG_CONFIG_HOME", value),
        None => env::remove_var("XDG_CONFIG_HOME"),
    }

    assert_eq!(config.import.max_rows, 7);
}
