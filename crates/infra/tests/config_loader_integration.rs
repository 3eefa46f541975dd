//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading configuration from files.

use std::io::Write;
use std::time::Duration;

use scaffold_infra::config::{self, LogFormat};
use scaffold_infra::InfraError;
use tempfile::NamedTempFile;

fn write_config(contents: &str, extension: &str) -> std::path::PathBuf {
    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    temp_file.write_all(contents.as_bytes()).expect("Failed to write to temp file");

    let path = temp_file.path().with_extension(extension);
    std::fs::copy(temp_file.path(), &path).expect("Failed to copy file");
    path
}

#[test]
fn test_load_config_from_toml_file() {
    let path = write_config(
        r#"
[cache]
shards = 32
life_window = 600000
clean_window = 60000
max_entry_size = 512
max_entries_in_window = 100000
hard_max_cache_size_mb = 256

[logging]
level = "warn"
format = "json"
"#,
        "toml",
    );

    let result = config::load_from_file(Some(path.clone()));
    assert!(result.is_ok(), "Failed to load config from TOML file: {:?}", result.as_ref().err());

    let config = result.unwrap();

    // Verify cache configuration
    assert_eq!(config.cache.shards, 32);
    assert_eq!(config.cache.life_window, Duration::from_secs(600));
    assert_eq!(config.cache.clean_window, Duration::from_secs(60));
    assert_eq!(config.cache.max_entry_size, 512);
    assert_eq!(config.cache.max_entries_in_window, 100_000);
    assert_eq!(config.cache.hard_max_cache_size_mb, 256);

    // Verify logging configuration
    assert_eq!(config.logging.level, "warn");
    assert_eq!(config.logging.format, LogFormat::Json);

    // Cleanup
    std::fs::remove_file(path).ok();
}

#[test]
fn test_load_config_from_empty_json_uses_defaults() {
    let path = write_config("{}", "json");

    let config = config::load_from_file(Some(path.clone())).expect("Failed to load config");
    assert_eq!(config, config::AppConfig::default());

    std::fs::remove_file(path).ok();
}

#[test]
fn test_load_config_rejects_invalid_cache_settings() {
    let path = write_config("[cache]\nshards = 0\n", "toml");

    let result = config::load_from_file(Some(path.clone()));
    assert!(matches!(result, Err(InfraError::Config(_))), "Zero shards must be rejected");

    std::fs::remove_file(path).ok();
}

#[test]
fn test_load_config_invalid_toml() {
    let path = write_config("[cache\nshards = 2", "toml");

    let result = config::load_from_file(Some(path.clone()));
    assert!(matches!(result, Err(InfraError::Config(ref msg)) if msg.contains("TOML")));

    std::fs::remove_file(path).ok();
}
