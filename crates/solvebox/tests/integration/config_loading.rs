use solvebox::config::{Config, ConfigError};
use solvebox::harness::HarnessKind;

use super::FIXTURES_PATH;

#[test]
fn test_load_valid_config() {
    let path = format!("{FIXTURES_PATH}/configs/valid_full.toml");
    let config = Config::from_file(&path).expect("Failed to load config");

    assert!(config.languages.contains_key("javascript"));
    assert!(config.languages.contains_key("python"));
    assert_eq!(config.runtime_binary().to_str(), Some("podman"));
    assert_eq!(config.pool_size, 2);
    assert_eq!(config.bench_runs, 5);
    assert_eq!(config.default_limits.tmpfs_size, Some(16));

    let python = config.get_language("python").expect("python not found");
    assert_eq!(python.harness, HarnessKind::Python);
    let limits = config.effective_limits(python);
    assert_eq!(limits.memory_limit, Some(64));
    assert_eq!(limits.cpus, Some(0.5));
}

#[test]
fn test_load_minimal_config() {
    let path = format!("{FIXTURES_PATH}/configs/valid_minimal.toml");
    let config = Config::from_file(&path).expect("Failed to load config");

    assert!(config.languages.contains_key("test"));
    assert_eq!(config.pool_size, 3);
    assert_eq!(config.acquire_wait_ms, 50);
    assert_eq!(config.suite_timeout, 30.0);
}

#[test]
fn test_load_invalid_empty_name() {
    let path = format!("{FIXTURES_PATH}/configs/invalid_empty_name.toml");
    let result = Config::from_file(&path);
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn test_load_invalid_image() {
    let path = format!("{FIXTURES_PATH}/configs/invalid_image.toml");
    let result = Config::from_file(&path);
    assert!(result.is_err());
}

#[test]
fn test_load_invalid_bench_runs() {
    let path = format!("{FIXTURES_PATH}/configs/invalid_bench_runs.toml");
    let result = Config::from_file(&path);
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn test_load_unknown_harness() {
    let path = format!("{FIXTURES_PATH}/configs/invalid_harness.toml");
    let result = Config::from_file(&path);
    assert!(result.is_err());
}

#[test]
fn test_load_missing_file() {
    let result = Config::from_file(format!("{FIXTURES_PATH}/configs/nope.toml"));
    assert!(result.is_err());
}
