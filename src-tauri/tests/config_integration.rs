//! Configuration system integration tests for Solus.
//!
//! Exercises loading, saving and migration against temporary files so the
//! real `~/.solus/config.json` is never touched.

use solus_lib::config::{Config, ConfigError};
use std::fs;
use tempfile::TempDir;

// =============================================================================
// Load / Save
// =============================================================================

#[test]
fn test_missing_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");

    let config = Config::load_from(&path).unwrap();

    assert_eq!(config.session.inactivity_timeout_secs, 30);
    assert_eq!(config.guidance.auto_dismiss_secs, 10);
    assert!(!path.exists(), "loading must not create the file");
}

#[test]
fn test_save_then_load_keeps_changes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");

    let mut config = Config::default();
    config.session.token_server_url = "https://tokens.example.com".to_string();
    config.guidance.auto_dismiss_secs = 25;
    config.bubble.initial_y = 420;
    config.general.debug_mode = true;
    config.save_to(&path).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded.session.token_server_url, "https://tokens.example.com");
    assert_eq!(loaded.guidance.auto_dismiss_secs, 25);
    assert_eq!(loaded.bubble.initial_y, 420);
    assert!(loaded.general.debug_mode);
}

#[test]
fn test_save_creates_parent_directories() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("deeper").join("config.json");

    Config::default().save_to(&path).unwrap();

    assert!(path.exists());
}

#[test]
fn test_saved_file_is_pretty_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");

    Config::default().save_to(&path).unwrap();

    let contents = fs::read_to_string(&path).unwrap();
    assert!(contents.contains('\n'));
    assert!(contents.contains("\"inactivity_timeout_secs\": 30"));
}

#[test]
fn test_partial_file_fills_missing_sections() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{"version": 1, "capture": {"max_attempts": 4}}"#).unwrap();

    let config = Config::load_from(&path).unwrap();

    assert_eq!(config.capture.max_attempts, 4);
    assert_eq!(config.capture.retry_interval_ms, 500);
    assert_eq!(config.wake.restart_delay_ms, 1000);
}

// =============================================================================
// Validation and migration
// =============================================================================

#[test]
fn test_malformed_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, "{ not json").unwrap();

    assert!(Config::load_from(&path).is_err());
}

#[test]
fn test_invalid_values_rejected_on_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    fs::write(
        &path,
        r#"{"version": 1, "session": {"inactivity_timeout_secs": 0}}"#,
    )
    .unwrap();

    assert!(matches!(
        Config::load_from(&path),
        Err(ConfigError::Invalid { .. })
    ));
}

#[test]
fn test_version_0_file_is_migrated_and_rewritten() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{"version": 0}"#).unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.version, 1);

    let rewritten = fs::read_to_string(&path).unwrap();
    assert!(rewritten.contains("\"version\": 1"));
}

#[test]
fn test_invalid_old_file_is_not_rewritten() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    let original = r#"{"version": 0, "guidance": {"auto_dismiss_secs": 0}}"#;
    fs::write(&path, original).unwrap();

    assert!(matches!(
        Config::load_from(&path),
        Err(ConfigError::Invalid { .. })
    ));
    assert_eq!(fs::read_to_string(&path).unwrap(), original);
}

#[test]
fn test_future_version_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{"version": 42}"#).unwrap();

    assert!(matches!(
        Config::load_from(&path),
        Err(ConfigError::UnknownVersion(42))
    ));
}
