//! Configuration manager behaviour against an isolated config file

use anilib_cli::config::{AppConfig, ConfigManager};
use std::fs;
use tempfile::TempDir;

fn create_test_config_manager(temp_dir: &TempDir) -> ConfigManager {
    ConfigManager::with_path(temp_dir.path().join("config.toml"))
}

#[test]
fn test_set_and_get_username() {
    let temp_dir = TempDir::new().unwrap();
    let mut manager = create_test_config_manager(&temp_dir);

    manager.set("registry.username", "testuser").unwrap();

    assert!(temp_dir.path().join("config.toml").exists());
    assert_eq!(manager.get("registry.username").unwrap(), "testuser");
}

#[test]
fn test_numeric_looking_username_stays_string() {
    let temp_dir = TempDir::new().unwrap();
    let mut manager = create_test_config_manager(&temp_dir);

    manager.set("registry.username", "12345").unwrap();

    let config = manager.load().unwrap();
    assert_eq!(config.registry.username.as_deref(), Some("12345"));
}

#[test]
fn test_client_version_is_integer() {
    let temp_dir = TempDir::new().unwrap();
    let mut manager = create_test_config_manager(&temp_dir);

    manager.set("registry.client_version", "3").unwrap();

    let content = fs::read_to_string(temp_dir.path().join("config.toml")).unwrap();
    assert!(content.contains("client_version = 3"));
    assert_eq!(manager.load().unwrap().registry.client_version, 3);
}

#[test]
fn test_rejects_invalid_values() {
    let temp_dir = TempDir::new().unwrap();
    let mut manager = create_test_config_manager(&temp_dir);

    assert!(manager.set("registry.udp_port", "70000").is_err());
    assert!(manager.set("registry.client_version", "-1").is_err());
    assert!(manager.set("session.idle_logout_secs", "3600").is_err());
    assert!(manager.set("queues.poll_interval_secs", "0").is_err());
    assert!(manager.set("output.color_enabled", "maybe").is_err());
    assert!(!temp_dir.path().join("config.toml").exists());
}

#[test]
fn test_file_values_override_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let mut manager = create_test_config_manager(&temp_dir);

    manager.set("udp_rate.long_delay_ms", "6000").unwrap();
    manager.set("session.idle_logout_secs", "120").unwrap();

    let config = manager.load().unwrap();
    let defaults = AppConfig::default();
    assert_eq!(config.udp_rate.long_delay_ms, 6000);
    assert_eq!(config.udp_rate.short_delay_ms, defaults.udp_rate.short_delay_ms);
    assert_eq!(config.core().session.idle_logout_secs, 120);
}

#[test]
fn test_list_masks_password_and_is_sorted() {
    let temp_dir = TempDir::new().unwrap();
    let mut manager = create_test_config_manager(&temp_dir);

    manager.set("registry.username", "testuser").unwrap();
    manager.set("registry.password", "hunter2").unwrap();

    let items = manager.list().unwrap();
    let keys: Vec<&str> = items.iter().map(|(k, _)| k.as_str()).collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);

    let password = items
        .iter()
        .find(|(k, _)| k == "registry.password")
        .map(|(_, v)| v.as_str());
    assert_eq!(password, Some("********"));
    assert!(items.iter().any(|(k, v)| k == "registry.username" && v == "testuser"));
}

#[test]
fn test_get_unknown_key() {
    let temp_dir = TempDir::new().unwrap();
    let manager = create_test_config_manager(&temp_dir);

    assert!(manager.get("registry.nonexistent").is_err());
}

#[test]
fn test_credentials_detection() {
    let temp_dir = TempDir::new().unwrap();
    let mut manager = create_test_config_manager(&temp_dir);

    assert!(!manager.load().unwrap().registry.has_credentials());

    manager.set("registry.username", "testuser").unwrap();
    manager.set("registry.password", "hunter2").unwrap();

    assert!(manager.load().unwrap().registry.has_credentials());
}

#[test]
#[serial_test::serial]
fn test_environment_overrides_file() {
    let temp_dir = TempDir::new().unwrap();
    let mut manager = create_test_config_manager(&temp_dir);
    manager.set("queues.shutdown_grace_secs", "10").unwrap();

    // SAFETY: serialized with every other test touching the environment
    unsafe { std::env::set_var("ANILIB_QUEUES__SHUTDOWN_GRACE_SECS", "45") };
    let config = manager.load();
    unsafe { std::env::remove_var("ANILIB_QUEUES__SHUTDOWN_GRACE_SECS") };

    assert_eq!(config.unwrap().queues.shutdown_grace_secs, 45);
    assert_eq!(manager.load().unwrap().queues.shutdown_grace_secs, 10);
}
