//! Integration tests for ConfigManager and configuration file handling
//!
//! These tests verify:
//! - Configuration loading and saving
//! - Environment overrides on top of the YAML file
//! - Legacy catalog overrides
//! - Layout resolution from a loaded configuration

use camino::Utf8PathBuf;
use modops::ConfigManager;
use modops::models::LegacyRoot;
use modops::services::{GameLayout, KitLayout};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

fn create_test_config_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, config_path)
}

fn no_env() -> Vec<(String, String)> {
    Vec::new()
}

#[test]
fn test_create_config_manager() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    assert_eq!(manager.config_dir(), &config_path);
    assert_eq!(manager.config_path(), config_path.join("modops.yaml"));
}

#[test]
fn test_creates_missing_config_directory() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let nested = config_path.join("nested").join("modops");

    ConfigManager::new(&nested).unwrap();
    assert!(nested.is_dir());
}

#[test]
fn test_load_defaults() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let config = manager.load_with_env(no_env()).unwrap();

    assert_eq!(config.operation_timeout(), Duration::from_secs(600));
    assert_eq!(config.worker_timeout(), Duration::from_secs(900));
    assert_eq!(config.manifest_cache_ttl(), Duration::from_millis(750));
    assert!(config.game_data_dir.is_none());
    assert!(config.legacy_mod("60fps").is_some());
    assert!(config.legacy_mod("4gbpatch").is_some());
}

#[test]
fn test_load_yaml_file() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    fs::write(
        manager.config_path(),
        r#"
game_data_dir: "C:/Games/Spore/DataEP1"
kit_dir: "C:/ModAPI"
settle_delay_ms: 500
forward_worker_logs: true
"#,
    )
    .unwrap();

    let config = manager.load_with_env(no_env()).unwrap();

    assert_eq!(config.settle_delay(), Duration::from_millis(500));
    assert!(config.forward_worker_logs);
    // Unset values keep their defaults
    assert_eq!(config.emit_throttle_ms, 100);

    let game = GameLayout::from_config(&config).unwrap();
    assert_eq!(game.install_root(), Utf8PathBuf::from("C:/Games/Spore"));
    let kit = KitLayout::resolve(&config).unwrap();
    assert_eq!(kit.mlibs(), Utf8PathBuf::from("C:/ModAPI").join("mLibs"));
}

#[test]
fn test_legacy_catalog_override() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    fs::write(
        manager.config_path(),
        r#"
legacy_mods:
  4gbpatch:
    files: ["SporeApp.exe"]
    dest_subfolder: "SporebinEP1"
    root: install_root
    download_url: "https://mirror.example.invalid/4GBPatch.zip"
"#,
    )
    .unwrap();

    let config = manager.load_with_env(no_env()).unwrap();

    let spec = config.legacy_mod("4gbpatch").unwrap();
    assert_eq!(spec.root, LegacyRoot::InstallRoot);
    assert!(spec.requires_backup);
    assert_eq!(spec.download_url, "https://mirror.example.invalid/4GBPatch.zip");
    // A catalog in the file replaces the shipped one
    assert!(config.legacy_mod("60fps").is_none());
}

#[test]
fn test_environment_overrides() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();
    fs::write(manager.config_path(), "worker_timeout_ms: 1000\nkit_dir: C:/FromFile\n").unwrap();

    let config = manager
        .load_with_env(vec![
            ("MODOPS_WORKER_TIMEOUT_MS".to_string(), "2500".to_string()),
            ("MODOPS_KIT_DIR".to_string(), "D:/FromEnv".to_string()),
            ("OTHER_SETTLE_DELAY_MS".to_string(), "9".to_string()),
        ])
        .unwrap();

    assert_eq!(config.worker_timeout(), Duration::from_millis(2500));
    assert_eq!(config.kit_dir.as_deref(), Some("D:/FromEnv"));
    assert_eq!(config.settle_delay_ms, 350);
}

#[test]
fn test_invalid_yaml_is_an_error() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();
    fs::write(manager.config_path(), "operation_timeout_ms: [not, a, number]\n").unwrap();

    assert!(manager.load_with_env(no_env()).is_err());
}

#[test]
fn test_save_round_trip() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let mut config = manager.load_with_env(no_env()).unwrap();
    config.game_data_dir = Some("D:/Spore/DataEP1".to_string());
    config.debug_mode = true;
    manager.save(&config).unwrap();

    let reloaded = manager.load_with_env(no_env()).unwrap();
    assert_eq!(reloaded.game_data_dir, config.game_data_dir);
    assert!(reloaded.debug_mode);
    assert_eq!(reloaded.legacy_mods.len(), 2);
}
