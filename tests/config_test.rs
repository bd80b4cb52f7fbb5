//! Loads the shipped configuration file for each environment.

use signed_executor::config::{ConfigManager, ConfigurationError};
use std::path::PathBuf;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

fn shipped_config_dir() -> Option<PathBuf> {
    Some(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config"))
}

#[test]
fn test_development_overrides_apply() {
    let manager = assert_ok!(ConfigManager::load_from_directory_with_env(
        shipped_config_dir(),
        "development"
    ));
    let config = manager.config();

    assert_eq!(manager.environment(), "development");
    assert_eq!(config.environment, "development");
    assert_eq!(config.signing.token_ttl_seconds, 900);
    assert_eq!(config.signing.key_directory, Some(PathBuf::from(".keys")));
    assert!(config.batch.profiling_enabled);
    // untouched base values survive the merge
    assert_eq!(config.batch.max_concurrency, 50);
    assert_eq!(config.pool.connect_retry.max_attempts, 3);
}

#[test]
fn test_test_environment_disables_file_logging() {
    let manager = assert_ok!(ConfigManager::load_from_directory_with_env(
        shipped_config_dir(),
        "test"
    ));
    let config = manager.config();

    assert!(!config.logging.json_file);
    assert_eq!(config.pool.warmup_concurrency, 10);
    assert_eq!(config.signing.key_directory, None);
    assert!(!config.batch.profiling_enabled);
}

#[test]
fn test_production_tightens_ssh() {
    let manager = assert_ok!(ConfigManager::load_from_directory_with_env(
        shipped_config_dir(),
        "production"
    ));
    let config = manager.config();

    assert!(config.ssh.strict_host_key_checking);
    assert_eq!(
        config.ssh.identity_file,
        Some(PathBuf::from("/etc/signed-executor/id_ed25519"))
    );
    assert_eq!(config.logging.level.as_deref(), Some("info"));
    assert_eq!(config.ssh.execution_timeout(), Duration::from_millis(1000));
}

#[test]
fn test_fleet_lists_configured_hosts_in_order() {
    let manager = assert_ok!(ConfigManager::load_from_directory_with_env(
        shipped_config_dir(),
        "production"
    ));

    assert_eq!(
        manager.config().fleet(),
        vec!["ns1.example.net", "ns2.example.net", "plesk1.example.net"]
    );
    assert_eq!(manager.config().hosts["plesk1.example.net"].len(), 2);
}

#[test]
fn test_debug_config_masks_key_material() {
    let manager = assert_ok!(ConfigManager::load_from_directory_with_env(
        shipped_config_dir(),
        "production"
    ));
    let debug = manager.debug_config();

    assert_eq!(debug["ssh"]["identity_file"], "[MASKED]");
    assert_eq!(debug["signing"]["token_ttl_seconds"], 900);
}

#[test]
fn test_missing_directory_reports_searched_paths() {
    let dir = tempfile::TempDir::new().unwrap();
    let error = assert_err!(ConfigManager::load_from_directory_with_env(
        Some(dir.path().to_path_buf()),
        "test"
    ));

    match error {
        ConfigurationError::NotFound { searched } => {
            assert_eq!(searched.len(), 2);
        }
        other => panic!("unexpected error: {other}"),
    }
}
