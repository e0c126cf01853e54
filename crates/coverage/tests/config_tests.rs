use std::fs;

use edb_coverage::EngineConfig;
use tempfile::TempDir;
use tracing::info;

#[test]
fn test_default_config() {
    edb_common::logging::ensure_test_logging(None);
    info!("Running test");
    let config = EngineConfig::default();

    assert!(config.parallel);
    assert!(config.revert_heuristics);
}

#[test]
fn test_load_partial_config() {
    edb_common::logging::ensure_test_logging(None);
    info!("Running test");
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("coverage.toml");
    fs::write(&path, "revert_heuristics = false\n").unwrap();

    let config = EngineConfig::load(&path).unwrap();
    assert!(config.parallel);
    assert!(!config.revert_heuristics);
}

#[test]
fn test_config_file_round_trip() {
    edb_common::logging::ensure_test_logging(None);
    info!("Running test");
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("coverage.toml");
    let config = EngineConfig { parallel: false, revert_heuristics: false };

    fs::write(&path, config.to_toml_string().unwrap()).unwrap();
    assert_eq!(EngineConfig::load(&path).unwrap(), config);
}

#[test]
fn test_load_errors() {
    edb_common::logging::ensure_test_logging(None);
    info!("Running test");
    let dir = TempDir::new().unwrap();

    let missing = EngineConfig::load(dir.path().join("missing.toml")).unwrap_err();
    assert!(missing.to_string().contains("Failed to read config file"));

    let path = dir.path().join("broken.toml");
    fs::write(&path, "parallel = \"yes\"\n").unwrap();
    let broken = EngineConfig::load(&path).unwrap_err();
    assert!(broken.to_string().contains("Failed to parse engine config"));
}
