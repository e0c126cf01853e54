use edb_common::logging::{ensure_test_logging, init_logging, init_simple_logging, LOG_DIRECTORY};
use tracing::{info, Level};

#[test]
fn test_ensure_test_logging_is_idempotent() {
    ensure_test_logging(None);
    ensure_test_logging(Some(Level::DEBUG));
    info!("Running test");
}

#[test]
fn test_second_subscriber_is_rejected() {
    ensure_test_logging(None);
    info!("Running test");

    let err = init_simple_logging(Level::TRACE).unwrap_err();
    assert!(err.to_string().contains("Failed to initialize simple logging"));

    let err = init_logging("logging-tests", false).unwrap_err();
    assert!(err.to_string().contains("Failed to initialize tracing subscriber"));
}

#[test]
fn test_file_logging_creates_log_directory() {
    ensure_test_logging(None);
    info!("Running test");

    // the subscriber is already installed, but the directory is created before that
    let _ = init_logging("logging-tests-file", true);
    let log_dir = std::env::temp_dir().join(LOG_DIRECTORY).join("logging-tests-file");
    assert!(log_dir.is_dir());
}
