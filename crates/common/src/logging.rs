// EDB - Ethereum Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Logging setup for EDB coverage tooling
//!
//! Provides:
//! - Structured console output honouring `RUST_LOG` (default `info`)
//! - Optional daily-rolling log files in the system temp directory
//! - A once-only initializer for tests

use std::{env, fs, path::PathBuf, sync::Once};

use eyre::{Result, WrapErr};
use tracing::Level;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, time::LocalTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Name of the directory, under the system temp directory, that holds log files
pub const LOG_DIRECTORY: &str = "edb-coverage-logs";

/// Per-instruction walk traces are only written to log files, never to the console
const CONSOLE_WALK_DIRECTIVE: &str = "edb_coverage::coverage=debug";

/// Initialize logging for a coverage component
///
/// Console output is always enabled. With `enable_file_logging`, everything is also
/// written to `<temp>/edb-coverage-logs/<component_name>/<component_name>.log`, rotated
/// daily.
///
/// # Examples
/// ```rust
/// use edb_common::logging;
///
/// fn main() -> eyre::Result<()> {
///     logging::init_logging("edb-coverage", true)?;
///     tracing::info!("Generating coverage maps");
///     Ok(())
/// }
/// ```
pub fn init_logging(component_name: &str, enable_file_logging: bool) -> Result<()> {
    let env_filter = default_filter(Level::INFO)?;

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_timer(LocalTime::rfc_3339())
        .with_ansi(true)
        .pretty();

    if enable_file_logging {
        let log_dir = create_log_directory(component_name)?;

        let file_appender = rolling::daily(&log_dir, format!("{component_name}.log"));
        let (non_blocking_appender, guard) = non_blocking(file_appender);

        // The writer must outlive every batch, which may run until process exit
        std::mem::forget(guard);

        let file_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_timer(LocalTime::rfc_3339())
            .with_ansi(false)
            .with_writer(non_blocking_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer.with_filter(filter_for_console()))
            .with(file_layer.with_filter(filter_for_file()))
            .try_init()
            .map_err(|e| eyre::eyre!("Failed to initialize tracing subscriber: {e}"))?;

        tracing::info!(
            component = component_name,
            log_dir = %log_dir.display(),
            "Logging initialized with console and file output"
        );
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer.with_filter(filter_for_console()))
            .try_init()
            .map_err(|e| eyre::eyre!("Failed to initialize tracing subscriber: {e}"))?;

        tracing::info!(component = component_name, "Logging initialized with console output only");
    }

    tracing::debug!(
        rust_log = %env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        threads = rayon_threads(),
        "Environment information"
    );

    Ok(())
}

/// `RUST_LOG` if set and valid, `level` otherwise
fn default_filter(level: Level) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.as_str()))
        .wrap_err("Failed to create environment filter")
}

/// Create the log directory of a component in the system temp folder
fn create_log_directory(component_name: &str) -> Result<PathBuf> {
    let log_dir = env::temp_dir().join(LOG_DIRECTORY).join(component_name);

    fs::create_dir_all(&log_dir)
        .wrap_err_with(|| format!("Failed to create log directory {}", log_dir.display()))?;

    Ok(log_dir)
}

/// Filter for console output: everything `RUST_LOG` allows, minus walk traces
fn filter_for_console() -> EnvFilter {
    let filter = EnvFilter::from_default_env();
    match CONSOLE_WALK_DIRECTIVE.parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    }
}

/// Filter for file output: everything `RUST_LOG` allows
fn filter_for_file() -> EnvFilter {
    EnvFilter::from_default_env()
}

/// Number of worker threads batches run on, as configured through `RAYON_NUM_THREADS`
fn rayon_threads() -> usize {
    env::var("RAYON_NUM_THREADS")
        .ok()
        .and_then(|threads| threads.parse().ok())
        .filter(|threads| *threads > 0)
        .unwrap_or_else(|| std::thread::available_parallelism().map_or(1, |n| n.get()))
}

/// Initialize plain console logging
///
/// Useful for tests and small tools that do not need file output.
pub fn init_simple_logging(level: Level) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(default_filter(level)?)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|e| eyre::eyre!("Failed to initialize simple logging: {e}"))?;

    Ok(())
}

static TEST_LOGGING_INIT: Once = Once::new();

/// Initialize logging for tests; safe to call from every test
///
/// Logs at `default_level` (INFO if `None`) unless `RUST_LOG` says otherwise. Failure to
/// install the subscriber, because another one is already installed, is ignored.
///
/// # Usage
/// ```rust
/// use edb_common::logging;
/// use tracing::info;
///
/// #[test]
/// fn my_test() {
///     logging::ensure_test_logging(None);
///     info!("Running test");
/// }
/// ```
pub fn ensure_test_logging(default_level: Option<Level>) {
    TEST_LOGGING_INIT.call_once(|| {
        let _ = init_simple_logging(default_level.unwrap_or(Level::INFO));
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{debug, info, warn};

    #[test]
    fn test_logging_functions_work() {
        ensure_test_logging(None);

        info!("Test info message");
        warn!("Test warning message");
        debug!("Test debug message");
    }

    #[test]
    fn test_log_directory_creation() {
        let log_dir = create_log_directory("test-component").unwrap();
        assert!(log_dir.exists());
        assert!(log_dir.to_string_lossy().contains(LOG_DIRECTORY));
        assert!(log_dir.ends_with("test-component"));
    }

    #[test]
    fn test_console_filter_caps_walk_traces() {
        let console_filter = filter_for_console();
        assert!(console_filter.to_string().contains("edb_coverage::coverage=debug"));
        assert!(filter_for_file().to_string().len() <= console_filter.to_string().len());
    }

    #[test]
    fn test_repeated_initialization_does_not_panic() {
        ensure_test_logging(None);

        // a subscriber is already installed, so these fail without panicking
        assert!(init_logging("test-coverage", false).is_err());
        assert!(init_simple_logging(Level::DEBUG).is_err());

        info!("Logging still works after repeated initialization");
    }
}
