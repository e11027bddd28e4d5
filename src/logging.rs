//! Log output: JSON files under the log directory, plus a console in development
//!
//! - `combined.log` receives every event that passes the filter
//! - `error.log` receives `ERROR` events only
//!
//! `RUST_LOG` overrides the configured default level.

use std::path::Path;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

/// Install the global subscriber; keep the returned guards alive until exit
pub fn init(log_dir: &Path, default_level: &str, console: bool) -> Vec<WorkerGuard> {
    let (subscriber, guards) = subscriber(log_dir, default_level, console);
    subscriber.init();
    guards
}

/// Build the layered subscriber without installing it
///
/// Buffered file output is flushed when the returned guards are dropped.
pub fn subscriber(
    log_dir: &Path,
    default_level: &str,
    console: bool,
) -> (impl Subscriber + Send + Sync + 'static, Vec<WorkerGuard>) {
    // Create log directory if it doesn't exist
    std::fs::create_dir_all(log_dir).unwrap_or_else(|e| {
        eprintln!("Warning: Could not create log directory {}: {}", log_dir.display(), e);
    });

    let combined_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "combined.log");
    let (combined_writer, combined_guard) = tracing_appender::non_blocking(combined_appender);

    let error_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "error.log");
    let (error_writer, error_guard) = tracing_appender::non_blocking(error_appender);

    let console_layer = console.then(|| fmt::layer().with_target(true).with_thread_ids(true));

    let subscriber = tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with(console_layer)
        .with(
            fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .json()
                .with_writer(combined_writer),
        )
        .with(
            fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .json()
                .with_writer(error_writer)
                .with_filter(LevelFilter::ERROR),
        );

    (subscriber, vec![combined_guard, error_guard])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_log(dir: &Path, prefix: &str) -> String {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(prefix))
            .map(|entry| std::fs::read_to_string(entry.path()).unwrap())
            .collect()
    }

    #[test]
    fn test_dropping_guards_flushes_file_output() {
        let dir = tempfile::tempdir().unwrap();
        let (subscriber, guards) = subscriber(dir.path(), "info", false);

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("seeding started");
            tracing::error!("seeding failed: connection refused");
        });
        drop(guards);

        let errors = read_log(dir.path(), "error.log");
        assert!(errors.contains("seeding failed: connection refused"));
        assert!(!errors.contains("seeding started"));

        let combined = read_log(dir.path(), "combined.log");
        assert!(combined.contains("seeding started"));
        assert!(combined.contains("seeding failed"));
    }
}
