//! Logging setup
//!
//! Two sinks: a live console layer and a persistent file layer. The file is
//! written through a non-blocking worker; keep the returned guard alive for
//! the lifetime of the process or buffered lines are lost on exit.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// HTTP stack crates that are chatty at info level.
const NOISY_TARGETS: [&str; 5] = ["reqwest", "hyper", "hyper_util", "h2", "rustls"];

/// Logging setup errors
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {reason}")]
    Filter { filter: String, reason: String },

    #[error("Invalid log file path: {0}")]
    Path(String),

    #[error("Failed to create log directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to install logger: {0}")]
    Init(String),
}

/// Filter directives for `level`, with the HTTP stack capped at `warn`.
pub fn filter_directives(level: &str) -> String {
    let mut directives = level.trim().to_string();
    for target in NOISY_TARGETS {
        directives.push_str(&format!(",{}=warn", target));
    }
    directives
}

/// Install the global subscriber.
///
/// `RUST_LOG`, when set, replaces the configured level.
pub fn init(level: &str, log_file: &Path) -> Result<WorkerGuard, LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let directives = filter_directives(level);
            EnvFilter::try_new(&directives).map_err(|e| LoggingError::Filter {
                filter: directives,
                reason: e.to_string(),
            })?
        }
    };

    let file_name = log_file
        .file_name()
        .ok_or_else(|| LoggingError::Path(log_file.display().to_string()))?;
    let dir = match log_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_filter_directives_quiet_http_stack() {
        let directives = filter_directives(" debug ");
        assert!(directives.starts_with("debug,"));
        assert!(directives.contains("reqwest=warn"));
        assert!(directives.contains("hyper=warn"));
        assert!(EnvFilter::try_new(&directives).is_ok());
    }

    #[test]
    fn test_init_creates_log_directory() {
        let temp_dir = TempDir::new().unwrap();
        let log_file = temp_dir.path().join("logs").join("rostergate.log");

        let guard = init("info", &log_file).unwrap();
        tracing::info!("logging initialized");
        drop(guard);

        assert!(log_file.parent().unwrap().is_dir());
    }

    #[test]
    fn test_init_rejects_path_without_file_name() {
        assert!(matches!(
            init("info", Path::new("/")),
            Err(LoggingError::Path(_))
        ));
    }
}
