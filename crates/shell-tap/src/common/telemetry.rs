#![expect(clippy::print_stderr, reason = "Tracing not initialized yet")]

//! Telemetry and tracing setup.
//!
//! Diagnostics never go to stdout: stdout belongs to the mirrored terminal
//! stream, and anything printed there would corrupt the interactive session.

use std::io::IsTerminal;
use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::common::paths;

#[derive(Debug)]
pub struct TelemetryGuard {
    _guard: Option<WorkerGuard>,
}

impl TelemetryGuard {
    fn disabled() -> Self {
        Self { _guard: None }
    }
}

/// Initializes tracing. Output goes to the file named by `SHELL_TAP_LOG`
/// (with `--debug`, defaulting to the cache-dir debug log) or to stderr.
pub fn init_tracing(debug: bool) -> TelemetryGuard {
    let default_level = if debug { "debug" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let log_format = log_format_from_env();
    let (writer, guard, ansi) = match log_file_path(debug) {
        Some(path) => {
            if let Some(dir) = path.parent() {
                let _ = std::fs::create_dir_all(dir);
            }
            match std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
            {
                Ok(file) => {
                    let (non_blocking, guard) = tracing_appender::non_blocking(file);
                    (BoxMakeWriter::new(non_blocking), Some(guard), false)
                }
                Err(err) => {
                    eprintln!(
                        "Warning: failed to open log file {}: {}",
                        path.display(),
                        err
                    );
                    (
                        BoxMakeWriter::new(std::io::stderr),
                        None,
                        std::io::stderr().is_terminal(),
                    )
                }
            }
        }
        None => (
            BoxMakeWriter::new(std::io::stderr),
            None,
            std::io::stderr().is_terminal(),
        ),
    };

    let subscriber: Box<dyn tracing::Subscriber + Send + Sync> = match log_format {
        LogFormat::Json => Box::new(
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_ansi(false)
                .json()
                .with_writer(writer)
                .finish(),
        ),
        LogFormat::Text => Box::new(
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_ansi(ansi)
                .with_writer(writer)
                .finish(),
        ),
    };

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return TelemetryGuard::disabled();
    }

    TelemetryGuard { _guard: guard }
}

fn log_file_path(debug: bool) -> Option<PathBuf> {
    if let Ok(path) = std::env::var("SHELL_TAP_LOG") {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    debug.then(paths::default_debug_log_file)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

fn log_format_from_env() -> LogFormat {
    match std::env::var("SHELL_TAP_LOG_FORMAT")
        .ok()
        .as_deref()
        .map(str::trim)
        .map(str::to_lowercase)
        .as_deref()
    {
        Some("json") => LogFormat::Json,
        _ => LogFormat::Text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EnvGuard {
        key: &'static str,
        prev: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let prev = std::env::var(key).ok();
            // SAFETY: Test-only environment override.
            unsafe {
                std::env::set_var(key, value);
            }
            Self { key, prev }
        }

        fn remove(key: &'static str) -> Self {
            let prev = std::env::var(key).ok();
            // SAFETY: Test-only environment override.
            unsafe {
                std::env::remove_var(key);
            }
            Self { key, prev }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(prev) = self.prev.take() {
                // SAFETY: Test-only environment restoration.
                unsafe {
                    std::env::set_var(self.key, prev);
                }
            } else {
                // SAFETY: Test-only environment cleanup.
                unsafe {
                    std::env::remove_var(self.key);
                }
            }
        }
    }

    #[test]
    fn test_log_format_parsing() {
        let _guard = EnvGuard::set("SHELL_TAP_LOG_FORMAT", "json");
        assert_eq!(log_format_from_env(), LogFormat::Json);

        let _guard = EnvGuard::set("SHELL_TAP_LOG_FORMAT", "text");
        assert_eq!(log_format_from_env(), LogFormat::Text);
    }

    #[test]
    fn test_log_format_defaults_to_text() {
        let _guard = EnvGuard::remove("SHELL_TAP_LOG_FORMAT");
        assert_eq!(log_format_from_env(), LogFormat::Text);
    }

    #[test]
    fn test_log_file_path_from_env() {
        let _guard = EnvGuard::set("SHELL_TAP_LOG", "/tmp/tap-test.log");
        assert_eq!(log_file_path(false), Some(PathBuf::from("/tmp/tap-test.log")));
    }

    #[test]
    fn test_log_file_path_defaults_to_debug_log_when_debugging() {
        let _guard = EnvGuard::remove("SHELL_TAP_LOG");
        assert_eq!(log_file_path(false), None);
        assert_eq!(log_file_path(true), Some(paths::default_debug_log_file()));
    }
}
