use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("another proxy instance is already recording this session")]
    AlreadyRunning,
    #[error("failed to {operation}: {source}")]
    Lock {
        operation: &'static str,
        source: io::Error,
    },
    #[error("failed to open session log {}: {source}", path.display())]
    LogOpen { path: PathBuf, source: io::Error },
    #[error("failed to start shell under pty: {0}")]
    Spawn(String),
    #[error("terminal setup failed: {0}")]
    Terminal(String),
    #[error("failed to set up signal handling: {0}")]
    SignalSetup(String),
}

impl ProxyError {
    /// Outcomes the CLI treats as a successful no-op rather than a failure.
    pub fn is_benign(&self) -> bool {
        matches!(self, ProxyError::AlreadyRunning)
    }

    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            ProxyError::AlreadyRunning => None,
            ProxyError::Lock { .. } => Some(
                "Check permissions on the log directory, or remove a leftover .lock file next to the session log.",
            ),
            ProxyError::LogOpen { .. } => {
                Some("Check that the log directory exists and is writable.")
            }
            ProxyError::Spawn(_) => Some("Check that $SHELL points at an executable shell."),
            ProxyError::Terminal(_) | ProxyError::SignalSetup(_) => None,
        }
    }
}
