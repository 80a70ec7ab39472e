use thiserror::Error;

#[derive(Error, Debug)]
pub enum PtyError {
    #[error("failed to open pty: {0}")]
    Open(String),
    #[error("failed to spawn {command}: {reason}")]
    Spawn { command: String, reason: String },
    #[error("failed to resize pty: {0}")]
    Resize(String),
}
