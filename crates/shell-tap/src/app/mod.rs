#![expect(clippy::print_stderr, reason = "CLI error output is emitted here")]

//! CLI application layer and composition root wiring.

use anyhow::Result;
use clap::Parser;
use tracing::debug;

pub mod commands;

use crate::app::commands::Cli;
use crate::app::commands::Commands;
use crate::common::ProxyError;
use crate::common::telemetry;
use crate::infra::proxy::ProxyConfig;
use crate::infra::proxy::ProxyDriver;
use crate::infra::proxy::session;
use crate::infra::terminal::NativePtySpawner;

const PROGRAM_NAME: &str = "shell-tap";

/// Exit codes following sysexits.h conventions.
mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const UNAVAILABLE: i32 = 69;
    pub const IOERR: i32 = 74;
}

pub struct Application;

impl Application {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&self) -> Result<i32> {
        let cli = Cli::parse();
        let _telemetry = telemetry::init_tracing(cli.debug);
        let exit_code = match self.execute(&cli) {
            Ok(()) => exit_codes::SUCCESS,
            Err(e) => handle_error(&e),
        };
        Ok(exit_code)
    }

    fn execute(&self, cli: &Cli) -> Result<()> {
        match &cli.command {
            Commands::Proxy {
                log_file,
                session_id,
                max_lines,
            } => {
                let session_id = session::resolve_session_id(session_id.as_deref());
                let mut config = ProxyConfig::from_env()
                    .with_session_id(session_id)
                    .with_max_lines(*max_lines);
                if let Some(path) = log_file {
                    config = config.with_log_file(path.clone());
                }
                debug!(
                    log_file = %config.log_file().display(),
                    session_id = config.session_id(),
                    max_lines = config.max_lines(),
                    shell = config.shell(),
                    "Starting proxy subcommand"
                );

                let driver = ProxyDriver::new(NativePtySpawner, config);
                match driver.run() {
                    Ok(outcome) => {
                        debug!(?outcome, "Proxy finished");
                        Ok(())
                    }
                    // Contention means the session is already being
                    // recorded; nothing to do.
                    Err(e) if e.is_benign() => {
                        debug!(error = %e, "Proxy is a no-op");
                        Ok(())
                    }
                    Err(e) => Err(e.into()),
                }
            }
        }
    }
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

fn handle_error(e: &anyhow::Error) -> i32 {
    if let Some(proxy_error) = e.downcast_ref::<ProxyError>() {
        eprintln!("{}: Error: {}", PROGRAM_NAME, proxy_error);
        if let Some(suggestion) = proxy_error.suggestion() {
            eprintln!("Suggestion: {}", suggestion);
        }
        return exit_code_for(proxy_error);
    }
    eprintln!("{}: Error: {}", PROGRAM_NAME, e);
    exit_codes::GENERAL_ERROR
}

fn exit_code_for(error: &ProxyError) -> i32 {
    match error {
        ProxyError::AlreadyRunning => exit_codes::SUCCESS,
        ProxyError::Spawn(_) => exit_codes::UNAVAILABLE,
        ProxyError::Lock { .. } | ProxyError::LogOpen { .. } => exit_codes::IOERR,
        ProxyError::Terminal(_) | ProxyError::SignalSetup(_) => exit_codes::GENERAL_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            exit_code_for(&ProxyError::AlreadyRunning),
            exit_codes::SUCCESS
        );
        assert_eq!(
            exit_code_for(&ProxyError::Spawn("missing".to_string())),
            exit_codes::UNAVAILABLE
        );
        assert_eq!(
            exit_code_for(&ProxyError::Lock {
                operation: "create lock file",
                source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
            }),
            exit_codes::IOERR
        );
    }

    #[test]
    fn test_handle_error_maps_proxy_errors() {
        let err = anyhow::Error::new(ProxyError::Spawn("missing".to_string()));
        assert_eq!(handle_error(&err), exit_codes::UNAVAILABLE);

        let err = anyhow::anyhow!("something else");
        assert_eq!(handle_error(&err), exit_codes::GENERAL_ERROR);
    }
}
