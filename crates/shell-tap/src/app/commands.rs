use clap::Parser;
use clap::Subcommand;
use clap::ValueHint;
use std::path::PathBuf;

use crate::infra::proxy::DEFAULT_MAX_LINES;

const LONG_ABOUT: &str = "\
Record what happens in an interactive shell.\n\
\n\
shell-tap wraps your shell in a pseudo-terminal, mirrors everything to the\n\
real terminal, and keeps a bounded plain-text transcript on disk so that\n\
other tools can see what is currently on screen.";

#[derive(Parser)]
#[command(name = "shell-tap")]
#[command(author, version)]
#[command(about = "Shell session proxy with a bounded, normalized transcript")]
#[command(long_about = LONG_ABOUT)]
#[command(subcommand_required = true, arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging (written to the cache directory, never stdout)
    #[arg(short, long, global = true, help_heading = "Debug Options")]
    pub debug: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Wrap the login shell in a recording pseudo-terminal session
    #[command(long_about = "\
Wrap the login shell in a recording pseudo-terminal session.

The proxy mirrors all input and output to the real terminal while keeping
the last N lines of normalized output in a session-scoped transcript file.
Only one proxy runs per session; a second invocation exits quietly.")]
    Proxy {
        /// Transcript file path (a session-scoped sibling is derived from it)
        #[arg(short = 'l', long, value_name = "PATH", value_hint = ValueHint::FilePath)]
        log_file: Option<PathBuf>,

        /// Session identifier for log isolation (resolved from the
        /// controlling terminal when omitted)
        #[arg(long, value_name = "ID")]
        session_id: Option<String>,

        /// Maximum transcript lines to retain (0 keeps everything)
        #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_LINES)]
        max_lines: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_proxy_defaults() {
        let cli = Cli::try_parse_from(["shell-tap", "proxy"]).unwrap();
        match cli.command {
            Commands::Proxy {
                log_file,
                session_id,
                max_lines,
            } => {
                assert!(log_file.is_none());
                assert!(session_id.is_none());
                assert_eq!(max_lines, DEFAULT_MAX_LINES);
            }
        }
        assert!(!cli.debug);
    }

    #[test]
    fn test_proxy_flags() {
        let cli = Cli::try_parse_from([
            "shell-tap",
            "proxy",
            "-l",
            "/tmp/t.log",
            "--session-id",
            "abc",
            "--max-lines",
            "42",
            "--debug",
        ])
        .unwrap();
        match cli.command {
            Commands::Proxy {
                log_file,
                session_id,
                max_lines,
            } => {
                assert_eq!(log_file, Some(PathBuf::from("/tmp/t.log")));
                assert_eq!(session_id.as_deref(), Some("abc"));
                assert_eq!(max_lines, 42);
            }
        }
        assert!(cli.debug);
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(Cli::try_parse_from(["shell-tap"]).is_err());
    }
}
