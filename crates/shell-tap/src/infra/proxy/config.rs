//! Proxy configuration.

use std::env;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::common::paths;

pub const DEFAULT_MAX_LINES: usize = 100;
const DEFAULT_LOG_MAX_AGE_HOURS: u64 = 24;
const DEFAULT_SHELL: &str = "/bin/bash";

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    log_file: PathBuf,
    session_id: String,
    max_lines: usize,
    shell: String,
    log_max_age: Duration,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl ProxyConfig {
    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn max_lines(&self) -> usize {
        self.max_lines
    }

    pub fn shell(&self) -> &str {
        &self.shell
    }

    pub fn log_max_age(&self) -> Duration {
        self.log_max_age
    }

    pub fn from_env() -> Self {
        Self {
            log_file: paths::default_proxy_log_file(),
            session_id: String::new(),
            max_lines: parse_env_usize("SHELL_TAP_MAX_LINES", DEFAULT_MAX_LINES),
            shell: env::var("SHELL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_SHELL.to_string()),
            log_max_age: Duration::from_secs(
                parse_env_u64("SHELL_TAP_LOG_MAX_AGE_HOURS", DEFAULT_LOG_MAX_AGE_HOURS)
                    * 60
                    * 60,
            ),
        }
    }

    pub fn with_log_file(mut self, path: PathBuf) -> Self {
        self.log_file = path;
        self
    }

    pub fn with_session_id(mut self, session_id: String) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn with_max_lines(mut self, max_lines: usize) -> Self {
        self.max_lines = max_lines;
        self
    }

    pub fn with_shell(mut self, shell: String) -> Self {
        self.shell = shell;
        self
    }

    pub fn with_log_max_age(mut self, max_age: Duration) -> Self {
        self.log_max_age = max_age;
        self
    }
}

fn parse_env_usize(key: &str, default: usize) -> usize {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return default,
    };
    if value.trim().is_empty() {
        return default;
    }
    match value.parse::<usize>() {
        Ok(parsed) => parsed,
        Err(_) => {
            warn!(value = %value, key, "Invalid numeric config; using default");
            default
        }
    }
}

fn parse_env_u64(key: &str, default: u64) -> u64 {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return default,
    };
    if value.trim().is_empty() {
        return default;
    }
    match value.parse::<u64>() {
        Ok(parsed) => parsed,
        Err(_) => {
            warn!(value = %value, key, "Invalid numeric config; using default");
            default
        }
    }
}
