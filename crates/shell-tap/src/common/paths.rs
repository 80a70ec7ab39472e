//! Cache directory and default artifact locations.

use std::env;
use std::path::PathBuf;

const APP_DIR: &str = "shell-tap";

pub const PROXY_LOG_FILENAME: &str = "proxy.log";
pub const DEBUG_LOG_FILENAME: &str = "debug.log";

/// Per-user cache directory: `$XDG_CACHE_HOME/shell-tap`, falling back to
/// `~/.cache/shell-tap`, then a temp-dir location when no home is known.
pub fn cache_dir() -> PathBuf {
    if let Ok(dir) = env::var("XDG_CACHE_HOME") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir).join(APP_DIR);
        }
    }
    if let Ok(home) = env::var("HOME") {
        if !home.trim().is_empty() {
            return PathBuf::from(home).join(".cache").join(APP_DIR);
        }
    }
    env::temp_dir().join(APP_DIR)
}

pub fn default_proxy_log_file() -> PathBuf {
    cache_dir().join(PROXY_LOG_FILENAME)
}

pub fn default_debug_log_file() -> PathBuf {
    cache_dir().join(DEBUG_LOG_FILENAME)
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
            let prev = env::var(key).ok();
            // SAFETY: Test-only environment override.
            unsafe {
                env::set_var(key, value);
            }
            Self { key, prev }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(prev) = self.prev.take() {
                // SAFETY: Test-only environment restoration.
                unsafe {
                    env::set_var(self.key, prev);
                }
            } else {
                // SAFETY: Test-only environment cleanup.
                unsafe {
                    env::remove_var(self.key);
                }
            }
        }
    }

    #[test]
    fn test_cache_dir_honors_xdg_cache_home() {
        let _guard = EnvGuard::set("XDG_CACHE_HOME", "/tmp/xdg-test");
        assert_eq!(cache_dir(), PathBuf::from("/tmp/xdg-test/shell-tap"));
    }

    #[test]
    fn test_default_proxy_log_file_name() {
        let path = default_proxy_log_file();
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some(PROXY_LOG_FILENAME)
        );
    }
}
