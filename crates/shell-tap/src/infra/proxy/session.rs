//! Session identity and session-scoped file paths.
//!
//! Every terminal gets its own transcript: paths are derived from a base
//! path plus a session id, and the id itself comes from the controlling
//! terminal device unless the caller supplies one.

use std::env;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;
use std::time::SystemTime;

use tracing::debug;

/// Environment variable carrying the session id into the spawned shell.
pub const SESSION_ID_ENV: &str = "SHELL_TAP_SESSION_ID";

/// Inserts `.<session_id>` immediately before the extension of `base`. An
/// empty id leaves the base path unchanged; an extensionless base gets the
/// id appended after a dot.
pub fn derive_sibling_path(base: &Path, session_id: &str) -> PathBuf {
    if session_id.is_empty() {
        return base.to_path_buf();
    }
    let name = base.file_name().and_then(OsStr::to_str).unwrap_or_default();
    let derived = match split_name(name) {
        (stem, Some(ext)) => format!("{stem}.{session_id}.{ext}"),
        (stem, None) => format!("{stem}.{session_id}"),
    };
    base.with_file_name(derived)
}

/// Lock file sitting next to the log: same name, `.lock` extension.
pub fn lock_path_for(log_file: &Path) -> PathBuf {
    log_file.with_extension("lock")
}

fn split_name(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    }
}

/// Resolution order: explicit override, the id exported by an enclosing
/// proxy, the controlling terminal's device name, and finally the PID.
pub fn resolve_session_id(explicit: Option<&str>) -> String {
    if let Some(id) = explicit {
        if !id.is_empty() {
            return id.to_string();
        }
    }
    if let Ok(id) = env::var(SESSION_ID_ENV) {
        if !id.is_empty() {
            return id;
        }
    }
    if let Some(name) = tty_device_name() {
        return name;
    }
    format!("pid_{}", std::process::id())
}

/// Name of the controlling terminal device, normalized for use inside a
/// file name. zsh exports `TTY`; other shells need the tty(1) probe.
fn tty_device_name() -> Option<String> {
    if let Ok(tty) = env::var("TTY") {
        if !tty.is_empty() {
            return Some(normalize_device_name(&tty));
        }
    }
    let output = Command::new("tty").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let path = String::from_utf8(output.stdout).ok()?;
    let path = path.trim();
    if path.is_empty() {
        return None;
    }
    Some(normalize_device_name(path))
}

fn normalize_device_name(path: &str) -> String {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.replace(['.', ':'], "_")
}

/// Deletes sibling session logs older than `max_age`. The literal base file
/// and anything that is not a regular file are left alone; per-entry errors
/// are skipped. Returns how many files were removed.
pub fn purge_stale_logs(base: &Path, max_age: Duration) -> io::Result<usize> {
    let dir = match base.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let base_name = base.file_name().and_then(OsStr::to_str).unwrap_or_default();
    let (stem, ext) = split_name(base_name);

    let Some(cutoff) = SystemTime::now().checked_sub(max_age) else {
        return Ok(0);
    };

    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let Ok(entry) = entry else { continue };
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name == base_name || !matches_sibling(name, stem, ext) {
            continue;
        }
        let Ok(meta) = entry.metadata() else { continue };
        if !meta.is_file() {
            continue;
        }
        let Ok(modified) = meta.modified() else { continue };
        if modified < cutoff && fs::remove_file(entry.path()).is_ok() {
            debug!(path = %entry.path().display(), "Removed stale session log");
            removed += 1;
        }
    }
    Ok(removed)
}

/// Matches `stem.<anything>.<ext>` (or `stem.<anything>` for extensionless
/// bases), the shape [`derive_sibling_path`] produces.
fn matches_sibling(name: &str, stem: &str, ext: Option<&str>) -> bool {
    let Some(rest) = name.strip_prefix(stem) else {
        return false;
    };
    let Some(rest) = rest.strip_prefix('.') else {
        return false;
    };
    match ext {
        Some(ext) => {
            rest.len() > ext.len() + 1
                && rest.ends_with(ext)
                && rest.as_bytes()[rest.len() - ext.len() - 1] == b'.'
        }
        None => !rest.is_empty(),
    }
}
