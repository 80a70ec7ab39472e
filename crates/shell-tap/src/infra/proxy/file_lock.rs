//! Single-instance lock file with stale-lock recovery.

use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::ErrorKind;
use std::io::Write;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::path::PathBuf;

use tracing::debug;
use tracing::warn;

use crate::common::ProxyError;

/// Held for the lifetime of one proxy invocation. At most one live holder
/// per path: the file is created exclusively, flock'd, and stamped with the
/// holder's PID so a later acquirer can tell a crashed holder from a live
/// one.
#[derive(Debug)]
pub struct ProcessLock {
    file: File,
    path: PathBuf,
}

impl ProcessLock {
    pub fn acquire(path: &Path) -> Result<Self, ProxyError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| ProxyError::Lock {
                operation: "create lock directory",
                source: e,
            })?;
        }

        let file = match open_exclusive(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                if holder_is_alive(path) {
                    return Err(ProxyError::AlreadyRunning);
                }
                debug!(path = %path.display(), "Reclaiming stale lock file");
                let _ = fs::remove_file(path);
                // One retry only; losing the race twice is a hard error.
                open_exclusive(path).map_err(|e| ProxyError::Lock {
                    operation: "recreate lock file",
                    source: e,
                })?
            }
            Err(e) => {
                return Err(ProxyError::Lock {
                    operation: "create lock file",
                    source: e,
                });
            }
        };

        let fd = file.as_raw_fd();
        // SAFETY: `fd` comes from a file kept open for the lifetime of the
        // lock. LOCK_EX | LOCK_NB requests an exclusive, non-blocking lock.
        let rc = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
        if rc != 0 {
            let err = io::Error::last_os_error();
            let _ = fs::remove_file(path);
            return match err.raw_os_error() {
                Some(code) if code == libc::EWOULDBLOCK || code == libc::EAGAIN => {
                    Err(ProxyError::AlreadyRunning)
                }
                _ => Err(ProxyError::Lock {
                    operation: "flock lock file",
                    source: err,
                }),
            };
        }

        let mut file = file;
        if let Err(e) = writeln!(file, "{}", std::process::id()).and_then(|()| file.sync_all()) {
            let _ = fs::remove_file(path);
            return Err(ProxyError::Lock {
                operation: "write PID to lock file",
                source: e,
            });
        }

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }
}

impl Drop for ProcessLock {
    fn drop(&mut self) {
        // SAFETY: the fd stays valid until `self.file` drops below.
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "Failed to remove lock file");
            }
        }
    }
}

fn open_exclusive(path: &Path) -> io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}

/// Whether the PID recorded in the lock file names a live process.
/// Unreadable or unparsable contents count as "not alive" so the stale file
/// can be reclaimed.
fn holder_is_alive(path: &Path) -> bool {
    let Ok(contents) = fs::read_to_string(path) else {
        return false;
    };
    let Ok(pid) = contents.trim().parse::<i32>() else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    // SAFETY: signal 0 performs the liveness check without delivering
    // anything to the target process.
    unsafe { libc::kill(pid, 0) == 0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // Larger than any PID the kernel hands out (PID_MAX_LIMIT is 2^22).
    const DEAD_PID: &str = "2000000000";

    fn temp_lock_path() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.lock");
        (dir, path)
    }

    #[test]
    fn test_acquire_writes_own_pid() {
        let (_dir, path) = temp_lock_path();
        let _lock = ProcessLock::acquire(&path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let pid: u32 = contents.trim().parse().unwrap();
        assert_eq!(pid, std::process::id());
    }

    #[test]
    fn test_second_acquire_fails_while_held() {
        let (_dir, path) = temp_lock_path();
        let _lock = ProcessLock::acquire(&path).unwrap();

        match ProcessLock::acquire(&path) {
            Err(ProxyError::AlreadyRunning) => {}
            other => panic!("expected AlreadyRunning, got {other:?}"),
        }
    }

    #[test]
    fn test_release_allows_reacquisition() {
        let (_dir, path) = temp_lock_path();
        let lock = ProcessLock::acquire(&path).unwrap();
        drop(lock);

        assert!(!path.exists(), "lock file should be removed on release");
        let _lock = ProcessLock::acquire(&path).unwrap();
    }

    #[test]
    fn test_stale_lock_with_dead_pid_is_reclaimed() {
        let (_dir, path) = temp_lock_path();
        fs::write(&path, DEAD_PID).unwrap();

        let _lock = ProcessLock::acquire(&path).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.trim().parse::<u32>().unwrap(), std::process::id());
    }

    #[test]
    fn test_stale_lock_with_garbage_pid_is_reclaimed() {
        let (_dir, path) = temp_lock_path();
        fs::write(&path, "not-a-pid\n").unwrap();

        assert!(ProcessLock::acquire(&path).is_ok());
    }

    #[test]
    fn test_lock_recording_live_pid_is_contended() {
        let (_dir, path) = temp_lock_path();
        fs::write(&path, format!("{}\n", std::process::id())).unwrap();

        match ProcessLock::acquire(&path) {
            Err(ProxyError::AlreadyRunning) => {}
            other => panic!("expected AlreadyRunning, got {other:?}"),
        }
    }

    #[test]
    fn test_unusable_lock_directory_is_a_hard_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();

        // The parent of the lock path is a regular file, so the directory
        // can never be created, regardless of privileges.
        let path = blocker.join("nested").join("test.lock");
        match ProcessLock::acquire(&path) {
            Err(ProxyError::Lock { .. }) => {}
            other => panic!("expected Lock error, got {other:?}"),
        }
    }
}
