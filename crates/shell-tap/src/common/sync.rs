use std::sync::Mutex;
use std::sync::MutexGuard;

use tracing::error;

/// Locks a mutex, recovering the inner data if a previous holder panicked.
/// The proxy's shared state (the transcript ring, the pty writer) stays
/// usable even when one copy thread dies.
pub fn mutex_lock_or_recover<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(|poisoned| {
        error!(
            "Mutex poisoned - a thread panicked while holding this lock. \
             Data may be inconsistent. Attempting recovery."
        );
        poisoned.into_inner()
    })
}
