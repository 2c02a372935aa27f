use std::sync::{Mutex, MutexGuard};

use tracing::warn;

/// Lock `lock`, recovering the guard if a previous holder panicked.
pub(crate) fn mutex_lock<'a, T>(
    lock: &'a Mutex<T>,
    target: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    lock.lock().unwrap_or_else(|poisoned| {
        warn!(
            op,
            target_module = target,
            lock_kind = "mutex.lock",
            result = "poisoned_recovered",
            "Recovered from poisoned render pool lock"
        );
        poisoned.into_inner()
    })
}
