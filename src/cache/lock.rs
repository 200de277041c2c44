//! Poison-recovering wrappers over std locks. A panicked holder poisons the
//! lock; cached state is reconstructible, so recovery beats propagating.

use std::sync::{Mutex, MutexGuard};

use tracing::warn;

pub(crate) fn mutex_lock<'a, T>(
    lock: &'a Mutex<T>,
    target: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                op,
                target,
                lock = "mutex",
                recovered = true,
                "poisoned lock recovered; state may lag a panicked writer"
            );
            poisoned.into_inner()
        }
    }
}
