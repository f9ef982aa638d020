//! Poison-tolerant lock helpers.
//!
//! A panic while a guard is held must not take every later reader down with
//! it: the guarded state is only mutated through plans that are fully computed
//! before the first write, so the data behind a poisoned lock is still usable.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::error;

pub(crate) fn acquire_read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| {
        error!("RwLock was poisoned on read, recovering");
        poisoned.into_inner()
    })
}

pub(crate) fn acquire_write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| {
        error!("RwLock was poisoned on write, recovering");
        poisoned.into_inner()
    })
}
