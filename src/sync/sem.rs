//! Counting and binary semaphores
//!
//! A counting semaphore is a queue of zero-sized items whose capacity is
//! the semaphore's maximum count. Giving enqueues a unit, taking dequeues
//! one.

use crate::error::{OsError, OsResult};
use crate::kernel;
use crate::sync::queue::RawQueue;
use crate::sync::{SemaphoreHandle, SyncObject};

/// Create a counting semaphore holding `initial` of at most `max` units
///
/// # Returns
/// * `Err(OsError::InvalidParameter)` - `max` is 0 or `initial > max`
/// * `Err(OsError::NoMemory)` - No handle available
pub fn create_counting_semaphore(max: u32, initial: u32) -> OsResult<SemaphoreHandle> {
    if max == 0 || initial > max {
        return Err(crate::os_err!(OsError::InvalidParameter, "semaphore create"));
    }
    let host = kernel::host()?;
    let queue = RawQueue::new(host, max as usize, 0, initial as usize)?;
    let handle = SemaphoreHandle::insert(SyncObject::CountingSemaphore { queue, max })?;
    crate::debug!("semaphore {} created, {}/{}", handle.raw(), initial, max);
    Ok(handle)
}

/// Create a binary semaphore, initially empty
pub fn create_binary_semaphore() -> OsResult<SemaphoreHandle> {
    create_counting_semaphore(1, 0)
}

/// Maximum count of a counting semaphore
pub fn max_count(handle: SemaphoreHandle) -> OsResult<u32> {
    match &*crate::sync::lookup(handle)? {
        SyncObject::CountingSemaphore { max, .. } => Ok(*max),
        _ => Err(OsError::TypeMismatch),
    }
}
