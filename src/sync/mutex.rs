//! Mutex and recursive mutex
//!
//! A plain mutex wraps a host mutex with no owner tracking, so `give` from
//! any task or interrupt handler unlocks it. Legacy code that hands a mutex
//! across tasks keeps working; code that relies on the owner check of a
//! real mutex must use the recursive variant.
//!
//! A recursive mutex keeps its owner and reentry count next to the host
//! lock. Only the outermost take locks the host lock and only the matching
//! last give unlocks it.

use alloc::boxed::Box;

use portable_atomic::{AtomicI32, AtomicU32, Ordering};

use crate::error::{OsError, OsResult};
use crate::kernel;
use crate::port::{HostKernel, NativeMutex, NativeRecursiveMutex};
use crate::sync::{acquire_recursive, SemaphoreHandle, SyncObject};
use crate::time::Wait;

/// Recursive mutex control block
pub(crate) struct RecursiveMutex {
    lock: Box<dyn NativeRecursiveMutex>,
    owner: AtomicI32,
    refcount: AtomicU32,
}

impl RecursiveMutex {
    pub(crate) fn new(host: &dyn HostKernel) -> Self {
        RecursiveMutex {
            lock: host.recursive_mutex_new(),
            owner: AtomicI32::new(-1),
            refcount: AtomicU32::new(0),
        }
    }

    pub(crate) fn take(&self, host: &dyn HostKernel, wait: Wait) -> OsResult<()> {
        let me = host.thread_current();
        let held = self.refcount.load(Ordering::Acquire);
        if held > 0 && self.owner.load(Ordering::Acquire) == me {
            self.refcount.store(held + 1, Ordering::Release);
            return Ok(());
        }

        if !acquire_recursive(&*self.lock, wait) {
            return Err(wait.failure(OsError::WouldBlock));
        }
        self.owner.store(me, Ordering::Release);
        self.refcount.store(1, Ordering::Release);
        Ok(())
    }

    pub(crate) fn give(&self, host: &dyn HostKernel) -> OsResult<()> {
        let me = host.thread_current();
        let held = self.refcount.load(Ordering::Acquire);
        if held == 0 || self.owner.load(Ordering::Acquire) != me {
            return Err(OsError::NotOwner);
        }

        if held == 1 {
            assert!(
                self.lock.refcount() > 0,
                "recursive mutex released more often than taken"
            );
            self.owner.store(-1, Ordering::Release);
            self.refcount.store(0, Ordering::Release);
            self.lock.unlock();
        } else {
            self.refcount.store(held - 1, Ordering::Release);
        }
        Ok(())
    }

    /// 1 when free, 0 when held
    pub(crate) fn count(&self) -> u32 {
        (self.refcount.load(Ordering::Acquire) == 0) as u32
    }

    pub(crate) fn refcount(&self) -> u32 {
        self.refcount.load(Ordering::Acquire)
    }
}

/// 1 when unlocked, 0 when locked
pub(crate) fn mutex_count(lock: &dyn NativeMutex) -> u32 {
    (!lock.is_locked()) as u32
}

/// Create a mutex, initially unlocked
pub fn create_mutex() -> OsResult<SemaphoreHandle> {
    let host = kernel::host()?;
    let handle = SemaphoreHandle::insert(SyncObject::Mutex(host.mutex_new()))?;
    crate::debug!("mutex {} created", handle.raw());
    Ok(handle)
}

/// Create a recursive mutex, initially free
pub fn create_recursive_mutex() -> OsResult<SemaphoreHandle> {
    let host = kernel::host()?;
    let handle = SemaphoreHandle::insert(SyncObject::RecursiveMutex(RecursiveMutex::new(host)))?;
    crate::debug!("recursive mutex {} created", handle.raw());
    Ok(handle)
}

/// Take a recursive mutex
///
/// The owner re-enters immediately, whatever the timeout. Anyone else
/// waits for the host lock under the usual timeout rules.
///
/// # Returns
/// * `Err(OsError::TypeMismatch)` - Handle is not a recursive mutex
/// * `Err(OsError::WouldBlock)` - Held elsewhere and `ticks` was 0
/// * `Err(OsError::Timeout)` - Still held elsewhere at the deadline
pub fn take_recursive(handle: SemaphoreHandle, ticks: crate::types::Tick) -> OsResult<()> {
    let object = crate::sync::lookup(handle)?;
    let mutex = object.as_recursive()?;
    let wait = crate::sync::wait_for(ticks)?;
    mutex.take(kernel::host()?, wait)
}

/// Give a recursive mutex back
///
/// # Returns
/// * `Err(OsError::TypeMismatch)` - Handle is not a recursive mutex
/// * `Err(OsError::NotOwner)` - Caller does not hold it
pub fn give_recursive(handle: SemaphoreHandle) -> OsResult<()> {
    let object = crate::sync::lookup(handle)?;
    let mutex = object.as_recursive()?;
    mutex
        .give(kernel::host()?)
        .map_err(|e| crate::os_err!(e, "give recursive"))
}
