//! Synchronization primitives
//!
//! Mutexes, recursive mutexes, counting semaphores and queues share one
//! handle type. Each handle names a control block whose kind is fixed at
//! creation, and every operation checks the kind before touching it: using
//! a handle of the wrong kind fails with `TypeMismatch`.

pub mod mutex;
pub mod queue;
pub mod sem;

pub use mutex::{create_mutex, create_recursive_mutex, give_recursive, take_recursive};
pub use sem::{create_binary_semaphore, create_counting_semaphore, max_count};

use alloc::boxed::Box;
use alloc::sync::Arc;
use core::num::NonZeroU32;

use crate::config::CFG_MAX_SYNC_OBJECTS;
use crate::core::registry::Registry;
use crate::error::{OsError, OsResult};
use crate::kernel;
use crate::port::{NativeMutex, NativeRecursiveMutex};
use crate::time::Wait;
use crate::types::{ObjKind, Tick};

use mutex::{mutex_count, RecursiveMutex};
use queue::RawQueue;

// ============ Handles ============

/// Handle of a semaphore, mutex or queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SemaphoreHandle(NonZeroU32);

impl SemaphoreHandle {
    /// Rebuild a handle from [`raw`](Self::raw), `None` for 0
    pub fn from_raw(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(SemaphoreHandle)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0.get()
    }

    pub(crate) fn insert(object: SyncObject) -> OsResult<Self> {
        OBJECTS
            .insert(object)
            .map(SemaphoreHandle)
            .map_err(|e| crate::os_err!(e, "handle alloc"))
    }
}

/// Control block behind a [`SemaphoreHandle`]
pub(crate) enum SyncObject {
    Mutex(Box<dyn NativeMutex>),
    RecursiveMutex(RecursiveMutex),
    CountingSemaphore { queue: RawQueue, max: u32 },
    Queue(RawQueue),
}

impl SyncObject {
    pub(crate) fn kind(&self) -> ObjKind {
        match self {
            SyncObject::Mutex(_) => ObjKind::Mutex,
            SyncObject::RecursiveMutex(_) => ObjKind::RecursiveMutex,
            SyncObject::CountingSemaphore { .. } => ObjKind::CountingSemaphore,
            SyncObject::Queue(_) => ObjKind::Queue,
        }
    }

    pub(crate) fn as_recursive(&self) -> OsResult<&RecursiveMutex> {
        match self {
            SyncObject::RecursiveMutex(mutex) => Ok(mutex),
            _ => Err(OsError::TypeMismatch),
        }
    }

    /// Semaphores and queues share the queue implementation
    pub(crate) fn as_queue(&self) -> OsResult<&RawQueue> {
        match self {
            SyncObject::CountingSemaphore { queue, .. } | SyncObject::Queue(queue) => Ok(queue),
            _ => Err(OsError::TypeMismatch),
        }
    }
}

pub(crate) static OBJECTS: Registry<SyncObject, CFG_MAX_SYNC_OBJECTS> = Registry::new();

pub(crate) fn lookup(handle: SemaphoreHandle) -> OsResult<Arc<SyncObject>> {
    OBJECTS.get(handle.0)
}

// ============ Waiting ============

pub(crate) fn acquire(gate: &dyn NativeMutex, wait: Wait) -> bool {
    match wait {
        Wait::Poll => gate.try_lock(),
        Wait::Forever => {
            gate.lock();
            true
        }
        Wait::Until(deadline) => gate.lock_until(deadline),
    }
}

pub(crate) fn acquire_recursive(lock: &dyn NativeRecursiveMutex, wait: Wait) -> bool {
    match wait {
        Wait::Poll => lock.try_lock(),
        Wait::Forever => {
            lock.lock();
            true
        }
        Wait::Until(deadline) => lock.lock_until(deadline),
    }
}

/// Turn a tick timeout into a [`Wait`], refusing to block in an ISR
pub(crate) fn wait_for(ticks: Tick) -> OsResult<Wait> {
    let host = kernel::host()?;
    let wait = Wait::from_ticks(host, ticks);
    if host.in_isr() && !wait.is_poll() {
        return Err(crate::os_err!(OsError::IsrContext, "blocking wait"));
    }
    Ok(wait)
}

// ============ Operations ============

/// Release a mutex, recursive mutex, semaphore or queue
///
/// A mutex is unlocked whoever calls. A recursive mutex follows
/// [`give_recursive`]. Semaphores and queues gain one unit (a zeroed item
/// for queues) without blocking.
///
/// # Returns
/// * `Err(OsError::InvalidHandle)` - Handle was deleted
/// * `Err(OsError::NotOwner)` - Recursive mutex held by someone else
/// * `Err(OsError::Full)` - Semaphore at its maximum count
pub fn give(handle: SemaphoreHandle) -> OsResult<()> {
    let object = lookup(handle)?;
    let given = match &*object {
        SyncObject::Mutex(lock) => {
            lock.unlock();
            Ok(())
        }
        SyncObject::RecursiveMutex(mutex) => mutex.give(kernel::host()?),
        SyncObject::CountingSemaphore { queue, .. } | SyncObject::Queue(queue) => {
            queue.send(None, Wait::Poll, false).map(|_| ())
        }
    };
    given.map_err(|e| crate::os_err!(e, "give"))
}

/// Acquire a mutex, recursive mutex, semaphore or queue item
///
/// `ticks` of 0 tries once, `CFG_MAX_DELAY` waits forever and anything
/// else waits until that many ticks from now. A recursive mutex follows
/// [`take_recursive`]; a queue item taken this way is discarded.
///
/// # Returns
/// * `Err(OsError::WouldBlock)` - Mutex busy and `ticks` was 0
/// * `Err(OsError::Empty)` - Semaphore empty and `ticks` was 0
/// * `Err(OsError::Timeout)` - Deadline passed, nothing was taken
pub fn take(handle: SemaphoreHandle, ticks: Tick) -> OsResult<()> {
    let object = lookup(handle)?;
    let wait = wait_for(ticks)?;
    let taken = match &*object {
        SyncObject::Mutex(lock) => {
            if acquire(&**lock, wait) {
                Ok(())
            } else {
                Err(wait.failure(OsError::WouldBlock))
            }
        }
        SyncObject::RecursiveMutex(mutex) => mutex.take(kernel::host()?, wait),
        SyncObject::CountingSemaphore { queue, .. } | SyncObject::Queue(queue) => {
            queue.receive(None, wait).map(|_| ())
        }
    };
    if let Err(OsError::Timeout) = taken {
        crate::debug!("take on {} timed out", handle.raw());
    }
    taken
}

/// Available units
///
/// Mutexes report 1 when free and 0 when held; semaphores and queues the
/// number of queued units.
pub fn get_count(handle: SemaphoreHandle) -> OsResult<u32> {
    let object = lookup(handle)?;
    Ok(match &*object {
        SyncObject::Mutex(lock) => mutex_count(&**lock),
        SyncObject::RecursiveMutex(mutex) => mutex.count(),
        SyncObject::CountingSemaphore { queue, .. } | SyncObject::Queue(queue) => queue.len() as u32,
    })
}

/// Kind the handle was created as
pub fn kind(handle: SemaphoreHandle) -> OsResult<ObjKind> {
    Ok(lookup(handle)?.kind())
}

/// Reentry count of a recursive mutex
pub fn recursive_count(handle: SemaphoreHandle) -> OsResult<u32> {
    Ok(lookup(handle)?.as_recursive()?.refcount())
}

/// Give from an interrupt handler
///
/// Never blocks. Returns whether a waiting task may have been woken.
///
/// # Returns
/// * `Err(OsError::IsrContext)` - Recursive mutexes have an owner task
pub fn give_from_isr(handle: SemaphoreHandle) -> OsResult<bool> {
    let object = lookup(handle)?;
    match &*object {
        SyncObject::Mutex(lock) => {
            lock.unlock();
            Ok(true)
        }
        SyncObject::RecursiveMutex(_) => Err(OsError::IsrContext),
        SyncObject::CountingSemaphore { queue, .. } | SyncObject::Queue(queue) => {
            queue.send(None, Wait::Poll, false)
        }
    }
}

/// Take from an interrupt handler
///
/// Never blocks. Returns whether a waiting task may have been woken.
pub fn take_from_isr(handle: SemaphoreHandle) -> OsResult<bool> {
    let object = lookup(handle)?;
    match &*object {
        SyncObject::Mutex(lock) => {
            if lock.try_lock() {
                Ok(false)
            } else {
                Err(OsError::WouldBlock)
            }
        }
        SyncObject::RecursiveMutex(_) => Err(OsError::IsrContext),
        SyncObject::CountingSemaphore { queue, .. } | SyncObject::Queue(queue) => {
            queue.receive(None, Wait::Poll)
        }
    }
}

/// Delete a handle and release its host resources
///
/// Tasks still blocked on the handle are the caller's problem; the control
/// block itself lives until the last of them returns.
pub fn delete(handle: SemaphoreHandle) -> OsResult<()> {
    let object = OBJECTS
        .remove(handle.0)
        .map_err(|e| crate::os_err!(e, "delete"))?;
    crate::debug!("{} deleted", handle.raw());
    drop(object);
    Ok(())
}

/// Number of live semaphores, mutexes and queues
pub fn live_objects() -> usize {
    OBJECTS.len()
}
