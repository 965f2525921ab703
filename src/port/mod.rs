//! Port layer - the host kernel primitives the shim is built on
//!
//! A host binds itself by implementing [`HostKernel`] and handing a
//! `'static` instance to [`crate::kernel::init`]. Everything the shim does
//! is expressed through these traits: blocking mutexes, recursive mutexes,
//! one-shot alarms, thread creation and the interrupt mask.

use alloc::boxed::Box;

use crate::types::{HostPrio, IrqState, Micros, TaskFn, TaskId};

#[cfg(feature = "std")]
pub mod hosted;

/// Blocking mutex without owner tracking
///
/// `unlock` may be called by any task or interrupt handler, and unlocking
/// an unlocked mutex is a no-op.
pub trait NativeMutex: Send + Sync {
    fn lock(&self);
    fn try_lock(&self) -> bool;
    /// Block until the mutex is acquired or the host clock passes
    /// `deadline`. A `false` return leaves the caller off the wait queue.
    fn lock_until(&self, deadline: Micros) -> bool;
    fn unlock(&self);
    fn is_locked(&self) -> bool;
}

/// Mutex the owning task may lock again without blocking
pub trait NativeRecursiveMutex: Send + Sync {
    fn lock(&self);
    fn try_lock(&self) -> bool;
    fn lock_until(&self, deadline: Micros) -> bool;
    fn unlock(&self);
    /// Owning task, negative when unlocked
    fn owner(&self) -> TaskId;
    fn refcount(&self) -> u32;
}

/// Alarm callback, runs in interrupt context
pub type AlarmFn = fn(usize);

/// One-shot alarm
pub trait NativeAlarm: Send + Sync {
    /// Fire once after `offset` microseconds. Setting a pending alarm
    /// replaces its expiry.
    fn set(&self, offset: Micros);
    fn cancel(&self);
}

/// Arguments of [`HostKernel::thread_create`]
pub struct ThreadParams<'a> {
    pub stack: *mut u8,
    pub stack_size: usize,
    pub priority: HostPrio,
    /// `types::thread_flags` bits
    pub flags: u32,
    pub entry: TaskFn,
    pub arg: *mut (),
    pub name: &'a str,
}

/// Host kernel binding
pub trait HostKernel: Sync {
    fn mutex_new(&self) -> Box<dyn NativeMutex>;
    fn recursive_mutex_new(&self) -> Box<dyn NativeRecursiveMutex>;
    fn alarm_new(&self, callback: AlarmFn, arg: usize) -> Box<dyn NativeAlarm>;

    /// Start a thread, returning its id or a negative value on failure.
    ///
    /// # Safety
    /// `params.stack` must stay valid for `params.stack_size` bytes until
    /// the thread has exited, and `params.arg` must be valid for `entry`.
    unsafe fn thread_create(&self, params: ThreadParams<'_>) -> TaskId;

    /// Id of the calling thread
    fn thread_current(&self) -> TaskId;
    /// Terminate the calling thread
    fn thread_exit(&self) -> !;
    fn thread_sleep_us(&self, us: Micros);

    /// Mask interrupts, returning the previous mask
    fn irq_disable(&self) -> IrqState;
    fn irq_restore(&self, state: IrqState);
    fn irq_is_enabled(&self) -> bool;
    fn in_isr(&self) -> bool;

    /// Free-running monotonic clock
    fn now_us(&self) -> Micros;
}
