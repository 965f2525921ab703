//! Critical section handling
//!
//! A critical section masks interrupts and holds a [`PortMux`]. Nesting is
//! counted per task, not per region: the interrupt mask is captured on the
//! caller's first `enter` and restored on its last `exit`, whichever
//! regions were used in between.

use portable_atomic::{AtomicU32, AtomicUsize, Ordering};
use spin::Once;

use alloc::boxed::Box;

use crate::config::CFG_MAX_TASKS;
use crate::kernel;
use crate::port::{HostKernel, NativeRecursiveMutex};
use crate::types::{IrqState, TaskId};

// ============ Per-task state ============

/// Nesting depth and saved mask of one task
struct CriticalSlot {
    depth: AtomicU32,
    saved: AtomicUsize,
}

impl CriticalSlot {
    const IDLE: Self = CriticalSlot {
        depth: AtomicU32::new(0),
        saved: AtomicUsize::new(0),
    };
}

/// Indexed by task id, slot 0 belongs to interrupt context
static SLOTS: [CriticalSlot; CFG_MAX_TASKS + 1] = [CriticalSlot::IDLE; CFG_MAX_TASKS + 1];

fn slot_of(id: TaskId) -> &'static CriticalSlot {
    match usize::try_from(id).ok().and_then(|index| SLOTS.get(index)) {
        Some(slot) => slot,
        None => panic!("critical section from unknown task {}", id),
    }
}

/// Forget any nesting left behind by a previous owner of `id`
pub(crate) fn reset_task(id: TaskId) {
    if let Some(slot) = usize::try_from(id).ok().and_then(|index| SLOTS.get(index)) {
        slot.depth.store(0, Ordering::Relaxed);
        slot.saved.store(0, Ordering::Relaxed);
    }
}

/// Nesting depth of the calling task
pub fn nesting() -> u32 {
    match kernel::host() {
        Ok(host) => slot_of(host.thread_current()).depth.load(Ordering::Relaxed),
        Err(_) => 0,
    }
}

// ============ Region lock ============

/// Lock guarding a critical region (`portMUX_TYPE`)
///
/// Backed by a host recursive mutex created on first use, so a task may
/// enter the same region again while holding it.
pub struct PortMux {
    lock: Once<Box<dyn NativeRecursiveMutex>>,
}

impl PortMux {
    pub const fn new() -> Self {
        PortMux { lock: Once::new() }
    }

    fn native(&self, host: &dyn HostKernel) -> &dyn NativeRecursiveMutex {
        &**self.lock.call_once(|| host.recursive_mutex_new())
    }

    /// Take the region lock without touching the interrupt mask
    pub fn acquire(&self) {
        let host = kernel::host_or_panic();
        self.native(host).lock();
    }

    /// Release the region lock without touching the interrupt mask
    pub fn release(&self) {
        let host = kernel::host_or_panic();
        self.native(host).unlock();
    }

    /// Task currently holding the region, negative when free
    pub fn owner(&self) -> TaskId {
        self.lock.get().map_or(-1, |lock| lock.owner())
    }
}

impl Default for PortMux {
    fn default() -> Self {
        Self::new()
    }
}

// ============ Enter / exit ============

/// Enter a critical section on `mux`
///
/// Masks interrupts, takes the region lock and bumps the calling task's
/// nesting depth. The pre-entry mask is saved only on the outermost entry.
pub fn enter(mux: &PortMux) {
    let host = kernel::host_or_panic();
    let state = host.irq_disable();
    mux.native(host).lock();

    let slot = slot_of(host.thread_current());
    let depth = slot.depth.load(Ordering::Relaxed);
    if depth == 0 {
        slot.saved.store(state.0, Ordering::Relaxed);
    }
    slot.depth.store(depth + 1, Ordering::Relaxed);
}

/// Leave a critical section on `mux`
///
/// The saved mask is restored when the calling task's depth returns to 0.
/// An exit without a matching enter asserts in debug builds and is ignored
/// otherwise.
pub fn exit(mux: &PortMux) {
    let host = kernel::host_or_panic();
    let slot = slot_of(host.thread_current());
    let depth = slot.depth.load(Ordering::Relaxed);
    if depth == 0 {
        debug_assert!(false, "critical section exit without enter");
        return;
    }

    mux.native(host).unlock();
    slot.depth.store(depth - 1, Ordering::Relaxed);
    if depth == 1 {
        host.irq_restore(IrqState(slot.saved.load(Ordering::Relaxed)));
    }
}

/// Mask interrupts without a region lock (`portENTER_CRITICAL_NESTED`)
pub fn enter_nested() -> IrqState {
    kernel::host_or_panic().irq_disable()
}

/// Restore the mask returned by [`enter_nested`]
pub fn exit_nested(state: IrqState) {
    kernel::host_or_panic().irq_restore(state);
}

/// Check if currently executing in an ISR context
#[inline]
pub fn is_isr_context() -> bool {
    kernel::host().map_or(false, |host| host.in_isr())
}

// ============ Scoped helpers ============

/// RAII guard for critical sections
///
/// Entered on creation, left on drop.
pub struct CriticalSection<'a> {
    mux: &'a PortMux,
}

impl<'a> CriticalSection<'a> {
    #[inline]
    pub fn enter(mux: &'a PortMux) -> Self {
        enter(mux);
        CriticalSection { mux }
    }
}

impl Drop for CriticalSection<'_> {
    #[inline]
    fn drop(&mut self) {
        exit(self.mux);
    }
}

/// Execute a closure inside a critical section on `mux`
#[inline]
pub fn with_critical<F, R>(mux: &PortMux, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _cs = CriticalSection::enter(mux);
    f()
}
