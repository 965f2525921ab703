//! Task management module
//!
//! Creates host threads for legacy task entry points and keeps a record of
//! each one. The host can only terminate the calling thread, so deletion
//! is limited to self-deletion and anything else fails loudly.

mod tcb;

pub use tcb::{bounded_name, Name, TaskRecord, TaskStack};

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::cell::RefCell;

use critical_section::Mutex;

use crate::config::{CFG_MAX_TASKS, CFG_TASK_OVERHEAD};
use crate::critical;
use crate::error::{OsError, OsResult};
use crate::kernel;
use crate::port::{HostKernel, ThreadParams};
use crate::prio;
use crate::types::{thread_flags, HostPrio, Priority, TaskFn, TaskId};

pub use crate::time::{delay, tick_count};

/// Handle of a host thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TaskHandle(TaskId);

impl TaskHandle {
    /// Wrap a host thread id, `None` for negative ids
    pub fn from_id(id: TaskId) -> Option<Self> {
        (id >= 0).then_some(TaskHandle(id))
    }

    #[inline]
    pub fn id(self) -> TaskId {
        self.0
    }
}

// ============ Records ============

struct Slot {
    record: Option<TaskRecord>,
    /// The creator has stored the host id, the slot may not be reused
    /// before this is set
    published: bool,
}

impl Slot {
    const FREE: Self = Slot {
        record: None,
        published: false,
    };

    fn reusable(&self) -> bool {
        match &self.record {
            None => true,
            Some(record) => !record.alive && self.published,
        }
    }
}

static TASKS: Mutex<RefCell<[Slot; CFG_MAX_TASKS]>> =
    Mutex::new(RefCell::new([Slot::FREE; CFG_MAX_TASKS]));

/// Put `record` in a free slot, returning the slot and the record it evicted
fn claim_slot(record: TaskRecord) -> OsResult<(usize, Option<TaskRecord>)> {
    critical_section::with(|cs| {
        let mut slots = TASKS.borrow_ref_mut(cs);
        let (index, slot) = slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.reusable())
            .ok_or(OsError::NoMemory)?;
        slot.published = false;
        Ok((index, slot.record.replace(record)))
    })
}

fn with_slot<R>(index: usize, f: impl FnOnce(&mut Slot) -> R) -> R {
    critical_section::with(|cs| f(&mut TASKS.borrow_ref_mut(cs)[index]))
}

fn find<R>(id: TaskId, f: impl FnOnce(&TaskRecord) -> R) -> OsResult<R> {
    critical_section::with(|cs| {
        TASKS
            .borrow_ref(cs)
            .iter()
            .filter_map(|slot| slot.record.as_ref())
            .find(|record| record.alive && record.id == id)
            .map(f)
            .ok_or(OsError::InvalidHandle)
    })
}

fn slot_of(id: TaskId) -> Option<usize> {
    critical_section::with(|cs| {
        TASKS.borrow_ref(cs).iter().position(|slot| {
            slot.record
                .as_ref()
                .is_some_and(|record| record.alive && record.id == id)
        })
    })
}

// ============ Task start / end ============

/// Boxed start-up data passed through the host's `void *` argument
struct TaskStart {
    entry: TaskFn,
    args: usize,
    slot: usize,
}

fn trampoline(arg: *mut ()) {
    // Safety: `arg` is the box leaked by `spawn`, handed to this thread only
    let start = unsafe { Box::from_raw(arg as *mut TaskStart) };
    let TaskStart { entry, args, slot } = *start;

    let host = kernel::host_or_panic();
    let me = host.thread_current();
    critical::reset_task(me);
    with_slot(slot, |s| {
        if let Some(record) = s.record.as_mut() {
            record.id = me;
        }
    });

    entry(args as *mut ());
    finish(host, slot)
}

/// Mark the task's record dead and end the thread
///
/// Interrupts stay masked from here on so nothing can reuse the stack
/// before the host has switched away from it.
fn finish(host: &dyn HostKernel, slot: usize) -> ! {
    let _ = host.irq_disable();
    with_slot(slot, |s| {
        if let Some(record) = s.record.as_mut() {
            record.alive = false;
        }
    });
    crate::debug!("task in slot {} exited", slot);
    host.thread_exit()
}

fn alloc_stack(stack_size: usize) -> OsResult<Box<[u8]>> {
    let size = stack_size
        .checked_add(CFG_TASK_OVERHEAD)
        .ok_or(OsError::NoMemory)?;
    let mut buf = Vec::new();
    buf.try_reserve_exact(size).map_err(|_| OsError::NoMemory)?;
    buf.resize(size, 0u8);
    Ok(buf.into_boxed_slice())
}

fn spawn(
    host: &dyn HostKernel,
    entry: TaskFn,
    name: &str,
    mut stack: TaskStack,
    args: *mut (),
    priority: Priority,
) -> OsResult<TaskHandle> {
    if host.in_isr() {
        return Err(crate::os_err!(OsError::IsrContext, "task create"));
    }

    let mapped = prio::to_host(priority);
    let name = bounded_name(name);
    let stack_ptr = stack.as_mut_ptr();
    let stack_size = stack.len();

    let record = TaskRecord {
        id: -1,
        name: name.clone(),
        priority: mapped,
        stack,
        entry,
        args: args as usize,
        alive: true,
    };
    let (slot, evicted) = claim_slot(record).map_err(|e| crate::os_err!(e, "task slot"))?;
    drop(evicted);

    let start = Box::into_raw(Box::new(TaskStart {
        entry,
        args: args as usize,
        slot,
    }));
    let params = ThreadParams {
        stack: stack_ptr,
        stack_size,
        priority: mapped,
        flags: thread_flags::WOUT_YIELD | thread_flags::STACKTEST,
        entry: trampoline,
        arg: start as *mut (),
        name: name.as_str(),
    };

    // Safety: the stack is held by the record in `slot`, which is only
    // reclaimed once the task has finished
    let id = unsafe { host.thread_create(params) };
    if id < 0 {
        // Safety: the host refused the thread, the box was never handed over
        drop(unsafe { Box::from_raw(start) });
        with_slot(slot, |s| *s = Slot::FREE);
        return Err(crate::os_err!(OsError::NoMemory, "thread create"));
    }

    with_slot(slot, |s| {
        if let Some(record) = s.record.as_mut() {
            record.id = id;
        }
        s.published = true;
    });
    crate::debug!("task {} created, host prio {}", id, mapped);
    Ok(TaskHandle(id))
}

// ============ Public API ============

/// Create a task with a heap-allocated stack
///
/// # Arguments
/// * `entry` - Task entry point, the task ends when it returns
/// * `name` - Task name, truncated to `CFG_MAX_NAME_LEN` bytes
/// * `stack_size` - Stack size in bytes, `CFG_TASK_OVERHEAD` is added
/// * `args` - Argument passed to `entry`
/// * `priority` - Legacy priority (higher = more urgent)
///
/// # Returns
/// * `Ok(TaskHandle)` - Task created
/// * `Err(OsError::NoMemory)` - Stack, record or host thread unavailable
pub fn create(
    entry: TaskFn,
    name: &str,
    stack_size: usize,
    args: *mut (),
    priority: Priority,
) -> OsResult<TaskHandle> {
    let host = kernel::host()?;
    let stack = alloc_stack(stack_size).map_err(|e| crate::os_err!(e, "stack alloc"))?;
    spawn(host, entry, name, TaskStack::Owned(stack), args, priority)
}

/// [`create`] with a core affinity hint
///
/// The hint is ignored, the host runs a single scheduler.
pub fn create_pinned(
    entry: TaskFn,
    name: &str,
    stack_size: usize,
    args: *mut (),
    priority: Priority,
    _core: u32,
) -> OsResult<TaskHandle> {
    create(entry, name, stack_size, args, priority)
}

/// Create a task on a caller-supplied stack
///
/// Returns `None` if no buffer is given, `stack_size` does not fit it or
/// the host refuses the thread.
pub fn create_static(
    entry: TaskFn,
    name: &str,
    stack: Option<&'static mut [u8]>,
    stack_size: usize,
    args: *mut (),
    priority: Priority,
) -> Option<TaskHandle> {
    let Some(stack) = stack else {
        crate::debug!("static task create without a stack buffer");
        return None;
    };
    if stack_size == 0 || stack_size > stack.len() {
        crate::debug!("static task stack size {} out of range", stack_size);
        return None;
    }
    let (stack, _) = stack.split_at_mut(stack_size);
    let host = kernel::host().ok()?;
    spawn(host, entry, name, TaskStack::Borrowed(stack), args, priority).ok()
}

/// Delete a task
///
/// `None` or the caller's own handle terminates the caller. The host
/// cannot stop another thread, so any other target panics with
/// `UnsupportedOperation`.
///
/// On a thread the shim did not create the outcome is up to the host's
/// `thread_exit`. The hosted kernel panics there with `UnsupportedOperation`.
pub fn delete(handle: Option<TaskHandle>) -> ! {
    let host = kernel::host_or_panic();
    let me = host.thread_current();
    if let Some(target) = handle {
        if target.0 != me {
            crate::error!("task {} cannot delete task {}", me, target.0);
            panic!(
                "deleting task {} from task {}: {}",
                target.0,
                me,
                OsError::UnsupportedOperation
            );
        }
    }

    match slot_of(me) {
        Some(slot) => finish(host, slot),
        None => {
            // Not one of ours, the host decides
            let _ = host.irq_disable();
            host.thread_exit()
        }
    }
}

/// Handle of the calling task
pub fn current_handle() -> TaskHandle {
    TaskHandle(kernel::host_or_panic().thread_current())
}

/// Host priority a task runs at
pub fn priority(handle: TaskHandle) -> OsResult<HostPrio> {
    find(handle.0, |record| record.priority)
}

/// Name a task was created with
pub fn name(handle: TaskHandle) -> OsResult<Name> {
    find(handle.0, |record| record.name.clone())
}

/// Check if a task created by the shim is still running
pub fn is_alive(handle: TaskHandle) -> bool {
    find(handle.0, |_| ()).is_ok()
}

/// Number of live tasks created by the shim
pub fn count() -> usize {
    critical_section::with(|cs| {
        TASKS
            .borrow_ref(cs)
            .iter()
            .filter(|slot| slot.record.as_ref().is_some_and(|r| r.alive))
            .count()
    })
}
