//! Hosted reference kernel on top of `std`
//!
//! Tasks are std threads, native mutexes are `Mutex<bool>` + `Condvar`
//! pairs and every armed alarm is a sleeper thread. Task ids come from a
//! bounded pid table `1..=CFG_MAX_TASKS`; threads the shim did not create
//! (test harness threads, `main`) get a pid on first use and give it back
//! when they end. Alarm callbacks run with the interrupt flag set and
//! report pid 0.
//!
//! The caller-supplied stack and the host priority are accepted and not
//! used: std threads bring their own stack and the OS scheduler decides.

use std::boxed::Box;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::string::String;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::{CFG_HOSTED_MIN_STACK, CFG_MAX_TASKS};
use crate::error::OsError;
use crate::port::{
    AlarmFn, HostKernel, NativeAlarm, NativeMutex, NativeRecursiveMutex, ThreadParams,
};
use crate::types::{IrqState, Micros, TaskId};

/// Pid reported inside alarm callbacks
pub const ISR_PID: TaskId = 0;

/// The hosted kernel instance, pass it to [`crate::kernel::init`]
pub static HOSTED: HostedKernel = HostedKernel {
    pids: Mutex::new([false; CFG_MAX_TASKS + 1]),
    origin: spin::Once::new(),
};

/// Hosted kernel state
pub struct HostedKernel {
    pids: Mutex<[bool; CFG_MAX_TASKS + 1]>,
    origin: spin::Once<Instant>,
}

/// Unwind payload of a self-terminating task
struct TaskExit;

/// Raw task argument moved into the task thread
struct SendPtr(*mut ());

// The pointer is only handed back to the task entry, which owns it
unsafe impl Send for SendPtr {}

impl SendPtr {
    fn into_inner(self) -> *mut () {
        self.0
    }
}

/// Pid of the current thread, released when the thread ends
struct PidSlot(Cell<TaskId>);

impl Drop for PidSlot {
    fn drop(&mut self) {
        let pid = self.0.replace(-1);
        if pid > 0 {
            HOSTED.release_pid(pid);
        }
    }
}

thread_local! {
    static PID: PidSlot = const { PidSlot(Cell::new(-1)) };
    static IRQ_ENABLED: Cell<bool> = const { Cell::new(true) };
    static IN_ISR: Cell<bool> = const { Cell::new(false) };
    /// Set on threads started by `thread_create`
    static IS_TASK: Cell<bool> = const { Cell::new(false) };
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl HostedKernel {
    fn alloc_pid(&self) -> Option<TaskId> {
        let mut pids = lock(&self.pids);
        let free = pids.iter().skip(1).position(|used| !used)? + 1;
        pids[free] = true;
        Some(free as TaskId)
    }

    fn release_pid(&self, pid: TaskId) {
        if let Some(used) = lock(&self.pids).get_mut(pid as usize) {
            *used = false;
        }
    }

    /// Number of pids currently handed out
    pub fn live_pids(&self) -> usize {
        lock(&self.pids).iter().filter(|used| **used).count()
    }

    fn wait_deadline<'a, T>(
        &self,
        cond: &Condvar,
        guard: MutexGuard<'a, T>,
        deadline: Micros,
    ) -> Option<MutexGuard<'a, T>> {
        let now = self.now_us();
        if now >= deadline {
            return None;
        }
        let (guard, _) = cond
            .wait_timeout(guard, Duration::from_micros(deadline - now))
            .unwrap_or_else(PoisonError::into_inner);
        Some(guard)
    }
}

impl HostKernel for HostedKernel {
    fn mutex_new(&self) -> Box<dyn NativeMutex> {
        Box::new(HostedMutex::default())
    }

    fn recursive_mutex_new(&self) -> Box<dyn NativeRecursiveMutex> {
        Box::new(HostedRecursiveMutex::default())
    }

    fn alarm_new(&self, callback: AlarmFn, arg: usize) -> Box<dyn NativeAlarm> {
        Box::new(HostedAlarm {
            shared: Arc::new(AlarmShared {
                generation: Mutex::new(0),
                callback,
                arg,
            }),
        })
    }

    unsafe fn thread_create(&self, params: ThreadParams<'_>) -> TaskId {
        let Some(pid) = self.alloc_pid() else {
            return -1;
        };
        let entry = params.entry;
        let arg = SendPtr(params.arg);

        let spawned = thread::Builder::new()
            .name(String::from(params.name))
            .stack_size(params.stack_size.max(CFG_HOSTED_MIN_STACK))
            .spawn(move || {
                let arg = arg.into_inner();
                PID.with(|slot| slot.0.set(pid));
                IS_TASK.with(|flag| flag.set(true));
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| entry(arg)));
                // Task is finished, the pid is free for the next create
                PID.with(|slot| slot.0.set(-1));
                HOSTED.release_pid(pid);
                if let Err(payload) = outcome {
                    if !payload.is::<TaskExit>() {
                        panic::resume_unwind(payload);
                    }
                }
            });

        match spawned {
            Ok(_) => pid,
            Err(_) => {
                self.release_pid(pid);
                -1
            }
        }
    }

    fn thread_current(&self) -> TaskId {
        if IN_ISR.with(Cell::get) {
            return ISR_PID;
        }
        PID.try_with(|slot| {
            let pid = slot.0.get();
            if pid > 0 {
                return pid;
            }
            match self.alloc_pid() {
                Some(pid) => {
                    slot.0.set(pid);
                    pid
                }
                None => -1,
            }
        })
        .unwrap_or(-1)
    }

    /// Only threads from `thread_create` can exit, any other thread panics
    fn thread_exit(&self) -> ! {
        if !IS_TASK.with(Cell::get) {
            crate::error!("thread_exit on a thread the hosted kernel did not start");
            panic!(
                "thread {} was not started by the hosted kernel and cannot exit: {}",
                self.thread_current(),
                OsError::UnsupportedOperation
            );
        }
        panic::resume_unwind(Box::new(TaskExit))
    }

    fn thread_sleep_us(&self, us: Micros) {
        thread::sleep(Duration::from_micros(us));
    }

    fn irq_disable(&self) -> IrqState {
        IrqState(IRQ_ENABLED.with(|flag| flag.replace(false)) as usize)
    }

    fn irq_restore(&self, state: IrqState) {
        IRQ_ENABLED.with(|flag| flag.set(state.0 != 0));
    }

    fn irq_is_enabled(&self) -> bool {
        IRQ_ENABLED.with(Cell::get)
    }

    fn in_isr(&self) -> bool {
        IN_ISR.with(Cell::get)
    }

    fn now_us(&self) -> Micros {
        self.origin.call_once(Instant::now).elapsed().as_micros() as Micros
    }
}

// ============ Mutex ============

#[derive(Default)]
struct HostedMutex {
    locked: Mutex<bool>,
    cond: Condvar,
}

impl NativeMutex for HostedMutex {
    fn lock(&self) {
        let mut locked = lock(&self.locked);
        while *locked {
            locked = self.cond.wait(locked).unwrap_or_else(PoisonError::into_inner);
        }
        *locked = true;
    }

    fn try_lock(&self) -> bool {
        let mut locked = lock(&self.locked);
        !core::mem::replace(&mut *locked, true)
    }

    fn lock_until(&self, deadline: Micros) -> bool {
        let mut locked = lock(&self.locked);
        loop {
            if !*locked {
                *locked = true;
                return true;
            }
            match HOSTED.wait_deadline(&self.cond, locked, deadline) {
                Some(guard) => locked = guard,
                None => return false,
            }
        }
    }

    fn unlock(&self) {
        *lock(&self.locked) = false;
        self.cond.notify_one();
    }

    fn is_locked(&self) -> bool {
        *lock(&self.locked)
    }
}

// ============ Recursive mutex ============

struct Ownership {
    owner: TaskId,
    count: u32,
}

struct HostedRecursiveMutex {
    state: Mutex<Ownership>,
    cond: Condvar,
}

impl Default for HostedRecursiveMutex {
    fn default() -> Self {
        Self {
            state: Mutex::new(Ownership { owner: -1, count: 0 }),
            cond: Condvar::new(),
        }
    }
}

impl HostedRecursiveMutex {
    fn try_acquire(state: &mut Ownership, me: TaskId) -> bool {
        if state.count == 0 {
            state.owner = me;
            state.count = 1;
            true
        } else if state.owner == me {
            state.count += 1;
            true
        } else {
            false
        }
    }
}

impl NativeRecursiveMutex for HostedRecursiveMutex {
    fn lock(&self) {
        let me = HOSTED.thread_current();
        let mut state = lock(&self.state);
        while !Self::try_acquire(&mut state, me) {
            state = self.cond.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn try_lock(&self) -> bool {
        let me = HOSTED.thread_current();
        Self::try_acquire(&mut lock(&self.state), me)
    }

    fn lock_until(&self, deadline: Micros) -> bool {
        let me = HOSTED.thread_current();
        let mut state = lock(&self.state);
        loop {
            if Self::try_acquire(&mut state, me) {
                return true;
            }
            match HOSTED.wait_deadline(&self.cond, state, deadline) {
                Some(guard) => state = guard,
                None => return false,
            }
        }
    }

    fn unlock(&self) {
        let me = HOSTED.thread_current();
        let mut state = lock(&self.state);
        if state.owner != me || state.count == 0 {
            return;
        }
        state.count -= 1;
        if state.count == 0 {
            state.owner = -1;
            drop(state);
            self.cond.notify_one();
        }
    }

    fn owner(&self) -> TaskId {
        let state = lock(&self.state);
        if state.count == 0 {
            -1
        } else {
            state.owner
        }
    }

    fn refcount(&self) -> u32 {
        lock(&self.state).count
    }
}

// ============ Alarm ============

struct AlarmShared {
    /// Bumped by every set/cancel, a sleeper only fires if it still matches
    generation: Mutex<u64>,
    callback: AlarmFn,
    arg: usize,
}

struct HostedAlarm {
    shared: Arc<AlarmShared>,
}

impl NativeAlarm for HostedAlarm {
    fn set(&self, offset: Micros) {
        let generation = {
            let mut current = lock(&self.shared.generation);
            *current += 1;
            *current
        };
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(String::from("alarm"))
            .spawn(move || {
                thread::sleep(Duration::from_micros(offset));
                if *lock(&shared.generation) != generation {
                    return;
                }
                IN_ISR.with(|flag| flag.set(true));
                IRQ_ENABLED.with(|flag| flag.set(false));
                (shared.callback)(shared.arg);
            });
        if spawned.is_err() {
            crate::error!("alarm thread spawn failed");
        }
    }

    fn cancel(&self) {
        *lock(&self.shared.generation) += 1;
    }
}

impl Drop for HostedAlarm {
    fn drop(&mut self) {
        self.cancel();
    }
}
