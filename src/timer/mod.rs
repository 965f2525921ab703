//! Software timers
//!
//! Each timer owns a host one-shot alarm. On expiry the alarm callback runs
//! in interrupt context: it re-arms an auto-reload timer for another period
//! straight away, so a slow callback never pushes the next expiry back, and
//! posts the timer's handle to the expiry queue. A dedicated low-priority
//! service task drains that queue and runs the user callbacks, so every
//! callback runs in the same task context.

use alloc::boxed::Box;
use core::num::NonZeroU32;
use core::ptr;

use portable_atomic::{AtomicPtr, AtomicU32, AtomicU64, Ordering};
use spin::Once;

use crate::config::{
    CFG_MAX_TIMERS, CFG_TIMER_QUEUE_LEN, CFG_TIMER_TASK_PRIO, CFG_TIMER_TASK_STACK,
};
use crate::core::registry::Registry;
use crate::error::{OsError, OsResult};
use crate::kernel;
use crate::port::{HostKernel, NativeAlarm, NativeMutex};
use crate::sync::queue::RawQueue;
use crate::task::{self, bounded_name, Name, TaskHandle};
use crate::time::{ticks_to_us, Wait};
use crate::types::Tick;

/// Handle of a software timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerHandle(NonZeroU32);

impl TimerHandle {
    /// Rebuild a handle from [`raw`](Self::raw), `None` for 0
    pub fn from_raw(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(TimerHandle)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0.get()
    }
}

/// Timer callback, runs on the timer service task
pub type TimerCallback = fn(TimerHandle);

/// Armed flag in [`TimerRecord::state`]
const ARMED: u32 = 1;
/// One arming in [`TimerRecord::state`], the bits above [`ARMED`] count them
const EPOCH: u32 = 2;

struct TimerRecord {
    name: Name,
    /// Period in ticks, never 0
    period: AtomicU32,
    auto_reload: bool,
    /// User data, see [`get_id`]
    id: AtomicPtr<()>,
    callback: TimerCallback,
    /// [`ARMED`] plus the arming count, bumped by every start and stop
    state: AtomicU32,
    /// Host time the current arming expires at
    deadline: AtomicU64,
    /// Serialises start, stop and delete against each other
    lock: Box<dyn NativeMutex>,
    alarm: Once<Box<dyn NativeAlarm>>,
}

impl TimerRecord {
    fn serialized<R>(&self, f: impl FnOnce() -> R) -> R {
        self.lock.lock();
        let result = f();
        self.lock.unlock();
        result
    }

    fn is_armed(&self) -> bool {
        self.state.load(Ordering::SeqCst) & ARMED != 0
    }

    /// Set the alarm one period out
    ///
    /// `publish` runs after the new deadline is visible and before the alarm
    /// is set.
    fn arm(&self, host: &dyn HostKernel, publish: impl FnOnce()) {
        let offset = ticks_to_us(self.period.load(Ordering::Acquire));
        self.deadline
            .store(host.now_us().saturating_add(offset), Ordering::SeqCst);
        publish();
        if let Some(alarm) = self.alarm.get() {
            alarm.set(offset);
        }
    }

    fn start(&self, host: &dyn HostKernel) {
        self.serialized(|| {
            self.arm(host, || {
                let next = (self.state.load(Ordering::SeqCst) | ARMED).wrapping_add(EPOCH);
                self.state.store(next, Ordering::SeqCst);
            });
        });
    }

    fn stop(&self) {
        self.serialized(|| {
            let next = (self.state.load(Ordering::SeqCst) & !ARMED).wrapping_add(EPOCH);
            self.state.store(next, Ordering::SeqCst);
            if let Some(alarm) = self.alarm.get() {
                alarm.cancel();
            }
        });
    }
}

static TIMERS: Registry<TimerRecord, CFG_MAX_TIMERS> = Registry::new();

// ============ Expiry path ============

/// Handles of expired timers, raw `u32` words
static EXPIRED: Once<RawQueue> = Once::new();
static SERVICE: Once<TaskHandle> = Once::new();

/// Alarm callback, interrupt context
///
/// An expiry that lands while `start` is replacing the arming belongs to the
/// old arming: it still reports the expiry but leaves the new arming alone.
/// The old arming's alarm always fires before the new deadline.
fn on_expiry(arg: usize) {
    let Some(handle) = TimerHandle::from_raw(arg as u32) else {
        return;
    };
    let Ok(timer) = TIMERS.get(handle.0) else {
        return;
    };
    let Ok(host) = kernel::host() else {
        return;
    };
    let seen = timer.state.load(Ordering::SeqCst);
    if seen & ARMED == 0 {
        return;
    }
    let current = host.now_us() >= timer.deadline.load(Ordering::SeqCst);
    if current {
        if timer.auto_reload {
            timer.arm(host, || {});
        } else {
            // A start or stop since the load keeps its own state
            let _ = timer.state.compare_exchange(
                seen,
                seen & !ARMED,
                Ordering::SeqCst,
                Ordering::SeqCst,
            );
        }
    }

    if let Some(queue) = EXPIRED.get() {
        let raw = handle.raw().to_ne_bytes();
        if queue.send(Some(&raw), Wait::Poll, false).is_err() {
            crate::warn!("timer {} expiry dropped, service queue full", handle.raw());
        }
    }
}

fn service_task(_: *mut ()) {
    let Some(queue) = EXPIRED.get() else {
        return;
    };
    let mut raw = [0u8; 4];
    loop {
        if queue.receive(Some(&mut raw), Wait::Forever).is_err() {
            continue;
        }
        let Some(handle) = TimerHandle::from_raw(u32::from_ne_bytes(raw)) else {
            continue;
        };
        // Deleted while the expiry was queued
        let Ok(timer) = TIMERS.get(handle.0) else {
            continue;
        };
        // Stopped after the alarm fired
        if timer.auto_reload && !timer.is_armed() {
            continue;
        }
        (timer.callback)(handle);
    }
}

/// Start the service task on first use
fn ensure_service() -> OsResult<()> {
    EXPIRED.try_call_once(|| RawQueue::new(kernel::host()?, CFG_TIMER_QUEUE_LEN, 4, 0))?;
    SERVICE.try_call_once(|| {
        let handle = task::create(
            service_task,
            "tmr svc",
            CFG_TIMER_TASK_STACK,
            ptr::null_mut(),
            CFG_TIMER_TASK_PRIO,
        )?;
        crate::info!("timer service task {} started", handle.id());
        Ok::<_, OsError>(handle)
    })?;
    Ok(())
}

/// Service task handle, once any timer has been created
pub fn service_handle() -> Option<TaskHandle> {
    SERVICE.get().copied()
}

// ============ Public API ============

fn lookup(handle: TimerHandle) -> OsResult<alloc::sync::Arc<TimerRecord>> {
    TIMERS.get(handle.0)
}

/// Create a dormant timer
///
/// # Arguments
/// * `name` - Timer name, truncated to `CFG_MAX_NAME_LEN` bytes
/// * `period` - Period in ticks, must not be 0
/// * `auto_reload` - Re-arm after every expiry instead of firing once
/// * `id` - User data, see [`get_id`]
/// * `callback` - Runs on the timer service task at every expiry
///
/// # Returns
/// * `Err(OsError::InvalidParameter)` - `period` is 0
/// * `Err(OsError::NoMemory)` - No handle or service task available
pub fn create(
    name: &str,
    period: Tick,
    auto_reload: bool,
    id: *mut (),
    callback: TimerCallback,
) -> OsResult<TimerHandle> {
    if period == 0 {
        return Err(crate::os_err!(OsError::InvalidParameter, "timer create"));
    }
    let host = kernel::host()?;
    ensure_service().map_err(|e| crate::os_err!(e, "timer service start"))?;

    let record = TimerRecord {
        name: bounded_name(name),
        period: AtomicU32::new(period),
        auto_reload,
        id: AtomicPtr::new(id),
        callback,
        state: AtomicU32::new(0),
        deadline: AtomicU64::new(0),
        lock: host.mutex_new(),
        alarm: Once::new(),
    };
    let raw = TIMERS
        .insert(record)
        .map_err(|e| crate::os_err!(e, "timer create"))?;
    let handle = TimerHandle(raw);
    TIMERS
        .get(raw)?
        .alarm
        .call_once(|| host.alarm_new(on_expiry, handle.raw() as usize));
    crate::debug!("timer {} created, period {}", handle.raw(), period);
    Ok(handle)
}

/// Arm a timer to expire one period from now
///
/// Starting an armed timer restarts its period. The tick argument exists
/// for call compatibility and is ignored.
pub fn start(handle: TimerHandle, _ticks: Tick) -> OsResult<()> {
    let host = kernel::host()?;
    lookup(handle)?.start(host);
    Ok(())
}

/// Disarm a timer, stopping a stopped timer does nothing
pub fn stop(handle: TimerHandle, _ticks: Tick) -> OsResult<()> {
    lookup(handle)?.stop();
    Ok(())
}

/// Restart a timer's period, arming it if dormant
pub fn reset(handle: TimerHandle, ticks: Tick) -> OsResult<()> {
    start(handle, ticks)
}

/// Set a new period and (re)start the timer with it
pub fn change_period(handle: TimerHandle, period: Tick, _ticks: Tick) -> OsResult<()> {
    if period == 0 {
        return Err(OsError::InvalidParameter);
    }
    let host = kernel::host()?;
    let timer = lookup(handle)?;
    timer.period.store(period, Ordering::Release);
    timer.start(host);
    Ok(())
}

/// Stop a timer and free it
pub fn delete(handle: TimerHandle, _ticks: Tick) -> OsResult<()> {
    let timer = TIMERS
        .remove(handle.0)
        .map_err(|e| crate::os_err!(e, "timer delete"))?;
    timer.stop();
    crate::debug!("timer {} deleted", handle.raw());
    Ok(())
}

/// Check if a timer is armed
pub fn is_active(handle: TimerHandle) -> OsResult<bool> {
    Ok(lookup(handle)?.is_armed())
}

/// Period in ticks
pub fn period(handle: TimerHandle) -> OsResult<Tick> {
    Ok(lookup(handle)?.period.load(Ordering::Acquire))
}

/// Whether the timer re-arms itself
pub fn is_auto_reload(handle: TimerHandle) -> OsResult<bool> {
    Ok(lookup(handle)?.auto_reload)
}

/// Name the timer was created with
pub fn name(handle: TimerHandle) -> OsResult<Name> {
    Ok(lookup(handle)?.name.clone())
}

/// User data of a timer
///
/// Only the timer's own callback should change it while the timer is armed.
pub fn get_id(handle: TimerHandle) -> OsResult<*mut ()> {
    Ok(lookup(handle)?.id.load(Ordering::Acquire))
}

/// Replace the user data of a timer
pub fn set_id(handle: TimerHandle, id: *mut ()) -> OsResult<()> {
    lookup(handle)?.id.store(id, Ordering::Release);
    Ok(())
}
