use super::{flag, pass, BaseType_t, TickType_t, UBaseType_t};
use crate::error::{OsError, OsResult};
use crate::timer::{self, TimerCallback, TimerHandle};

pub type TimerHandle_t = Option<TimerHandle>;
pub type TimerCallbackFunction_t = TimerCallback;

fn resolve(handle: impl Into<TimerHandle_t>) -> OsResult<TimerHandle> {
    handle.into().ok_or(OsError::InvalidHandle)
}

/// Create a dormant timer, auto-reloading when `uxAutoReload` is non-zero
pub fn xTimerCreate(
    pcTimerName: &str,
    xTimerPeriod: TickType_t,
    uxAutoReload: UBaseType_t,
    pvTimerID: *mut (),
    pxCallbackFunction: TimerCallbackFunction_t,
) -> TimerHandle_t {
    timer::create(
        pcTimerName,
        xTimerPeriod,
        uxAutoReload != 0,
        pvTimerID,
        pxCallbackFunction,
    )
    .ok()
}

pub fn xTimerDelete(xTimer: impl Into<TimerHandle_t>, xBlockTime: TickType_t) -> BaseType_t {
    pass(resolve(xTimer).and_then(|t| timer::delete(t, xBlockTime)))
}

pub fn xTimerStart(xTimer: impl Into<TimerHandle_t>, xBlockTime: TickType_t) -> BaseType_t {
    pass(resolve(xTimer).and_then(|t| timer::start(t, xBlockTime)))
}

pub fn xTimerStop(xTimer: impl Into<TimerHandle_t>, xBlockTime: TickType_t) -> BaseType_t {
    pass(resolve(xTimer).and_then(|t| timer::stop(t, xBlockTime)))
}

pub fn xTimerReset(xTimer: impl Into<TimerHandle_t>, xBlockTime: TickType_t) -> BaseType_t {
    pass(resolve(xTimer).and_then(|t| timer::reset(t, xBlockTime)))
}

pub fn xTimerChangePeriod(
    xTimer: impl Into<TimerHandle_t>,
    xNewPeriod: TickType_t,
    xBlockTime: TickType_t,
) -> BaseType_t {
    pass(resolve(xTimer).and_then(|t| timer::change_period(t, xNewPeriod, xBlockTime)))
}

pub fn xTimerIsTimerActive(xTimer: impl Into<TimerHandle_t>) -> BaseType_t {
    flag(resolve(xTimer).and_then(timer::is_active).unwrap_or(false))
}

pub fn xTimerGetPeriod(xTimer: impl Into<TimerHandle_t>) -> TickType_t {
    resolve(xTimer).and_then(timer::period).unwrap_or(0)
}

/// User data of a timer, null for an invalid handle
pub fn pvTimerGetTimerID(xTimer: impl Into<TimerHandle_t>) -> *mut () {
    resolve(xTimer)
        .and_then(timer::get_id)
        .unwrap_or(core::ptr::null_mut())
}

pub fn vTimerSetTimerID(xTimer: impl Into<TimerHandle_t>, pvNewID: *mut ()) {
    if let Ok(handle) = resolve(xTimer) {
        let _ = timer::set_id(handle, pvNewID);
    }
}
