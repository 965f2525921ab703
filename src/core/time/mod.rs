//! Time management module
//!
//! Converts legacy ticks to the host's microsecond clock and provides the
//! task delay and tick-count queries.

use crate::config::{CFG_MAX_DELAY, CFG_TICK_PERIOD_MS, CFG_TICK_RATE_HZ};
use crate::error::{OsError, OsResult};
use crate::kernel;
use crate::port::HostKernel;
use crate::types::{Micros, Tick};

/// How long a blocking call may wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// Try once, never block
    Poll,
    /// Block until available
    Forever,
    /// Block until the host clock reaches this instant
    Until(Micros),
}

impl Wait {
    /// Interpret a legacy timeout: `0` polls, `CFG_MAX_DELAY` waits forever
    pub fn from_ticks(host: &dyn HostKernel, ticks: Tick) -> Self {
        match ticks {
            0 => Wait::Poll,
            CFG_MAX_DELAY => Wait::Forever,
            _ => Wait::Until(host.now_us().saturating_add(ticks_to_us(ticks))),
        }
    }

    #[inline]
    pub fn is_poll(self) -> bool {
        self == Wait::Poll
    }

    /// Error reported when the wait gives up
    #[inline]
    pub(crate) fn failure(self, poll: OsError) -> OsError {
        match self {
            Wait::Poll => poll,
            _ => OsError::Timeout,
        }
    }
}

/// Convert ticks to host microseconds
#[inline]
pub const fn ticks_to_us(ticks: Tick) -> Micros {
    ticks as Micros * CFG_TICK_PERIOD_MS as Micros * 1000
}

/// Convert milliseconds to ticks, rounding down
#[inline]
pub const fn ms_to_ticks(ms: u32) -> Tick {
    ms / CFG_TICK_PERIOD_MS
}

/// Legacy tick rate
#[inline]
pub const fn tick_rate_hz() -> u32 {
    CFG_TICK_RATE_HZ
}

/// Core the caller runs on, always 0 on a single-scheduler host
#[inline]
pub const fn core_id() -> u32 {
    0
}

/// Ticks elapsed since the host clock started, wrapping at 32 bits
pub fn tick_count() -> OsResult<Tick> {
    let host = kernel::host()?;
    Ok((host.now_us() / 1000 / CFG_TICK_PERIOD_MS as Micros) as Tick)
}

/// Suspend the calling task for `ticks` ticks
///
/// # Returns
/// * `Ok(())` - Delay completed
/// * `Err(OsError::IsrContext)` - Cannot delay from an interrupt handler
pub fn delay(ticks: Tick) -> OsResult<()> {
    let host = kernel::host()?;
    if host.in_isr() {
        return Err(crate::os_err!(OsError::IsrContext, "delay"));
    }
    if ticks == 0 {
        return Ok(());
    }
    host.thread_sleep_us(ticks_to_us(ticks));
    Ok(())
}
