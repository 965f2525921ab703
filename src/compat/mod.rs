//! FreeRTOS-named API
//!
//! Thin wrappers over the native modules using the legacy names, types and
//! return conventions: creation returns a handle that is `None` on failure,
//! operations return `pdPASS`/`pdFAIL` (or the queue error codes), and
//! timeouts are tick counts with `portMAX_DELAY` meaning forever.
//!
//! Handle arguments accept either the bare handle or the nullable
//! `*Handle_t` form. `vTaskDelete` takes the nullable form only, so a bare
//! `None` still names the caller.

#![allow(non_snake_case, non_camel_case_types, non_upper_case_globals)]

mod port;
mod queue;
mod semphr;
mod task;
#[cfg(feature = "timers")]
mod timers;
#[cfg(feature = "event-groups")]
mod event_groups;

pub use port::*;
pub use queue::*;
pub use semphr::*;
pub use task::*;
#[cfg(feature = "timers")]
pub use timers::*;
#[cfg(feature = "event-groups")]
pub use event_groups::*;

use crate::config::{CFG_MAX_DELAY, CFG_PRIO_LEVELS, CFG_TICK_PERIOD_MS};
use crate::error::OsResult;

// ============ Base types ============

pub type BaseType_t = i32;
pub type UBaseType_t = u32;
pub type TickType_t = u32;
pub type StackType_t = u8;

pub const pdFALSE: BaseType_t = 0;
pub const pdTRUE: BaseType_t = 1;
pub const pdPASS: BaseType_t = pdTRUE;
pub const pdFAIL: BaseType_t = pdFALSE;

pub const errQUEUE_EMPTY: BaseType_t = 0;
pub const errQUEUE_FULL: BaseType_t = 0;
pub const errCOULD_NOT_ALLOCATE_REQUIRED_MEMORY: BaseType_t = pdFAIL;

pub const portMAX_DELAY: TickType_t = CFG_MAX_DELAY;
pub const portTICK_PERIOD_MS: TickType_t = CFG_TICK_PERIOD_MS;
pub const configMAX_PRIORITIES: UBaseType_t = CFG_PRIO_LEVELS as UBaseType_t;

fn pass(result: OsResult<()>) -> BaseType_t {
    match result {
        Ok(()) => pdPASS,
        Err(_) => pdFAIL,
    }
}

fn flag(value: bool) -> BaseType_t {
    if value {
        pdTRUE
    } else {
        pdFALSE
    }
}

/// Report an ISR wake-up through the optional out-parameter
fn woken(result: OsResult<bool>, out: Option<&mut BaseType_t>) -> OsResult<()> {
    let woke = result?;
    if let Some(out) = out {
        if woke {
            *out = pdTRUE;
        }
    }
    Ok(())
}
