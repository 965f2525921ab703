//! Event groups
//!
//! The host has no event-flag primitive the legacy semantics can be built
//! on, so every call panics with `UnsupportedOperation`. The functions
//! exist so legacy code links and fails at the first use instead.

use crate::error::OsError;
use crate::types::Tick;

/// Event bit mask
pub type EventBits = u32;

/// Handle of an event group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventGroupHandle(u32);

fn unsupported(what: &str) -> ! {
    crate::error!("event groups are not supported");
    panic!("event group {}: {}", what, OsError::UnsupportedOperation)
}

pub fn create() -> EventGroupHandle {
    unsupported("create")
}

pub fn delete(_group: EventGroupHandle) {
    unsupported("delete")
}

pub fn set_bits(_group: EventGroupHandle, _bits: EventBits) -> EventBits {
    unsupported("set bits")
}

pub fn clear_bits(_group: EventGroupHandle, _bits: EventBits) -> EventBits {
    unsupported("clear bits")
}

pub fn wait_bits(
    _group: EventGroupHandle,
    _bits: EventBits,
    _clear_on_exit: bool,
    _wait_for_all: bool,
    _ticks: Tick,
) -> EventBits {
    unsupported("wait bits")
}
