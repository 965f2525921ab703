//! FreeRTOS compatibility shim
//!
//! Lets code written against the FreeRTOS task/semaphore/queue/timer API run
//! on a different host real-time kernel. Every legacy call is re-expressed in
//! terms of the host's native threads, mutexes, recursive mutexes and
//! one-shot alarms:
//! - Tagged synchronization handles (mutex, recursive mutex, counting
//!   semaphore, queue)
//! - Task lifecycle adapter with priority-inversion mapping
//! - Per-task nested critical sections
//! - Software timers serviced by a dedicated task
//!
//! The host is bound once with [`kernel::init`]. With the `std` feature a
//! hosted reference kernel ([`port::hosted::HOSTED`]) is available.

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

// ============ Critical Section ============

#[cfg(all(target_arch = "arm", feature = "single-core"))]
mod cs_impl {
    use cortex_m::interrupt;
    use cortex_m::register::primask;
    use critical_section::{set_impl, Impl, RawRestoreState};

    struct SingleCoreCriticalSection;
    set_impl!(SingleCoreCriticalSection);

    unsafe impl Impl for SingleCoreCriticalSection {
        unsafe fn acquire() -> RawRestoreState {
            let was_active = primask::read().is_active();
            interrupt::disable();
            was_active
        }

        unsafe fn release(was_active: RawRestoreState) {
            if was_active {
                unsafe { interrupt::enable() }
            }
        }
    }
}

// ============ Modules ============

pub mod log;

pub mod core;
pub mod sync;
pub mod port;

#[cfg(feature = "timers")]
pub mod timer;

#[cfg(feature = "event-groups")]
pub mod event_groups;

pub mod compat;

// ============ Re-exports ============

pub use self::core::config;
pub use self::core::config::*;
pub use self::core::critical;
pub use self::core::error;
pub use self::core::error::{OsError, OsResult};
pub use self::core::kernel;
pub use self::core::kernel::init;
pub use self::core::prio;
pub use self::core::types;
pub use self::core::types::*;
pub use self::core::task;
pub use self::core::time;

pub use sync::queue;
pub use sync::SemaphoreHandle;
