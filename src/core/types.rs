//! Core type definitions for the shim

/// Legacy tick count (one tick = `CFG_TICK_PERIOD_MS`)
pub type Tick = u32;

/// Legacy priority (higher number = more urgent)
pub type Priority = u32;

/// Host priority (0 = most urgent)
pub type HostPrio = u8;

/// Host thread identifier, negative values mean "no thread"
pub type TaskId = i32;

/// Host monotonic time in microseconds
pub type Micros = u64;

/// Task entry point
pub type TaskFn = fn(*mut ());

/// Opaque interrupt mask returned by `HostKernel::irq_disable`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IrqState(pub usize);

/// Kind tag of a synchronization handle, fixed at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ObjKind {
    Mutex = 1,
    RecursiveMutex = 2,
    CountingSemaphore = 3,
    Queue = 4,
}

/// Host thread creation flags
pub mod thread_flags {
    /// Do not yield to the new thread even if it is more urgent
    pub const WOUT_YIELD: u32 = 0x4;
    /// Fill the stack with a marker for usage measurement
    pub const STACKTEST: u32 = 0x8;
}
