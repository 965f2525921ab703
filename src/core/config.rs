//! Compile-time configuration for the shim
//!
//! These constants control priority mapping, tick conversion and the sizes
//! of the bounded tables the shim keeps.

/// Number of priority levels shared by the legacy and host numbering
pub const CFG_PRIO_LEVELS: usize = 16;

/// Maximum number of concurrently live tasks (host pids 1..=CFG_MAX_TASKS)
pub const CFG_MAX_TASKS: usize = 32;

/// Length of one legacy tick in milliseconds
pub const CFG_TICK_PERIOD_MS: u32 = 10;

/// Legacy tick rate in Hz
pub const CFG_TICK_RATE_HZ: u32 = 1000 / CFG_TICK_PERIOD_MS;

/// Timeout sentinel meaning "block until available"
pub const CFG_MAX_DELAY: u32 = u32::MAX;

/// Bytes added to every heap stack for the host's thread control block
pub const CFG_TASK_OVERHEAD: usize = 256;

/// Maximum task and timer name length in bytes, longer names are truncated
pub const CFG_MAX_NAME_LEN: usize = 16;

/// Number of live semaphores, mutexes and queues
pub const CFG_MAX_SYNC_OBJECTS: usize = 64;

/// Number of live software timers
pub const CFG_MAX_TIMERS: usize = 32;

/// Legacy priority of the timer service task
pub const CFG_TIMER_TASK_PRIO: u32 = 1;

/// Stack size of the timer service task
pub const CFG_TIMER_TASK_STACK: usize = 2048;

/// Pending expiries the timer service can hold
pub const CFG_TIMER_QUEUE_LEN: usize = 16;

/// Smallest stack the hosted kernel gives a std thread
pub const CFG_HOSTED_MIN_STACK: usize = 64 * 1024;

const _: () = assert!(CFG_PRIO_LEVELS > 0 && CFG_PRIO_LEVELS <= u8::MAX as usize);
const _: () = assert!(CFG_MAX_TASKS < i32::MAX as usize);
const _: () = assert!(CFG_TICK_PERIOD_MS > 0 && 1000 % CFG_TICK_PERIOD_MS == 0);
