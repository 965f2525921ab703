//! Priority mapping between the legacy and host conventions
//!
//! Legacy priorities grow with urgency (`0` is the idle level), host
//! priorities shrink with urgency (`0` is the most urgent). The two are
//! mirrored across `CFG_PRIO_LEVELS`:
//!
//! ```text
//! legacy:  0   1   ...  L-2  L-1
//! host:   L-1 L-2  ...   1    0
//! ```

use crate::config::CFG_PRIO_LEVELS;
use crate::types::{HostPrio, Priority};

/// Highest legacy priority
pub const PRIO_MAX: Priority = CFG_PRIO_LEVELS as Priority - 1;

/// Map a legacy priority to the host's numbering
///
/// Out-of-range priorities clamp to host priority 0, the most urgent level.
#[inline]
pub const fn to_host(prio: Priority) -> HostPrio {
    if prio >= CFG_PRIO_LEVELS as Priority {
        0
    } else {
        (CFG_PRIO_LEVELS as Priority - prio - 1) as HostPrio
    }
}

/// Map a host priority back to the legacy numbering
#[inline]
pub const fn from_host(prio: HostPrio) -> Priority {
    if prio as usize >= CFG_PRIO_LEVELS {
        0
    } else {
        CFG_PRIO_LEVELS as Priority - prio as Priority - 1
    }
}
