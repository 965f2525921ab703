//! Host kernel binding
//!
//! The shim holds exactly one [`HostKernel`] for the life of the program.
//! Every entry point resolves it through [`host`], which fails with
//! `OsNotInit` until [`init`] has run.

use spin::Once;

use crate::error::{OsError, OsResult};
use crate::port::HostKernel;

static HOST: Once<&'static dyn HostKernel> = Once::new();

/// Bind the shim to `kernel`
///
/// Calling `init` again with the same kernel is a no-op.
///
/// # Returns
/// * `Ok(())` - Bound
/// * `Err(OsError::OsRunning)` - A different kernel is already bound
pub fn init(kernel: &'static dyn HostKernel) -> OsResult<()> {
    let bound = *HOST.call_once(|| kernel);
    if core::ptr::addr_eq(bound as *const dyn HostKernel, kernel as *const dyn HostKernel) {
        crate::info!("host kernel bound");
        Ok(())
    } else {
        Err(OsError::OsRunning)
    }
}

/// Check if a host kernel is bound
#[inline]
pub fn is_initialized() -> bool {
    HOST.is_completed()
}

/// The bound host kernel
#[inline]
pub fn host() -> OsResult<&'static dyn HostKernel> {
    HOST.get().copied().ok_or(OsError::OsNotInit)
}

/// The bound host kernel, for paths that cannot report an error
pub(crate) fn host_or_panic() -> &'static dyn HostKernel {
    match host() {
        Ok(host) => host,
        Err(err) => panic!("{}", err),
    }
}
