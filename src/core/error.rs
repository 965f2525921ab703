//! Error types for the shim
//!
//! Native operations return `OsResult`; the legacy surface in
//! [`crate::compat`] folds these back into pass/fail codes and null handles.

use core::fmt;

/// Shim error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum OsError {
    // ============ Kernel binding ============
    /// No host kernel has been bound with `kernel::init`
    OsNotInit = 100,
    /// A different host kernel is already bound
    OsRunning = 101,

    // ============ Resource errors ============
    /// Stack or control-block allocation failed
    NoMemory = 200,

    // ============ Handle errors ============
    /// Null or already freed handle
    InvalidHandle = 300,
    /// Handle kind does not match the operation
    TypeMismatch = 301,
    /// Argument out of range
    InvalidParameter = 302,

    // ============ Wait errors ============
    /// Blocking wait passed its deadline
    Timeout = 400,
    /// Non-blocking attempt found the object busy
    WouldBlock = 401,
    /// Queue or semaphore is at capacity
    Full = 402,
    /// Queue or semaphore holds nothing
    Empty = 403,

    // ============ Ownership errors ============
    /// Caller does not own the recursive mutex
    NotOwner = 500,

    // ============ Context errors ============
    /// Operation may not be called from interrupt context
    IsrContext = 600,
    /// Operation has no host equivalent
    UnsupportedOperation = 601,
}

/// Result type alias for shim operations
pub type OsResult<T> = Result<T, OsError>;

impl OsError {
    /// Numeric error code
    #[inline]
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Short human-readable description
    pub fn as_str(self) -> &'static str {
        match self {
            OsError::OsNotInit => "host kernel not bound",
            OsError::OsRunning => "another host kernel is already bound",
            OsError::NoMemory => "out of memory",
            OsError::InvalidHandle => "invalid handle",
            OsError::TypeMismatch => "handle kind mismatch",
            OsError::InvalidParameter => "invalid parameter",
            OsError::Timeout => "timed out",
            OsError::WouldBlock => "would block",
            OsError::Full => "full",
            OsError::Empty => "empty",
            OsError::NotOwner => "caller is not the owner",
            OsError::IsrContext => "not allowed from interrupt context",
            OsError::UnsupportedOperation => "unsupported operation",
        }
    }
}

impl fmt::Display for OsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_str(), self.code())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for OsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_grouped() {
        assert_eq!(OsError::NoMemory.code(), 200);
        assert_eq!(OsError::TypeMismatch.code() / 100, 3);
        assert_eq!(OsError::Timeout.code() / 100, 4);
        assert_eq!(OsError::UnsupportedOperation.code() / 100, 6);
    }

    #[cfg(feature = "std")]
    #[test]
    fn display_includes_code() {
        let text = std::format!("{}", OsError::NotOwner);
        assert_eq!(text, "caller is not the owner (500)");
    }
}
