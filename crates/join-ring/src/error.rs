//! Error taxonomy shared by every ring-buffer discipline and memory backing.

use thiserror::Error;

/// The kind of failure a ring-buffer operation can report.
///
/// Hot-path functions return `Result<_, RingError>` (or a plain `bool`/`Option`
/// for the non-blocking `try_*` family) rather than threading a thread-local
/// "last error" slot through every call — see `DESIGN.md` for why this
/// departs from the C++ source's construction-exception model.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RingError {
    /// Null/empty argument, bad capacity, or mismatched shared-segment geometry.
    #[error("invalid parameter: {0}")]
    InvalidParam(&'static str),

    /// The queue is full (`try_push`) or empty (`try_pop`).
    #[error("queue temporarily unavailable")]
    TemporaryError,

    /// A blocking operation was invoked on an inert (moved-from or closed) queue.
    #[error("operation invoked on an inert queue")]
    OperationFailed,

    /// A `timed_push`/`timed_pop` deadline elapsed with no progress.
    #[error("operation timed out")]
    TimedOut,

    /// Allocation, `mmap`, or shared-segment creation failed.
    #[error("out of memory: {0}")]
    OutOfMemory(&'static str),

    /// Real-time scheduling, NUMA binding, or `mlock` was denied by the OS.
    #[error("permission denied: {0}")]
    PermissionDenied(&'static str),
}

impl RingError {
    /// True for failures a caller can reasonably retry (fullness/emptiness,
    /// timeouts). False for failures that mean the queue itself is unusable.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RingError::TemporaryError | RingError::TimedOut)
    }

    /// True for failures that mean this queue handle will never make
    /// progress again.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, RingError::OperationFailed)
    }
}
