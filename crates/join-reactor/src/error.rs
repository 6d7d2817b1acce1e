use thiserror::Error;

/// Failure registering a handler, running, or controlling a [`crate::Reactor`].
#[derive(Debug, Error)]
pub enum ReactorError {
    #[error("invalid parameter: {0}")]
    InvalidParam(&'static str),

    /// `run()` was called while the dispatch loop was already active.
    #[error("reactor is already running")]
    InUse,

    /// A submitted command was rejected by the dispatcher (closed reactor,
    /// unknown handler on delete, or a failing `epoll_ctl`).
    #[error("operation failed")]
    OperationFailed,

    #[error("out of memory: {0}")]
    OutOfMemory(&'static str),

    #[error("permission denied: {0}")]
    PermissionDenied(&'static str),

    #[error("OS call failed: {0}")]
    Os(#[source] std::io::Error),

    #[error(transparent)]
    Thread(#[from] join_thread::ThreadError),
}

impl From<join_ring::RingError> for ReactorError {
    fn from(err: join_ring::RingError) -> Self {
        match err {
            join_ring::RingError::OutOfMemory(m) => ReactorError::OutOfMemory(m),
            join_ring::RingError::PermissionDenied(m) => ReactorError::PermissionDenied(m),
            join_ring::RingError::InvalidParam(m) => ReactorError::InvalidParam(m),
            _ => ReactorError::OperationFailed,
        }
    }
}
