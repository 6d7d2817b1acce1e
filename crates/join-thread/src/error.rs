use thiserror::Error;

/// Failure constructing or retargeting a [`crate::Thread`].
#[derive(Debug, Error)]
pub enum ThreadError {
    #[error("failed to spawn OS thread")]
    SpawnFailed,
    #[error("invalid parameter: {0}")]
    InvalidParam(&'static str),
    #[error("operation denied by the OS: {0}")]
    PermissionDenied(&'static str),
}
