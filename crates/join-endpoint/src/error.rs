use thiserror::Error;

/// Failure opening, closing, or operating a bidirectional endpoint.
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("endpoint is already open")]
    InUse,
    #[error(transparent)]
    Ring(#[from] join_ring::RingError),
}

impl EndpointError {
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EndpointError::Ring(e) if e.is_recoverable())
    }
}
