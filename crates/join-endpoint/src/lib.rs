//! A bidirectional channel between two processes, built from a pair of
//! named shared-memory ring buffers: one named `{name}_AB`, carrying
//! traffic from side A to side B, and one named `{name}_BA` carrying the
//! reverse direction. Each side's `Endpoint` handle sends on the queue it
//! produces into and receives on the other.
//!
//! ```no_run
//! use join_endpoint::{Endpoint, Side};
//!
//! let mut ep = Endpoint::<u64>::new(Side::A, "/demo", 1024);
//! ep.open().unwrap();
//! ep.try_send(7).unwrap();
//! ```

mod error;

use std::time::{Duration, Instant};

use join_ring::{Backoff, MpmcRing, RingError, SharedConfig};

pub use error::EndpointError;

/// Which half of a bidirectional pair this handle represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    A,
    B,
}

/// One side of a bidirectional shared-memory channel.
pub struct Endpoint<T> {
    side: Side,
    base_name: String,
    capacity: usize,
    outgoing: Option<MpmcRing<T>>,
    incoming: Option<MpmcRing<T>>,
}

impl<T> Endpoint<T> {
    /// Creates a (closed) endpoint handle. Call [`open`](Self::open) before
    /// sending or receiving.
    #[must_use]
    pub fn new(side: Side, name: impl Into<String>, capacity: usize) -> Self {
        Self {
            side,
            base_name: name.into(),
            capacity,
            outgoing: None,
            incoming: None,
        }
    }

    /// Attaches (creating if absent) both underlying shared segments.
    pub fn open(&mut self) -> Result<(), EndpointError> {
        if self.outgoing.is_some() {
            return Err(EndpointError::InUse);
        }
        let (out_name, in_name) = self.channel_names();
        let element_size = std::mem::size_of::<T>();
        let out_config = SharedConfig::new(out_name, self.capacity, element_size)?;
        let in_config = SharedConfig::new(in_name, self.capacity, element_size)?;
        self.outgoing = Some(MpmcRing::new_shared(&out_config)?);
        self.incoming = Some(MpmcRing::new_shared(&in_config)?);
        tracing::debug!(side = ?self.side, base = %self.base_name, capacity = self.capacity, "endpoint opened");
        Ok(())
    }

    /// Closes both underlying rings (making them inert for any peer still
    /// holding a handle) and detaches them. Re-opening afterwards is
    /// permitted.
    pub fn close(&mut self) {
        tracing::debug!(side = ?self.side, base = %self.base_name, "endpoint closing");
        if let Some(ring) = self.outgoing.take() {
            ring.close();
        }
        if let Some(ring) = self.incoming.take() {
            ring.close();
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.outgoing.is_some()
    }

    fn channel_names(&self) -> (String, String) {
        match self.side {
            Side::A => (format!("{}_AB", self.base_name), format!("{}_BA", self.base_name)),
            Side::B => (format!("{}_BA", self.base_name), format!("{}_AB", self.base_name)),
        }
    }

    pub fn try_send(&self, data: T) -> Result<(), EndpointError> {
        let ring = self.outgoing.as_ref().ok_or(EndpointError::Ring(RingError::OperationFailed))?;
        ring.try_push(data).map_err(EndpointError::from)
    }

    pub fn send(&self, data: T) -> Result<(), EndpointError> {
        let ring = self.outgoing.as_ref().ok_or(EndpointError::Ring(RingError::OperationFailed))?;
        ring.push(data).map_err(EndpointError::from)
    }

    /// Spins until `data` is sent or `deadline` elapses.
    pub fn timed_send(&self, data: T, deadline: Duration) -> Result<(), EndpointError> {
        let ring = self.outgoing.as_ref().ok_or(EndpointError::Ring(RingError::OperationFailed))?;
        let start = Instant::now();
        let mut backoff = Backoff::new();
        let mut data = Some(data);
        loop {
            match ring.reserve() {
                Some(mut r) => {
                    r.write(data.take().unwrap());
                    r.commit();
                    return Ok(());
                }
                None => {
                    if start.elapsed() >= deadline {
                        return Err(EndpointError::Ring(RingError::TimedOut));
                    }
                    backoff.snooze();
                }
            }
        }
    }

    pub fn try_receive(&self) -> Result<T, EndpointError> {
        let ring = self.incoming.as_ref().ok_or(EndpointError::Ring(RingError::OperationFailed))?;
        ring.try_pop().map_err(EndpointError::from)
    }

    pub fn receive(&self) -> Result<T, EndpointError> {
        let ring = self.incoming.as_ref().ok_or(EndpointError::Ring(RingError::OperationFailed))?;
        ring.pop().map_err(EndpointError::from)
    }

    /// Spins until a value is received or `deadline` elapses.
    pub fn timed_receive(&self, deadline: Duration) -> Result<T, EndpointError> {
        let start = Instant::now();
        let mut backoff = Backoff::new();
        loop {
            match self.try_receive() {
                Ok(v) => return Ok(v),
                Err(EndpointError::Ring(RingError::TemporaryError)) => {
                    if start.elapsed() >= deadline {
                        return Err(EndpointError::Ring(RingError::TimedOut));
                    }
                    backoff.snooze();
                }
                Err(e) => return Err(e),
            }
        }
    }

    #[must_use]
    pub fn send_pending(&self) -> usize {
        self.outgoing.as_ref().map_or(0, MpmcRing::pending)
    }

    #[must_use]
    pub fn send_available(&self) -> usize {
        self.outgoing.as_ref().map_or(0, MpmcRing::available)
    }

    #[must_use]
    pub fn send_full(&self) -> bool {
        self.outgoing.as_ref().is_some_and(MpmcRing::is_full)
    }

    #[must_use]
    pub fn recv_pending(&self) -> usize {
        self.incoming.as_ref().map_or(0, MpmcRing::pending)
    }

    #[must_use]
    pub fn recv_available(&self) -> usize {
        self.incoming.as_ref().map_or(0, MpmcRing::available)
    }

    #[must_use]
    pub fn recv_empty(&self) -> bool {
        self.incoming.as_ref().is_none_or(MpmcRing::is_empty)
    }
}

/// Best-effort removal of both underlying shared segments for `name`.
/// Succeeds even if either or both are absent.
pub fn unlink(name: &str) -> Result<(), EndpointError> {
    join_ring::unlink(&format!("{name}_AB"))?;
    join_ring::unlink(&format!("{name}_BA"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_closes_rings_before_detaching() {
        let name = "/join-endpoint-test-close";
        let _ = unlink(name);
        let mut ep = Endpoint::<u64>::new(Side::A, name, 8);
        ep.open().unwrap();
        ep.try_send(1).unwrap();
        ep.close();
        assert!(!ep.is_open());
        assert_eq!(ep.send_pending(), 0);
        assert_eq!(ep.recv_pending(), 0);
        assert!(matches!(ep.try_send(2), Err(EndpointError::Ring(RingError::OperationFailed))));
        let _ = unlink(name);
    }

    #[test]
    fn reopen_after_close_works() {
        let name = "/join-endpoint-test-reopen";
        let _ = unlink(name);
        let mut ep = Endpoint::<u64>::new(Side::A, name, 8);
        ep.open().unwrap();
        ep.close();
        ep.open().unwrap();
        ep.try_send(7).unwrap();
        assert_eq!(ep.send_pending(), 1);
        ep.close();
        let _ = unlink(name);
    }
}
