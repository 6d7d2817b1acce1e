//! Lock-free bounded ring-buffer queues over local heap memory or POSIX
//! shared memory, in single-producer/single-consumer, multi-producer/
//! single-consumer, and multi-producer/multi-consumer disciplines.
//!
//! All three disciplines share the same wire-compatible [`slot`] layout and
//! the same zero-copy [`reserve`](SpscRing::reserve)/write/commit surface;
//! they differ only in how a producer or consumer claims a slot.
//!
//! ```
//! use join_ring::{LocalConfig, SpscRing};
//!
//! let ring = SpscRing::<u64>::new_local(LocalConfig::new(1024));
//! ring.push(42).unwrap();
//! assert_eq!(ring.pop().unwrap(), 42);
//! ```
//!
//! Shared-memory rings attach by name and must agree on capacity and
//! element size across processes:
//!
//! ```no_run
//! use join_ring::{MpmcRing, SharedConfig};
//!
//! let config = SharedConfig::new("/join-demo", 4096, std::mem::size_of::<u64>()).unwrap();
//! let ring = MpmcRing::<u64>::new_shared(&config).unwrap();
//! ring.try_push(7).ok();
//! ```

mod backoff;
mod config;
mod error;
mod invariants;
mod memory;
mod mpmc;
mod mpsc;
mod reservation;
mod shm;
mod slot;
mod spsc;

pub use backoff::Backoff;
pub use config::{next_pow2, LocalConfig, SharedConfig, HIGH_THROUGHPUT, LOW_LATENCY};
pub use error::RingError;
pub use mpmc::MpmcRing;
pub use mpsc::MpscRing;
pub use reservation::Reservation;
pub use shm::unlink;
pub use spsc::SpscRing;
