//! A single-threaded, epoll-based event dispatcher: register handlers for
//! file descriptors, run one blocking loop that delivers their events, and
//! drive registration itself through a lock-free command queue so any
//! thread can add or remove handlers without touching epoll directly.
//!
//! ```no_run
//! use std::os::unix::io::RawFd;
//! use join_reactor::{EventHandler, Reactor};
//!
//! struct Pipe(RawFd);
//! impl EventHandler for Pipe {
//!     fn fd(&self) -> RawFd { self.0 }
//!     fn on_receive(&self) { /* drain it */ }
//! }
//!
//! let reactor = Reactor::new().unwrap();
//! let handler = Pipe(0);
//! unsafe { reactor.add_handler(&handler, true).unwrap() };
//! // reactor.run() blocks the calling thread; typically spawned elsewhere.
//! ```

mod command;
mod error;
mod handler;
mod reactor;
mod reactor_thread;

pub use error::ReactorError;
pub use handler::EventHandler;
pub use reactor::Reactor;
pub use reactor_thread::ReactorThread;
