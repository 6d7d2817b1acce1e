//! OS threads with settable affinity and real-time priority, plus a
//! worker-pool and static-partitioning parallel-for built on top of them.
//!
//! ```no_run
//! use join_thread::Thread;
//!
//! let mut t = Thread::spawn(|| println!("hello from a pinned thread")).unwrap();
//! t.set_affinity(0).ok();
//! t.join().unwrap();
//! ```

mod error;
mod invoker;
mod pool;
mod thread;

pub use error::ThreadError;
pub use pool::{distribute, parallel_for_each, ThreadPool};
pub use thread::Thread;
