use std::sync::OnceLock;

use join_thread::Thread;

use crate::error::ReactorError;
use crate::handler::EventHandler;
use crate::reactor::Reactor;

/// A process-wide [`Reactor`] running on its own dedicated, nameable
/// thread, mirroring the C++ source's `ReactorThread` convenience wrapper.
struct Instance {
    reactor: &'static Reactor,
    dispatcher: std::sync::Mutex<Thread>,
}

static INSTANCE: OnceLock<Instance> = OnceLock::new();

fn instance() -> &'static Instance {
    INSTANCE.get_or_init(|| {
        // Leaked deliberately: the reactor is process-lifetime, and the
        // dispatcher thread borrows it for the duration of the event loop.
        let reactor: &'static Reactor = Box::leak(Box::new(Reactor::new().expect("failed to create reactor")));
        let dispatcher = Thread::spawn(move || {
            if let Err(err) = reactor.run() {
                tracing::error!(?err, "reactor dispatcher thread exited");
            }
        })
        .expect("failed to start reactor thread");
        Instance {
            reactor,
            dispatcher: std::sync::Mutex::new(dispatcher),
        }
    })
}

/// Process-wide handle to the shared background reactor.
pub struct ReactorThread;

impl ReactorThread {
    /// The global reactor instance, starting it on first call.
    #[must_use]
    pub fn reactor() -> &'static Reactor {
        instance().reactor
    }

    /// Pins the dispatcher thread to `core` (`-1` to unpin).
    pub fn set_affinity(core: i32) -> Result<(), ReactorError> {
        instance().dispatcher.lock().unwrap().set_affinity(core).map_err(Into::into)
    }

    /// The dispatcher thread's current core affinity.
    #[must_use]
    pub fn affinity() -> i32 {
        instance().dispatcher.lock().unwrap().affinity()
    }

    /// Sets the dispatcher thread's scheduling priority (`0` = `SCHED_OTHER`,
    /// `1..=99` = `SCHED_FIFO`).
    pub fn set_priority(priority: i32) -> Result<(), ReactorError> {
        instance().dispatcher.lock().unwrap().set_priority(priority).map_err(Into::into)
    }

    /// The dispatcher thread's current scheduling priority.
    #[must_use]
    pub fn priority() -> i32 {
        instance().dispatcher.lock().unwrap().priority()
    }

    /// The dispatcher thread's native `pthread_t` handle.
    #[must_use]
    pub fn handle() -> libc::pthread_t {
        instance().dispatcher.lock().unwrap().handle()
    }

    /// Binds the global reactor's command queue memory to a NUMA node.
    #[cfg(feature = "numa")]
    pub fn mbind(numa_node: i32) -> Result<(), ReactorError> {
        instance().reactor.mbind(numa_node)
    }

    /// Locks the global reactor's command queue memory into RAM.
    pub fn mlock() -> Result<(), ReactorError> {
        instance().reactor.mlock()
    }

    /// Registers `handler` with the global reactor.
    ///
    /// # Safety
    /// Same pointer-lifetime contract as [`Reactor::add_handler`].
    pub unsafe fn add_handler(handler: &dyn EventHandler, sync: bool) -> Result<(), ReactorError> {
        instance().reactor.add_handler(handler, sync)
    }

    /// Unregisters `handler` from the global reactor.
    ///
    /// # Safety
    /// Same pointer-lifetime contract as [`Reactor::del_handler`].
    pub unsafe fn del_handler(handler: &dyn EventHandler, sync: bool) -> Result<(), ReactorError> {
        instance().reactor.del_handler(handler, sync)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singleton_is_stable_and_dispatcher_is_alive() {
        let a = ReactorThread::reactor() as *const Reactor;
        let b = ReactorThread::reactor() as *const Reactor;
        assert_eq!(a, b);
        assert_ne!(ReactorThread::handle(), 0);
    }
}
