use std::cell::Cell;

use crate::error::ThreadError;
use crate::invoker::{self, Invoker};

/// An OS thread of execution with settable core affinity and real-time
/// priority.
///
/// Affinity and priority are cached so they can be re-applied across a
/// `cancel` + restart cycle: `core = -1` clears affinity and remembers
/// "unpinned" (subsequent `affinity()` calls return `-1`); `core = -2`
/// clears affinity for the running thread without forgetting a previously
/// requested pinning.
pub struct Thread {
    invoker: Option<Invoker>,
    core: Cell<i32>,
    priority: Cell<i32>,
}

impl Thread {
    /// Starts `func` on a new, unpinned, default-priority OS thread.
    pub fn spawn(func: impl FnOnce() + Send + 'static) -> Result<Self, ThreadError> {
        Self::spawn_with(-1, 0, func)
    }

    /// Starts `func` on a new OS thread, requesting `core` affinity and
    /// `priority` at start.
    pub fn spawn_with(core: i32, priority: i32, func: impl FnOnce() + Send + 'static) -> Result<Self, ThreadError> {
        let invoker = Invoker::start(core, priority, func)?;
        Ok(Self {
            invoker: Some(invoker),
            core: Cell::new(core),
            priority: Cell::new(priority),
        })
    }

    /// A `Thread` with no underlying OS thread: not joinable, not running.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            invoker: None,
            core: Cell::new(-1),
            priority: Cell::new(0),
        }
    }

    /// Pins this thread to `core`. `-1` unpins and forgets the prior
    /// pinning; `-2` unpins the running thread without forgetting it.
    pub fn set_affinity(&self, core: i32) -> Result<(), ThreadError> {
        let Some(invoker) = &self.invoker else {
            return Err(ThreadError::InvalidParam("thread is not running"));
        };
        match core {
            -2 => {
                invoker::clear_affinity(invoker.native_handle(), num_cpus())?;
            }
            -1 => {
                invoker::clear_affinity(invoker.native_handle(), num_cpus())?;
                self.core.set(-1);
            }
            c if c >= 0 => {
                invoker::set_affinity(invoker.native_handle(), c)?;
                self.core.set(c);
            }
            _ => return Err(ThreadError::InvalidParam("core must be >= -2")),
        }
        Ok(())
    }

    #[must_use]
    pub fn affinity(&self) -> i32 {
        self.core.get()
    }

    /// Sets real-time priority (`1..=99`, FIFO) or `0` for the default
    /// time-sharing class.
    pub fn set_priority(&self, priority: i32) -> Result<(), ThreadError> {
        let Some(invoker) = &self.invoker else {
            return Err(ThreadError::InvalidParam("thread is not running"));
        };
        if priority == 0 {
            invoker::clear_priority(invoker.native_handle())?;
        } else {
            invoker::set_priority(invoker.native_handle(), priority)?;
        }
        self.priority.set(priority);
        Ok(())
    }

    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority.get()
    }

    /// True between `spawn` and the thread body completing.
    #[must_use]
    pub fn running(&self) -> bool {
        self.invoker.as_ref().is_some_and(|i| !i.is_done())
    }

    /// True between `spawn` and `join`/`cancel`.
    #[must_use]
    pub fn joinable(&self) -> bool {
        self.invoker.is_some()
    }

    /// Blocks until the thread body completes.
    pub fn join(&mut self) -> Result<(), ThreadError> {
        match &mut self.invoker {
            Some(invoker) => {
                let result = invoker.join();
                self.invoker = None;
                result
            }
            None => Err(ThreadError::InvalidParam("thread is not joinable")),
        }
    }

    /// Non-blocking join: returns `true` and joins if the thread has
    /// finished, `false` if it is still running.
    pub fn try_join(&mut self) -> bool {
        match &mut self.invoker {
            Some(invoker) => {
                let done = invoker.try_join();
                if done {
                    self.invoker = None;
                }
                done
            }
            None => false,
        }
    }

    /// Forcibly cancels the thread, leaving this `Thread` in a default,
    /// non-joinable state.
    pub fn cancel(&mut self) {
        if let Some(mut invoker) = self.invoker.take() {
            invoker.cancel();
        }
    }

    /// The native OS handle, or `0` for a default-constructed or cancelled
    /// thread.
    #[must_use]
    pub fn handle(&self) -> libc::pthread_t {
        self.invoker.as_ref().map_or(0, Invoker::native_handle)
    }
}

impl Drop for Thread {
    fn drop(&mut self) {
        if self.joinable() {
            let _ = self.join();
        }
    }
}

fn num_cpus() -> usize {
    join_topo::CpuTopology::instance().cores().iter().map(|c| c.threads.len()).sum()
}
