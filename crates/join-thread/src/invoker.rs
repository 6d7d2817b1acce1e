//! Crate-private wrapper around an OS thread handle.
//!
//! Mirrors the source's friend-restricted `Invoker`: only [`crate::Thread`]
//! may construct one, which keeps "exactly one `Thread` owns this OS
//! thread, and only that `Thread` may retarget it" a type-system invariant
//! rather than a convention every caller has to respect.

use std::os::unix::thread::JoinHandleExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::error::ThreadError;

pub(crate) struct Invoker {
    handle: Option<JoinHandle<()>>,
    raw: libc::pthread_t,
    done: Arc<AtomicBool>,
}

impl Invoker {
    /// Starts a new OS thread running `func`, applying `core`/`priority` if
    /// requested (`core < 0` means unpinned, `priority == 0` means default
    /// scheduling class).
    pub(crate) fn start(
        core: i32,
        priority: i32,
        func: impl FnOnce() + Send + 'static,
    ) -> Result<Self, ThreadError> {
        let done = Arc::new(AtomicBool::new(false));
        let done_for_thread = done.clone();

        let handle = thread::Builder::new()
            .spawn(move || {
                func();
                done_for_thread.store(true, Ordering::Release);
            })
            .map_err(|_| ThreadError::SpawnFailed)?;

        let raw = handle.as_pthread_t();

        if core >= 0 {
            set_affinity(raw, core)?;
        }
        if priority > 0 {
            set_priority(raw, priority)?;
        }

        Ok(Self {
            handle: Some(handle),
            raw,
            done,
        })
    }

    pub(crate) fn native_handle(&self) -> libc::pthread_t {
        self.raw
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub(crate) fn join(&mut self) -> Result<(), ThreadError> {
        match self.handle.take() {
            Some(h) => h.join().map_err(|_| ThreadError::SpawnFailed),
            None => Ok(()),
        }
    }

    pub(crate) fn try_join(&mut self) -> bool {
        if self.is_done() {
            let _ = self.join();
            true
        } else {
            false
        }
    }

    /// Forcibly cancels the underlying OS thread. Resources held by the
    /// cancelled callable are not guaranteed to be released; callers must
    /// avoid cancelling threads holding locks.
    pub(crate) fn cancel(&mut self) {
        tracing::warn!(thread = self.raw, "cancelling thread; held resources may leak");
        unsafe {
            libc::pthread_cancel(self.raw);
            libc::pthread_detach(self.raw);
        }
        // The JoinHandle no longer corresponds to a joinable thread; drop
        // it without calling `join`.
        self.handle = None;
    }
}

pub(crate) fn set_affinity(handle: libc::pthread_t, core: i32) -> Result<(), ThreadError> {
    if core < 0 {
        return Err(ThreadError::InvalidParam("core id must be non-negative"));
    }
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(core as usize, &mut set);
        let rc = libc::pthread_setaffinity_np(handle, std::mem::size_of::<libc::cpu_set_t>(), &set);
        if rc == 0 {
            Ok(())
        } else {
            Err(ThreadError::PermissionDenied("pthread_setaffinity_np failed"))
        }
    }
}

pub(crate) fn clear_affinity(handle: libc::pthread_t, ncpu: usize) -> Result<(), ThreadError> {
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        for cpu in 0..ncpu {
            libc::CPU_SET(cpu, &mut set);
        }
        let rc = libc::pthread_setaffinity_np(handle, std::mem::size_of::<libc::cpu_set_t>(), &set);
        if rc == 0 {
            Ok(())
        } else {
            Err(ThreadError::PermissionDenied("pthread_setaffinity_np failed"))
        }
    }
}

pub(crate) fn set_priority(handle: libc::pthread_t, priority: i32) -> Result<(), ThreadError> {
    if !(1..=99).contains(&priority) {
        return Err(ThreadError::InvalidParam("priority must be in 1..=99"));
    }
    unsafe {
        let param = libc::sched_param { sched_priority: priority };
        let rc = libc::pthread_setschedparam(handle, libc::SCHED_FIFO, &param);
        if rc == 0 {
            Ok(())
        } else {
            Err(ThreadError::PermissionDenied("pthread_setschedparam failed"))
        }
    }
}

pub(crate) fn clear_priority(handle: libc::pthread_t) -> Result<(), ThreadError> {
    unsafe {
        let param = libc::sched_param { sched_priority: 0 };
        let rc = libc::pthread_setschedparam(handle, libc::SCHED_OTHER, &param);
        if rc == 0 {
            Ok(())
        } else {
            Err(ThreadError::PermissionDenied("pthread_setschedparam failed"))
        }
    }
}
