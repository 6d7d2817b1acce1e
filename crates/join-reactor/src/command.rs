use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use crate::handler::HandlerPtr;

/// The three operations the dispatcher thread can be asked to perform.
pub(crate) enum CommandKind {
    Add,
    Del,
    Stop,
}

/// A single entry in the reactor's cross-thread submission queue.
///
/// When `sync` completion is requested, `done`/`errc` point at atomics living
/// on the submitter's stack; the submitter spins on `done` after enqueueing,
/// so the pointees are guaranteed to outlive the dispatcher's use of them.
pub(crate) struct Command {
    pub(crate) kind: CommandKind,
    pub(crate) handler: Option<HandlerPtr>,
    done: *const AtomicBool,
    errc: *const AtomicI32,
}

unsafe impl Send for Command {}

impl Command {
    pub(crate) fn fire_and_forget(kind: CommandKind, handler: Option<HandlerPtr>) -> Self {
        Self {
            kind,
            handler,
            done: std::ptr::null(),
            errc: std::ptr::null(),
        }
    }

    pub(crate) fn synchronous(kind: CommandKind, handler: Option<HandlerPtr>, done: &AtomicBool, errc: &AtomicI32) -> Self {
        Self {
            kind,
            handler,
            done,
            errc,
        }
    }

    /// Records the outcome and, if this was a synchronous submission, wakes
    /// the spinning submitter. Called from the dispatcher thread only.
    pub(crate) fn complete(&self, rc: i32) {
        if !self.errc.is_null() {
            unsafe { (*self.errc).store(rc, Ordering::Release) };
        }
        if !self.done.is_null() {
            unsafe { (*self.done).store(true, Ordering::Release) };
        }
    }
}
