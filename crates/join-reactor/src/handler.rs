use std::os::unix::io::RawFd;

/// An object the reactor can wait on and deliver events to.
///
/// Mirrors the C++ source's `EventHandler` base class: `fd` identifies the
/// descriptor to multiplex over, and the three callbacks are invoked from
/// the dispatcher thread only, never concurrently with each other.
pub trait EventHandler: Send {
    /// The file descriptor this handler waits on. Must stay constant for
    /// the lifetime of the registration.
    fn fd(&self) -> RawFd;

    /// Called when `fd` is readable.
    fn on_receive(&self) {}

    /// Called when `fd` reports `EPOLLHUP`/`EPOLLRDHUP`.
    fn on_close(&self) {}

    /// Called when `fd` reports `EPOLLERR`.
    fn on_error(&self) {}
}

/// A type-erased, non-owning pointer to a registered handler.
///
/// The reactor never constructs or drops the pointee: the caller of
/// [`crate::Reactor::add_handler`] owns it and must keep it alive until a
/// matching `del_handler` (or reactor shutdown) has completed. Only the
/// dispatcher thread ever dereferences it, which is what makes `Send` sound
/// here despite the trait object not being `Sync`.
#[derive(Clone, Copy)]
pub(crate) struct HandlerPtr(pub(crate) *const dyn EventHandler);

unsafe impl Send for HandlerPtr {}

impl HandlerPtr {
    pub(crate) fn new(handler: &dyn EventHandler) -> Self {
        let ptr = handler as *const dyn EventHandler;
        // SAFETY: erases the borrow's lifetime; the raw pointer carries no
        // lifetime information at runtime. Callers of `add_handler`/
        // `del_handler` are already contractually responsible for keeping
        // the pointee alive (see their `# Safety` docs).
        Self(unsafe { std::mem::transmute::<*const dyn EventHandler, *const dyn EventHandler>(ptr) })
    }

    /// # Safety
    /// The pointee must still be alive and must not be mutably aliased.
    pub(crate) unsafe fn get(&self) -> &dyn EventHandler {
        &*self.0
    }
}
