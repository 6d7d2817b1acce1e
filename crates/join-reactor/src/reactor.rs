//! Single-threaded epoll dispatcher with a lock-free cross-thread command
//! queue for registering and unregistering handlers.
//!
//! Only the thread running [`Reactor::run`] ever touches the handler table,
//! the epoll set, or the deferred-deletion list. Every other thread talks to
//! it exclusively by submitting a [`Command`] through `_commands` and
//! signalling the wake-up eventfd, mirroring the C++ source's
//! `writeCommand`/`readCommands` split.

use std::cell::UnsafeCell;
use std::collections::HashMap;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use join_ring::{LocalConfig, MpscRing};

use crate::command::{Command, CommandKind};
use crate::error::ReactorError;
use crate::handler::{EventHandler, HandlerPtr};

const DELETED_RESERVE: usize = 64;
const QUEUE_SIZE: usize = 1024;
const MAX_EVENTS: usize = 1024;

/// A single-threaded, epoll-backed event dispatcher.
///
/// Construction opens the epoll instance and the wake-up eventfd but does
/// not start dispatching: call [`Reactor::run`] on the thread that should
/// own the loop (or let [`crate::ReactorThread`] do it on a dedicated one).
pub struct Reactor {
    epoll_fd: RawFd,
    wakeup_fd: RawFd,
    commands: MpscRing<Command>,
    handlers: UnsafeCell<HashMap<RawFd, HandlerPtr>>,
    deleted: UnsafeCell<Vec<RawFd>>,
    running: AtomicBool,
}

// `handlers`/`deleted` are only ever touched from the thread running
// `run`/`process_command`/`dispatch_event`; every other method only reaches
// the reactor through the `MpscRing`, which is already `Sync`.
unsafe impl Sync for Reactor {}

impl Reactor {
    /// Opens the epoll instance and wake-up eventfd. Does not start
    /// dispatching.
    pub fn new() -> Result<Self, ReactorError> {
        let epoll_fd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if epoll_fd < 0 {
            return Err(ReactorError::Os(std::io::Error::last_os_error()));
        }
        let wakeup_fd = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) };
        if wakeup_fd < 0 {
            unsafe { libc::close(epoll_fd) };
            return Err(ReactorError::Os(std::io::Error::last_os_error()));
        }
        let mut ev = libc::epoll_event {
            events: libc::EPOLLIN as u32,
            u64: wakeup_fd as u64,
        };
        if unsafe { libc::epoll_ctl(epoll_fd, libc::EPOLL_CTL_ADD, wakeup_fd, &mut ev) } < 0 {
            let err = std::io::Error::last_os_error();
            unsafe {
                libc::close(wakeup_fd);
                libc::close(epoll_fd);
            }
            return Err(ReactorError::Os(err));
        }
        Ok(Self {
            epoll_fd,
            wakeup_fd,
            commands: MpscRing::new_local(LocalConfig::new(QUEUE_SIZE)),
            handlers: UnsafeCell::new(HashMap::new()),
            deleted: UnsafeCell::new(Vec::with_capacity(DELETED_RESERVE)),
            running: AtomicBool::new(false),
        })
    }

    /// Registers `handler` for readability/closure/error events.
    ///
    /// # Safety
    /// `handler` must stay alive and at a fixed address until a matching
    /// `del_handler` has completed (or this reactor is dropped). Nothing
    /// here enforces that; getting it wrong is a dangling-pointer bug the
    /// dispatcher will hit the next time the descriptor becomes ready.
    pub unsafe fn add_handler(&self, handler: &dyn EventHandler, sync: bool) -> Result<(), ReactorError> {
        if handler.fd() < 0 {
            return Err(ReactorError::InvalidParam("handler fd must be >= 0"));
        }
        self.submit(CommandKind::Add, Some(HandlerPtr::new(handler)), sync)
    }

    /// Unregisters `handler`. Safe to call even if it was never added.
    ///
    /// # Safety
    /// Same pointer-lifetime contract as [`Reactor::add_handler`]: `handler`
    /// must still be valid right now, even though it is about to stop being
    /// watched.
    pub unsafe fn del_handler(&self, handler: &dyn EventHandler, sync: bool) -> Result<(), ReactorError> {
        self.submit(CommandKind::Del, Some(HandlerPtr::new(handler)), sync)
    }

    /// Runs the dispatch loop until [`Reactor::stop`] is called.
    ///
    /// Blocking; returns [`ReactorError::InUse`] immediately if another
    /// thread is already running this reactor's loop. A reactor that has
    /// stopped may be `run()` again.
    pub fn run(&self) -> Result<(), ReactorError> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ReactorError::InUse)?;
        let mut events: Vec<libc::epoll_event> = vec![unsafe { std::mem::zeroed() }; MAX_EVENTS];
        loop {
            let n = unsafe { libc::epoll_wait(self.epoll_fd, events.as_mut_ptr(), events.len() as i32, -1) };
            if n < 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::Interrupted {
                    continue;
                }
                tracing::warn!(?err, "epoll_wait failed, stopping reactor");
                break;
            }
            for event in &events[..n as usize] {
                if event.u64 as RawFd == self.wakeup_fd {
                    self.read_commands();
                } else {
                    self.dispatch_event(event);
                }
            }
            if !self.running.load(Ordering::Acquire) {
                break;
            }
            unsafe { (*self.deleted.get()).clear() };
        }
        self.running.store(false, Ordering::Release);
        Ok(())
    }

    /// Requests that the dispatch loop exit. `sync = true` blocks until it
    /// has.
    pub fn stop(&self, sync: bool) -> Result<(), ReactorError> {
        self.submit(CommandKind::Stop, None, sync)
    }

    /// True iff `handler` is registered with the multiplexer and not in the
    /// deferred-deletion list. Racy unless called from the dispatcher
    /// thread, same as the ring's `is_empty`/`is_full`.
    #[must_use]
    pub fn is_active(&self, handler: &dyn EventHandler) -> bool {
        let fd = handler.fd();
        unsafe { (*self.handlers.get()).contains_key(&fd) && !(*self.deleted.get()).contains(&fd) }
    }

    /// Binds the command queue's backing memory to a NUMA node.
    #[cfg(feature = "numa")]
    pub fn mbind(&self, numa_node: i32) -> Result<(), ReactorError> {
        self.commands.mbind(numa_node).map_err(Into::into)
    }

    /// Locks the command queue's backing memory into RAM.
    pub fn mlock(&self) -> Result<(), ReactorError> {
        self.commands.mlock().map_err(Into::into)
    }

    fn submit(&self, kind: CommandKind, handler: Option<HandlerPtr>, sync: bool) -> Result<(), ReactorError> {
        if sync {
            let done = AtomicBool::new(false);
            let errc = AtomicI32::new(0);
            let cmd = Command::synchronous(kind, handler, &done, &errc);
            self.enqueue(cmd)?;
            while !done.load(Ordering::Acquire) {
                std::hint::spin_loop();
            }
            match errc.load(Ordering::Acquire) {
                0 => Ok(()),
                _ => Err(ReactorError::OperationFailed),
            }
        } else {
            self.enqueue(Command::fire_and_forget(kind, handler))
        }
    }

    fn enqueue(&self, cmd: Command) -> Result<(), ReactorError> {
        self.commands.push(cmd).map_err(|_| ReactorError::OperationFailed)?;
        let one: u64 = 1;
        let rc = unsafe { libc::write(self.wakeup_fd, std::ptr::addr_of!(one).cast(), 8) };
        if rc != 8 {
            return Err(ReactorError::Os(std::io::Error::last_os_error()));
        }
        Ok(())
    }

    /// Drains the wake-up counter, then every pending command. Dispatcher
    /// thread only.
    fn read_commands(&self) {
        let mut buf = [0u8; 8];
        unsafe { libc::read(self.wakeup_fd, buf.as_mut_ptr().cast(), 8) };
        while let Ok(cmd) = self.commands.try_pop() {
            self.process_command(&cmd);
        }
    }

    fn process_command(&self, cmd: &Command) {
        match cmd.kind {
            CommandKind::Add => {
                let handler = cmd.handler.expect("Add command carries a handler");
                let fd = unsafe { handler.get().fd() };
                let rc = self.register(fd);
                if rc == 0 {
                    unsafe { (*self.handlers.get()).insert(fd, handler) };
                }
                cmd.complete(rc);
            }
            CommandKind::Del => {
                let handler = cmd.handler.expect("Del command carries a handler");
                let fd = unsafe { handler.get().fd() };
                let rc = self.unregister(fd);
                unsafe {
                    (*self.handlers.get()).remove(&fd);
                    (*self.deleted.get()).push(fd);
                }
                cmd.complete(rc);
            }
            CommandKind::Stop => {
                self.running.store(false, Ordering::Release);
                cmd.complete(0);
            }
        }
    }

    fn dispatch_event(&self, event: &libc::epoll_event) {
        let fd = event.u64 as RawFd;
        if unsafe { (*self.deleted.get()).contains(&fd) } {
            return;
        }
        let Some(handler) = (unsafe { (*self.handlers.get()).get(&fd).copied() }) else {
            return;
        };
        let handler = unsafe { handler.get() };
        let events = event.events as i32;
        if events & libc::EPOLLERR != 0 {
            handler.on_error();
        } else if events & (libc::EPOLLHUP | libc::EPOLLRDHUP) != 0 {
            handler.on_close();
        } else if events & libc::EPOLLIN != 0 {
            handler.on_receive();
        }
    }

    fn register(&self, fd: RawFd) -> i32 {
        let mut ev = libc::epoll_event {
            events: (libc::EPOLLIN | libc::EPOLLRDHUP) as u32,
            u64: fd as u64,
        };
        if unsafe { libc::epoll_ctl(self.epoll_fd, libc::EPOLL_CTL_ADD, fd, &mut ev) } == 0 {
            0
        } else {
            -1
        }
    }

    fn unregister(&self, fd: RawFd) -> i32 {
        if unsafe { libc::epoll_ctl(self.epoll_fd, libc::EPOLL_CTL_DEL, fd, std::ptr::null_mut()) } == 0 {
            0
        } else {
            -1
        }
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.wakeup_fd);
            libc::close(self.epoll_fd);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    struct EventFdHandler {
        fd: RawFd,
        receives: Arc<AtomicUsize>,
    }

    impl EventHandler for EventFdHandler {
        fn fd(&self) -> RawFd {
            self.fd
        }

        fn on_receive(&self) {
            let mut buf = [0u8; 8];
            unsafe { libc::read(self.fd, buf.as_mut_ptr().cast(), 8) };
            self.receives.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl Drop for EventFdHandler {
        fn drop(&mut self) {
            unsafe { libc::close(self.fd) };
        }
    }

    fn make_eventfd() -> RawFd {
        let fd = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK) };
        assert!(fd >= 0);
        fd
    }

    #[test]
    fn dispatches_readable_handler_and_stops_cleanly() {
        let reactor = Arc::new(Reactor::new().unwrap());
        let receives = Arc::new(AtomicUsize::new(0));
        let handler = Box::new(EventFdHandler {
            fd: make_eventfd(),
            receives: receives.clone(),
        });

        let runner = {
            let reactor = reactor.clone();
            std::thread::spawn(move || reactor.run())
        };

        unsafe { reactor.add_handler(&*handler, true).unwrap() };

        let one: u64 = 1;
        unsafe { libc::write(handler.fd, std::ptr::addr_of!(one).cast(), 8) };

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
        while receives.load(Ordering::SeqCst) == 0 && std::time::Instant::now() < deadline {
            std::thread::yield_now();
        }
        assert_eq!(receives.load(Ordering::SeqCst), 1);

        unsafe { reactor.del_handler(&*handler, true).unwrap() };
        reactor.stop(true).unwrap();
        runner.join().unwrap().unwrap();
    }

    #[test]
    fn is_active_reflects_registration() {
        let reactor = Reactor::new().unwrap();
        let receives = Arc::new(AtomicUsize::new(0));
        let handler = EventFdHandler {
            fd: make_eventfd(),
            receives,
        };

        assert!(!reactor.is_active(&handler));

        let runner_reactor: &Reactor = &reactor;
        unsafe { runner_reactor.add_handler(&handler, false).unwrap() };

        // The Add command is only processed once `run` drains the queue, so
        // pump a single iteration manually by draining it directly.
        reactor.read_commands();
        assert!(reactor.is_active(&handler));

        unsafe { reactor.del_handler(&handler, false).unwrap() };
        reactor.read_commands();
        assert!(!reactor.is_active(&handler));
    }

    #[test]
    fn run_rejects_concurrent_second_call() {
        let reactor = Arc::new(Reactor::new().unwrap());
        let runner = {
            let reactor = reactor.clone();
            std::thread::spawn(move || reactor.run())
        };

        // Give the first run() a chance to win the compare-exchange.
        std::thread::sleep(std::time::Duration::from_millis(50));
        assert!(matches!(reactor.run(), Err(ReactorError::InUse)));

        reactor.stop(true).unwrap();
        runner.join().unwrap().unwrap();
    }
}
