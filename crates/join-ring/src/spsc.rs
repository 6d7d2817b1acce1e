//! Single-producer single-consumer ring: cursor-protocol ordering, with a
//! producer-private cache of the consumer's cursor and vice versa so the
//! fast path avoids a cross-core atomic load whenever the cache already
//! proves there is room/data.
//!
//! # Memory ordering
//!
//! The producer mutates `head` with Relaxed loads/stores and maintains
//! `cached_tail` as a plain (non-atomic) `UnsafeCell<u64>` it alone ever
//! writes; a cache hit needs no fence at all, since no other thread ever
//! observes `cached_tail`. On a cache miss the producer re-reads the real
//! `tail` with Acquire and refreshes the cache — this Acquire pairs with the
//! consumer's Release store to `tail`, so the producer never overwrites a
//! slot the consumer is still reading.
//!
//! Symmetrically, the consumer mutates `tail` with Relaxed and caches `head`
//! locally, refreshing via an Acquire load of the real `head` on a miss.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::backoff::Backoff;
use crate::config::{LocalConfig, SharedConfig};
use crate::error::RingError;
use crate::invariants::{
    debug_assert_bounded_count, debug_assert_head_not_past_tail, debug_assert_monotonic, debug_assert_no_wrap,
};
use crate::memory::RingMemory;
use crate::reservation::{CommitSink, Reservation};
use crate::slot::CacheAligned;

/// Single-producer single-consumer bounded ring buffer.
pub struct SpscRing<T> {
    head: CacheAligned<AtomicU64>,
    tail: CacheAligned<AtomicU64>,
    /// Producer-owned cache of `tail`. SAFETY: only ever written by the
    /// single producer thread, only ever read by that same thread.
    cached_tail: CacheAligned<UnsafeCell<u64>>,
    /// Consumer-owned cache of `head`. SAFETY: only ever written by the
    /// single consumer thread, only ever read by that same thread.
    cached_head: CacheAligned<UnsafeCell<u64>>,
    active: CacheAligned<AtomicBool>,
    closed: AtomicBool,
    memory: RingMemory<T>,
    mask: usize,
}

// SAFETY: the cached cursors are each touched by exactly one of the two
// permitted threads; cross-thread visibility of the slot payload goes
// through the Acquire/Release handshake on `head`/`tail` documented above.
unsafe impl<T: Send> Send for SpscRing<T> {}
unsafe impl<T: Send> Sync for SpscRing<T> {}

impl<T> SpscRing<T> {
    /// Creates a process-private SPSC ring.
    #[must_use]
    pub fn new_local(config: LocalConfig) -> Self {
        let capacity = config.capacity();
        Self {
            head: CacheAligned::new(AtomicU64::new(0)),
            tail: CacheAligned::new(AtomicU64::new(0)),
            cached_tail: CacheAligned::new(UnsafeCell::new(0)),
            cached_head: CacheAligned::new(UnsafeCell::new(0)),
            active: CacheAligned::new(AtomicBool::new(true)),
            closed: AtomicBool::new(false),
            memory: RingMemory::local(capacity),
            mask: capacity - 1,
        }
    }

    /// Creates (or attaches to) a shared-memory-backed SPSC ring.
    pub fn new_shared(config: &SharedConfig) -> Result<Self, RingError> {
        let capacity = config.capacity();
        let memory = RingMemory::shared(config.name(), capacity, config.element_size)?;
        Ok(Self {
            head: CacheAligned::new(AtomicU64::new(0)),
            tail: CacheAligned::new(AtomicU64::new(0)),
            cached_tail: CacheAligned::new(UnsafeCell::new(0)),
            cached_head: CacheAligned::new(UnsafeCell::new(0)),
            active: CacheAligned::new(AtomicBool::new(true)),
            closed: AtomicBool::new(false),
            memory,
            mask: capacity - 1,
        })
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.memory.capacity()
    }

    fn is_inert(&self) -> bool {
        self.closed.load(Ordering::Acquire) || !self.active.value.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        if self.is_inert() {
            return 0;
        }
        let head = self.head.value.load(Ordering::Relaxed);
        let tail = self.tail.value.load(Ordering::Relaxed);
        (head.wrapping_sub(tail) as usize).min(self.capacity())
    }

    #[must_use]
    pub fn available(&self) -> usize {
        if self.is_inert() {
            return 0;
        }
        self.capacity().saturating_sub(self.pending())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending() == 0
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.pending() >= self.capacity()
    }

    /// Locks the backing slot array into physical RAM.
    pub fn mlock(&self) -> Result<(), RingError> {
        self.memory.mlock()
    }

    /// Binds the backing slot array to a NUMA node.
    #[cfg(feature = "numa")]
    pub fn mbind(&self, numa_node: i32) -> Result<(), RingError> {
        self.memory.mbind(numa_node)
    }

    /// Reserves the next slot for zero-copy writing. Returns `None` if the
    /// queue is full or inert.
    pub fn reserve(&self) -> Option<Reservation<'_, T>> {
        if self.is_inert() {
            return None;
        }
        let head = self.head.value.load(Ordering::Relaxed);

        // SAFETY: only the producer thread reads/writes `cached_tail`.
        let mut tail = unsafe { *self.cached_tail.value.get() };
        if head.wrapping_sub(tail) as usize >= self.capacity() {
            tail = self.tail.value.load(Ordering::Acquire);
            unsafe { *self.cached_tail.value.get() = tail };
            if head.wrapping_sub(tail) as usize >= self.capacity() {
                return None;
            }
        }

        let idx = (head as usize) & self.mask;
        let slot = &self.memory.slots()[idx];
        Some(Reservation::new(slot, head, self as *const Self as *const (dyn CommitSink<T>)))
    }

    /// Reserves with exponential back-off instead of returning `None`
    /// immediately; still returns `None` only if the queue becomes inert
    /// while waiting.
    pub fn reserve_with_backoff(&self) -> Option<Reservation<'_, T>> {
        let mut backoff = Backoff::new();
        loop {
            if self.is_inert() {
                return None;
            }
            if let Some(r) = self.reserve() {
                return Some(r);
            }
            backoff.snooze();
        }
    }

    /// Non-blocking single-element push.
    pub fn try_push(&self, value: T) -> Result<(), RingError> {
        if self.is_inert() {
            return Err(RingError::TemporaryError);
        }
        match self.reserve() {
            Some(mut r) => {
                r.write(value);
                r.commit();
                Ok(())
            }
            None => Err(RingError::TemporaryError),
        }
    }

    /// Blocking push: spins with back-off until a slot frees up.
    pub fn push(&self, value: T) -> Result<(), RingError> {
        let mut backoff = Backoff::new();
        let mut value = Some(value);
        loop {
            if self.is_inert() {
                return Err(RingError::OperationFailed);
            }
            if let Some(mut r) = self.reserve() {
                r.write(value.take().unwrap());
                r.commit();
                return Ok(());
            }
            backoff.snooze();
        }
    }

    /// Non-blocking pop of a single element.
    pub fn try_pop(&self) -> Result<T, RingError> {
        if self.is_inert() {
            return Err(RingError::TemporaryError);
        }
        let tail = self.tail.value.load(Ordering::Relaxed);

        // SAFETY: only the consumer thread reads/writes `cached_head`.
        let mut head = unsafe { *self.cached_head.value.get() };
        if tail == head {
            head = self.head.value.load(Ordering::Acquire);
            unsafe { *self.cached_head.value.get() = head };
            if tail == head {
                return Err(RingError::TemporaryError);
            }
        }

        let idx = (tail as usize) & self.mask;
        let slots = self.memory.slots();
        // SAFETY: `tail < head` was just established, so this slot was
        // published by the producer and not yet consumed.
        let value = unsafe { (*slots[idx].payload.get()).assume_init_read() };

        let new_tail = tail.wrapping_add(1);
        debug_assert_monotonic!("tail", tail, new_tail);
        debug_assert_no_wrap!("tail", tail, new_tail);
        debug_assert_head_not_past_tail!(tail, head);
        self.tail.value.store(new_tail, Ordering::Release);
        Ok(value)
    }

    /// Blocking pop: spins with back-off until an element is available.
    pub fn pop(&self) -> Result<T, RingError> {
        let mut backoff = Backoff::new();
        loop {
            match self.try_pop() {
                Ok(v) => return Ok(v),
                Err(RingError::TemporaryError) => backoff.snooze(),
                Err(e) => return Err(e),
            }
        }
    }
}

impl<T> CommitSink<T> for SpscRing<T> {
    unsafe fn commit_at(&self, pos: u64) {
        let head = self.head.value.load(Ordering::Relaxed);
        debug_assert_eq!(pos, head, "SPSC reservation committed out of order");
        let new_head = head.wrapping_add(1);
        debug_assert_bounded_count!(1, self.capacity());
        debug_assert_monotonic!("head", head, new_head);
        debug_assert_no_wrap!("head", head, new_head);
        self.head.value.store(new_head, Ordering::Release);
    }
}

impl<T> Drop for SpscRing<T> {
    fn drop(&mut self) {
        // Drop any elements still between tail and head.
        let head = *self.head.value.get_mut();
        let tail = *self.tail.value.get_mut();
        let slots = self.memory.slots();
        let mut pos = tail;
        while pos != head {
            let idx = (pos as usize) & self.mask;
            unsafe { (*slots[idx].payload.get()).assume_init_drop() };
            pos = pos.wrapping_add(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_reserve_commit_roundtrip() {
        let ring = SpscRing::<u32>::new_local(LocalConfig::new(4));
        assert_eq!(ring.capacity(), 4);
        ring.push(1).unwrap();
        ring.push(2).unwrap();
        assert_eq!(ring.pop().unwrap(), 1);
        assert_eq!(ring.pop().unwrap(), 2);
        assert!(ring.is_empty());
    }

    #[test]
    fn s1_spsc_wrap_scenario() {
        let ring = SpscRing::<u32>::new_local(LocalConfig::new(4));
        for v in 1..=4 {
            ring.try_push(v).unwrap();
        }
        assert_eq!(ring.try_push(5), Err(RingError::TemporaryError));
        assert_eq!(ring.try_pop().unwrap(), 1);
        assert_eq!(ring.try_pop().unwrap(), 2);
        ring.try_push(5).unwrap();
        ring.try_push(6).unwrap();
        for expected in 3..=6 {
            assert_eq!(ring.try_pop().unwrap(), expected);
        }
        assert!(ring.is_empty());
        assert_eq!(ring.pending(), 0);
        assert_eq!(ring.available(), 4);
    }

    #[test]
    fn full_queue_rejects_try_push() {
        let ring = SpscRing::<u32>::new_local(LocalConfig::new(2));
        ring.try_push(1).unwrap();
        ring.try_push(2).unwrap();
        assert_eq!(ring.try_push(3), Err(RingError::TemporaryError));
    }

    #[test]
    fn drop_runs_destructors_for_pending_items() {
        use std::sync::atomic::AtomicUsize;
        use std::sync::Arc;

        struct Counted(Arc<AtomicUsize>);
        impl Drop for Counted {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }

        let dropped = Arc::new(AtomicUsize::new(0));
        {
            let ring = SpscRing::<Counted>::new_local(LocalConfig::new(4));
            ring.push(Counted(dropped.clone())).unwrap();
            ring.push(Counted(dropped.clone())).unwrap();
            let _ = ring.try_pop().unwrap();
        }
        assert_eq!(dropped.load(Ordering::Relaxed), 2);
    }
}
