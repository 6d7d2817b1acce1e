//! Multi-producer single-consumer ring: Vyukov-style bounded queue, claiming
//! slots with a CAS on `head` and a per-slot sequence counter instead of a
//! cursor handshake, since more than one thread can be racing to claim the
//! same `head` value.
//!
//! # Memory ordering
//!
//! Each slot carries a `sequence` initialized to its own index. A producer
//! at position `pos` may claim the slot at `pos & mask` only once that
//! slot's sequence equals `pos` (i.e. the consumer has drained whatever was
//! there `capacity` pushes ago). It claims by CAS-ing `head` from `pos` to
//! `pos + 1`; on success it owns the slot exclusively and release-stores
//! `sequence = pos + 1` once the payload is written, which is what makes the
//! slot visible to the single consumer. The consumer needs no CAS on `tail`
//! since it is the only reader: it Acquire-loads a slot's `sequence`,
//! confirms it equals `pos + 1`, reads the payload, then Release-stores
//! `sequence = pos + capacity` (so the slot reads as "empty at the next lap")
//! and advances `tail` with a plain store.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::backoff::Backoff;
use crate::config::{LocalConfig, SharedConfig};
use crate::error::RingError;
use crate::invariants::debug_assert_slot_sequence;
use crate::memory::RingMemory;
use crate::reservation::{CommitSink, Reservation};
use crate::slot::CacheAligned;

/// Multi-producer single-consumer bounded ring buffer.
pub struct MpscRing<T> {
    head: CacheAligned<AtomicU64>,
    tail: CacheAligned<AtomicU64>,
    closed: std::sync::atomic::AtomicBool,
    memory: RingMemory<T>,
    mask: usize,
}

unsafe impl<T: Send> Send for MpscRing<T> {}
unsafe impl<T: Send> Sync for MpscRing<T> {}

impl<T> MpscRing<T> {
    #[must_use]
    pub fn new_local(config: LocalConfig) -> Self {
        let capacity = config.capacity();
        Self {
            head: CacheAligned::new(AtomicU64::new(0)),
            tail: CacheAligned::new(AtomicU64::new(0)),
            closed: std::sync::atomic::AtomicBool::new(false),
            memory: RingMemory::local(capacity),
            mask: capacity - 1,
        }
    }

    pub fn new_shared(config: &SharedConfig) -> Result<Self, RingError> {
        let capacity = config.capacity();
        let memory = RingMemory::shared(config.name(), capacity, config.element_size)?;
        Ok(Self {
            head: CacheAligned::new(AtomicU64::new(0)),
            tail: CacheAligned::new(AtomicU64::new(0)),
            closed: std::sync::atomic::AtomicBool::new(false),
            memory,
            mask: capacity - 1,
        })
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.memory.capacity()
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
        if self.is_closed() {
            return 0;
        }
        let head = self.head.value.load(Ordering::Relaxed);
        let tail = self.tail.value.load(Ordering::Relaxed);
        (head.wrapping_sub(tail) as usize).min(self.capacity())
    }

    #[must_use]
    pub fn available(&self) -> usize {
        if self.is_closed() {
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

    /// Claims the next free slot for a producer, racing any concurrent
    /// producer via CAS on `head`. Returns `None` if the queue is full or
    /// closed.
    pub fn reserve(&self) -> Option<Reservation<'_, T>> {
        if self.is_closed() {
            return None;
        }
        let slots = self.memory.slots();
        let mut pos = self.head.value.load(Ordering::Relaxed);
        loop {
            let idx = (pos as usize) & self.mask;
            let seq = slots[idx].sequence.load(Ordering::Acquire);
            let diff = seq as i64 - pos as i64;

            if diff == 0 {
                match self.head.value.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        return Some(Reservation::new(&slots[idx], pos, self as *const Self as *const (dyn CommitSink<T>)));
                    }
                    Err(observed) => pos = observed,
                }
            } else if diff < 0 {
                // Slot not yet reclaimed by the consumer: queue is full.
                return None;
            } else {
                // Another producer has already advanced head past our snapshot.
                pos = self.head.value.load(Ordering::Relaxed);
            }
        }
    }

    /// Claims a slot with exponential back-off instead of returning `None`
    /// as soon as the queue looks full.
    pub fn reserve_with_backoff(&self) -> Option<Reservation<'_, T>> {
        let mut backoff = Backoff::new();
        loop {
            if self.is_closed() {
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
        if self.is_closed() {
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
            if self.is_closed() {
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

    /// Non-blocking pop of a single element. Only ever called from the one
    /// consumer thread; `tail` is never touched by a producer.
    pub fn try_pop(&self) -> Result<T, RingError> {
        let slots = self.memory.slots();
        let tail = self.tail.value.load(Ordering::Relaxed);
        let idx = (tail as usize) & self.mask;
        let seq = slots[idx].sequence.load(Ordering::Acquire);
        let diff = seq as i64 - (tail.wrapping_add(1) as i64);

        if diff != 0 {
            return Err(RingError::TemporaryError);
        }

        // SAFETY: `seq == tail + 1` confirms a producer published this slot
        // and it has not yet been reclaimed.
        let value = unsafe { (*slots[idx].payload.get()).assume_init_read() };

        let new_seq = tail.wrapping_add(self.capacity() as u64);
        debug_assert_slot_sequence!(seq, tail.wrapping_add(1));
        slots[idx].sequence.store(new_seq, Ordering::Release);
        self.tail.value.store(tail.wrapping_add(1), Ordering::Relaxed);
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

impl<T> CommitSink<T> for MpscRing<T> {
    unsafe fn commit_at(&self, pos: u64) {
        let slots = self.memory.slots();
        let idx = (pos as usize) & self.mask;
        slots[idx].sequence.store(pos.wrapping_add(1), Ordering::Release);
    }
}

impl<T> Drop for MpscRing<T> {
    fn drop(&mut self) {
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
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn basic_reserve_commit_roundtrip() {
        let ring = MpscRing::<u32>::new_local(LocalConfig::new(4));
        ring.push(1).unwrap();
        ring.push(2).unwrap();
        assert_eq!(ring.try_pop().unwrap(), 1);
        assert_eq!(ring.try_pop().unwrap(), 2);
        assert!(ring.is_empty());
    }

    #[test]
    fn full_queue_rejects_try_push() {
        let ring = MpscRing::<u32>::new_local(LocalConfig::new(2));
        ring.try_push(1).unwrap();
        ring.try_push(2).unwrap();
        assert_eq!(ring.try_push(3), Err(RingError::TemporaryError));
    }

    #[test]
    fn many_producers_preserve_total_count() {
        let ring = Arc::new(MpscRing::<u64>::new_local(LocalConfig::new(1024)));
        let producers = 8;
        let per_producer = 2000u64;
        let handles: Vec<_> = (0..producers)
            .map(|p| {
                let ring = ring.clone();
                thread::spawn(move || {
                    for i in 0..per_producer {
                        ring.push(p * per_producer + i).unwrap();
                    }
                })
            })
            .collect();

        let mut received = 0u64;
        while received < producers * per_producer {
            if ring.try_pop().is_ok() {
                received += 1;
            }
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(received, producers * per_producer);
        assert!(ring.is_empty());
    }

    #[test]
    fn drop_runs_destructors_for_pending_items() {
        use std::sync::atomic::AtomicUsize;

        struct Counted(Arc<AtomicUsize>);
        impl Drop for Counted {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }

        let dropped = Arc::new(AtomicUsize::new(0));
        {
            let ring = MpscRing::<Counted>::new_local(LocalConfig::new(4));
            ring.push(Counted(dropped.clone())).unwrap();
            ring.push(Counted(dropped.clone())).unwrap();
            let _ = ring.try_pop().unwrap();
        }
        assert_eq!(dropped.load(Ordering::Relaxed), 2);
    }
}
