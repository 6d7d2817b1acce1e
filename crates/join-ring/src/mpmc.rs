//! Multi-producer multi-consumer ring: the canonical Vyukov bounded queue,
//! symmetric CAS on both `head` (producers) and `tail` (consumers) guarded
//! by the same per-slot sequence counter used by [`crate::mpsc`].
//!
//! # Memory ordering
//!
//! Identical producer-side protocol to the MPSC ring. The consumer side now
//! also races: a consumer at position `pos` may claim the slot at
//! `pos & mask` once its sequence equals `pos + 1` (a producer has
//! published it), claiming by CAS-ing `tail` from `pos` to `pos + 1`. On
//! success it Acquire-reads the payload, then Release-stores
//! `sequence = pos + capacity`, marking the slot free for the next lap.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::backoff::Backoff;
use crate::config::{LocalConfig, SharedConfig};
use crate::error::RingError;
use crate::invariants::debug_assert_slot_sequence;
use crate::memory::RingMemory;
use crate::reservation::{CommitSink, Reservation};
use crate::slot::CacheAligned;

/// Multi-producer multi-consumer bounded ring buffer.
pub struct MpmcRing<T> {
    head: CacheAligned<AtomicU64>,
    tail: CacheAligned<AtomicU64>,
    closed: AtomicBool,
    memory: RingMemory<T>,
    mask: usize,
}

unsafe impl<T: Send> Send for MpmcRing<T> {}
unsafe impl<T: Send> Sync for MpmcRing<T> {}

impl<T> MpmcRing<T> {
    #[must_use]
    pub fn new_local(config: LocalConfig) -> Self {
        let capacity = config.capacity();
        Self {
            head: CacheAligned::new(AtomicU64::new(0)),
            tail: CacheAligned::new(AtomicU64::new(0)),
            closed: AtomicBool::new(false),
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
            closed: AtomicBool::new(false),
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
                return None;
            } else {
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

    /// Non-blocking pop, racing any concurrent consumer via CAS on `tail`.
    pub fn try_pop(&self) -> Result<T, RingError> {
        let slots = self.memory.slots();
        let mut pos = self.tail.value.load(Ordering::Relaxed);
        loop {
            let idx = (pos as usize) & self.mask;
            let seq = slots[idx].sequence.load(Ordering::Acquire);
            let diff = seq as i64 - (pos.wrapping_add(1) as i64);

            if diff == 0 {
                match self.tail.value.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        debug_assert_slot_sequence!(seq, pos.wrapping_add(1));
                        // SAFETY: the CAS above gives this consumer exclusive
                        // ownership of the slot's payload; no other consumer
                        // can observe the same `pos` again until it is
                        // republished by a producer.
                        let value = unsafe { (*slots[idx].payload.get()).assume_init_read() };
                        let new_seq = pos.wrapping_add(self.capacity() as u64);
                        slots[idx].sequence.store(new_seq, Ordering::Release);
                        return Ok(value);
                    }
                    Err(observed) => pos = observed,
                }
            } else if diff < 0 {
                return Err(RingError::TemporaryError);
            } else {
                pos = self.tail.value.load(Ordering::Relaxed);
            }
        }
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

impl<T> CommitSink<T> for MpmcRing<T> {
    unsafe fn commit_at(&self, pos: u64) {
        let slots = self.memory.slots();
        let idx = (pos as usize) & self.mask;
        slots[idx].sequence.store(pos.wrapping_add(1), Ordering::Release);
    }
}

impl<T> Drop for MpmcRing<T> {
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
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn basic_reserve_commit_roundtrip() {
        let ring = MpmcRing::<u32>::new_local(LocalConfig::new(4));
        ring.push(1).unwrap();
        ring.push(2).unwrap();
        assert_eq!(ring.try_pop().unwrap(), 1);
        assert_eq!(ring.try_pop().unwrap(), 2);
        assert!(ring.is_empty());
    }

    #[test]
    fn full_queue_rejects_try_push() {
        let ring = MpmcRing::<u32>::new_local(LocalConfig::new(2));
        ring.try_push(1).unwrap();
        ring.try_push(2).unwrap();
        assert_eq!(ring.try_push(3), Err(RingError::TemporaryError));
    }

    #[test]
    fn many_producers_many_consumers_no_loss_or_duplication() {
        let ring = Arc::new(MpmcRing::<u64>::new_local(LocalConfig::new(1024)));
        let producers = 4u64;
        let consumers = 4u64;
        let per_producer = 5000u64;
        let total = producers * per_producer;
        let received = Arc::new(AtomicU64::new(0));

        let producer_handles: Vec<_> = (0..producers)
            .map(|p| {
                let ring = ring.clone();
                thread::spawn(move || {
                    for i in 0..per_producer {
                        ring.push(p * per_producer + i).unwrap();
                    }
                })
            })
            .collect();

        let results: Arc<std::sync::Mutex<Vec<u64>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
        let consumer_handles: Vec<_> = (0..consumers)
            .map(|_| {
                let ring = ring.clone();
                let results = results.clone();
                let received = received.clone();
                thread::spawn(move || {
                    let mut local = Vec::new();
                    while received.load(Ordering::Relaxed) < total {
                        match ring.try_pop() {
                            Ok(v) => {
                                local.push(v);
                                received.fetch_add(1, Ordering::Relaxed);
                            }
                            Err(_) => thread::yield_now(),
                        }
                    }
                    results.lock().unwrap().extend(local);
                })
            })
            .collect();

        for h in producer_handles {
            h.join().unwrap();
        }
        for h in consumer_handles {
            h.join().unwrap();
        }

        let results = results.lock().unwrap();
        let set: HashSet<u64> = results.iter().copied().collect();
        assert_eq!(set.len(), results.len(), "duplicate element observed");
        assert_eq!(set.len() as u64, total, "lost elements");
    }
}
