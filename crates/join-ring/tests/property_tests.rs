//! Property-based tests covering the bounded-count, monotonic-progress and
//! happens-before invariants across all three ring disciplines.

use join_ring::{LocalConfig, MpmcRing, MpscRing, RingError, SpscRing};
use proptest::prelude::*;

proptest! {
    /// Ring never reports more pending elements than its capacity, for any
    /// sequence of pushes and pops.
    #[test]
    fn prop_bounded_count_spsc(writes in 0usize..200, reads in 0usize..200) {
        let ring = SpscRing::<u64>::new_local(LocalConfig::new(64));
        let capacity = ring.capacity();

        let mut produced = 0;
        for i in 0..writes {
            if ring.try_push(i as u64).is_ok() {
                produced += 1;
            }
        }
        prop_assert!(ring.pending() <= capacity);

        let mut consumed = 0;
        for _ in 0..reads.min(produced) {
            if ring.try_pop().is_ok() {
                consumed += 1;
            }
        }
        prop_assert!(ring.pending() <= capacity);
        prop_assert!(consumed <= produced);
    }

    /// Same invariant for the MPSC discipline.
    #[test]
    fn prop_bounded_count_mpsc(writes in 0usize..200, reads in 0usize..200) {
        let ring = MpscRing::<u64>::new_local(LocalConfig::new(64));
        let capacity = ring.capacity();

        let mut produced = 0;
        for i in 0..writes {
            if ring.try_push(i as u64).is_ok() {
                produced += 1;
            }
        }
        prop_assert!(ring.pending() <= capacity);

        let mut consumed = 0;
        for _ in 0..reads.min(produced) {
            if ring.try_pop().is_ok() {
                consumed += 1;
            }
        }
        prop_assert!(ring.pending() <= capacity);
        prop_assert!(consumed <= produced);
    }

    /// Same invariant for the MPMC discipline.
    #[test]
    fn prop_bounded_count_mpmc(writes in 0usize..200, reads in 0usize..200) {
        let ring = MpmcRing::<u64>::new_local(LocalConfig::new(64));
        let capacity = ring.capacity();

        let mut produced = 0;
        for i in 0..writes {
            if ring.try_push(i as u64).is_ok() {
                produced += 1;
            }
        }
        prop_assert!(ring.pending() <= capacity);

        let mut consumed = 0;
        for _ in 0..reads.min(produced) {
            if ring.try_pop().is_ok() {
                consumed += 1;
            }
        }
        prop_assert!(ring.pending() <= capacity);
        prop_assert!(consumed <= produced);
    }

    /// `pending()` increases by exactly one on a successful push and
    /// decreases by exactly one on a successful pop.
    #[test]
    fn prop_monotonic_progress_spsc(ops in prop::collection::vec(prop::bool::ANY, 1..100)) {
        let ring = SpscRing::<u64>::new_local(LocalConfig::new(64));

        for push in ops {
            let before = ring.pending();
            if push {
                if ring.try_push(42).is_ok() {
                    prop_assert_eq!(ring.pending(), before + 1);
                }
            } else if ring.try_pop().is_ok() {
                prop_assert_eq!(ring.pending(), before - 1);
            }
        }
    }

    /// A FIFO ring never yields more elements than were pushed, and ends up
    /// empty once every pushed element has been popped.
    #[test]
    fn prop_happens_before_spsc(writes in 0usize..50) {
        let ring = SpscRing::<u64>::new_local(LocalConfig::new(64));

        let mut produced = 0;
        for i in 0..writes {
            if ring.try_push(i as u64).is_ok() {
                produced += 1;
            }
        }
        prop_assert_eq!(ring.pending(), produced);

        let mut consumed = 0;
        while ring.try_pop().is_ok() {
            consumed += 1;
        }
        prop_assert!(consumed <= produced);
        prop_assert!(ring.is_empty());
    }

    /// Elements pop out of an SPSC ring in the same order they were pushed.
    #[test]
    fn prop_fifo_order_spsc(values in prop::collection::vec(any::<u32>(), 1..64)) {
        let ring = SpscRing::<u32>::new_local(LocalConfig::new(64));
        for &v in &values {
            ring.try_push(v).unwrap();
        }
        let mut popped = Vec::new();
        while let Ok(v) = ring.try_pop() {
            popped.push(v);
        }
        prop_assert_eq!(popped, values);
    }

    /// A closed ring reports empty/zero-available regardless of how much was
    /// pending when it closed, and its non-blocking operations fail with
    /// `TemporaryError` rather than `OperationFailed`.
    #[test]
    fn prop_inertness_spsc(pushes in 0usize..32) {
        let ring = SpscRing::<u64>::new_local(LocalConfig::new(64));
        for i in 0..pushes {
            let _ = ring.try_push(i as u64);
        }
        ring.close();
        prop_assert!(ring.is_empty());
        prop_assert!(!ring.is_full());
        prop_assert_eq!(ring.available(), 0);
        prop_assert_eq!(ring.try_push(0), Err(RingError::TemporaryError));
        prop_assert_eq!(ring.try_pop(), Err(RingError::TemporaryError));
    }

    /// Same inertness guarantees for the MPSC discipline.
    #[test]
    fn prop_inertness_mpsc(pushes in 0usize..32) {
        let ring = MpscRing::<u64>::new_local(LocalConfig::new(64));
        for i in 0..pushes {
            let _ = ring.try_push(i as u64);
        }
        ring.close();
        prop_assert!(ring.is_empty());
        prop_assert!(!ring.is_full());
        prop_assert_eq!(ring.available(), 0);
        prop_assert_eq!(ring.try_push(0), Err(RingError::TemporaryError));
        prop_assert_eq!(ring.try_pop(), Err(RingError::TemporaryError));
    }

    /// Same inertness guarantees for the MPMC discipline.
    #[test]
    fn prop_inertness_mpmc(pushes in 0usize..32) {
        let ring = MpmcRing::<u64>::new_local(LocalConfig::new(64));
        for i in 0..pushes {
            let _ = ring.try_push(i as u64);
        }
        ring.close();
        prop_assert!(ring.is_empty());
        prop_assert!(!ring.is_full());
        prop_assert_eq!(ring.available(), 0);
        prop_assert_eq!(ring.try_push(0), Err(RingError::TemporaryError));
        prop_assert_eq!(ring.try_pop(), Err(RingError::TemporaryError));
    }
}
