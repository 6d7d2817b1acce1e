//! Debug assertion macros for ring buffer invariants.
//!
//! These macros provide runtime checks documenting the correctness invariants
//! of the cursor and slot-sequence protocols. They are only active in debug
//! builds (`#[cfg(debug_assertions)]`), so there is zero overhead in release
//! builds.
//!
//! Shared by the SPSC, MPSC and MPMC ring implementations.

// =============================================================================
// INV-SEQ-01: Bounded Count
// =============================================================================

/// Assert that count does not exceed capacity.
///
/// **Invariant**: `0 ≤ (tail - head) ≤ capacity`
///
/// Used in: `SpscRing`'s `CommitSink::commit_at`, after computing the
/// pending count a commit would leave behind.
macro_rules! debug_assert_bounded_count {
    ($count:expr, $capacity:expr) => {
        debug_assert!(
            $count <= $capacity,
            "INV-SEQ-01 violated: count {} exceeds capacity {}",
            $count,
            $capacity
        )
    };
}

/// Assert that tail does not advance past head.
///
/// **Invariant**: `tail ≤ head` (after advance)
///
/// Used in: `SpscRing::try_pop`, before storing the advanced `tail`.
macro_rules! debug_assert_head_not_past_tail {
    ($new_head:expr, $tail:expr) => {
        debug_assert!(
            $new_head <= $tail,
            "INV-SEQ-01 violated: advancing head {} beyond tail {}",
            $new_head,
            $tail
        )
    };
}

// =============================================================================
// INV-SEQ-02: Monotonic Progress
// =============================================================================

/// Assert that a sequence number only increases (monotonic progress).
///
/// **Invariant**: `new_value ≥ old_value` (using wrapping comparison)
///
/// Used in: `SpscRing::try_pop` for `tail`, `SpscRing`'s `CommitSink::commit_at`
/// for `head`.
macro_rules! debug_assert_monotonic {
    ($name:literal, $old:expr, $new:expr) => {
        debug_assert!(
            $new >= $old,
            "INV-SEQ-02 violated: {} decreased from {} to {}",
            $name,
            $old,
            $new
        )
    };
}

// =============================================================================
// INV-SEQ-03: No Wrap-Around (extremely unlikely but detectable)
// =============================================================================

/// Assert that we haven't wrapped around u64 sequence space.
///
/// **Invariant**: At 10B msg/sec, wrap takes ~58 years. This detects bugs where
/// sequence jumps backwards unexpectedly (not due to normal wrapping arithmetic).
///
/// Note: This uses strict `>` rather than `>=` because `new > old` detects
/// wrap-around (where new would be < old due to overflow).
///
/// Used in: `SpscRing::try_pop` after incrementing `tail`, `SpscRing`'s
/// `CommitSink::commit_at` after incrementing `head`.
macro_rules! debug_assert_no_wrap {
    ($name:literal, $old:expr, $new:expr) => {
        // In debug mode, detect if we somehow wrapped u64 (should never happen
        // in practice, but catches bugs where sequence jumps incorrectly)
        debug_assert!(
            $new > $old || $old.wrapping_sub($new) > (1u64 << 32),
            "INV-SEQ-03 potential wrap detected: {} went from {} to {} (delta: {})",
            $name,
            $old,
            $new,
            $new.wrapping_sub($old)
        )
    };
}

// =============================================================================
// INV-RES-03: Pointer Validity
// =============================================================================

/// Assert that a ring pointer is not null.
///
/// **Invariant**: The raw `sink` pointer in `Reservation` is valid for
/// lifetime `'a`
///
/// Used in: `Reservation::commit`
macro_rules! debug_assert_valid_ring_ptr {
    ($ptr:expr) => {
        debug_assert!(
            !$ptr.is_null(),
            "INV-RES-03 violated: null ring pointer"
        )
    };
}

// =============================================================================
// INV-SEQ-04: Slot Sequence Agreement
// =============================================================================

/// Assert that a slot's sequence field agrees with the cursor position that
/// claimed it, for the MPMC/MPSC Vyukov-style protocol.
///
/// **Invariant**: immediately after a successful claim at cursor `pos`, the
/// slot's sequence field equals `pos` (producer side) or `pos + capacity`
/// (consumer side, after publish).
///
/// Used in: `MpmcRing::try_pop`, `MpscRing::try_pop`.
macro_rules! debug_assert_slot_sequence {
    ($seq:expr, $expected:expr) => {
        debug_assert!(
            $seq == $expected,
            "INV-SEQ-04 violated: slot sequence {} does not match expected {}",
            $seq,
            $expected
        )
    };
}

// =============================================================================
// Re-exports for crate-internal use
// =============================================================================

pub(crate) use debug_assert_bounded_count;
pub(crate) use debug_assert_head_not_past_tail;
pub(crate) use debug_assert_monotonic;
pub(crate) use debug_assert_no_wrap;
pub(crate) use debug_assert_slot_sequence;
pub(crate) use debug_assert_valid_ring_ptr;
