//! Zero-copy reserve/commit API shared by every producer-side ring handle.
//!
//! Each reservation covers exactly one slot (the wire-compatible slot layout
//! interleaves the sequence counter with the payload, so slots claimed by a
//! multi-producer ring are not generally contiguous in memory the way a
//! plain `[MaybeUninit<T>]` buffer would be). Writing straight into the
//! slot's payload still avoids an intermediate copy relative to passing `T`
//! by value through `push`.

use crate::invariants::debug_assert_valid_ring_ptr;
use crate::slot::Slot;

/// Anything a [`Reservation`] can commit into once the caller has finished
/// writing. Implemented by each ring discipline's producer side; `pos` is
/// the cursor value the reservation was claimed at.
pub(crate) trait CommitSink<T> {
    /// # Safety
    /// The slot at `pos` must have been initialized by a prior call to
    /// [`Reservation::write`] on a reservation claimed at this same `pos`.
    unsafe fn commit_at(&self, pos: u64);
}

/// A single reserved, uninitialized slot a producer may write into without
/// taking a lock. Dropping a `Reservation` without calling `commit` leaks
/// the claim — the slot remains claimed but never becomes visible to
/// consumers and, for CAS-claimed disciplines, the ring will stall waiting
/// for this slot to publish. Callers must always commit.
pub struct Reservation<'a, T> {
    slot: &'a Slot<T>,
    pos: u64,
    sink: *const (dyn CommitSink<T> + 'a),
    written: bool,
}

impl<'a, T> Reservation<'a, T> {
    pub(crate) fn new(slot: &'a Slot<T>, pos: u64, sink: *const (dyn CommitSink<T> + 'a)) -> Self {
        Self {
            slot,
            pos,
            sink,
            written: false,
        }
    }

    /// Writes the payload into the reserved slot.
    pub fn write(&mut self, value: T) {
        // SAFETY: this reservation exclusively owns the slot's payload cell
        // until `commit` is called; no consumer can observe it before then.
        unsafe { (*self.slot.payload.get()).write(value) };
        self.written = true;
    }

    /// Commits the reservation, publishing it to consumers.
    ///
    /// # Panics
    /// Panics in debug builds if `write` was never called.
    pub fn commit(self) {
        debug_assert!(self.written, "Reservation committed without a write");
        debug_assert_valid_ring_ptr!(self.sink);
        let (pos, sink) = (self.pos, self.sink);
        // SAFETY: `written` confirms the slot's payload was initialized.
        unsafe { (*sink).commit_at(pos) };
    }
}
