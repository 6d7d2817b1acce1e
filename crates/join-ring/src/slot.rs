//! Cache-line-aligned cursors and wire-format-aligned slots.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::AtomicU64;

/// Pads `T` out to its own 128-byte region so that contended cursors never
/// share a cache line with anything else.
///
/// 128 bytes rather than the architectural 64 covers both the common x86
/// adjacent-cache-line prefetcher and ARM's larger L2 line size; carried
/// over from the ring-buffer implementation this crate builds on. This is
/// strictly an in-process layout choice — it never appears in the
/// shared-memory wire format, which fixes slot alignment at 64 bytes
/// (see [`Slot`]).
#[repr(align(128))]
#[derive(Debug)]
pub(crate) struct CacheAligned<T> {
    pub(crate) value: T,
}

impl<T> CacheAligned<T> {
    pub(crate) const fn new(value: T) -> Self {
        Self { value }
    }
}

/// A single ring-buffer cell: a sequence counter plus a payload, laid out so
/// that `size_of::<Slot<T>>()` is always a multiple of 64 bytes. This layout
/// is bit-exact across processes: a `Slot<T>` is what a shared-memory
/// segment stores starting at offset 64, repeating every `size_of::<Slot<T>>()`
/// bytes.
#[repr(C, align(64))]
pub(crate) struct Slot<T> {
    pub(crate) sequence: AtomicU64,
    pub(crate) payload: UnsafeCell<MaybeUninit<T>>,
}

// SAFETY: access to `payload` is coordinated entirely through `sequence`'s
// acquire/release protocol (or, for SPSC, through the cached-cursor
// handshake); the ring implementations never hand out a `&Slot<T>` without
// having first observed ownership of the slot via that protocol.
unsafe impl<T: Send> Sync for Slot<T> {}

impl<T> Slot<T> {
    pub(crate) fn new(sequence: u64) -> Self {
        Self {
            sequence: AtomicU64::new(sequence),
            payload: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_stride_is_64_byte_multiple() {
        assert_eq!(std::mem::size_of::<Slot<u8>>() % 64, 0);
        assert_eq!(std::mem::size_of::<Slot<[u64; 16]>>() % 64, 0);
        assert_eq!(std::mem::align_of::<Slot<u8>>(), 64);
    }
}
