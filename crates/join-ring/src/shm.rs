//! POSIX shared-memory segment mapping for cross-process ring buffers.
//!
//! Wire layout (bit-exact across processes):
//!
//! ```text
//! offset 0:  header { u64 capacity; u64 element_size; padding to 64 bytes }
//! offset 64: slot[0] { u64 sequence; payload (element_size bytes, padded to 64-byte alignment) }
//! offset 64 + slot_stride * i: slot[i]
//! ```

use std::ffi::CString;
use std::mem::size_of;
use std::os::raw::c_void;
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::RingError;
use crate::slot::Slot;

/// On-disk/in-shm header, 64 bytes, occupying the first slot-stride of the segment.
#[repr(C, align(64))]
pub(crate) struct SegmentHeader {
    pub(crate) capacity: AtomicU64,
    pub(crate) element_size: AtomicU64,
}

const HEADER_SIZE: usize = 64;

/// A mapped POSIX shared-memory segment typed for `Slot<T>` payloads.
///
/// Closing a handle (dropping it) unmaps the segment but never unlinks it —
/// other processes may still be attached. Only [`unlink`] removes the name
/// from the filesystem namespace.
pub(crate) struct ShmSegment<T> {
    base: *mut u8,
    map_len: usize,
    capacity: usize,
    _marker: std::marker::PhantomData<T>,
}

// SAFETY: the mapping is shared across processes by construction; within
// this process, access to the slot array is coordinated by the ring
// implementations through the slot sequence protocol, exactly as for the
// heap-backed variant.
unsafe impl<T: Send> Send for ShmSegment<T> {}
unsafe impl<T: Send> Sync for ShmSegment<T> {}

impl<T> ShmSegment<T> {
    /// Creates (if absent) or attaches to a named shared-memory segment
    /// sized for `capacity` slots of payload type `T`.
    ///
    /// Returns `InvalidParam` if the segment already exists with a
    /// different `(capacity, element_size)` header.
    pub(crate) fn create_or_open(name: &str, capacity: usize, element_size: usize) -> Result<Self, RingError> {
        let c_name = CString::new(name).map_err(|_| RingError::InvalidParam("segment name contains NUL"))?;
        let slot_stride = size_of::<Slot<T>>();
        let map_len = HEADER_SIZE + slot_stride * capacity;

        // O_CREAT | O_EXCL first: we win the race to initialize if we're first.
        let created_fd = unsafe {
            libc::shm_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_EXCL | libc::O_RDWR,
                0o600,
            )
        };

        let (fd, created) = if created_fd >= 0 {
            (created_fd, true)
        } else {
            let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDWR, 0o600) };
            if fd < 0 {
                return Err(RingError::OutOfMemory("shm_open failed"));
            }
            (fd, false)
        };

        if created {
            if unsafe { libc::ftruncate(fd, map_len as libc::off_t) } != 0 {
                unsafe { libc::close(fd) };
                return Err(RingError::OutOfMemory("ftruncate failed"));
            }
        }

        let base = unsafe {
            libc::mmap(
                ptr::null_mut(),
                map_len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        unsafe { libc::close(fd) };

        if base == libc::MAP_FAILED {
            return Err(RingError::OutOfMemory("mmap failed"));
        }
        let base = base.cast::<u8>();

        let header = unsafe { &*base.cast::<SegmentHeader>() };
        if created {
            header.capacity.store(capacity as u64, Ordering::Release);
            header.element_size.store(element_size as u64, Ordering::Release);
            for i in 0..capacity {
                let slot = unsafe { &*slot_ptr::<T>(base, i) };
                slot.sequence.store(i as u64, Ordering::Relaxed);
            }
        } else {
            let existing_capacity = header.capacity.load(Ordering::Acquire);
            let existing_element_size = header.element_size.load(Ordering::Acquire);
            if existing_capacity != capacity as u64 || existing_element_size != element_size as u64 {
                unsafe { libc::munmap(base.cast::<c_void>(), map_len) };
                return Err(RingError::InvalidParam(
                    "existing shared segment has a different (capacity, element_size)",
                ));
            }
        }

        Ok(Self {
            base,
            map_len,
            capacity,
            _marker: std::marker::PhantomData,
        })
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn slots(&self) -> &[Slot<T>] {
        unsafe { std::slice::from_raw_parts(slot_ptr::<T>(self.base, 0), self.capacity) }
    }

    /// Locks the mapped pages into physical RAM.
    pub(crate) fn mlock(&self) -> Result<(), RingError> {
        let rc = unsafe { libc::mlock(self.base.cast::<c_void>(), self.map_len) };
        if rc == 0 {
            Ok(())
        } else {
            Err(RingError::PermissionDenied("mlock denied"))
        }
    }

    /// Binds the mapped pages to a NUMA node, best-effort.
    #[cfg(feature = "numa")]
    pub(crate) fn mbind(&self, numa_node: i32) -> Result<(), RingError> {
        if numa_node < 0 {
            return Err(RingError::InvalidParam("numa node must be non-negative"));
        }
        let mut mask: libc::c_ulong = 1 << numa_node;
        let rc = unsafe {
            libc::syscall(
                libc::SYS_mbind,
                self.base as *mut c_void,
                self.map_len,
                2 /* MPOL_BIND */,
                &mut mask as *mut libc::c_ulong,
                (numa_node as libc::c_ulong) + 1,
                0,
            )
        };
        if rc == 0 {
            Ok(())
        } else {
            Err(RingError::PermissionDenied("mbind denied"))
        }
    }
}

fn slot_ptr<T>(base: *mut u8, index: usize) -> *const Slot<T> {
    let stride = size_of::<Slot<T>>();
    unsafe { base.add(HEADER_SIZE + stride * index).cast::<Slot<T>>() }
}

impl<T> Drop for ShmSegment<T> {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.base.cast::<c_void>(), self.map_len);
        }
    }
}

/// Best-effort removal of a named shared-memory segment. Succeeds even if
/// the segment is already absent.
pub fn unlink(name: &str) -> Result<(), RingError> {
    let c_name = CString::new(name).map_err(|_| RingError::InvalidParam("segment name contains NUL"))?;
    let rc = unsafe { libc::shm_unlink(c_name.as_ptr()) };
    if rc == 0 || unsafe { *libc::__errno_location() } == libc::ENOENT {
        Ok(())
    } else {
        Err(RingError::PermissionDenied("shm_unlink failed"))
    }
}
