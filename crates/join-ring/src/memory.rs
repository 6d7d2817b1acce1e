//! The owned slot array backing a ring buffer: either a private heap
//! allocation or a POSIX shared-memory mapping.

use crate::error::RingError;
use crate::shm::ShmSegment;
use crate::slot::Slot;

pub(crate) enum RingMemory<T> {
    Local(Box<[Slot<T>]>),
    Shared(ShmSegment<T>),
}

impl<T> RingMemory<T> {
    pub(crate) fn local(capacity: usize) -> Self {
        let slots: Box<[Slot<T>]> = (0..capacity).map(|i| Slot::new(i as u64)).collect();
        Self::Local(slots)
    }

    pub(crate) fn shared(name: &str, capacity: usize, element_size: usize) -> Result<Self, RingError> {
        ShmSegment::create_or_open(name, capacity, element_size).map(Self::Shared)
    }

    pub(crate) fn slots(&self) -> &[Slot<T>] {
        match self {
            Self::Local(slots) => slots,
            Self::Shared(seg) => seg.slots(),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots().len()
    }

    /// Locks the backing pages into physical RAM. For the local backing this
    /// locks the heap allocation directly; for the shared backing it locks
    /// the mapped region.
    pub fn mlock(&self) -> Result<(), RingError> {
        match self {
            Self::Local(slots) => {
                let ptr = slots.as_ptr().cast::<libc::c_void>();
                let len = std::mem::size_of_val::<[Slot<T>]>(slots);
                let rc = unsafe { libc::mlock(ptr, len) };
                if rc == 0 {
                    Ok(())
                } else {
                    Err(RingError::PermissionDenied("mlock denied"))
                }
            }
            Self::Shared(seg) => seg.mlock(),
        }
    }

    /// Binds the backing pages to a NUMA node, best-effort.
    #[cfg(feature = "numa")]
    pub fn mbind(&self, numa_node: i32) -> Result<(), RingError> {
        match self {
            Self::Local(slots) => {
                if numa_node < 0 {
                    return Err(RingError::InvalidParam("numa node must be non-negative"));
                }
                let ptr = slots.as_ptr() as *mut libc::c_void;
                let len = std::mem::size_of_val::<[Slot<T>]>(slots);
                let mut mask: libc::c_ulong = 1 << numa_node;
                let rc = unsafe {
                    libc::syscall(
                        libc::SYS_mbind,
                        ptr,
                        len,
                        2, // MPOL_BIND
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
            Self::Shared(seg) => seg.mbind(numa_node),
        }
    }
}
