//! Construction-time configuration for ring buffers.

use crate::error::RingError;

/// Rounds `c` up to the next power of two, with a floor of 1.
#[must_use]
pub fn next_pow2(c: usize) -> usize {
    if c <= 1 {
        1
    } else {
        c.next_power_of_two()
    }
}

/// Configuration for a process-local ring buffer.
///
/// Mirrors the `ringmpsc-rs` `Config` struct: a `const fn` constructor with
/// bounds checks, plus named presets for common deployment shapes.
#[derive(Debug, Clone, Copy)]
pub struct LocalConfig {
    requested_capacity: usize,
}

impl LocalConfig {
    /// Creates a configuration requesting at least `capacity` slots.
    /// The effective capacity is rounded up to the next power of two.
    #[must_use]
    pub const fn new(capacity: usize) -> Self {
        Self {
            requested_capacity: capacity,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        next_pow2(self.requested_capacity)
    }
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// Low-latency preset: small ring, favors cache residency over burst absorption.
pub const LOW_LATENCY: LocalConfig = LocalConfig::new(1 << 12);

/// High-throughput preset: large ring, favors burst absorption.
pub const HIGH_THROUGHPUT: LocalConfig = LocalConfig::new(1 << 18);

/// Configuration for a shared-memory-backed ring buffer.
///
/// `name` must be a POSIX shared-memory name: a leading `/`, and no other
/// `/` in the remainder.
#[derive(Debug, Clone)]
pub struct SharedConfig {
    pub(crate) name: String,
    requested_capacity: usize,
    pub(crate) element_size: usize,
}

impl SharedConfig {
    /// Validates `name` and builds a configuration for a shared segment.
    pub fn new(name: impl Into<String>, capacity: usize, element_size: usize) -> Result<Self, RingError> {
        let name = name.into();
        validate_segment_name(&name)?;
        if element_size == 0 {
            return Err(RingError::InvalidParam("element_size must be non-zero"));
        }
        Ok(Self {
            name,
            requested_capacity: capacity,
            element_size,
        })
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        next_pow2(self.requested_capacity)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Validates a POSIX shared-memory segment name: leading `/`, no other `/`,
/// bounded length (Linux's `shm_open` historically truncates at `NAME_MAX`).
pub(crate) fn validate_segment_name(name: &str) -> Result<(), RingError> {
    if !name.starts_with('/') {
        return Err(RingError::InvalidParam("segment name must start with '/'"));
    }
    if name.len() > 255 {
        return Err(RingError::InvalidParam("segment name too long"));
    }
    if name[1..].contains('/') {
        return Err(RingError::InvalidParam("segment name must not contain '/' past the leading one"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pow2_rounding() {
        assert_eq!(next_pow2(0), 1);
        assert_eq!(next_pow2(1), 1);
        assert_eq!(next_pow2(3), 4);
        assert_eq!(next_pow2(4), 4);
        assert_eq!(next_pow2(513), 1024);
    }

    #[test]
    fn segment_name_validation() {
        assert!(validate_segment_name("/foo").is_ok());
        assert!(validate_segment_name("foo").is_err());
        assert!(validate_segment_name("/foo/bar").is_err());
    }
}
