//! Heap-backed memory segment.

use crate::error::{Error, Result};

/// A zero-initialized heap block with an aligned usable region.
///
/// # Example
///
/// ```rust
/// use filtergraph::memory::HeapSegment;
///
/// let segment = HeapSegment::with_alignment(1000, 64).unwrap();
/// assert_eq!(segment.len(), 1000);
/// assert_eq!(segment.as_slice().as_ptr() as usize % 64, 0);
/// ```
pub struct HeapSegment {
    /// Never reallocated, so `offset` stays valid.
    data: Box<[u8]>,
    offset: usize,
    len: usize,
}

impl HeapSegment {
    /// Allocate `size` usable bytes starting on an `align`-byte boundary.
    ///
    /// The block is over-allocated by `align` bytes and the start of the
    /// usable region moved forward to the boundary.
    ///
    /// # Errors
    ///
    /// Fails for a zero `size` or an `align` that is not a power of two.
    pub fn with_alignment(size: usize, align: usize) -> Result<Self> {
        if size == 0 || !align.is_power_of_two() {
            return Err(Error::AllocationFailed(format!(
                "cannot allocate {} bytes aligned to {}",
                size, align
            )));
        }

        let data = vec![0u8; size + align].into_boxed_slice();
        let offset = data.as_ptr().align_offset(align);
        if offset >= align {
            return Err(Error::AllocationFailed(format!(
                "could not align a {} byte block to {}",
                size, align
            )));
        }
        Ok(Self { data, offset, len: size })
    }

    /// Usable bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the usable region is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The usable region.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.offset..self.offset + self.len]
    }

    /// The usable region, mutably.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[self.offset..self.offset + self.len]
    }
}

impl std::fmt::Debug for HeapSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeapSegment")
            .field("offset", &self.offset)
            .field("len", &self.len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_requests() {
        assert!(HeapSegment::with_alignment(0, 16).is_err());
        assert!(HeapSegment::with_alignment(64, 12).is_err());
    }

    #[test]
    fn test_usable_region_is_aligned() {
        for size in [1, 15, 16, 100, 4097] {
            let segment = HeapSegment::with_alignment(size, 16).unwrap();
            assert_eq!(segment.len(), size);
            assert!(!segment.is_empty());
            assert_eq!(segment.as_slice().as_ptr() as usize % 16, 0);
        }
    }

    #[test]
    fn test_zeroed_and_writable() {
        let mut segment = HeapSegment::with_alignment(32, 16).unwrap();
        assert!(segment.as_slice().iter().all(|&b| b == 0));
        segment.as_mut_slice()[..2].copy_from_slice(&[42, 43]);
        assert_eq!(&segment.as_slice()[..2], &[42, 43]);
    }
}
