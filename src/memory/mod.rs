//! Backing storage for frame buffers.
//!
//! Every frame buffer owns one contiguous, zero-initialized heap block. The
//! block is over-allocated so that its usable region starts on a SIMD-friendly
//! boundary ([`ALIGN`] bytes) and ends with at least [`SLACK`] spare bytes.
//!
//! # Example
//!
//! ```rust
//! use filtergraph::memory::{ALIGN, HeapSegment};
//!
//! let segment = HeapSegment::with_alignment(100, ALIGN).unwrap();
//! assert!(segment.len() >= 100);
//! assert_eq!(segment.as_slice().as_ptr() as usize % ALIGN, 0);
//! ```

mod heap;

pub use heap::HeapSegment;

/// Alignment of buffer data and of every video linesize.
pub const ALIGN: usize = 16;

/// Spare bytes allocated past the last plane of a picture.
pub const SLACK: usize = 16;

/// Round `v` up to the next multiple of [`ALIGN`].
#[inline]
pub const fn align_up(v: usize) -> usize {
    (v + ALIGN - 1) & !(ALIGN - 1)
}
