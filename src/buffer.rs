//! Reference-counted frame buffers.
//!
//! A [`Buffer`] owns the pixel or sample memory of one frame. Filters never
//! hold a `Buffer` directly: they hold [`BufferRef`]s, each with its own
//! permission mask, timestamps and a private copy of the format properties.
//!
//! - [`BufferRef::ref_buffer`] creates another reference to the same memory,
//!   with permissions narrowed by a mask.
//! - Dropping a reference (or calling [`BufferRef::unref_buffer`]) releases it.
//!   When the last reference goes, the buffer's free callback runs.
//!
//! # Example
//!
//! ```rust
//! use filtergraph::buffer::{Perms, alloc_video_buffer};
//! use filtergraph::format::PixelFormat;
//!
//! let frame = alloc_video_buffer(PixelFormat::Yuv420p, Perms::WRITE, 64, 48).unwrap();
//! let shared = frame.ref_buffer(!Perms::WRITE);
//! assert_eq!(frame.refcount(), 2);
//! assert!(!shared.perms().contains(Perms::WRITE));
//! shared.unref_buffer();
//! assert_eq!(frame.refcount(), 1);
//! ```

use crate::error::{Error, Result};
use crate::format::{ChannelLayout, Format, MediaType, PixelFormat, Rational, SampleFormat};
use crate::memory::{ALIGN, HeapSegment, SLACK, align_up};
use crate::observability;
use bitflags::bitflags;
use smallvec::SmallVec;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{
    Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError,
};

bitflags! {
    /// What the holder of a buffer reference may do with its data.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Perms: u8 {
        /// The data may be read.
        const READ = 0x01;
        /// The data may be written.
        const WRITE = 0x02;
        /// Nobody else will modify the data while this reference lives.
        const PRESERVE = 0x04;
        /// The holder may write the same data more than once.
        const REUSE = 0x08;
        /// The holder may write the data in any order.
        const REUSE2 = 0x10;
    }
}

/// Location of one plane (or audio channel) inside a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Plane {
    /// Byte offset of the plane's first row.
    pub offset: usize,
    /// Bytes from one row (or sample frame) to the next.
    pub linesize: usize,
    /// Bytes the plane spans.
    pub len: usize,
}

/// Called once when the last reference to a buffer is released.
pub type FreeCallback = Box<dyn FnOnce() + Send>;

/// Shared frame storage.
///
/// The logical reference count is separate from the `Arc` that keeps the
/// memory alive, so the free callback fires exactly when the last
/// [`BufferRef`] is released.
pub struct Buffer {
    data: RwLock<HeapSegment>,
    len: usize,
    planes: SmallVec<[Plane; 8]>,
    format: Format,
    refcount: AtomicUsize,
    free: Mutex<Option<FreeCallback>>,
}

impl Buffer {
    /// Wrap a segment whose planes have already been laid out.
    ///
    /// # Errors
    ///
    /// Returns an error if a plane extends past the end of the segment.
    pub fn new(
        segment: HeapSegment,
        planes: impl IntoIterator<Item = Plane>,
        format: Format,
    ) -> Result<Self> {
        let planes: SmallVec<[Plane; 8]> = planes.into_iter().collect();
        if let Some(p) = planes.iter().find(|p| p.offset + p.len > segment.len()) {
            return Err(Error::AllocationFailed(format!(
                "plane at offset {} ({} bytes) exceeds {} byte buffer",
                p.offset,
                p.len,
                segment.len()
            )));
        }
        Ok(Self {
            len: segment.len(),
            data: RwLock::new(segment),
            planes,
            format,
            refcount: AtomicUsize::new(0),
            free: Mutex::new(None),
        })
    }

    /// Install the callback run when the last reference is released.
    pub fn with_free_callback(self, free: impl FnOnce() + Send + 'static) -> Self {
        *self.free.lock().unwrap_or_else(PoisonError::into_inner) = Some(Box::new(free));
        self
    }

    /// Plane layout.
    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    /// Format of the stored data.
    pub fn format(&self) -> Format {
        self.format
    }

    /// Usable bytes of the underlying allocation.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current number of references.
    pub fn refcount(&self) -> usize {
        self.refcount.load(Ordering::Acquire)
    }

    fn read_segment(&self) -> RwLockReadGuard<'_, HeapSegment> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self) {
        if self.refcount.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }
        observability::record_buffer_freed(self.format.media_type());
        let free = self
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(free) = free {
            free();
        }
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("format", &self.format)
            .field("planes", &self.planes)
            .field("refcount", &self.refcount())
            .finish()
    }
}

/// Per-reference video properties.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct VideoProps {
    /// Picture width.
    pub w: u32,
    /// Picture height.
    pub h: u32,
    /// Pixel aspect ratio.
    pub pixel_aspect: Rational,
    /// Whether the picture is interlaced.
    pub interlaced: bool,
    /// Whether the top field comes first.
    pub top_field_first: bool,
}

/// Per-reference audio properties.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioProps {
    /// Speaker layout.
    pub channel_layout: ChannelLayout,
    /// Sample encoding.
    pub sample_format: SampleFormat,
    /// Bytes of sample data.
    pub size: usize,
    /// Samples per channel.
    pub samples: usize,
    /// Samples per second.
    pub sample_rate: u32,
    /// One plane per channel rather than interleaved.
    pub planar: bool,
}

/// Shape of a requested sample buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleSpec {
    /// Bytes of sample data.
    pub size: usize,
    /// Speaker layout.
    pub channel_layout: ChannelLayout,
    /// Sample encoding.
    pub sample_format: SampleFormat,
    /// One plane per channel rather than interleaved.
    pub planar: bool,
}

impl SampleSpec {
    /// The shape of an existing batch.
    pub fn of(props: &AudioProps) -> Self {
        Self {
            size: props.size,
            channel_layout: props.channel_layout,
            sample_format: props.sample_format,
            planar: props.planar,
        }
    }
}

/// Format-specific properties carried by each reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BufferProps {
    /// Picture properties.
    Video(VideoProps),
    /// Sample batch properties.
    Audio(AudioProps),
}

/// A reference to a [`Buffer`] with its own permissions and properties.
pub struct BufferRef {
    buf: Arc<Buffer>,
    perms: Perms,
    /// Presentation timestamp.
    pub pts: Option<i64>,
    /// Byte position in the originating stream.
    pub pos: Option<i64>,
    props: BufferProps,
}

impl BufferRef {
    /// Create the first reference to a freshly allocated buffer.
    pub fn new(buffer: Buffer, perms: Perms, props: BufferProps) -> Self {
        buffer.refcount.store(1, Ordering::Release);
        Self {
            buf: Arc::new(buffer),
            perms,
            pts: None,
            pos: None,
            props,
        }
    }

    /// Create another reference to the same buffer.
    ///
    /// The new reference's permissions are this reference's permissions
    /// masked by `mask`; its properties are an independent copy.
    pub fn ref_buffer(&self, mask: Perms) -> BufferRef {
        self.buf.refcount.fetch_add(1, Ordering::AcqRel);
        BufferRef {
            buf: Arc::clone(&self.buf),
            perms: self.perms & mask,
            pts: self.pts,
            pos: self.pos,
            props: self.props.clone(),
        }
    }

    /// Release this reference.
    pub fn unref_buffer(self) {
        drop(self);
    }

    /// Permissions of this reference.
    pub fn perms(&self) -> Perms {
        self.perms
    }

    /// Number of live references to the underlying buffer.
    pub fn refcount(&self) -> usize {
        self.buf.refcount()
    }

    /// Whether both references point at the same buffer.
    pub fn same_buffer(&self, other: &BufferRef) -> bool {
        Arc::ptr_eq(&self.buf, &other.buf)
    }

    /// The underlying buffer.
    pub fn buffer(&self) -> &Buffer {
        &self.buf
    }

    /// Media type of the referenced data.
    pub fn media_type(&self) -> MediaType {
        match self.props {
            BufferProps::Video(_) => MediaType::Video,
            BufferProps::Audio(_) => MediaType::Audio,
        }
    }

    /// Format of the referenced data.
    pub fn format(&self) -> Format {
        self.buf.format
    }

    /// Format properties.
    pub fn props(&self) -> &BufferProps {
        &self.props
    }

    /// Video properties, if this is a picture.
    pub fn video(&self) -> Option<&VideoProps> {
        match &self.props {
            BufferProps::Video(v) => Some(v),
            BufferProps::Audio(_) => None,
        }
    }

    /// Mutable video properties.
    pub fn video_mut(&mut self) -> Option<&mut VideoProps> {
        match &mut self.props {
            BufferProps::Video(v) => Some(v),
            BufferProps::Audio(_) => None,
        }
    }

    /// Audio properties, if this is a sample batch.
    pub fn audio(&self) -> Option<&AudioProps> {
        match &self.props {
            BufferProps::Audio(a) => Some(a),
            BufferProps::Video(_) => None,
        }
    }

    /// Mutable audio properties.
    pub fn audio_mut(&mut self) -> Option<&mut AudioProps> {
        match &mut self.props {
            BufferProps::Audio(a) => Some(a),
            BufferProps::Video(_) => None,
        }
    }

    /// Copy timestamps and format properties from another reference.
    pub fn copy_props_from(&mut self, src: &BufferRef) {
        self.pts = src.pts;
        self.pos = src.pos;
        self.props = src.props.clone();
    }

    /// Layout of plane `index`.
    pub fn plane(&self, index: usize) -> Option<Plane> {
        self.buf.planes.get(index).copied()
    }

    /// Linesize of plane `index`, 0 if absent.
    pub fn linesize(&self, index: usize) -> usize {
        self.plane(index).map_or(0, |p| p.linesize)
    }

    /// Number of planes.
    pub fn plane_count(&self) -> usize {
        self.buf.planes.len()
    }

    /// Lock the data for reading.
    pub fn read(&self) -> BufferReadGuard<'_> {
        BufferReadGuard {
            guard: self.buf.read_segment(),
            planes: &self.buf.planes,
        }
    }

    /// Lock the data for writing.
    ///
    /// # Errors
    ///
    /// Returns an error if this reference lacks write permission, or if the
    /// data is locked elsewhere.
    pub fn write(&self) -> Result<BufferWriteGuard<'_>> {
        if !self.perms.contains(Perms::WRITE) {
            return Err(Error::PermissionDenied {
                have: self.perms,
                need: Perms::WRITE,
            });
        }
        self.write_unchecked()
    }

    /// Lock the data for writing without consulting permissions.
    ///
    /// Used by the runtime when filling a buffer it allocated itself.
    pub(crate) fn write_unchecked(&self) -> Result<BufferWriteGuard<'_>> {
        let guard = match self.buf.data.try_write() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return Err(Error::BufferBusy),
        };
        Ok(BufferWriteGuard {
            guard,
            planes: &self.buf.planes,
        })
    }
}

impl Drop for BufferRef {
    fn drop(&mut self) {
        self.buf.release();
    }
}

impl std::fmt::Debug for BufferRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferRef")
            .field("format", &self.buf.format)
            .field("perms", &self.perms)
            .field("pts", &self.pts)
            .field("pos", &self.pos)
            .field("props", &self.props)
            .field("refcount", &self.refcount())
            .finish()
    }
}

/// Read access to a buffer's planes.
pub struct BufferReadGuard<'a> {
    guard: RwLockReadGuard<'a, HeapSegment>,
    planes: &'a [Plane],
}

impl BufferReadGuard<'_> {
    /// Bytes of plane `index`.
    pub fn plane(&self, index: usize) -> Option<&[u8]> {
        let p = self.planes.get(index)?;
        Some(&self.guard.as_slice()[p.offset..p.offset + p.len])
    }

    /// All usable bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.guard.as_slice()
    }
}

/// Write access to a buffer's planes.
pub struct BufferWriteGuard<'a> {
    guard: RwLockWriteGuard<'a, HeapSegment>,
    planes: &'a [Plane],
}

impl BufferWriteGuard<'_> {
    /// Bytes of plane `index`.
    pub fn plane(&self, index: usize) -> Option<&[u8]> {
        let p = self.planes.get(index)?;
        Some(&self.guard.as_slice()[p.offset..p.offset + p.len])
    }

    /// Mutable bytes of plane `index`.
    pub fn plane_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        let p = *self.planes.get(index)?;
        Some(&mut self.guard.as_mut_slice()[p.offset..p.offset + p.len])
    }

    /// All usable bytes, mutably.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        self.guard.as_mut_slice()
    }
}

/// Plane layout of a `w`x`h` picture: 16-byte aligned linesizes, planes back to back.
///
/// Returns the planes and the bytes they span.
pub fn video_planes(format: PixelFormat, w: u32, h: u32) -> (SmallVec<[Plane; 8]>, usize) {
    let mut planes = SmallVec::new();
    let mut offset = 0;
    for i in 0..format.planes() {
        let linesize = align_up(format.plane_bytewidth(i, w));
        let len = linesize * format.plane_height(i, h);
        planes.push(Plane {
            offset,
            linesize,
            len,
        });
        offset += len;
    }
    (planes, offset)
}

/// Allocate a picture with the default layout.
///
/// Read permission is always granted on top of `perms`.
///
/// # Errors
///
/// Returns an error for zero-sized pictures.
pub fn alloc_video_buffer(format: PixelFormat, perms: Perms, w: u32, h: u32) -> Result<BufferRef> {
    if w == 0 || h == 0 {
        return Err(Error::AllocationFailed(format!(
            "cannot allocate a {}x{} picture",
            w, h
        )));
    }
    let (planes, size) = video_planes(format, w, h);
    let segment = HeapSegment::with_alignment(size + SLACK, ALIGN)?;
    observability::record_buffer_allocated(MediaType::Video, segment.len());
    let buffer = Buffer::new(segment, planes, Format::Pixel(format))?;
    Ok(BufferRef::new(
        buffer,
        perms | Perms::READ,
        BufferProps::Video(VideoProps {
            w,
            h,
            ..VideoProps::default()
        }),
    ))
}

/// Allocate `size` bytes of samples.
///
/// Planar buffers get one plane per channel of `size / channels` bytes;
/// packed buffers get a single interleaved plane. The allocation is rounded
/// up to a multiple of 16 bytes. Read permission is always granted.
///
/// # Errors
///
/// Returns an error if `size` is 0 or the layout has no channels.
pub fn alloc_audio_buffer(
    perms: Perms,
    size: usize,
    channel_layout: ChannelLayout,
    sample_format: SampleFormat,
    planar: bool,
) -> Result<BufferRef> {
    let channels = channel_layout.channels();
    if channels == 0 || size == 0 {
        return Err(Error::AllocationFailed(format!(
            "cannot allocate {} bytes for {} channels",
            size, channels
        )));
    }
    let per_channel = size / channels;
    let sample_size = sample_format.bytes();
    let planes: SmallVec<[Plane; 8]> = if planar {
        (0..channels)
            .map(|ch| Plane {
                offset: ch * per_channel,
                linesize: per_channel,
                len: per_channel,
            })
            .collect()
    } else {
        smallvec::smallvec![Plane {
            offset: 0,
            linesize: sample_size * channels,
            len: size,
        }]
    };

    let segment = HeapSegment::with_alignment(align_up(size), ALIGN)?;
    observability::record_buffer_allocated(MediaType::Audio, segment.len());
    let buffer = Buffer::new(segment, planes, Format::Sample(sample_format))?;
    Ok(BufferRef::new(
        buffer,
        perms | Perms::READ,
        BufferProps::Audio(AudioProps {
            channel_layout,
            sample_format,
            size,
            samples: per_channel / sample_size,
            sample_rate: 0,
            planar,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_frame() -> BufferRef {
        alloc_video_buffer(PixelFormat::Yuv420p, Perms::WRITE, 32, 16).unwrap()
    }

    #[test]
    fn test_read_always_granted() {
        let frame = alloc_video_buffer(PixelFormat::Rgb24, Perms::empty(), 4, 4).unwrap();
        assert_eq!(frame.perms(), Perms::READ);
    }

    #[test]
    fn test_ref_increments_and_masks() {
        let frame = make_test_frame();
        assert_eq!(frame.refcount(), 1);

        let r = frame.ref_buffer(Perms::READ | Perms::PRESERVE);
        assert_eq!(frame.refcount(), 2);
        assert_eq!(r.perms(), Perms::READ);
        assert!(r.same_buffer(&frame));

        r.unref_buffer();
        assert_eq!(frame.refcount(), 1);
    }

    #[test]
    fn test_free_callback_runs_once_on_last_unref() {
        let freed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&freed);
        let (planes, size) = video_planes(PixelFormat::Gray8, 8, 8);
        let buffer = Buffer::new(
            HeapSegment::with_alignment(size + SLACK, ALIGN).unwrap(),
            planes,
            Format::Pixel(PixelFormat::Gray8),
        )
        .unwrap()
        .with_free_callback(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let first = BufferRef::new(buffer, Perms::all(), BufferProps::Video(VideoProps::default()));
        let second = first.ref_buffer(Perms::all());

        drop(first);
        assert_eq!(freed.load(Ordering::SeqCst), 0);
        drop(second);
        assert_eq!(freed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_props_are_not_shared() {
        let mut frame = make_test_frame();
        frame.pts = Some(10);
        let mut copy = frame.ref_buffer(Perms::all());
        copy.pts = Some(20);
        copy.video_mut().unwrap().w = 1;

        assert_eq!(frame.pts, Some(10));
        assert_eq!(frame.video().unwrap().w, 32);
    }

    #[test]
    fn test_write_requires_permission() {
        let frame = make_test_frame();
        let ro = frame.ref_buffer(!Perms::WRITE);
        assert!(matches!(ro.write(), Err(Error::PermissionDenied { .. })));

        let mut guard = frame.write().unwrap();
        guard.plane_mut(0).unwrap()[0] = 7;
        drop(guard);
        assert_eq!(ro.read().plane(0).unwrap()[0], 7);
    }

    #[test]
    fn test_video_layout_is_aligned() {
        let frame = alloc_video_buffer(PixelFormat::Yuv420p, Perms::READ, 33, 17).unwrap();
        assert_eq!(frame.plane_count(), 3);
        assert_eq!(frame.linesize(0), 48);
        assert_eq!(frame.linesize(1), 32);
        let last = frame.plane(2).unwrap();
        assert!(last.offset + last.len + SLACK <= frame.buffer().len());
    }

    #[test]
    fn test_zero_sized_picture_fails() {
        assert!(alloc_video_buffer(PixelFormat::Rgb24, Perms::READ, 0, 4).is_err());
    }

    #[test]
    fn test_planar_audio_layout() {
        let samples = alloc_audio_buffer(
            Perms::WRITE,
            400,
            ChannelLayout::STEREO,
            SampleFormat::S16,
            true,
        )
        .unwrap();
        let a = samples.audio().unwrap();
        assert_eq!(a.samples, 100);
        assert_eq!(samples.plane_count(), 2);
        assert_eq!(samples.plane(1).unwrap().offset, 200);
        assert_eq!(samples.buffer().len(), 400);
    }

    #[test]
    fn test_packed_audio_layout() {
        let samples = alloc_audio_buffer(
            Perms::WRITE,
            100,
            ChannelLayout::LAYOUT_5_1,
            SampleFormat::Flt,
            false,
        )
        .unwrap();
        assert_eq!(samples.plane_count(), 1);
        assert_eq!(samples.plane(0).unwrap().len, 100);
        assert_eq!(samples.audio().unwrap().samples, 4);
        assert_eq!(samples.buffer().len(), 112);
    }

    #[test]
    fn test_audio_without_channels_fails() {
        let result = alloc_audio_buffer(
            Perms::WRITE,
            64,
            ChannelLayout::NONE,
            SampleFormat::S16,
            false,
        );
        assert!(result.is_err());
    }
}
