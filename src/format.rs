//! Media types, pixel and sample formats, and channel layouts.
//!
//! This module provides the vocabulary links negotiate over:
//!
//! - [`MediaType`]: whether a pad or link carries video or audio
//! - [`PixelFormat`]: picture layouts, each with a [`PixelFormatDescriptor`]
//! - [`SampleFormat`]: audio sample encodings
//! - [`ChannelLayout`]: a 64-bit mask of speaker positions
//! - [`Format`]: the single value a link settles on after negotiation
//!
//! An unresolved link format is represented by `Option<Format>::None`, so
//! video and audio never share a numeric "none" value.
//!
//! ```rust
//! use filtergraph::format::{ChannelLayout, PixelFormat, SampleFormat};
//!
//! let layout: ChannelLayout = "5.1".parse().unwrap();
//! assert_eq!(layout.channels(), 6);
//! assert_eq!(PixelFormat::Yuv420p.plane_bytewidth(1, 15), 8);
//! assert_eq!(SampleFormat::S16.bytes(), 2);
//! ```

use std::fmt;
use std::str::FromStr;

/// Kind of data a pad or link carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MediaType {
    /// Pictures delivered with start_frame/draw_slice/end_frame.
    Video,
    /// Sample batches delivered with filter_samples.
    Audio,
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaType::Video => f.write_str("video"),
            MediaType::Audio => f.write_str("audio"),
        }
    }
}

/// A rational number, used for pixel aspect ratios.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rational {
    /// Numerator.
    pub num: i32,
    /// Denominator.
    pub den: i32,
}

impl Rational {
    /// Create a new rational.
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// Unknown aspect (0/1).
    pub const UNKNOWN: Self = Self::new(0, 1);
}

impl Default for Rational {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

// ============================================================================
// Pixel formats
// ============================================================================

/// How a pixel format's bytes are arranged across planes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelLayout {
    /// One byte per sample, each component in its own plane.
    Planar,
    /// Components interleaved in plane 0.
    Packed {
        /// Bytes per pixel.
        bytes_per_pixel: u8,
    },
    /// Luma plane followed by one interleaved chroma plane.
    SemiPlanar,
    /// One bit per pixel.
    Bitmap,
}

/// Static description of a pixel format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelFormatDescriptor {
    /// Canonical name.
    pub name: &'static str,
    /// Number of planes.
    pub planes: u8,
    /// Horizontal chroma subsampling shift.
    pub log2_chroma_w: u8,
    /// Vertical chroma subsampling shift.
    pub log2_chroma_h: u8,
    /// Plane arrangement.
    pub layout: PixelLayout,
}

const fn planar(name: &'static str, planes: u8, cw: u8, ch: u8) -> PixelFormatDescriptor {
    PixelFormatDescriptor {
        name,
        planes,
        log2_chroma_w: cw,
        log2_chroma_h: ch,
        layout: PixelLayout::Planar,
    }
}

const fn packed(name: &'static str, bytes_per_pixel: u8) -> PixelFormatDescriptor {
    PixelFormatDescriptor {
        name,
        planes: 1,
        log2_chroma_w: 0,
        log2_chroma_h: 0,
        layout: PixelLayout::Packed { bytes_per_pixel },
    }
}

/// Pixel formats a video link can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PixelFormat {
    /// Planar YUV 4:2:0.
    Yuv420p,
    /// Packed YUV 4:2:2 (Y0 U Y1 V).
    Yuyv422,
    /// Packed RGB, 8 bits per component.
    Rgb24,
    /// Packed BGR, 8 bits per component.
    Bgr24,
    /// Planar YUV 4:2:2.
    Yuv422p,
    /// Planar YUV 4:4:4.
    Yuv444p,
    /// Planar YUV 4:1:0.
    Yuv410p,
    /// Planar YUV 4:1:1.
    Yuv411p,
    /// 8-bit grayscale.
    Gray8,
    /// 1 bit per pixel, 0 is white.
    MonoWhite,
    /// 1 bit per pixel, 0 is black.
    MonoBlack,
    /// Full-range planar YUV 4:2:0.
    Yuvj420p,
    /// Full-range planar YUV 4:2:2.
    Yuvj422p,
    /// Full-range planar YUV 4:4:4.
    Yuvj444p,
    /// Planar YUV 4:4:0.
    Yuv440p,
    /// Full-range planar YUV 4:4:0.
    Yuvj440p,
    /// Y plane followed by interleaved UV.
    Nv12,
    /// Y plane followed by interleaved VU.
    Nv21,
    /// Packed ARGB.
    Argb,
    /// Packed RGBA.
    Rgba,
    /// Packed ABGR.
    Abgr,
    /// Packed BGRA.
    Bgra,
}

impl PixelFormat {
    /// Every pixel format, in declaration order.
    pub const ALL: &'static [PixelFormat] = &[
        PixelFormat::Yuv420p,
        PixelFormat::Yuyv422,
        PixelFormat::Rgb24,
        PixelFormat::Bgr24,
        PixelFormat::Yuv422p,
        PixelFormat::Yuv444p,
        PixelFormat::Yuv410p,
        PixelFormat::Yuv411p,
        PixelFormat::Gray8,
        PixelFormat::MonoWhite,
        PixelFormat::MonoBlack,
        PixelFormat::Yuvj420p,
        PixelFormat::Yuvj422p,
        PixelFormat::Yuvj444p,
        PixelFormat::Yuv440p,
        PixelFormat::Yuvj440p,
        PixelFormat::Nv12,
        PixelFormat::Nv21,
        PixelFormat::Argb,
        PixelFormat::Rgba,
        PixelFormat::Abgr,
        PixelFormat::Bgra,
    ];

    /// Static descriptor for this format.
    pub const fn descriptor(self) -> PixelFormatDescriptor {
        match self {
            PixelFormat::Yuv420p => planar("yuv420p", 3, 1, 1),
            PixelFormat::Yuyv422 => PixelFormatDescriptor {
                name: "yuyv422",
                planes: 1,
                log2_chroma_w: 1,
                log2_chroma_h: 0,
                layout: PixelLayout::Packed { bytes_per_pixel: 2 },
            },
            PixelFormat::Rgb24 => packed("rgb24", 3),
            PixelFormat::Bgr24 => packed("bgr24", 3),
            PixelFormat::Yuv422p => planar("yuv422p", 3, 1, 0),
            PixelFormat::Yuv444p => planar("yuv444p", 3, 0, 0),
            PixelFormat::Yuv410p => planar("yuv410p", 3, 2, 2),
            PixelFormat::Yuv411p => planar("yuv411p", 3, 2, 0),
            PixelFormat::Gray8 => planar("gray", 1, 0, 0),
            PixelFormat::MonoWhite => PixelFormatDescriptor {
                name: "monow",
                planes: 1,
                log2_chroma_w: 0,
                log2_chroma_h: 0,
                layout: PixelLayout::Bitmap,
            },
            PixelFormat::MonoBlack => PixelFormatDescriptor {
                name: "monob",
                planes: 1,
                log2_chroma_w: 0,
                log2_chroma_h: 0,
                layout: PixelLayout::Bitmap,
            },
            PixelFormat::Yuvj420p => planar("yuvj420p", 3, 1, 1),
            PixelFormat::Yuvj422p => planar("yuvj422p", 3, 1, 0),
            PixelFormat::Yuvj444p => planar("yuvj444p", 3, 0, 0),
            PixelFormat::Yuv440p => planar("yuv440p", 3, 0, 1),
            PixelFormat::Yuvj440p => planar("yuvj440p", 3, 0, 1),
            PixelFormat::Nv12 => PixelFormatDescriptor {
                name: "nv12",
                planes: 2,
                log2_chroma_w: 1,
                log2_chroma_h: 1,
                layout: PixelLayout::SemiPlanar,
            },
            PixelFormat::Nv21 => PixelFormatDescriptor {
                name: "nv21",
                planes: 2,
                log2_chroma_w: 1,
                log2_chroma_h: 1,
                layout: PixelLayout::SemiPlanar,
            },
            PixelFormat::Argb => packed("argb", 4),
            PixelFormat::Rgba => packed("rgba", 4),
            PixelFormat::Abgr => packed("abgr", 4),
            PixelFormat::Bgra => packed("bgra", 4),
        }
    }

    /// Canonical name.
    pub const fn name(self) -> &'static str {
        self.descriptor().name
    }

    /// Number of planes.
    pub const fn planes(self) -> usize {
        self.descriptor().planes as usize
    }

    /// Horizontal and vertical chroma subsampling shifts.
    pub const fn chroma_shift(self) -> (u32, u32) {
        let d = self.descriptor();
        (d.log2_chroma_w as u32, d.log2_chroma_h as u32)
    }

    /// Whether this is a full-range (JPEG) YUV format.
    pub const fn is_full_range(self) -> bool {
        matches!(
            self,
            PixelFormat::Yuvj420p
                | PixelFormat::Yuvj422p
                | PixelFormat::Yuvj444p
                | PixelFormat::Yuvj440p
        )
    }

    /// Whether this is a 1-bit format.
    pub const fn is_mono(self) -> bool {
        matches!(self, PixelFormat::MonoWhite | PixelFormat::MonoBlack)
    }

    /// Bytes of picture data in one row of `plane` for a picture `w` pixels wide.
    ///
    /// Returns 0 for planes the format does not have.
    pub fn plane_bytewidth(self, plane: usize, w: u32) -> usize {
        let d = self.descriptor();
        if plane >= d.planes as usize {
            return 0;
        }
        let w = w as usize;
        match d.layout {
            PixelLayout::Planar if plane == 0 => w,
            PixelLayout::Planar => ceil_shift(w, d.log2_chroma_w as u32),
            PixelLayout::Packed { bytes_per_pixel } => w * bytes_per_pixel as usize,
            PixelLayout::SemiPlanar if plane == 0 => w,
            PixelLayout::SemiPlanar => ceil_shift(w, d.log2_chroma_w as u32) * 2,
            PixelLayout::Bitmap => w.div_ceil(8),
        }
    }

    /// Number of rows in `plane` for a picture `h` pixels tall.
    pub fn plane_height(self, plane: usize, h: u32) -> usize {
        let d = self.descriptor();
        if plane >= d.planes as usize {
            return 0;
        }
        match (plane, d.layout) {
            (0, _) | (_, PixelLayout::Packed { .. }) | (_, PixelLayout::Bitmap) => h as usize,
            _ => ceil_shift(h as usize, d.log2_chroma_h as u32),
        }
    }

    /// Vertical subsampling shift applied to rows of `plane`.
    pub fn plane_vshift(self, plane: usize) -> u32 {
        if plane == 0 { 0 } else { self.chroma_shift().1 }
    }
}

/// `ceil(v / 2^shift)`.
pub(crate) fn ceil_shift(v: usize, shift: u32) -> usize {
    (v + (1 << shift) - 1) >> shift
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error parsing a format, layout or other media name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseFormatError {
    kind: &'static str,
    value: String,
}

impl ParseFormatError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

impl FromStr for PixelFormat {
    type Err = ParseFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(f) = PixelFormat::ALL.iter().find(|f| f.name().eq_ignore_ascii_case(s)) {
            return Ok(*f);
        }
        match s.to_ascii_lowercase().as_str() {
            "gray8" => Ok(PixelFormat::Gray8),
            "monowhite" => Ok(PixelFormat::MonoWhite),
            "monoblack" => Ok(PixelFormat::MonoBlack),
            "i420" => Ok(PixelFormat::Yuv420p),
            _ => Err(ParseFormatError::new("pixel format", s)),
        }
    }
}

// ============================================================================
// Sample formats
// ============================================================================

/// Audio sample encodings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SampleFormat {
    /// Unsigned 8-bit, centered at 0x80.
    U8,
    /// Signed 16-bit.
    S16,
    /// Signed 32-bit.
    S32,
    /// 32-bit float.
    Flt,
    /// 64-bit float.
    Dbl,
}

impl SampleFormat {
    /// Every sample format, in declaration order.
    pub const ALL: &'static [SampleFormat] = &[
        SampleFormat::U8,
        SampleFormat::S16,
        SampleFormat::S32,
        SampleFormat::Flt,
        SampleFormat::Dbl,
    ];

    /// Canonical name.
    pub const fn name(self) -> &'static str {
        match self {
            SampleFormat::U8 => "u8",
            SampleFormat::S16 => "s16",
            SampleFormat::S32 => "s32",
            SampleFormat::Flt => "flt",
            SampleFormat::Dbl => "dbl",
        }
    }

    /// Bits per sample.
    pub const fn bits(self) -> u32 {
        match self {
            SampleFormat::U8 => 8,
            SampleFormat::S16 => 16,
            SampleFormat::S32 | SampleFormat::Flt => 32,
            SampleFormat::Dbl => 64,
        }
    }

    /// Bytes per sample.
    pub const fn bytes(self) -> usize {
        (self.bits() / 8) as usize
    }

    /// Whether samples are floating point.
    pub const fn is_float(self) -> bool {
        matches!(self, SampleFormat::Flt | SampleFormat::Dbl)
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SampleFormat {
    type Err = ParseFormatError;

    /// Parses a name (`s16`) or the numeric index used by filter arguments (`1`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(f) = SampleFormat::ALL.iter().find(|f| f.name().eq_ignore_ascii_case(s)) {
            return Ok(*f);
        }
        s.parse::<usize>()
            .ok()
            .and_then(|i| SampleFormat::ALL.get(i).copied())
            .ok_or_else(|| ParseFormatError::new("sample format", s))
    }
}

// ============================================================================
// Channel layouts
// ============================================================================

/// A set of speaker positions, one bit per channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct ChannelLayout(u64);

const CHANNEL_NAMES: &[(u32, &str)] = &[
    (0, "FL"),
    (1, "FR"),
    (2, "FC"),
    (3, "LFE"),
    (4, "BL"),
    (5, "BR"),
    (6, "FLC"),
    (7, "FRC"),
    (8, "BC"),
    (9, "SL"),
    (10, "SR"),
    (11, "TC"),
    (12, "TFL"),
    (13, "TFC"),
    (14, "TFR"),
    (15, "TBL"),
    (16, "TBC"),
    (17, "TBR"),
    (29, "DL"),
    (30, "DR"),
];

impl ChannelLayout {
    /// Front left.
    pub const FRONT_LEFT: Self = Self(1 << 0);
    /// Front right.
    pub const FRONT_RIGHT: Self = Self(1 << 1);
    /// Front center.
    pub const FRONT_CENTER: Self = Self(1 << 2);
    /// Low frequency.
    pub const LOW_FREQUENCY: Self = Self(1 << 3);
    /// Back left.
    pub const BACK_LEFT: Self = Self(1 << 4);
    /// Back right.
    pub const BACK_RIGHT: Self = Self(1 << 5);
    /// Front left of center.
    pub const FRONT_LEFT_OF_CENTER: Self = Self(1 << 6);
    /// Front right of center.
    pub const FRONT_RIGHT_OF_CENTER: Self = Self(1 << 7);
    /// Back center.
    pub const BACK_CENTER: Self = Self(1 << 8);
    /// Side left.
    pub const SIDE_LEFT: Self = Self(1 << 9);
    /// Side right.
    pub const SIDE_RIGHT: Self = Self(1 << 10);
    /// Top center.
    pub const TOP_CENTER: Self = Self(1 << 11);
    /// Stereo downmix left.
    pub const STEREO_LEFT: Self = Self(1 << 29);
    /// Stereo downmix right.
    pub const STEREO_RIGHT: Self = Self(1 << 30);

    /// Empty layout (unknown).
    pub const NONE: Self = Self(0);
    /// Single center channel.
    pub const MONO: Self = Self::FRONT_CENTER;
    /// Left and right.
    pub const STEREO: Self = Self(Self::FRONT_LEFT.0 | Self::FRONT_RIGHT.0);
    /// Stereo plus back center.
    pub const LAYOUT_2_1: Self = Self(Self::STEREO.0 | Self::BACK_CENTER.0);
    /// Stereo plus front center.
    pub const SURROUND: Self = Self(Self::STEREO.0 | Self::FRONT_CENTER.0);
    /// Surround plus back center.
    pub const LAYOUT_4_0: Self = Self(Self::SURROUND.0 | Self::BACK_CENTER.0);
    /// Stereo plus side pair.
    pub const LAYOUT_2_2: Self = Self(Self::STEREO.0 | Self::SIDE_LEFT.0 | Self::SIDE_RIGHT.0);
    /// Front and back pairs.
    pub const QUAD: Self = Self(Self::STEREO.0 | Self::BACK_LEFT.0 | Self::BACK_RIGHT.0);
    /// Surround plus side pair.
    pub const LAYOUT_5_0: Self = Self(Self::SURROUND.0 | Self::SIDE_LEFT.0 | Self::SIDE_RIGHT.0);
    /// 5.0 plus LFE.
    pub const LAYOUT_5_1: Self = Self(Self::LAYOUT_5_0.0 | Self::LOW_FREQUENCY.0);
    /// Surround plus back pair.
    pub const LAYOUT_5_0_BACK: Self =
        Self(Self::SURROUND.0 | Self::BACK_LEFT.0 | Self::BACK_RIGHT.0);
    /// 5.0 (back) plus LFE.
    pub const LAYOUT_5_1_BACK: Self = Self(Self::LAYOUT_5_0_BACK.0 | Self::LOW_FREQUENCY.0);
    /// 5.0 plus back pair.
    pub const LAYOUT_7_0: Self = Self(Self::LAYOUT_5_0.0 | Self::BACK_LEFT.0 | Self::BACK_RIGHT.0);
    /// 5.1 plus back pair.
    pub const LAYOUT_7_1: Self = Self(Self::LAYOUT_5_1.0 | Self::BACK_LEFT.0 | Self::BACK_RIGHT.0);
    /// 5.1 (back) plus front left/right of center.
    pub const LAYOUT_7_1_WIDE: Self = Self(
        Self::LAYOUT_5_1_BACK.0 | Self::FRONT_LEFT_OF_CENTER.0 | Self::FRONT_RIGHT_OF_CENTER.0,
    );
    /// Matrix-encoded stereo downmix.
    pub const STEREO_DOWNMIX: Self = Self(Self::STEREO_LEFT.0 | Self::STEREO_RIGHT.0);

    const NAMED: &'static [(&'static str, ChannelLayout)] = &[
        ("mono", Self::MONO),
        ("stereo", Self::STEREO),
        ("2.1", Self::LAYOUT_2_1),
        ("3.0", Self::SURROUND),
        ("4.0", Self::LAYOUT_4_0),
        ("quad", Self::QUAD),
        ("5.0", Self::LAYOUT_5_0),
        ("5.0(back)", Self::LAYOUT_5_0_BACK),
        ("5.1", Self::LAYOUT_5_1),
        ("5.1(back)", Self::LAYOUT_5_1_BACK),
        ("7.0", Self::LAYOUT_7_0),
        ("7.1", Self::LAYOUT_7_1),
        ("7.1(wide)", Self::LAYOUT_7_1_WIDE),
        ("downmix", Self::STEREO_DOWNMIX),
    ];

    /// The conventional layout for a channel count, if there is one.
    pub const fn default_for(channels: usize) -> Option<Self> {
        match channels {
            1 => Some(Self::MONO),
            2 => Some(Self::STEREO),
            3 => Some(Self::SURROUND),
            4 => Some(Self::QUAD),
            5 => Some(Self::LAYOUT_5_0),
            6 => Some(Self::LAYOUT_5_1),
            8 => Some(Self::LAYOUT_7_1),
            _ => None,
        }
    }

    /// Build a layout from a raw channel mask.
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Raw channel mask.
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Number of channels (population count of the mask).
    pub const fn channels(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Whether the layout has no channels.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether every channel of `other` is in this layout.
    pub const fn contains(self, other: ChannelLayout) -> bool {
        self.0 & other.0 == other.0
    }

    /// Name of a well-known layout, if this is one.
    pub fn name(self) -> Option<&'static str> {
        Self::NAMED.iter().find(|(_, l)| *l == self).map(|(n, _)| *n)
    }

    /// Names of the individual channels, lowest bit first.
    pub fn channel_names(self) -> impl Iterator<Item = &'static str> {
        CHANNEL_NAMES
            .iter()
            .filter(move |(bit, _)| self.0 & (1 << bit) != 0)
            .map(|(_, name)| *name)
    }
}

impl std::ops::BitOr for ChannelLayout {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for ChannelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = self.name() {
            return f.write_str(name);
        }
        let names: Vec<_> = self.channel_names().collect();
        if names.len() == self.channels() && !names.is_empty() {
            f.write_str(&names.join("+"))
        } else {
            write!(f, "0x{:x}", self.0)
        }
    }
}

impl FromStr for ChannelLayout {
    type Err = ParseFormatError;

    /// Parses a layout name (`5.1`), a channel list (`FL+FR+LFE`) or a raw mask (`3`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some((_, layout)) = Self::NAMED.iter().find(|(n, _)| n.eq_ignore_ascii_case(s)) {
            return Ok(*layout);
        }
        if let Ok(bits) = s.parse::<u64>() {
            return Ok(Self(bits));
        }
        if let Some(hex) = s.strip_prefix("0x") {
            return u64::from_str_radix(hex, 16)
                .map(Self)
                .map_err(|_| ParseFormatError::new("channel layout", s));
        }
        let mut bits = 0u64;
        for part in s.split('+') {
            let (bit, _) = CHANNEL_NAMES
                .iter()
                .find(|(_, name)| name.eq_ignore_ascii_case(part.trim()))
                .ok_or_else(|| ParseFormatError::new("channel layout", s))?;
            bits |= 1 << bit;
        }
        Ok(Self(bits))
    }
}

// ============================================================================
// Negotiated format
// ============================================================================

/// The concrete format a link carries once negotiated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    /// Video link format.
    Pixel(PixelFormat),
    /// Audio link format.
    Sample(SampleFormat),
}

impl Format {
    /// Media type this format belongs to.
    pub const fn media_type(self) -> MediaType {
        match self {
            Format::Pixel(_) => MediaType::Video,
            Format::Sample(_) => MediaType::Audio,
        }
    }

    /// The pixel format, for video links.
    pub const fn pixel(self) -> Option<PixelFormat> {
        match self {
            Format::Pixel(p) => Some(p),
            Format::Sample(_) => None,
        }
    }

    /// The sample format, for audio links.
    pub const fn sample(self) -> Option<SampleFormat> {
        match self {
            Format::Sample(s) => Some(s),
            Format::Pixel(_) => None,
        }
    }

    /// Every format of a media type, in declaration order.
    pub fn all(media_type: MediaType) -> Vec<Format> {
        match media_type {
            MediaType::Video => PixelFormat::ALL.iter().copied().map(Format::Pixel).collect(),
            MediaType::Audio => SampleFormat::ALL.iter().copied().map(Format::Sample).collect(),
        }
    }
}

impl From<PixelFormat> for Format {
    fn from(p: PixelFormat) -> Self {
        Format::Pixel(p)
    }
}

impl From<SampleFormat> for Format {
    fn from(s: SampleFormat) -> Self {
        Format::Sample(s)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Pixel(p) => p.fmt(f),
            Format::Sample(s) => s.fmt(f),
        }
    }
}
