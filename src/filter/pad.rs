//! Pads: the typed connection points of a filter.
//!
//! Every pad carries a handler object. Input handlers implement
//! [`InputPadOps`], output handlers implement [`OutputPadOps`]. Each method
//! has a default body that runs the runtime's documented fallback, so a
//! filter only overrides the callbacks it needs.

use crate::buffer::{BufferRef, Perms, SampleSpec};
use crate::error::Result;
use crate::format::MediaType;
use crate::graph::{self, FilterGraph, LinkId};
use std::sync::Arc;

/// Order in which slices of a frame are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SliceDir {
    /// First row first.
    #[default]
    TopDown,
    /// Last row first.
    BottomUp,
}

/// Callbacks of an input pad.
///
/// `link` is always the link attached to this pad.
pub trait InputPadOps: Send + Sync {
    /// Allocate a picture for the link. `None` falls back to the default allocator.
    fn get_video_buffer(
        &self,
        _graph: &mut FilterGraph,
        _link: LinkId,
        _perms: Perms,
        _w: u32,
        _h: u32,
    ) -> Result<Option<BufferRef>> {
        Ok(None)
    }

    /// Allocate samples for the link. `None` falls back to the default allocator.
    fn get_audio_buffer(
        &self,
        _graph: &mut FilterGraph,
        _link: LinkId,
        _perms: Perms,
        _spec: SampleSpec,
    ) -> Result<Option<BufferRef>> {
        Ok(None)
    }

    /// A frame starts; it is available in the link's `cur_buf`.
    fn start_frame(&self, graph: &mut FilterGraph, link: LinkId) -> Result<()> {
        graph::default_start_frame(graph, link)
    }

    /// Rows `y..y + h` of the current frame are ready.
    fn draw_slice(
        &self,
        graph: &mut FilterGraph,
        link: LinkId,
        y: u32,
        h: u32,
        dir: SliceDir,
    ) -> Result<()> {
        graph::default_draw_slice(graph, link, y, h, dir)
    }

    /// The current frame is complete.
    fn end_frame(&self, graph: &mut FilterGraph, link: LinkId) -> Result<()> {
        graph::default_end_frame(graph, link)
    }

    /// A batch of samples arrives.
    fn filter_samples(&self, graph: &mut FilterGraph, link: LinkId, samples: BufferRef) -> Result<()> {
        graph::default_filter_samples(graph, link, samples)
    }

    /// Validate or adjust the link after its source side is configured.
    fn config_props(&self, _graph: &mut FilterGraph, _link: LinkId) -> Result<()> {
        Ok(())
    }
}

/// Callbacks of an output pad.
pub trait OutputPadOps: Send + Sync {
    /// Set the link's properties (dimensions, layout, rate).
    fn config_props(&self, graph: &mut FilterGraph, link: LinkId) -> Result<()> {
        graph::default_config_output_link(graph, link)
    }

    /// Produce a frame on the link.
    fn request_frame(&self, graph: &mut FilterGraph, link: LinkId) -> Result<()> {
        graph::default_request_frame(graph, link)
    }

    /// How many frames the link could deliver without blocking.
    fn poll_frame(&self, graph: &mut FilterGraph, link: LinkId) -> Result<usize> {
        graph::default_poll_frame(graph, link)
    }
}

/// Handler that uses the runtime default for everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPad;

impl InputPadOps for DefaultPad {}

impl OutputPadOps for DefaultPad {}

/// Input handler that forwards everything unchanged to the filter's first output.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPad;

impl InputPadOps for NullPad {
    fn get_video_buffer(
        &self,
        graph: &mut FilterGraph,
        link: LinkId,
        perms: Perms,
        w: u32,
        h: u32,
    ) -> Result<Option<BufferRef>> {
        graph::null_get_video_buffer(graph, link, perms, w, h).map(Some)
    }

    fn get_audio_buffer(
        &self,
        graph: &mut FilterGraph,
        link: LinkId,
        perms: Perms,
        spec: SampleSpec,
    ) -> Result<Option<BufferRef>> {
        graph::null_get_audio_buffer(graph, link, perms, spec).map(Some)
    }

    fn start_frame(&self, graph: &mut FilterGraph, link: LinkId) -> Result<()> {
        graph::null_start_frame(graph, link)
    }

    fn draw_slice(
        &self,
        graph: &mut FilterGraph,
        link: LinkId,
        y: u32,
        h: u32,
        dir: SliceDir,
    ) -> Result<()> {
        graph::null_draw_slice(graph, link, y, h, dir)
    }

    fn end_frame(&self, graph: &mut FilterGraph, link: LinkId) -> Result<()> {
        graph::null_end_frame(graph, link)
    }

    fn filter_samples(&self, graph: &mut FilterGraph, link: LinkId, samples: BufferRef) -> Result<()> {
        graph::null_filter_samples(graph, link, samples)
    }
}

/// An input pad: name, media type, permission requirements and handler.
#[derive(Clone)]
pub struct InputPad {
    name: String,
    media_type: MediaType,
    min_perms: Perms,
    rej_perms: Perms,
    handler: Arc<dyn InputPadOps>,
}

impl InputPad {
    /// Create an input pad using the default handler.
    pub fn new(name: impl Into<String>, media_type: MediaType) -> Self {
        Self {
            name: name.into(),
            media_type,
            min_perms: Perms::empty(),
            rej_perms: Perms::empty(),
            handler: Arc::new(DefaultPad),
        }
    }

    /// Create a video input pad.
    pub fn video(name: impl Into<String>) -> Self {
        Self::new(name, MediaType::Video)
    }

    /// Create an audio input pad.
    pub fn audio(name: impl Into<String>) -> Self {
        Self::new(name, MediaType::Audio)
    }

    /// Permissions every incoming reference must carry.
    pub fn with_min_perms(mut self, perms: Perms) -> Self {
        self.min_perms = perms;
        self
    }

    /// Permissions an incoming reference must not carry.
    pub fn with_rej_perms(mut self, perms: Perms) -> Self {
        self.rej_perms = perms;
        self
    }

    /// Install a handler.
    pub fn with_handler(mut self, handler: impl InputPadOps + 'static) -> Self {
        self.handler = Arc::new(handler);
        self
    }

    /// Pad name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Media type.
    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    /// Required permissions.
    pub fn min_perms(&self) -> Perms {
        self.min_perms
    }

    /// Rejected permissions.
    pub fn rej_perms(&self) -> Perms {
        self.rej_perms
    }

    /// Whether a reference with `perms` must be copied before delivery here.
    pub fn needs_copy(&self, perms: Perms) -> bool {
        !perms.contains(self.min_perms) || perms.intersects(self.rej_perms)
    }

    /// The handler.
    pub fn handler(&self) -> &Arc<dyn InputPadOps> {
        &self.handler
    }
}

impl std::fmt::Debug for InputPad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputPad")
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("min_perms", &self.min_perms)
            .field("rej_perms", &self.rej_perms)
            .finish()
    }
}

/// An output pad: name, media type and handler.
#[derive(Clone)]
pub struct OutputPad {
    name: String,
    media_type: MediaType,
    handler: Arc<dyn OutputPadOps>,
}

impl OutputPad {
    /// Create an output pad using the default handler.
    pub fn new(name: impl Into<String>, media_type: MediaType) -> Self {
        Self {
            name: name.into(),
            media_type,
            handler: Arc::new(DefaultPad),
        }
    }

    /// Create a video output pad.
    pub fn video(name: impl Into<String>) -> Self {
        Self::new(name, MediaType::Video)
    }

    /// Create an audio output pad.
    pub fn audio(name: impl Into<String>) -> Self {
        Self::new(name, MediaType::Audio)
    }

    /// Install a handler.
    pub fn with_handler(mut self, handler: impl OutputPadOps + 'static) -> Self {
        self.handler = Arc::new(handler);
        self
    }

    /// Pad name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Media type.
    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    /// The handler.
    pub fn handler(&self) -> &Arc<dyn OutputPadOps> {
        &self.handler
    }
}

impl std::fmt::Debug for OutputPad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputPad")
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .finish()
    }
}
