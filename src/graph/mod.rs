//! The filter graph: filter instances, the links between them, and topology edits.
//!
//! A [`FilterGraph`] owns every [`FilterContext`] and every [`Link`] in two
//! arenas addressed by [`FilterId`] and [`LinkId`]. Pad callbacks receive the
//! graph mutably together with the id of the link they are invoked for, so a
//! callback can push frames further downstream or pull from upstream without
//! holding references into the arenas.
//!
//! Configuration runs in two stages, see [`FilterGraph::configure`]:
//!
//! 1. format negotiation ([`FilterGraph::negotiate_formats`])
//! 2. link configuration ([`FilterGraph::config_links`])
//!
//! # Example
//!
//! ```rust
//! use filtergraph::graph::FilterGraph;
//!
//! let mut graph = FilterGraph::new();
//! let src = graph.open_by_name("buffer", Some("in")).unwrap();
//! let sink = graph.open_by_name("buffersink", Some("out")).unwrap();
//! graph.init_filter(src, Some("64:48:yuv420p"), None).unwrap();
//! graph.link(src, 0, sink, 0).unwrap();
//! graph.configure().unwrap();
//! ```

mod config;
mod defaults;
mod propagate;

pub use defaults::{
    default_config_output_link, default_draw_slice, default_end_frame, default_filter_samples,
    default_get_audio_buffer, default_get_video_buffer, default_poll_frame,
    default_query_formats, default_request_frame, default_start_frame, null_draw_slice,
    null_end_frame, null_filter_samples, null_get_audio_buffer, null_get_video_buffer,
    null_start_frame,
};

use crate::buffer::BufferRef;
use crate::config::GraphConfig;
use crate::error::{Error, PadDirection, Result};
use crate::filter::{FilterRegistry, FilterTemplate, InputPad, OutputPad};
use crate::format::{ChannelLayout, Format, MediaType};
use crate::negotiation::{FormatListId, FormatPool, FormatSlot, Side};
use crate::observability;
use std::any::Any;
use std::sync::Arc;

/// Identifier of a filter instance inside a [`FilterGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FilterId(pub(crate) usize);

impl FilterId {
    /// Get the underlying index.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Identifier of a link inside a [`FilterGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(pub(crate) usize);

impl LinkId {
    /// Get the underlying index.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Configuration state of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LinkState {
    /// Not configured yet.
    #[default]
    Uninit,
    /// Being configured; meeting it again means the graph has a cycle.
    StartInit,
    /// Configured and ready for traffic.
    Init,
}

/// A connection from an output pad of one filter to an input pad of another.
pub struct Link {
    src: FilterId,
    srcpad: usize,
    dst: FilterId,
    dstpad: usize,
    media_type: MediaType,

    /// Negotiated format, `None` until resolved.
    pub format: Option<Format>,
    /// Picture width (video).
    pub w: u32,
    /// Picture height (video).
    pub h: u32,
    /// Samples per second (audio).
    pub sample_rate: u32,
    /// Speaker layout (audio).
    pub channel_layout: ChannelLayout,

    /// Formats the source side accepts, set by the source's `query_formats`.
    pub(crate) in_formats: Option<FormatListId>,
    /// Formats the destination side accepts, set by the destination's `query_formats`.
    pub(crate) out_formats: Option<FormatListId>,
    pub(crate) init_state: LinkState,

    /// Reference being delivered to the destination, from `start_frame` to `end_frame`.
    ///
    /// A destination that keeps the frame takes it out of the link in its
    /// `end_frame`; whatever is left is released once `end_frame` returns.
    pub cur_buf: Option<BufferRef>,
    /// Original reference while the destination is fed a permission copy.
    pub(crate) src_buf: Option<BufferRef>,
    /// Buffer allocated by a filter for this (outgoing) link.
    pub out_buf: Option<BufferRef>,
}

impl Link {
    fn new(src: FilterId, srcpad: usize, dst: FilterId, dstpad: usize, media_type: MediaType) -> Self {
        Self {
            src,
            srcpad,
            dst,
            dstpad,
            media_type,
            format: None,
            w: 0,
            h: 0,
            sample_rate: 0,
            channel_layout: ChannelLayout::NONE,
            in_formats: None,
            out_formats: None,
            init_state: LinkState::Uninit,
            cur_buf: None,
            src_buf: None,
            out_buf: None,
        }
    }

    /// Source filter.
    pub fn src(&self) -> FilterId {
        self.src
    }

    /// Index of the source's output pad.
    pub fn srcpad(&self) -> usize {
        self.srcpad
    }

    /// Destination filter.
    pub fn dst(&self) -> FilterId {
        self.dst
    }

    /// Index of the destination's input pad.
    pub fn dstpad(&self) -> usize {
        self.dstpad
    }

    /// Media type carried by the link.
    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    /// Configuration state.
    pub fn init_state(&self) -> LinkState {
        self.init_state
    }

    /// The original reference while a permission copy is in flight.
    pub fn src_buf(&self) -> Option<&BufferRef> {
        self.src_buf.as_ref()
    }

    fn slot(&mut self, side: Side) -> &mut Option<FormatListId> {
        match side {
            Side::In => &mut self.in_formats,
            Side::Out => &mut self.out_formats,
        }
    }
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("src", &self.src)
            .field("srcpad", &self.srcpad)
            .field("dst", &self.dst)
            .field("dstpad", &self.dstpad)
            .field("media_type", &self.media_type)
            .field("format", &self.format)
            .field("w", &self.w)
            .field("h", &self.h)
            .field("init_state", &self.init_state)
            .finish()
    }
}

/// A running instance of a [`FilterTemplate`].
pub struct FilterContext {
    name: String,
    template: Arc<FilterTemplate>,
    input_pads: Vec<InputPad>,
    output_pads: Vec<OutputPad>,
    inputs: Vec<Option<LinkId>>,
    outputs: Vec<Option<LinkId>>,
    state: Box<dyn Any + Send>,
}

impl FilterContext {
    /// Instance name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The template this instance was opened from.
    pub fn template(&self) -> &Arc<FilterTemplate> {
        &self.template
    }

    /// This instance's input pads.
    pub fn input_pads(&self) -> &[InputPad] {
        &self.input_pads
    }

    /// This instance's output pads.
    pub fn output_pads(&self) -> &[OutputPad] {
        &self.output_pads
    }

    /// Links attached to the input pads.
    pub fn inputs(&self) -> &[Option<LinkId>] {
        &self.inputs
    }

    /// Links attached to the output pads.
    pub fn outputs(&self) -> &[Option<LinkId>] {
        &self.outputs
    }

    /// Link on input pad `index`.
    pub fn input(&self, index: usize) -> Option<LinkId> {
        self.inputs.get(index).copied().flatten()
    }

    /// Link on output pad `index`.
    pub fn output(&self, index: usize) -> Option<LinkId> {
        self.outputs.get(index).copied().flatten()
    }
}

impl std::fmt::Debug for FilterContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterContext")
            .field("name", &self.name)
            .field("filter", &self.template.name())
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish()
    }
}

/// A graph of filter instances joined by links.
pub struct FilterGraph {
    filters: Vec<Option<FilterContext>>,
    links: Vec<Option<Link>>,
    pub(crate) formats: FormatPool,
    config: GraphConfig,
    registry: Arc<FilterRegistry>,
}

impl FilterGraph {
    /// Create an empty graph using the process-wide registry and default configuration.
    pub fn new() -> Self {
        Self::with_config(GraphConfig::default())
    }

    /// Create an empty graph with a configuration.
    pub fn with_config(config: GraphConfig) -> Self {
        Self {
            filters: Vec::new(),
            links: Vec::new(),
            formats: FormatPool::default(),
            config,
            registry: FilterRegistry::global(),
        }
    }

    /// Resolve filter names against `registry` instead of the process-wide one.
    pub fn with_registry(mut self, registry: Arc<FilterRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Graph configuration.
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Registry used by [`open_by_name`](Self::open_by_name).
    pub fn registry(&self) -> &Arc<FilterRegistry> {
        &self.registry
    }

    // ------------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------------

    /// Get a filter instance.
    pub fn get_filter(&self, id: FilterId) -> Result<&FilterContext> {
        self.filters
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(Error::InvalidFilter(id))
    }

    pub(crate) fn filter_mut(&mut self, id: FilterId) -> Result<&mut FilterContext> {
        self.filters
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(Error::InvalidFilter(id))
    }

    /// Get a link.
    pub fn get_link(&self, id: LinkId) -> Result<&Link> {
        self.links
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(Error::InvalidLink(id))
    }

    /// Get a link mutably, e.g. to set its properties from `config_props`.
    pub fn link_mut(&mut self, id: LinkId) -> Result<&mut Link> {
        self.links
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(Error::InvalidLink(id))
    }

    /// Find a filter instance by name.
    pub fn filter_by_name(&self, name: &str) -> Option<FilterId> {
        self.filters
            .iter()
            .position(|f| f.as_ref().is_some_and(|f| f.name == name))
            .map(FilterId)
    }

    /// Ids of all live filter instances, in creation order.
    pub fn filter_ids(&self) -> Vec<FilterId> {
        (0..self.filters.len())
            .filter(|&i| self.filters[i].is_some())
            .map(FilterId)
            .collect()
    }

    /// Ids of all live links, in creation order.
    pub fn link_ids(&self) -> Vec<LinkId> {
        (0..self.links.len())
            .filter(|&i| self.links[i].is_some())
            .map(LinkId)
            .collect()
    }

    /// Number of live filter instances.
    pub fn filter_count(&self) -> usize {
        self.filters.iter().flatten().count()
    }

    /// Number of live links.
    pub fn link_count(&self) -> usize {
        self.links.iter().flatten().count()
    }

    /// Link on input pad `index` of `filter`.
    pub fn input_link(&self, filter: FilterId, index: usize) -> Option<LinkId> {
        self.get_filter(filter).ok()?.input(index)
    }

    /// Link on output pad `index` of `filter`.
    pub fn output_link(&self, filter: FilterId, index: usize) -> Option<LinkId> {
        self.get_filter(filter).ok()?.output(index)
    }

    /// Name of a filter instance, for logs and errors.
    pub(crate) fn filter_name(&self, id: FilterId) -> String {
        self.get_filter(id)
            .map_or_else(|_| format!("{:?}", id), |f| f.name.clone())
    }

    /// The destination pad of a link.
    pub(crate) fn dst_pad(&self, link: LinkId) -> Result<&InputPad> {
        let l = self.get_link(link)?;
        let dst = self.get_filter(l.dst)?;
        dst.input_pads.get(l.dstpad).ok_or_else(|| Error::PadOutOfRange {
            filter: dst.name.clone(),
            direction: PadDirection::Input,
            index: l.dstpad,
            count: dst.input_pads.len(),
        })
    }

    /// The source pad of a link.
    pub(crate) fn src_pad(&self, link: LinkId) -> Result<&OutputPad> {
        let l = self.get_link(link)?;
        let src = self.get_filter(l.src)?;
        src.output_pads.get(l.srcpad).ok_or_else(|| Error::PadOutOfRange {
            filter: src.name.clone(),
            direction: PadDirection::Output,
            index: l.srcpad,
            count: src.output_pads.len(),
        })
    }

    /// The first output link of the filter a link feeds, if connected.
    pub(crate) fn first_output_of_dst(&self, link: LinkId) -> Result<Option<LinkId>> {
        let dst = self.get_link(link)?.dst;
        Ok(self.get_filter(dst)?.output(0))
    }

    /// The first output link of the filter a link feeds, or an error if unconnected.
    pub(crate) fn require_first_output(&self, link: LinkId) -> Result<LinkId> {
        let dst = self.get_link(link)?.dst;
        self.get_filter(dst)?
            .output(0)
            .ok_or_else(|| Error::NotConnected {
                filter: self.filter_name(dst),
                direction: PadDirection::Output,
                index: 0,
            })
    }

    pub(crate) fn format_slot(&mut self, slot: FormatSlot) -> Result<&mut Option<FormatListId>> {
        Ok(self.link_mut(slot.link)?.slot(slot.side))
    }

    // ------------------------------------------------------------------------
    // Private state
    // ------------------------------------------------------------------------

    /// Borrow a filter's private state as `T`.
    pub fn state<T: Any>(&self, id: FilterId) -> Result<&T> {
        let ctx = self.get_filter(id)?;
        ctx.state
            .downcast_ref::<T>()
            .ok_or_else(|| Error::StateType {
                filter: ctx.name.clone(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Mutably borrow a filter's private state as `T`.
    pub fn state_mut<T: Any>(&mut self, id: FilterId) -> Result<&mut T> {
        let ctx = self.filter_mut(id)?;
        let name = &ctx.name;
        ctx.state
            .downcast_mut::<T>()
            .ok_or_else(|| Error::StateType {
                filter: name.clone(),
                expected: std::any::type_name::<T>(),
            })
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Instantiate a filter template.
    ///
    /// The template's pads are copied into the instance, so later pad
    /// insertion never touches the shared template. `inst_name` defaults to
    /// the template name.
    pub fn open(&mut self, template: Arc<FilterTemplate>, inst_name: Option<&str>) -> FilterId {
        let name = inst_name.unwrap_or(template.name()).to_string();
        let input_pads = template.inputs().to_vec();
        let output_pads = template.outputs().to_vec();
        let ctx = FilterContext {
            inputs: vec![None; input_pads.len()],
            outputs: vec![None; output_pads.len()],
            state: template.ops().new_state(),
            name,
            template,
            input_pads,
            output_pads,
        };
        tracing::debug!(filter = %ctx.template.name(), instance = %ctx.name, "opened filter");
        let id = FilterId(self.filters.len());
        self.filters.push(Some(ctx));
        id
    }

    /// Instantiate a registered filter by name.
    pub fn open_by_name(&mut self, filter: &str, inst_name: Option<&str>) -> Result<FilterId> {
        let template = self
            .registry
            .get_by_name(filter)
            .ok_or_else(|| Error::FilterNotFound(filter.to_string()))?;
        Ok(self.open(template, inst_name))
    }

    /// Run a filter's init callback with its argument string and opaque data.
    pub fn init_filter(
        &mut self,
        id: FilterId,
        args: Option<&str>,
        opaque: Option<&mut dyn Any>,
    ) -> Result<()> {
        let ops = Arc::clone(self.get_filter(id)?.template.ops());
        ops.init(self, id, args, opaque).inspect_err(|e| {
            tracing::error!(filter = %self.filter_name(id), args = ?args, error = %e, "init failed");
        })
    }

    /// Uninitialize and remove a filter instance with all its links.
    ///
    /// The other endpoint of every removed link is left with an empty pad slot.
    pub fn destroy(&mut self, id: FilterId) -> Result<()> {
        let ops = Arc::clone(self.get_filter(id)?.template.ops());
        ops.uninit(self, id);

        let ctx = self.filter_mut(id)?;
        let links: Vec<LinkId> = ctx
            .inputs
            .iter()
            .chain(ctx.outputs.iter())
            .flatten()
            .copied()
            .collect();
        for link in links {
            self.remove_link(link)?;
        }
        let ctx = self.filters[id.0].take();
        tracing::debug!(instance = ?ctx.as_ref().map(|c| c.name.as_str()), "destroyed filter");
        Ok(())
    }

    fn remove_link(&mut self, id: LinkId) -> Result<()> {
        self.formats_unref(FormatSlot::new(id, Side::In))?;
        self.formats_unref(FormatSlot::new(id, Side::Out))?;
        let link = self.links[id.0].take().ok_or(Error::InvalidLink(id))?;
        if let Ok(src) = self.filter_mut(link.src) {
            if let Some(slot) = src.outputs.get_mut(link.srcpad).filter(|s| **s == Some(id)) {
                *slot = None;
            }
        }
        if let Ok(dst) = self.filter_mut(link.dst) {
            if let Some(slot) = dst.inputs.get_mut(link.dstpad).filter(|s| **s == Some(id)) {
                *slot = None;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Topology
    // ------------------------------------------------------------------------

    fn check_output_free(&self, filter: FilterId, pad: usize) -> Result<&OutputPad> {
        let f = self.get_filter(filter)?;
        if pad >= f.outputs.len() {
            return Err(Error::PadOutOfRange {
                filter: f.name.clone(),
                direction: PadDirection::Output,
                index: pad,
                count: f.outputs.len(),
            });
        }
        if f.outputs[pad].is_some() {
            return Err(Error::PadOccupied {
                filter: f.name.clone(),
                direction: PadDirection::Output,
                index: pad,
            });
        }
        Ok(&f.output_pads[pad])
    }

    fn check_input_free(&self, filter: FilterId, pad: usize) -> Result<&InputPad> {
        let f = self.get_filter(filter)?;
        if pad >= f.inputs.len() {
            return Err(Error::PadOutOfRange {
                filter: f.name.clone(),
                direction: PadDirection::Input,
                index: pad,
                count: f.inputs.len(),
            });
        }
        if f.inputs[pad].is_some() {
            return Err(Error::PadOccupied {
                filter: f.name.clone(),
                direction: PadDirection::Input,
                index: pad,
            });
        }
        Ok(&f.input_pads[pad])
    }

    /// Connect output pad `srcpad` of `src` to input pad `dstpad` of `dst`.
    ///
    /// Fails if either index is out of range, either pad is already linked,
    /// or the pads carry different media types. The new link's format is
    /// unresolved.
    pub fn link(
        &mut self,
        src: FilterId,
        srcpad: usize,
        dst: FilterId,
        dstpad: usize,
    ) -> Result<LinkId> {
        let src_type = self.check_output_free(src, srcpad)?.media_type();
        let dst_type = self.check_input_free(dst, dstpad)?.media_type();
        if src_type != dst_type {
            return Err(Error::MediaTypeMismatch {
                src_filter: self.filter_name(src),
                src: src_type,
                dst_filter: self.filter_name(dst),
                dst: dst_type,
            });
        }

        let id = LinkId(self.links.len());
        self.links
            .push(Some(Link::new(src, srcpad, dst, dstpad, src_type)));
        self.filter_mut(src)?.outputs[srcpad] = Some(id);
        self.filter_mut(dst)?.inputs[dstpad] = Some(id);
        tracing::debug!(
            src = %self.filter_name(src),
            srcpad,
            dst = %self.filter_name(dst),
            dstpad,
            media = %src_type,
            "linked filters"
        );
        Ok(id)
    }

    /// Splice `filter` into `link`.
    ///
    /// `link` is re-pointed at input pad `in_pad` of `filter`, and a new link
    /// joins output pad `out_pad` of `filter` to the old destination. Formats
    /// the old destination had proposed move to the new link. On failure the
    /// graph is left as it was.
    pub fn insert_filter(
        &mut self,
        link: LinkId,
        filter: FilterId,
        in_pad: usize,
        out_pad: usize,
    ) -> Result<LinkId> {
        let (src, old_dst, old_dstpad, media) = {
            let l = self.get_link(link)?;
            (l.src, l.dst, l.dstpad, l.media_type)
        };
        let in_type = self.check_input_free(filter, in_pad)?.media_type();
        if in_type != media {
            return Err(Error::MediaTypeMismatch {
                src_filter: self.filter_name(src),
                src: media,
                dst_filter: self.filter_name(filter),
                dst: in_type,
            });
        }

        tracing::info!(
            "auto-inserting filter '{}' between the filter '{}' and the filter '{}'",
            self.filter_name(filter),
            self.filter_name(src),
            self.filter_name(old_dst)
        );

        self.filter_mut(old_dst)?.inputs[old_dstpad] = None;
        let new_link = match self.link(filter, out_pad, old_dst, old_dstpad) {
            Ok(id) => id,
            Err(e) => {
                self.filter_mut(old_dst)?.inputs[old_dstpad] = Some(link);
                return Err(e);
            }
        };

        let l = self.link_mut(link)?;
        l.dst = filter;
        l.dstpad = in_pad;
        let had_formats = l.out_formats.is_some();
        self.filter_mut(filter)?.inputs[in_pad] = Some(link);

        if had_formats {
            self.formats_changeref(
                FormatSlot::new(link, Side::Out),
                FormatSlot::new(new_link, Side::Out),
            )?;
        }
        observability::record_filter_inserted(self.get_filter(filter)?.template.name());
        Ok(new_link)
    }

    /// Insert an input pad at `index` (clamped to the pad count).
    ///
    /// Links on later pads are renumbered. Returns the index used.
    pub fn insert_input_pad(&mut self, filter: FilterId, index: usize, pad: InputPad) -> Result<usize> {
        let ctx = self.filter_mut(filter)?;
        let index = index.min(ctx.input_pads.len());
        ctx.input_pads.insert(index, pad);
        ctx.inputs.insert(index, None);
        let shifted: Vec<LinkId> = ctx.inputs[index + 1..].iter().flatten().copied().collect();
        for link in shifted {
            self.link_mut(link)?.dstpad += 1;
        }
        Ok(index)
    }

    /// Insert an output pad at `index` (clamped to the pad count).
    ///
    /// Links on later pads are renumbered. Returns the index used.
    pub fn insert_output_pad(
        &mut self,
        filter: FilterId,
        index: usize,
        pad: OutputPad,
    ) -> Result<usize> {
        let ctx = self.filter_mut(filter)?;
        let index = index.min(ctx.output_pads.len());
        ctx.output_pads.insert(index, pad);
        ctx.outputs.insert(index, None);
        let shifted: Vec<LinkId> = ctx.outputs[index + 1..].iter().flatten().copied().collect();
        for link in shifted {
            self.link_mut(link)?.srcpad += 1;
        }
        Ok(index)
    }
}

impl Default for FilterGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FilterGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterGraph")
            .field("filters", &self.filter_count())
            .field("links", &self.link_count())
            .field("config", &self.config)
            .finish()
    }
}
