//! Format negotiation.
//!
//! Each filter's `query_formats` proposes, per link, the formats it accepts.
//! A proposal is a [`FormatList`] that can be attached *by reference* to many
//! link slots at once: every slot holding the list is recorded in the list's
//! reference set, so merging two lists can redirect all of their holders to
//! the result.
//!
//! ```text
//!  src filter ──[in_formats | out_formats]──▶ dst filter
//!               ▲ source's   ▲ destination's
//!               proposal     proposal
//! ```
//!
//! Negotiation merges the two slots of every link. When the intersection is
//! empty, the graph can splice in a converter filter configured in
//! [`GraphConfig`](crate::config::GraphConfig). Link configuration later
//! picks the first format of the merged list.

mod error;

pub use error::NegotiationError;

use crate::error::{Error, Result};
use crate::format::{Format, MediaType};
use crate::graph::{FilterGraph, FilterId, LinkId};
use std::sync::Arc;

/// Handle to a list in the graph's format pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FormatListId(usize);

/// Which of a link's two format slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Proposal of the link's source filter.
    In,
    /// Proposal of the link's destination filter.
    Out,
}

/// One format slot of one link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FormatSlot {
    /// The link.
    pub link: LinkId,
    /// Which slot.
    pub side: Side,
}

impl FormatSlot {
    /// Create a slot handle.
    pub fn new(link: LinkId, side: Side) -> Self {
        Self { link, side }
    }
}

/// A list of admissible formats and the slots referencing it.
#[derive(Debug, Clone, Default)]
pub struct FormatList {
    formats: Vec<Format>,
    refs: Vec<FormatSlot>,
}

impl FormatList {
    /// The formats, in order of preference.
    pub fn formats(&self) -> &[Format] {
        &self.formats
    }

    /// Number of slots holding this list.
    pub fn ref_count(&self) -> usize {
        self.refs.len()
    }
}

/// Arena of format lists owned by a graph.
#[derive(Debug, Default)]
pub struct FormatPool {
    lists: Vec<Option<FormatList>>,
}

impl FormatPool {
    fn insert(&mut self, list: FormatList) -> FormatListId {
        if let Some(free) = self.lists.iter().position(Option::is_none) {
            self.lists[free] = Some(list);
            FormatListId(free)
        } else {
            self.lists.push(Some(list));
            FormatListId(self.lists.len() - 1)
        }
    }

    fn get(&self, id: FormatListId) -> Result<&FormatList> {
        self.lists
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(Error::Negotiation(NegotiationError::StaleList(id.0)))
    }

    fn get_mut(&mut self, id: FormatListId) -> Result<&mut FormatList> {
        self.lists
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(Error::Negotiation(NegotiationError::StaleList(id.0)))
    }

    fn free(&mut self, id: FormatListId) {
        if let Some(slot) = self.lists.get_mut(id.0) {
            *slot = None;
        }
    }

    /// Number of live lists.
    pub fn live(&self) -> usize {
        self.lists.iter().flatten().count()
    }
}

impl FilterGraph {
    /// Create an unreferenced format list.
    pub fn make_format_list(&mut self, formats: impl IntoIterator<Item = Format>) -> FormatListId {
        self.formats.insert(FormatList {
            formats: formats.into_iter().collect(),
            refs: Vec::new(),
        })
    }

    /// Get a format list.
    pub fn format_list(&self, id: FormatListId) -> Result<&FormatList> {
        self.formats.get(id)
    }

    /// Number of format lists currently alive in this graph.
    pub fn format_list_count(&self) -> usize {
        self.formats.live()
    }

    /// List held by a link slot, if any.
    pub fn formats_of(&self, slot: FormatSlot) -> Result<Option<FormatListId>> {
        let link = self.get_link(slot.link)?;
        Ok(match slot.side {
            Side::In => link.in_formats,
            Side::Out => link.out_formats,
        })
    }

    /// Attach `list` to `slot`, releasing whatever the slot held before.
    pub fn formats_ref(&mut self, list: FormatListId, slot: FormatSlot) -> Result<()> {
        if self.formats_of(slot)? == Some(list) {
            return Ok(());
        }
        self.formats.get(list)?;
        self.formats_unref(slot)?;
        self.formats.get_mut(list)?.refs.push(slot);
        *self.format_slot(slot)? = Some(list);
        Ok(())
    }

    /// Detach the list held by `slot`; the list is freed with its last reference.
    pub fn formats_unref(&mut self, slot: FormatSlot) -> Result<()> {
        let Some(list) = self.format_slot(slot)?.take() else {
            return Ok(());
        };
        let entry = self.formats.get_mut(list)?;
        entry.refs.retain(|s| *s != slot);
        if entry.refs.is_empty() {
            self.formats.free(list);
        }
        Ok(())
    }

    /// Move the reference held by `from` to `to`.
    pub fn formats_changeref(&mut self, from: FormatSlot, to: FormatSlot) -> Result<()> {
        let Some(list) = self.formats_of(from)? else {
            return Ok(());
        };
        self.formats_unref(to)?;
        *self.format_slot(from)? = None;
        for r in self.formats.get_mut(list)?.refs.iter_mut() {
            if *r == from {
                *r = to;
            }
        }
        *self.format_slot(to)? = Some(list);
        Ok(())
    }

    /// Intersect two lists, keeping the order of `a`.
    ///
    /// On success every slot that held `a` or `b` now holds the merged list,
    /// and both inputs are freed. Returns `None` without touching either list
    /// when they share no format.
    pub fn merge_formats(
        &mut self,
        a: FormatListId,
        b: FormatListId,
    ) -> Result<Option<FormatListId>> {
        if a == b {
            return Ok(Some(a));
        }
        let la = self.formats.get(a)?;
        let lb = self.formats.get(b)?;
        let common: Vec<Format> = la
            .formats
            .iter()
            .filter(|f| lb.formats.contains(f))
            .copied()
            .collect();
        if common.is_empty() {
            return Ok(None);
        }

        let mut refs = la.refs.clone();
        refs.extend(lb.refs.iter().copied());
        self.formats.free(a);
        self.formats.free(b);
        let merged = self.formats.insert(FormatList {
            formats: common,
            refs: refs.clone(),
        });
        for slot in refs {
            *self.format_slot(slot)? = Some(merged);
        }
        Ok(Some(merged))
    }

    /// Attach one list to every connected pad of `filter`.
    ///
    /// If the filter has no connected pads the list is freed.
    pub fn set_common_formats(&mut self, filter: FilterId, list: FormatListId) -> Result<()> {
        self.ref_pads_where(filter, list, |_| true)
    }

    /// Attach `list` to every connected pad of `filter` carrying `media_type`.
    pub(crate) fn set_media_formats(
        &mut self,
        filter: FilterId,
        media_type: MediaType,
        list: FormatListId,
    ) -> Result<()> {
        self.ref_pads_where(filter, list, |m| m == media_type)
    }

    fn ref_pads_where(
        &mut self,
        filter: FilterId,
        list: FormatListId,
        wanted: impl Fn(MediaType) -> bool,
    ) -> Result<()> {
        let ctx = self.get_filter(filter)?;
        let mut slots = Vec::new();
        for (pad, link) in ctx.input_pads().iter().zip(ctx.inputs()) {
            if let Some(link) = link.filter(|_| wanted(pad.media_type())) {
                slots.push(FormatSlot::new(link, Side::Out));
            }
        }
        for (pad, link) in ctx.output_pads().iter().zip(ctx.outputs()) {
            if let Some(link) = link.filter(|_| wanted(pad.media_type())) {
                slots.push(FormatSlot::new(link, Side::In));
            }
        }

        if slots.is_empty() {
            self.free_if_unreferenced(list);
            return Ok(());
        }
        for slot in slots {
            self.formats_ref(list, slot)?;
        }
        Ok(())
    }

    /// Attach `list` to input pad `pad` of `filter`, if it is connected.
    pub fn ref_input_formats(&mut self, filter: FilterId, pad: usize, list: FormatListId) -> Result<()> {
        match self.input_link(filter, pad) {
            Some(link) => self.formats_ref(list, FormatSlot::new(link, Side::Out)),
            None => {
                self.free_if_unreferenced(list);
                Ok(())
            }
        }
    }

    /// Attach `list` to output pad `pad` of `filter`, if it is connected.
    pub fn ref_output_formats(&mut self, filter: FilterId, pad: usize, list: FormatListId) -> Result<()> {
        match self.output_link(filter, pad) {
            Some(link) => self.formats_ref(list, FormatSlot::new(link, Side::In)),
            None => {
                self.free_if_unreferenced(list);
                Ok(())
            }
        }
    }

    fn free_if_unreferenced(&mut self, list: FormatListId) {
        if self.formats.get(list).is_ok_and(|l| l.refs.is_empty()) {
            self.formats.free(list);
        }
    }

    fn query_formats(&mut self, filter: FilterId) -> Result<()> {
        let ops = Arc::clone(self.get_filter(filter)?.template().ops());
        ops.query_formats(self, filter)
    }

    fn no_common_format(&self, link: LinkId) -> Error {
        let Ok(l) = self.get_link(link) else {
            return Error::InvalidLink(link);
        };
        let list = |id: Option<FormatListId>| {
            id.and_then(|id| self.formats.get(id).ok())
                .map(|l| l.formats.clone())
                .unwrap_or_default()
        };
        NegotiationError::no_common_format(
            self.filter_name(l.src()),
            self.filter_name(l.dst()),
            &list(l.in_formats),
            &list(l.out_formats),
        )
        .into()
    }

    /// Merge both format slots of a link. Returns whether they intersect.
    fn merge_link(&mut self, link: LinkId) -> Result<bool> {
        let l = self.get_link(link)?;
        match (l.in_formats, l.out_formats) {
            (Some(a), Some(b)) => Ok(self.merge_formats(a, b)?.is_some()),
            _ => Ok(true),
        }
    }

    /// Run every filter's `query_formats`, then merge the proposals on every link.
    ///
    /// When a link's proposals do not intersect and auto-conversion is
    /// enabled, the converter configured for the link's media type is
    /// inserted and the link and the converter's output link are merged
    /// again.
    ///
    /// # Errors
    ///
    /// Returns [`NegotiationError::NoCommonFormat`] when a link cannot be
    /// satisfied, or the error of a failed `query_formats`.
    pub fn negotiate_formats(&mut self) -> Result<()> {
        for filter in self.filter_ids() {
            self.query_formats(filter)?;
        }

        for link in self.link_ids() {
            if self.get_link(link)?.format.is_some() || self.merge_link(link)? {
                continue;
            }
            let media = self.get_link(link)?.media_type();
            let converter = match self.config().converter_for(media) {
                Some(name) if self.config().auto_convert => name.to_string(),
                _ => return Err(self.no_common_format(link)),
            };
            self.auto_insert(link, &converter)?;
        }
        Ok(())
    }

    fn auto_insert(&mut self, link: LinkId, converter: &str) -> Result<()> {
        let (upstream, downstream) = {
            let l = self.get_link(link)?;
            (self.filter_name(l.src()), self.filter_name(l.dst()))
        };
        let failed = |reason: String| {
            Error::from(NegotiationError::ConverterFailed {
                converter: converter.to_string(),
                upstream: upstream.clone(),
                downstream: downstream.clone(),
                reason,
            })
        };

        let inst_name = format!("auto-inserted {} {}", converter, self.filter_count());
        let conv = self
            .open_by_name(converter, Some(&inst_name))
            .map_err(|e| failed(e.to_string()))?;
        let next = self
            .init_filter(conv, None, None)
            .and_then(|()| self.insert_filter(link, conv, 0, 0))
            .map_err(|e| failed(e.to_string()))?;

        self.query_formats(conv)?;
        if !self.merge_link(link)? {
            return Err(self.no_common_format(link));
        }
        if !self.merge_link(next)? {
            return Err(self.no_common_format(next));
        }
        Ok(())
    }

    /// Resolve a link's format from its merged proposals, releasing the lists.
    ///
    /// A link that already has a format, or that has no proposals at all, is
    /// left unchanged.
    pub(crate) fn pick_format(&mut self, link: LinkId) -> Result<()> {
        if self.get_link(link)?.format.is_some() {
            return Ok(());
        }
        if !self.merge_link(link)? {
            return Err(self.no_common_format(link));
        }
        let l = self.get_link(link)?;
        let Some(list) = l.in_formats.or(l.out_formats) else {
            return Ok(());
        };
        let Some(&format) = self.formats.get(list)?.formats.first() else {
            return Err(self.no_common_format(link));
        };
        self.link_mut(link)?.format = Some(format);
        self.formats_unref(FormatSlot::new(link, Side::In))?;
        self.formats_unref(FormatSlot::new(link, Side::Out))?;
        tracing::debug!(
            src = %self.filter_name(self.get_link(link)?.src()),
            dst = %self.filter_name(self.get_link(link)?.dst()),
            format = %format,
            "picked format"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterTemplate, InputPad, OutputPad};
    use crate::format::{PixelFormat, SampleFormat};

    fn graph_with_link() -> (FilterGraph, FilterId, FilterId, LinkId) {
        let mut graph = FilterGraph::new();
        let src = graph.open(
            FilterTemplate::builder("src")
                .output(OutputPad::video("default"))
                .build(),
            None,
        );
        let dst = graph.open(
            FilterTemplate::builder("dst")
                .input(InputPad::video("default"))
                .build(),
            None,
        );
        let link = graph.link(src, 0, dst, 0).unwrap();
        (graph, src, dst, link)
    }

    fn pix(formats: &[PixelFormat]) -> Vec<Format> {
        formats.iter().copied().map(Format::from).collect()
    }

    #[test]
    fn test_ref_and_unref_frees_last() {
        let (mut graph, _, _, link) = graph_with_link();
        let list = graph.make_format_list(pix(&[PixelFormat::Rgb24]));
        let a = FormatSlot::new(link, Side::In);
        let b = FormatSlot::new(link, Side::Out);
        graph.formats_ref(list, a).unwrap();
        graph.formats_ref(list, b).unwrap();
        assert_eq!(graph.format_list(list).unwrap().ref_count(), 2);

        graph.formats_unref(a).unwrap();
        assert_eq!(graph.format_list(list).unwrap().ref_count(), 1);
        graph.formats_unref(b).unwrap();
        assert!(graph.format_list(list).is_err());
        assert_eq!(graph.format_list_count(), 0);
    }

    #[test]
    fn test_merge_keeps_first_order_and_redirects() {
        let (mut graph, _, _, link) = graph_with_link();
        let a = graph.make_format_list(pix(&[
            PixelFormat::Rgb24,
            PixelFormat::Yuv420p,
            PixelFormat::Gray8,
        ]));
        let b = graph.make_format_list(pix(&[PixelFormat::Gray8, PixelFormat::Yuv420p]));
        graph.formats_ref(a, FormatSlot::new(link, Side::In)).unwrap();
        graph.formats_ref(b, FormatSlot::new(link, Side::Out)).unwrap();

        let merged = graph.merge_formats(a, b).unwrap().unwrap();
        assert_eq!(
            graph.format_list(merged).unwrap().formats(),
            &pix(&[PixelFormat::Yuv420p, PixelFormat::Gray8])[..]
        );
        assert_eq!(graph.format_list(merged).unwrap().ref_count(), 2);
        let l = graph.get_link(link).unwrap();
        assert_eq!(l.in_formats, Some(merged));
        assert_eq!(l.out_formats, Some(merged));
        assert_eq!(graph.format_list_count(), 1);
    }

    #[test]
    fn test_merge_disjoint_leaves_lists() {
        let (mut graph, _, _, link) = graph_with_link();
        let a = graph.make_format_list(pix(&[PixelFormat::Rgb24]));
        let b = graph.make_format_list(pix(&[PixelFormat::Yuv420p]));
        graph.formats_ref(a, FormatSlot::new(link, Side::In)).unwrap();
        graph.formats_ref(b, FormatSlot::new(link, Side::Out)).unwrap();

        assert_eq!(graph.merge_formats(a, b).unwrap(), None);
        assert_eq!(graph.format_list(a).unwrap().ref_count(), 1);
        assert_eq!(graph.format_list(b).unwrap().ref_count(), 1);
    }

    #[test]
    fn test_changeref_moves_reference() {
        let (mut graph, _, _, link) = graph_with_link();
        let list = graph.make_format_list(pix(&[PixelFormat::Rgb24]));
        let from = FormatSlot::new(link, Side::Out);
        let to = FormatSlot::new(link, Side::In);
        graph.formats_ref(list, from).unwrap();

        graph.formats_changeref(from, to).unwrap();
        assert_eq!(graph.formats_of(from).unwrap(), None);
        assert_eq!(graph.formats_of(to).unwrap(), Some(list));
        assert_eq!(graph.format_list(list).unwrap().ref_count(), 1);
    }

    #[test]
    fn test_set_common_formats_without_links_frees() {
        let mut graph = FilterGraph::new();
        let lonely = graph.open(
            FilterTemplate::builder("lonely")
                .input(InputPad::audio("default"))
                .build(),
            None,
        );
        let list = graph.make_format_list([Format::from(SampleFormat::S16)]);
        graph.set_common_formats(lonely, list).unwrap();
        assert!(graph.format_list(list).is_err());
    }

    #[test]
    fn test_set_common_formats_refs_every_pad() {
        let (mut graph, src, _, link) = graph_with_link();
        let list = graph.make_format_list(pix(&[PixelFormat::Rgb24]));
        graph.set_common_formats(src, list).unwrap();
        assert_eq!(graph.formats_of(FormatSlot::new(link, Side::In)).unwrap(), Some(list));
        assert_eq!(graph.formats_of(FormatSlot::new(link, Side::Out)).unwrap(), None);
    }

    #[test]
    fn test_default_negotiation_picks_first_common() {
        let (mut graph, _, _, link) = graph_with_link();
        graph.negotiate_formats().unwrap();
        graph.pick_format(link).unwrap();
        assert_eq!(
            graph.get_link(link).unwrap().format,
            Some(Format::Pixel(PixelFormat::ALL[0]))
        );
        assert_eq!(graph.format_list_count(), 0);
    }
}
