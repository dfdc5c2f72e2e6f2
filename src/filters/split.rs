//! `split`: one video input fanned out to two outputs.
//!
//! Each output gets its own read-only reference to the incoming frame, so
//! neither branch can write into a picture the other one sees.

use crate::buffer::{BufferRef, Perms};
use crate::error::{Error, Result};
use crate::filter::{FilterTemplate, InputPad, InputPadOps, OutputPad, SliceDir};
use crate::graph::{self, FilterGraph, LinkId};
use std::sync::Arc;

pub(crate) fn split() -> Arc<FilterTemplate> {
    FilterTemplate::builder("split")
        .description("Pass on the input video to two outputs.")
        .input(InputPad::video("default").with_handler(SplitInput))
        .output(OutputPad::video("output1"))
        .output(OutputPad::video("output2"))
        .build()
}

struct SplitInput;

impl SplitInput {
    fn outputs(graph: &FilterGraph, link: LinkId) -> Result<Vec<LinkId>> {
        let dst = graph.get_link(link)?.dst();
        Ok(graph.get_filter(dst)?.outputs().iter().flatten().copied().collect())
    }
}

impl InputPadOps for SplitInput {
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

    fn start_frame(&self, graph: &mut FilterGraph, link: LinkId) -> Result<()> {
        let l = graph.get_link(link)?;
        let frame = l.cur_buf.as_ref().ok_or_else(|| Error::NoFrame {
            filter: graph.filter_name(l.dst()),
        })?;
        let refs: Vec<_> = Self::outputs(graph, link)?
            .into_iter()
            .map(|out| (out, frame.ref_buffer(!Perms::WRITE)))
            .collect();
        for (out, frame) in refs {
            graph.start_frame(out, frame)?;
        }
        Ok(())
    }

    fn draw_slice(
        &self,
        graph: &mut FilterGraph,
        link: LinkId,
        y: u32,
        h: u32,
        dir: SliceDir,
    ) -> Result<()> {
        for out in Self::outputs(graph, link)? {
            graph.draw_slice(out, y, h, dir)?;
        }
        Ok(())
    }

    fn end_frame(&self, graph: &mut FilterGraph, link: LinkId) -> Result<()> {
        for out in Self::outputs(graph, link)? {
            graph.end_frame(out)?;
        }
        graph.link_mut(link)?.cur_buf = None;
        Ok(())
    }
}
