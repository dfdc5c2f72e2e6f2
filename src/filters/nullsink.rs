//! Sinks that discard everything.

use crate::buffer::BufferRef;
use crate::error::Result;
use crate::filter::{FilterTemplate, InputPad, InputPadOps, SliceDir};
use crate::graph::{FilterGraph, LinkId};
use std::sync::Arc;

pub(crate) fn nullsink() -> Arc<FilterTemplate> {
    FilterTemplate::builder("nullsink")
        .description("Do absolutely nothing with the input video.")
        .input(InputPad::video("default").with_handler(Discard))
        .build()
}

pub(crate) fn anullsink() -> Arc<FilterTemplate> {
    FilterTemplate::builder("anullsink")
        .description("Do absolutely nothing with the input audio.")
        .input(InputPad::audio("default").with_handler(Discard))
        .build()
}

struct Discard;

impl InputPadOps for Discard {
    fn start_frame(&self, _graph: &mut FilterGraph, _link: LinkId) -> Result<()> {
        Ok(())
    }

    fn draw_slice(
        &self,
        _graph: &mut FilterGraph,
        _link: LinkId,
        _y: u32,
        _h: u32,
        _dir: SliceDir,
    ) -> Result<()> {
        Ok(())
    }

    fn end_frame(&self, _graph: &mut FilterGraph, _link: LinkId) -> Result<()> {
        Ok(())
    }

    fn filter_samples(&self, _graph: &mut FilterGraph, _link: LinkId, _samples: BufferRef) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::buffer::{Perms, alloc_video_buffer};
    use crate::filters::add_frame;
    use crate::format::PixelFormat;
    use crate::graph::FilterGraph;

    #[test]
    fn test_nullsink_releases_frames() {
        let mut graph = FilterGraph::new();
        let src = graph.open_by_name("buffer", None).unwrap();
        graph.init_filter(src, Some("2:2:gray"), None).unwrap();
        let sink = graph.open_by_name("nullsink", None).unwrap();
        let link = graph.link(src, 0, sink, 0).unwrap();
        graph.configure().unwrap();

        let frame = alloc_video_buffer(PixelFormat::Gray8, Perms::WRITE, 2, 2).unwrap();
        let keep = frame.ref_buffer(Perms::READ);
        add_frame(&mut graph, src, frame).unwrap();
        graph.request_frame(link).unwrap();
        assert_eq!(keep.refcount(), 1);
    }
}
