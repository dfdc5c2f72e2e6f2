//! `fifo` / `afifo`: hold frames until the downstream filter pulls them.
//!
//! Incoming frames are queued without limit. A request on the output
//! replays the oldest queued frame, pulling one from upstream first when
//! the queue is empty.

use super::FrameQueue;
use crate::buffer::{BufferRef, Perms, SampleSpec};
use crate::error::{Error, PadDirection, Result};
use crate::filter::{
    FilterOps, FilterTemplate, InputPad, InputPadOps, OutputPad, OutputPadOps, SliceDir,
};
use crate::format::MediaType;
use crate::graph::{self, FilterGraph, FilterId, LinkId};
use crate::observability;
use std::any::Any;
use std::sync::Arc;

pub(crate) fn fifo() -> Arc<FilterTemplate> {
    FilterTemplate::builder("fifo")
        .description("Buffer input images and send them when they are requested.")
        .input(
            InputPad::video("default")
                .with_rej_perms(Perms::REUSE2)
                .with_handler(FifoInput),
        )
        .output(OutputPad::video("default").with_handler(FifoOutput))
        .ops(Fifo)
        .build()
}

pub(crate) fn afifo() -> Arc<FilterTemplate> {
    FilterTemplate::builder("afifo")
        .description("Buffer input audio and send it when it is requested.")
        .input(
            InputPad::audio("default")
                .with_rej_perms(Perms::REUSE2)
                .with_handler(FifoInput),
        )
        .output(OutputPad::audio("default").with_handler(FifoOutput))
        .ops(Fifo)
        .build()
}

struct Fifo;

impl FilterOps for Fifo {
    fn new_state(&self) -> Box<dyn Any + Send> {
        Box::new(FrameQueue::default())
    }

    fn uninit(&self, graph: &mut FilterGraph, filter: FilterId) {
        if let Ok(queue) = graph.state_mut::<FrameQueue>(filter) {
            if !queue.is_empty() {
                tracing::debug!(frames = queue.len(), "releasing queued frames");
            }
            queue.clear();
        }
    }
}

fn enqueue(graph: &mut FilterGraph, filter: FilterId, frame: BufferRef) -> Result<()> {
    let queue = graph.state_mut::<FrameQueue>(filter)?;
    queue.push(frame);
    let depth = queue.len();
    observability::record_queue_depth(&graph.filter_name(filter), depth);
    Ok(())
}

struct FifoInput;

impl InputPadOps for FifoInput {
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

    fn end_frame(&self, graph: &mut FilterGraph, link: LinkId) -> Result<()> {
        let l = graph.link_mut(link)?;
        let dst = l.dst();
        match l.cur_buf.take() {
            Some(frame) => enqueue(graph, dst, frame),
            None => Err(Error::NoFrame {
                filter: graph.filter_name(dst),
            }),
        }
    }

    fn filter_samples(&self, graph: &mut FilterGraph, link: LinkId, samples: BufferRef) -> Result<()> {
        let dst = graph.get_link(link)?.dst();
        enqueue(graph, dst, samples)
    }
}

struct FifoOutput;

impl OutputPadOps for FifoOutput {
    fn request_frame(&self, graph: &mut FilterGraph, link: LinkId) -> Result<()> {
        let src = graph.get_link(link)?.src();
        if graph.state::<FrameQueue>(src)?.is_empty() {
            let input = graph.get_filter(src)?.input(0).ok_or_else(|| Error::NotConnected {
                filter: graph.filter_name(src),
                direction: PadDirection::Input,
                index: 0,
            })?;
            graph.request_frame(input)?;
        }

        let queue = graph.state_mut::<FrameQueue>(src)?;
        let frame = queue.pop();
        let depth = queue.len();
        let Some(frame) = frame else {
            return Err(Error::NoFrame {
                filter: graph.filter_name(src),
            });
        };
        observability::record_queue_depth(&graph.filter_name(src), depth);

        match frame.media_type() {
            MediaType::Video => {
                let h = frame.video().map_or(0, |v| v.h);
                graph.start_frame(link, frame)?;
                graph.draw_slice(link, 0, h, SliceDir::TopDown)?;
                graph.end_frame(link)
            }
            MediaType::Audio => graph.filter_samples(link, frame),
        }
    }

    /// Frames already queued, or whatever upstream can deliver when there are none.
    fn poll_frame(&self, graph: &mut FilterGraph, link: LinkId) -> Result<usize> {
        let src = graph.get_link(link)?.src();
        match graph.state::<FrameQueue>(src)?.len() {
            0 => graph::default_poll_frame(graph, link),
            n => Ok(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::buffer::{Perms, alloc_video_buffer};
    use crate::filters::{add_frame, add_samples, pull_frame, pull_samples};
    use crate::format::PixelFormat;
    use crate::graph::FilterGraph;

    #[test]
    fn test_fifo_replays_in_order() {
        let mut graph = FilterGraph::new();
        let src = graph.open_by_name("buffer", None).unwrap();
        graph.init_filter(src, Some("4:2:gray"), None).unwrap();
        let fifo = graph.open_by_name("fifo", None).unwrap();
        let sink = graph.open_by_name("buffersink", None).unwrap();
        graph.link(src, 0, fifo, 0).unwrap();
        let out = graph.link(fifo, 0, sink, 0).unwrap();
        graph.configure().unwrap();

        for pts in 0..3 {
            let mut frame = alloc_video_buffer(PixelFormat::Gray8, Perms::WRITE, 4, 2).unwrap();
            frame.pts = Some(pts);
            add_frame(&mut graph, src, frame).unwrap();
        }
        assert_eq!(graph.poll_frame(out).unwrap(), 3);

        for pts in 0..3 {
            assert_eq!(pull_frame(&mut graph, sink).unwrap().pts, Some(pts));
        }
        assert_eq!(graph.poll_frame(out).unwrap(), 0);
        assert!(pull_frame(&mut graph, sink).unwrap_err().is_end_of_stream());
    }

    #[test]
    fn test_fifo_copies_reuse2_frames() {
        let mut graph = FilterGraph::new();
        let src = graph.open_by_name("buffer", None).unwrap();
        graph.init_filter(src, Some("4:2:gray"), None).unwrap();
        let fifo = graph.open_by_name("fifo", None).unwrap();
        let sink = graph.open_by_name("buffersink", None).unwrap();
        graph.link(src, 0, fifo, 0).unwrap();
        graph.link(fifo, 0, sink, 0).unwrap();
        graph.configure().unwrap();

        let frame = alloc_video_buffer(PixelFormat::Gray8, Perms::WRITE | Perms::REUSE2, 4, 2)
            .unwrap();
        frame.write().unwrap().plane_mut(0).unwrap().fill(0x5a);
        let keep = frame.ref_buffer(Perms::READ);
        add_frame(&mut graph, src, frame).unwrap();

        let out = pull_frame(&mut graph, sink).unwrap();
        assert!(!out.same_buffer(&keep));
        assert!(!out.perms().contains(Perms::REUSE2));
        let guard = out.read();
        assert!(guard.plane(0).unwrap()[..4].iter().all(|&b| b == 0x5a));
        assert_eq!(keep.refcount(), 1);
    }

    #[test]
    fn test_afifo_queues_batches() {
        let mut graph = FilterGraph::new();
        let src = graph.open_by_name("abuffer", None).unwrap();
        graph.init_filter(src, Some("s16:stereo:8000"), None).unwrap();
        let fifo = graph.open_by_name("afifo", None).unwrap();
        let sink = graph.open_by_name("abuffersink", None).unwrap();
        graph.link(src, 0, fifo, 0).unwrap();
        graph.link(fifo, 0, sink, 0).unwrap();
        graph.configure().unwrap();

        add_samples(&mut graph, src, &[1u8; 16], false, Some(7)).unwrap();
        let out = pull_samples(&mut graph, sink).unwrap();
        assert_eq!(out.pts, Some(7));
        assert_eq!(out.audio().unwrap().samples, 4);
        assert_eq!(out.audio().unwrap().sample_rate, 8000);
        assert!(!out.perms().contains(Perms::REUSE2));
    }
}
