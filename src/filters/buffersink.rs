//! Sinks that keep what they receive for the application.

use super::FrameQueue;
use crate::buffer::{BufferRef, Perms};
use crate::error::{Error, PadDirection, Result};
use crate::filter::{FilterOps, FilterTemplate, InputPad, InputPadOps, SliceDir};
use crate::format::MediaType;
use crate::graph::{FilterGraph, FilterId, LinkId};
use crate::observability;
use std::any::Any;
use std::sync::Arc;

pub(crate) fn buffersink() -> Arc<FilterTemplate> {
    FilterTemplate::builder("buffersink")
        .description("Buffer video frames, and make them available to the end of the filter graph.")
        .input(
            InputPad::video("default")
                .with_min_perms(Perms::READ)
                .with_handler(SinkInput),
        )
        .ops(Sink)
        .build()
}

pub(crate) fn abuffersink() -> Arc<FilterTemplate> {
    FilterTemplate::builder("abuffersink")
        .description("Buffer audio samples, and make them available to the end of the filter graph.")
        .input(
            InputPad::audio("default")
                .with_min_perms(Perms::READ)
                .with_handler(SinkInput),
        )
        .ops(Sink)
        .build()
}

struct Sink;

impl FilterOps for Sink {
    fn new_state(&self) -> Box<dyn Any + Send> {
        Box::new(FrameQueue::default())
    }

    fn uninit(&self, graph: &mut FilterGraph, filter: FilterId) {
        if let Ok(queue) = graph.state_mut::<FrameQueue>(filter) {
            queue.clear();
        }
    }
}

fn keep(graph: &mut FilterGraph, filter: FilterId, frame: BufferRef) -> Result<()> {
    let queue = graph.state_mut::<FrameQueue>(filter)?;
    queue.push(frame);
    let depth = queue.len();
    observability::record_queue_depth(&graph.filter_name(filter), depth);
    Ok(())
}

struct SinkInput;

impl InputPadOps for SinkInput {
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
            Some(frame) => keep(graph, dst, frame),
            None => Err(Error::NoFrame {
                filter: graph.filter_name(dst),
            }),
        }
    }

    fn filter_samples(&self, graph: &mut FilterGraph, link: LinkId, samples: BufferRef) -> Result<()> {
        let dst = graph.get_link(link)?.dst();
        keep(graph, dst, samples)
    }
}

fn pull(graph: &mut FilterGraph, filter: FilterId, media_type: MediaType) -> Result<BufferRef> {
    if graph.get_filter(filter)?.input_pads().first().map(|p| p.media_type()) != Some(media_type) {
        return Err(Error::WrongMedia {
            expected: media_type,
        });
    }
    if graph.state::<FrameQueue>(filter)?.is_empty() {
        let input = graph.get_filter(filter)?.input(0).ok_or_else(|| Error::NotConnected {
            filter: graph.filter_name(filter),
            direction: PadDirection::Input,
            index: 0,
        })?;
        graph.request_frame(input)?;
    }

    let queue = graph.state_mut::<FrameQueue>(filter)?;
    let frame = queue.pop();
    let depth = queue.len();
    observability::record_queue_depth(&graph.filter_name(filter), depth);
    frame.ok_or_else(|| Error::NoFrame {
        filter: graph.filter_name(filter),
    })
}

/// Take the oldest picture from a `buffersink`, requesting one upstream if none is queued.
///
/// # Errors
///
/// Propagates the upstream failure, typically [`Error::EndOfStream`] once
/// the sources are drained. Fails with [`Error::NoFrame`] if the request
/// succeeded but nothing arrived.
pub fn pull_frame(graph: &mut FilterGraph, filter: FilterId) -> Result<BufferRef> {
    pull(graph, filter, MediaType::Video)
}

/// Take the oldest batch from an `abuffersink`, requesting one upstream if none is queued.
///
/// # Errors
///
/// Same as [`pull_frame`].
pub fn pull_samples(graph: &mut FilterGraph, filter: FilterId) -> Result<BufferRef> {
    pull(graph, filter, MediaType::Audio)
}

/// Number of items a sink holds without asking upstream.
pub fn queued(graph: &FilterGraph, filter: FilterId) -> Result<usize> {
    Ok(graph.state::<FrameQueue>(filter)?.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::alloc_video_buffer;
    use crate::filters::add_frame;
    use crate::format::PixelFormat;

    #[test]
    fn test_sink_without_input() {
        let mut graph = FilterGraph::new();
        let sink = graph.open_by_name("buffersink", None).unwrap();
        assert!(matches!(
            pull_frame(&mut graph, sink),
            Err(Error::NotConnected { index: 0, .. })
        ));
        assert!(matches!(
            pull_samples(&mut graph, sink),
            Err(Error::WrongMedia { .. })
        ));
    }

    #[test]
    fn test_sink_keeps_pushed_frames() {
        let mut graph = FilterGraph::new();
        let src = graph.open_by_name("buffer", None).unwrap();
        graph.init_filter(src, Some("2:2:gray"), None).unwrap();
        let sink = graph.open_by_name("buffersink", None).unwrap();
        let link = graph.link(src, 0, sink, 0).unwrap();
        graph.configure().unwrap();

        for _ in 0..2 {
            let frame = alloc_video_buffer(PixelFormat::Gray8, Perms::WRITE, 2, 2).unwrap();
            add_frame(&mut graph, src, frame).unwrap();
            graph.request_frame(link).unwrap();
        }
        assert_eq!(queued(&graph, sink).unwrap(), 2);
        assert!(graph.get_link(link).unwrap().cur_buf.is_none());
        pull_frame(&mut graph, sink).unwrap();
        assert_eq!(queued(&graph, sink).unwrap(), 1);
    }
}
