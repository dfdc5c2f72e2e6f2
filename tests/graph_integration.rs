//! Integration tests for graph construction, negotiation and frame delivery.

use filtergraph::buffer::{BufferRef, Perms, alloc_video_buffer};
use filtergraph::config::GraphConfig;
use filtergraph::error::{Error, Result};
use filtergraph::filter::{FilterOps, FilterTemplate, InputPad, InputPadOps, OutputPad, OutputPadOps, SliceDir};
use filtergraph::filters::{self, add_frame, add_samples, pull_frame, pull_samples};
use filtergraph::format::{ChannelLayout, Format, PixelFormat, SampleFormat};
use filtergraph::graph::{FilterGraph, FilterId, LinkId};
use filtergraph::negotiation::NegotiationError;
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// Test filters
// ============================================================================

/// Records the order in which frames finish on each instance.
struct EndRecorder {
    tag: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl InputPadOps for EndRecorder {
    fn start_frame(&self, _graph: &mut FilterGraph, _link: LinkId) -> Result<()> {
        Ok(())
    }

    fn draw_slice(&self, _: &mut FilterGraph, _: LinkId, _: u32, _: u32, _: SliceDir) -> Result<()> {
        Ok(())
    }

    fn end_frame(&self, _graph: &mut FilterGraph, _link: LinkId) -> Result<()> {
        self.log.lock().unwrap().push(self.tag);
        Ok(())
    }
}

fn recorder(tag: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> Arc<FilterTemplate> {
    FilterTemplate::builder("recorder")
        .input(InputPad::video("default").with_handler(EndRecorder {
            tag,
            log: Arc::clone(log),
        }))
        .build()
}

/// Keeps every reference it is given in its private state.
struct Collect;

impl FilterOps for Collect {
    fn new_state(&self) -> Box<dyn Any + Send> {
        Box::new(Vec::<BufferRef>::new())
    }
}

struct CollectInput;

impl InputPadOps for CollectInput {
    fn start_frame(&self, _graph: &mut FilterGraph, _link: LinkId) -> Result<()> {
        Ok(())
    }

    fn draw_slice(&self, _: &mut FilterGraph, _: LinkId, _: u32, _: u32, _: SliceDir) -> Result<()> {
        Ok(())
    }

    fn end_frame(&self, graph: &mut FilterGraph, link: LinkId) -> Result<()> {
        let l = graph.link_mut(link)?;
        let dst = l.dst();
        if let Some(frame) = l.cur_buf.take() {
            graph.state_mut::<Vec<BufferRef>>(dst)?.push(frame);
        }
        Ok(())
    }

    fn filter_samples(&self, graph: &mut FilterGraph, link: LinkId, samples: BufferRef) -> Result<()> {
        let dst = graph.get_link(link)?.dst();
        graph.state_mut::<Vec<BufferRef>>(dst)?.push(samples);
        Ok(())
    }
}

fn collected(graph: &FilterGraph, filter: FilterId) -> &[BufferRef] {
    graph.state::<Vec<BufferRef>>(filter).unwrap()
}

/// Accepts only signed 16-bit samples.
struct S16Only;

impl FilterOps for S16Only {
    fn new_state(&self) -> Box<dyn Any + Send> {
        Box::new(Vec::<BufferRef>::new())
    }

    fn query_formats(&self, graph: &mut FilterGraph, filter: FilterId) -> Result<()> {
        let list = graph.make_format_list([Format::from(SampleFormat::S16)]);
        graph.set_common_formats(filter, list)
    }
}

fn s16_sink() -> Arc<FilterTemplate> {
    FilterTemplate::builder("s16sink")
        .input(InputPad::audio("default").with_handler(CollectInput))
        .ops(S16Only)
        .build()
}

/// A 2x2 gray source that makes one picture per request.
struct CountingSource {
    requests: Arc<AtomicUsize>,
}

impl OutputPadOps for CountingSource {
    fn config_props(&self, graph: &mut FilterGraph, link: LinkId) -> Result<()> {
        let l = graph.link_mut(link)?;
        l.w = 2;
        l.h = 2;
        Ok(())
    }

    fn request_frame(&self, graph: &mut FilterGraph, link: LinkId) -> Result<()> {
        let n = self.requests.fetch_add(1, Ordering::SeqCst);
        let mut frame = graph.get_video_buffer(link, Perms::WRITE, 2, 2)?;
        frame.pts = Some(n as i64);
        graph.start_frame(link, frame)?;
        graph.draw_slice(link, 0, 2, SliceDir::TopDown)?;
        graph.end_frame(link)
    }

    fn poll_frame(&self, _graph: &mut FilterGraph, _link: LinkId) -> Result<usize> {
        Ok(1)
    }
}

struct GrayOnly;

impl FilterOps for GrayOnly {
    fn query_formats(&self, graph: &mut FilterGraph, filter: FilterId) -> Result<()> {
        let list = graph.make_format_list([Format::from(PixelFormat::Gray8)]);
        graph.set_common_formats(filter, list)
    }
}

fn s16_bytes(values: &[i16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_ne_bytes()).collect()
}

fn s16_values(batch: &BufferRef) -> Vec<i16> {
    let size = batch.audio().unwrap().size;
    batch.read().plane(0).unwrap()[..size]
        .chunks_exact(2)
        .map(|c| i16::from_ne_bytes([c[0], c[1]]))
        .collect()
}

// ============================================================================
// Delivery
// ============================================================================

#[test]
fn test_split_fan_out_order_and_release() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut graph = FilterGraph::new();
    let src = graph.open_by_name("buffer", None).unwrap();
    graph.init_filter(src, Some("4:4:yuv420p"), None).unwrap();
    let split = graph.open_by_name("split", None).unwrap();
    let a = graph.open(recorder("a", &log), Some("a"));
    let b = graph.open(recorder("b", &log), Some("b"));
    let input = graph.link(src, 0, split, 0).unwrap();
    graph.link(split, 0, a, 0).unwrap();
    graph.link(split, 1, b, 0).unwrap();
    graph.configure().unwrap();

    let frame = alloc_video_buffer(PixelFormat::Yuv420p, Perms::WRITE, 4, 4).unwrap();
    let keep = frame.ref_buffer(Perms::READ);
    add_frame(&mut graph, src, frame).unwrap();
    graph.request_frame(input).unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
    assert_eq!(keep.refcount(), 1);
}

#[test]
fn test_pull_through_chain_requests_once() {
    let requests = Arc::new(AtomicUsize::new(0));
    let source = FilterTemplate::builder("counting")
        .output(OutputPad::video("default").with_handler(CountingSource {
            requests: Arc::clone(&requests),
        }))
        .ops(GrayOnly)
        .build();

    let mut graph = FilterGraph::new();
    let src = graph.open(source, None);
    let first = graph.open_by_name("null", Some("first")).unwrap();
    let flip = graph.open_by_name("hflip", None).unwrap();
    let last_null = graph.open_by_name("null", Some("last")).unwrap();
    let sink = graph.open_by_name("buffersink", None).unwrap();
    graph.link(src, 0, first, 0).unwrap();
    graph.link(first, 0, flip, 0).unwrap();
    graph.link(flip, 0, last_null, 0).unwrap();
    let last = graph.link(last_null, 0, sink, 0).unwrap();
    graph.configure().unwrap();

    assert_eq!(graph.get_link(last).unwrap().format, Some(Format::from(PixelFormat::Gray8)));
    assert_eq!(graph.poll_frame(last).unwrap(), 1);
    assert_eq!(requests.load(Ordering::SeqCst), 0);

    let frame = pull_frame(&mut graph, sink).unwrap();
    assert_eq!(frame.pts, Some(0));
    assert_eq!(requests.load(Ordering::SeqCst), 1);
    assert_eq!(frame.video().unwrap().w, 2);

    let frame = pull_frame(&mut graph, sink).unwrap();
    assert_eq!(frame.pts, Some(1));
    assert_eq!(requests.load(Ordering::SeqCst), 2);
}

#[test]
fn test_video_copy_covers_every_row() {
    let writer = FilterTemplate::builder("writer")
        .input(
            InputPad::video("default")
                .with_min_perms(Perms::WRITE)
                .with_handler(CollectInput),
        )
        .ops(Collect)
        .build();

    let mut graph = FilterGraph::new();
    let src = graph.open_by_name("buffer", None).unwrap();
    graph.init_filter(src, Some("5:5:yuv420p"), None).unwrap();
    let split = graph.open_by_name("split", None).unwrap();
    let w = graph.open(writer, None);
    let sink = graph.open_by_name("nullsink", None).unwrap();
    let input = graph.link(src, 0, split, 0).unwrap();
    graph.link(split, 0, w, 0).unwrap();
    graph.link(split, 1, sink, 0).unwrap();
    graph.configure().unwrap();

    let mut frame = alloc_video_buffer(PixelFormat::Yuv420p, Perms::WRITE, 5, 5).unwrap();
    frame.pts = Some(9);
    {
        let mut guard = frame.write().unwrap();
        for plane in 0..3 {
            for (i, b) in guard.plane_mut(plane).unwrap().iter_mut().enumerate() {
                *b = (i * 7 + plane) as u8;
            }
        }
    }
    let keep = frame.ref_buffer(Perms::READ);
    add_frame(&mut graph, src, frame).unwrap();
    graph.request_frame(input).unwrap();

    let copy = &collected(&graph, w)[0];
    assert!(!copy.same_buffer(&keep));
    assert!(copy.perms().contains(Perms::WRITE));
    assert_eq!(copy.pts, Some(9));

    let (from, to) = (keep.read(), copy.read());
    for (plane, rows, width) in [(0, 5, 5), (1, 3, 3), (2, 3, 3)] {
        for row in 0..rows {
            let s = &from.plane(plane).unwrap()[row * keep.linesize(plane)..][..width];
            let d = &to.plane(plane).unwrap()[row * copy.linesize(plane)..][..width];
            assert_eq!(s, d, "plane {} row {}", plane, row);
        }
    }
}

#[test]
fn test_audio_copy_keeps_timing() {
    let picky = FilterTemplate::builder("picky")
        .input(
            InputPad::audio("default")
                .with_rej_perms(Perms::PRESERVE)
                .with_handler(CollectInput),
        )
        .ops(Collect)
        .build();

    let mut graph = FilterGraph::new();
    let src = graph.open_by_name("abuffer", None).unwrap();
    graph.init_filter(src, Some("s16:stereo:32000"), None).unwrap();
    let dst = graph.open(picky, None);
    let link = graph.link(src, 0, dst, 0).unwrap();
    graph.configure().unwrap();

    add_samples(&mut graph, src, &s16_bytes(&[1, -1, 2, -2]), false, Some(11)).unwrap();
    graph.request_frame(link).unwrap();

    let batch = &collected(&graph, dst)[0];
    assert!(!batch.perms().contains(Perms::PRESERVE));
    assert_eq!(batch.pts, Some(11));
    assert_eq!(batch.audio().unwrap().sample_rate, 32000);
    assert_eq!(s16_values(batch), vec![1, -1, 2, -2]);
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_cycle_is_reported() {
    let mut graph = FilterGraph::new();
    let a = graph.open_by_name("null", Some("a")).unwrap();
    let b = graph.open_by_name("null", Some("b")).unwrap();
    graph.link(a, 0, b, 0).unwrap();
    graph.link(b, 0, a, 0).unwrap();
    assert!(matches!(graph.configure(), Err(Error::CircularChain { .. })));
}

#[test]
fn test_no_common_format_without_converter() {
    let config = GraphConfig::default().with_auto_convert(false);
    let mut graph = FilterGraph::with_config(config);
    let src = graph.open_by_name("abuffer", None).unwrap();
    graph.init_filter(src, Some("flt:stereo"), None).unwrap();
    let sink = graph.open(s16_sink(), None);
    graph.link(src, 0, sink, 0).unwrap();
    assert!(matches!(
        graph.configure(),
        Err(Error::Negotiation(NegotiationError::NoCommonFormat { .. }))
    ));
}

#[test]
fn test_resample_is_inserted_for_audio() {
    let mut graph = FilterGraph::new();
    let src = graph.open_by_name("abuffer", None).unwrap();
    graph.init_filter(src, Some("flt:stereo"), None).unwrap();
    let sink = graph.open(s16_sink(), None);
    graph.link(src, 0, sink, 0).unwrap();
    graph.configure().unwrap();

    assert_eq!(graph.filter_count(), 3);
    let inserted = graph
        .filter_ids()
        .into_iter()
        .find(|&id| graph.get_filter(id).unwrap().template().name() == "resample")
        .unwrap();
    let into_sink = graph.get_filter(sink).unwrap().input(0).unwrap();
    assert_eq!(graph.get_link(into_sink).unwrap().src(), inserted);
    assert_eq!(
        graph.get_link(into_sink).unwrap().format,
        Some(Format::from(SampleFormat::S16))
    );

    let data: Vec<u8> = [0.5f32, -0.5].iter().flat_map(|v| v.to_ne_bytes()).collect();
    add_samples(&mut graph, src, &data, false, None).unwrap();
    let first = graph.get_filter(src).unwrap().output(0).unwrap();
    graph.request_frame(first).unwrap();
    assert_eq!(s16_values(&collected(&graph, sink)[0]), vec![16384, -16384]);
}

#[test]
fn test_video_mismatch_is_not_converted() {
    let mut graph = FilterGraph::new();
    let src = graph.open_by_name("buffer", None).unwrap();
    graph.init_filter(src, Some("4:4:rgb24"), None).unwrap();
    let negate = graph.open_by_name("negate", None).unwrap();
    graph.link(src, 0, negate, 0).unwrap();
    assert!(matches!(graph.configure(), Err(Error::Negotiation(_))));
    assert_eq!(graph.filter_count(), 2);
}

#[test]
fn test_stereo_to_surround() {
    let mut graph = FilterGraph::new();
    let src = graph.open_by_name("abuffer", None).unwrap();
    graph.init_filter(src, Some("s16:stereo:48000"), None).unwrap();
    let fifo = graph.open_by_name("afifo", None).unwrap();
    let conv = graph.open_by_name("resample", None).unwrap();
    graph.init_filter(conv, Some("-1:5.1"), None).unwrap();
    let sink = graph.open_by_name("abuffersink", None).unwrap();
    graph.link(src, 0, fifo, 0).unwrap();
    graph.link(fifo, 0, conv, 0).unwrap();
    graph.link(conv, 0, sink, 0).unwrap();
    graph.configure().unwrap();

    add_samples(&mut graph, src, &s16_bytes(&[1000, 3000]), false, None).unwrap();
    let out = pull_samples(&mut graph, sink).unwrap();
    assert_eq!(out.audio().unwrap().channel_layout, ChannelLayout::LAYOUT_5_1);
    assert_eq!(s16_values(&out), vec![1000, 3000, 2000, 0, 0, 0]);
    assert!(pull_samples(&mut graph, sink).unwrap_err().is_end_of_stream());
}

// ============================================================================
// Topology edits
// ============================================================================

#[test]
fn test_insert_then_destroy() {
    let mut graph = FilterGraph::new();
    let src = graph.open_by_name("buffer", None).unwrap();
    graph.init_filter(src, Some("2:2:gray"), None).unwrap();
    let sink = graph.open_by_name("buffersink", None).unwrap();
    let link = graph.link(src, 0, sink, 0).unwrap();

    let flip = graph.open_by_name("hflip", None).unwrap();
    let out = graph.insert_filter(link, flip, 0, 0).unwrap();
    assert_eq!(graph.get_link(link).unwrap().dst(), flip);
    assert_eq!(graph.get_link(out).unwrap().dst(), sink);
    graph.configure().unwrap();

    let frame = alloc_video_buffer(PixelFormat::Gray8, Perms::WRITE, 2, 2).unwrap();
    frame.write().unwrap().plane_mut(0).unwrap()[..2].copy_from_slice(&[1, 2]);
    add_frame(&mut graph, src, frame).unwrap();
    let flipped = pull_frame(&mut graph, sink).unwrap();
    assert_eq!(&flipped.read().plane(0).unwrap()[..2], &[2, 1]);

    graph.destroy(flip).unwrap();
    assert!(graph.get_filter(flip).is_err());
    assert_eq!(graph.filter_count(), 2);
    assert_eq!(graph.link_count(), 0);
    assert!(graph.get_filter(src).unwrap().output(0).is_none());
    assert!(graph.get_filter(sink).unwrap().input(0).is_none());
    assert_eq!(filters::pending(&graph, src).unwrap(), 0);
}

#[test]
fn test_link_rejects_media_mismatch() {
    let mut graph = FilterGraph::new();
    let src = graph.open_by_name("abuffer", None).unwrap();
    let sink = graph.open_by_name("buffersink", None).unwrap();
    assert!(matches!(
        graph.link(src, 0, sink, 0),
        Err(Error::MediaTypeMismatch { .. })
    ));
    assert!(matches!(
        graph.link(src, 1, sink, 0),
        Err(Error::PadOutOfRange { .. })
    ));
}
