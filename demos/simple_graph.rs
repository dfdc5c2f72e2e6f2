//! Simple filter graph example.
//!
//! Builds a video chain that splits a picture into a negated and a mirrored
//! branch, and an audio chain whose float samples are converted to the
//! 16-bit format its sink insists on by an automatically inserted
//! `resample`.
//!
//! Run with: cargo run --example simple_graph

use filtergraph::filter::{FilterOps, FilterTemplate, InputPad, InputPadOps};
use filtergraph::prelude::*;
use std::any::Any;

fn run_video_graph() -> Result<()> {
    let mut graph = FilterGraph::new();
    let src = graph.open_by_name("buffer", Some("in"))?;
    graph.init_filter(src, Some("8:2:yuv420p"), None)?;
    let split = graph.open_by_name("split", None)?;
    let negate = graph.open_by_name("negate", None)?;
    let flip = graph.open_by_name("hflip", None)?;
    let fifo = graph.open_by_name("fifo", None)?;
    let negated = graph.open_by_name("buffersink", Some("negated"))?;
    let flipped = graph.open_by_name("buffersink", Some("flipped"))?;

    graph.link(src, 0, split, 0)?;
    graph.link(split, 0, negate, 0)?;
    graph.link(negate, 0, negated, 0)?;
    graph.link(split, 1, fifo, 0)?;
    graph.link(fifo, 0, flip, 0)?;
    let flipped_link = graph.link(flip, 0, flipped, 0)?;
    graph.configure()?;

    for pts in 0..3 {
        let mut frame = alloc_video_buffer(PixelFormat::Yuv420p, Perms::WRITE, 8, 2)?;
        frame.pts = Some(pts);
        if let Some(luma) = frame.write()?.plane_mut(0) {
            for (i, b) in luma[..8].iter_mut().enumerate() {
                *b = 16 + i as u8 * 20;
            }
        }
        filters::add_frame(&mut graph, src, frame)?;
    }

    loop {
        let frame = match filters::pull_frame(&mut graph, negated) {
            Ok(frame) => frame,
            Err(e) if e.is_end_of_stream() => break,
            Err(e) => return Err(e),
        };
        let guard = frame.read();
        println!("   negated pts={:?} luma={:?}", frame.pts, &guard.plane(0).map(|p| &p[..8]));
    }
    while graph.poll_frame(flipped_link)? > 0 {
        let frame = filters::pull_frame(&mut graph, flipped)?;
        let guard = frame.read();
        println!("   flipped pts={:?} luma={:?}", frame.pts, &guard.plane(0).map(|p| &p[..8]));
    }
    Ok(())
}

/// Prints every batch it receives.
struct PrintSamples;

impl InputPadOps for PrintSamples {
    fn filter_samples(&self, _graph: &mut FilterGraph, _link: LinkId, samples: BufferRef) -> Result<()> {
        let guard = samples.read();
        let size = samples.audio().map_or(0, |a| a.size);
        let values: Vec<i16> = guard
            .plane(0)
            .map(|p| {
                p[..size]
                    .chunks_exact(2)
                    .map(|c| i16::from_ne_bytes([c[0], c[1]]))
                    .collect()
            })
            .unwrap_or_default();
        println!("   received {:?} as {}", values, samples.format());
        Ok(())
    }
}

struct S16Only;

impl FilterOps for S16Only {
    fn new_state(&self) -> Box<dyn Any + Send> {
        Box::new(())
    }

    fn query_formats(&self, graph: &mut FilterGraph, filter: FilterId) -> Result<()> {
        let list = graph.make_format_list([Format::from(SampleFormat::S16)]);
        graph.set_common_formats(filter, list)
    }
}

fn run_audio_graph() -> Result<()> {
    let sink = FilterTemplate::builder("printsink")
        .description("Print 16-bit samples.")
        .input(InputPad::audio("default").with_handler(PrintSamples))
        .ops(S16Only)
        .build();

    let mut graph = FilterGraph::new();
    let src = graph.open_by_name("abuffer", Some("in"))?;
    graph.init_filter(src, Some("flt:stereo:48000"), None)?;
    let out = graph.open(sink, Some("out"));
    let link = graph.link(src, 0, out, 0)?;
    graph.configure()?;
    println!("   {} filters after negotiation", graph.filter_count());

    let data: Vec<u8> = [0.25f32, -0.25, 0.5, -1.0]
        .iter()
        .flat_map(|v| v.to_ne_bytes())
        .collect();
    filters::add_samples(&mut graph, src, &data, false, Some(0))?;
    graph.request_frame(link)
}

fn main() -> Result<()> {
    // Initialize tracing for debug output
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("=== Simple Filter Graph Example ===\n");

    println!("1. Video: buffer -> split -> (negate | fifo -> hflip)");
    run_video_graph()?;

    println!("\n2. Audio: abuffer (flt) -> s16 sink");
    run_audio_graph()?;

    Ok(())
}
