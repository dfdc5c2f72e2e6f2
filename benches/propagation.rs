//! Frame delivery benchmarks.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use filtergraph::buffer::{Perms, alloc_video_buffer};
use filtergraph::filters::{add_frame, add_samples, pull_frame, pull_samples};
use filtergraph::format::PixelFormat;
use filtergraph::graph::{FilterGraph, FilterId};
use std::hint::black_box;

const SIZES: &[(u32, u32)] = &[(320, 240), (1280, 720), (1920, 1080)];

/// `buffer -> (filters...) -> buffersink` for `w`x`h` yuv420p.
fn video_chain(w: u32, h: u32, filters: &[&str]) -> (FilterGraph, FilterId, FilterId) {
    let mut graph = FilterGraph::new();
    let src = graph.open_by_name("buffer", None).unwrap();
    graph
        .init_filter(src, Some(&format!("{}:{}:yuv420p", w, h)), None)
        .unwrap();
    let mut last = src;
    for name in filters {
        let f = graph.open_by_name(name, None).unwrap();
        graph.link(last, 0, f, 0).unwrap();
        last = f;
    }
    let sink = graph.open_by_name("buffersink", None).unwrap();
    graph.link(last, 0, sink, 0).unwrap();
    graph.configure().unwrap();
    (graph, src, sink)
}

fn bench_video_chain(c: &mut Criterion, group_name: &str, filters: &[&str], perms: Perms) {
    let mut group = c.benchmark_group(group_name);

    for &(w, h) in SIZES {
        let bytes = (w * h * 3 / 2) as u64;
        group.throughput(Throughput::Bytes(bytes));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", w, h)),
            &(w, h),
            |b, &(w, h)| {
                let (mut graph, src, sink) = video_chain(w, h, filters);
                b.iter(|| {
                    let frame = alloc_video_buffer(PixelFormat::Yuv420p, perms, w, h).unwrap();
                    add_frame(&mut graph, src, frame).unwrap();
                    black_box(pull_frame(&mut graph, sink).unwrap());
                });
            },
        );
    }

    group.finish();
}

fn bench_passthrough(c: &mut Criterion) {
    bench_video_chain(c, "passthrough", &["null", "null", "null"], Perms::WRITE);
}

fn bench_defensive_copy(c: &mut Criterion) {
    bench_video_chain(c, "defensive_copy", &["fifo"], Perms::WRITE | Perms::REUSE2);
}

fn bench_negate(c: &mut Criterion) {
    bench_video_chain(c, "negate", &["negate"], Perms::WRITE);
}

fn bench_hflip(c: &mut Criterion) {
    bench_video_chain(c, "hflip", &["hflip"], Perms::WRITE);
}

fn bench_downmix(c: &mut Criterion) {
    let mut group = c.benchmark_group("downmix");

    for samples in [256usize, 1024, 4096] {
        group.throughput(Throughput::Elements(samples as u64));
        group.bench_with_input(BenchmarkId::from_parameter(samples), &samples, |b, &samples| {
            let mut graph = FilterGraph::new();
            let src = graph.open_by_name("abuffer", None).unwrap();
            graph.init_filter(src, Some("s16:stereo:48000"), None).unwrap();
            let conv = graph.open_by_name("resample", None).unwrap();
            graph.init_filter(conv, Some("flt:mono"), None).unwrap();
            let sink = graph.open_by_name("abuffersink", None).unwrap();
            graph.link(src, 0, conv, 0).unwrap();
            graph.link(conv, 0, sink, 0).unwrap();
            graph.configure().unwrap();

            let data = vec![0x11u8; samples * 4];
            b.iter(|| {
                add_samples(&mut graph, src, &data, false, None).unwrap();
                black_box(pull_samples(&mut graph, sink).unwrap());
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_passthrough,
    bench_defensive_copy,
    bench_negate,
    bench_hflip,
    bench_downmix,
);

criterion_main!(benches);
