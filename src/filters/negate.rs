//! `negate`: invert every picture value.

use super::{common_size, slice_rows};
use crate::buffer::Perms;
use crate::error::{Error, Result};
use crate::filter::{FilterOps, FilterTemplate, InputPad, InputPadOps, OutputPad, SliceDir};
use crate::format::{Format, MediaType, PixelFormat};
use crate::graph::{FilterGraph, FilterId, LinkId};
use std::any::Any;
use std::sync::Arc;

const FORMATS: &[PixelFormat] = &[
    PixelFormat::Yuv444p,
    PixelFormat::Yuv422p,
    PixelFormat::Yuv420p,
    PixelFormat::Yuv411p,
    PixelFormat::Yuv410p,
    PixelFormat::Yuvj444p,
    PixelFormat::Yuvj422p,
    PixelFormat::Yuvj420p,
    PixelFormat::Yuv440p,
    PixelFormat::Yuvj440p,
    PixelFormat::MonoWhite,
    PixelFormat::MonoBlack,
];

pub(crate) fn negate() -> Arc<FilterTemplate> {
    FilterTemplate::builder("negate")
        .description("Negate the input video.")
        .input(
            InputPad::video("default")
                .with_min_perms(Perms::READ)
                .with_handler(NegateInput),
        )
        .output(OutputPad::video("default"))
        .ops(Negate)
        .build()
}

/// Offsets added after inversion, so limited-range values stay in range.
#[derive(Debug, Clone, Copy, Default)]
struct NegateState {
    off_y: i32,
    off_uv: i32,
}

struct Negate;

impl FilterOps for Negate {
    fn new_state(&self) -> Box<dyn Any + Send> {
        Box::new(NegateState::default())
    }

    fn query_formats(&self, graph: &mut FilterGraph, filter: FilterId) -> Result<()> {
        let list = graph.make_format_list(FORMATS.iter().copied().map(Format::from));
        graph.set_common_formats(filter, list)
    }
}

struct NegateInput;

impl InputPadOps for NegateInput {
    fn config_props(&self, graph: &mut FilterGraph, link: LinkId) -> Result<()> {
        let l = graph.get_link(link)?;
        let dst = l.dst();
        let format = l.format.and_then(Format::pixel).ok_or_else(|| Error::FormatUnresolved {
            src: graph.filter_name(l.src()),
            dst: graph.filter_name(dst),
        })?;
        let state = graph.state_mut::<NegateState>(dst)?;
        (state.off_y, state.off_uv) = if format.is_full_range() { (0, 0) } else { (-4, 1) };
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
        let out = graph.require_first_output(link)?;
        {
            let l = graph.get_link(link)?;
            let state = *graph.state::<NegateState>(l.dst())?;
            let no_frame = || Error::NoFrame {
                filter: graph.filter_name(l.dst()),
            };
            let input = l.cur_buf.as_ref().ok_or_else(no_frame)?;
            let output = graph.get_link(out)?.out_buf.as_ref().ok_or_else(no_frame)?;
            let Some(format) = input.format().pixel() else {
                return Err(Error::WrongMedia {
                    expected: MediaType::Video,
                });
            };
            let (w, height) = common_size(l.w, l.h, [input, output]);

            let src = input.read();
            let mut dst = output.write()?;
            for plane in 0..format.planes() {
                let (sl, dl) = (input.linesize(plane), output.linesize(plane));
                let (Some(s), Some(d)) = (src.plane(plane), dst.plane_mut(plane)) else {
                    continue;
                };
                let width = format.plane_bytewidth(plane, w).min(sl).min(dl);
                let offset = if plane == 0 { state.off_y } else { state.off_uv };
                for row in slice_rows(format, plane, y, h, height) {
                    let from = &s[row * sl..row * sl + width];
                    let to = &mut d[row * dl..row * dl + width];
                    if format.is_mono() {
                        for (o, i) in to.iter_mut().zip(from) {
                            *o = !*i;
                        }
                    } else {
                        for (o, i) in to.iter_mut().zip(from) {
                            *o = (255 - i32::from(*i) + offset) as u8;
                        }
                    }
                }
            }
        }
        graph.draw_slice(out, y, h, dir)
    }
}

#[cfg(test)]
mod tests {
    use crate::buffer::{BufferRef, Perms, alloc_video_buffer};
    use crate::error::Error;
    use crate::filter::SliceDir;
    use crate::filters::{add_frame, pull_frame};
    use crate::format::PixelFormat;
    use crate::graph::FilterGraph;

    fn run(format: PixelFormat, args: &str, fill: &[u8]) -> BufferRef {
        let mut graph = FilterGraph::new();
        let src = graph.open_by_name("buffer", None).unwrap();
        graph.init_filter(src, Some(args), None).unwrap();
        let negate = graph.open_by_name("negate", None).unwrap();
        let sink = graph.open_by_name("buffersink", None).unwrap();
        graph.link(src, 0, negate, 0).unwrap();
        graph.link(negate, 0, sink, 0).unwrap();
        graph.configure().unwrap();

        let mut frame = alloc_video_buffer(format, Perms::WRITE, 16, 4).unwrap();
        frame.pts = Some(42);
        {
            let mut guard = frame.write().unwrap();
            for (plane, value) in fill.iter().enumerate() {
                guard.plane_mut(plane).unwrap().fill(*value);
            }
        }
        add_frame(&mut graph, src, frame).unwrap();
        pull_frame(&mut graph, sink).unwrap()
    }

    #[test]
    fn test_negate_limited_range() {
        let out = run(PixelFormat::Yuv420p, "16:4:yuv420p", &[16, 128, 240]);
        assert_eq!(out.pts, Some(42));
        let guard = out.read();
        assert!(guard.plane(0).unwrap()[..16].iter().all(|&b| b == 235));
        assert!(guard.plane(1).unwrap()[..8].iter().all(|&b| b == 128));
        assert!(guard.plane(2).unwrap()[..8].iter().all(|&b| b == 16));
    }

    #[test]
    fn test_negate_full_range() {
        let out = run(PixelFormat::Yuvj444p, "16:4:yuvj444p", &[0, 100, 255]);
        let guard = out.read();
        assert!(guard.plane(0).unwrap()[..16].iter().all(|&b| b == 255));
        assert!(guard.plane(1).unwrap()[..16].iter().all(|&b| b == 155));
        assert!(guard.plane(2).unwrap()[..16].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_negate_mono_inverts_bits() {
        let out = run(PixelFormat::MonoBlack, "16:4:monob", &[0b1010_0000]);
        let guard = out.read();
        assert!(guard.plane(0).unwrap()[..2].iter().all(|&b| b == 0b0101_1111));
    }

    #[test]
    fn test_negate_frame_smaller_than_link() {
        let mut graph = FilterGraph::new();
        let src = graph.open_by_name("buffer", None).unwrap();
        graph.init_filter(src, Some("16:4:yuv420p"), None).unwrap();
        let negate = graph.open_by_name("negate", None).unwrap();
        let sink = graph.open_by_name("buffersink", None).unwrap();
        let input = graph.link(src, 0, negate, 0).unwrap();
        graph.link(negate, 0, sink, 0).unwrap();
        graph.configure().unwrap();

        let frame = alloc_video_buffer(PixelFormat::Yuv420p, Perms::WRITE, 8, 2).unwrap();
        frame.write().unwrap().plane_mut(0).unwrap().fill(16);
        graph.start_frame(input, frame).unwrap();
        graph.draw_slice(input, 0, 4, SliceDir::TopDown).unwrap();
        graph.end_frame(input).unwrap();

        let out = pull_frame(&mut graph, sink).unwrap();
        let guard = out.read();
        let luma = guard.plane(0).unwrap();
        assert!(luma[..8].iter().all(|&b| b == 235));
        assert_eq!(luma[8], 0);
    }

    #[test]
    fn test_negate_rejects_gray() {
        let mut graph = FilterGraph::new();
        let src = graph.open_by_name("buffer", None).unwrap();
        graph.init_filter(src, Some("8:2:gray"), None).unwrap();
        let negate = graph.open_by_name("negate", None).unwrap();
        let sink = graph.open_by_name("buffersink", None).unwrap();
        graph.link(src, 0, negate, 0).unwrap();
        graph.link(negate, 0, sink, 0).unwrap();
        assert!(matches!(graph.configure(), Err(Error::Negotiation(_))));
    }
}
