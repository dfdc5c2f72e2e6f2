//! `hflip`: mirror pictures left to right.

use super::{common_size, slice_rows};
use crate::buffer::Perms;
use crate::error::{Error, Result};
use crate::filter::{FilterOps, FilterTemplate, InputPad, InputPadOps, OutputPad, SliceDir};
use crate::format::{Format, MediaType, PixelFormat, PixelLayout};
use crate::graph::{FilterGraph, FilterId, LinkId};
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
    PixelFormat::Gray8,
    PixelFormat::Rgb24,
    PixelFormat::Bgr24,
    PixelFormat::Argb,
    PixelFormat::Rgba,
    PixelFormat::Abgr,
    PixelFormat::Bgra,
];

pub(crate) fn hflip() -> Arc<FilterTemplate> {
    FilterTemplate::builder("hflip")
        .description("Horizontally flip the input video.")
        .input(
            InputPad::video("default")
                .with_min_perms(Perms::READ)
                .with_handler(HflipInput),
        )
        .output(OutputPad::video("default"))
        .ops(Hflip)
        .build()
}

struct Hflip;

impl FilterOps for Hflip {
    fn query_formats(&self, graph: &mut FilterGraph, filter: FilterId) -> Result<()> {
        let list = graph.make_format_list(FORMATS.iter().copied().map(Format::from));
        graph.set_common_formats(filter, list)
    }
}

/// Bytes that move together when a row is mirrored.
fn pixel_step(format: PixelFormat) -> usize {
    match format.descriptor().layout {
        PixelLayout::Packed { bytes_per_pixel } => bytes_per_pixel as usize,
        _ => 1,
    }
}

/// Write `from` into `to` with its `step`-byte pixels in reverse order.
fn mirror_row(from: &[u8], to: &mut [u8], step: usize) {
    for (o, i) in to.chunks_exact_mut(step).zip(from.chunks_exact(step).rev()) {
        o.copy_from_slice(i);
    }
}

struct HflipInput;

impl InputPadOps for HflipInput {
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
            let step = pixel_step(format);
            let (w, height) = common_size(l.w, l.h, [input, output]);

            let src = input.read();
            let mut dst = output.write()?;
            for plane in 0..format.planes() {
                let (sl, dl) = (input.linesize(plane), output.linesize(plane));
                let (Some(s), Some(d)) = (src.plane(plane), dst.plane_mut(plane)) else {
                    continue;
                };
                let width = format.plane_bytewidth(plane, w);
                if width > sl || width > dl {
                    continue;
                }
                for row in slice_rows(format, plane, y, h, height) {
                    mirror_row(
                        &s[row * sl..row * sl + width],
                        &mut d[row * dl..row * dl + width],
                        step,
                    );
                }
            }
        }
        graph.draw_slice(out, y, h, dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::alloc_video_buffer;
    use crate::filters::{add_frame, pull_frame};

    #[test]
    fn test_mirror_row_packed() {
        let from = [1, 2, 3, 4, 5, 6];
        let mut to = [0; 6];
        mirror_row(&from, &mut to, 3);
        assert_eq!(to, [4, 5, 6, 1, 2, 3]);
        mirror_row(&from, &mut to, 1);
        assert_eq!(to, [6, 5, 4, 3, 2, 1]);
    }

    #[test]
    fn test_hflip_yuv420p() {
        let mut graph = FilterGraph::new();
        let src = graph.open_by_name("buffer", None).unwrap();
        graph.init_filter(src, Some("4:2:yuv420p"), None).unwrap();
        let flip = graph.open_by_name("hflip", None).unwrap();
        let sink = graph.open_by_name("buffersink", None).unwrap();
        graph.link(src, 0, flip, 0).unwrap();
        graph.link(flip, 0, sink, 0).unwrap();
        graph.configure().unwrap();

        let frame = alloc_video_buffer(PixelFormat::Yuv420p, Perms::WRITE, 4, 2).unwrap();
        {
            let mut guard = frame.write().unwrap();
            let luma = guard.plane_mut(0).unwrap();
            luma[..4].copy_from_slice(&[1, 2, 3, 4]);
            guard.plane_mut(1).unwrap()[..2].copy_from_slice(&[10, 20]);
        }
        add_frame(&mut graph, src, frame).unwrap();

        let out = pull_frame(&mut graph, sink).unwrap();
        let guard = out.read();
        assert_eq!(&guard.plane(0).unwrap()[..4], &[4, 3, 2, 1]);
        assert_eq!(&guard.plane(1).unwrap()[..2], &[20, 10]);
    }

    #[test]
    fn test_hflip_frame_smaller_than_link() {
        let mut graph = FilterGraph::new();
        let src = graph.open_by_name("buffer", None).unwrap();
        graph.init_filter(src, Some("8:8:gray"), None).unwrap();
        let flip = graph.open_by_name("hflip", None).unwrap();
        let sink = graph.open_by_name("buffersink", None).unwrap();
        let input = graph.link(src, 0, flip, 0).unwrap();
        graph.link(flip, 0, sink, 0).unwrap();
        graph.configure().unwrap();

        let frame = alloc_video_buffer(PixelFormat::Gray8, Perms::WRITE, 4, 2).unwrap();
        frame.write().unwrap().plane_mut(0).unwrap()[..4].copy_from_slice(&[1, 2, 3, 4]);
        graph.start_frame(input, frame).unwrap();
        graph.draw_slice(input, 0, 8, SliceDir::TopDown).unwrap();
        graph.end_frame(input).unwrap();

        let out = pull_frame(&mut graph, sink).unwrap();
        assert_eq!(&out.read().plane(0).unwrap()[..4], &[4, 3, 2, 1]);
    }
}
