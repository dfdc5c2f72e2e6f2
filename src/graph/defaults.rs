//! Fallback pad and filter behavior.
//!
//! The `default_*` functions are what the runtime does when a pad or filter
//! leaves a callback unimplemented. They suit simple one-input/one-output
//! filters that write into a fresh buffer. The `null_*` functions forward
//! everything unchanged to the filter's first output.

use super::{FilterGraph, FilterId, LinkId};
use crate::buffer::{self, BufferRef, Perms, SampleSpec};
use crate::error::{Error, PadDirection, Result};
use crate::filter::SliceDir;
use crate::format::{Format, MediaType};

/// Allocate a picture in the link's negotiated pixel format.
///
/// # Errors
///
/// Fails if the link has no video format yet or the picture is empty.
pub fn default_get_video_buffer(
    graph: &FilterGraph,
    link: LinkId,
    perms: Perms,
    w: u32,
    h: u32,
) -> Result<BufferRef> {
    let l = graph.get_link(link)?;
    let format = l
        .format
        .and_then(Format::pixel)
        .ok_or_else(|| Error::FormatUnresolved {
            src: graph.filter_name(l.src()),
            dst: graph.filter_name(l.dst()),
        })?;
    let frame = buffer::alloc_video_buffer(format, perms, w, h)?;
    tracing::debug!(format = %format, w, h, perms = ?frame.perms(), "allocated video buffer");
    Ok(frame)
}

/// Allocate samples shaped by `spec`, stamped with the link's sample rate.
pub fn default_get_audio_buffer(
    graph: &FilterGraph,
    link: LinkId,
    perms: Perms,
    spec: SampleSpec,
) -> Result<BufferRef> {
    let rate = graph.get_link(link)?.sample_rate;
    let mut samples = buffer::alloc_audio_buffer(
        perms,
        spec.size,
        spec.channel_layout,
        spec.sample_format,
        spec.planar,
    )?;
    if let Some(a) = samples.audio_mut() {
        a.sample_rate = rate;
    }
    tracing::debug!(
        format = %spec.sample_format,
        layout = %spec.channel_layout,
        size = spec.size,
        planar = spec.planar,
        "allocated audio buffer"
    );
    Ok(samples)
}

/// Allocate a writable picture on the first output and start it downstream.
///
/// Timestamps and picture properties are taken from the incoming frame. The
/// output buffer is kept in the output link's `out_buf` until `end_frame`.
pub fn default_start_frame(graph: &mut FilterGraph, link: LinkId) -> Result<()> {
    let Some(out) = graph.first_output_of_dst(link)? else {
        return Ok(());
    };
    let (w, h) = {
        let o = graph.get_link(out)?;
        (o.w, o.h)
    };
    let mut out_buf = graph.get_video_buffer(out, Perms::WRITE, w, h)?;
    if let Some(cur) = graph.get_link(link)?.cur_buf.as_ref() {
        out_buf.pts = cur.pts;
        out_buf.pos = cur.pos;
        if let (Some(dst), Some(src)) = (out_buf.video_mut(), cur.video()) {
            dst.pixel_aspect = src.pixel_aspect;
            dst.interlaced = src.interlaced;
            dst.top_field_first = src.top_field_first;
        }
    }
    let pushed = out_buf.ref_buffer(Perms::all());
    graph.link_mut(out)?.out_buf = Some(out_buf);
    graph.start_frame(out, pushed)
}

/// Forward the slice to the first output, if any.
pub fn default_draw_slice(
    graph: &mut FilterGraph,
    link: LinkId,
    y: u32,
    h: u32,
    dir: SliceDir,
) -> Result<()> {
    match graph.first_output_of_dst(link)? {
        Some(out) => graph.draw_slice(out, y, h, dir),
        None => Ok(()),
    }
}

/// Release the incoming frame and the output buffer, then end the first output.
pub fn default_end_frame(graph: &mut FilterGraph, link: LinkId) -> Result<()> {
    let out = graph.first_output_of_dst(link)?;
    graph.link_mut(link)?.cur_buf = None;
    if let Some(out) = out {
        graph.link_mut(out)?.out_buf = None;
        graph.end_frame(out)?;
    }
    Ok(())
}

/// Copy the batch into a writable buffer and push it on the first output.
pub fn default_filter_samples(
    graph: &mut FilterGraph,
    link: LinkId,
    samples: BufferRef,
) -> Result<()> {
    let Some(out) = graph.first_output_of_dst(link)? else {
        return Ok(());
    };
    let props = samples.audio().cloned().ok_or(Error::WrongMedia {
        expected: MediaType::Audio,
    })?;
    let mut out_buf = graph.get_audio_buffer(out, Perms::WRITE, SampleSpec::of(&props))?;
    out_buf.pts = samples.pts;
    out_buf.pos = samples.pos;
    if let Some(a) = out_buf.audio_mut() {
        a.sample_rate = props.sample_rate;
    }
    super::propagate::copy_samples(&samples, &out_buf)?;
    drop(samples);
    graph.filter_samples(out, out_buf.ref_buffer(Perms::all()))
}

/// Copy dimensions (and, for audio, layout and rate) from the source filter's first input.
///
/// # Errors
///
/// Fails when the source filter has no connected first input; filters
/// without inputs must configure their outputs themselves.
pub fn default_config_output_link(graph: &mut FilterGraph, link: LinkId) -> Result<()> {
    let (src, dst) = {
        let l = graph.get_link(link)?;
        (l.src(), l.dst())
    };
    let Some(input) = graph.get_filter(src)?.input(0) else {
        return Err(Error::LinkConfig {
            src: graph.filter_name(src),
            dst: graph.filter_name(dst),
            reason: "no input link to copy properties from".into(),
        });
    };
    let (w, h, layout, rate) = {
        let i = graph.get_link(input)?;
        (i.w, i.h, i.channel_layout, i.sample_rate)
    };
    let l = graph.link_mut(link)?;
    l.w = w;
    l.h = h;
    if l.media_type() == MediaType::Audio {
        l.channel_layout = layout;
        l.sample_rate = rate;
    }
    Ok(())
}

/// Pass the request to the source filter's first input.
pub fn default_request_frame(graph: &mut FilterGraph, link: LinkId) -> Result<()> {
    let src = graph.get_link(link)?.src();
    match graph.get_filter(src)?.input(0) {
        Some(input) => graph.request_frame(input),
        None => Err(Error::NotConnected {
            filter: graph.filter_name(src),
            direction: PadDirection::Input,
            index: 0,
        }),
    }
}

/// Minimum availability over every input of the source filter.
///
/// A filter without inputs places no constraint and reports `usize::MAX`.
pub fn default_poll_frame(graph: &mut FilterGraph, link: LinkId) -> Result<usize> {
    let src = graph.get_link(link)?.src();
    let inputs = graph.get_filter(src)?.inputs().to_vec();
    let mut min = usize::MAX;
    for (index, input) in inputs.into_iter().enumerate() {
        let Some(input) = input else {
            return Err(Error::NotConnected {
                filter: graph.filter_name(src),
                direction: PadDirection::Input,
                index,
            });
        };
        min = min.min(graph.poll_frame(input)?);
    }
    Ok(min)
}

/// Accept every format of each pad's media type.
///
/// All connected pads of one media type share a single list.
pub fn default_query_formats(graph: &mut FilterGraph, filter: FilterId) -> Result<()> {
    for media in [MediaType::Video, MediaType::Audio] {
        let list = graph.make_format_list(Format::all(media));
        graph.set_media_formats(filter, media, list)?;
    }
    Ok(())
}

/// Let the first output's destination allocate the picture.
pub fn null_get_video_buffer(
    graph: &mut FilterGraph,
    link: LinkId,
    perms: Perms,
    w: u32,
    h: u32,
) -> Result<BufferRef> {
    let out = graph.require_first_output(link)?;
    graph.get_video_buffer(out, perms, w, h)
}

/// Let the first output's destination allocate the samples.
pub fn null_get_audio_buffer(
    graph: &mut FilterGraph,
    link: LinkId,
    perms: Perms,
    spec: SampleSpec,
) -> Result<BufferRef> {
    let out = graph.require_first_output(link)?;
    graph.get_audio_buffer(out, perms, spec)
}

/// Start the incoming frame on the first output.
pub fn null_start_frame(graph: &mut FilterGraph, link: LinkId) -> Result<()> {
    let out = graph.require_first_output(link)?;
    let l = graph.get_link(link)?;
    let frame = l
        .cur_buf
        .as_ref()
        .map(|b| b.ref_buffer(Perms::all()))
        .ok_or_else(|| Error::NoFrame {
            filter: graph.filter_name(l.dst()),
        })?;
    graph.start_frame(out, frame)
}

/// Forward the slice to the first output.
pub fn null_draw_slice(
    graph: &mut FilterGraph,
    link: LinkId,
    y: u32,
    h: u32,
    dir: SliceDir,
) -> Result<()> {
    let out = graph.require_first_output(link)?;
    graph.draw_slice(out, y, h, dir)
}

/// End the frame on the first output.
pub fn null_end_frame(graph: &mut FilterGraph, link: LinkId) -> Result<()> {
    let out = graph.require_first_output(link)?;
    graph.end_frame(out)
}

/// Forward the batch to the first output.
pub fn null_filter_samples(graph: &mut FilterGraph, link: LinkId, samples: BufferRef) -> Result<()> {
    let out = graph.require_first_output(link)?;
    graph.filter_samples(out, samples)
}
