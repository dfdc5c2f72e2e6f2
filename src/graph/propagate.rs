//! Frame delivery along links.
//!
//! Push: a source hands a reference to [`FilterGraph::start_frame`], then
//! delivers rows with [`FilterGraph::draw_slice`] and finishes with
//! [`FilterGraph::end_frame`] (video), or hands a batch to
//! [`FilterGraph::filter_samples`] (audio).
//!
//! Before the destination sees a reference, its permissions are checked
//! against the destination pad's `min_perms` and `rej_perms`. A reference
//! that does not qualify is replaced by a copy with exactly `min_perms`:
//! pictures are copied slice by slice as rows arrive, sample batches at once.
//!
//! Pull: [`FilterGraph::request_frame`] and [`FilterGraph::poll_frame`] ask
//! the link's source pad, which by default asks further upstream.

use super::defaults;
use super::{FilterGraph, LinkId};
use crate::buffer::{BufferRef, Perms, SampleSpec};
use crate::error::{Error, Result};
use crate::filter::SliceDir;
use crate::format::{MediaType, ceil_shift};
use crate::observability;
use std::sync::Arc;

impl FilterGraph {
    /// Allocate a picture for `link`, asking the destination pad first.
    pub fn get_video_buffer(&mut self, link: LinkId, perms: Perms, w: u32, h: u32) -> Result<BufferRef> {
        let handler = Arc::clone(self.dst_pad(link)?.handler());
        match handler.get_video_buffer(self, link, perms, w, h)? {
            Some(frame) => Ok(frame),
            None => defaults::default_get_video_buffer(self, link, perms, w, h),
        }
    }

    /// Allocate samples for `link`, asking the destination pad first.
    pub fn get_audio_buffer(
        &mut self,
        link: LinkId,
        perms: Perms,
        spec: SampleSpec,
    ) -> Result<BufferRef> {
        let handler = Arc::clone(self.dst_pad(link)?.handler());
        match handler.get_audio_buffer(self, link, perms, spec)? {
            Some(samples) => Ok(samples),
            None => defaults::default_get_audio_buffer(self, link, perms, spec),
        }
    }

    /// Begin delivering `frame` over `link`.
    ///
    /// The reference the destination sees is stored in the link's `cur_buf`.
    pub fn start_frame(&mut self, link: LinkId, frame: BufferRef) -> Result<()> {
        let (handler, min, needs_copy) = {
            let pad = self.dst_pad(link)?;
            (
                Arc::clone(pad.handler()),
                pad.min_perms(),
                pad.needs_copy(frame.perms()),
            )
        };
        self.trace_delivery(link, "start_frame", frame.pts);

        if needs_copy {
            let (format, w, h) = match (frame.format().pixel(), frame.video()) {
                (Some(format), Some(v)) => (format, v.w, v.h),
                _ => {
                    return Err(Error::WrongMedia {
                        expected: MediaType::Video,
                    });
                }
            };
            tracing::debug!(
                have = ?frame.perms(),
                need = ?min,
                reject = ?self.dst_pad(link)?.rej_perms(),
                "frame copy needed"
            );
            let mut copy = crate::buffer::alloc_video_buffer(format, min, w, h)?;
            copy.copy_props_from(&frame);
            observability::record_defensive_copy(&self.dst_name(link)?, MediaType::Video);
            let l = self.link_mut(link)?;
            l.src_buf = Some(frame);
            l.cur_buf = Some(copy);
        } else {
            self.link_mut(link)?.cur_buf = Some(frame);
        }

        observability::record_frame_pushed(&self.dst_name(link)?);
        handler.start_frame(self, link)
    }

    /// Deliver rows `y..y + h` of the current frame over `link`.
    ///
    /// If the destination is being fed a copy, the rows are copied first,
    /// across every plane, honoring vertical chroma subsampling.
    pub fn draw_slice(&mut self, link: LinkId, y: u32, h: u32, dir: SliceDir) -> Result<()> {
        {
            let l = self.get_link(link)?;
            if let (Some(src), Some(cur)) = (l.src_buf.as_ref(), l.cur_buf.as_ref()) {
                copy_slice(src, cur, y, h)?;
            }
        }
        let handler = Arc::clone(self.dst_pad(link)?.handler());
        handler.draw_slice(self, link, y, h, dir)
    }

    /// Finish the current frame on `link`.
    ///
    /// Once the destination returns, the original of a permission copy and
    /// any reference left in `cur_buf` are released.
    pub fn end_frame(&mut self, link: LinkId) -> Result<()> {
        let handler = Arc::clone(self.dst_pad(link)?.handler());
        self.trace_delivery(link, "end_frame", None);
        let result = handler.end_frame(self, link);
        let l = self.link_mut(link)?;
        l.src_buf = None;
        l.cur_buf = None;
        result
    }

    /// Deliver a batch of samples over `link`.
    pub fn filter_samples(&mut self, link: LinkId, samples: BufferRef) -> Result<()> {
        let (handler, min, needs_copy) = {
            let pad = self.dst_pad(link)?;
            (
                Arc::clone(pad.handler()),
                pad.min_perms(),
                pad.needs_copy(samples.perms()),
            )
        };
        self.trace_delivery(link, "filter_samples", samples.pts);
        let props = samples.audio().cloned().ok_or(Error::WrongMedia {
            expected: MediaType::Audio,
        })?;

        let samples = if needs_copy {
            tracing::debug!(
                have = ?samples.perms(),
                need = ?min,
                "copying audio data"
            );
            let mut copy =
                defaults::default_get_audio_buffer(self, link, min, SampleSpec::of(&props))?;
            copy.pts = samples.pts;
            copy.pos = samples.pos;
            if let Some(a) = copy.audio_mut() {
                a.sample_rate = props.sample_rate;
            }
            copy_samples(&samples, &copy)?;
            observability::record_defensive_copy(&self.dst_name(link)?, MediaType::Audio);
            copy
        } else {
            samples
        };

        observability::record_samples_pushed(&self.dst_name(link)?, props.samples);
        handler.filter_samples(self, link, samples)
    }

    /// Ask the source of `link` to produce a frame.
    pub fn request_frame(&mut self, link: LinkId) -> Result<()> {
        let handler = Arc::clone(self.src_pad(link)?.handler());
        self.trace_delivery(link, "request_frame", None);
        handler.request_frame(self, link)
    }

    /// How many frames `link` could deliver right now.
    pub fn poll_frame(&mut self, link: LinkId) -> Result<usize> {
        let handler = Arc::clone(self.src_pad(link)?.handler());
        handler.poll_frame(self, link)
    }

    fn dst_name(&self, link: LinkId) -> Result<String> {
        Ok(self.filter_name(self.get_link(link)?.dst()))
    }

    fn trace_delivery(&self, link: LinkId, what: &str, pts: Option<i64>) {
        if !self.config().tracing.frame_events {
            return;
        }
        if let Ok(l) = self.get_link(link) {
            observability::trace_frame(
                &self.filter_name(l.src()),
                &self.filter_name(l.dst()),
                what,
                pts,
            );
        }
    }
}

/// Copy rows `y..y + h` of every plane from `src` into `dst`.
///
/// Chroma planes cover rows `y >> vsub` up to `ceil((y + h) / 2^vsub)`.
pub(crate) fn copy_slice(src: &BufferRef, dst: &BufferRef, y: u32, h: u32) -> Result<()> {
    let Some(format) = dst.format().pixel() else {
        return Ok(());
    };
    let (w, height) = dst.video().map_or((0, 0), |v| (v.w, v.h));
    let from = src.read();
    let mut to = dst.write_unchecked()?;
    let planes = format.planes().min(src.plane_count()).min(dst.plane_count());

    for plane in 0..planes {
        let (sl, dl) = (src.linesize(plane), dst.linesize(plane));
        let (Some(s), Some(d)) = (from.plane(plane), to.plane_mut(plane)) else {
            continue;
        };
        if sl == 0 || dl == 0 {
            continue;
        }
        let vshift = format.plane_vshift(plane);
        let first = (y >> vshift) as usize;
        let last = ceil_shift(y as usize + h as usize, vshift)
            .min(format.plane_height(plane, height))
            .min(s.len() / sl)
            .min(d.len() / dl);
        let width = format.plane_bytewidth(plane, w).min(sl).min(dl);

        for row in first..last {
            d[row * dl..row * dl + width].copy_from_slice(&s[row * sl..row * sl + width]);
        }
    }
    Ok(())
}

/// Copy every plane (one per channel, or the single interleaved plane).
pub(crate) fn copy_samples(src: &BufferRef, dst: &BufferRef) -> Result<()> {
    let from = src.read();
    let mut to = dst.write_unchecked()?;
    for plane in 0..src.plane_count().min(dst.plane_count()) {
        let (Some(s), Some(d)) = (from.plane(plane), to.plane_mut(plane)) else {
            continue;
        };
        let n = s.len().min(d.len());
        d[..n].copy_from_slice(&s[..n]);
    }
    Ok(())
}
