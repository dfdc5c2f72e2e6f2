//! Sources fed by the application.
//!
//! `buffer` takes `w:h:pix_fmt` and replays pictures handed in with
//! [`add_frame`]. `abuffer` takes `sample_fmt[:channel_layout[:sample_rate]]`
//! and replays raw sample data handed in with [`add_samples`]. Both hold at
//! most [`GraphConfig::queue_capacity`](crate::config::GraphConfig::queue_capacity)
//! items; what happens beyond that is set by the graph's queue policy.
//!
//! `anullsrc` has the same arguments as `abuffer` and never produces anything.

use super::{FrameQueue, admit, arg_fields, invalid_args};
use crate::buffer::{BufferRef, Perms, SampleSpec, alloc_audio_buffer};
use crate::error::{Error, Result};
use crate::filter::{FilterOps, FilterTemplate, OutputPad, OutputPadOps, SliceDir};
use crate::format::{ChannelLayout, Format, MediaType, PixelFormat, SampleFormat};
use crate::graph::{FilterGraph, FilterId, LinkId};
use crate::observability;
use std::any::Any;
use std::sync::Arc;

const DEFAULT_SAMPLE_RATE: u32 = 44_100;

pub(crate) fn buffer() -> Arc<FilterTemplate> {
    FilterTemplate::builder("buffer")
        .description("Buffer video frames, and make them accessible to the filterchain.")
        .output(OutputPad::video("default").with_handler(VideoSourceOutput))
        .ops(VideoSource)
        .build()
}

pub(crate) fn abuffer() -> Arc<FilterTemplate> {
    FilterTemplate::builder("abuffer")
        .description("Buffer audio samples, and make them accessible to the filterchain.")
        .output(OutputPad::audio("default").with_handler(AudioSourceOutput))
        .ops(AudioSource)
        .build()
}

pub(crate) fn anullsrc() -> Arc<FilterTemplate> {
    FilterTemplate::builder("anullsrc")
        .description("Null audio source, never returns audio frames.")
        .output(OutputPad::audio("default").with_handler(NullSourceOutput))
        .ops(NullSource)
        .build()
}

#[derive(Debug, Default)]
struct VideoSourceState {
    w: u32,
    h: u32,
    pix_fmt: Option<PixelFormat>,
    queue: FrameQueue,
}

#[derive(Debug, Clone, Copy)]
struct AudioParams {
    sample_format: SampleFormat,
    channel_layout: ChannelLayout,
    sample_rate: u32,
}

impl Default for AudioParams {
    fn default() -> Self {
        Self {
            sample_format: SampleFormat::S16,
            channel_layout: ChannelLayout::STEREO,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

impl AudioParams {
    fn parse(graph: &FilterGraph, filter: FilterId, args: Option<&str>) -> Result<Self> {
        let fields = arg_fields(args);
        let mut params = Self::default();
        if let Some(f) = fields.first().filter(|f| !f.is_empty()) {
            params.sample_format = f
                .parse()
                .map_err(|e| invalid_args(graph, filter, format!("{}", e)))?;
        }
        if let Some(l) = fields.get(1) {
            params.channel_layout = l
                .parse()
                .map_err(|e| invalid_args(graph, filter, format!("{}", e)))?;
            if params.channel_layout.is_empty() {
                return Err(invalid_args(graph, filter, "channel layout has no channels"));
            }
        }
        if let Some(r) = fields.get(2) {
            params.sample_rate = r
                .parse()
                .ok()
                .filter(|&r: &u32| r > 0)
                .ok_or_else(|| invalid_args(graph, filter, format!("invalid sample rate '{}'", r)))?;
        }
        Ok(params)
    }

    fn query_formats(self, graph: &mut FilterGraph, filter: FilterId) -> Result<()> {
        let list = graph.make_format_list([Format::from(self.sample_format)]);
        graph.set_common_formats(filter, list)
    }

    fn config_output(self, graph: &mut FilterGraph, link: LinkId) -> Result<()> {
        let l = graph.link_mut(link)?;
        l.channel_layout = self.channel_layout;
        l.sample_rate = self.sample_rate;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct AudioSourceState {
    params: AudioParams,
    queue: FrameQueue,
}

fn no_more_frames(graph: &FilterGraph, filter: FilterId) -> Error {
    Error::EndOfStream {
        filter: graph.filter_name(filter),
    }
}

struct VideoSource;

impl FilterOps for VideoSource {
    fn new_state(&self) -> Box<dyn Any + Send> {
        Box::new(VideoSourceState::default())
    }

    fn init(
        &self,
        graph: &mut FilterGraph,
        filter: FilterId,
        args: Option<&str>,
        _opaque: Option<&mut dyn Any>,
    ) -> Result<()> {
        let fields = arg_fields(args);
        let [w, h, pix_fmt] = fields[..] else {
            return Err(invalid_args(graph, filter, "expected w:h:pix_fmt"));
        };
        let dimension = |s: &str| s.parse::<u32>().ok().filter(|&v| v > 0);
        let (Some(w), Some(h)) = (dimension(w), dimension(h)) else {
            return Err(invalid_args(graph, filter, format!("invalid size '{}:{}'", w, h)));
        };
        let pix_fmt: PixelFormat = pix_fmt
            .parse()
            .map_err(|e| invalid_args(graph, filter, format!("{}", e)))?;

        tracing::debug!(filter = %graph.filter_name(filter), w, h, format = %pix_fmt, "video source configured");
        let state = graph.state_mut::<VideoSourceState>(filter)?;
        state.w = w;
        state.h = h;
        state.pix_fmt = Some(pix_fmt);
        Ok(())
    }

    fn uninit(&self, graph: &mut FilterGraph, filter: FilterId) {
        if let Ok(state) = graph.state_mut::<VideoSourceState>(filter) {
            state.queue.clear();
        }
    }

    fn query_formats(&self, graph: &mut FilterGraph, filter: FilterId) -> Result<()> {
        let Some(pix_fmt) = graph.state::<VideoSourceState>(filter)?.pix_fmt else {
            return Err(invalid_args(graph, filter, "source was never initialized"));
        };
        let list = graph.make_format_list([Format::from(pix_fmt)]);
        graph.set_common_formats(filter, list)
    }
}

struct VideoSourceOutput;

impl OutputPadOps for VideoSourceOutput {
    fn config_props(&self, graph: &mut FilterGraph, link: LinkId) -> Result<()> {
        let src = graph.get_link(link)?.src();
        let (w, h) = {
            let state = graph.state::<VideoSourceState>(src)?;
            (state.w, state.h)
        };
        let l = graph.link_mut(link)?;
        l.w = w;
        l.h = h;
        Ok(())
    }

    fn request_frame(&self, graph: &mut FilterGraph, link: LinkId) -> Result<()> {
        let src = graph.get_link(link)?.src();
        let state = graph.state_mut::<VideoSourceState>(src)?;
        let frame = state.queue.pop();
        let depth = state.queue.len();
        let Some(frame) = frame else {
            tracing::trace!(filter = %graph.filter_name(src), "request with no frame queued");
            return Err(no_more_frames(graph, src));
        };
        observability::record_queue_depth(&graph.filter_name(src), depth);

        let h = frame.video().map_or(0, |v| v.h);
        graph.start_frame(link, frame)?;
        graph.draw_slice(link, 0, h, SliceDir::TopDown)?;
        graph.end_frame(link)
    }

    fn poll_frame(&self, graph: &mut FilterGraph, link: LinkId) -> Result<usize> {
        let src = graph.get_link(link)?.src();
        Ok(graph.state::<VideoSourceState>(src)?.queue.len())
    }
}

/// Queue a picture on a `buffer` source.
///
/// The picture must match the size and pixel format the source was
/// initialized with. It is pushed downstream on the next request.
///
/// # Errors
///
/// Fails if `filter` is not a `buffer` source, the picture does not match,
/// or the queue is full under [`QueuePolicy::Backpressure`](crate::config::QueuePolicy::Backpressure).
pub fn add_frame(graph: &mut FilterGraph, filter: FilterId, frame: BufferRef) -> Result<()> {
    let (w, h, pix_fmt, len) = {
        let state = graph.state::<VideoSourceState>(filter)?;
        (state.w, state.h, state.pix_fmt, state.queue.len())
    };
    let Some(video) = frame.video() else {
        return Err(Error::WrongMedia {
            expected: MediaType::Video,
        });
    };
    if frame.format().pixel() != pix_fmt || (video.w, video.h) != (w, h) {
        return Err(invalid_args(
            graph,
            filter,
            format!(
                "frame is {}x{} {}, source expects {}x{} {}",
                video.w,
                video.h,
                frame.format(),
                w,
                h,
                pix_fmt.map_or("(none)", PixelFormat::name)
            ),
        ));
    }
    if !admit(graph, filter, len)? {
        return Ok(());
    }

    let state = graph.state_mut::<VideoSourceState>(filter)?;
    state.queue.push(frame);
    let depth = state.queue.len();
    observability::record_queue_depth(&graph.filter_name(filter), depth);
    Ok(())
}

struct AudioSource;

impl FilterOps for AudioSource {
    fn new_state(&self) -> Box<dyn Any + Send> {
        Box::new(AudioSourceState::default())
    }

    fn init(
        &self,
        graph: &mut FilterGraph,
        filter: FilterId,
        args: Option<&str>,
        _opaque: Option<&mut dyn Any>,
    ) -> Result<()> {
        let params = AudioParams::parse(graph, filter, args)?;
        tracing::debug!(
            filter = %graph.filter_name(filter),
            format = %params.sample_format,
            layout = %params.channel_layout,
            sample_rate = params.sample_rate,
            "audio source configured"
        );
        graph.state_mut::<AudioSourceState>(filter)?.params = params;
        Ok(())
    }

    fn uninit(&self, graph: &mut FilterGraph, filter: FilterId) {
        if let Ok(state) = graph.state_mut::<AudioSourceState>(filter) {
            state.queue.clear();
        }
    }

    fn query_formats(&self, graph: &mut FilterGraph, filter: FilterId) -> Result<()> {
        let params = graph.state::<AudioSourceState>(filter)?.params;
        params.query_formats(graph, filter)
    }
}

struct AudioSourceOutput;

impl OutputPadOps for AudioSourceOutput {
    fn config_props(&self, graph: &mut FilterGraph, link: LinkId) -> Result<()> {
        let src = graph.get_link(link)?.src();
        let params = graph.state::<AudioSourceState>(src)?.params;
        params.config_output(graph, link)
    }

    fn request_frame(&self, graph: &mut FilterGraph, link: LinkId) -> Result<()> {
        let src = graph.get_link(link)?.src();
        let state = graph.state_mut::<AudioSourceState>(src)?;
        let batch = state.queue.pop();
        let depth = state.queue.len();
        let Some(batch) = batch else {
            return Err(no_more_frames(graph, src));
        };
        observability::record_queue_depth(&graph.filter_name(src), depth);

        let out = batch.ref_buffer(Perms::all());
        drop(batch);
        graph.filter_samples(link, out)
    }

    fn poll_frame(&self, graph: &mut FilterGraph, link: LinkId) -> Result<usize> {
        let src = graph.get_link(link)?.src();
        Ok(graph.state::<AudioSourceState>(src)?.queue.len())
    }
}

/// Queue raw sample data on an `abuffer` source.
///
/// `data` holds whole sample frames in the source's sample format and
/// channel layout: interleaved when `planar` is false, one channel after
/// another when it is true. The bytes are copied into a buffer obtained
/// from the downstream filter when the source is linked.
///
/// # Errors
///
/// Fails if `filter` is not an `abuffer` source, `data` is empty or not a
/// whole number of sample frames, or the queue is full under
/// [`QueuePolicy::Backpressure`](crate::config::QueuePolicy::Backpressure).
pub fn add_samples(
    graph: &mut FilterGraph,
    filter: FilterId,
    data: &[u8],
    planar: bool,
    pts: Option<i64>,
) -> Result<()> {
    let (params, len) = {
        let state = graph.state::<AudioSourceState>(filter)?;
        (state.params, state.queue.len())
    };
    let frame_size = params.channel_layout.channels() * params.sample_format.bytes();
    if data.is_empty() || data.len() % frame_size != 0 {
        return Err(invalid_args(
            graph,
            filter,
            format!("{} bytes is not a whole number of {}-byte sample frames", data.len(), frame_size),
        ));
    }
    if !admit(graph, filter, len)? {
        return Ok(());
    }

    let spec = SampleSpec {
        size: data.len(),
        channel_layout: params.channel_layout,
        sample_format: params.sample_format,
        planar,
    };
    let perms = Perms::WRITE | Perms::PRESERVE | Perms::REUSE2;
    let mut batch = match graph.get_filter(filter)?.output(0) {
        Some(out) => graph.get_audio_buffer(out, perms, spec)?,
        None => alloc_audio_buffer(perms, spec.size, spec.channel_layout, spec.sample_format, planar)?,
    };
    batch.pts = pts;
    if let Some(a) = batch.audio_mut() {
        a.sample_rate = params.sample_rate;
    }
    {
        let mut guard = batch.write()?;
        let planes = if planar { params.channel_layout.channels() } else { 1 };
        for (i, chunk) in data.chunks(data.len() / planes).enumerate() {
            if let Some(plane) = guard.plane_mut(i) {
                let n = plane.len().min(chunk.len());
                plane[..n].copy_from_slice(&chunk[..n]);
            }
        }
    }

    let state = graph.state_mut::<AudioSourceState>(filter)?;
    state.queue.push(batch);
    let depth = state.queue.len();
    observability::record_queue_depth(&graph.filter_name(filter), depth);
    Ok(())
}

/// Number of items waiting in a `buffer` or `abuffer` source.
pub fn pending(graph: &FilterGraph, filter: FilterId) -> Result<usize> {
    match graph.state::<VideoSourceState>(filter) {
        Ok(state) => Ok(state.queue.len()),
        Err(_) => Ok(graph.state::<AudioSourceState>(filter)?.queue.len()),
    }
}

struct NullSource;

impl FilterOps for NullSource {
    fn new_state(&self) -> Box<dyn Any + Send> {
        Box::new(AudioParams::default())
    }

    fn init(
        &self,
        graph: &mut FilterGraph,
        filter: FilterId,
        args: Option<&str>,
        _opaque: Option<&mut dyn Any>,
    ) -> Result<()> {
        let params = AudioParams::parse(graph, filter, args)?;
        *graph.state_mut::<AudioParams>(filter)? = params;
        Ok(())
    }

    fn query_formats(&self, graph: &mut FilterGraph, filter: FilterId) -> Result<()> {
        let params = *graph.state::<AudioParams>(filter)?;
        params.query_formats(graph, filter)
    }
}

struct NullSourceOutput;

impl OutputPadOps for NullSourceOutput {
    fn config_props(&self, graph: &mut FilterGraph, link: LinkId) -> Result<()> {
        let src = graph.get_link(link)?.src();
        let params = *graph.state::<AudioParams>(src)?;
        params.config_output(graph, link)
    }

    fn request_frame(&self, graph: &mut FilterGraph, link: LinkId) -> Result<()> {
        let src = graph.get_link(link)?.src();
        Err(no_more_frames(graph, src))
    }

    fn poll_frame(&self, _graph: &mut FilterGraph, _link: LinkId) -> Result<usize> {
        Ok(0)
    }
}
