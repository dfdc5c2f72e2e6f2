//! Built-in filters.
//!
//! ## Sources
//! - `buffer`: replays video frames handed in with [`add_frame`]
//! - `abuffer`: replays sample batches handed in with [`add_samples`]
//! - `anullsrc`: audio source that never produces anything
//!
//! ## Sinks
//! - `buffersink` / `abuffersink`: collect what arrives, read back with
//!   [`pull_frame`] / [`pull_samples`]
//! - `nullsink` / `anullsink`: discard everything
//!
//! ## Transforms
//! - `null` / `anull`: pass-through
//! - `negate`: invert picture values
//! - `hflip`: mirror pictures horizontally
//! - `resample`: convert sample format and channel layout
//!
//! ## Routing
//! - `split`: duplicate each frame to two outputs
//! - `fifo` / `afifo`: queue frames until the next filter asks for them

mod buffersink;
mod buffersrc;
mod fifo;
mod hflip;
mod negate;
mod null;
mod nullsink;
mod resample;
mod split;

pub use buffersink::{pull_frame, pull_samples, queued};
pub use buffersrc::{add_frame, add_samples, pending};
pub use resample::Remix;

use crate::buffer::BufferRef;
use crate::config::QueuePolicy;
use crate::error::{Error, Result};
use crate::filter::{FilterRegistry, FilterTemplate};
use crate::format::{PixelFormat, ceil_shift};
use crate::graph::{FilterGraph, FilterId};
use crate::observability;
use std::collections::VecDeque;
use std::ops::Range;
use std::sync::Arc;

/// Templates of every built-in filter.
pub fn builtins() -> Vec<Arc<FilterTemplate>> {
    vec![
        null::null(),
        null::anull(),
        split::split(),
        fifo::fifo(),
        fifo::afifo(),
        negate::negate(),
        hflip::hflip(),
        resample::resample(),
        buffersrc::buffer(),
        buffersrc::abuffer(),
        buffersrc::anullsrc(),
        buffersink::buffersink(),
        buffersink::abuffersink(),
        nullsink::nullsink(),
        nullsink::anullsink(),
    ]
}

/// Register every built-in filter.
///
/// # Errors
///
/// Fails if the registry runs out of room or already holds one of the names.
pub fn register_all(registry: &FilterRegistry) -> Result<()> {
    for template in builtins() {
        registry.register(template)?;
    }
    Ok(())
}

/// A FIFO of buffer references owned by a filter.
#[derive(Debug, Default)]
pub(crate) struct FrameQueue {
    frames: VecDeque<BufferRef>,
}

impl FrameQueue {
    pub(crate) fn len(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub(crate) fn push(&mut self, frame: BufferRef) {
        self.frames.push_back(frame);
    }

    pub(crate) fn pop(&mut self) -> Option<BufferRef> {
        self.frames.pop_front()
    }

    pub(crate) fn clear(&mut self) {
        self.frames.clear();
    }
}

/// Whether a bounded queue holding `len` frames may take one more.
///
/// Under [`QueuePolicy::Backpressure`] a full queue is an error for the
/// producer; under [`QueuePolicy::Drop`] the new frame is discarded and
/// `Ok(false)` is returned.
pub(crate) fn admit(graph: &FilterGraph, filter: FilterId, len: usize) -> Result<bool> {
    let capacity = graph.config().queue_capacity;
    if len < capacity {
        return Ok(true);
    }
    let name = graph.filter_name(filter);
    match graph.config().queue_policy {
        QueuePolicy::Backpressure => {
            tracing::error!(
                filter = %name,
                capacity,
                "buffering limit reached, consume some frames before adding new ones"
            );
            Err(Error::QueueFull {
                filter: name,
                capacity,
            })
        }
        QueuePolicy::Drop => {
            tracing::warn!(filter = %name, capacity, "queue full, dropping frame");
            observability::record_frame_dropped(&name);
            Ok(false)
        }
    }
}

pub(crate) fn invalid_args(graph: &FilterGraph, filter: FilterId, reason: impl Into<String>) -> Error {
    Error::InvalidArgument {
        filter: graph.filter_name(filter),
        reason: reason.into(),
    }
}

/// Split an argument string into its `:`-separated fields.
pub(crate) fn arg_fields(args: Option<&str>) -> Vec<&str> {
    args.map(|a| a.split(':').map(str::trim).collect())
        .unwrap_or_default()
}

/// Whether an argument field asks to keep the input's value.
pub(crate) fn is_keep(field: &str) -> bool {
    field.is_empty() || field == "-1" || field.eq_ignore_ascii_case("auto")
}

/// Rows of `plane` touched by the slice `y..y + h` of a picture `height` rows tall.
pub(crate) fn slice_rows(format: PixelFormat, plane: usize, y: u32, h: u32, height: u32) -> Range<usize> {
    let vshift = format.plane_vshift(plane);
    let first = (y >> vshift) as usize;
    let last = ceil_shift(y as usize + h as usize, vshift).min(format.plane_height(plane, height));
    first..last.max(first)
}

/// Picture size that fits the link and both `frames`.
pub(crate) fn common_size(w: u32, h: u32, frames: [&BufferRef; 2]) -> (u32, u32) {
    frames
        .iter()
        .fold((w, h), |(w, h), frame| match frame.video() {
            Some(v) => (w.min(v.w), h.min(v.h)),
            None => (0, 0),
        })
}
