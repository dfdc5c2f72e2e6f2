//! # filtergraph
//!
//! A push/pull media filter graph.
//!
//! Filters are instantiated from registered templates, connected pad to pad
//! by typed links, and configured in one pass that negotiates a format for
//! every link. Frames then travel as reference-counted buffers: pictures as
//! `start_frame` / `draw_slice` / `end_frame` sequences, audio as whole
//! sample batches. A filter that cannot use the references it is given gets
//! a copy with the permissions it asked for.
//!
//! ## Features
//!
//! - **Arena graph**: filters and links addressed by [`FilterId`](graph::FilterId)
//!   and [`LinkId`](graph::LinkId), no reference cycles
//! - **Permissioned buffers**: shared references carry read, write and reuse
//!   rights, checked at every hop
//! - **Format negotiation**: shared format lists merged per link, with an
//!   audio converter inserted when two pads have nothing in common
//! - **Built-in filters**: sources, sinks, `split`, `fifo`, `negate`,
//!   `hflip` and `resample`
//!
//! ## Quick Start
//!
//! ```rust
//! use filtergraph::prelude::*;
//!
//! # fn main() -> filtergraph::Result<()> {
//! let mut graph = FilterGraph::new();
//! let src = graph.open_by_name("buffer", Some("in"))?;
//! graph.init_filter(src, Some("4:2:gray"), None)?;
//! let flip = graph.open_by_name("hflip", None)?;
//! let sink = graph.open_by_name("buffersink", Some("out"))?;
//! graph.link(src, 0, flip, 0)?;
//! graph.link(flip, 0, sink, 0)?;
//! graph.configure()?;
//!
//! let frame = alloc_video_buffer(PixelFormat::Gray8, Perms::WRITE, 4, 2)?;
//! frame.write()?.plane_mut(0).unwrap()[..4].copy_from_slice(&[1, 2, 3, 4]);
//! filters::add_frame(&mut graph, src, frame)?;
//!
//! let out = filters::pull_frame(&mut graph, sink)?;
//! assert_eq!(&out.read().plane(0).unwrap()[..4], &[4, 3, 2, 1]);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod config;
pub mod error;
pub mod filter;
pub mod filters;
pub mod format;
pub mod graph;
pub mod memory;
pub mod negotiation;
pub mod observability;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::buffer::{BufferRef, Perms, SampleSpec, alloc_audio_buffer, alloc_video_buffer};
    pub use crate::config::{GraphConfig, QueuePolicy};
    pub use crate::error::{Error, Result};
    pub use crate::filter::{
        FilterOps, FilterRegistry, FilterTemplate, InputPad, InputPadOps, OutputPad, OutputPadOps,
        SliceDir,
    };
    pub use crate::filters;
    pub use crate::format::{ChannelLayout, Format, MediaType, PixelFormat, SampleFormat};
    pub use crate::graph::{FilterGraph, FilterId, LinkId};
}

pub use error::{Error, Result};
