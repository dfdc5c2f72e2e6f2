//! Observability features: metrics and tracing.
//!
//! - **Metrics**: Counters, gauges, and histograms via `metrics-rs`
//! - **Tracing**: Structured logging and spans via `tracing`
//!
//! ## Metrics
//!
//! | Metric | Type | Description |
//! |--------|------|-------------|
//! | `filtergraph_buffers_allocated` | Counter | Buffers created by the default allocators |
//! | `filtergraph_buffers_freed` | Counter | Buffers whose last reference was released |
//! | `filtergraph_buffer_bytes` | Histogram | Bytes per allocated buffer |
//! | `filtergraph_defensive_copies` | Counter | Permission-driven copies |
//! | `filtergraph_frames_pushed` | Counter | Video frames delivered |
//! | `filtergraph_samples_pushed` | Counter | Audio samples delivered |
//! | `filtergraph_frames_dropped` | Counter | Frames discarded by full queues |
//! | `filtergraph_links_configured` | Counter | Links configured |
//! | `filtergraph_filters_inserted` | Counter | Auto-inserted converters |
//! | `filtergraph_queue_depth` | Gauge | Frames waiting in buffering filters |
//!
//! ## Tracing
//!
//! Spans are emitted for graph configuration and per-filter link
//! configuration; frame delivery emits `trace` events when enabled in
//! [`TracingConfig`].
//!
//! ## Example
//!
//! ```rust
//! use filtergraph::observability::init_metrics;
//!
//! // Describe metrics once at startup; install any metrics exporter to collect them
//! init_metrics();
//! ```

mod metrics;
mod tracing_support;

pub use metrics::{
    init_metrics, record_buffer_allocated, record_buffer_freed, record_defensive_copy,
    record_filter_inserted, record_frame_dropped, record_frame_pushed, record_link_configured,
    record_queue_depth, record_samples_pushed,
};
pub use tracing_support::{
    TracingConfig, instrument_filter, instrument_graph, span_filter, span_graph, trace_frame,
};
