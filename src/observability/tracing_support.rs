//! Tracing integration for structured logging and spans.

use tracing::{Level, Span, span};

/// Which spans and events the graph emits.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Span around [`FilterGraph::configure`](crate::graph::FilterGraph::configure).
    pub graph_spans: bool,
    /// Span per filter while its input links are configured.
    pub filter_spans: bool,
    /// A `trace` event for every frame crossing a link.
    pub frame_events: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            graph_spans: true,
            filter_spans: true,
            frame_events: false,
        }
    }
}

impl TracingConfig {
    /// Every span plus per-frame events.
    pub fn all() -> Self {
        Self {
            frame_events: true,
            ..Self::default()
        }
    }

    /// Nothing.
    pub fn none() -> Self {
        Self {
            graph_spans: false,
            filter_spans: false,
            frame_events: false,
        }
    }
}

/// Create a span for graph configuration.
///
/// # Example
///
/// ```rust
/// use filtergraph::observability::span_graph;
///
/// let span = span_graph(4, 3);
/// let _guard = span.enter();
/// // Negotiation and link configuration here...
/// ```
#[inline]
pub fn span_graph(filters: usize, links: usize) -> Span {
    span!(Level::INFO, "filtergraph", filters = filters, links = links)
}

/// Create a span for one filter instance.
#[inline]
pub fn span_filter(instance: &str, filter: &str) -> Span {
    span!(
        Level::DEBUG,
        "filter",
        instance = %instance,
        filter = %filter
    )
}

/// Enter a graph span, returning its guard.
pub fn instrument_graph(filters: usize, links: usize) -> tracing::span::EnteredSpan {
    span_graph(filters, links).entered()
}

/// Enter a filter span, returning its guard.
pub fn instrument_filter(instance: &str, filter: &str) -> tracing::span::EnteredSpan {
    span_filter(instance, filter).entered()
}

/// Log a frame crossing a link.
#[inline]
pub fn trace_frame(src: &str, dst: &str, what: &str, pts: Option<i64>) {
    tracing::trace!(
        src = %src,
        dst = %dst,
        pts = ?pts,
        "{}", what
    );
}
