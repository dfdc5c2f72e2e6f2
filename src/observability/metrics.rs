//! Metrics collection using metrics-rs.

use crate::format::MediaType;
use metrics::{Unit, counter, gauge, histogram};
use std::sync::atomic::{AtomicBool, Ordering};

/// Whether metrics have been initialized.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

// Metric names as constants for consistency
const BUFFERS_ALLOCATED: &str = "filtergraph_buffers_allocated";
const BUFFERS_FREED: &str = "filtergraph_buffers_freed";
const BUFFER_BYTES: &str = "filtergraph_buffer_bytes";
const DEFENSIVE_COPIES: &str = "filtergraph_defensive_copies";
const FRAMES_PUSHED: &str = "filtergraph_frames_pushed";
const SAMPLES_PUSHED: &str = "filtergraph_samples_pushed";
const FRAMES_DROPPED: &str = "filtergraph_frames_dropped";
const LINKS_CONFIGURED: &str = "filtergraph_links_configured";
const FILTERS_INSERTED: &str = "filtergraph_filters_inserted";
const QUEUE_DEPTH: &str = "filtergraph_queue_depth";

/// Initialize metrics descriptions.
///
/// Call this once at application startup before using any metrics.
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init_metrics() {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    metrics::describe_counter!(
        BUFFERS_ALLOCATED,
        Unit::Count,
        "Total number of frame buffers allocated by the default allocators"
    );
    metrics::describe_counter!(
        BUFFERS_FREED,
        Unit::Count,
        "Total number of frame buffers whose last reference was released"
    );
    metrics::describe_histogram!(BUFFER_BYTES, Unit::Bytes, "Size of each allocated buffer");
    metrics::describe_counter!(
        DEFENSIVE_COPIES,
        Unit::Count,
        "Frames copied because the destination pad's permissions were not met"
    );
    metrics::describe_counter!(
        FRAMES_PUSHED,
        Unit::Count,
        "Video frames delivered with start_frame"
    );
    metrics::describe_counter!(
        SAMPLES_PUSHED,
        Unit::Count,
        "Audio samples (per channel) delivered with filter_samples"
    );
    metrics::describe_counter!(
        FRAMES_DROPPED,
        Unit::Count,
        "Frames discarded by full queues under the drop policy"
    );
    metrics::describe_counter!(LINKS_CONFIGURED, Unit::Count, "Links that reached INIT");
    metrics::describe_counter!(
        FILTERS_INSERTED,
        Unit::Count,
        "Converter filters inserted during negotiation"
    );
    metrics::describe_gauge!(
        QUEUE_DEPTH,
        Unit::Count,
        "Frames waiting in a buffering filter"
    );
}

/// Record a buffer allocation.
#[inline]
pub fn record_buffer_allocated(media: MediaType, bytes: usize) {
    counter!(BUFFERS_ALLOCATED, "media" => media.to_string()).increment(1);
    histogram!(BUFFER_BYTES, "media" => media.to_string()).record(bytes as f64);
}

/// Record the release of a buffer's last reference.
#[inline]
pub fn record_buffer_freed(media: MediaType) {
    counter!(BUFFERS_FREED, "media" => media.to_string()).increment(1);
}

/// Record a permission-driven copy into `filter`.
#[inline]
pub fn record_defensive_copy(filter: &str, media: MediaType) {
    counter!(DEFENSIVE_COPIES, "filter" => filter.to_string(), "media" => media.to_string())
        .increment(1);
}

/// Record a video frame delivered to `filter`.
#[inline]
pub fn record_frame_pushed(filter: &str) {
    counter!(FRAMES_PUSHED, "filter" => filter.to_string()).increment(1);
}

/// Record a sample batch delivered to `filter`.
#[inline]
pub fn record_samples_pushed(filter: &str, samples: usize) {
    counter!(SAMPLES_PUSHED, "filter" => filter.to_string()).increment(samples as u64);
}

/// Record a frame dropped by `filter`.
#[inline]
pub fn record_frame_dropped(filter: &str) {
    counter!(FRAMES_DROPPED, "filter" => filter.to_string()).increment(1);
}

/// Record a link reaching the configured state.
#[inline]
pub fn record_link_configured(src: &str, dst: &str) {
    counter!(LINKS_CONFIGURED, "src" => src.to_string(), "dst" => dst.to_string()).increment(1);
}

/// Record an auto-inserted converter.
#[inline]
pub fn record_filter_inserted(filter: &str) {
    counter!(FILTERS_INSERTED, "filter" => filter.to_string()).increment(1);
}

/// Record the number of frames queued in `filter`.
#[inline]
pub fn record_queue_depth(filter: &str, depth: usize) {
    gauge!(QUEUE_DEPTH, "filter" => filter.to_string()).set(depth as f64);
}
