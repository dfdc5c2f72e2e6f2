//! Graph-wide configuration.

use crate::observability::TracingConfig;

/// Default number of frames a bounded buffering filter holds.
pub const DEFAULT_QUEUE_CAPACITY: usize = 8;

/// What a bounded buffering filter does when it is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QueuePolicy {
    /// Refuse the frame and return [`Error::QueueFull`](crate::Error::QueueFull) to the producer.
    #[default]
    Backpressure,
    /// Discard the incoming frame, log a warning and count it.
    Drop,
}

/// Configuration shared by every filter of a [`FilterGraph`](crate::graph::FilterGraph).
///
/// # Example
///
/// ```rust
/// use filtergraph::config::{GraphConfig, QueuePolicy};
///
/// let config = GraphConfig::default()
///     .with_queue_policy(QueuePolicy::Drop)
///     .with_queue_capacity(2)
///     .with_auto_convert(false);
/// assert_eq!(config.queue_capacity, 2);
/// ```
#[derive(Debug, Clone)]
pub struct GraphConfig {
    /// Insert a converter filter when a link's format lists do not intersect.
    pub auto_convert: bool,
    /// Registered filter used to convert audio links.
    pub audio_converter: Option<String>,
    /// Registered filter used to convert video links.
    pub video_converter: Option<String>,
    /// Behavior of bounded queues once full.
    pub queue_policy: QueuePolicy,
    /// Frames a bounded queue may hold.
    pub queue_capacity: usize,
    /// Span and event configuration.
    pub tracing: TracingConfig,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            auto_convert: true,
            audio_converter: Some("resample".to_string()),
            video_converter: None,
            queue_policy: QueuePolicy::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            tracing: TracingConfig::default(),
        }
    }
}

impl GraphConfig {
    /// Enable or disable converter auto-insertion.
    pub fn with_auto_convert(mut self, enabled: bool) -> Self {
        self.auto_convert = enabled;
        self
    }

    /// Set the audio converter filter name.
    pub fn with_audio_converter(mut self, name: Option<&str>) -> Self {
        self.audio_converter = name.map(str::to_string);
        self
    }

    /// Set the video converter filter name.
    pub fn with_video_converter(mut self, name: Option<&str>) -> Self {
        self.video_converter = name.map(str::to_string);
        self
    }

    /// Set the queue policy.
    pub fn with_queue_policy(mut self, policy: QueuePolicy) -> Self {
        self.queue_policy = policy;
        self
    }

    /// Set the queue capacity (at least one frame).
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set the tracing configuration.
    pub fn with_tracing(mut self, tracing: TracingConfig) -> Self {
        self.tracing = tracing;
        self
    }

    /// The converter configured for a media type.
    pub fn converter_for(&self, media_type: crate::format::MediaType) -> Option<&str> {
        match media_type {
            crate::format::MediaType::Audio => self.audio_converter.as_deref(),
            crate::format::MediaType::Video => self.video_converter.as_deref(),
        }
    }
}
