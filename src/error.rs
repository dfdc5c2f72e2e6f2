//! Error types for the filter-graph engine.

use crate::buffer::Perms;
use crate::format::MediaType;
use crate::graph::{FilterId, LinkId};
use crate::negotiation::NegotiationError;
use thiserror::Error;

/// Result type alias using the engine's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Direction of a pad, used in error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PadDirection {
    /// Input (sink side) pad.
    Input,
    /// Output (source side) pad.
    Output,
}

impl std::fmt::Display for PadDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PadDirection::Input => f.write_str("input"),
            PadDirection::Output => f.write_str("output"),
        }
    }
}

/// Main error type for filter-graph operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A pad index does not exist on the filter.
    #[error("{direction} pad {index} out of range on '{filter}' ({count} pads)")]
    PadOutOfRange {
        /// Filter instance name.
        filter: String,
        /// Which pad list was indexed.
        direction: PadDirection,
        /// Requested index.
        index: usize,
        /// Number of pads on that side.
        count: usize,
    },

    /// The pad already has a link attached.
    #[error("{direction} pad {index} of '{filter}' is already linked")]
    PadOccupied {
        /// Filter instance name.
        filter: String,
        /// Which pad list was indexed.
        direction: PadDirection,
        /// Occupied index.
        index: usize,
    },

    /// The two pads of a link carry different media types.
    #[error("cannot link {src} pad of '{src_filter}' to {dst} pad of '{dst_filter}'")]
    MediaTypeMismatch {
        /// Source filter name.
        src_filter: String,
        /// Source pad media type.
        src: MediaType,
        /// Destination filter name.
        dst_filter: String,
        /// Destination pad media type.
        dst: MediaType,
    },

    /// No filter instance with this id exists in the graph.
    #[error("invalid filter id {0:?}")]
    InvalidFilter(FilterId),

    /// No link with this id exists in the graph.
    #[error("invalid link id {0:?}")]
    InvalidLink(LinkId),

    /// Link configuration re-entered a link that was still being configured.
    #[error("circular filter chain detected at '{filter}'")]
    CircularChain {
        /// Filter whose input closed the cycle.
        filter: String,
    },

    /// Format negotiation failed.
    #[error(transparent)]
    Negotiation(#[from] NegotiationError),

    /// An operation needed a negotiated format but the link has none.
    #[error("link {src} -> {dst} has no negotiated format")]
    FormatUnresolved {
        /// Source filter name.
        src: String,
        /// Destination filter name.
        dst: String,
    },

    /// A pad's config_props callback rejected the link.
    #[error("failed to configure link {src} -> {dst}: {reason}")]
    LinkConfig {
        /// Source filter name.
        src: String,
        /// Destination filter name.
        dst: String,
        /// Why configuration failed.
        reason: String,
    },

    /// A frame was requested through a pad with nothing attached.
    #[error("{direction} pad {index} of '{filter}' is not connected")]
    NotConnected {
        /// Filter instance name.
        filter: String,
        /// Which pad list was indexed.
        direction: PadDirection,
        /// Unconnected index.
        index: usize,
    },

    /// A frame callback ran with no frame in flight on its link.
    #[error("no frame in flight on the input of '{filter}'")]
    NoFrame {
        /// Filter whose input was empty.
        filter: String,
    },

    /// A buffer of the other media type was handed over.
    #[error("expected a {expected} buffer")]
    WrongMedia {
        /// Media type the receiver handles.
        expected: MediaType,
    },

    /// The source has no more frames to deliver.
    #[error("end of stream from '{filter}'")]
    EndOfStream {
        /// Filter that ran dry.
        filter: String,
    },

    /// A buffer reference lacks the permissions an operation needs.
    #[error("permission denied: have {have:?}, need {need:?}")]
    PermissionDenied {
        /// Permissions held.
        have: Perms,
        /// Permissions required.
        need: Perms,
    },

    /// The filter registry is at capacity.
    #[error("filter registry full ({capacity} filters)")]
    RegistryFull {
        /// Registry capacity.
        capacity: usize,
    },

    /// A filter with this name is already registered.
    #[error("filter '{0}' already registered")]
    DuplicateFilter(String),

    /// No filter with this name is registered.
    #[error("unknown filter '{0}'")]
    FilterNotFound(String),

    /// A filter rejected its init arguments.
    #[error("invalid arguments for '{filter}': {reason}")]
    InvalidArgument {
        /// Filter instance name.
        filter: String,
        /// What was wrong.
        reason: String,
    },

    /// A bounded queue cannot accept another frame.
    #[error("buffering limit reached in '{filter}' ({capacity} frames)")]
    QueueFull {
        /// Filter instance name.
        filter: String,
        /// Queue capacity.
        capacity: usize,
    },

    /// The buffer's data is locked by another guard.
    #[error("buffer data is locked elsewhere")]
    BufferBusy,

    /// Buffer allocation failed.
    #[error("buffer allocation failed: {0}")]
    AllocationFailed(String),

    /// The filter's private state is not of the requested type.
    #[error("private state of '{filter}' is not a {expected}")]
    StateType {
        /// Filter instance name.
        filter: String,
        /// Requested type name.
        expected: &'static str,
    },
}

impl Error {
    /// Whether this error only means the source has nothing more to give.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Error::EndOfStream { .. })
    }
}
