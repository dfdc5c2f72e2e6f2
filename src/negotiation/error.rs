//! Negotiation error types.

use crate::format::Format;
use thiserror::Error;

/// Error during format negotiation.
#[derive(Debug, Error)]
pub enum NegotiationError {
    /// No common format between connected filters.
    #[error("No common format between {upstream} and {downstream}:\n  {explanation}")]
    NoCommonFormat {
        /// Name of upstream filter.
        upstream: String,
        /// Name of downstream filter.
        downstream: String,
        /// Detailed explanation.
        explanation: String,
    },

    /// A converter was needed but could not be inserted.
    #[error("Cannot insert converter '{converter}' between {upstream} and {downstream}: {reason}")]
    ConverterFailed {
        /// Converter filter name.
        converter: String,
        /// Name of upstream filter.
        upstream: String,
        /// Name of downstream filter.
        downstream: String,
        /// Why insertion failed.
        reason: String,
    },

    /// A format list handle no longer refers to a live list.
    #[error("Stale format list {0}")]
    StaleList(usize),
}

impl NegotiationError {
    /// Create a "no common format" error with suggestions.
    pub fn no_common_format(
        upstream: impl Into<String>,
        downstream: impl Into<String>,
        upstream_formats: &[Format],
        downstream_formats: &[Format],
    ) -> Self {
        Self::NoCommonFormat {
            upstream: upstream.into(),
            downstream: downstream.into(),
            explanation: format!(
                "Upstream produces: {}\nDownstream accepts: {}\nSuggestion: Insert a format converter",
                join_formats(upstream_formats),
                join_formats(downstream_formats)
            ),
        }
    }
}

fn join_formats(formats: &[Format]) -> String {
    if formats.is_empty() {
        return "(none)".to_string();
    }
    formats
        .iter()
        .map(Format::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
