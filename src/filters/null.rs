//! Pass-through filters.

use crate::filter::{FilterTemplate, InputPad, NullPad, OutputPad};
use std::sync::Arc;

/// `null`: video frames go through untouched.
pub(crate) fn null() -> Arc<FilterTemplate> {
    FilterTemplate::builder("null")
        .description("Pass the video source unchanged to the output.")
        .input(InputPad::video("default").with_handler(NullPad))
        .output(OutputPad::video("default"))
        .build()
}

/// `anull`: sample batches go through untouched.
pub(crate) fn anull() -> Arc<FilterTemplate> {
    FilterTemplate::builder("anull")
        .description("Pass the source audio unchanged to the output.")
        .input(InputPad::audio("default").with_handler(NullPad))
        .output(OutputPad::audio("default"))
        .build()
}
