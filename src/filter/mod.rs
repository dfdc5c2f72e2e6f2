//! Filter templates, pads and the filter registry.
//!
//! A [`FilterTemplate`] describes a filter: its name, its [`InputPad`]s and
//! [`OutputPad`]s, and its [`FilterOps`] callbacks. Templates are registered
//! in a [`FilterRegistry`] and instantiated into a
//! [`FilterGraph`](crate::graph::FilterGraph).
//!
//! # Example
//!
//! ```rust
//! use filtergraph::filter::{FilterRegistry, FilterTemplate, InputPad, NullPad, OutputPad};
//!
//! let passthrough = FilterTemplate::builder("passthrough")
//!     .description("Forward video frames unchanged")
//!     .input(InputPad::video("default").with_handler(NullPad))
//!     .output(OutputPad::video("default"))
//!     .build();
//!
//! let registry = FilterRegistry::new();
//! registry.register(passthrough).unwrap();
//! assert!(registry.get_by_name("passthrough").is_some());
//! ```

mod pad;
mod registry;
mod template;

pub use pad::{DefaultPad, InputPad, InputPadOps, NullPad, OutputPad, OutputPadOps, SliceDir};
pub use registry::{DEFAULT_CAPACITY, FilterRegistry};
pub use template::{FilterOps, FilterTemplate, FilterTemplateBuilder};
