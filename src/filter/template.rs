//! Filter templates: the immutable descriptor every instance is opened from.

use super::pad::{InputPad, OutputPad};
use crate::error::Result;
use crate::graph::{self, FilterGraph, FilterId};
use std::any::Any;
use std::sync::Arc;

/// Filter-level callbacks.
///
/// Every method has a default: no private state, no-op init and uninit, and
/// [`default_query_formats`](crate::graph::default_query_formats).
pub trait FilterOps: Send + Sync {
    /// Fresh private state for a new instance.
    fn new_state(&self) -> Box<dyn Any + Send> {
        Box::new(())
    }

    /// Configure an instance from its argument string.
    fn init(
        &self,
        _graph: &mut FilterGraph,
        _filter: FilterId,
        _args: Option<&str>,
        _opaque: Option<&mut dyn Any>,
    ) -> Result<()> {
        Ok(())
    }

    /// Release whatever the instance holds outside its private state.
    fn uninit(&self, _graph: &mut FilterGraph, _filter: FilterId) {}

    /// Propose the formats each connected pad accepts.
    fn query_formats(&self, graph: &mut FilterGraph, filter: FilterId) -> Result<()> {
        graph::default_query_formats(graph, filter)
    }
}

struct DefaultOps;

impl FilterOps for DefaultOps {}

/// A named filter: pads and callbacks.
pub struct FilterTemplate {
    name: String,
    description: String,
    inputs: Vec<InputPad>,
    outputs: Vec<OutputPad>,
    ops: Arc<dyn FilterOps>,
}

impl FilterTemplate {
    /// Start building a template.
    pub fn builder(name: impl Into<String>) -> FilterTemplateBuilder {
        FilterTemplateBuilder {
            name: name.into(),
            description: String::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            ops: Arc::new(DefaultOps),
        }
    }

    /// Filter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Input pad descriptors.
    pub fn inputs(&self) -> &[InputPad] {
        &self.inputs
    }

    /// Output pad descriptors.
    pub fn outputs(&self) -> &[OutputPad] {
        &self.outputs
    }

    /// Filter-level callbacks.
    pub fn ops(&self) -> &Arc<dyn FilterOps> {
        &self.ops
    }
}

impl std::fmt::Debug for FilterTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterTemplate")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish()
    }
}

/// Builder for [`FilterTemplate`].
pub struct FilterTemplateBuilder {
    name: String,
    description: String,
    inputs: Vec<InputPad>,
    outputs: Vec<OutputPad>,
    ops: Arc<dyn FilterOps>,
}

impl FilterTemplateBuilder {
    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Append an input pad.
    pub fn input(mut self, pad: InputPad) -> Self {
        self.inputs.push(pad);
        self
    }

    /// Append an output pad.
    pub fn output(mut self, pad: OutputPad) -> Self {
        self.outputs.push(pad);
        self
    }

    /// Set the filter-level callbacks.
    pub fn ops(mut self, ops: impl FilterOps + 'static) -> Self {
        self.ops = Arc::new(ops);
        self
    }

    /// Finish the template.
    pub fn build(self) -> Arc<FilterTemplate> {
        Arc::new(FilterTemplate {
            name: self.name,
            description: self.description,
            inputs: self.inputs,
            outputs: self.outputs,
            ops: self.ops,
        })
    }
}
