//! Link configuration.
//!
//! Links are configured depth-first from any filter: before a link is
//! configured, every link upstream of its source is. Each link moves
//! `Uninit -> StartInit -> Init`; meeting a `StartInit` link again means the
//! walk has come back around a cycle.

use super::{FilterGraph, FilterId, LinkState};
use crate::error::{Error, Result};
use crate::observability;
use std::sync::Arc;

impl FilterGraph {
    /// Configure every input link of `filter`, and everything upstream of them.
    ///
    /// For each unconfigured link: configure the source filter's inputs,
    /// pick the link's format, run the source pad's `config_props` and then
    /// the destination pad's. Configured links are skipped, so shared
    /// upstream branches are configured once.
    ///
    /// # Errors
    ///
    /// A cycle yields [`Error::CircularChain`]. The links on the cycle are
    /// reset to unconfigured and the remaining inputs are still configured
    /// before the error is returned. Any other failure aborts at once.
    pub fn config_links(&mut self, filter: FilterId) -> Result<()> {
        let inputs = self.get_filter(filter)?.inputs().to_vec();
        let mut circular = None;

        for link in inputs.into_iter().flatten() {
            match self.get_link(link)?.init_state {
                LinkState::Init => continue,
                LinkState::StartInit => {
                    tracing::info!(filter = %self.filter_name(filter), "circular filter chain detected");
                    return Err(Error::CircularChain {
                        filter: self.filter_name(filter),
                    });
                }
                LinkState::Uninit => {}
            }

            self.link_mut(link)?.init_state = LinkState::StartInit;
            let src = self.get_link(link)?.src();
            match self.configure_link(link, src) {
                Ok(()) => {
                    self.link_mut(link)?.init_state = LinkState::Init;
                    observability::record_link_configured(
                        &self.filter_name(src),
                        &self.filter_name(filter),
                    );
                    let l = self.get_link(link)?;
                    tracing::debug!(
                        src = %self.filter_name(src),
                        dst = %self.filter_name(filter),
                        format = ?l.format,
                        w = l.w,
                        h = l.h,
                        sample_rate = l.sample_rate,
                        "configured link"
                    );
                }
                Err(e @ Error::CircularChain { .. }) => {
                    tracing::warn!(
                        src = %self.filter_name(src),
                        dst = %self.filter_name(filter),
                        "abandoning link on a circular chain"
                    );
                    self.link_mut(link)?.init_state = LinkState::Uninit;
                    circular = Some(e);
                }
                Err(e) => {
                    self.link_mut(link)?.init_state = LinkState::Uninit;
                    return Err(e);
                }
            }
        }

        match circular {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn configure_link(&mut self, link: super::LinkId, src: FilterId) -> Result<()> {
        self.config_links(src)?;
        self.pick_format(link)?;

        let src_handler = Arc::clone(self.src_pad(link)?.handler());
        src_handler.config_props(self, link)?;
        let dst_handler = Arc::clone(self.dst_pad(link)?.handler());
        dst_handler.config_props(self, link)
    }

    /// Negotiate formats, then configure the links of every filter.
    ///
    /// A cycle does not stop the walk: the remaining filters are still
    /// configured and the first [`Error::CircularChain`] is returned at the
    /// end. Any other error is returned at once.
    pub fn configure(&mut self) -> Result<()> {
        let _graph_span = self
            .config()
            .tracing
            .graph_spans
            .then(|| observability::instrument_graph(self.filter_count(), self.link_count()));

        self.negotiate_formats()?;
        let mut cycle = None;
        for filter in self.filter_ids() {
            let _filter_span = self.config().tracing.filter_spans.then(|| {
                let ctx = self.get_filter(filter);
                let (instance, name) = ctx
                    .map(|c| (c.name().to_string(), c.template().name().to_string()))
                    .unwrap_or_default();
                observability::instrument_filter(&instance, &name)
            });
            match self.config_links(filter) {
                Ok(()) => {}
                Err(e @ Error::CircularChain { .. }) => {
                    cycle.get_or_insert(e);
                }
                Err(e) => return Err(e),
            }
        }
        cycle.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterTemplate, InputPad, OutputPad};
    use crate::format::{Format, PixelFormat};
    use crate::graph::LinkId;

    fn relay() -> Arc<FilterTemplate> {
        FilterTemplate::builder("relay")
            .input(InputPad::video("default"))
            .output(OutputPad::video("default"))
            .build()
    }

    #[test]
    fn test_direct_cycle_terminates() {
        let mut graph = FilterGraph::new();
        let a = graph.open(relay(), Some("A"));
        let b = graph.open(relay(), Some("B"));
        let ab = graph.link(a, 0, b, 0).unwrap();
        let ba = graph.link(b, 0, a, 0).unwrap();

        assert!(matches!(
            graph.config_links(a),
            Err(Error::CircularChain { .. })
        ));
        assert_eq!(graph.get_link(ab).unwrap().init_state(), LinkState::Uninit);
        assert_eq!(graph.get_link(ba).unwrap().init_state(), LinkState::Uninit);
    }

    #[test]
    fn test_cycle_leaves_other_branches_configured() {
        let mut graph = FilterGraph::new();
        let a = graph.open_by_name("null", Some("a")).unwrap();
        let b = graph.open_by_name("null", Some("b")).unwrap();
        graph.link(a, 0, b, 0).unwrap();
        graph.link(b, 0, a, 0).unwrap();
        let src = graph.open_by_name("buffer", Some("src")).unwrap();
        graph.init_filter(src, Some("4:4:gray"), None).unwrap();
        let sink = graph.open_by_name("nullsink", None).unwrap();
        let independent = graph.link(src, 0, sink, 0).unwrap();

        assert!(matches!(
            graph.configure(),
            Err(Error::CircularChain { .. })
        ));
        let l = graph.get_link(independent).unwrap();
        assert_eq!(l.init_state(), LinkState::Init);
        assert_eq!((l.w, l.h), (4, 4));
    }

    #[test]
    fn test_self_loop_terminates() {
        let mut graph = FilterGraph::new();
        let a = graph.open(relay(), Some("A"));
        graph.link(a, 0, a, 0).unwrap();
        assert!(graph.config_links(a).is_err());
    }

    #[test]
    fn test_source_without_config_props_fails() {
        let mut graph = FilterGraph::new();
        let src = graph.open(
            FilterTemplate::builder("bare")
                .output(OutputPad::video("default"))
                .build(),
            None,
        );
        let sink = graph.open(
            FilterTemplate::builder("sink")
                .input(InputPad::video("default"))
                .build(),
            None,
        );
        let link = graph.link(src, 0, sink, 0).unwrap();
        assert!(matches!(
            graph.config_links(sink),
            Err(Error::LinkConfig { .. })
        ));
        assert_eq!(graph.get_link(link).unwrap().init_state(), LinkState::Uninit);
    }

    #[test]
    fn test_chain_configures_once() {
        let mut graph = FilterGraph::new();
        let src = graph.open_by_name("buffer", Some("src")).unwrap();
        graph.init_filter(src, Some("32:24:gray"), None).unwrap();
        let mid = graph.open(relay(), Some("mid"));
        let sink = graph.open_by_name("nullsink", None).unwrap();
        let l0: LinkId = graph.link(src, 0, mid, 0).unwrap();
        let l1 = graph.link(mid, 0, sink, 0).unwrap();

        graph.configure().unwrap();
        for link in [l0, l1] {
            let l = graph.get_link(link).unwrap();
            assert_eq!(l.init_state(), LinkState::Init);
            assert_eq!((l.w, l.h), (32, 24));
            assert_eq!(l.format, Some(Format::Pixel(PixelFormat::Gray8)));
        }
        graph.config_links(sink).unwrap();
    }
}
