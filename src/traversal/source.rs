//! The traversal source: a factory binding a graph to start steps
//! (component design §4.6).

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use crate::config::TraversalOptions;
use crate::graph::Graph;
use crate::model::{AttrValue, EdgePair, NodeId};
use crate::traversal::pipeline::Traversal;
use crate::traversal::step::Step;
use std::collections::BTreeMap;

/// Holds a graph reference and default traversal options; the only way
/// to mint a [`Traversal`] in this crate (spec.md §4.6, §9 "Ownership of
/// the graph" — the source shares, not owns, the graph, so several
/// sources may sit over the same instance).
#[derive(Clone)]
pub struct TraversalSource {
    graph: Rc<RefCell<Graph>>,
    opts: TraversalOptions,
}

impl TraversalSource {
    /// Wraps `graph` for traversal, with default [`TraversalOptions`].
    pub fn new(graph: Graph) -> Self {
        Self {
            graph: Rc::new(RefCell::new(graph)),
            opts: TraversalOptions::default(),
        }
    }

    /// Wraps `graph` with explicit execution options.
    pub fn with_options(graph: Graph, opts: TraversalOptions) -> Self {
        Self {
            graph: Rc::new(RefCell::new(graph)),
            opts,
        }
    }

    /// Read access to the underlying graph, for inspection outside a
    /// traversal (e.g. asserting node counts in tests).
    pub fn graph_ref(&self) -> Ref<'_, Graph> {
        self.graph.borrow()
    }

    /// Mutable access to the underlying graph, for setup outside the
    /// fluent API (e.g. seeding a fixture, or calling the quad index's
    /// `join` operation directly).
    pub fn graph_mut(&self) -> RefMut<'_, Graph> {
        self.graph.borrow_mut()
    }

    /// `V(*ids)`: a fresh traversal over all nodes, or exactly the given
    /// ids.
    pub fn v(&self, ids: impl Into<Vec<NodeId>>) -> Traversal {
        Traversal::new(Rc::clone(&self.graph), Step::V(ids.into()), self.opts)
    }

    /// `E(*ids)`: a fresh traversal over all edges, or exactly the given
    /// `(src, dst)` pairs.
    pub fn e(&self, pairs: impl Into<Vec<EdgePair>>) -> Traversal {
        Traversal::new(Rc::clone(&self.graph), Step::E(pairs.into()), self.opts)
    }

    /// `addV(label, name, props)`.
    pub fn add_v(
        &self,
        label: impl Into<String>,
        name: impl Into<String>,
        props: BTreeMap<String, AttrValue>,
    ) -> Traversal {
        Traversal::new(
            Rc::clone(&self.graph),
            Step::AddV { label: label.into(), name: name.into(), props },
            self.opts,
        )
    }

    /// `addE(label, from_?, to_?, props)`: `from_`/`to_` modulators
    /// attach the endpoint node ids before the traversal is built.
    pub fn add_e(&self, label: impl Into<String>, props: BTreeMap<String, AttrValue>) -> Traversal {
        Traversal::new(
            Rc::clone(&self.graph),
            Step::AddE { label: label.into(), props, from: None, to: None },
            self.opts,
        )
    }

    #[allow(non_snake_case)]
    /// See [`TraversalSource::v`].
    pub fn V(&self, ids: impl Into<Vec<NodeId>>) -> Traversal {
        self.v(ids)
    }
    #[allow(non_snake_case)]
    /// See [`TraversalSource::e`].
    pub fn E(&self, pairs: impl Into<Vec<EdgePair>>) -> Traversal {
        self.e(pairs)
    }
    #[allow(non_snake_case)]
    /// See [`TraversalSource::add_v`].
    pub fn addV(&self, label: impl Into<String>, name: impl Into<String>, props: BTreeMap<String, AttrValue>) -> Traversal {
        self.add_v(label, name, props)
    }
    #[allow(non_snake_case)]
    /// See [`TraversalSource::add_e`].
    pub fn addE(&self, label: impl Into<String>, props: BTreeMap<String, AttrValue>) -> Traversal {
        self.add_e(label, props)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphConfig;
    use crate::traversal::builder::StepBuilder;

    #[test]
    fn v_with_no_ids_sees_every_node() {
        let mut g = Graph::new(GraphConfig::default());
        g.add_node("Person", "marko", BTreeMap::new(), None).unwrap();
        g.add_node("Person", "vadas", BTreeMap::new(), None).unwrap();
        let source = TraversalSource::new(g);
        assert_eq!(source.v(vec![]).to_list().unwrap().len(), 2);
    }

    #[test]
    fn add_v_then_v_count_reflects_new_node() {
        let source = TraversalSource::new(Graph::new(GraphConfig::default()));
        source.add_v("Person", "john", BTreeMap::new()).iterate().unwrap();
        assert_eq!(source.v(vec![]).to_list().unwrap().len(), 1);
    }

    #[test]
    fn add_e_without_endpoints_is_a_query_error() {
        let source = TraversalSource::new(Graph::new(GraphConfig::default()));
        let mut t = source.add_e("knows", BTreeMap::new());
        assert!(t.build().is_err());
    }
}
