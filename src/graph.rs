//! In-memory labeled directed multigraph: the "graph store" collaborator
//! contract of spec.md §4.1.
//!
//! This is a narrow, in-crate stand-in for the production graph container
//! the traversal core is designed against (out of scope per spec.md §1).
//! It owns no durability or transaction machinery; every mutation is
//! immediately visible to every open traversal, matching the "no isolation"
//! note in spec.md §9.

use std::collections::BTreeMap;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::config::GraphConfig;
use crate::error::{GraphError, GraphResult};
use crate::index::quad::QuadIndex;
use crate::model::{AttrValue, Edge, EdgePair, Node, NodeId};

#[derive(Debug, Clone, Default)]
struct AdjacencyBucket {
    /// Outgoing edges keyed by target id; a `Vec` because the contract
    /// allows multiple edges with distinct labels between the same pair.
    out: Vec<NodeId>,
    r#in: Vec<NodeId>,
}

/// The in-memory graph. Shared (not owned) by every
/// [`crate::traversal::source::TraversalSource`] built over it — spec.md §9
/// "Ownership of the graph".
#[derive(Debug)]
pub struct Graph {
    config: GraphConfig,
    nodes: FxHashMap<NodeId, Node>,
    /// Multigraph edges keyed by `(source, target)`; distinct labels
    /// between the same pair live in the same `Vec`.
    edges: FxHashMap<EdgePair, Vec<Edge>>,
    adjacency: FxHashMap<NodeId, AdjacencyBucket>,
    next_id: NodeId,
    index: QuadIndex,
}

impl Graph {
    /// Creates an empty graph under the given configuration, with the
    /// quad index active per `config.index_profile` (spec.md §4.2).
    pub fn new(config: GraphConfig) -> Self {
        let index = QuadIndex::new(config.index_profile);
        Self {
            config,
            nodes: FxHashMap::default(),
            edges: FxHashMap::default(),
            adjacency: FxHashMap::default(),
            next_id: 1,
            index,
        }
    }

    /// The graph's configuration, including reserved-key names.
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Read access to the quad index, for the navigation/filter steps that
    /// consult it as a performance aid (spec.md §4.2: "indices are a
    /// performance aid, not a semantic one").
    pub fn index(&self) -> &QuadIndex {
        &self.index
    }

    fn check_reserved(&self, attrs: &BTreeMap<String, AttrValue>) -> GraphResult<()> {
        if attrs.contains_key(&self.config.name_field) || attrs.contains_key(&self.config.label_field) {
            return Err(GraphError::ReservedKey(self.config.label_field.clone()));
        }
        Ok(())
    }

    /// Adds a node, auto-assigning a monotone id unless `explicit_id` is
    /// given (invariant 5, spec.md §3). Indices are updated within this
    /// same call (invariant 4).
    pub fn add_node(
        &mut self,
        label: impl Into<String>,
        name: impl Into<String>,
        attrs: BTreeMap<String, AttrValue>,
        explicit_id: Option<NodeId>,
    ) -> GraphResult<NodeId> {
        self.check_reserved(&attrs)?;
        let id = match explicit_id {
            Some(id) => {
                if self.nodes.contains_key(&id) {
                    return Err(GraphError::DuplicateId(id));
                }
                self.next_id = self.next_id.max(id + 1);
                id
            }
            None => {
                let id = self.next_id;
                self.next_id += 1;
                id
            }
        };
        let mut node = Node::new(id, label, name);
        node.attrs = attrs;
        self.index.index_node(&node);
        trace!(node_id = id, label = %node.label, "added node");
        self.nodes.insert(id, node);
        self.adjacency.entry(id).or_default();
        Ok(id)
    }

    /// Adds an edge. Fails if either endpoint is missing (`GraphError`,
    /// spec.md §4.1/§7). Multiple edges between the same pair are allowed
    /// as long as their labels differ is NOT enforced here (the contract
    /// only requires the *query engine* to cope with multi-edges; the
    /// store itself does not reject same-label duplicates).
    pub fn add_edge(
        &mut self,
        src: NodeId,
        dst: NodeId,
        label: impl Into<String>,
        attrs: BTreeMap<String, AttrValue>,
    ) -> GraphResult<()> {
        self.check_reserved(&attrs)?;
        if !self.nodes.contains_key(&src) {
            return Err(GraphError::MissingEndpoint(src));
        }
        if !self.nodes.contains_key(&dst) {
            return Err(GraphError::MissingEndpoint(dst));
        }
        let mut edge = Edge::new(src, dst, label);
        edge.attrs = attrs;
        self.index.index_edge(&edge);
        self.adjacency.entry(src).or_default().out.push(dst);
        self.adjacency.entry(dst).or_default().r#in.push(src);
        debug!(src, dst, label = %edge.label, "added edge");
        self.edges.entry((src, dst)).or_default().push(edge);
        Ok(())
    }

    /// Whether `id` names a node in this graph.
    pub fn has_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Whether any edge exists between `src` and `dst`.
    pub fn has_edge(&self, src: NodeId, dst: NodeId) -> bool {
        self.edges
            .get(&(src, dst))
            .map(|v| !v.is_empty())
            .unwrap_or(false)
    }

    /// Looks up a node by id.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Mutable access to a node's attribute map, for the `property()`
    /// side-effect step.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// All edges between `src` and `dst`, optionally filtered to one
    /// label.
    pub fn edges_between(&self, src: NodeId, dst: NodeId, label: Option<&str>) -> Vec<&Edge> {
        self.edges
            .get(&(src, dst))
            .into_iter()
            .flatten()
            .filter(|e| label.is_none_or(|l| e.label == l))
            .collect()
    }

    /// Mutable access to one edge's attributes, picking the first edge on
    /// `(src, dst)` matching `label` (or any, if `None`).
    pub fn edge_mut(&mut self, src: NodeId, dst: NodeId, label: Option<&str>) -> Option<&mut Edge> {
        self.edges
            .get_mut(&(src, dst))?
            .iter_mut()
            .find(|e| label.is_none_or(|l| e.label == l))
    }

    /// All nodes, in unspecified order (callers needing determinism sort
    /// downstream — `V()` with no ids uses ascending id order for
    /// reproducible tests).
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// All edges, in unspecified order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values().flatten()
    }

    /// Total node count.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Total edge count (each parallel edge counted once).
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(|v| v.len()).sum()
    }

    /// Successor node ids reachable via an outgoing edge, optionally
    /// filtered by label.
    pub fn successors(&self, id: NodeId, label: Option<&str>) -> Vec<NodeId> {
        self.out_edges(id, label).into_iter().map(|e| e.target).collect()
    }

    /// Predecessor node ids reachable via an incoming edge, optionally
    /// filtered by label.
    pub fn predecessors(&self, id: NodeId, label: Option<&str>) -> Vec<NodeId> {
        self.in_edges(id, label).into_iter().map(|e| e.source).collect()
    }

    /// Outgoing edges from `id`, optionally filtered by label.
    pub fn out_edges(&self, id: NodeId, label: Option<&str>) -> Vec<&Edge> {
        let Some(bucket) = self.adjacency.get(&id) else {
            return Vec::new();
        };
        bucket
            .out
            .iter()
            .flat_map(move |&dst| self.edges_between(id, dst, label))
            .collect()
    }

    /// Incoming edges to `id`, optionally filtered by label.
    pub fn in_edges(&self, id: NodeId, label: Option<&str>) -> Vec<&Edge> {
        let Some(bucket) = self.adjacency.get(&id) else {
            return Vec::new();
        };
        bucket
            .r#in
            .iter()
            .flat_map(move |&src| self.edges_between(src, id, label))
            .collect()
    }

    /// Join operation (spec.md §4.2): for every node with `from_label`
    /// whose `join_field` equals the `target_key` attribute of a node with
    /// `to_label`, insert an edge labeled `edge_label`. Requires the
    /// `(P, O)` and label index pairs to be active; fails fast otherwise.
    pub fn join(
        &mut self,
        from_label: &str,
        to_label: &str,
        join_field: &str,
        target_key: &str,
        edge_label: &str,
    ) -> Result<usize, crate::error::TraversalError> {
        if !self.index.supports_join() {
            return Err(crate::error::TraversalError::IndexNotActive("P->O"));
        }
        let mut to_by_key: FxHashMap<String, NodeId> = FxHashMap::default();
        for node in self.nodes.values() {
            if node.label == to_label {
                if let Some(v) = node.attrs.get(target_key) {
                    to_by_key.insert(v.index_key(), node.id);
                }
            }
        }
        let mut new_edges = Vec::new();
        for node in self.nodes.values() {
            if node.label != from_label {
                continue;
            }
            if let Some(v) = node.attrs.get(join_field) {
                if let Some(&target) = to_by_key.get(&v.index_key()) {
                    new_edges.push((node.id, target));
                }
            }
        }
        let count = new_edges.len();
        for (src, dst) in new_edges {
            self.add_edge(src, dst, edge_label, BTreeMap::new())
                .map_err(crate::error::TraversalError::Graph)?;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> Graph {
        Graph::new(GraphConfig::default())
    }

    #[test]
    fn add_node_assigns_monotone_ids() {
        let mut g = graph();
        let a = g.add_node("Person", "marko", BTreeMap::new(), None).unwrap();
        let b = g.add_node("Person", "vadas", BTreeMap::new(), None).unwrap();
        assert!(b > a);
    }

    #[test]
    fn add_edge_rejects_missing_endpoint() {
        let mut g = graph();
        let a = g.add_node("Person", "marko", BTreeMap::new(), None).unwrap();
        let err = g.add_edge(a, 999, "knows", BTreeMap::new()).unwrap_err();
        assert_eq!(err, GraphError::MissingEndpoint(999));
    }

    #[test]
    fn reserved_key_is_rejected() {
        let mut g = graph();
        let mut attrs = BTreeMap::new();
        attrs.insert("label".to_string(), AttrValue::String("x".into()));
        let err = g.add_node("Person", "marko", attrs, None).unwrap_err();
        assert!(matches!(err, GraphError::ReservedKey(_)));
    }

    #[test]
    fn successors_respect_label_filter() {
        let mut g = graph();
        let a = g.add_node("Person", "marko", BTreeMap::new(), None).unwrap();
        let b = g.add_node("Person", "vadas", BTreeMap::new(), None).unwrap();
        let c = g.add_node("Software", "lop", BTreeMap::new(), None).unwrap();
        g.add_edge(a, b, "knows", BTreeMap::new()).unwrap();
        g.add_edge(a, c, "created", BTreeMap::new()).unwrap();
        assert_eq!(g.successors(a, Some("created")), vec![c]);
        let mut all = g.successors(a, None);
        all.sort();
        assert_eq!(all, vec![b, c]);
    }

    #[test]
    fn explicit_id_bumps_next_id_counter() {
        let mut g = graph();
        g.add_node("Person", "marko", BTreeMap::new(), Some(100))
            .unwrap();
        let next = g.add_node("Person", "vadas", BTreeMap::new(), None).unwrap();
        assert_eq!(next, 101);
    }
}
