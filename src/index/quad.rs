//! (Subject, Predicate, Object, Graph-context) quads and the inverted
//! index built from them, per spec.md §3 "Quad" and §4.2 "Quad Index".

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

use crate::enums::IndexProfile;
use crate::model::{Edge, EdgePair, Node, NodeId};

/// One of the four quad positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    /// Subject.
    S,
    /// Predicate.
    P,
    /// Object.
    O,
    /// Graph-context.
    G,
}

/// The graph-context tag distinguishing which kind of fact a quad records
/// (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphContext {
    /// `(id, "label", label, NodeLabel)`.
    NodeLabel,
    /// `(id, "name", name, NodeName)`.
    NodeName,
    /// `(id, key, value, NodeProperty)`.
    NodeProperty,
    /// `(src, edge_label, dst, EdgeLink)`.
    EdgeLink,
    /// `(edge, "label", label, EdgeLabel)`.
    EdgeLabel,
    /// `(edge, "name", name, EdgeName)` — emitted only if the edge has a
    /// `name` attribute; edges have no mandatory name (spec.md §3).
    EdgeName,
    /// `(edge, key, value, EdgeProperty)`.
    EdgeProperty,
}

/// A hashable value occupying one quad position. Property values are
/// stringified via [`crate::model::AttrValue::index_key`] before they
/// reach this type (spec.md §4.2, §9 "Index invariance").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Component {
    /// A node id (subject of node quads, object of `edge-link`).
    Node(NodeId),
    /// An edge, identified by its `(source, target)` position (subject of
    /// edge-label/edge-property/edge-name quads).
    Edge(EdgePair),
    /// A predicate or stringified object value.
    Str(String),
    /// A graph-context tag.
    Context(GraphContext),
}

impl Component {
    fn node(id: NodeId) -> Self {
        Component::Node(id)
    }
    fn edge(pair: EdgePair) -> Self {
        Component::Edge(pair)
    }
    fn str(s: impl Into<String>) -> Self {
        Component::Str(s.into())
    }

    /// Narrows to a node id, for callers that know the component came from
    /// a node-typed position.
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Component::Node(id) => Some(*id),
            _ => None,
        }
    }

    /// Narrows to a string, for predicate/object components.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Component::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// A single (Subject, Predicate, Object, Graph-context) fact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Quad {
    s: Component,
    p: Component,
    o: Component,
    g: Component,
}

impl Quad {
    fn at(&self, pos: Position) -> &Component {
        match pos {
            Position::S => &self.s,
            Position::P => &self.p,
            Position::O => &self.o,
            Position::G => &self.g,
        }
    }
}

/// All twelve ordered position pairs (every (from, to) with `from != to`).
fn all_pairs() -> [(Position, Position); 12] {
    use Position::*;
    [
        (S, P), (S, O), (S, G),
        (P, S), (P, O), (P, G),
        (O, S), (O, P), (O, G),
        (G, S), (G, P), (G, O),
    ]
}

/// The eight pairs navigation/filter steps rely on day-to-day: both
/// directions of S<->P, S<->O, P<->O, plus S<->G for join validation.
fn minimal_pairs() -> [(Position, Position); 8] {
    use Position::*;
    [(S, P), (P, S), (S, O), (O, S), (P, O), (O, P), (S, G), (G, S)]
}

fn active_pairs(profile: IndexProfile) -> Vec<(Position, Position)> {
    match profile {
        IndexProfile::Off => Vec::new(),
        IndexProfile::Minimal => minimal_pairs().to_vec(),
        IndexProfile::All => all_pairs().to_vec(),
    }
}

/// The inverted index itself: one table per active `(from, to)` pair,
/// each mapping a from-value to the set of to-values co-occurring with it
/// in some quad.
#[derive(Debug)]
pub struct QuadIndex {
    profile: IndexProfile,
    active: FxHashSet<(Position, Position)>,
    tables: FxHashMap<(Position, Position), FxHashMap<Component, FxHashSet<Component>>>,
}

impl QuadIndex {
    /// Builds an empty index for the given profile.
    pub fn new(profile: IndexProfile) -> Self {
        let active: FxHashSet<_> = active_pairs(profile).into_iter().collect();
        Self {
            profile,
            active,
            tables: FxHashMap::default(),
        }
    }

    /// The configured profile.
    pub fn profile(&self) -> IndexProfile {
        self.profile
    }

    fn emit(&mut self, quad: Quad) {
        for &(from, to) in &self.active {
            let from_val = quad.at(from).clone();
            let to_val = quad.at(to).clone();
            self.tables
                .entry((from, to))
                .or_default()
                .entry(from_val)
                .or_default()
                .insert(to_val);
        }
        trace!(?quad, "indexed quad");
    }

    /// Indexes a newly-added node's label, name, and properties
    /// (spec.md §4.2).
    pub fn index_node(&mut self, node: &Node) {
        if self.active.is_empty() {
            return;
        }
        let subject = Component::node(node.id);
        self.emit(Quad {
            s: subject.clone(),
            p: Component::str("label"),
            o: Component::str(node.label.clone()),
            g: Component::Context(GraphContext::NodeLabel),
        });
        self.emit(Quad {
            s: subject.clone(),
            p: Component::str("name"),
            o: Component::str(node.name.clone()),
            g: Component::Context(GraphContext::NodeName),
        });
        for (key, value) in &node.attrs {
            self.emit(Quad {
                s: subject.clone(),
                p: Component::str(key.clone()),
                o: Component::str(value.index_key()),
                g: Component::Context(GraphContext::NodeProperty),
            });
        }
    }

    /// Indexes a newly-added edge's link, label, name (if any), and
    /// properties (spec.md §4.2).
    pub fn index_edge(&mut self, edge: &Edge) {
        if self.active.is_empty() {
            return;
        }
        self.emit(Quad {
            s: Component::node(edge.source),
            p: Component::str(edge.label.clone()),
            o: Component::node(edge.target),
            g: Component::Context(GraphContext::EdgeLink),
        });
        let subject = Component::edge(edge.pair());
        self.emit(Quad {
            s: subject.clone(),
            p: Component::str("label"),
            o: Component::str(edge.label.clone()),
            g: Component::Context(GraphContext::EdgeLabel),
        });
        if let Some(name) = edge.attrs.get("name") {
            self.emit(Quad {
                s: subject.clone(),
                p: Component::str("name"),
                o: Component::str(name.index_key()),
                g: Component::Context(GraphContext::EdgeName),
            });
        }
        for (key, value) in &edge.attrs {
            self.emit(Quad {
                s: subject.clone(),
                p: Component::str(key.clone()),
                o: Component::str(value.index_key()),
                g: Component::Context(GraphContext::EdgeProperty),
            });
        }
    }

    /// Returns `Some(to-values)` for `from_value` if `(from, to)` is an
    /// active pair (the set may be empty), or `None` if the pair is
    /// inactive. The step algebra treats `None` the same as an empty
    /// scan-me-instead signal; only [`Self::supports_join`] callers treat
    /// it as fatal (spec.md §4.2).
    pub fn lookup(&self, from: Position, to: Position, value: &Component) -> Option<Vec<Component>> {
        if !self.active.contains(&(from, to)) {
            return None;
        }
        Some(
            self.tables
                .get(&(from, to))
                .and_then(|t| t.get(value))
                .map(|set| set.iter().cloned().collect())
                .unwrap_or_default(),
        )
    }

    /// Node ids carrying `label`, via the `(P, O) -> S`... actually the
    /// `(O, S)` pair keyed on the label string, if active.
    pub fn nodes_with_label(&self, label: &str) -> Option<Vec<NodeId>> {
        let value = Component::str(label);
        self.lookup(Position::O, Position::S, &value).map(|cs| {
            cs.into_iter().filter_map(|c| c.as_node()).collect()
        })
    }

    /// Whether the pairs `join` needs (`S<->O` and `S<->G`) are active.
    pub fn supports_join(&self) -> bool {
        self.active.contains(&(Position::S, Position::O)) && self.active.contains(&(Position::O, Position::S))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn off_profile_indexes_nothing() {
        let mut idx = QuadIndex::new(IndexProfile::Off);
        let node = Node::new(1, "Person", "marko");
        idx.index_node(&node);
        assert_eq!(idx.nodes_with_label("Person"), None);
    }

    #[test]
    fn minimal_profile_finds_node_by_label() {
        let mut idx = QuadIndex::new(IndexProfile::Minimal);
        let node = Node::new(7, "Person", "marko");
        idx.index_node(&node);
        assert_eq!(idx.nodes_with_label("Person"), Some(vec![7]));
        assert_eq!(idx.nodes_with_label("Software"), Some(vec![]));
    }

    #[test]
    fn all_profile_supports_join() {
        let idx = QuadIndex::new(IndexProfile::All);
        assert!(idx.supports_join());
        let idx = QuadIndex::new(IndexProfile::Minimal);
        assert!(idx.supports_join());
        let idx = QuadIndex::new(IndexProfile::Off);
        assert!(!idx.supports_join());
    }

    #[test]
    fn property_lookup_round_trips_through_index_key() {
        let mut idx = QuadIndex::new(IndexProfile::All);
        let mut node = Node::new(1, "Person", "marko");
        node.attrs.insert(
            "age".to_string(),
            crate::model::AttrValue::Int(29),
        );
        idx.index_node(&node);
        let value = Component::str("29");
        let hits = idx.lookup(Position::O, Position::S, &value).unwrap();
        assert!(hits.contains(&Component::node(1)));
        let _ = BTreeMap::<String, crate::model::AttrValue>::new();
    }
}
