//! The unit of traversal state and its two lightweight specializations.
//!
//! `Traverser`, `Value`, and `Property` form a closed sum (data model
//! "Traverser"/"Value"/"Property"): every step consumes and produces a
//! stream of [`Item`], dispatching on the tag rather than on a virtual
//! hierarchy, matching the "polymorphism of stream elements" design note.

use rustc_hash::FxHashMap;
use smallvec::{smallvec, SmallVec};

use crate::model::{AttrValue, EdgePair, NodeId};

/// Where a [`Traverser`] currently sits in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// Positioned on a node.
    Node(NodeId),
    /// Positioned on an edge, identified by `(source, target)`.
    Edge(EdgePair),
}

impl Position {
    /// The node id, if positioned on a node.
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Position::Node(id) => Some(*id),
            Position::Edge(_) => None,
        }
    }

    /// The edge pair, if positioned on an edge.
    pub fn as_edge(&self) -> Option<EdgePair> {
        match self {
            Position::Edge(pair) => Some(*pair),
            Position::Node(_) => None,
        }
    }
}

/// One visited position, recorded in a traverser's `path` when path
/// tracking is enabled.
pub type PathEntry = Position;

/// A traverser's recorded path. Most traversals only ever hop a handful of
/// edges deep, so this stays on the stack until it doesn't (`repeat()`
/// loops and long chains spill to the heap transparently).
pub type Path = SmallVec<[PathEntry; 8]>;

/// The closed sum of everything that can flow through a step pipeline.
#[derive(Debug, Clone)]
pub enum Item {
    /// An element-positioned traverser.
    Element(Traverser),
    /// A traverser carrying a scalar or composite value.
    Value(Value),
    /// A traverser carrying a single named property.
    Property(Property),
}

impl Item {
    /// Shared save-cache/scratch/path state, regardless of variant.
    pub fn core(&self) -> &Core {
        match self {
            Item::Element(t) => &t.core,
            Item::Value(v) => &v.core,
            Item::Property(p) => &p.core,
        }
    }

    /// Mutable access to the shared state.
    pub fn core_mut(&mut self) -> &mut Core {
        match self {
            Item::Element(t) => &mut t.core,
            Item::Value(v) => &mut v.core,
            Item::Property(p) => &mut p.core,
        }
    }

    /// Narrows to an element traverser.
    pub fn as_element(&self) -> Option<&Traverser> {
        match self {
            Item::Element(t) => Some(t),
            _ => None,
        }
    }

    /// Narrows to a mutable element traverser.
    pub fn as_element_mut(&mut self) -> Option<&mut Traverser> {
        match self {
            Item::Element(t) => Some(t),
            _ => None,
        }
    }

    /// The scalar/composite value carried by a `Value`, `Property`, or
    /// (as a convenience) the id of an `Element`.
    pub fn value_view(&self) -> Option<AttrValue> {
        match self {
            Item::Value(v) => Some(v.value.clone()),
            Item::Property(p) => Some(p.value.clone()),
            Item::Element(t) => match t.position {
                Position::Node(id) => Some(AttrValue::Int(id as i64)),
                Position::Edge(_) => None,
            },
        }
    }

    /// Deep copy used at branch points, per invariant 3 (copy-on-branch):
    /// mutating the copy's `save_cache` never mutates the original.
    pub fn copy(&self) -> Item {
        self.clone()
    }
}

/// Save-cache, scratch store, and optional path shared by every stream
/// item variant.
#[derive(Debug, Clone, Default)]
pub struct Core {
    /// Label -> snapshot of a prior stream item, populated by `as_`.
    pub save_cache: FxHashMap<String, Item>,
    /// Side-effect scratch store, keyed by arbitrary string.
    pub scratch: FxHashMap<String, AttrValue>,
    /// Ordered positions visited so far; `Some` iff the enclosing
    /// traversal declared `needs_path = true` at build time (invariant 2).
    pub path: Option<Path>,
}

impl Core {
    fn push_path(&mut self, pos: Position) {
        if let Some(path) = &mut self.path {
            path.push(pos);
        }
    }
}

/// An element-positioned unit of traversal state.
#[derive(Debug, Clone)]
pub struct Traverser {
    position: Position,
    core: Core,
}

impl Traverser {
    /// Starts a new traverser at `position` with no save-cache entries.
    /// `track_path` mirrors the enclosing traversal's `needs_path` flag.
    pub fn start(position: Position, track_path: bool) -> Self {
        let mut core = Core::default();
        if track_path {
            core.path = Some(smallvec![position]);
        }
        Self { position, core }
    }

    /// Current position.
    pub fn position(&self) -> Position {
        self.position
    }

    /// Node id, if positioned on a node.
    pub fn node_id(&self) -> Option<NodeId> {
        self.position.as_node()
    }

    /// Edge pair, if positioned on an edge.
    pub fn edge_pair(&self) -> Option<EdgePair> {
        self.position.as_edge()
    }

    /// Shared state.
    pub fn core(&self) -> &Core {
        &self.core
    }

    /// Mutable shared state.
    pub fn core_mut(&mut self) -> &mut Core {
        &mut self.core
    }

    /// Produces a new traverser moved to `position`, extending the path
    /// (if tracked) and carrying forward save_cache/scratch by clone
    /// (invariant 3: copy-on-branch).
    pub fn move_to(&self, position: Position) -> Traverser {
        let mut core = self.core.clone();
        core.push_path(position);
        Traverser { position, core }
    }

    /// Saves a clone of `item` under `label` in this traverser's
    /// save_cache, used by the `as_` modulator.
    pub fn save_as(&mut self, label: impl Into<String>, item: Item) {
        self.core.save_cache.insert(label.into(), item);
    }
}

/// A traverser carrying a scalar/composite value rather than an element
/// reference.
#[derive(Debug, Clone)]
pub struct Value {
    /// The carried value.
    pub value: AttrValue,
    core: Core,
}

impl Value {
    /// Builds a value-carrying item inheriting `core` from its source
    /// traverser (so `select`/`as_` chains keep working across a `values()`
    /// or similar map step).
    pub fn new(value: AttrValue, core: Core) -> Self {
        Self { value, core }
    }

    /// Shared state.
    pub fn core(&self) -> &Core {
        &self.core
    }

    /// Mutable shared state.
    pub fn core_mut(&mut self) -> &mut Core {
        &mut self.core
    }
}

/// A [`Value`] specialization additionally carrying the property key it
/// was read from; the output shape of `properties(...)`.
#[derive(Debug, Clone)]
pub struct Property {
    /// Property key.
    pub key: String,
    /// Property value.
    pub value: AttrValue,
    core: Core,
}

impl Property {
    /// Builds a property item inheriting `core` from its source.
    pub fn new(key: impl Into<String>, value: AttrValue, core: Core) -> Self {
        Self {
            key: key.into(),
            value,
            core,
        }
    }

    /// Shared state.
    pub fn core(&self) -> &Core {
        &self.core
    }

    /// Mutable shared state.
    pub fn core_mut(&mut self) -> &mut Core {
        &mut self.core
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_to_extends_path_only_when_tracked() {
        let t = Traverser::start(Position::Node(1), true);
        let t2 = t.move_to(Position::Node(2));
        assert_eq!(t2.core().path.as_ref().unwrap().len(), 2);

        let t = Traverser::start(Position::Node(1), false);
        let t2 = t.move_to(Position::Node(2));
        assert!(t2.core().path.is_none());
    }

    #[test]
    fn copy_on_branch_does_not_mutate_original() {
        let mut t = Traverser::start(Position::Node(1), false);
        t.save_as("x", Item::Element(Traverser::start(Position::Node(9), false)));
        let mut copy = Item::Element(t.clone());
        copy.core_mut().save_cache.insert(
            "y".to_string(),
            Item::Element(Traverser::start(Position::Node(42), false)),
        );
        assert!(t.core().save_cache.get("y").is_none());
    }
}
