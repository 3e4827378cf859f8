//! Element and property-value types shared by the graph store, the quad
//! index, and the traversal core.
//!
//! # Examples
//!
//! ```rust
//! use mogwai_rs::model::{AttrValue, Node};
//!
//! let mut node = Node::new(1, "Person", "marko");
//! node.attrs.insert("age".into(), AttrValue::Int(29));
//! assert_eq!(node.attrs.get("age"), Some(&AttrValue::Int(29)));
//! ```

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier for a node. Opaque to callers beyond equality and ordering;
/// this crate represents it as a monotone `u64` (invariant 5, spec.md §3).
pub type NodeId = u64;

/// A directed multigraph position denoting an edge: `(source, target)`.
/// Multiple edges with different labels may share the same pair.
pub type EdgePair = (NodeId, NodeId);

/// A scalar or composite attribute value.
///
/// Mirrors the property-value sum type used throughout the retrieval
/// pack's graph models (`PropertyValue` in the teacher's `model.rs`),
/// widened with [`AttrValue::List`] and [`AttrValue::Map`] so it can
/// represent the sequences/sets/mappings the data model requires (spec.md
/// §3) and arbitrarily nested structures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrValue {
    /// Boolean value.
    Bool(bool),
    /// Signed 64-bit integer.
    Int(i64),
    /// 64-bit floating point number.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Ordered sequence of values.
    List(Vec<AttrValue>),
    /// Unordered collection with set semantics (duplicates collapsed on
    /// insert by the `property` side-effect step's `Cardinality::Set`).
    Set(Vec<AttrValue>),
    /// Nested key/value mapping.
    Map(BTreeMap<String, AttrValue>),
}

impl AttrValue {
    /// Numeric view used by aggregation steps (`sum`, `mean`, `min`, `max`)
    /// and the numeric predicates. Returns `None` for non-numeric variants,
    /// matching the "predicates never raise" policy in spec.md §7.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Int(v) => Some(*v as f64),
            AttrValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// String view, used by `starting_with`/`ends_with`/`containing`/`regex`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::String(v) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Length used by local-scope `count()` and by `dedup`/`simple_path`
    /// container handling: sequences/sets/maps report their element count,
    /// scalars report 1.
    pub fn container_len(&self) -> usize {
        match self {
            AttrValue::List(v) | AttrValue::Set(v) => v.len(),
            AttrValue::Map(m) => m.len(),
            _ => 1,
        }
    }

    /// Best-effort total ordering used by `order()`. Returns `None` across
    /// incompatible variants (TraversalError::NotComparable at the call
    /// site).
    pub fn partial_cmp_value(&self, other: &AttrValue) -> Option<Ordering> {
        match (self, other) {
            (AttrValue::Bool(a), AttrValue::Bool(b)) => a.partial_cmp(b),
            (AttrValue::Int(a), AttrValue::Int(b)) => a.partial_cmp(b),
            (AttrValue::Float(a), AttrValue::Float(b)) => a.partial_cmp(b),
            (AttrValue::Int(a), AttrValue::Float(b)) => (*a as f64).partial_cmp(b),
            (AttrValue::Float(a), AttrValue::Int(b)) => a.partial_cmp(&(*b as f64)),
            (AttrValue::String(a), AttrValue::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }

    /// Stringifies the value for quad-index keys (spec.md §9: "non-hashable
    /// property values are stringified at index time").
    pub fn index_key(&self) -> String {
        match self {
            AttrValue::Bool(v) => v.to_string(),
            AttrValue::Int(v) => v.to_string(),
            AttrValue::Float(v) => v.to_string(),
            AttrValue::String(v) => v.clone(),
            AttrValue::List(items) | AttrValue::Set(items) => {
                let parts: Vec<String> = items.iter().map(AttrValue::index_key).collect();
                format!("[{}]", parts.join(","))
            }
            AttrValue::Map(m) => {
                let parts: Vec<String> = m
                    .iter()
                    .map(|(k, v)| format!("{k}={}", v.index_key()))
                    .collect();
                format!("{{{}}}", parts.join(","))
            }
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index_key())
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}
impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}
impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}
impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::String(v.to_owned())
    }
}
impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::String(v)
    }
}

/// A node in the graph: a stable id, a single label, a name, and an
/// attribute bag that always exposes the conventional `label`/`name` keys
/// (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Stable, engine-assigned identifier.
    pub id: NodeId,
    /// Single-identifier label (the contract's `single_label` mode,
    /// spec.md §6.4).
    pub label: String,
    /// Display name.
    pub name: String,
    /// User-defined attributes, excluding the reserved `label`/`name` keys.
    pub attrs: BTreeMap<String, AttrValue>,
}

impl Node {
    /// Creates a node with no attributes beyond label and name.
    pub fn new(id: NodeId, label: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            name: name.into(),
            attrs: BTreeMap::new(),
        }
    }
}

/// A directed edge between two nodes, carrying its own label and
/// attribute bag. Multiple edges between the same ordered pair are
/// permitted provided their labels differ (spec.md §4.1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Source node id.
    pub source: NodeId,
    /// Target node id.
    pub target: NodeId,
    /// Edge label.
    pub label: String,
    /// User-defined attributes.
    pub attrs: BTreeMap<String, AttrValue>,
}

impl Edge {
    /// Creates an edge with no attributes.
    pub fn new(source: NodeId, target: NodeId, label: impl Into<String>) -> Self {
        Self {
            source,
            target,
            label: label.into(),
            attrs: BTreeMap::new(),
        }
    }

    /// The `(source, target)` position a traverser records when it moves
    /// across this edge.
    pub fn pair(&self) -> EdgePair {
        (self.source, self.target)
    }
}

/// The two reserved attribute keys every node attribute map must expose
/// (spec.md §4.1). Configurable via [`crate::config::GraphConfig`].
pub const DEFAULT_LABEL_FIELD: &str = "label";
/// See [`DEFAULT_LABEL_FIELD`].
pub const DEFAULT_NAME_FIELD: &str = "name";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_predicates_see_through_int_float_mix() {
        let a = AttrValue::Int(3);
        let b = AttrValue::Float(3.0);
        assert_eq!(a.partial_cmp_value(&b), Some(Ordering::Equal));
    }

    #[test]
    fn non_numeric_as_f64_is_none() {
        assert_eq!(AttrValue::String("x".into()).as_f64(), None);
    }

    #[test]
    fn index_key_stringifies_nested_containers() {
        let v = AttrValue::List(vec![AttrValue::Int(1), AttrValue::Int(2)]);
        assert_eq!(v.index_key(), "[1,2]");
    }
}
