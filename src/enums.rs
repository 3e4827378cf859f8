//! Identity-semantic constants shared across the embedded API surface
//! (spec.md §6.1): [`Scope`], [`Cardinality`], [`Order`], and the IO
//! backend tags.

use std::fmt;

/// Whether an aggregation considers the whole stream (`Global`) or each
/// traverser's own value independently (`Local`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Per-traverser.
    Local,
    /// Whole-stream.
    Global,
}

/// How the `property()` side-effect step coerces the value's container
/// shape when writing an attribute (spec.md §4.3 "Property side-effect").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Overwrite with a single scalar.
    Single,
    /// Append to an ordered list, creating it if absent.
    List,
    /// Insert into a set, creating it if absent; duplicates collapse.
    Set,
    /// Insert under a key into a nested map, creating it if absent.
    Map,
    /// Write under the graph's configured label key.
    Label,
}

/// Sort direction for `order()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Ascending (the default).
    Asc,
    /// Descending.
    Desc,
}

impl Default for Order {
    fn default() -> Self {
        Order::Asc
    }
}

/// Backend tag for the `Io` tail step's `read()`/`write()` modulators
/// (spec.md §6.1, §6.4). Format adapters beyond JSON are out of scope; see
/// SPEC_FULL.md §6.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoBackend {
    /// Bare reader/writer role with no format attached.
    Reader,
    /// See [`IoBackend::Reader`].
    Writer,
    /// JSON encoding of nodes/edges. The only backend with a bundled
    /// codec (feature `json-io`).
    Json,
    /// TinkerPop GraphSON. Recognized, not implemented.
    GraphSon,
    /// GraphSON's type-wrapped variant. Recognized, not implemented.
    GraphSonWrapped,
    /// GraphML. Recognized, not implemented.
    Graphml,
    /// RDF serialization. Recognized, not implemented.
    Rdf,
}

impl fmt::Display for IoBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Active subset of quad-index position pairs (spec.md §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexProfile {
    /// No indices maintained; every lookup is a linear scan.
    Off,
    /// The eight standard S/P/O/G pairs used by navigation and `has`.
    Minimal,
    /// All twelve ordered pairs, including those only `join` needs.
    All,
}

impl IndexProfile {
    /// Parses a profile name as accepted by [`crate::config::GraphConfig`],
    /// case-insensitively. Unknown names are a `QueryError` at graph
    /// construction (spec.md §7).
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "off" => Some(IndexProfile::Off),
            "minimal" => Some(IndexProfile::Minimal),
            "all" => Some(IndexProfile::All),
            _ => None,
        }
    }
}
