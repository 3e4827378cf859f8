//! Graph and traversal configuration knobs (spec.md §6.4).
//!
//! Kept deliberately small: schema/config *loading* (YAML, files) is an
//! explicit out-of-scope collaborator, so these are plain builder structs
//! an embedder constructs in code.

use crate::enums::IndexProfile;

/// Configuration bundle for a graph instance: reserved attribute key
/// names, default labels, the active quad-index profile, and whether node
/// labels are single strings (vs. sets — the sets variant is not
/// implemented, `single_label` is always honored as `true`; the field is
/// kept so the contract documented in spec.md §6.4 has a home).
#[derive(Debug, Clone, PartialEq)]
pub struct GraphConfig {
    /// Attribute key under which a node's name is stored. Default `"name"`.
    pub name_field: String,
    /// Attribute key under which a node's label is stored. Default `"label"`.
    pub label_field: String,
    /// Attribute key under which an edge's label is stored. Default `"label"`.
    pub edge_label_field: String,
    /// Label assigned to a node added without an explicit label.
    pub default_node_label: String,
    /// Label assigned to an edge added without an explicit label.
    pub default_edge_label: String,
    /// Active quad-index profile.
    pub index_profile: IndexProfile,
    /// Whether node labels are single strings rather than label sets.
    pub single_label: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            name_field: "name".to_string(),
            label_field: "label".to_string(),
            edge_label_field: "label".to_string(),
            default_node_label: "vertex".to_string(),
            default_edge_label: "edge".to_string(),
            index_profile: IndexProfile::Minimal,
            single_label: true,
        }
    }
}

impl GraphConfig {
    /// Starts from the default configuration with a named index profile.
    /// Mirrors the `QueryError::UnknownIndexProfile` contract in spec.md §7.
    pub fn with_index_profile(name: &str) -> Result<Self, crate::error::QueryError> {
        let index_profile = IndexProfile::parse(name)
            .ok_or_else(|| crate::error::QueryError::UnknownIndexProfile(name.to_string()))?;
        Ok(Self {
            index_profile,
            ..Self::default()
        })
    }
}

/// Per-traversal execution options (spec.md §6.4), set on the
/// [`crate::traversal::source::TraversalSource`] and inherited by every
/// traversal (and, transitively, every anonymous sub-traversal) it
/// produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraversalOptions {
    /// Materialize to a list after every non-terminal step, so a failing
    /// step can be named in the resulting error (spec.md §4.5).
    pub eager: bool,
    /// Reserved extension point for a query-plan optimizer pass; currently
    /// always a no-op (spec.md §4.5, §9).
    pub optimize: bool,
    /// Run build-time structural checks beyond the mandatory ones (unknown
    /// variables, missing labels) before execution.
    pub query_verify: bool,
    /// Reserved for a future multi-threaded executor; the current core is
    /// single-threaded regardless of this flag (spec.md §5, §6.4).
    pub use_mp: bool,
    /// Bounds `repeat()` recursion (spec.md §5 "Timeouts").
    pub max_iteration_depth: usize,
}

impl Default for TraversalOptions {
    fn default() -> Self {
        Self {
            eager: false,
            optimize: true,
            query_verify: false,
            use_mp: false,
            max_iteration_depth: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_index_profile_is_a_query_error() {
        assert!(GraphConfig::with_index_profile("bogus").is_err());
    }

    #[test]
    fn known_profile_parses_case_insensitively() {
        let cfg = GraphConfig::with_index_profile("ALL").unwrap();
        assert_eq!(cfg.index_profile, IndexProfile::All);
    }
}
