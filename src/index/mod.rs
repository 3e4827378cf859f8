//! Quad-index subsystem (spec.md §4.2): an optional inverted index over
//! node/edge attributes that accelerates label, property, and edge-link
//! lookups. Indices are a performance aid, never a semantic requirement —
//! every step that consults one falls back to a linear scan when the
//! relevant pair is inactive.

pub mod quad;
