//! # mogwai-rs - An Embedded Gremlin-Style Graph Traversal Engine
//!
//! `mogwai-rs` is an in-memory, single-process graph store paired with a
//! fluent Gremlin-style traversal DSL: build a chain of steps against a
//! [`TraversalSource`], then run it with a terminal method such as
//! [`Traversal::to_list`].
//!
//! ## Quick Start
//!
//! ```rust
//! use mogwai_rs::{Graph, GraphConfig, TraversalSource, StepBuilder};
//! use std::collections::BTreeMap;
//!
//! let mut graph = Graph::new(GraphConfig::default());
//! let marko = graph.add_node("Person", "marko", BTreeMap::new(), None)?;
//! let lop = graph.add_node("Software", "lop", BTreeMap::new(), None)?;
//! graph.add_edge(marko, lop, "created", BTreeMap::new())?;
//!
//! let g = TraversalSource::new(graph);
//! let names = g.v(vec![marko]).out(None).values(vec!["name".into()]).to_list()?;
//! assert_eq!(names.len(), 1);
//! # Ok::<(), mogwai_rs::Error>(())
//! ```
//!
//! ## Features
//!
//! - **Fluent traversal DSL**: start/filter/map/branch/terminal steps
//!   composed through [`StepBuilder`], with anonymous sub-traversals for
//!   arguments (`repeat`, `branch`, `filter_`, `by`, ...).
//! - **Quad index**: an optional (subject, predicate, object, graph)
//!   inverted index accelerating `has`/label lookups, configurable via
//!   [`config::IndexProfile`].
//! - **Typed error taxonomy**: construction-time ([`GraphError`],
//!   [`QueryError`]) and execution-time ([`TraversalError`]) failures,
//!   unified under [`Error`] for the public API's terminal methods.
//! - **Structured logging**: every non-obvious runtime decision (index
//!   hits/misses, depth bounds, eager re-raising) emits a `tracing`
//!   event; embedders wire up `tracing-subscriber`.
//! - **Snapshot semantics**: [`traversal::traverser::Core::save_cache`]
//!   carries `as_()`-saved labels across steps with copy-on-branch
//!   semantics, mirroring the original implementation's traverser model.
//!
//! ## Architecture
//!
//! - **Model layer** ([`model`]): node/edge/attribute value types.
//! - **Graph layer** ([`graph`], [`index`]): adjacency storage plus the
//!   quad index.
//! - **Traversal layer** ([`traversal`]): the step algebra, traverser
//!   state machine, fluent builder, anonymous sub-traversals, the
//!   executor, and the pipeline/source that bind steps to a graph.
//! - **Predicate layer** ([`predicate`]): the `P` comparison vocabulary
//!   used by `has`/`is_`/filter steps.

pub mod config;
pub mod enums;
pub mod error;
pub mod graph;
pub mod index;
pub mod model;
pub mod predicate;
pub mod traversal;

pub use crate::config::{GraphConfig, TraversalOptions};
pub use crate::error::{Error, GraphError, GraphResult, QueryError, QueryResult, Result, TraversalError, TraversalResult};
pub use crate::graph::Graph;
pub use crate::model::{AttrValue, Edge, EdgePair, Node, NodeId};
pub use crate::predicate::P;
pub use crate::traversal::{AnonymousTraversal, StepBuilder, Traversal, TraversalSource};
