//! Error taxonomy for graph construction, query building, and traversal
//! execution.
//!
//! Three error kinds mirror the three phases a query passes through: the
//! backing graph container can fail on mutation ([`GraphError`]), the
//! fluent builder can fail while a [`crate::traversal::Traversal`] is being
//! constructed or built ([`QueryError`]), and the step pipeline can fail
//! while it is being run ([`TraversalError`]).

use thiserror::Error;

/// Errors raised by the in-memory graph store on element mutation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GraphError {
    /// A node or edge endpoint referenced an id that does not exist.
    #[error("{0} {1} does not exist")]
    NoSuchElement(&'static str, u64),
    /// An edge was added between nodes where one endpoint is missing.
    #[error("edge endpoint {0} does not exist")]
    MissingEndpoint(u64),
    /// A user-supplied property used a reserved attribute key.
    #[error("'{0}' is a reserved attribute key")]
    ReservedKey(String),
    /// An explicit node id was requested that is already in use.
    #[error("node id {0} already exists")]
    DuplicateId(u64),
}

/// Result alias for graph-store operations.
pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Errors raised while constructing or building a traversal, before any
/// step has consumed a single traverser.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum QueryError {
    /// A step constructor received an unsupported number of arguments.
    #[error("invalid number of arguments for `{step}`: {detail}")]
    InvalidArguments {
        /// Name of the step constructor that rejected its arguments.
        step: &'static str,
        /// Human-readable explanation.
        detail: String,
    },
    /// A modulator was applied to a step that does not support it.
    #[error("`{modulator}` is not supported on step `{step}`")]
    UnsupportedModulator {
        /// Modulator method name, e.g. `by`, `until`, `from_`.
        modulator: &'static str,
        /// Printed form of the tail step the modulator was applied to.
        step: String,
    },
    /// `option()` was called twice with the same key.
    #[error("duplicate option key `{0}`")]
    DuplicateOptionKey(String),
    /// `option(None, ...)` was supplied more than once.
    #[error("branch step already has a default option")]
    DuplicateDefaultOption,
    /// A `branch` function did not end in a map-shaped step.
    #[error("branch function must end in a map-shaped step")]
    BranchNotMapShaped,
    /// `by` received a modulation type the step does not recognize.
    #[error("unsupported `by` modulation for step `{0}`")]
    UnknownByModulation(String),
    /// A step was appended after the traversal's terminal step.
    #[error("cannot append a step to a terminated traversal")]
    AlreadyTerminated,
    /// `addE` was built without both `from_` and `to_`.
    #[error("addE requires both from_() and to_()")]
    AddEdgeMissingEndpoints,
    /// An IO step was built without `read()` or `write()`.
    #[error("IO step requires read() or write()")]
    IoMissingMode,
    /// The traversal's first step was not a start step.
    #[error("a traversal's first step must be a start step, got non-empty input")]
    StartStepNonEmptyInput,
    /// A disallowed step (terminal, IO, or non-passthrough start) was used
    /// inside an anonymous sub-traversal.
    #[error("step `{0}` is not allowed inside an anonymous sub-traversal")]
    DisallowedInAnonymous(String),
    /// An `index_profile` name did not match a known profile.
    #[error("unknown index profile `{0}`")]
    UnknownIndexProfile(String),
    /// `until`/`emit` modulators were left dangling with no following
    /// `repeat()` to consume them.
    #[error("leftover `{0}` modulator with no following repeat()")]
    LeftoverPlaceholder(&'static str),
    /// `run()` was called on an anonymous sub-traversal.
    #[error("anonymous sub-traversals cannot be run directly")]
    AnonymousCannotRun,
}

/// Result alias for query-construction operations.
pub type QueryResult<T> = std::result::Result<T, QueryError>;

/// Errors raised while a built traversal is being executed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TraversalError {
    /// A navigation step received a traverser positioned on the wrong kind
    /// of element (e.g. `out()` on an edge-positioned traverser).
    #[error("type mismatch in step `{step}`: expected {expected}")]
    TypeMismatch {
        /// Step name, e.g. `out`, `outV`.
        step: &'static str,
        /// What the step required of its input.
        expected: &'static str,
    },
    /// `repeat()` exceeded its configured `max_iteration_depth`.
    #[error("max iteration depth {0} exceeded in repeat()")]
    MaxIterationDepthExceeded(usize),
    /// `order()` compared two values that have no defined ordering.
    #[error("values are not comparable for ordering")]
    NotComparable,
    /// An aggregation step (`sum`, `mean`, ...) saw a non-numeric value.
    #[error("aggregation requires numeric values")]
    NotNumeric,
    /// `select`/`load` referenced a label never saved with `as_`.
    #[error("no traverser was saved under label `{0}`; use as_(\"{0}\") first")]
    MissingSavedLabel(String),
    /// A start step (`V`/`E`) referenced a node or edge id that is absent.
    #[error("no element with id {0:?}")]
    MissingStartId(String),
    /// Two values of incompatible types were compared.
    #[error("cannot compare incompatible types")]
    IncompatibleComparison,
    /// Eager-mode wrapper: a step raised while materializing its output.
    #[error("step `{step}` failed: {source}")]
    StepFailed {
        /// Printed form of the step that raised.
        step: String,
        /// The underlying error.
        #[source]
        source: Box<TraversalError>,
    },
    /// A requested quad-index lookup pair is not active for the graph's
    /// configured profile.
    #[error("index pair {0} is not active for the configured profile")]
    IndexNotActive(&'static str),
    /// `Is` was applied to a traverser that does not carry a [`crate::traversal::traverser::Value`].
    #[error("is() requires a Value traverser")]
    NotAValue,
    /// Element data (attributes) was requested from a non-element traverser.
    #[error("cannot access element data on a Value or Property traverser")]
    NotAnElement,
    /// The backing graph raised while the step pipeline was mutating it.
    #[error(transparent)]
    Graph(#[from] GraphError),
    /// An `Io` step referenced a backend with no bundled codec.
    #[error("no codec bundled for IO backend `{0:?}`")]
    UnsupportedBackend(crate::enums::IoBackend),
    /// A bundled codec (currently only the `json-io` feature's JSON codec)
    /// failed to parse or serialize its payload.
    #[error("IO codec error: {0}")]
    IoCodec(String),
}

/// Result alias for traversal-execution operations.
pub type TraversalResult<T> = std::result::Result<T, TraversalError>;

impl TraversalError {
    /// Wraps `self` as the cause of a step failure, naming the step's
    /// printed form. Used by eager execution mode (§4.5).
    pub fn in_step(self, step: impl Into<String>) -> TraversalError {
        TraversalError::StepFailed {
            step: step.into(),
            source: Box::new(self),
        }
    }
}

/// The error any public entry point on [`crate::traversal::pipeline::Traversal`]
/// can raise: either phase's failure, unified so `run()`/`next()`/`to_list()`
/// callers need only one `Result` type (spec.md §7 "Propagation policy").
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// A failure while the chain was still being constructed or built.
    #[error(transparent)]
    Query(#[from] QueryError),
    /// A failure while the built chain was executing.
    #[error(transparent)]
    Traversal(#[from] TraversalError),
}

/// Result alias for the embedded API's public entry points.
pub type Result<T> = std::result::Result<T, Error>;

impl From<GraphError> for Error {
    /// Lets callers building nodes/edges directly against a [`crate::graph::Graph`]
    /// (outside the traversal DSL) use `?` against the same unified `Error`,
    /// since a bare `GraphError` is also a `TraversalError::Graph` in spirit.
    fn from(e: GraphError) -> Self {
        Error::Traversal(TraversalError::Graph(e))
    }
}
