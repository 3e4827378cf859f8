//! The step catalog and the bitmask that characterizes each step's shape
//! and modulator support (component design §4.3).
//!
//! Steps are data, not closures: every constructor argument (including
//! nested sub-traversals) is stored directly on the `Step` value, so there
//! is nothing to defer until a graph is available. See `DESIGN.md` for how
//! this resolves the "deferred building" design note in a statically
//! typed setting.

use std::fmt;
use std::sync::Arc;

use crate::enums::{Cardinality, IoBackend, Order, Scope};
use crate::model::{AttrValue, EdgePair, NodeId};
use crate::predicate::P;
use crate::traversal::anonymous::AnonymousTraversal;

/// Bitmask of the shape/modulator-support facts the builder and the
/// executor both need about a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepFlags(u16);

impl StepFlags {
    /// No flags set.
    pub const NONE: StepFlags = StepFlags(0);
    /// Produces the initial traverser set; must be first in a chain.
    pub const IS_START: StepFlags = StepFlags(1 << 0);
    /// Materializes a final result and closes the chain to further appends.
    pub const IS_TERMINAL: StepFlags = StepFlags(1 << 1);
    /// Requires path tracking to be enabled on the enclosing traversal.
    pub const NEEDS_PATH: StepFlags = StepFlags(1 << 2);
    /// Accepts a `by` modulator.
    pub const SUPPORTS_BY: StepFlags = StepFlags(1 << 3);
    /// Accepts an anonymous-sub-traversal `by`; implies `SUPPORTS_BY`.
    pub const SUPPORTS_ANON_BY: StepFlags = StepFlags(Self::SUPPORTS_BY.0 | (1 << 4));
    /// Accepts more than one `by`; implies `SUPPORTS_BY`.
    pub const SUPPORTS_MULTIPLE_BY: StepFlags = StepFlags(Self::SUPPORTS_BY.0 | (1 << 5));
    /// Accepts `from_`/`to_` modulators.
    pub const SUPPORTS_FROM_TO: StepFlags = StepFlags(1 << 6);
    /// Accepts a `with_` modulator.
    pub const SUPPORTS_WITH: StepFlags = StepFlags(1 << 7);

    fn union(self, other: StepFlags) -> StepFlags {
        StepFlags(self.0 | other.0)
    }

    /// Whether every bit set in `other` is also set in `self`.
    pub fn contains(self, other: StepFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for StepFlags {
    type Output = StepFlags;
    fn bitor(self, rhs: StepFlags) -> StepFlags {
        self.union(rhs)
    }
}

/// A named `by` modulation: a direct key, a key path, an anonymous
/// sub-traversal, or a sort-order tag (component design §4.3 "Order").
#[derive(Debug, Clone)]
pub enum By {
    /// A single attribute key, or `"label"`/`"name"`.
    Key(String),
    /// A nested key path, walked left to right.
    Path(Vec<String>),
    /// An anonymous sub-traversal evaluated per item.
    Anon(Box<AnonymousTraversal>),
    /// A bare sort-direction tag (used by `order()` with no key: sorts the
    /// item's own value).
    OrderTag(Order),
}

/// The reduction closure used by `fold`.
pub type FoldFn = Arc<dyn Fn(AttrValue, &AttrValue) -> AttrValue + Send + Sync>;

/// Which traversers `repeat`'s `emit` modulator releases mid-loop.
#[derive(Debug, Clone)]
pub enum EmitMode {
    /// Every intermediate traverser.
    Always,
    /// Only traversers for which the given sub-traversal yields at least
    /// one element.
    Anon(Box<AnonymousTraversal>),
}

/// Whether `until` is checked before (`UntilDo`) or after (`DoUntil`) the
/// repeat body runs, per modulator call order (component design §4.3
/// "Repeat").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatMode {
    /// `until(...)` was attached before `times`/the loop ran once.
    UntilDo,
    /// `until(...)` was attached after the body already ran once, i.e. via
    /// the placeholder mechanism consumed on the second `repeat`-adjacent
    /// call.
    DoUntil,
}

/// One operator in the step algebra.
#[derive(Clone)]
pub enum Step {
    // -- start --
    /// `V(ids?)`.
    V(Vec<NodeId>),
    /// `E(ids?)`.
    E(Vec<EdgePair>),
    /// `addV(label, name, props)`.
    AddV {
        /// Node label.
        label: String,
        /// Node name.
        name: String,
        /// Extra attributes.
        props: std::collections::BTreeMap<String, AttrValue>,
    },
    /// `addE(label, src, dst, props)`; `from_`/`to_` modulators fill in
    /// the endpoint ids when not given inline.
    AddE {
        /// Edge label.
        label: String,
        /// Extra attributes.
        props: std::collections::BTreeMap<String, AttrValue>,
        /// Source node id, set by `from_`.
        from: Option<NodeId>,
        /// Target node id, set by `to_`.
        to: Option<NodeId>,
    },

    // -- navigation --
    /// `out(dir)`.
    Out(Option<String>),
    /// `in(dir)`.
    In(Option<String>),
    /// `both(dir)`.
    Both(Option<String>),
    /// `outE(dir)`.
    OutE(Option<String>),
    /// `inE(dir)`.
    InE(Option<String>),
    /// `bothE(dir)`.
    BothE(Option<String>),
    /// `outV`.
    OutV,
    /// `inV`.
    InV,
    /// `bothV`.
    BothV,

    // -- filter --
    /// `has(key)` (presence only) or `has(key, value_or_predicate)`.
    Has {
        /// Attribute key.
        key: String,
        /// `None` tests presence only.
        pred: Option<P>,
    },
    /// `has(label, key, value)`.
    HasLabeled {
        /// Required label.
        label: String,
        /// Attribute key.
        key: String,
        /// Required value.
        value: AttrValue,
    },
    /// `has_not(key)`.
    HasNot(String),
    /// `has_key(*keys)`.
    HasKey(Vec<String>),
    /// `has_value(*vals)`.
    HasValue(Vec<AttrValue>),
    /// `has_id(*ids)`.
    HasId(Vec<NodeId>),
    /// `has_name(*names)`.
    HasName(Vec<String>),
    /// `has_label(lbl_or_set)`.
    HasLabel(Vec<String>),
    /// `contains(key, v_or_list)`.
    Contains {
        /// Attribute key.
        key: String,
        /// Value(s) the container must hold.
        values: Vec<AttrValue>,
    },
    /// `within(key, options)`.
    Within {
        /// Attribute key.
        key: String,
        /// Accepted values.
        options: Vec<AttrValue>,
    },
    /// `is_(value_or_predicate)`.
    Is(P),
    /// `simple_path(by?)`.
    SimplePath(Option<By>),
    /// `limit(n)`.
    Limit(usize),
    /// `range(low, high)`; `high < 0` means unbounded.
    Range(i64, i64),
    /// `skip(n)`.
    Skip(usize),
    /// `dedup(by?)`.
    Dedup(Option<By>),
    /// `not_(anon)`.
    Not(Box<AnonymousTraversal>),
    /// `and_(a, b)`.
    And(Box<AnonymousTraversal>, Box<AnonymousTraversal>),
    /// `or_(a, b)`.
    Or(Box<AnonymousTraversal>, Box<AnonymousTraversal>),
    /// `filter_(anon)`.
    FilterAnon(Box<AnonymousTraversal>),

    // -- map --
    /// `id_`.
    IdStep,
    /// `value` (from a `Property`).
    ValueStep,
    /// `key` (from a `Property`).
    KeyStep,
    /// `values(*keys)`.
    Values(Vec<String>),
    /// `properties(*keys)`.
    Properties(Vec<String>),
    /// `name`.
    Name,
    /// `label`.
    Label,
    /// `select(*keys, by?)`.
    Select {
        /// Saved labels to project.
        keys: Vec<String>,
        /// Optional per-key (or single, broadcast) indexer.
        by: Vec<By>,
    },
    /// `order(by?, order?)`.
    Order {
        /// Optional indexer; absent sorts the item's own value.
        by: Option<By>,
        /// Sort direction.
        order: Order,
    },
    /// `count(scope)`.
    Count(Scope),
    /// `min`.
    Min,
    /// `max`.
    Max,
    /// `sum`.
    Sum,
    /// `mean`.
    Mean,
    /// `path(by?)`.
    PathStep(Option<By>),
    /// `element_map(*keys?)`; empty means "all keys".
    ElementMap(Vec<String>),
    /// `fold(seed, f)`.
    Fold {
        /// Initial accumulator.
        seed: AttrValue,
        /// Reduction function.
        f: FoldFn,
    },

    // -- branch --
    /// `repeat(do, times?, until?)`.
    Repeat {
        /// Loop body.
        body: Box<AnonymousTraversal>,
        /// Fixed iteration count, if given.
        times: Option<usize>,
        /// Termination condition and check-order, if given.
        until: Option<(Box<AnonymousTraversal>, RepeatMode)>,
        /// Emission gate, if given.
        emit: Option<EmitMode>,
    },
    /// `branch(anon)` plus its `option(...)` modulators.
    Branch {
        /// The discriminating sub-traversal.
        selector: Box<AnonymousTraversal>,
        /// `(key, sub-traversal)` pairs; `key = None` is the default.
        options: Vec<(Option<AttrValue>, Box<AnonymousTraversal>)>,
    },
    /// `union(*anons)`.
    Union(Vec<Box<AnonymousTraversal>>),
    /// `local(anon)`.
    Local(Box<AnonymousTraversal>),

    // -- side-effect --
    /// `side_effect(f_or_anon)`.
    SideEffect(Box<AnonymousTraversal>),
    /// `property([cardinality,] key, value)`.
    Property {
        /// Write shape.
        cardinality: Cardinality,
        /// Attribute key (or nested path).
        key: String,
        /// Value to write.
        value: AttrValue,
    },

    /// `as_(name)`.
    As(String),

    // -- modulator placeholders (component design §4.5) --
    /// `until(anon)` with no preceding `repeat` yet to consume it.
    UntilPlaceholder(Box<AnonymousTraversal>),
    /// `emit(anon?)` with no preceding `repeat` yet to consume it.
    EmitPlaceholder(Option<Box<AnonymousTraversal>>),

    // -- terminal --
    /// `to_list(by?, include_data?)`.
    ToList {
        /// Optional projection.
        by: Option<By>,
        /// Whether element traversers emit full attribute maps.
        include_data: bool,
    },
    /// `as_path(by?)`.
    AsPath(Option<By>),
    /// `has_next`.
    HasNext,
    /// `next(n)`.
    Next(usize),
    /// `iter(by?)`.
    Iter(Option<By>),
    /// `iterate()`.
    Iterate,
    /// IO tail step; `mode` is `Some(true)` for write, `Some(false)` for
    /// read, `None` until a `read()`/`write()` modulator is applied.
    Io {
        /// Target format.
        backend: IoBackend,
        /// `Some(true)` = write, `Some(false)` = read.
        mode: Option<bool>,
        /// Raw payload for a read (`with_json`); ignored on write, where
        /// the backend instead produces its own output payload.
        payload: Option<String>,
    },
}

impl Step {
    /// This step's flag word.
    pub fn flags(&self) -> StepFlags {
        use Step::*;
        match self {
            V(_) | E(_) | AddV { .. } => StepFlags::IS_START,
            AddE { .. } => StepFlags::IS_START | StepFlags::SUPPORTS_FROM_TO,
            Out(_) | In(_) | Both(_) | OutE(_) | InE(_) | BothE(_) | OutV | InV | BothV => StepFlags::NONE,
            Has { .. } | HasLabeled { .. } | HasNot(_) | HasKey(_) | HasValue(_) | HasId(_)
            | HasName(_) | HasLabel(_) | Contains { .. } | Within { .. } | Is(_) | Limit(_)
            | Range(_, _) | Skip(_) | Not(_) | And(_, _) | Or(_, _) | FilterAnon(_) => StepFlags::NONE,
            SimplePath(_) => StepFlags::NEEDS_PATH | StepFlags::SUPPORTS_ANON_BY,
            Dedup(_) => StepFlags::SUPPORTS_ANON_BY,
            IdStep | ValueStep | KeyStep | Values(_) | Properties(_) | Name | Label => StepFlags::NONE,
            Select { .. } => StepFlags::SUPPORTS_MULTIPLE_BY,
            Order { .. } => StepFlags::SUPPORTS_ANON_BY,
            Count(_) | Min | Max | Sum | Mean => StepFlags::NONE,
            PathStep(_) => StepFlags::NEEDS_PATH | StepFlags::SUPPORTS_ANON_BY,
            ElementMap(_) => StepFlags::NONE,
            Fold { .. } => StepFlags::NONE,
            Repeat { .. } => StepFlags::NONE,
            Branch { .. } => StepFlags::NONE,
            Union(_) => StepFlags::NONE,
            Local(_) => StepFlags::NONE,
            SideEffect(_) => StepFlags::NONE,
            Property { .. } => StepFlags::NONE,
            As(_) => StepFlags::NONE,
            UntilPlaceholder(_) | EmitPlaceholder(_) => StepFlags::NONE,
            ToList { .. } => StepFlags::IS_TERMINAL | StepFlags::SUPPORTS_ANON_BY,
            AsPath(_) => StepFlags::IS_TERMINAL | StepFlags::NEEDS_PATH | StepFlags::SUPPORTS_ANON_BY,
            HasNext | Next(_) | Iterate => StepFlags::IS_TERMINAL,
            Iter(_) => StepFlags::IS_TERMINAL | StepFlags::SUPPORTS_ANON_BY,
            Io { .. } => StepFlags::IS_TERMINAL | StepFlags::SUPPORTS_WITH,
        }
    }

    /// Whether this step may appear inside an anonymous sub-traversal
    /// (component design §4.4): no terminal steps, no IO, no start steps
    /// other than the implicit passthrough (anonymous traversals never
    /// carry an explicit start step in this implementation, so every
    /// `Step::V`/`Step::E`/`AddV`/`AddE` is rejected outright).
    pub fn is_anonymous_safe(&self) -> bool {
        let flags = self.flags();
        !flags.contains(StepFlags::IS_TERMINAL)
            && !flags.contains(StepFlags::IS_START)
            && !matches!(self, Step::Io { .. })
    }

    /// Whether this step is Map-shaped (exactly one output per input, used
    /// to validate `branch`'s option sub-traversals).
    pub fn is_map_shaped(&self) -> bool {
        matches!(
            self,
            Step::IdStep
                | Step::ValueStep
                | Step::KeyStep
                | Step::Values(_)
                | Step::Properties(_)
                | Step::Name
                | Step::Label
                | Step::Select { .. }
                | Step::Count(_)
                | Step::Min
                | Step::Max
                | Step::Sum
                | Step::Mean
                | Step::PathStep(_)
                | Step::ElementMap(_)
                | Step::Fold { .. }
                | Step::Out(_)
                | Step::In(_)
                | Step::Both(_)
                | Step::OutV
                | Step::InV
                | Step::BothV
        )
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Step::*;
        let name = match self {
            V(_) => "V",
            E(_) => "E",
            AddV { .. } => "addV",
            AddE { .. } => "addE",
            Out(_) => "out",
            In(_) => "in",
            Both(_) => "both",
            OutE(_) => "outE",
            InE(_) => "inE",
            BothE(_) => "bothE",
            OutV => "outV",
            InV => "inV",
            BothV => "bothV",
            Has { .. } => "has",
            HasLabeled { .. } => "has",
            HasNot(_) => "has_not",
            HasKey(_) => "has_key",
            HasValue(_) => "has_value",
            HasId(_) => "has_id",
            HasName(_) => "has_name",
            HasLabel(_) => "has_label",
            Contains { .. } => "contains",
            Within { .. } => "within",
            Is(_) => "is_",
            SimplePath(_) => "simple_path",
            Limit(_) => "limit",
            Range(_, _) => "range",
            Skip(_) => "skip",
            Dedup(_) => "dedup",
            Not(_) => "not_",
            And(_, _) => "and_",
            Or(_, _) => "or_",
            FilterAnon(_) => "filter_",
            IdStep => "id_",
            ValueStep => "value",
            KeyStep => "key",
            Values(_) => "values",
            Properties(_) => "properties",
            Name => "name",
            Label => "label",
            Select { .. } => "select",
            Order { .. } => "order",
            Count(_) => "count",
            Min => "min",
            Max => "max",
            Sum => "sum",
            Mean => "mean",
            PathStep(_) => "path",
            ElementMap(_) => "element_map",
            Fold { .. } => "fold",
            Repeat { .. } => "repeat",
            Branch { .. } => "branch",
            Union(_) => "union",
            Local(_) => "local",
            SideEffect(_) => "side_effect",
            Property { .. } => "property",
            As(_) => "as_",
            UntilPlaceholder(_) => "until",
            EmitPlaceholder(_) => "emit",
            ToList { .. } => "to_list",
            AsPath(_) => "as_path",
            HasNext => "has_next",
            Next(_) => "next",
            Iter(_) => "iter",
            Iterate => "iterate",
            Io { .. } => "io",
        };
        write!(f, "{name}")
    }
}
