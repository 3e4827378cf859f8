//! The fluent step-constructor vocabulary, shared between
//! [`crate::traversal::pipeline::Traversal`] and
//! [`crate::traversal::anonymous::AnonymousTraversal`] via a single
//! default-method trait (component design §4.3, §6.1 "embedded API
//! surface").
//!
//! Each concrete type supplies only `map_chain`/`push`; every step
//! constructor and modulator is a default method built on top of those
//! two primitives, matching the fluent `mut self -> Self` idiom used
//! throughout the retrieval pack's query builder.

use std::collections::BTreeMap;

use crate::enums::{Cardinality, IoBackend, Order, Scope};
use crate::error::QueryError;
use crate::model::{AttrValue, EdgePair, NodeId};
use crate::predicate::P;
use crate::traversal::anonymous::AnonymousTraversal;
use crate::traversal::chain::StepChain;
use crate::traversal::step::{By, EmitMode, RepeatMode, Step, StepFlags};

/// Implemented by both traversal types; provides the shared fluent
/// vocabulary as default methods.
pub trait StepBuilder: Sized {
    /// Applies `f` to the underlying step chain, keeping every other
    /// field unchanged.
    fn map_chain(self, f: impl FnOnce(StepChain) -> StepChain) -> Self;

    /// Appends `step`, routed through the type's append rule (plain for
    /// `Traversal`, anonymous-safety-checked for `AnonymousTraversal`).
    fn push(self, step: Step) -> Self;

    /// Latches a construction error directly, bypassing `push`.
    fn fail(self, err: QueryError) -> Self {
        self.map_chain(|c| c.fail(err))
    }

    /// Mutates the tail step via `f`; fails with `UnsupportedModulator`
    /// if there is no tail step or `f` rejects the step.
    fn modulate(self, modulator: &'static str, f: impl FnOnce(&mut Step) -> Result<(), QueryError>) -> Self {
        self.map_chain(|c| c.modulate(modulator, f))
    }

    // ---- start ----

    /// `V(ids?)`: all nodes, or exactly the given ids.
    fn v(self, ids: impl Into<Vec<NodeId>>) -> Self {
        self.push(Step::V(ids.into()))
    }

    /// `E(ids?)`: all edges, or exactly the given `(src, dst)` pairs.
    fn e(self, pairs: impl Into<Vec<EdgePair>>) -> Self {
        self.push(Step::E(pairs.into()))
    }

    /// `addV(label, name, props)`.
    fn add_v(self, label: impl Into<String>, name: impl Into<String>, props: BTreeMap<String, AttrValue>) -> Self {
        self.push(Step::AddV { label: label.into(), name: name.into(), props })
    }

    /// `addE(label, ...)`; requires `from_`/`to_` modulators before build.
    fn add_e(self, label: impl Into<String>, props: BTreeMap<String, AttrValue>) -> Self {
        self.push(Step::AddE { label: label.into(), props, from: None, to: None })
    }

    // ---- navigation ----

    /// `out(dir)`.
    fn out(self, label: impl Into<Option<String>>) -> Self {
        self.push(Step::Out(label.into()))
    }
    /// `in(dir)`.
    fn in_(self, label: impl Into<Option<String>>) -> Self {
        self.push(Step::In(label.into()))
    }
    /// `both(dir)`.
    fn both(self, label: impl Into<Option<String>>) -> Self {
        self.push(Step::Both(label.into()))
    }
    /// `outE(dir)`.
    fn out_e(self, label: impl Into<Option<String>>) -> Self {
        self.push(Step::OutE(label.into()))
    }
    /// `inE(dir)`.
    fn in_e(self, label: impl Into<Option<String>>) -> Self {
        self.push(Step::InE(label.into()))
    }
    /// `bothE(dir)`.
    fn both_e(self, label: impl Into<Option<String>>) -> Self {
        self.push(Step::BothE(label.into()))
    }
    /// `outV`.
    fn out_v(self) -> Self {
        self.push(Step::OutV)
    }
    /// `inV`.
    fn in_v(self) -> Self {
        self.push(Step::InV)
    }
    /// `bothV`.
    fn both_v(self) -> Self {
        self.push(Step::BothV)
    }

    // ---- filter ----

    /// `has(key)`: presence test.
    fn has_key_present(self, key: impl Into<String>) -> Self {
        self.push(Step::Has { key: key.into(), pred: None })
    }
    /// `has(key, value_or_predicate)`.
    fn has(self, key: impl Into<String>, pred: P) -> Self {
        self.push(Step::Has { key: key.into(), pred: Some(pred) })
    }
    /// `has(label, key, value)`.
    fn has_labeled(self, label: impl Into<String>, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.push(Step::HasLabeled { label: label.into(), key: key.into(), value: value.into() })
    }
    /// `has_not(key)`.
    fn has_not(self, key: impl Into<String>) -> Self {
        self.push(Step::HasNot(key.into()))
    }
    /// `has_key(*keys)`.
    fn has_key(self, keys: Vec<String>) -> Self {
        self.push(Step::HasKey(keys))
    }
    /// `has_value(*vals)`.
    fn has_value(self, values: Vec<AttrValue>) -> Self {
        self.push(Step::HasValue(values))
    }
    /// `has_id(*ids)`.
    fn has_id(self, ids: Vec<NodeId>) -> Self {
        self.push(Step::HasId(ids))
    }
    /// `has_name(*names)`.
    fn has_name(self, names: Vec<String>) -> Self {
        self.push(Step::HasName(names))
    }
    /// `has_label(lbl_or_set)`.
    fn has_label(self, labels: Vec<String>) -> Self {
        self.push(Step::HasLabel(labels))
    }
    /// `contains(key, v_or_list)`.
    fn contains(self, key: impl Into<String>, values: Vec<AttrValue>) -> Self {
        self.push(Step::Contains { key: key.into(), values })
    }
    /// `within(key, options)`.
    fn within(self, key: impl Into<String>, options: Vec<AttrValue>) -> Self {
        self.push(Step::Within { key: key.into(), options })
    }
    /// `is_(value_or_predicate)`.
    fn is_(self, pred: P) -> Self {
        self.push(Step::Is(pred))
    }
    /// `simple_path(by?)`.
    fn simple_path(self) -> Self {
        self.push(Step::SimplePath(None))
    }
    /// `limit(n)`.
    fn limit(self, n: usize) -> Self {
        self.push(Step::Limit(n))
    }
    /// `range(low, high)`; `high < 0` means unbounded.
    fn range(self, low: i64, high: i64) -> Self {
        self.push(Step::Range(low, high))
    }
    /// `skip(n)`.
    fn skip(self, n: usize) -> Self {
        self.push(Step::Skip(n))
    }
    /// `dedup(by?)`.
    fn dedup(self) -> Self {
        self.push(Step::Dedup(None))
    }
    /// `not_(anon)`.
    fn not_(self, anon: AnonymousTraversal) -> Self {
        self.push(Step::Not(Box::new(anon)))
    }
    /// `and_(a, b)`.
    fn and_(self, a: AnonymousTraversal, b: AnonymousTraversal) -> Self {
        self.push(Step::And(Box::new(a), Box::new(b)))
    }
    /// `or_(a, b)`.
    fn or_(self, a: AnonymousTraversal, b: AnonymousTraversal) -> Self {
        self.push(Step::Or(Box::new(a), Box::new(b)))
    }
    /// `filter_(anon)`.
    fn filter_(self, anon: AnonymousTraversal) -> Self {
        self.push(Step::FilterAnon(Box::new(anon)))
    }

    // ---- map ----

    /// `id_`.
    fn id_(self) -> Self {
        self.push(Step::IdStep)
    }
    /// `value` (from a `Property`).
    fn value(self) -> Self {
        self.push(Step::ValueStep)
    }
    /// `key` (from a `Property`).
    fn key(self) -> Self {
        self.push(Step::KeyStep)
    }
    /// `values(*keys)`.
    fn values(self, keys: Vec<String>) -> Self {
        self.push(Step::Values(keys))
    }
    /// `properties(*keys)`.
    fn properties(self, keys: Vec<String>) -> Self {
        self.push(Step::Properties(keys))
    }
    /// `name`.
    fn name(self) -> Self {
        self.push(Step::Name)
    }
    /// `label`.
    fn label(self) -> Self {
        self.push(Step::Label)
    }
    /// `select(*keys, by?)`.
    fn select(self, keys: Vec<String>) -> Self {
        self.push(Step::Select { keys, by: Vec::new() })
    }
    /// `order(by?, order?)`.
    fn order(self) -> Self {
        self.push(Step::Order { by: None, order: Order::Asc })
    }
    /// `count(scope)`.
    fn count(self, scope: Scope) -> Self {
        self.push(Step::Count(scope))
    }
    /// `min`.
    fn min(self) -> Self {
        self.push(Step::Min)
    }
    /// `max`.
    fn max(self) -> Self {
        self.push(Step::Max)
    }
    /// `sum`.
    fn sum(self) -> Self {
        self.push(Step::Sum)
    }
    /// `mean`.
    fn mean(self) -> Self {
        self.push(Step::Mean)
    }
    /// `path(by?)`.
    fn path(self) -> Self {
        self.push(Step::PathStep(None))
    }
    /// `element_map(*keys?)`.
    fn element_map(self, keys: Vec<String>) -> Self {
        self.push(Step::ElementMap(keys))
    }
    /// `fold(seed, f)`.
    fn fold(self, seed: AttrValue, f: crate::traversal::step::FoldFn) -> Self {
        self.push(Step::Fold { seed, f })
    }

    // ---- branch ----

    /// `repeat(do)`; attach `times`/`until`/`emit` via modulators, or
    /// inherit them from a preceding `until(...)`/`emit(...)` call that
    /// had no `repeat()` yet to attach to (component design §4.5). A
    /// `until` inherited this way is check-first (`RepeatMode::UntilDo`):
    /// it was written before the loop body, so it runs before the first
    /// iteration.
    fn repeat(self, body: AnonymousTraversal) -> Self {
        self.map_chain(|mut chain| {
            if chain.has_error() {
                return chain;
            }
            let (until, emit) = chain.take_trailing_repeat_placeholders();
            let until = until.map(|anon| (anon, RepeatMode::UntilDo));
            chain.push(Step::Repeat { body: Box::new(body), times: None, until, emit })
        })
    }
    /// `branch(anon)`; attach `option(...)` via modulators.
    fn branch(self, selector: AnonymousTraversal) -> Self {
        self.push(Step::Branch { selector: Box::new(selector), options: Vec::new() })
    }
    /// `union(*anons)`.
    fn union(self, anons: Vec<AnonymousTraversal>) -> Self {
        if anons.is_empty() {
            return self.fail(QueryError::InvalidArguments {
                step: "union",
                detail: "union() requires at least one sub-traversal".to_string(),
            });
        }
        self.push(Step::Union(anons.into_iter().map(Box::new).collect()))
    }
    /// `local(anon)`.
    fn local(self, anon: AnonymousTraversal) -> Self {
        self.push(Step::Local(Box::new(anon)))
    }

    // ---- side-effect ----

    /// `side_effect(anon)`.
    fn side_effect(self, anon: AnonymousTraversal) -> Self {
        self.push(Step::SideEffect(Box::new(anon)))
    }
    /// `property([cardinality,] key, value)`.
    fn property(self, cardinality: Cardinality, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.push(Step::Property { cardinality, key: key.into(), value: value.into() })
    }

    // ---- modulators ----

    /// `as_(name)`: saves the traverser under `name`.
    fn as_(self, name: impl Into<String>) -> Self {
        self.push(Step::As(name.into()))
    }

    /// `by(key)`.
    fn by(self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.modulate("by", move |step| attach_by(step, By::Key(key)))
    }

    /// `by(key_path)`.
    fn by_path(self, path: Vec<String>) -> Self {
        self.modulate("by", move |step| attach_by(step, By::Path(path)))
    }

    /// `by(anon)`.
    fn by_anon(self, anon: AnonymousTraversal) -> Self {
        self.modulate("by", move |step| attach_by(step, By::Anon(Box::new(anon))))
    }

    /// `by(order_enum)` (also sets sort direction on `order()`).
    fn by_order(self, order: Order) -> Self {
        self.modulate("by", move |step| match step {
            Step::Order { order: o, .. } => {
                *o = order;
                Ok(())
            }
            _ => attach_by(step, By::OrderTag(order)),
        })
    }

    /// `from_(id)`: source node id for `addE`.
    fn from_(self, id: NodeId) -> Self {
        self.modulate("from_", move |step| match step {
            Step::AddE { from, .. } => {
                *from = Some(id);
                Ok(())
            }
            other => Err(QueryError::UnsupportedModulator { modulator: "from_", step: other.to_string() }),
        })
    }

    /// `to_(id)`: target node id for `addE`.
    fn to_(self, id: NodeId) -> Self {
        self.modulate("to_", move |step| match step {
            Step::AddE { to, .. } => {
                *to = Some(id);
                Ok(())
            }
            other => Err(QueryError::UnsupportedModulator { modulator: "to_", step: other.to_string() }),
        })
    }

    /// `until(anon)`. If the tail step is a `repeat()`, attaches directly
    /// in do-until mode (the body already ran once before this modulator
    /// arrived); otherwise becomes a placeholder consumed check-first by
    /// the next `repeat()` call (component design §4.5).
    fn until(self, anon: AnonymousTraversal) -> Self {
        self.map_chain(|chain| {
            if chain.has_error() {
                return chain;
            }
            match chain.steps().last() {
                Some(Step::Repeat { .. }) => chain.modulate("until", move |step| match step {
                    Step::Repeat { until, .. } => {
                        *until = Some((Box::new(anon), RepeatMode::DoUntil));
                        Ok(())
                    }
                    _ => unreachable!(),
                }),
                _ => chain.push(Step::UntilPlaceholder(Box::new(anon))),
            }
        })
    }

    /// `times(n)`.
    fn times(self, n: usize) -> Self {
        self.modulate("times", move |step| match step {
            Step::Repeat { times, .. } => {
                *times = Some(n);
                Ok(())
            }
            other => Err(QueryError::UnsupportedModulator { modulator: "times", step: other.to_string() }),
        })
    }

    /// `emit()`: emit every intermediate traverser. If the tail step is a
    /// `repeat()`, attaches directly; otherwise becomes a placeholder.
    fn emit(self) -> Self {
        self.map_chain(|chain| match chain.steps().last() {
            Some(Step::Repeat { .. }) => chain.modulate("emit", |step| match step {
                Step::Repeat { emit, .. } => {
                    *emit = Some(EmitMode::Always);
                    Ok(())
                }
                _ => unreachable!(),
            }),
            _ => chain.push(Step::EmitPlaceholder(None)),
        })
    }

    /// `emit(anon)`: emit traversers for which `anon` yields at least one
    /// element.
    fn emit_anon(self, anon: AnonymousTraversal) -> Self {
        self.map_chain(|chain| match chain.steps().last() {
            Some(Step::Repeat { .. }) => chain.modulate("emit", move |step| match step {
                Step::Repeat { emit, .. } => {
                    *emit = Some(EmitMode::Anon(Box::new(anon)));
                    Ok(())
                }
                _ => unreachable!(),
            }),
            _ => chain.push(Step::EmitPlaceholder(Some(Box::new(anon)))),
        })
    }

    /// `option(key, anon)`.
    fn option(self, key: impl Into<AttrValue>, anon: AnonymousTraversal) -> Self {
        let key = Some(key.into());
        self.modulate("option", move |step| match step {
            Step::Branch { options, .. } => {
                if options.iter().any(|(k, _)| k.as_ref() == key.as_ref()) {
                    return Err(QueryError::DuplicateOptionKey(format!("{:?}", key)));
                }
                options.push((key, Box::new(anon)));
                Ok(())
            }
            other => Err(QueryError::UnsupportedModulator { modulator: "option", step: other.to_string() }),
        })
    }

    /// `option(None, anon)`: the branch default.
    fn option_default(self, anon: AnonymousTraversal) -> Self {
        self.modulate("option", move |step| match step {
            Step::Branch { options, .. } => {
                if options.iter().any(|(k, _)| k.is_none()) {
                    return Err(QueryError::DuplicateDefaultOption);
                }
                options.push((None, Box::new(anon)));
                Ok(())
            }
            other => Err(QueryError::UnsupportedModulator { modulator: "option", step: other.to_string() }),
        })
    }

    /// `read()`: marks an `Io` tail step as a reader.
    fn read(self) -> Self {
        self.modulate("read", |step| match step {
            Step::Io { mode, .. } => {
                *mode = Some(false);
                Ok(())
            }
            other => Err(QueryError::UnsupportedModulator { modulator: "read", step: other.to_string() }),
        })
    }

    /// `write()`: marks an `Io` tail step as a writer.
    fn write(self) -> Self {
        self.modulate("write", |step| match step {
            Step::Io { mode, .. } => {
                *mode = Some(true);
                Ok(())
            }
            other => Err(QueryError::UnsupportedModulator { modulator: "write", step: other.to_string() }),
        })
    }

    // ---- terminal ----

    /// `to_list(by?, include_data?)`.
    fn to_list(self) -> Self {
        self.push(Step::ToList { by: None, include_data: false })
    }
    /// `as_path(by?)`.
    fn as_path(self) -> Self {
        self.push(Step::AsPath(None))
    }
    /// `has_next`.
    fn has_next(self) -> Self {
        self.push(Step::HasNext)
    }
    /// `next(n)`.
    fn next(self, n: usize) -> Self {
        self.push(Step::Next(n))
    }
    /// `iter(by?)`.
    fn iter(self) -> Self {
        self.push(Step::Iter(None))
    }
    /// `iterate()`.
    fn iterate(self) -> Self {
        self.push(Step::Iterate)
    }
    /// IO tail step for `read()`/`write()`.
    fn io(self, backend: IoBackend) -> Self {
        self.push(Step::Io { backend, mode: None, payload: None })
    }

    /// `with_json(text)`: attaches the raw JSON payload a following
    /// `read()` should ingest. No effect on `write()`, whose backend
    /// produces its own output payload.
    fn with_json(self, json: impl Into<String>) -> Self {
        let json = json.into();
        self.modulate("with_json", move |step| match step {
            Step::Io { payload, .. } => {
                *payload = Some(json);
                Ok(())
            }
            other => Err(QueryError::UnsupportedModulator { modulator: "with_json", step: other.to_string() }),
        })
    }

    // ---- camelCase aliases (component design §4.8) ----
    //
    // Generated mechanically from the canonical names above by collapsing
    // underscores and capitalizing the following character. Only the
    // canonical snake_case names are documented; these exist purely for
    // addressability under the alternate spelling.
    #[allow(non_snake_case)]
    /// See [`StepBuilder::out_e`].
    fn outE(self, label: impl Into<Option<String>>) -> Self {
        self.out_e(label)
    }
    #[allow(non_snake_case)]
    /// See [`StepBuilder::in_e`].
    fn inE(self, label: impl Into<Option<String>>) -> Self {
        self.in_e(label)
    }
    #[allow(non_snake_case)]
    /// See [`StepBuilder::both_e`].
    fn bothE(self, label: impl Into<Option<String>>) -> Self {
        self.both_e(label)
    }
    #[allow(non_snake_case)]
    /// See [`StepBuilder::out_v`].
    fn outV(self) -> Self {
        self.out_v()
    }
    #[allow(non_snake_case)]
    /// See [`StepBuilder::in_v`].
    fn inV(self) -> Self {
        self.in_v()
    }
    #[allow(non_snake_case)]
    /// See [`StepBuilder::both_v`].
    fn bothV(self) -> Self {
        self.both_v()
    }
    #[allow(non_snake_case)]
    /// See [`StepBuilder::has_not`].
    fn hasNot(self, key: impl Into<String>) -> Self {
        self.has_not(key)
    }
    #[allow(non_snake_case)]
    /// See [`StepBuilder::has_key`].
    fn hasKey(self, keys: Vec<String>) -> Self {
        self.has_key(keys)
    }
    #[allow(non_snake_case)]
    /// See [`StepBuilder::has_value`].
    fn hasValue(self, values: Vec<AttrValue>) -> Self {
        self.has_value(values)
    }
    #[allow(non_snake_case)]
    /// See [`StepBuilder::has_id`].
    fn hasId(self, ids: Vec<NodeId>) -> Self {
        self.has_id(ids)
    }
    #[allow(non_snake_case)]
    /// See [`StepBuilder::has_name`].
    fn hasName(self, names: Vec<String>) -> Self {
        self.has_name(names)
    }
    #[allow(non_snake_case)]
    /// See [`StepBuilder::has_label`].
    fn hasLabel(self, labels: Vec<String>) -> Self {
        self.has_label(labels)
    }
    #[allow(non_snake_case)]
    /// See [`StepBuilder::simple_path`].
    fn simplePath(self) -> Self {
        self.simple_path()
    }
    #[allow(non_snake_case)]
    /// See [`StepBuilder::element_map`].
    fn elementMap(self, keys: Vec<String>) -> Self {
        self.element_map(keys)
    }
    #[allow(non_snake_case)]
    /// See [`StepBuilder::side_effect`].
    fn sideEffect(self, anon: AnonymousTraversal) -> Self {
        self.side_effect(anon)
    }
    #[allow(non_snake_case)]
    /// See [`StepBuilder::as_path`].
    fn asPath(self) -> Self {
        self.as_path()
    }
    #[allow(non_snake_case)]
    /// See [`StepBuilder::has_next`].
    fn hasNext(self) -> Self {
        self.has_next()
    }
    #[allow(non_snake_case)]
    /// See [`StepBuilder::to_list`].
    fn toList(self) -> Self {
        self.to_list()
    }
    #[allow(non_snake_case)]
    /// See [`StepBuilder::add_v`].
    fn addV(self, label: impl Into<String>, name: impl Into<String>, props: BTreeMap<String, AttrValue>) -> Self {
        self.add_v(label, name, props)
    }
    #[allow(non_snake_case)]
    /// See [`StepBuilder::add_e`].
    fn addE(self, label: impl Into<String>, props: BTreeMap<String, AttrValue>) -> Self {
        self.add_e(label, props)
    }
    #[allow(non_snake_case)]
    /// See [`StepBuilder::with_json`].
    fn withJson(self, json: impl Into<String>) -> Self {
        self.with_json(json)
    }
}

fn attach_by(step: &mut Step, by: By) -> Result<(), QueryError> {
    use Step::*;
    match step {
        SimplePath(slot) | Dedup(slot) | PathStep(slot) | AsPath(slot) | Iter(slot) => {
            *slot = Some(by);
            Ok(())
        }
        Order { by: slot, .. } => {
            *slot = Some(by);
            Ok(())
        }
        Select { by: bys, .. } => {
            bys.push(by);
            Ok(())
        }
        ToList { by: slot, .. } => {
            *slot = Some(by);
            Ok(())
        }
        other if !other.flags().contains(StepFlags::SUPPORTS_BY) => {
            Err(QueryError::UnsupportedModulator { modulator: "by", step: other.to_string() })
        }
        other => Err(QueryError::UnknownByModulation(other.to_string())),
    }
}
