//! Free-function convenience layer mirroring the original implementation's
//! `statics.py`: each function starts a fresh [`AnonymousTraversal`] and
//! immediately applies one step constructor, so sub-traversal arguments
//! can be written as `out()` instead of `AnonymousTraversal::new().out()`
//! (SPEC_FULL.md §4.3 supplement). Purely ergonomic sugar — every
//! function here is a one-line composition of [`StepBuilder`] methods.

use std::collections::BTreeMap;

use crate::enums::Scope;
use crate::model::{AttrValue, NodeId};
use crate::predicate::P;
use crate::traversal::anonymous::AnonymousTraversal;
use crate::traversal::builder::StepBuilder;

fn anon() -> AnonymousTraversal {
    AnonymousTraversal::new()
}

/// `out(dir)`.
pub fn out(label: impl Into<Option<String>>) -> AnonymousTraversal {
    anon().out(label)
}
/// `in_(dir)`.
pub fn in_(label: impl Into<Option<String>>) -> AnonymousTraversal {
    anon().in_(label)
}
/// `both(dir)`.
pub fn both(label: impl Into<Option<String>>) -> AnonymousTraversal {
    anon().both(label)
}
/// `out_e(dir)`.
pub fn out_e(label: impl Into<Option<String>>) -> AnonymousTraversal {
    anon().out_e(label)
}
/// `in_e(dir)`.
pub fn in_e(label: impl Into<Option<String>>) -> AnonymousTraversal {
    anon().in_e(label)
}
/// `out_v()`.
pub fn out_v() -> AnonymousTraversal {
    anon().out_v()
}
/// `in_v()`.
pub fn in_v() -> AnonymousTraversal {
    anon().in_v()
}

/// `has(key, pred)`.
pub fn has(key: impl Into<String>, pred: P) -> AnonymousTraversal {
    anon().has(key, pred)
}
/// `has(key)` (presence only).
pub fn has_key_present(key: impl Into<String>) -> AnonymousTraversal {
    anon().has_key_present(key)
}
/// `has_not(key)`.
pub fn has_not(key: impl Into<String>) -> AnonymousTraversal {
    anon().has_not(key)
}
/// `has_id(*ids)`.
pub fn has_id(ids: Vec<NodeId>) -> AnonymousTraversal {
    anon().has_id(ids)
}
/// `has_name(*names)`.
pub fn has_name(names: Vec<String>) -> AnonymousTraversal {
    anon().has_name(names)
}
/// `has_label(lbl_or_set)`.
pub fn has_label(labels: Vec<String>) -> AnonymousTraversal {
    anon().has_label(labels)
}
/// `is_(value_or_predicate)`.
pub fn is_(pred: P) -> AnonymousTraversal {
    anon().is_(pred)
}
/// `simple_path()`.
pub fn simple_path() -> AnonymousTraversal {
    anon().simple_path()
}
/// `dedup()`.
pub fn dedup() -> AnonymousTraversal {
    anon().dedup()
}
/// `and_(a, b)`.
pub fn and_(a: AnonymousTraversal, b: AnonymousTraversal) -> AnonymousTraversal {
    anon().and_(a, b)
}
/// `or_(a, b)`.
pub fn or_(a: AnonymousTraversal, b: AnonymousTraversal) -> AnonymousTraversal {
    anon().or_(a, b)
}
/// `not_(anon)`.
pub fn not_(a: AnonymousTraversal) -> AnonymousTraversal {
    anon().not_(a)
}

/// `values(*keys)`.
pub fn values(keys: Vec<String>) -> AnonymousTraversal {
    anon().values(keys)
}
/// `properties(*keys)`.
pub fn properties(keys: Vec<String>) -> AnonymousTraversal {
    anon().properties(keys)
}
/// `name()`.
pub fn name() -> AnonymousTraversal {
    anon().name()
}
/// `label()`.
pub fn label() -> AnonymousTraversal {
    anon().label()
}
/// `id_()`.
pub fn id_() -> AnonymousTraversal {
    anon().id_()
}
/// `select(*keys)`.
pub fn select(keys: Vec<String>) -> AnonymousTraversal {
    anon().select(keys)
}
/// `order()`.
pub fn order() -> AnonymousTraversal {
    anon().order()
}
/// `count(scope)`.
pub fn count(scope: Scope) -> AnonymousTraversal {
    anon().count(scope)
}
/// `path()`.
pub fn path() -> AnonymousTraversal {
    anon().path()
}
/// `element_map(*keys?)`.
pub fn element_map(keys: Vec<String>) -> AnonymousTraversal {
    anon().element_map(keys)
}

/// `side_effect(anon)`.
pub fn side_effect(a: AnonymousTraversal) -> AnonymousTraversal {
    anon().side_effect(a)
}
/// `property([cardinality,] key, value)`.
pub fn property(
    cardinality: crate::enums::Cardinality,
    key: impl Into<String>,
    value: impl Into<AttrValue>,
) -> AnonymousTraversal {
    anon().property(cardinality, key, value)
}

/// `add_v(label, name, props)` — only valid as a step on a
/// [`crate::traversal::source::TraversalSource`]; kept here only as a
/// reminder that start steps are not anonymous-safe. Calling `.build()`
/// on the result always raises `QueryError::DisallowedInAnonymous`.
#[allow(dead_code)]
fn _add_v_is_disallowed_in_anonymous(label: &str, name: &str) -> AnonymousTraversal {
    anon().add_v(label.to_string(), name.to_string(), BTreeMap::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statics_build_the_same_steps_as_the_method_form() {
        let a = out(None);
        let b = AnonymousTraversal::new().out(None);
        assert_eq!(a.number_of_steps(), b.number_of_steps());
    }

    #[test]
    fn has_and_is_compose_like_and_or() {
        let filter = and_(values(vec!["age".into()]).is_(P::gte(30.0)), has_key_present("name"));
        assert!(filter.build().is_ok());
    }
}
