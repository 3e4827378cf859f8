//! First-class comparison/containment predicates usable anywhere a `has`
//! value argument is accepted (component design §4.7).
//!
//! Numeric predicates return `false` on non-numeric input rather than
//! raising, so `has`/`is` remain filters rather than hazards (error
//! handling design, "predicate application ... yields false, never
//! raises").

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::error::QueryError;
use crate::model::AttrValue;

/// A reusable, cloneable comparison/containment test against an
/// [`AttrValue`].
#[derive(Clone)]
pub struct P {
    name: &'static str,
    test: Arc<dyn Fn(&AttrValue) -> bool + Send + Sync>,
}

impl P {
    fn new(name: &'static str, test: impl Fn(&AttrValue) -> bool + Send + Sync + 'static) -> Self {
        Self {
            name,
            test: Arc::new(test),
        }
    }

    /// Evaluates the predicate against `value`.
    pub fn test(&self, value: &AttrValue) -> bool {
        (self.test)(value)
    }

    /// Negates this predicate, wrapping it under a `not(...)` name.
    pub fn negate(self) -> P {
        let inner = self.test.clone();
        P::new("not", move |v| !(inner)(v))
    }

    /// `v == target`.
    pub fn eq(target: AttrValue) -> P {
        P::new("eq", move |v| v == &target)
    }

    /// `v != target`.
    pub fn neq(target: AttrValue) -> P {
        P::eq(target).negate()
    }

    /// `v > target` (numeric only).
    pub fn gt(target: f64) -> P {
        P::new("gt", move |v| v.as_f64().is_some_and(|n| n > target))
    }

    /// `v >= target` (numeric only).
    pub fn gte(target: f64) -> P {
        P::new("gte", move |v| v.as_f64().is_some_and(|n| n >= target))
    }

    /// `v < target` (numeric only).
    pub fn lt(target: f64) -> P {
        P::new("lt", move |v| v.as_f64().is_some_and(|n| n < target))
    }

    /// `v <= target` (numeric only).
    pub fn lte(target: f64) -> P {
        P::new("lte", move |v| v.as_f64().is_some_and(|n| n <= target))
    }

    /// `lo < v < hi` (numeric only, exclusive).
    pub fn inside(lo: f64, hi: f64) -> P {
        P::new("inside", move |v| v.as_f64().is_some_and(|n| n > lo && n < hi))
    }

    /// `lo <= v <= hi` (numeric only, inclusive).
    pub fn between(lo: f64, hi: f64) -> P {
        P::new("between", move |v| v.as_f64().is_some_and(|n| n >= lo && n <= hi))
    }

    /// `v < lo || v > hi` (numeric only, exclusive).
    pub fn outside(lo: f64, hi: f64) -> P {
        P::new("outside", move |v| v.as_f64().is_some_and(|n| n < lo || n > hi))
    }

    /// `v` is one of `options`.
    pub fn within(options: Vec<AttrValue>) -> P {
        P::new("within", move |v| options.contains(v))
    }

    /// `v` is none of `options`.
    pub fn without(options: Vec<AttrValue>) -> P {
        P::within(options).negate()
    }

    /// String prefix test; `false` on non-string input.
    pub fn starting_with(prefix: impl Into<String>) -> P {
        let prefix = prefix.into();
        P::new("starting_with", move |v| {
            v.as_str().is_some_and(|s| s.starts_with(prefix.as_str()))
        })
    }

    /// String suffix test; `false` on non-string input.
    pub fn ending_with(suffix: impl Into<String>) -> P {
        let suffix = suffix.into();
        P::new("ending_with", move |v| {
            v.as_str().is_some_and(|s| s.ends_with(suffix.as_str()))
        })
    }

    /// String substring test; `false` on non-string input.
    pub fn containing(needle: impl Into<String>) -> P {
        let needle = needle.into();
        P::new("containing", move |v| {
            v.as_str().is_some_and(|s| s.contains(needle.as_str()))
        })
    }

    /// Regex match test; `false` on non-string input. The pattern is
    /// compiled eagerly, so an invalid pattern fails at predicate
    /// construction rather than at match time.
    pub fn regex(pattern: &str) -> Result<P, QueryError> {
        let re = Regex::new(pattern).map_err(|e| QueryError::InvalidArguments {
            step: "regex",
            detail: e.to_string(),
        })?;
        Ok(P::new("regex", move |v| {
            v.as_str().is_some_and(|s| re.is_match(s))
        }))
    }
}

impl fmt::Debug for P {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P::{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gte_is_false_on_non_numeric() {
        let p = P::gte(30.0);
        assert!(!p.test(&AttrValue::String("x".into())));
    }

    #[test]
    fn within_matches_exact_values() {
        let p = P::within(vec![AttrValue::String("lop".into()), AttrValue::String("ripple".into())]);
        assert!(p.test(&AttrValue::String("lop".into())));
        assert!(!p.test(&AttrValue::String("cobra".into())));
    }

    #[test]
    fn negate_round_trips() {
        let p = P::eq(AttrValue::Int(5)).negate();
        assert!(!p.test(&AttrValue::Int(5)));
        assert!(p.test(&AttrValue::Int(6)));
    }

    #[test]
    fn regex_rejects_invalid_pattern_eagerly() {
        assert!(P::regex("(unclosed").is_err());
    }

    #[test]
    fn between_is_inclusive_inside_is_exclusive() {
        assert!(P::between(10.0, 20.0).test(&AttrValue::Int(10)));
        assert!(!P::inside(10.0, 20.0).test(&AttrValue::Int(10)));
    }
}
