//! Anonymous sub-traversals: deferred-built pipelines embedded as values
//! inside steps, bound to the parent at build time (component design
//! §4.4).
//!
//! In this implementation steps are plain data rather than closures over
//! a graph reference, so there is nothing to literally defer: every
//! constructor call is appended to the chain immediately, exactly as it
//! would be on the parent traversal. What *is* deferred is validation —
//! `build()` walks the recorded steps once the parent's `needs_path` and
//! execution options are known, recursively building nested
//! sub-traversals. See `DESIGN.md` for the full rationale.

use crate::error::QueryError;
use crate::traversal::builder::StepBuilder;
use crate::traversal::chain::StepChain;
use crate::traversal::step::{Step, StepFlags};

/// A sub-traversal used as an argument to a step (`repeat`, `branch`,
/// `filter_`, `by`, ...), bound to its parent's graph at build time.
#[derive(Clone, Default)]
pub struct AnonymousTraversal {
    chain: StepChain,
}

impl AnonymousTraversal {
    /// Starts an empty anonymous sub-traversal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of steps recorded so far; usable before building.
    pub fn number_of_steps(&self) -> usize {
        self.chain.number_of_steps()
    }

    /// Whether any recorded step (or nested sub-traversal) requires path
    /// tracking. Meaningful after `build()`; before building it is a
    /// conservative OR over the raw step list.
    pub fn needs_path(&self) -> bool {
        self.chain.steps().iter().any(step_needs_path)
    }

    /// Builds this sub-traversal: validates anonymous-safety (already
    /// enforced at push time) and recursively builds nested
    /// sub-traversals, surfacing the first error encountered.
    pub fn build(self) -> Result<BuiltAnonymous, QueryError> {
        let steps = self.chain.finish()?;
        for step in &steps {
            validate_step(step)?;
        }
        Ok(BuiltAnonymous { steps })
    }

    /// Calling `run()` directly on an anonymous sub-traversal is always an
    /// error (invariant: "every anonymous sub-traversal `a`, calling
    /// `a.run()` raises").
    pub fn run(&self) -> Result<(), QueryError> {
        Err(QueryError::AnonymousCannotRun)
    }
}

/// A validated, ready-to-execute anonymous sub-traversal.
#[derive(Clone)]
pub struct BuiltAnonymous {
    steps: Vec<Step>,
}

impl BuiltAnonymous {
    /// The built step sequence.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Whether any step requires path tracking.
    pub fn needs_path(&self) -> bool {
        self.steps.iter().any(step_needs_path)
    }
}

/// Whether `step` (or any sub-traversal it embeds) requires path tracking.
/// Shared by [`AnonymousTraversal::needs_path`]/[`BuiltAnonymous::needs_path`]
/// and [`crate::traversal::pipeline::Traversal::build`]'s top-level OR.
pub(crate) fn step_needs_path(step: &Step) -> bool {
    if step.flags().contains(StepFlags::NEEDS_PATH) {
        return true;
    }
    match step {
        Step::Not(a) | Step::FilterAnon(a) | Step::Local(a) | Step::SideEffect(a) => a.needs_path(),
        Step::And(a, b) | Step::Or(a, b) => a.needs_path() || b.needs_path(),
        Step::Repeat { body, until, .. } => {
            body.needs_path() || until.as_ref().is_some_and(|(u, _)| u.needs_path())
        }
        Step::Branch { selector, options } => {
            selector.needs_path() || options.iter().any(|(_, a)| a.needs_path())
        }
        Step::Union(anons) => anons.iter().any(|a| a.needs_path()),
        _ => false,
    }
}

fn validate_step(step: &Step) -> Result<(), QueryError> {
    if !step.is_anonymous_safe() {
        return Err(QueryError::DisallowedInAnonymous(step.to_string()));
    }
    validate_nested(step)
}

/// Recursively builds every sub-traversal nested inside `step`, surfacing
/// the first error. Shared by [`AnonymousTraversal::build`] and
/// [`crate::traversal::pipeline::Traversal::build`] — the top-level
/// traversal has its own extra checks (`addE` endpoints, `Io` mode) but
/// needs the same nested-build walk before `exec` can assume every
/// embedded `AnonymousTraversal` is already valid.
pub(crate) fn validate_nested(step: &Step) -> Result<(), QueryError> {
    match step {
        Step::Not(a) | Step::FilterAnon(a) | Step::Local(a) | Step::SideEffect(a) => {
            a.clone().build().map(|_| ())
        }
        Step::And(a, b) | Step::Or(a, b) => {
            a.clone().build()?;
            b.clone().build().map(|_| ())
        }
        Step::Repeat { body, until, .. } => {
            body.clone().build()?;
            if let Some((u, _)) = until {
                u.clone().build()?;
            }
            Ok(())
        }
        Step::Branch { selector, options } => {
            selector.clone().build()?;
            for (_, anon) in options {
                let built = anon.clone().build()?;
                if !built.steps().last().is_some_and(Step::is_map_shaped) {
                    return Err(QueryError::BranchNotMapShaped);
                }
            }
            Ok(())
        }
        Step::Union(anons) => {
            for a in anons {
                a.clone().build()?;
            }
            Ok(())
        }
        Step::UntilPlaceholder(_) => Err(QueryError::LeftoverPlaceholder("until")),
        Step::EmitPlaceholder(_) => Err(QueryError::LeftoverPlaceholder("emit")),
        _ => Ok(()),
    }
}

impl StepBuilder for AnonymousTraversal {
    fn map_chain(mut self, f: impl FnOnce(StepChain) -> StepChain) -> Self {
        self.chain = f(self.chain);
        self
    }

    fn push(self, step: Step) -> Self {
        self.map_chain(|c| c.push_anon_safe(step))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_on_anonymous_is_an_error() {
        let a = AnonymousTraversal::new();
        assert!(a.run().is_err());
    }

    #[test]
    fn empty_anonymous_builds_as_identity() {
        let built = AnonymousTraversal::new().build().unwrap();
        assert!(built.steps().is_empty());
    }

    #[test]
    fn terminal_step_is_rejected_inside_anonymous() {
        let a = AnonymousTraversal::new().to_list();
        assert!(matches!(a.build(), Err(QueryError::DisallowedInAnonymous(_))));
    }

    #[test]
    fn leftover_until_placeholder_is_a_build_error() {
        let inner = AnonymousTraversal::new().has_not("x");
        let a = AnonymousTraversal::new().until(inner);
        assert!(matches!(a.build(), Err(QueryError::LeftoverPlaceholder("until"))));
    }
}
