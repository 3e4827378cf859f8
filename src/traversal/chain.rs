//! Shared step-accumulation machinery used by both
//! [`crate::traversal::pipeline::Traversal`] and
//! [`crate::traversal::anonymous::AnonymousTraversal`].
//!
//! Mirrors the retrieval pack's fluent query builder: every mutator takes
//! and returns `Self` by value, and a construction error is latched into
//! an `error` field rather than raised immediately, so a long method
//! chain can be written without `?` at every step. The latched error
//! surfaces the first time `finish()` is called.

use crate::error::QueryError;
use crate::traversal::anonymous::AnonymousTraversal;
use crate::traversal::step::{By, EmitMode, Step, StepFlags};

/// An ordered list of steps plus unresolved modulator placeholders and a
/// latched construction error.
#[derive(Clone, Default)]
pub struct StepChain {
    steps: Vec<Step>,
    error: Option<QueryError>,
    terminated: bool,
}

impl StepChain {
    /// An empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of steps recorded so far (component design §4.4
    /// "`number_of_steps()` works before building").
    pub fn number_of_steps(&self) -> usize {
        self.steps.len()
    }

    /// Read access to the recorded steps.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Whether a construction error has already been latched.
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Latches `err` if no error is latched yet; first error wins.
    pub fn fail(mut self, err: QueryError) -> Self {
        if self.error.is_none() {
            self.error = Some(err);
        }
        self
    }

    /// Appends `step`, subject to the termination rule (invariant 6: a
    /// terminated traversal rejects further appends).
    pub fn push(mut self, step: Step) -> Self {
        if self.error.is_some() {
            return self;
        }
        if self.terminated {
            return self.fail(QueryError::AlreadyTerminated);
        }
        if step.flags().contains(StepFlags::IS_TERMINAL) {
            self.terminated = true;
        }
        self.steps.push(step);
        self
    }

    /// Appends `step` only if it is anonymous-safe; used by
    /// `AnonymousTraversal`, which forbids start/terminal/IO steps
    /// (component design §4.4).
    pub fn push_anon_safe(self, step: Step) -> Self {
        if self.error.is_some() {
            return self;
        }
        if !step.is_anonymous_safe() {
            let name = step.to_string();
            return self.fail(QueryError::DisallowedInAnonymous(name));
        }
        self.push(step)
    }

    /// Mutates the tail step's fields via `f`, failing with
    /// `UnsupportedModulator` if there is no tail step or `f` rejects the
    /// mutation.
    pub fn modulate(
        mut self,
        modulator: &'static str,
        f: impl FnOnce(&mut Step) -> Result<(), QueryError>,
    ) -> Self {
        if self.error.is_some() {
            return self;
        }
        match self.steps.last_mut() {
            Some(step) => {
                if let Err(e) = f(step) {
                    return self.fail(e);
                }
                self
            }
            None => self.fail(QueryError::UnsupportedModulator {
                modulator,
                step: "<empty>".to_string(),
            }),
        }
    }

    /// Requires the tail step to support `flag`, else latches
    /// `UnsupportedModulator`.
    pub fn require_tail_flag(&self, modulator: &'static str, flag: StepFlags) -> Result<(), QueryError> {
        match self.steps.last() {
            Some(step) if step.flags().contains(flag) => Ok(()),
            Some(step) => Err(QueryError::UnsupportedModulator {
                modulator,
                step: step.to_string(),
            }),
            None => Err(QueryError::UnsupportedModulator {
                modulator,
                step: "<empty>".to_string(),
            }),
        }
    }

    /// Pops trailing `UntilPlaceholder`/`EmitPlaceholder` steps off the
    /// chain, folding them into the `until`/`emit` fields of the `repeat()`
    /// about to be pushed (component design §4.5: "`repeat` consumes them
    /// by popping backward while placeholders remain", mirroring
    /// `mogwai/core/traversal.py`'s `while isinstance(prevstep, Temp)`).
    /// The placeholder closest to the new `repeat()` call wins if either
    /// kind appears more than once.
    pub fn take_trailing_repeat_placeholders(&mut self) -> (Option<Box<AnonymousTraversal>>, Option<EmitMode>) {
        let mut until = None;
        let mut emit = None;
        loop {
            match self.steps.last() {
                Some(Step::UntilPlaceholder(_)) => {
                    if let Some(Step::UntilPlaceholder(anon)) = self.steps.pop() {
                        if until.is_none() {
                            until = Some(anon);
                        }
                    }
                }
                Some(Step::EmitPlaceholder(_)) => {
                    if let Some(Step::EmitPlaceholder(anon)) = self.steps.pop() {
                        if emit.is_none() {
                            emit = Some(anon.map(EmitMode::Anon).unwrap_or(EmitMode::Always));
                        }
                    }
                }
                _ => break,
            }
        }
        (until, emit)
    }

    /// Consumes the latched error, if any, alongside the accumulated
    /// steps — used by both `build()` implementations.
    pub fn finish(self) -> Result<Vec<Step>, QueryError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.steps),
        }
    }
}

/// Resolves a single `by` argument for a step that supports exactly one,
/// erroring if more than one was supplied.
pub fn single_by(mut bys: Vec<By>, modulator: &'static str, step: &'static str) -> Result<Option<By>, QueryError> {
    match bys.len() {
        0 => Ok(None),
        1 => Ok(Some(bys.remove(0))),
        _ => Err(QueryError::UnsupportedModulator { modulator, step: step.to_string() }),
    }
}
