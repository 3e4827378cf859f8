//! The traversal pipeline: step accumulation on a graph-bound chain,
//! build-time validation, and the two execution modes described in
//! component design §4.5.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::config::TraversalOptions;
use crate::error::{Error, QueryError, QueryResult, Result};
use crate::graph::Graph;
use crate::model::AttrValue;
use crate::traversal::anonymous::{step_needs_path, validate_nested};
use crate::traversal::builder::StepBuilder;
use crate::traversal::chain::StepChain;
use crate::traversal::exec;
use crate::traversal::step::Step;
use crate::traversal::traverser::Item;

/// A traversal bound to a graph: a chain of steps plus the execution
/// options it inherited from its [`crate::traversal::source::TraversalSource`]
/// (component design §4.5, §4.6).
pub struct Traversal {
    graph: Rc<RefCell<Graph>>,
    chain: StepChain,
    opts: TraversalOptions,
    built: Option<BuiltTraversal>,
}

/// The validated, graph-independent result of [`Traversal::build`].
struct BuiltTraversal {
    steps: Vec<Step>,
    #[allow(dead_code)]
    needs_path: bool,
}

impl Traversal {
    pub(crate) fn new(graph: Rc<RefCell<Graph>>, start: Step, opts: TraversalOptions) -> Self {
        Self {
            graph,
            chain: StepChain::new().push(start),
            opts,
            built: None,
        }
    }

    /// Number of steps recorded so far (works before or after `build()`,
    /// testable property 1: `t.number_of_steps() == len(t.query_steps)`).
    pub fn number_of_steps(&self) -> usize {
        match &self.built {
            Some(b) => b.steps.len(),
            None => self.chain.number_of_steps(),
        }
    }

    /// Validates and freezes the step chain: checks every leftover
    /// modulator placeholder, `addE` endpoint, and `Io` mode, then
    /// recursively builds every nested anonymous sub-traversal so `exec`
    /// can assume they are all already valid. Idempotent: re-running
    /// `build()` on an already-built traversal is a no-op.
    pub fn build(&mut self) -> QueryResult<()> {
        if self.built.is_some() {
            return Ok(());
        }
        let steps = self.chain.clone().finish()?;
        for step in &steps {
            validate_top_step(step)?;
        }
        let needs_path = steps.iter().any(step_needs_path);
        self.built = Some(BuiltTraversal { steps, needs_path });
        Ok(())
    }

    /// Runs the full pipeline, returning whatever the terminal step
    /// yields as a raw stream of stream items. The typed accessors below
    /// (`to_list`, `next`, ...) call this and narrow the result.
    pub fn run(&mut self) -> Result<Vec<Item>> {
        self.build()?;
        let built = self.built.as_ref().expect("built above");
        let needs_path = built.needs_path;
        let steps = built.steps.clone();
        let opts = self.opts;
        let mut graph = self.graph.borrow_mut();
        let mut stream: Vec<Item> = Vec::new();
        for step in &steps {
            stream = exec::apply_step(&mut graph, step, stream, &opts, needs_path)
                .map_err(|e| if opts.eager { e.in_step(step.to_string()) } else { e })
                .map_err(Error::Traversal)?;
        }
        Ok(stream)
    }

    /// `to_list(by?, include_data?)` terminal (spec.md §6.2), no projection:
    /// element traversers come back as bare ids. Most queries that want a
    /// projection instead chain `.values([key])`/`.select([...])` before
    /// this; [`Traversal::to_list_by`] covers `to_list(by=key)` directly.
    pub fn to_list(mut self) -> Result<Vec<AttrValue>> {
        self.chain = self.chain.push(Step::ToList { by: None, include_data: false });
        Ok(values_of(self.run()?))
    }

    /// `to_list(by=key)`: projects each emitted item through `key` before
    /// collecting, the same attribute lookup `has`/`values` use.
    pub fn to_list_by(mut self, key: impl Into<String>) -> Result<Vec<AttrValue>> {
        self.chain = self.chain.push(Step::ToList { by: Some(crate::traversal::step::By::Key(key.into())), include_data: false });
        Ok(values_of(self.run()?))
    }

    /// `to_list` with `include_data` set, for callers that want full
    /// attribute maps on element traversers rather than bare ids.
    pub fn to_list_with_data(mut self) -> Result<Vec<AttrValue>> {
        self.chain = self.chain.push(Step::ToList { by: None, include_data: true });
        Ok(values_of(self.run()?))
    }

    /// `has_next` terminal.
    pub fn has_next(mut self) -> Result<bool> {
        self.chain = self.chain.push(Step::HasNext);
        let out = self.run()?;
        Ok(out
            .first()
            .and_then(|i| i.value_view())
            .map(|v| matches!(v, AttrValue::Bool(true)))
            .unwrap_or(false))
    }

    /// `next(n)` terminal. `n=1` returns the first item or `None` on an
    /// empty stream; `n>1` pads with `None` for missing trailing items
    /// (spec.md §6.2).
    pub fn next(mut self, n: usize) -> Result<Vec<Option<AttrValue>>> {
        self.chain = self.chain.push(Step::Next(n));
        let out = values_of(self.run()?);
        let mut padded: Vec<Option<AttrValue>> = out.into_iter().map(Some).collect();
        while padded.len() < n {
            padded.push(None);
        }
        Ok(padded)
    }

    /// `iterate()` terminal: drains the stream for its side effects only.
    pub fn iterate(mut self) -> Result<()> {
        self.chain = self.chain.push(Step::Iterate);
        self.run()?;
        Ok(())
    }

    /// `iter(by?)` terminal: same projection as `to_list`, offered under
    /// its own name since the engine has no separate lazy representation
    /// to hand back (see DESIGN.md).
    pub fn iter(mut self) -> Result<Vec<AttrValue>> {
        self.chain = self.chain.push(Step::Iter(None));
        Ok(values_of(self.run()?))
    }

    /// `as_path(by?)` terminal: a sequence of paths, each itself a
    /// sequence of visited positions.
    pub fn as_path(mut self) -> Result<Vec<AttrValue>> {
        self.chain = self.chain.push(Step::AsPath(None));
        Ok(values_of(self.run()?))
    }
}

fn values_of(items: Vec<Item>) -> Vec<AttrValue> {
    items.into_iter().filter_map(|i| i.value_view()).collect()
}

fn validate_top_step(step: &Step) -> QueryResult<()> {
    match step {
        Step::UntilPlaceholder(_) => return Err(QueryError::LeftoverPlaceholder("until")),
        Step::EmitPlaceholder(_) => return Err(QueryError::LeftoverPlaceholder("emit")),
        Step::AddE { from, to, .. } => {
            if from.is_none() || to.is_none() {
                return Err(QueryError::AddEdgeMissingEndpoints);
            }
        }
        Step::Io { mode, .. } => {
            if mode.is_none() {
                return Err(QueryError::IoMissingMode);
            }
        }
        _ => {}
    }
    validate_nested(step)
}

impl StepBuilder for Traversal {
    fn map_chain(mut self, f: impl FnOnce(StepChain) -> StepChain) -> Self {
        self.chain = f(self.chain);
        self
    }

    fn push(mut self, step: Step) -> Self {
        self.chain = self.chain.push(step);
        self
    }
}

impl fmt::Debug for Traversal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Traversal").field("steps", &self.chain.number_of_steps()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphConfig;
    use crate::traversal::source::TraversalSource;
    use std::collections::BTreeMap;

    fn modern() -> TraversalSource {
        let source = TraversalSource::new(Graph::new(GraphConfig::default()));
        {
            let mut g = source.graph_mut();
            let marko = g.add_node("Person", "marko", attrs(&[("age", AttrValue::Int(29))]), None).unwrap();
            let vadas = g.add_node("Person", "vadas", attrs(&[("age", AttrValue::Int(27))]), None).unwrap();
            let josh = g.add_node("Person", "josh", attrs(&[("age", AttrValue::Int(32))]), None).unwrap();
            let peter = g.add_node("Person", "peter", attrs(&[("age", AttrValue::Int(35))]), None).unwrap();
            let lop = g.add_node("Software", "lop", attrs(&[("lang", AttrValue::String("java".into()))]), None).unwrap();
            let ripple = g.add_node("Software", "ripple", attrs(&[("lang", AttrValue::String("java".into()))]), None).unwrap();
            g.add_edge(marko, vadas, "knows", attrs(&[("weight", AttrValue::Float(0.5))])).unwrap();
            g.add_edge(marko, josh, "knows", attrs(&[("weight", AttrValue::Float(1.0))])).unwrap();
            g.add_edge(marko, lop, "created", attrs(&[("weight", AttrValue::Float(0.4))])).unwrap();
            g.add_edge(josh, ripple, "created", attrs(&[("weight", AttrValue::Float(1.0))])).unwrap();
            g.add_edge(josh, lop, "created", attrs(&[("weight", AttrValue::Float(0.4))])).unwrap();
            g.add_edge(peter, lop, "created", attrs(&[("weight", AttrValue::Float(0.2))])).unwrap();
        }
        source
    }

    fn attrs(pairs: &[(&str, AttrValue)]) -> BTreeMap<String, AttrValue> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn number_of_steps_matches_built_len() {
        let source = modern();
        let mut t = source.v(vec![]).out(None);
        assert_eq!(t.number_of_steps(), 2);
        t.build().unwrap();
        assert_eq!(t.number_of_steps(), 2);
    }

    #[test]
    fn v_count_equals_node_count() {
        let source = modern();
        let n = source.v(vec![]).to_list().unwrap().len();
        assert_eq!(n, source.graph_ref().node_count());
    }

    #[test]
    fn has_label_and_out_finds_created_software() {
        let source = modern();
        let names = source
            .v(vec![])
            .has_label(vec!["Person".into()])
            .has_name(vec!["marko".into()])
            .out(None)
            .values(vec!["name".into()])
            .to_list()
            .unwrap();
        assert_eq!(names, vec![AttrValue::String("lop".into())]);
    }

    #[test]
    fn appending_after_terminal_is_a_query_error() {
        let source = modern();
        let mut t = source.v(vec![]).push(Step::ToList { by: None, include_data: false });
        assert!(t.build().is_ok());
        let err = t.chain.clone().push(Step::HasNext).finish().unwrap_err();
        assert!(matches!(err, QueryError::AlreadyTerminated));
    }
}
