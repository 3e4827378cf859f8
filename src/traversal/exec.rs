//! Step execution: each step consumes a materialized `Vec<Item>` and
//! produces a new one. This engine does not stream lazily between steps;
//! see `DESIGN.md` for why that simplification was chosen over the
//! generator-based model described in the component design.

use std::collections::BTreeMap;

use crate::config::TraversalOptions;
use crate::enums::{Cardinality, Order, Scope};
use crate::error::{GraphError, TraversalError};
use crate::graph::Graph;
use crate::model::AttrValue;
use crate::predicate::P;
use crate::traversal::anonymous::BuiltAnonymous;
use crate::traversal::step::{By, EmitMode, RepeatMode, Step};
use crate::traversal::traverser::{Core, Item, Position, Property, Traverser, Value};

type R<T> = Result<T, TraversalError>;

/// Runs every step of a built anonymous sub-traversal over `input`,
/// returning the final stream. An empty sub-traversal is the identity.
pub fn run_anon(
    graph: &mut Graph,
    anon: &BuiltAnonymous,
    input: Vec<Item>,
    opts: &TraversalOptions,
    needs_path: bool,
) -> R<Vec<Item>> {
    let mut stream = input;
    for step in anon.steps() {
        stream = apply_step(graph, step, stream, opts, needs_path).map_err(|e| {
            if opts.eager { e.in_step(step.to_string()) } else { e }
        })?;
    }
    Ok(stream)
}

/// Applies one step to `input`, returning its output stream.
pub fn apply_step(
    graph: &mut Graph,
    step: &Step,
    input: Vec<Item>,
    opts: &TraversalOptions,
    needs_path: bool,
) -> R<Vec<Item>> {
    match step {
        Step::V(ids) => start_v(graph, ids, needs_path),
        Step::E(pairs) => start_e(graph, pairs, needs_path),
        Step::AddV { label, name, props } => {
            let id = graph.add_node(label.clone(), name.clone(), props.clone(), None)?;
            Ok(vec![Item::Element(Traverser::start(Position::Node(id), needs_path))])
        }
        Step::AddE { label, props, from, to } => {
            let (Some(&src), Some(&dst)) = (from.as_ref(), to.as_ref()) else {
                return Err(TraversalError::MissingSavedLabel("addE requires from_()/to_()".to_string()));
            };
            graph.add_edge(src, dst, label.clone(), props.clone())?;
            Ok(vec![Item::Element(Traverser::start(Position::Edge((src, dst)), needs_path))])
        }

        Step::Out(label) => nav_flat(graph, input, "out", |g, id| g.successors(id, label.as_deref())),
        Step::In(label) => nav_flat(graph, input, "in", |g, id| g.predecessors(id, label.as_deref())),
        Step::Both(label) => nav_flat(graph, input, "both", |g, id| {
            let mut v = g.successors(id, label.as_deref());
            v.extend(g.predecessors(id, label.as_deref()));
            v
        }),
        Step::OutE(label) => nav_edges(graph, input, "outE", |g, id| {
            g.out_edges(id, label.as_deref()).into_iter().map(|e| e.pair()).collect()
        }),
        Step::InE(label) => nav_edges(graph, input, "inE", |g, id| {
            g.in_edges(id, label.as_deref()).into_iter().map(|e| e.pair()).collect()
        }),
        Step::BothE(label) => nav_edges(graph, input, "bothE", |g, id| {
            let mut v: Vec<_> = g.out_edges(id, label.as_deref()).into_iter().map(|e| e.pair()).collect();
            v.extend(g.in_edges(id, label.as_deref()).into_iter().map(|e| e.pair()));
            v
        }),
        Step::OutV => nav_endpoint(input, "outV", |pair| pair.0),
        Step::InV => nav_endpoint(input, "inV", |pair| pair.1),
        Step::BothV => nav_both_endpoints(input),

        Step::Has { key, pred } => filter_ok(input, |item| has_test(graph, item, key, pred.as_ref())),
        Step::HasLabeled { label, key, value } => filter_ok(input, |item| {
            element_label(graph, item).as_deref() == Some(label.as_str())
                && attr_lookup(graph, item, key).as_ref() == Some(value)
        }),
        Step::HasNot(key) => filter_ok(input, |item| attr_lookup(graph, item, key).is_none()),
        Step::HasKey(keys) => filter_ok(input, |item| keys.iter().any(|k| attr_lookup(graph, item, k).is_some())),
        Step::HasValue(values) => filter_ok(input, |item| values.iter().any(|v| item.value_view().as_ref() == Some(v))),
        Step::HasId(ids) => filter_ok(input, |item| {
            item.as_element().and_then(|t| t.node_id()).is_some_and(|id| ids.contains(&id))
        }),
        Step::HasName(names) => filter_ok(input, |item| element_name(graph, item).is_some_and(|n| names.contains(&n))),
        Step::HasLabel(labels) => filter_ok(input, |item| element_label(graph, item).is_some_and(|l| labels.contains(&l))),
        Step::Contains { key, values } => filter_ok(input, |item| match attr_lookup(graph, item, key) {
            Some(AttrValue::List(items)) | Some(AttrValue::Set(items)) => values.iter().all(|v| items.contains(v)),
            Some(other) => values.len() == 1 && values[0] == other,
            None => false,
        }),
        Step::Within { key, options } => {
            filter_ok(input, |item| attr_lookup(graph, item, key).is_some_and(|v| options.contains(&v)))
        }
        Step::Is(pred) => {
            let mut out = Vec::with_capacity(input.len());
            for item in input {
                let val = match &item {
                    Item::Value(v) => v.value.clone(),
                    Item::Property(p) => p.value.clone(),
                    Item::Element(_) => return Err(TraversalError::NotAValue),
                };
                if pred.test(&val) {
                    out.push(item);
                }
            }
            Ok(out)
        }
        Step::SimplePath(by) => Ok(input
            .into_iter()
            .filter(|item| match &item.core().path {
                Some(path) => {
                    let mut seen = std::collections::HashSet::new();
                    path.iter().all(|p| seen.insert(project_position(graph, *p, by.as_ref()).index_key()))
                }
                None => true,
            })
            .collect()),
        Step::Limit(n) => Ok(input.into_iter().take(*n).collect()),
        Step::Range(low, high) => {
            let low = (*low).max(0) as usize;
            if *high < 0 {
                Ok(input.into_iter().skip(low).collect())
            } else {
                let high = (*high).max(*low as i64) as usize;
                Ok(input.into_iter().skip(low).take(high - low).collect())
            }
        }
        Step::Skip(n) => Ok(input.into_iter().skip(*n).collect()),
        Step::Dedup(by) => {
            let mut seen = std::collections::HashSet::new();
            Ok(input.into_iter().filter(|item| seen.insert(dedup_key_with_by(graph, item, by.as_ref()))).collect())
        }
        Step::Not(anon) => {
            let built = anon.clone().build().expect("anonymous validated at traversal build");
            let mut out = Vec::new();
            for item in input {
                let res = run_anon(graph, &built, vec![item.clone()], opts, needs_path)?;
                if res.is_empty() {
                    out.push(item);
                }
            }
            Ok(out)
        }
        Step::And(a, b) => {
            let ba = a.clone().build().expect("anonymous validated at traversal build");
            let bb = b.clone().build().expect("anonymous validated at traversal build");
            let mut out = Vec::new();
            for item in input {
                let ra = run_anon(graph, &ba, vec![item.clone()], opts, needs_path)?;
                let rb = run_anon(graph, &bb, vec![item.clone()], opts, needs_path)?;
                if !ra.is_empty() && !rb.is_empty() {
                    out.push(item);
                }
            }
            Ok(out)
        }
        Step::Or(a, b) => {
            let ba = a.clone().build().expect("anonymous validated at traversal build");
            let bb = b.clone().build().expect("anonymous validated at traversal build");
            let mut out = Vec::new();
            for item in input {
                let ra = run_anon(graph, &ba, vec![item.clone()], opts, needs_path)?;
                let rb = run_anon(graph, &bb, vec![item.clone()], opts, needs_path)?;
                if !ra.is_empty() || !rb.is_empty() {
                    out.push(item);
                }
            }
            Ok(out)
        }
        Step::FilterAnon(anon) => {
            let built = anon.clone().build().expect("anonymous validated at traversal build");
            let mut out = Vec::new();
            for item in input {
                let res = run_anon(graph, &built, vec![item.clone()], opts, needs_path)?;
                if !res.is_empty() {
                    out.push(item);
                }
            }
            Ok(out)
        }

        Step::IdStep => map_ok(input, |item, core| match item.as_element().and_then(|t| t.node_id()) {
            Some(id) => Ok(Some(Item::Value(Value::new(AttrValue::Int(id as i64), core)))),
            None => Err(TraversalError::NotAnElement),
        }),
        Step::ValueStep => map_ok(input, |item, core| match item {
            Item::Property(p) => Ok(Some(Item::Value(Value::new(p.value.clone(), core)))),
            _ => Err(TraversalError::TypeMismatch { step: "value", expected: "Property" }),
        }),
        Step::KeyStep => map_ok(input, |item, core| match item {
            Item::Property(p) => Ok(Some(Item::Value(Value::new(AttrValue::String(p.key.clone()), core)))),
            _ => Err(TraversalError::TypeMismatch { step: "key", expected: "Property" }),
        }),
        Step::Values(keys) => {
            let mut out = Vec::new();
            for item in &input {
                let core = item.core().clone();
                let data = element_attrs(graph, item)?;
                let selected: Vec<&String> = if keys.is_empty() { data.keys().collect() } else { keys.iter().collect() };
                for k in selected {
                    if let Some(v) = data.get(k) {
                        out.push(Item::Value(Value::new(v.clone(), core.clone())));
                    }
                }
            }
            Ok(out)
        }
        Step::Properties(keys) => {
            let mut out = Vec::new();
            for item in &input {
                let core = item.core().clone();
                let data = element_attrs(graph, item)?;
                let selected: Vec<&String> = if keys.is_empty() { data.keys().collect() } else { keys.iter().collect() };
                for k in selected {
                    if let Some(v) = data.get(k) {
                        out.push(Item::Property(Property::new(k.clone(), v.clone(), core.clone())));
                    }
                }
            }
            Ok(out)
        }
        Step::Name => map_ok(input, |item, core| {
            Ok(element_name(graph, item).map(|n| Item::Value(Value::new(AttrValue::String(n), core))))
        }),
        Step::Label => map_ok(input, |item, core| {
            Ok(element_label(graph, item).map(|l| Item::Value(Value::new(AttrValue::String(l), core))))
        }),
        Step::Select { keys, by } => select_step(graph, keys, by, input),
        Step::Order { by, order } => order_step(graph, input, by.as_ref(), *order),
        Step::Count(scope) => count_step(input, *scope),
        Step::Min => aggregate_step(input, |vals| vals.into_iter().fold(f64::INFINITY, f64::min)),
        Step::Max => aggregate_step(input, |vals| vals.into_iter().fold(f64::NEG_INFINITY, f64::max)),
        Step::Sum => aggregate_step(input, |vals| vals.into_iter().sum()),
        Step::Mean => aggregate_step(input, |vals| {
            let n = vals.len().max(1) as f64;
            vals.into_iter().sum::<f64>() / n
        }),
        Step::PathStep(by) => path_step(graph, input, by.as_ref()),
        Step::ElementMap(keys) => element_map_step(graph, input, keys),
        Step::Fold { seed, f } => {
            let core = input.first().map(|i| i.core().clone()).unwrap_or_default();
            let mut acc = seed.clone();
            for item in &input {
                if let Some(v) = item.value_view() {
                    acc = f(acc, &v);
                }
            }
            Ok(vec![Item::Value(Value::new(acc, core))])
        }

        Step::Repeat { body, times, until, emit } => repeat_step(graph, input, body, *times, until, emit, opts, needs_path),
        Step::Branch { selector, options } => branch_step(graph, input, selector, options, opts, needs_path),
        Step::Union(anons) => union_step(graph, input, anons, opts, needs_path),
        Step::Local(anon) => {
            let built = anon.clone().build().expect("anonymous validated at traversal build");
            let mut out = Vec::new();
            for item in input {
                out.extend(run_anon(graph, &built, vec![item], opts, needs_path)?);
            }
            Ok(out)
        }

        Step::SideEffect(anon) => {
            let built = anon.clone().build().expect("anonymous validated at traversal build");
            for item in &input {
                run_anon(graph, &built, vec![item.clone()], opts, needs_path)?;
            }
            Ok(input)
        }
        Step::Property { cardinality, key, value } => {
            for item in &input {
                write_property(graph, item, *cardinality, key, value)?;
            }
            Ok(input)
        }

        Step::As(label) => {
            let mut out = Vec::with_capacity(input.len());
            for mut item in input {
                let snapshot = item.clone();
                item.core_mut().save_cache.insert(label.clone(), snapshot);
                out.push(item);
            }
            Ok(out)
        }

        Step::UntilPlaceholder(_) | Step::EmitPlaceholder(_) => {
            unreachable!("leftover placeholders are rejected at build time")
        }

        Step::ToList { by, include_data } => project_terminal(graph, input, by.as_ref(), *include_data),
        Step::AsPath(by) => path_step(graph, input, by.as_ref()),
        Step::HasNext => Ok(vec![value_item(AttrValue::Bool(!input.is_empty()))]),
        Step::Next(n) => Ok(input.into_iter().take(*n).collect()),
        Step::Iter(by) => project_terminal(graph, input, by.as_ref(), false),
        Step::Iterate => Ok(Vec::new()),
        Step::Io { backend, mode, payload } => json_io::run(graph, *backend, *mode, payload.as_deref()),
    }
}

/// The `json-io` feature's bundled codec for `IoBackend::Json`.
///
/// `write()` exports the current graph as a flat vertex/edge list (the
/// shape the retrieval pack's `GraphSON` writer uses); `read()` ingests an
/// arbitrary JSON payload as a tree of labeled nodes, mirroring
/// `mogwai.io.JSON.read`'s behavior of turning nested objects/arrays into
/// `default_node_label`-labeled nodes joined by `default_edge_label` edges.
/// Every other `IoBackend` has no bundled codec and always fails with
/// `UnsupportedBackend` (format adapters beyond JSON are out of scope).
mod json_io {
    use crate::enums::IoBackend;
    use crate::error::TraversalError;
    use crate::graph::Graph;
    use crate::traversal::traverser::Item;

    use super::{value_item, R};

    pub fn run(graph: &mut Graph, backend: IoBackend, mode: Option<bool>, payload: Option<&str>) -> R<Vec<Item>> {
        match backend {
            IoBackend::Json => match mode {
                Some(true) => Ok(vec![value_item(super::AttrValue::String(export(graph)?))]),
                Some(false) => {
                    if let Some(text) = payload {
                        import(graph, text)?;
                    }
                    Ok(Vec::new())
                }
                None => unreachable!("IO mode is validated before execution"),
            },
            other => Err(TraversalError::UnsupportedBackend(other)),
        }
    }

    #[cfg(feature = "json-io")]
    fn export(graph: &Graph) -> R<String> {
        use std::collections::BTreeMap;

        use serde::Serialize;

        use crate::model::{AttrValue, NodeId};

        #[derive(Serialize)]
        struct NodeDto<'a> {
            id: NodeId,
            label: &'a str,
            name: &'a str,
            attrs: &'a BTreeMap<String, AttrValue>,
        }
        #[derive(Serialize)]
        struct EdgeDto<'a> {
            source: NodeId,
            target: NodeId,
            label: &'a str,
            attrs: &'a BTreeMap<String, AttrValue>,
        }
        #[derive(Serialize)]
        struct GraphDto<'a> {
            vertices: Vec<NodeDto<'a>>,
            edges: Vec<EdgeDto<'a>>,
        }

        let dto = GraphDto {
            vertices: graph
                .nodes()
                .map(|n| NodeDto { id: n.id, label: &n.label, name: &n.name, attrs: &n.attrs })
                .collect(),
            edges: graph
                .edges()
                .map(|e| EdgeDto { source: e.source, target: e.target, label: &e.label, attrs: &e.attrs })
                .collect(),
        };
        serde_json::to_string(&dto).map_err(|e| TraversalError::IoCodec(e.to_string()))
    }

    #[cfg(not(feature = "json-io"))]
    fn export(_graph: &Graph) -> R<String> {
        Err(TraversalError::UnsupportedBackend(IoBackend::Json))
    }

    #[cfg(feature = "json-io")]
    fn import(graph: &mut Graph, text: &str) -> R<()> {
        use std::collections::BTreeMap;

        use crate::model::AttrValue;

        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| TraversalError::IoCodec(e.to_string()))?;
        let default_label = graph.config().default_node_label.clone();
        let default_edge_label = graph.config().default_edge_label.clone();
        let root = graph.add_node(default_label.clone(), "root", BTreeMap::new(), None)?;
        add_subnodes(graph, root, &value, &default_label, &default_edge_label)
    }

    #[cfg(not(feature = "json-io"))]
    fn import(_graph: &mut Graph, _text: &str) -> R<()> {
        Err(TraversalError::UnsupportedBackend(IoBackend::Json))
    }

    #[cfg(feature = "json-io")]
    fn add_subnodes(
        graph: &mut Graph,
        root_id: crate::model::NodeId,
        data: &serde_json::Value,
        default_label: &str,
        default_edge_label: &str,
    ) -> R<()> {
        use std::collections::BTreeMap;

        use crate::model::AttrValue;

        match data {
            serde_json::Value::Object(map) => {
                for (key, v) in map {
                    match v {
                        serde_json::Value::Object(_) => {
                            let id = graph.add_node(default_label.to_string(), key.clone(), BTreeMap::new(), None)?;
                            graph.add_edge(root_id, id, default_edge_label.to_string(), BTreeMap::new())?;
                            add_subnodes(graph, id, v, default_label, default_edge_label)?;
                        }
                        serde_json::Value::Array(items) => {
                            let mut attrs = BTreeMap::new();
                            attrs.insert("type".to_string(), AttrValue::String("list".into()));
                            attrs.insert("length".to_string(), AttrValue::Int(items.len() as i64));
                            let id = graph.add_node(default_label.to_string(), key.clone(), attrs, None)?;
                            graph.add_edge(root_id, id, default_edge_label.to_string(), BTreeMap::new())?;
                            add_subnodes(graph, id, v, default_label, default_edge_label)?;
                        }
                        scalar => {
                            let mut attrs = BTreeMap::new();
                            attrs.insert("value".to_string(), json_scalar_to_attr(scalar));
                            graph.add_node(default_label.to_string(), key.clone(), attrs, None)?;
                        }
                    }
                }
                Ok(())
            }
            serde_json::Value::Array(items) => {
                for (i, v) in items.iter().enumerate() {
                    let item_name = format!("item_{i}");
                    match v {
                        serde_json::Value::Object(_) => {
                            let id = graph.add_node("list_item", item_name, BTreeMap::new(), None)?;
                            graph.add_edge(root_id, id, "has_item", BTreeMap::new())?;
                            add_subnodes(graph, id, v, default_label, default_edge_label)?;
                        }
                        serde_json::Value::Array(_) => {
                            let id = graph.add_node(default_label.to_string(), item_name, BTreeMap::new(), None)?;
                            graph.add_edge(root_id, id, "has_item", BTreeMap::new())?;
                            add_subnodes(graph, id, v, default_label, default_edge_label)?;
                        }
                        scalar => {
                            let mut attrs = BTreeMap::new();
                            attrs.insert("value".to_string(), json_scalar_to_attr(scalar));
                            graph.add_node(default_label.to_string(), item_name, attrs, None)?;
                        }
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    #[cfg(feature = "json-io")]
    fn json_scalar_to_attr(v: &serde_json::Value) -> crate::model::AttrValue {
        use crate::model::AttrValue;
        match v {
            serde_json::Value::Bool(b) => AttrValue::Bool(*b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(AttrValue::Int)
                .unwrap_or_else(|| AttrValue::Float(n.as_f64().unwrap_or(0.0))),
            serde_json::Value::String(s) => AttrValue::String(s.clone()),
            serde_json::Value::Null => AttrValue::String("null".to_string()),
            other => AttrValue::String(other.to_string()),
        }
    }
}

fn value_item(v: AttrValue) -> Item {
    Item::Value(Value::new(v, Core::default()))
}

fn start_v(graph: &Graph, ids: &[crate::model::NodeId], needs_path: bool) -> R<Vec<Item>> {
    if ids.is_empty() {
        let mut out: Vec<_> = graph.nodes().map(|n| n.id).collect();
        out.sort_unstable();
        Ok(out.into_iter().map(|id| Item::Element(Traverser::start(Position::Node(id), needs_path))).collect())
    } else {
        ids.iter()
            .map(|&id| {
                if graph.has_node(id) {
                    Ok(Item::Element(Traverser::start(Position::Node(id), needs_path)))
                } else {
                    Err(TraversalError::MissingStartId(id.to_string()))
                }
            })
            .collect()
    }
}

fn start_e(graph: &Graph, pairs: &[crate::model::EdgePair], needs_path: bool) -> R<Vec<Item>> {
    if pairs.is_empty() {
        Ok(graph
            .edges()
            .map(|e| Item::Element(Traverser::start(Position::Edge(e.pair()), needs_path)))
            .collect())
    } else {
        pairs
            .iter()
            .map(|&pair| {
                if graph.has_edge(pair.0, pair.1) {
                    Ok(Item::Element(Traverser::start(Position::Edge(pair), needs_path)))
                } else {
                    Err(TraversalError::MissingStartId(format!("{:?}", pair)))
                }
            })
            .collect()
    }
}

fn nav_flat(
    graph: &Graph,
    input: Vec<Item>,
    step: &'static str,
    f: impl Fn(&Graph, crate::model::NodeId) -> Vec<crate::model::NodeId>,
) -> R<Vec<Item>> {
    let mut out = Vec::new();
    for item in input {
        let t = item.as_element().ok_or(TraversalError::NotAnElement)?;
        let id = t.node_id().ok_or(TraversalError::TypeMismatch { step, expected: "node" })?;
        for next in f(graph, id) {
            out.push(Item::Element(t.move_to(Position::Node(next))));
        }
    }
    Ok(out)
}

fn nav_edges(
    graph: &Graph,
    input: Vec<Item>,
    step: &'static str,
    f: impl Fn(&Graph, crate::model::NodeId) -> Vec<crate::model::EdgePair>,
) -> R<Vec<Item>> {
    let mut out = Vec::new();
    for item in input {
        let t = item.as_element().ok_or(TraversalError::NotAnElement)?;
        let id = t.node_id().ok_or(TraversalError::TypeMismatch { step, expected: "node" })?;
        for pair in f(graph, id) {
            out.push(Item::Element(t.move_to(Position::Edge(pair))));
        }
    }
    Ok(out)
}

fn nav_endpoint(input: Vec<Item>, step: &'static str, pick: impl Fn(crate::model::EdgePair) -> crate::model::NodeId) -> R<Vec<Item>> {
    let mut out = Vec::with_capacity(input.len());
    for item in input {
        let t = item.as_element().ok_or(TraversalError::NotAnElement)?;
        let pair = t.edge_pair().ok_or(TraversalError::TypeMismatch { step, expected: "edge" })?;
        out.push(Item::Element(t.move_to(Position::Node(pick(pair)))));
    }
    Ok(out)
}

fn nav_both_endpoints(input: Vec<Item>) -> R<Vec<Item>> {
    let mut out = Vec::new();
    for item in input {
        let t = item.as_element().ok_or(TraversalError::NotAnElement)?;
        let (src, dst) = t.edge_pair().ok_or(TraversalError::TypeMismatch { step: "bothV", expected: "edge" })?;
        out.push(Item::Element(t.move_to(Position::Node(src))));
        out.push(Item::Element(t.move_to(Position::Node(dst))));
    }
    Ok(out)
}

fn filter_ok(input: Vec<Item>, pred: impl Fn(&Item) -> bool) -> R<Vec<Item>> {
    Ok(input.into_iter().filter(pred).collect())
}

fn map_ok(input: Vec<Item>, f: impl Fn(&Item, Core) -> R<Option<Item>>) -> R<Vec<Item>> {
    let mut out = Vec::with_capacity(input.len());
    for item in input {
        let core = item.core().clone();
        if let Some(mapped) = f(&item, core)? {
            out.push(mapped);
        }
    }
    Ok(out)
}

fn element_label(graph: &Graph, item: &Item) -> Option<String> {
    let t = item.as_element()?;
    match t.position() {
        Position::Node(id) => graph.node(id).map(|n| n.label.clone()),
        Position::Edge((src, dst)) => graph.edges_between(src, dst, None).first().map(|e| e.label.clone()),
    }
}

fn element_name(graph: &Graph, item: &Item) -> Option<String> {
    let t = item.as_element()?;
    match t.position() {
        Position::Node(id) => graph.node(id).map(|n| n.name.clone()),
        Position::Edge((src, dst)) => graph
            .edges_between(src, dst, None)
            .first()
            .and_then(|e| e.attrs.get("name"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
    }
}

fn element_attrs(graph: &Graph, item: &Item) -> R<BTreeMap<String, AttrValue>> {
    let t = item.as_element().ok_or(TraversalError::NotAnElement)?;
    match t.position() {
        Position::Node(id) => {
            let node = graph.node(id).ok_or(TraversalError::Graph(GraphError::NoSuchElement("node", id)))?;
            let mut m = node.attrs.clone();
            m.insert("label".to_string(), AttrValue::String(node.label.clone()));
            m.insert("name".to_string(), AttrValue::String(node.name.clone()));
            Ok(m)
        }
        Position::Edge((src, dst)) => {
            let edge = graph
                .edges_between(src, dst, None)
                .first()
                .copied()
                .ok_or(TraversalError::Graph(GraphError::NoSuchElement("edge", src)))?;
            let mut m = edge.attrs.clone();
            m.insert("label".to_string(), AttrValue::String(edge.label.clone()));
            Ok(m)
        }
    }
}

fn attr_lookup(graph: &Graph, item: &Item, key: &str) -> Option<AttrValue> {
    match key {
        "label" => element_label(graph, item).map(AttrValue::String),
        "name" => element_name(graph, item).map(AttrValue::String),
        _ => element_attrs(graph, item).ok().and_then(|m| m.get(key).cloned()),
    }
}

fn has_test(graph: &Graph, item: &Item, key: &str, pred: Option<&P>) -> bool {
    match attr_lookup(graph, item, key) {
        Some(v) => pred.is_none_or(|p| p.test(&v)),
        None => false,
    }
}

fn position_key(pos: Position) -> String {
    match pos {
        Position::Node(id) => format!("n{id}"),
        Position::Edge((s, d)) => format!("e{s}-{d}"),
    }
}

fn dedup_key(item: &Item) -> String {
    match item {
        Item::Element(t) => position_key(t.position()),
        Item::Value(v) => v.value.index_key(),
        Item::Property(p) => format!("{}={}", p.key, p.value.index_key()),
    }
}

/// Like [`dedup_key`], but projects the item through `by` first when given
/// (component design §4.3 "Dedup": "duplicate detection may apply a
/// by-indexer").
fn dedup_key_with_by(graph: &Graph, item: &Item, by: Option<&By>) -> String {
    match by {
        None => dedup_key(item),
        Some(_) => apply_select_by(graph, by, item).index_key(),
    }
}

/// Resolves one `by` indexer (broadcast if `by.len() == 1`, else
/// positional) against the saved item at `key_index` (component design
/// §4.3 "Select": "the `by` count must be 1 or equal to the key count").
fn select_by_for(by: &[By], key_index: usize) -> Option<&By> {
    match by.len() {
        0 => None,
        1 => by.first(),
        _ => by.get(key_index),
    }
}

fn apply_select_by(graph: &Graph, by: Option<&By>, item: &Item) -> AttrValue {
    match by {
        None => item.value_view().unwrap_or(AttrValue::Bool(false)),
        Some(By::Key(k)) => attr_lookup(graph, item, k).unwrap_or(AttrValue::Bool(false)),
        Some(By::Path(path)) => {
            let mut cur = path.first().and_then(|k| attr_lookup(graph, item, k));
            for k in path.iter().skip(1) {
                cur = match cur {
                    Some(AttrValue::Map(m)) => m.get(k).cloned(),
                    _ => None,
                };
            }
            cur.unwrap_or(AttrValue::Bool(false))
        }
        Some(By::Anon(_)) | Some(By::OrderTag(_)) => item.value_view().unwrap_or(AttrValue::Bool(false)),
    }
}

fn select_step(graph: &Graph, keys: &[String], by: &[By], input: Vec<Item>) -> R<Vec<Item>> {
    let mut out = Vec::with_capacity(input.len());
    for item in input {
        let core = item.core().clone();
        if keys.len() == 1 {
            let saved = core.save_cache.get(&keys[0]).ok_or_else(|| TraversalError::MissingSavedLabel(keys[0].clone()))?;
            match select_by_for(by, 0) {
                None => out.push(saved.clone()),
                Some(b) => out.push(Item::Value(Value::new(apply_select_by(graph, Some(b), saved), core))),
            }
        } else {
            let mut map = BTreeMap::new();
            for (i, k) in keys.iter().enumerate() {
                let saved = core.save_cache.get(k).ok_or_else(|| TraversalError::MissingSavedLabel(k.clone()))?;
                let projected = apply_select_by(graph, select_by_for(by, i), saved);
                map.insert(k.clone(), projected);
            }
            out.push(Item::Value(Value::new(AttrValue::Map(map), core)));
        }
    }
    Ok(out)
}

fn order_step(graph: &Graph, input: Vec<Item>, by: Option<&By>, order: Order) -> R<Vec<Item>> {
    let keys: Vec<AttrValue> = input
        .iter()
        .map(|item| match by {
            Some(By::Key(k)) => attr_lookup(graph, item, k).unwrap_or(AttrValue::Bool(false)),
            Some(By::Path(path)) => {
                let mut cur = path.first().and_then(|k| attr_lookup(graph, item, k));
                for k in path.iter().skip(1) {
                    cur = match cur {
                        Some(AttrValue::Map(m)) => m.get(k).cloned(),
                        _ => None,
                    };
                }
                cur.unwrap_or(AttrValue::Bool(false))
            }
            _ => item.value_view().unwrap_or(AttrValue::Bool(false)),
        })
        .collect();

    let mut err = None;
    let mut indices: Vec<usize> = (0..input.len()).collect();
    indices.sort_by(|&a, &b| match keys[a].partial_cmp_value(&keys[b]) {
        Some(ord) => {
            if order == Order::Desc {
                ord.reverse()
            } else {
                ord
            }
        }
        None => {
            err = Some(TraversalError::NotComparable);
            std::cmp::Ordering::Equal
        }
    });
    if let Some(e) = err {
        return Err(e);
    }
    let mut slots: Vec<Option<Item>> = input.into_iter().map(Some).collect();
    Ok(indices.into_iter().map(|i| slots[i].take().expect("each index visited once")).collect())
}

fn count_step(input: Vec<Item>, scope: Scope) -> R<Vec<Item>> {
    match scope {
        Scope::Global => Ok(vec![value_item(AttrValue::Int(input.len() as i64))]),
        Scope::Local => {
            let mut out = Vec::with_capacity(input.len());
            for item in input {
                let core = item.core().clone();
                let n = match item.value_view() {
                    Some(v) => v.container_len() as i64,
                    None => 1,
                };
                out.push(Item::Value(Value::new(AttrValue::Int(n), core)));
            }
            Ok(out)
        }
    }
}

fn aggregate_step(input: Vec<Item>, reduce: impl Fn(Vec<f64>) -> f64) -> R<Vec<Item>> {
    let mut nums = Vec::with_capacity(input.len());
    for item in &input {
        let v = item.value_view().ok_or(TraversalError::NotNumeric)?;
        nums.push(v.as_f64().ok_or(TraversalError::NotNumeric)?);
    }
    if nums.is_empty() {
        return Ok(Vec::new());
    }
    Ok(vec![value_item(AttrValue::Float(reduce(nums)))])
}

/// Renders one visited position, either as its bare id/pair (no `by`) or
/// indexed through `by` the same way `order`/`select` index a full
/// element (component design §4.3 "path(by?)").
fn project_position(graph: &Graph, pos: Position, by: Option<&By>) -> AttrValue {
    let bare = || match pos {
        Position::Node(id) => AttrValue::Int(id as i64),
        Position::Edge((s, d)) => AttrValue::List(vec![AttrValue::Int(s as i64), AttrValue::Int(d as i64)]),
    };
    match by {
        None => bare(),
        Some(By::Key(k)) => {
            let tmp = Item::Element(Traverser::start(pos, false));
            attr_lookup(graph, &tmp, k).unwrap_or(AttrValue::Bool(false))
        }
        Some(By::Path(path)) => {
            let tmp = Item::Element(Traverser::start(pos, false));
            let mut cur = path.first().and_then(|k| attr_lookup(graph, &tmp, k));
            for k in path.iter().skip(1) {
                cur = match cur {
                    Some(AttrValue::Map(m)) => m.get(k).cloned(),
                    _ => None,
                };
            }
            cur.unwrap_or(AttrValue::Bool(false))
        }
        Some(By::Anon(_)) | Some(By::OrderTag(_)) => bare(),
    }
}

fn path_step(graph: &Graph, input: Vec<Item>, by: Option<&By>) -> R<Vec<Item>> {
    let mut out = Vec::with_capacity(input.len());
    for item in input {
        let core = item.core().clone();
        let path = core.path.clone().unwrap_or_default();
        let rendered: Vec<AttrValue> = path.iter().map(|p| project_position(graph, *p, by)).collect();
        out.push(Item::Value(Value::new(AttrValue::List(rendered), core)));
    }
    Ok(out)
}

fn element_map_step(graph: &Graph, input: Vec<Item>, keys: &[String]) -> R<Vec<Item>> {
    let mut out = Vec::with_capacity(input.len());
    for item in input {
        let core = item.core().clone();
        let data = element_attrs(graph, &item)?;
        let selected = if keys.is_empty() {
            data
        } else {
            data.into_iter().filter(|(k, _)| keys.contains(k)).collect()
        };
        out.push(Item::Value(Value::new(AttrValue::Map(selected), core)));
    }
    Ok(out)
}

fn write_property(graph: &mut Graph, item: &Item, cardinality: Cardinality, key: &str, value: &AttrValue) -> R<()> {
    let t = item.as_element().ok_or(TraversalError::NotAnElement)?;
    match t.position() {
        Position::Node(id) => {
            let node = graph.node_mut(id).ok_or(TraversalError::Graph(GraphError::NoSuchElement("node", id)))?;
            apply_cardinality(&mut node.attrs, cardinality, key, value);
        }
        Position::Edge((src, dst)) => {
            let edge = graph
                .edge_mut(src, dst, None)
                .ok_or(TraversalError::Graph(GraphError::NoSuchElement("edge", src)))?;
            apply_cardinality(&mut edge.attrs, cardinality, key, value);
        }
    }
    Ok(())
}

fn apply_cardinality(attrs: &mut BTreeMap<String, AttrValue>, cardinality: Cardinality, key: &str, value: &AttrValue) {
    match cardinality {
        Cardinality::Single | Cardinality::Label => {
            attrs.insert(key.to_string(), value.clone());
        }
        Cardinality::List => {
            let entry = attrs.entry(key.to_string()).or_insert_with(|| AttrValue::List(Vec::new()));
            if let AttrValue::List(items) = entry {
                items.push(value.clone());
            } else {
                *entry = AttrValue::List(vec![value.clone()]);
            }
        }
        Cardinality::Set => {
            let entry = attrs.entry(key.to_string()).or_insert_with(|| AttrValue::Set(Vec::new()));
            if let AttrValue::Set(items) = entry {
                if !items.contains(value) {
                    items.push(value.clone());
                }
            } else {
                *entry = AttrValue::Set(vec![value.clone()]);
            }
        }
        Cardinality::Map => {
            let entry = attrs.entry(key.to_string()).or_insert_with(|| AttrValue::Map(BTreeMap::new()));
            if let AttrValue::Map(m) = entry {
                m.insert(value.index_key(), value.clone());
            }
        }
    }
}

fn repeat_step(
    graph: &mut Graph,
    input: Vec<Item>,
    body: &crate::traversal::anonymous::AnonymousTraversal,
    times: Option<usize>,
    until: &Option<(Box<crate::traversal::anonymous::AnonymousTraversal>, RepeatMode)>,
    emit: &Option<EmitMode>,
    opts: &TraversalOptions,
    needs_path: bool,
) -> R<Vec<Item>> {
    let built_body = body.clone().build().expect("anonymous validated at traversal build");
    let built_until = match until {
        Some((u, mode)) => Some((u.clone().build().expect("anonymous validated at traversal build"), *mode)),
        None => None,
    };
    let built_emit = match emit {
        Some(EmitMode::Anon(a)) => Some(a.clone().build().expect("anonymous validated at traversal build")),
        _ => None,
    };

    let mut result = Vec::new();
    let mut active = input;

    if let Some(n) = times {
        for _ in 0..n {
            active = run_anon(graph, &built_body, active, opts, needs_path)?;
            if emit.is_some() {
                collect_emitted(&mut result, &active, built_emit.as_ref(), graph, opts, needs_path)?;
            }
        }
        if emit.is_some() {
            return Ok(result);
        }
        return Ok(active);
    }

    let Some((until_built, mode)) = built_until.as_ref() else {
        return run_anon(graph, &built_body, active, opts, needs_path);
    };

    let mut depth = 0;
    loop {
        if depth >= opts.max_iteration_depth {
            return Err(TraversalError::MaxIterationDepthExceeded(opts.max_iteration_depth));
        }
        match mode {
            RepeatMode::UntilDo => {
                let (satisfied, unsatisfied) = partition_by_until(graph, &active, until_built, opts, needs_path)?;
                result.extend(satisfied);
                if unsatisfied.is_empty() {
                    break;
                }
                if emit.is_some() {
                    collect_emitted(&mut result, &unsatisfied, built_emit.as_ref(), graph, opts, needs_path)?;
                }
                active = run_anon(graph, &built_body, unsatisfied, opts, needs_path)?;
            }
            RepeatMode::DoUntil => {
                active = run_anon(graph, &built_body, active, opts, needs_path)?;
                if emit.is_some() {
                    collect_emitted(&mut result, &active, built_emit.as_ref(), graph, opts, needs_path)?;
                }
                let (satisfied, unsatisfied) = partition_by_until(graph, &active, until_built, opts, needs_path)?;
                result.extend(satisfied);
                if unsatisfied.is_empty() {
                    break;
                }
                active = unsatisfied;
            }
        }
        depth += 1;
    }
    Ok(result)
}

fn partition_by_until(
    graph: &mut Graph,
    active: &[Item],
    until_built: &BuiltAnonymous,
    opts: &TraversalOptions,
    needs_path: bool,
) -> R<(Vec<Item>, Vec<Item>)> {
    let mut satisfied = Vec::new();
    let mut unsatisfied = Vec::new();
    for item in active {
        let res = run_anon(graph, until_built, vec![item.clone()], opts, needs_path)?;
        if res.is_empty() {
            unsatisfied.push(item.clone());
        } else {
            satisfied.push(item.clone());
        }
    }
    Ok((satisfied, unsatisfied))
}

fn collect_emitted(
    result: &mut Vec<Item>,
    active: &[Item],
    built_emit: Option<&BuiltAnonymous>,
    graph: &mut Graph,
    opts: &TraversalOptions,
    needs_path: bool,
) -> R<()> {
    match built_emit {
        None => result.extend(active.iter().cloned()),
        Some(anon) => {
            for item in active {
                let res = run_anon(graph, anon, vec![item.clone()], opts, needs_path)?;
                if !res.is_empty() {
                    result.push(item.clone());
                }
            }
        }
    }
    Ok(())
}

fn branch_step(
    graph: &mut Graph,
    input: Vec<Item>,
    selector: &crate::traversal::anonymous::AnonymousTraversal,
    options: &[(Option<AttrValue>, Box<crate::traversal::anonymous::AnonymousTraversal>)],
    opts: &TraversalOptions,
    needs_path: bool,
) -> R<Vec<Item>> {
    let built_selector = selector.clone().build().expect("anonymous validated at traversal build");
    let built_options: Vec<(Option<AttrValue>, BuiltAnonymous)> = options
        .iter()
        .map(|(k, a)| (k.clone(), a.clone().build().expect("anonymous validated at traversal build")))
        .collect();

    let mut out = Vec::new();
    for item in input {
        let selected = run_anon(graph, &built_selector, vec![item.clone()], opts, needs_path)?;
        let Some(key_item) = selected.into_iter().next() else {
            continue;
        };
        let key = key_item.value_view();
        let matched = built_options.iter().find(|(k, _)| k.as_ref() == key.as_ref());
        let chosen = matched.or_else(|| built_options.iter().find(|(k, _)| k.is_none()));
        if let Some((_, anon)) = chosen {
            out.extend(run_anon(graph, anon, vec![item], opts, needs_path)?);
        }
    }
    Ok(out)
}

fn union_step(
    graph: &mut Graph,
    input: Vec<Item>,
    anons: &[Box<crate::traversal::anonymous::AnonymousTraversal>],
    opts: &TraversalOptions,
    needs_path: bool,
) -> R<Vec<Item>> {
    let built: Vec<BuiltAnonymous> = anons
        .iter()
        .map(|a| a.clone().build().expect("anonymous validated at traversal build"))
        .collect();
    let mut out = Vec::new();
    for item in input {
        for anon in &built {
            out.extend(run_anon(graph, anon, vec![item.clone()], opts, needs_path)?);
        }
    }
    Ok(out)
}

fn project_terminal(graph: &Graph, input: Vec<Item>, by: Option<&By>, include_data: bool) -> R<Vec<Item>> {
    let mut out = Vec::with_capacity(input.len());
    for item in input {
        let core = item.core().clone();
        let projected = match (&item, by) {
            (_, Some(By::Key(k))) => attr_lookup(graph, &item, k).unwrap_or(AttrValue::Bool(false)),
            (Item::Element(t), None) if include_data => AttrValue::Map(element_attrs(graph, &item)?),
            (Item::Element(t), None) => match t.position() {
                Position::Node(id) => AttrValue::Int(id as i64),
                Position::Edge((s, d)) => AttrValue::List(vec![AttrValue::Int(s as i64), AttrValue::Int(d as i64)]),
            },
            (Item::Value(v), _) => v.value.clone(),
            (Item::Property(p), _) => {
                let mut m = BTreeMap::new();
                m.insert(p.key.clone(), p.value.clone());
                AttrValue::Map(m)
            }
        };
        out.push(Item::Value(Value::new(projected, core)));
    }
    Ok(out)
}
