//! Layering engine: ranks, ordering, positions, and edge materialization
//!
//! Turns the module index and call graph into a renderer-agnostic node/edge
//! set. Every pass recomputes from scratch and returns a fresh value; module
//! counts are small enough that incremental diffing is not worth its
//! complexity.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::callgraph::CallGraph;
use crate::model::Module;

/// Horizontal distance between consecutive ranks.
pub const COLUMN_WIDTH: f64 = 320.0;
/// Width of a module box.
pub const MODULE_WIDTH: f64 = 240.0;
/// Vertical space reserved for the module title row.
pub const HEADER_HEIGHT: f64 = 32.0;
/// Height of one verb/secret/config row.
pub const ITEM_HEIGHT: f64 = 24.0;
/// Vertical spacing between rows.
pub const ITEM_SPACING: f64 = 6.0;
/// Horizontal inset of rows inside the module box.
pub const ITEM_INSET: f64 = 12.0;
/// Bottom padding of the module box.
pub const BOX_PADDING: f64 = 12.0;
/// Vertical gap between stacked module boxes.
pub const MODULE_GAP: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutNodeKind {
    Module,
    Verb,
    Secret,
    Config,
}

/// A positioned element of the topology diagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutNode {
    /// Module name, or `"{module}.{item}"` for child nodes.
    pub id: String,
    pub kind: LayoutNodeKind,
    pub name: String,
    /// Parent module name for child nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    /// Topological depth; module nodes only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A verb-to-verb call edge between positioned nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutEdge {
    /// `"{callerId}-{calleeId}"`; unique within one pass.
    pub id: String,
    pub source: String,
    pub target: String,
}

/// Output of one layout pass. Plain serializable value with no behavior.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub nodes: Vec<LayoutNode>,
    pub edges: Vec<LayoutEdge>,
}

struct Frame<'a> {
    name: &'a str,
    next: usize,
    best: u32,
}

/// Longest chain of distinct modules that transitively call into `module`.
///
/// Depth-first over the inverse adjacency with an explicit frame stack, so
/// rank computation never leans on call-stack depth. A caller already on the
/// current path contributes a chain of length one, which terminates cycles;
/// modules inside a cycle can therefore receive an under-counted rank. That
/// approximation is deliberate — downstream bucketing depends on it.
fn rank_of(module: &str, graph: &CallGraph) -> u32 {
    let mut on_path: HashSet<&str> = HashSet::new();
    on_path.insert(module);
    let mut stack = vec![Frame {
        name: module,
        next: 0,
        best: 0,
    }];

    while let Some(frame) = stack.last_mut() {
        let callers = graph.callers_of(frame.name);

        if frame.next < callers.len() {
            let caller = callers[frame.next].as_str();
            frame.next += 1;
            if on_path.contains(caller) {
                frame.best = frame.best.max(1);
            } else {
                on_path.insert(caller);
                stack.push(Frame {
                    name: caller,
                    next: 0,
                    best: 0,
                });
            }
            continue;
        }

        let done = match stack.pop() {
            Some(frame) => frame,
            None => break,
        };
        on_path.remove(done.name);
        match stack.last_mut() {
            Some(parent) => parent.best = parent.best.max(1 + done.best),
            None => return done.best,
        }
    }

    0
}

/// Flatten rank buckets into one display order.
///
/// Bucket 0 is alphabetical. Each higher-ranked module is inserted right
/// after its anchor — the first of its callers already present — and after
/// any modules previously anchored to that caller, keeping a caller's
/// dependents grouped. Modules whose callers are all absent (possible inside
/// cycles) fall back to the end of the list.
fn flatten<'a>(ranks: &[(&'a str, u32)], graph: &'a CallGraph) -> Vec<&'a str> {
    let mut buckets: BTreeMap<u32, Vec<&str>> = BTreeMap::new();
    for (name, rank) in ranks.iter().copied() {
        buckets.entry(rank).or_default().push(name);
    }
    for bucket in buckets.values_mut() {
        bucket.sort_unstable();
    }

    let mut flat: Vec<&str> = buckets.remove(&0).unwrap_or_default();
    let mut anchor_of: HashMap<&str, &str> = HashMap::new();

    for bucket in buckets.into_values() {
        for name in bucket {
            let anchor = graph.callers_of(name).iter().find_map(|caller| {
                flat.iter()
                    .position(|f| *f == caller.as_str())
                    .map(|idx| (caller.as_str(), idx))
            });
            match anchor {
                Some((anchor_name, idx)) => {
                    let mut pos = idx + 1;
                    while pos < flat.len() && anchor_of.get(flat[pos]) == Some(&anchor_name) {
                        pos += 1;
                    }
                    flat.insert(pos, name);
                    anchor_of.insert(name, anchor_name);
                }
                None => flat.push(name),
            }
        }
    }

    flat
}

fn child_node(
    parent: &Module,
    kind: LayoutNodeKind,
    item: &str,
    row: usize,
    x: f64,
    y: f64,
) -> LayoutNode {
    LayoutNode {
        id: format!("{}.{}", parent.name, item),
        kind,
        name: item.to_string(),
        module: Some(parent.name.clone()),
        rank: None,
        x: x + ITEM_INSET,
        y: y + HEADER_HEIGHT + row as f64 * (ITEM_HEIGHT + ITEM_SPACING),
        width: MODULE_WIDTH - 2.0 * ITEM_INSET,
        height: ITEM_HEIGHT,
    }
}

/// Lay out the module topology.
///
/// Never fails: call targets that reference modules absent from `modules`
/// simply produce no node and no edge until a later snapshot includes them.
pub fn layout(modules: &[Module], graph: &CallGraph) -> Layout {
    let ranks: Vec<(&str, u32)> = modules
        .iter()
        .map(|m| (m.name.as_str(), rank_of(&m.name, graph)))
        .collect();
    let rank_by_name: HashMap<&str, u32> = ranks.iter().copied().collect();
    let by_name: HashMap<&str, &Module> = modules.iter().map(|m| (m.name.as_str(), m)).collect();

    let order = flatten(&ranks, graph);

    let mut nodes = Vec::new();
    let mut cursor = 0.0_f64;

    for name in &order {
        let module = by_name[name];
        let rank = rank_by_name[name];

        let child_count = module.secrets.len() + module.configs.len() + module.verbs.len();
        let height =
            HEADER_HEIGHT + child_count as f64 * (ITEM_HEIGHT + ITEM_SPACING) + BOX_PADDING;
        let x = f64::from(rank) * COLUMN_WIDTH;
        let y = cursor;

        nodes.push(LayoutNode {
            id: module.name.clone(),
            kind: LayoutNodeKind::Module,
            name: module.name.clone(),
            module: None,
            rank: Some(rank),
            x,
            y,
            width: MODULE_WIDTH,
            height,
        });

        // Rows stack in declaration order: secrets, then configs, then verbs.
        let mut row = 0usize;
        for secret in &module.secrets {
            nodes.push(child_node(module, LayoutNodeKind::Secret, &secret.name, row, x, y));
            row += 1;
        }
        for config in &module.configs {
            nodes.push(child_node(module, LayoutNodeKind::Config, &config.name, row, x, y));
            row += 1;
        }
        for verb in &module.verbs {
            nodes.push(child_node(module, LayoutNodeKind::Verb, &verb.verb.name, row, x, y));
            row += 1;
        }

        cursor += height + MODULE_GAP;
    }

    // Edges materialize only once every node exists. A callee module that has
    // not been reported yet produces no edge; a later pass naturally includes
    // it once its snapshot arrives.
    let mut edges = Vec::new();
    let mut edge_ids: HashSet<String> = HashSet::new();
    for name in &order {
        let module = by_name[name];
        for record in &module.verbs {
            let source = format!("{}.{}", module.name, record.verb.name);
            for target in record.verb.calls() {
                if target.module.is_empty() || !by_name.contains_key(target.module.as_str()) {
                    continue;
                }
                let target_id = format!("{}.{}", target.module, target.name);
                let id = format!("{source}-{target_id}");
                if edge_ids.insert(id.clone()) {
                    edges.push(LayoutEdge {
                        id,
                        source: source.clone(),
                        target: target_id,
                    });
                }
            }
        }
    }

    Layout { nodes, edges }
}
