//! Call graph extraction from verb metadata

use std::collections::{HashMap, HashSet};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

use crate::model::Module;

/// One directed verb-to-verb call, rolled up to modules for layering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallRef {
    pub caller_module: String,
    pub caller_verb: String,
    pub callee_module: String,
    pub callee_verb: String,
}

/// The extracted call graph: deduplicated verb edges, the raw call multiset,
/// and the inverse module adjacency the layering engine ranks against.
pub struct CallGraph {
    /// One edge per unique (caller module, caller verb, callee module,
    /// callee verb), in discovery order.
    pub edges: Vec<CallRef>,
    /// Every declared call, duplicates included, for consumers that want
    /// multiplicity.
    pub raw_calls: Vec<CallRef>,
    /// Callee module -> caller modules that reference it, discovery-ordered
    /// and unique. This order defines anchor lookup during layering.
    inbound: HashMap<String, Vec<String>>,
}

impl CallGraph {
    /// Modules that call into `module`, in discovery order.
    pub fn callers_of(&self, module: &str) -> &[String] {
        self.inbound.get(module).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Groups of modules that form call cycles (including self-calls).
    /// Diagnostics only — cycles are handled structurally by the layering
    /// engine and are never an error.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let mut indices: HashMap<&str, NodeIndex> = HashMap::new();
        let mut seen: HashSet<(&str, &str)> = HashSet::new();

        for edge in &self.edges {
            let pair = (edge.caller_module.as_str(), edge.callee_module.as_str());
            if !seen.insert(pair) {
                continue;
            }
            let caller = *indices
                .entry(pair.0)
                .or_insert_with(|| graph.add_node(pair.0));
            let callee = *indices
                .entry(pair.1)
                .or_insert_with(|| graph.add_node(pair.1));
            graph.add_edge(caller, callee, ());
        }

        tarjan_scc(&graph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1
                    || scc
                        .first()
                        .is_some_and(|&n| graph.find_edge(n, n).is_some())
            })
            .map(|scc| scc.into_iter().map(|n| graph[n].to_string()).collect())
            .collect()
    }
}

/// Scan every verb of every module for `calls` metadata and build the graph.
///
/// Targets with an empty callee module are skipped (ingress and cron verbs
/// declare no outbound module call). Duplicate 4-tuples collapse to one edge.
pub fn build_call_graph(modules: &[Module]) -> CallGraph {
    let mut edges = Vec::new();
    let mut raw_calls = Vec::new();
    let mut dedup: HashSet<CallRef> = HashSet::new();
    let mut inbound: HashMap<String, Vec<String>> = HashMap::new();

    for module in modules {
        for record in &module.verbs {
            for target in record.verb.calls() {
                if target.module.is_empty() {
                    continue;
                }
                let call = CallRef {
                    caller_module: module.name.clone(),
                    caller_verb: record.verb.name.clone(),
                    callee_module: target.module.clone(),
                    callee_verb: target.name.clone(),
                };
                raw_calls.push(call.clone());
                if dedup.insert(call.clone()) {
                    edges.push(call);
                }

                let callers = inbound.entry(target.module.clone()).or_default();
                if !callers.iter().any(|c| c == &module.name) {
                    callers.push(module.name.clone());
                }
            }
        }
    }

    CallGraph {
        edges,
        raw_calls,
        inbound,
    }
}
