//! CFG analysis: entry/exit detection and structural neighbourhood queries

use crate::cfg::{Cfg, VertexId};
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeSet, BinaryHeap};
use std::cmp::Reverse;

/// Find the entry node of a CFG
///
/// The entry is always the first instruction (id = 0).
/// Returns None if the CFG is empty.
pub fn find_entry(cfg: &Cfg) -> Option<NodeIndex> {
    cfg.node_indices().next()
}

/// Find every vertex execution can start from
///
/// These are the vertices without incoming edges; the method entry is
/// always included even when a loop jumps back to it. Dead code after an
/// unconditional transfer shows up here too.
pub fn find_entries(cfg: &Cfg) -> Vec<NodeIndex> {
    let entry = find_entry(cfg);
    cfg.node_indices()
        .filter(|&idx| Some(idx) == entry || in_degree(cfg, idx) == 0)
        .collect()
}

/// Find all exit nodes in a CFG
///
/// Exits are vertices without outgoing edges: returns, and throws that no
/// handler covers.
pub fn find_exits(cfg: &Cfg) -> Vec<NodeIndex> {
    cfg.node_indices()
        .filter(|&idx| out_degree(cfg, idx) == 0)
        .collect()
}

/// Count incoming edges to a node (parallel edges count separately)
pub fn in_degree(cfg: &Cfg, idx: NodeIndex) -> usize {
    cfg.edges_directed(idx, Direction::Incoming).count()
}

/// Count outgoing edges from a node (parallel edges count separately)
pub fn out_degree(cfg: &Cfg, idx: NodeIndex) -> usize {
    cfg.edges_directed(idx, Direction::Outgoing).count()
}

/// `to` directly follows `from` and can be entered from nowhere else
pub fn is_direct_successor(cfg: &Cfg, from: NodeIndex, to: NodeIndex) -> bool {
    cfg.find_edge(from, to).is_some()
        && cfg
            .edges_directed(to, Direction::Incoming)
            .all(|e| e.source() == from)
}

/// Instructions that may execute between method entry and `v`
///
/// Walks incoming edges towards lower ids only, so loop back edges are not
/// followed. The result includes `v`.
pub fn previous_instructions(cfg: &Cfg, v: VertexId) -> BTreeSet<VertexId> {
    let mut visited = BTreeSet::new();
    if v >= cfg.node_count() {
        return visited;
    }

    // Highest id first, so every vertex is expanded once
    let mut queue = BinaryHeap::from([v]);
    while let Some(current) = queue.pop() {
        if !visited.insert(current) {
            continue;
        }
        for edge in cfg.edges_directed(NodeIndex::new(current), Direction::Incoming) {
            let source = edge.source().index();
            if source < current {
                queue.push(source);
            }
        }
    }
    visited
}

/// Instructions that may execute after `v` until the method returns
///
/// Mirror image of [`previous_instructions`]: follows outgoing edges towards
/// equal or higher ids. The result includes `v`.
pub fn later_instructions(cfg: &Cfg, v: VertexId) -> BTreeSet<VertexId> {
    let mut visited = BTreeSet::new();
    if v >= cfg.node_count() {
        return visited;
    }

    let mut queue = BinaryHeap::from([Reverse(v)]);
    while let Some(Reverse(current)) = queue.pop() {
        if !visited.insert(current) {
            continue;
        }
        for edge in cfg.edges_directed(NodeIndex::new(current), Direction::Outgoing) {
            let target = edge.target().index();
            if target >= current {
                queue.push(Reverse(target));
            }
        }
    }
    visited
}
