//! Reachability analysis for CFGs
//!
//! The builder keeps dead code in the graph; these helpers only report it.

use crate::cfg::analysis::find_entry;
use crate::cfg::{Cfg, VertexId};
use petgraph::algo::has_path_connecting;
use petgraph::graph::NodeIndex;
use petgraph::visit::Dfs;
use std::collections::HashSet;

/// Find all vertices reachable from the method entry
///
/// For empty CFGs, returns an empty vec.
pub fn find_reachable(cfg: &Cfg) -> Vec<NodeIndex> {
    let entry = match find_entry(cfg) {
        Some(e) => e,
        None => return vec![],
    };

    let mut dfs = Dfs::new(cfg, entry);
    let mut reachable = Vec::new();
    while let Some(node) = dfs.next(cfg) {
        reachable.push(node);
    }
    reachable
}

/// Find all vertices unreachable from the method entry
///
/// Exception handlers are reachable through their exception edges, so
/// what remains is genuinely dead code.
pub fn find_unreachable(cfg: &Cfg) -> Vec<NodeIndex> {
    if find_entry(cfg).is_none() {
        return vec![];
    }

    let reachable: HashSet<_> = find_reachable(cfg).into_iter().collect();
    cfg.node_indices()
        .filter(|n| !reachable.contains(n))
        .collect()
}

/// Check if a specific vertex is reachable from the method entry
pub fn is_reachable_from_entry(cfg: &Cfg, vertex: NodeIndex) -> bool {
    let entry = match find_entry(cfg) {
        Some(e) => e,
        None => return false,
    };
    if vertex.index() >= cfg.node_count() {
        return false;
    }

    has_path_connecting(cfg, entry, vertex, None)
}

/// Unreachable vertex ids for reporting
pub fn unreachable_vertex_ids(cfg: &Cfg) -> Vec<VertexId> {
    find_unreachable(cfg)
        .iter()
        .filter_map(|&idx| cfg.node_weight(idx))
        .map(|v| v.id)
        .collect()
}
