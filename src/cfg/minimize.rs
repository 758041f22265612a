//! Minimal decision graph
//!
//! Keeps only the method entry, exits, decision vertices and mutant
//! carriers. Every kept vertex gets an edge to each kept vertex it reaches
//! through skipped vertices only; the edge is labeled with the kind of the
//! first hop. Node indices of the result no longer match instruction ids,
//! `Vertex::id` still does.

use crate::cfg::analysis::{find_entry, out_degree};
use crate::cfg::{Cfg, EdgeKind};
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use std::collections::{BTreeMap, HashSet, VecDeque};

/// Collapse `cfg` to its decision-relevant skeleton
pub fn minimize(cfg: &Cfg) -> Cfg {
    let entry = find_entry(cfg);
    let keep = |idx: NodeIndex| {
        let v = &cfg[idx];
        Some(idx) == entry || v.is_decision() || v.is_mutation() || out_degree(cfg, idx) == 0
    };

    let mut minimal = Cfg::default();
    let mut mapping: BTreeMap<NodeIndex, NodeIndex> = BTreeMap::new();
    for idx in cfg.node_indices().filter(|&idx| keep(idx)) {
        mapping.insert(idx, minimal.add_node(cfg[idx].clone()));
    }

    for (&from, &new_from) in &mapping {
        let mut added: HashSet<(NodeIndex, EdgeKind)> = HashSet::new();
        for first in cfg.edges(from) {
            let kind = *first.weight();

            // BFS through skipped vertices until kept ones are hit
            let mut seen: HashSet<NodeIndex> = HashSet::new();
            let mut queue = VecDeque::from([first.target()]);
            while let Some(current) = queue.pop_front() {
                if !seen.insert(current) {
                    continue;
                }
                if let Some(&new_to) = mapping.get(&current) {
                    if added.insert((new_to, kind)) {
                        minimal.add_edge(new_from, new_to, kind);
                    }
                    continue;
                }
                queue.extend(cfg.edges(current).map(|e| e.target()));
            }
        }
    }

    minimal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::{Vertex, VertexKind};
    use petgraph::graph::DiGraph;

    /// 0 -> 1 -> 2 (branch) -> {3 -> 4 (mutant) -> 5, 5}; 5 return
    fn create_test_cfg() -> Cfg {
        let mut g = DiGraph::new();
        let n: Vec<_> = (0..6)
            .map(|i| {
                let mut v = Vertex::new(i, "op");
                if i == 2 {
                    v.kind = VertexKind::Branch;
                    v.branch_id = Some(0);
                }
                if i == 4 {
                    v.kind = VertexKind::MutantCarrier;
                    v.mutation_ids.insert(1);
                }
                g.add_node(v)
            })
            .collect();
        g.add_edge(n[0], n[1], EdgeKind::Fallthrough);
        g.add_edge(n[1], n[2], EdgeKind::Fallthrough);
        g.add_edge(n[2], n[3], EdgeKind::BranchNotTaken);
        g.add_edge(n[2], n[5], EdgeKind::BranchTaken);
        g.add_edge(n[3], n[4], EdgeKind::Fallthrough);
        g.add_edge(n[4], n[5], EdgeKind::Fallthrough);
        g
    }

    #[test]
    fn test_minimize_keeps_relevant_vertices() {
        let minimal = minimize(&create_test_cfg());
        let ids: Vec<_> = minimal.node_weights().map(|v| v.id).collect();
        assert_eq!(ids, vec![0, 2, 4, 5]);
    }

    #[test]
    fn test_minimize_collapses_edges() {
        let minimal = minimize(&create_test_cfg());
        let edges: Vec<_> = minimal
            .edge_references()
            .map(|e| (minimal[e.source()].id, minimal[e.target()].id, *e.weight()))
            .collect();
        assert_eq!(edges.len(), 4);
        assert!(edges.contains(&(0, 2, EdgeKind::Fallthrough)));
        assert!(edges.contains(&(2, 4, EdgeKind::BranchNotTaken)));
        assert!(edges.contains(&(2, 5, EdgeKind::BranchTaken)));
        assert!(edges.contains(&(4, 5, EdgeKind::Fallthrough)));
    }

    #[test]
    fn test_minimize_empty_graph() {
        assert_eq!(minimize(&Cfg::new()).node_count(), 0);
    }
}
