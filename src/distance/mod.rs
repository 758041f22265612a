//! Distance engine
//!
//! `MethodGraph::precompute` consumes a built graph, computes its diameter
//! and annotates every vertex with its distance to every mutation. The
//! result is immutable and answers path queries from any number of threads.
//!
//! Queries never fail: anything that cannot be resolved falls back to the
//! diameter (control distance) or `f64::MAX` (branch distance).

pub mod bfs;
pub mod path;

pub use bfs::{bfs_distances, diameter, shortest_distance};
pub use path::{ParsePathError, Path, PathStep};

use crate::bytecode::{MethodKey, MutationId};
use crate::cfg::analysis::find_entries;
use crate::cfg::{BranchId, Cfg, ControlFlowGraph, Vertex, VertexId};
use petgraph::graph::NodeIndex;
use petgraph::Direction;
use std::collections::BTreeMap;
use tracing::{debug, trace, warn};

/// Branch distance reported when no path step resolves
pub const UNRESOLVED_BRANCH_DISTANCE: f64 = f64::MAX;

/// A method's graph with its static distances
#[derive(Debug, Clone)]
pub struct MethodGraph {
    key: MethodKey,
    graph: Cfg,
    diameter: u32,
    /// Mutation id -> vertex carrying it
    mutations: BTreeMap<MutationId, VertexId>,
    has_distances: bool,
}

impl MethodGraph {
    /// Compute the diameter and every vertex's distance to every mutation
    pub fn precompute(cfg: ControlFlowGraph) -> Self {
        let (key, mut graph) = cfg.into_parts();
        let diameter = bfs::diameter(&graph);
        let mutations = index_mutations(&graph);

        let carriers: Vec<NodeIndex> = graph
            .node_indices()
            .filter(|&idx| graph[idx].is_mutation())
            .collect();

        for carrier in carriers {
            // One reverse BFS gives the distance from every vertex to the carrier
            let to_carrier = bfs::bfs_distances(&graph, carrier, Direction::Incoming);
            let ids: Vec<MutationId> = graph[carrier].mutation_ids.iter().copied().collect();
            for (v, dist) in to_carrier.into_iter().enumerate() {
                let Some(dist) = dist else { continue };
                let vertex = &mut graph[NodeIndex::new(v)];
                for &id in &ids {
                    vertex
                        .distance_to_mutation
                        .entry(id)
                        .and_modify(|d| *d = (*d).min(dist))
                        .or_insert(dist);
                }
            }
            trace!(method = %key, carrier = carrier.index(), mutations = ?ids, "mutation distances annotated");
        }

        debug!(
            method = %key,
            vertices = graph.node_count(),
            mutations = mutations.len(),
            diameter,
            "distances precomputed"
        );

        Self {
            key,
            graph,
            diameter,
            mutations,
            has_distances: true,
        }
    }

    /// Freeze a graph without annotating mutation distances
    ///
    /// Mutation queries take their fallback. The diameter is still computed
    /// so that fallback stays the worst case.
    pub fn structural(cfg: ControlFlowGraph) -> Self {
        let (key, graph) = cfg.into_parts();
        let mutations = index_mutations(&graph);
        let diameter = bfs::diameter(&graph);
        Self {
            key,
            graph,
            diameter,
            mutations,
            has_distances: false,
        }
    }

    pub fn key(&self) -> &MethodKey {
        &self.key
    }

    pub fn graph(&self) -> &Cfg {
        &self.graph
    }

    pub fn diameter(&self) -> u32 {
        self.diameter
    }

    pub fn has_distances(&self) -> bool {
        self.has_distances
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.graph.node_weight(NodeIndex::new(id))
    }

    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.graph.node_weights()
    }

    pub fn decision_vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.graph.node_weights().filter(|v| v.is_decision())
    }

    pub fn is_branchless(&self) -> bool {
        self.decision_vertices().next().is_none()
    }

    /// Vertex reporting decision `branch_id` (a branch, or a switch case)
    pub fn vertex_for_branch(&self, branch_id: BranchId) -> Option<&Vertex> {
        self.decision_vertices()
            .find(|v| v.decision_ids().contains(&branch_id))
    }

    pub fn mutations(&self) -> impl Iterator<Item = MutationId> + '_ {
        self.mutations.keys().copied()
    }

    pub fn contains_mutation(&self, mutation: MutationId) -> bool {
        self.mutations.contains_key(&mutation)
    }

    pub fn mutation_vertex(&self, mutation: MutationId) -> Option<&Vertex> {
        self.mutations
            .get(&mutation)
            .and_then(|&id| self.vertex(id))
    }

    /// Shortest-path length from `from` to `to`, `None` if unreachable
    pub fn distance(&self, from: VertexId, to: VertexId) -> Option<u32> {
        bfs::shortest_distance(&self.graph, NodeIndex::new(from), NodeIndex::new(to))
    }

    /// Fewest hops from any vertex on `path` to `mutation`
    ///
    /// Falls back to the diameter when the mutation is unknown or no step
    /// can reach it.
    pub fn control_distance_to_mutation(&self, path: &Path, mutation: MutationId) -> u32 {
        if !self.contains_mutation(mutation) {
            warn!(method = %self.key, mutation, "unknown mutation, using diameter");
            return self.diameter;
        }
        self.nearest_step(path, |v| v.distance_to(mutation))
            .map_or(self.diameter, |(dist, _)| dist)
    }

    /// Fewest hops from any vertex on `path` to vertex `target`
    ///
    /// Not pre-indexed: one reverse BFS from the target per query.
    pub fn control_distance_to_vertex(&self, path: &Path, target: VertexId) -> u32 {
        match self.distances_to(target) {
            Some(to_target) => self
                .nearest_step(path, |v| to_target[v.id])
                .map_or(self.diameter, |(dist, _)| dist),
            None => {
                warn!(method = %self.key, vertex = target, "unknown vertex, using diameter");
                self.diameter
            }
        }
    }

    /// Local distance recorded at the step structurally nearest `mutation`
    ///
    /// Ties on structural distance go to the earliest step in the path.
    pub fn branch_distance_to_mutation(&self, path: &Path, mutation: MutationId) -> f64 {
        if !self.contains_mutation(mutation) {
            warn!(method = %self.key, mutation, "unknown mutation, no branch distance");
            return UNRESOLVED_BRANCH_DISTANCE;
        }
        self.nearest_step(path, |v| v.distance_to(mutation))
            .map_or(UNRESOLVED_BRANCH_DISTANCE, |(_, step)| step.local_distance)
    }

    /// Local distance recorded at the step structurally nearest vertex `target`
    pub fn branch_distance_to_vertex(&self, path: &Path, target: VertexId) -> f64 {
        match self.distances_to(target) {
            Some(to_target) => self
                .nearest_step(path, |v| to_target[v.id])
                .map_or(UNRESOLVED_BRANCH_DISTANCE, |(_, step)| step.local_distance),
            None => UNRESOLVED_BRANCH_DISTANCE,
        }
    }

    /// Shortest distance from any entry vertex to `target`, capped at the
    /// diameter
    pub fn initial_distance(&self, target: VertexId) -> u32 {
        let Some(to_target) = self.distances_to(target) else {
            return self.diameter;
        };
        find_entries(&self.graph)
            .into_iter()
            .filter_map(|entry| to_target[entry.index()])
            .fold(self.diameter, u32::min)
    }

    fn distances_to(&self, target: VertexId) -> Option<Vec<Option<u32>>> {
        if target >= self.graph.node_count() {
            return None;
        }
        Some(bfs::bfs_distances(
            &self.graph,
            NodeIndex::new(target),
            Direction::Incoming,
        ))
    }

    /// First step minimizing `dist_of`, with its distance
    fn nearest_step<'p>(
        &self,
        path: &'p Path,
        dist_of: impl Fn(&Vertex) -> Option<u32>,
    ) -> Option<(u32, &'p PathStep)> {
        let mut best: Option<(u32, &PathStep)> = None;
        for step in path {
            let Some(vertex) = self.vertex(step.position) else {
                debug!(method = %self.key, position = step.position, "path step outside graph");
                continue;
            };
            if let Some(dist) = dist_of(vertex) {
                if best.map_or(true, |(b, _)| dist < b) {
                    best = Some((dist, step));
                }
            }
        }
        best
    }
}

fn index_mutations(graph: &Cfg) -> BTreeMap<MutationId, VertexId> {
    let mut mutations = BTreeMap::new();
    for vertex in graph.node_weights() {
        for &id in &vertex.mutation_ids {
            mutations.entry(id).or_insert(vertex.id);
        }
    }
    mutations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{Condition, Instruction, MethodBody, Opcode, Operand};
    use crate::cfg::CfgBuilder;
    use crate::registry::Registry;

    /// 0 iload; 1 ifeq 5; 2 iinc (mutant 10); 3 nop; 4 goto 6; 5 nop; 6 return;
    /// 7 nop (dead, mutant 20); 8 return
    fn sample() -> MethodGraph {
        let ops = vec![
            Opcode::simple("iload_1", 0, 1),
            Opcode::If {
                condition: Condition::Eq,
                operand: Operand::Int,
                target: 5,
            },
            Opcode::simple("iinc", 0, 0),
            Opcode::simple("nop", 0, 0),
            Opcode::Goto { target: 6 },
            Opcode::simple("nop", 0, 0),
            Opcode::Return { values: 0 },
            Opcode::simple("nop", 0, 0),
            Opcode::Return { values: 0 },
        ];
        let body = MethodBody::new(
            "T",
            "m",
            "(I)V",
            ops.into_iter().map(Instruction::new).collect(),
        )
        .with_mutation(2, 10)
        .with_mutation(7, 20);
        let registry = Registry::new();
        let cfg = CfgBuilder::new(&registry).build(&body).unwrap();
        MethodGraph::precompute(cfg)
    }

    #[test]
    fn test_precompute_annotates_distances() {
        let g = sample();
        assert_eq!(g.vertex(0).unwrap().distance_to(10), Some(2));
        assert_eq!(g.vertex(2).unwrap().distance_to(10), Some(0));
        assert_eq!(g.vertex(5).unwrap().distance_to(10), None);
        assert_eq!(g.vertex(7).unwrap().distance_to(20), Some(0));
        assert_eq!(g.vertex(0).unwrap().distance_to(20), None);
    }

    #[test]
    fn test_diameter_of_disconnected_graph() {
        // 0 -> 1 -> 2 -> 3 -> 4 is the longest shortest path
        assert_eq!(sample().diameter(), 4);
    }

    #[test]
    fn test_control_distance_takes_minimum() {
        let g = sample();
        let path: Path = vec![(0, 3.0), (1, 1.0)].into_iter().collect();
        assert_eq!(g.control_distance_to_mutation(&path, 10), 1);
        assert_eq!(g.branch_distance_to_mutation(&path, 10), 1.0);
    }

    #[test]
    fn test_unreachable_mutation_falls_back_to_diameter() {
        let g = sample();
        let path: Path = vec![(0, 0.0), (1, 0.0), (5, 0.0), (6, 0.0)].into_iter().collect();
        assert_eq!(g.control_distance_to_mutation(&path, 20), g.diameter());
        assert_eq!(g.branch_distance_to_mutation(&path, 20), f64::MAX);
        assert_eq!(g.control_distance_to_mutation(&path, 999), g.diameter());
    }

    #[test]
    fn test_unknown_steps_are_ignored() {
        let g = sample();
        let path: Path = vec![(100, 0.0), (1, 4.0)].into_iter().collect();
        assert_eq!(g.control_distance_to_mutation(&path, 10), 1);
        let lost: Path = vec![(100, 0.0)].into_iter().collect();
        assert_eq!(g.control_distance_to_mutation(&lost, 10), g.diameter());
    }

    #[test]
    fn test_ties_go_to_first_step() {
        let g = sample();
        // vertex 4 and vertex 5 are both one hop from vertex 6
        let path: Path = vec![(4, 7.0), (5, 2.0)].into_iter().collect();
        assert_eq!(g.control_distance_to_vertex(&path, 6), 1);
        assert_eq!(g.branch_distance_to_vertex(&path, 6), 7.0);
    }

    #[test]
    fn test_control_distance_to_vertex() {
        let g = sample();
        let path: Path = vec![(0, 0.0)].into_iter().collect();
        assert_eq!(g.control_distance_to_vertex(&path, 5), 2);
        assert_eq!(g.control_distance_to_vertex(&path, 42), g.diameter());
        assert_eq!(g.branch_distance_to_vertex(&path, 42), f64::MAX);
    }

    #[test]
    fn test_initial_distance() {
        let g = sample();
        assert_eq!(g.initial_distance(2), 2);
        // dead vertex 7 is its own entry
        assert_eq!(g.initial_distance(8), 1);
        assert_eq!(g.initial_distance(99), g.diameter());
    }

    #[test]
    fn test_lookups() {
        let g = sample();
        assert_eq!(g.mutations().collect::<Vec<_>>(), vec![10, 20]);
        assert_eq!(g.mutation_vertex(20).map(|v| v.id), Some(7));
        assert_eq!(g.vertex_for_branch(0).map(|v| v.id), Some(1));
        assert_eq!(g.distance(0, 6), Some(3));
        assert_eq!(g.distance(6, 0), None);
    }

    #[test]
    fn test_structural_graph_has_no_distances() {
        let registry = Registry::new();
        let body = MethodBody::new(
            "T",
            "n",
            "()V",
            vec![
                Instruction::new(Opcode::simple("nop", 0, 0)),
                Instruction::new(Opcode::Return { values: 0 }),
            ],
        )
        .with_mutation(0, 1);
        let g = MethodGraph::structural(CfgBuilder::new(&registry).build(&body).unwrap());
        assert!(!g.has_distances());
        assert_eq!(g.vertex(0).unwrap().distance_to(1), None);
        assert_eq!(g.diameter(), 1);
        let path: Path = vec![(0, 0.0)].into_iter().collect();
        assert_eq!(g.control_distance_to_mutation(&path, 1), g.diameter());
        assert_eq!(g.branch_distance_to_mutation(&path, 1), UNRESOLVED_BRANCH_DISTANCE);
    }

    #[test]
    fn test_structural_fallbacks_are_worst_case() {
        let registry = Registry::new();
        // 0 nop; 1 return; 2 nop (dead, mutant 5); 3 return
        let body = MethodBody::new(
            "T",
            "dead",
            "()V",
            vec![
                Instruction::new(Opcode::simple("nop", 0, 0)),
                Instruction::new(Opcode::Return { values: 0 }),
                Instruction::new(Opcode::simple("nop", 0, 0)),
                Instruction::new(Opcode::Return { values: 0 }),
            ],
        )
        .with_mutation(2, 5);
        let cfg = CfgBuilder::new(&registry).build(&body).unwrap();
        let structural = MethodGraph::structural(cfg.clone());
        let precomputed = MethodGraph::precompute(cfg);

        assert_eq!(structural.diameter(), precomputed.diameter());
        assert!(structural.diameter() > 0);
        let path: Path = vec![(0, 0.0), (1, 0.0)].into_iter().collect();
        assert_eq!(structural.control_distance_to_mutation(&path, 5), structural.diameter());
        assert_eq!(structural.control_distance_to_mutation(&path, 99), structural.diameter());
        assert_eq!(structural.control_distance_to_vertex(&path, 2), structural.diameter());
        // lazy vertex queries still resolve
        assert_eq!(structural.control_distance_to_vertex(&path, 1), 0);
    }
}
