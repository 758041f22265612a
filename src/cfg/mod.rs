// Graph model: one vertex per instruction, typed control-flow edges

pub mod analysis;
pub mod builder;
pub mod edge;
pub mod export;
pub mod minimize;
pub mod reachability;

pub use analysis::{find_entries, find_exits, is_direct_successor, later_instructions, previous_instructions};
pub use builder::{validate, CfgBuilder};
pub use edge::{classify_successors, EdgeKind};
pub use export::{export_dot, export_json, CfgExport};
pub use minimize::minimize;
pub use reachability::{find_reachable, find_unreachable, is_reachable_from_entry};

use crate::bytecode::{InsnIndex, MethodKey, MutationId};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Control flow graph of one method (directed multigraph)
pub type Cfg = DiGraph<Vertex, EdgeKind>;

/// Globally unique decision identifier, allocated by the registry
pub type BranchId = u32;

/// Vertex identifier; equal to the instruction index
pub type VertexId = InsnIndex;

/// Vertex classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VertexKind {
    Ordinary,
    /// Two-way conditional jump
    Branch,
    /// Multi-way switch with at least one case
    Switch,
    /// Non-decision instruction carrying at least one mutation
    MutantCarrier,
}

/// One instruction of a method body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub id: VertexId,
    pub line_number: Option<u32>,
    pub kind: VertexKind,
    /// Present iff the vertex is a branch or switch. For switches this is
    /// the id of the first case.
    pub branch_id: Option<BranchId>,
    /// Switch cases as (key, decision id), in declaration order
    pub case_branch_ids: Vec<(i32, BranchId)>,
    pub mutation_ids: BTreeSet<MutationId>,
    /// Shortest-path distance from this vertex to each mutation; absent if
    /// the mutation is unreachable from here
    pub distance_to_mutation: BTreeMap<MutationId, u32>,
    /// Mnemonic of the underlying instruction
    pub label: String,
}

impl Vertex {
    pub fn new(id: VertexId, label: impl Into<String>) -> Self {
        Self {
            id,
            line_number: None,
            kind: VertexKind::Ordinary,
            branch_id: None,
            case_branch_ids: Vec::new(),
            mutation_ids: BTreeSet::new(),
            distance_to_mutation: BTreeMap::new(),
            label: label.into(),
        }
    }

    pub fn is_branch(&self) -> bool {
        self.kind == VertexKind::Branch
    }

    pub fn is_switch(&self) -> bool {
        self.kind == VertexKind::Switch
    }

    pub fn is_decision(&self) -> bool {
        self.is_branch() || self.is_switch()
    }

    pub fn is_mutation(&self) -> bool {
        !self.mutation_ids.is_empty()
    }

    pub fn has_mutation(&self, id: MutationId) -> bool {
        self.mutation_ids.contains(&id)
    }

    /// Every decision id reported from this vertex
    pub fn decision_ids(&self) -> Vec<BranchId> {
        if self.is_switch() {
            self.case_branch_ids.iter().map(|&(_, id)| id).collect()
        } else {
            self.branch_id.into_iter().collect()
        }
    }

    pub fn distance_to(&self, mutation: MutationId) -> Option<u32> {
        self.distance_to_mutation.get(&mutation).copied()
    }
}

/// A built graph whose static distances have not been computed yet
#[derive(Debug, Clone)]
pub struct ControlFlowGraph {
    key: MethodKey,
    graph: Cfg,
}

impl ControlFlowGraph {
    pub(crate) fn new(key: MethodKey, graph: Cfg) -> Self {
        Self { key, graph }
    }

    pub fn key(&self) -> &MethodKey {
        &self.key
    }

    pub fn graph(&self) -> &Cfg {
        &self.graph
    }

    pub(crate) fn into_parts(self) -> (MethodKey, Cfg) {
        (self.key, self.graph)
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
}
