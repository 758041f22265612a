//! CFG construction from a resolved instruction stream
//!
//! One linear pass creates a vertex per instruction; a second pass adds
//! fall-through, jump, switch and exception edges once every vertex (and so
//! every forward target) exists. Decision vertices receive their ids from
//! the registry in instruction order. Dead code is modeled like any other
//! code: reachability is not this builder's concern.

use crate::bytecode::{analyze_frames, MethodBody, Opcode, Operand};
use crate::cfg::edge::classify_successors;
use crate::cfg::{Cfg, ControlFlowGraph, EdgeKind, Vertex, VertexKind};
use crate::error::CfgError;
use crate::registry::Registry;
use petgraph::graph::NodeIndex;
use tracing::{debug, warn};

/// Builds control flow graphs, drawing decision ids from a registry
pub struct CfgBuilder<'r> {
    registry: &'r Registry,
}

impl<'r> CfgBuilder<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Build the graph of `body`
    ///
    /// Malformed bodies (dangling targets, bad switches or exception ranges)
    /// are rejected before anything is registered. A body whose stack shape
    /// cannot be determined yields `CfgError::Unanalyzable`.
    pub fn build(&self, body: &MethodBody) -> Result<ControlFlowGraph, CfgError> {
        validate(body)?;

        let key = body.key();
        analyze_frames(body).map_err(|source| {
            warn!(method = %key, error = %source, "flow analysis failed, method left without graph");
            CfgError::Unanalyzable {
                method: key.to_string(),
                source,
            }
        })?;

        let mut graph = Cfg::with_capacity(body.len(), body.len() + body.len() / 2);

        // Pass 1: vertices, in instruction order
        for (at, insn) in body.instructions.iter().enumerate() {
            let mut vertex = Vertex::new(at, insn.opcode.mnemonic());
            vertex.line_number = insn.line;

            match &insn.opcode {
                Opcode::If { .. } => {
                    vertex.kind = VertexKind::Branch;
                    vertex.branch_id = Some(self.registry.decision_id(&key, at, None));
                }
                op @ (Opcode::TableSwitch { .. } | Opcode::LookupSwitch { .. }) => {
                    let cases = op.switch_cases().unwrap_or_default();
                    if !cases.is_empty() {
                        vertex.kind = VertexKind::Switch;
                        for (case_key, _) in cases {
                            let id = self.registry.decision_id(&key, at, Some(case_key));
                            vertex.case_branch_ids.push((case_key, id));
                        }
                        vertex.branch_id = vertex.case_branch_ids.first().map(|&(_, id)| id);
                    }
                }
                _ => {}
            }

            if let Some(id) = vertex.branch_id {
                debug!(method = %key, vertex = at, branch_id = id, kind = ?vertex.kind, "decision discovered");
            }

            let idx = graph.add_node(vertex);
            debug_assert_eq!(idx.index(), at);
        }

        for site in &body.mutations {
            let vertex = &mut graph[NodeIndex::new(site.instruction)];
            vertex.mutation_ids.insert(site.mutation_id);
            if vertex.kind == VertexKind::Ordinary {
                vertex.kind = VertexKind::MutantCarrier;
            }
        }

        // Pass 2: edges, now that every target vertex exists
        for (at, insn) in body.instructions.iter().enumerate() {
            let from = NodeIndex::new(at);
            for (target, kind) in classify_successors(at, &insn.opcode) {
                if target < body.len() {
                    graph.add_edge(from, NodeIndex::new(target), kind);
                }
            }
        }

        for range in &body.exception_ranges {
            let handler = NodeIndex::new(range.handler);
            for at in range.start..range.end {
                graph.add_edge(NodeIndex::new(at), handler, EdgeKind::Exception);
            }
        }

        debug!(
            method = %key,
            vertices = graph.node_count(),
            edges = graph.edge_count(),
            "control flow graph built"
        );

        Ok(ControlFlowGraph::new(key, graph))
    }
}

/// Reject bodies that violate the input contract
///
/// Touches no registry state, so a class can be checked in full before any
/// of its methods is registered.
pub fn validate(body: &MethodBody) -> Result<(), CfgError> {
    let len = body.len();

    for (at, insn) in body.instructions.iter().enumerate() {
        match &insn.opcode {
            Opcode::LookupSwitch { keys, targets, .. } if keys.len() != targets.len() => {
                return Err(CfgError::MalformedSwitch {
                    at,
                    keys: keys.len(),
                    targets: targets.len(),
                });
            }
            Opcode::If {
                condition,
                operand: Operand::Ref | Operand::RefPair,
                ..
            } if !condition.is_equality() => {
                return Err(CfgError::MalformedCondition {
                    at,
                    condition: condition.to_string(),
                });
            }
            _ => {}
        }

        if let Some(&target) = insn.opcode.explicit_targets().iter().find(|&&t| t >= len) {
            return Err(CfgError::DanglingTarget {
                from: at,
                target,
                len,
            });
        }
    }

    for range in &body.exception_ranges {
        if range.start >= range.end || range.end > len || range.handler >= len {
            return Err(CfgError::MalformedExceptionRange {
                start: range.start,
                end: range.end,
                handler: range.handler,
            });
        }
    }

    for site in &body.mutations {
        if site.instruction >= len {
            return Err(CfgError::DanglingMutation {
                mutation_id: site.mutation_id,
                at: site.instruction,
            });
        }
    }

    Ok(())
}
