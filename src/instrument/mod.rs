//! Probe injector
//!
//! Produces an insert-before edit list for a method: one probe per two-way
//! decision, one per switch case. The original instructions, exception
//! ranges and line numbers are not touched; [`InstrumentedMethod::rewrite`]
//! merges probes and code when a caller needs the spliced sequence.

pub mod probe;
pub mod rewrite;

pub use probe::{EntryPoint, Probe, ProbeOp};
pub use rewrite::{Emitted, RewrittenMethod};

use crate::bytecode::{analyze_frames, InsnIndex, MethodBody, MethodKey, Opcode};
use crate::cfg::VertexId;
use crate::distance::MethodGraph;
use crate::error::InstrumentError;
use crate::registry::Registry;
use serde::Serialize;
use tracing::{debug, warn};

/// Insert `probe` immediately before instruction `before`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeEdit {
    pub before: InsnIndex,
    pub probe: Probe,
}

/// Result of instrumenting one method
#[derive(Debug, Clone, Serialize)]
pub struct InstrumentedMethod {
    pub key: MethodKey,
    /// Edits ordered by position; probes for one switch follow case order
    pub edits: Vec<ProbeEdit>,
    /// Decision vertices left without a probe
    pub skipped: Vec<VertexId>,
    /// Declared stack depth required by the rewritten method
    pub max_stack: u16,
    #[serde(skip)]
    body: MethodBody,
}

impl InstrumentedMethod {
    pub fn body(&self) -> &MethodBody {
        &self.body
    }

    pub fn probe_count(&self) -> usize {
        self.edits.len()
    }

    /// Merge probes and original code into one sequence
    pub fn rewrite(&self) -> RewrittenMethod {
        rewrite::rewrite(&self.body, &self.edits, self.max_stack)
    }
}

/// Compute the probes for every decision of `body`
///
/// Fails if the registry already marks the method instrumented, if `graph`
/// was built from a different body, or if the body's stack shape cannot be
/// determined. Decisions no entry point accepts are skipped with a warning.
pub fn instrument(
    graph: &MethodGraph,
    body: &MethodBody,
    registry: &Registry,
) -> Result<InstrumentedMethod, InstrumentError> {
    let key = body.key();
    if registry.is_instrumented(&key) {
        return Err(InstrumentError::AlreadyInstrumented(key.to_string()));
    }
    if graph.key() != &key || graph.vertex_count() != body.len() {
        return Err(InstrumentError::GraphMismatch {
            graph: graph.key().to_string(),
            body: key.to_string(),
        });
    }

    let frames = analyze_frames(body)?;
    let mut edits = Vec::new();
    let mut skipped = Vec::new();
    let mut max_stack = body.max_stack.max(frames.max_depth);

    for vertex in graph.decision_vertices() {
        let at = vertex.id;
        let probes = match &body.instructions[at].opcode {
            Opcode::If {
                condition, operand, ..
            } => {
                let branch_id = vertex
                    .branch_id
                    .ok_or(InstrumentError::MissingBranchId(at))?;
                match Probe::branch(at, branch_id, *condition, *operand)? {
                    Some(probe) => vec![probe],
                    None => Vec::new(),
                }
            }
            Opcode::TableSwitch { .. } | Opcode::LookupSwitch { .. } => {
                if vertex.case_branch_ids.is_empty() {
                    return Err(InstrumentError::MissingBranchId(at));
                }
                vertex
                    .case_branch_ids
                    .iter()
                    .map(|&(key, id)| Probe::switch_case(at, id, key))
                    .collect::<Result<Vec<_>, _>>()?
            }
            _ => Vec::new(),
        };

        if probes.is_empty() {
            warn!(method = %key, vertex = at, opcode = %vertex.label, "unsupported decision left unprobed");
            skipped.push(at);
            continue;
        }

        // Dead code has no frame; it never runs, so it needs no stack
        if let Some(depth) = frames.depth_at(at) {
            let peak = probes.iter().map(Probe::peak_extra_depth).max().unwrap_or(0);
            max_stack = max_stack.max(depth.saturating_add(peak));
        }

        debug!(method = %key, vertex = at, probes = probes.len(), "decision probed");
        edits.extend(probes.into_iter().map(|probe| ProbeEdit { before: at, probe }));
    }

    if !registry.mark_instrumented(&key) {
        return Err(InstrumentError::AlreadyInstrumented(key.to_string()));
    }

    debug!(
        method = %key,
        probes = edits.len(),
        skipped = skipped.len(),
        max_stack,
        "method instrumented"
    );

    Ok(InstrumentedMethod {
        key,
        edits,
        skipped,
        max_stack,
        body: body.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{Condition, Instruction, Operand};
    use crate::cfg::CfgBuilder;

    fn build(body: &MethodBody, registry: &Registry) -> MethodGraph {
        MethodGraph::precompute(CfgBuilder::new(registry).build(body).unwrap())
    }

    fn two_way(operand: Operand) -> MethodBody {
        let mut ops = vec![Opcode::simple("iload_1", 0, 1)];
        if operand.pops() == 2 {
            ops.push(Opcode::simple("iload_2", 0, 1));
        }
        let target = ops.len() + 2;
        ops.push(Opcode::If {
            condition: Condition::Eq,
            operand,
            target,
        });
        ops.push(Opcode::simple("nop", 0, 0));
        ops.push(Opcode::Return { values: 0 });
        MethodBody::new(
            "T",
            "m",
            "(II)V",
            ops.into_iter().map(Instruction::new).collect(),
        )
        .with_max_stack(operand.pops())
    }

    #[test]
    fn test_int_pair_branch_probe_and_stack() {
        let registry = Registry::new();
        let body = two_way(Operand::IntPair);
        let graph = build(&body, &registry);
        let result = instrument(&graph, &body, &registry).unwrap();

        assert_eq!(result.edits.len(), 1);
        assert_eq!(result.edits[0].before, 2);
        assert_eq!(result.edits[0].probe.entry, EntryPoint::BranchIntPair);
        // two operands on the stack plus five probe values
        assert_eq!(result.max_stack, 7);
        assert!(result.skipped.is_empty());
    }

    #[test]
    fn test_unary_int_probe_stack() {
        let registry = Registry::new();
        let body = two_way(Operand::Int);
        let graph = build(&body, &registry);
        let result = instrument(&graph, &body, &registry).unwrap();
        assert_eq!(result.edits[0].probe.entry, EntryPoint::BranchInt);
        assert_eq!(result.max_stack, 5);
    }

    #[test]
    fn test_switch_gets_one_probe_per_case() {
        let registry = Registry::new();
        let body = MethodBody::new(
            "T",
            "s",
            "(I)V",
            vec![
                Instruction::new(Opcode::simple("iload_1", 0, 1)),
                Instruction::new(Opcode::LookupSwitch {
                    keys: vec![1, 5, 9],
                    targets: vec![2, 3, 2],
                    default: 4,
                }),
                Instruction::new(Opcode::Return { values: 0 }),
                Instruction::new(Opcode::Return { values: 0 }),
                Instruction::new(Opcode::Return { values: 0 }),
            ],
        );
        let graph = build(&body, &registry);
        let result = instrument(&graph, &body, &registry).unwrap();
        let ids: Vec<_> = result.edits.iter().map(|e| e.probe.branch_id).collect();
        let keys: Vec<_> = result.edits.iter().map(|e| e.probe.case_key).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(keys, vec![Some(1), Some(5), Some(9)]);
        assert!(result.edits.iter().all(|e| e.before == 1));
        assert_eq!(result.max_stack, 6);
    }

    #[test]
    fn test_opaque_decision_is_skipped() {
        let registry = Registry::new();
        let body = two_way(Operand::Opaque { pops: 2 });
        let graph = build(&body, &registry);
        let result = instrument(&graph, &body, &registry).unwrap();
        assert!(result.edits.is_empty());
        assert_eq!(result.skipped, vec![2]);
        assert_eq!(result.max_stack, 2);
    }

    #[test]
    fn test_second_instrumentation_is_rejected() {
        let registry = Registry::new();
        let body = two_way(Operand::Int);
        let graph = build(&body, &registry);
        instrument(&graph, &body, &registry).unwrap();
        let err = instrument(&graph, &body, &registry).unwrap_err();
        assert!(matches!(err, InstrumentError::AlreadyInstrumented(_)));
    }

    #[test]
    fn test_graph_of_other_method_is_rejected() {
        let registry = Registry::new();
        let body = two_way(Operand::Int);
        let graph = build(&body, &registry);
        let mut other = body.clone();
        other.method_name = "other".to_string();
        let err = instrument(&graph, &other, &registry).unwrap_err();
        assert!(matches!(err, InstrumentError::GraphMismatch { .. }));
        assert!(!registry.is_instrumented(&other.key()));
    }

    #[test]
    fn test_original_body_is_untouched() {
        let registry = Registry::new();
        let body = two_way(Operand::Ref);
        let graph = build(&body, &registry);
        let result = instrument(&graph, &body, &registry).unwrap();
        assert_eq!(result.body(), &body);
        assert_eq!(result.probe_count(), 1);
    }
}
