//! Splicing probes into the instruction sequence
//!
//! Every original instruction `i` moves to `start[i] + probes_before(i)`.
//! Jumps, switch targets and exception ranges are remapped to `start[i]`,
//! the first probe op in front of `i`, so control reaching a decision always
//! executes its probe first.

use super::{ProbeEdit, ProbeOp};
use crate::bytecode::{ExceptionRange, InsnIndex, Instruction, MethodBody, Opcode};
use serde::Serialize;

/// One element of the rewritten code
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Emitted {
    /// Inserted probe operation, without a line number
    Probe(ProbeOp),
    /// Original instruction (targets remapped), with its original position
    Original {
        origin: InsnIndex,
        instruction: Instruction,
    },
}

/// Method body after splicing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RewrittenMethod {
    pub code: Vec<Emitted>,
    pub exception_ranges: Vec<ExceptionRange>,
    pub max_stack: u16,
    /// New position of the first item emitted for each original instruction
    pub starts: Vec<InsnIndex>,
}

impl RewrittenMethod {
    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// New position of original instruction `origin` itself (after its probes)
    pub fn position_of(&self, origin: InsnIndex) -> Option<InsnIndex> {
        self.code.iter().position(
            |item| matches!(item, Emitted::Original { origin: o, .. } if *o == origin),
        )
    }
}

pub(crate) fn rewrite(body: &MethodBody, edits: &[ProbeEdit], max_stack: u16) -> RewrittenMethod {
    let len = body.len();
    let mut probe_ops: Vec<Vec<ProbeOp>> = vec![Vec::new(); len];
    for edit in edits {
        if let Some(ops) = probe_ops.get_mut(edit.before) {
            ops.extend(edit.probe.ops.iter().copied());
        }
    }

    let mut starts = Vec::with_capacity(len + 1);
    let mut next = 0;
    for ops in &probe_ops {
        starts.push(next);
        next += ops.len() + 1;
    }
    // One past the end, for exclusive range ends
    starts.push(next);

    let remap = |target: InsnIndex| starts.get(target).copied().unwrap_or(next);

    let mut code = Vec::with_capacity(next);
    for (origin, (insn, ops)) in body.instructions.iter().zip(probe_ops).enumerate() {
        code.extend(ops.into_iter().map(Emitted::Probe));
        let mut instruction = insn.clone();
        remap_targets(&mut instruction.opcode, &remap);
        code.push(Emitted::Original {
            origin,
            instruction,
        });
    }

    let exception_ranges = body
        .exception_ranges
        .iter()
        .map(|r| ExceptionRange {
            start: remap(r.start),
            end: remap(r.end),
            handler: remap(r.handler),
        })
        .collect();

    starts.truncate(len);
    RewrittenMethod {
        code,
        exception_ranges,
        max_stack,
        starts,
    }
}

fn remap_targets(opcode: &mut Opcode, remap: &impl Fn(InsnIndex) -> InsnIndex) {
    match opcode {
        Opcode::Goto { target } | Opcode::If { target, .. } => *target = remap(*target),
        Opcode::TableSwitch {
            targets, default, ..
        }
        | Opcode::LookupSwitch {
            targets, default, ..
        } => {
            for t in targets.iter_mut() {
                *t = remap(*t);
            }
            *default = remap(*default);
        }
        Opcode::Simple { .. } | Opcode::Return { .. } | Opcode::Throw => {}
    }
}
