//! Probe records and their stack-effect contract
//!
//! A probe copies the operand(s) a decision is about to consume, pushes
//! literal identifiers and invokes one trace entry point. Every probe has a
//! net stack effect of zero; only its peak extra depth matters for the
//! rewritten method's declared stack size.
//!
//! | decision          | ops                                        | peak |
//! |-------------------|--------------------------------------------|------|
//! | int vs zero       | `Dup, kind, branch, insn, BranchInt`       | +4   |
//! | null check        | `Dup, kind, branch, insn, BranchRef`       | +4   |
//! | int pair          | `Dup2, kind, branch, insn, BranchIntPair`  | +5   |
//! | reference pair    | `Dup2, kind, branch, insn, BranchRefPair`  | +5   |
//! | switch case       | `Dup, key, kind, case, insn, SwitchCase`   | +5   |

use crate::bytecode::{Condition, Operand};
use crate::cfg::{BranchId, VertexId};
use crate::error::InstrumentError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Statically invocable trace-reporting functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryPoint {
    /// `(value, kind, branch, insn)`
    BranchInt,
    /// `(left, right, kind, branch, insn)`
    BranchIntPair,
    /// `(reference, kind, branch, insn)`
    BranchRef,
    /// `(left, right, kind, branch, insn)`
    BranchRefPair,
    /// `(value, key, kind, branch, insn)`
    SwitchCase,
    /// `(mutation, infection distance)`; reported by mutation code, never
    /// emitted by the injector
    MutationTouched,
}

impl EntryPoint {
    /// Number of stack values the call consumes
    pub fn arity(self) -> u16 {
        match self {
            EntryPoint::BranchInt | EntryPoint::BranchRef => 4,
            EntryPoint::BranchIntPair | EntryPoint::BranchRefPair | EntryPoint::SwitchCase => 5,
            EntryPoint::MutationTouched => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EntryPoint::BranchInt => "report_branch_int",
            EntryPoint::BranchIntPair => "report_branch_int_pair",
            EntryPoint::BranchRef => "report_branch_ref",
            EntryPoint::BranchRefPair => "report_branch_ref_pair",
            EntryPoint::SwitchCase => "report_switch_case",
            EntryPoint::MutationTouched => "report_mutation_touched",
        }
    }
}

/// One inserted operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeOp {
    /// Duplicate the top value
    Dup,
    /// Duplicate the top two values
    Dup2,
    PushInt(i32),
    Invoke(EntryPoint),
}

impl ProbeOp {
    pub fn pops(self) -> u16 {
        match self {
            ProbeOp::Dup | ProbeOp::Dup2 | ProbeOp::PushInt(_) => 0,
            ProbeOp::Invoke(entry) => entry.arity(),
        }
    }

    pub fn pushes(self) -> u16 {
        match self {
            ProbeOp::Dup | ProbeOp::PushInt(_) => 1,
            ProbeOp::Dup2 => 2,
            ProbeOp::Invoke(_) => 0,
        }
    }
}

impl fmt::Display for ProbeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOp::Dup => f.write_str("dup"),
            ProbeOp::Dup2 => f.write_str("dup2"),
            ProbeOp::PushInt(v) => write!(f, "ldc {}", v),
            ProbeOp::Invoke(entry) => write!(f, "invokestatic {}", entry.name()),
        }
    }
}

/// Probe inserted before one decision instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Probe {
    pub vertex: VertexId,
    pub branch_id: BranchId,
    /// Case key for switch-case probes
    pub case_key: Option<i32>,
    pub entry: EntryPoint,
    pub ops: Vec<ProbeOp>,
}

impl Probe {
    /// Probe for a two-way conditional jump, `None` if no entry point
    /// accepts its operands
    pub fn branch(
        vertex: VertexId,
        branch_id: BranchId,
        condition: Condition,
        operand: Operand,
    ) -> Result<Option<Self>, InstrumentError> {
        let (copy, entry) = match operand {
            Operand::Int => (ProbeOp::Dup, EntryPoint::BranchInt),
            Operand::Ref => (ProbeOp::Dup, EntryPoint::BranchRef),
            Operand::IntPair => (ProbeOp::Dup2, EntryPoint::BranchIntPair),
            Operand::RefPair => (ProbeOp::Dup2, EntryPoint::BranchRefPair),
            Operand::Opaque { .. } => return Ok(None),
        };
        Ok(Some(Self {
            vertex,
            branch_id,
            case_key: None,
            entry,
            ops: vec![
                copy,
                ProbeOp::PushInt(condition.code()),
                ProbeOp::PushInt(literal(vertex, u64::from(branch_id))?),
                ProbeOp::PushInt(literal(vertex, vertex as u64)?),
                ProbeOp::Invoke(entry),
            ],
        }))
    }

    /// Probe for one case of a switch, scored as an equality test
    pub fn switch_case(
        vertex: VertexId,
        case_id: BranchId,
        key: i32,
    ) -> Result<Self, InstrumentError> {
        Ok(Self {
            vertex,
            branch_id: case_id,
            case_key: Some(key),
            entry: EntryPoint::SwitchCase,
            ops: vec![
                ProbeOp::Dup,
                ProbeOp::PushInt(key),
                ProbeOp::PushInt(Condition::Eq.code()),
                ProbeOp::PushInt(literal(vertex, u64::from(case_id))?),
                ProbeOp::PushInt(literal(vertex, vertex as u64)?),
                ProbeOp::Invoke(EntryPoint::SwitchCase),
            ],
        })
    }

    /// Largest number of values the probe keeps above the original stack
    pub fn peak_extra_depth(&self) -> u16 {
        let mut depth: i32 = 0;
        let mut peak: i32 = 0;
        for op in &self.ops {
            depth -= i32::from(op.pops());
            depth += i32::from(op.pushes());
            peak = peak.max(depth);
        }
        peak as u16
    }

    /// Net change of the stack depth; zero for every well-formed probe
    pub fn net_effect(&self) -> i32 {
        self.ops
            .iter()
            .map(|op| i32::from(op.pushes()) - i32::from(op.pops()))
            .sum()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Identifier pushed as an int literal
fn literal(vertex: VertexId, value: u64) -> Result<i32, InstrumentError> {
    i32::try_from(value).map_err(|_| InstrumentError::LiteralOverflow { vertex, value })
}
