//! Trace-reporting contract
//!
//! Instrumented code calls one of the [`EntryPoint`]s with the literals a
//! probe pushed. A [`TraceSink`] receives the decoded reports; how it
//! buffers them is its own business, as long as one execution's path is
//! never visible to another.

pub mod predicate;
pub mod recorder;

pub use predicate::BranchDistances;
pub use recorder::{PathRecorder, RecordedExecution};

use crate::bytecode::{Condition, InsnIndex, MutationId};
use crate::cfg::BranchId;
use crate::instrument::EntryPoint;
use thiserror::Error;

/// Receiver of probe reports
///
/// Called concurrently and reentrantly from instrumented code; must never
/// block.
pub trait TraceSink: Send + Sync {
    fn report_branch_int(&self, value: i32, condition: Condition, branch_id: BranchId, insn: InsnIndex);

    fn report_branch_int_pair(
        &self,
        left: i32,
        right: i32,
        condition: Condition,
        branch_id: BranchId,
        insn: InsnIndex,
    );

    fn report_branch_ref(&self, is_null: bool, condition: Condition, branch_id: BranchId, insn: InsnIndex);

    fn report_branch_ref_pair(&self, same: bool, condition: Condition, branch_id: BranchId, insn: InsnIndex);

    fn report_switch_case(&self, value: i32, key: i32, branch_id: BranchId, insn: InsnIndex);

    fn report_mutation_touched(&self, mutation: MutationId, infection_distance: f64);
}

/// A probe call whose arguments do not match its entry point
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("{entry:?} takes {expected} arguments, got {got}")]
    Arity {
        entry: EntryPoint,
        expected: usize,
        got: usize,
    },

    #[error("unknown decision kind {0}")]
    UnknownKind(i64),

    #[error("argument {0} out of range")]
    OutOfRange(i64),

    #[error("{0:?} is called directly by mutation code, not through probes")]
    NotDispatchable(EntryPoint),
}

/// Decode the stack values a probe passed to `entry` and forward them
///
/// Integers arrive as values; references arrive as handles where 0 is null.
pub fn dispatch(sink: &dyn TraceSink, entry: EntryPoint, args: &[i64]) -> Result<(), DispatchError> {
    let expected = usize::from(entry.arity());
    if args.len() != expected {
        return Err(DispatchError::Arity {
            entry,
            expected,
            got: args.len(),
        });
    }

    match entry {
        EntryPoint::BranchInt => {
            let (condition, branch, insn) = decode_tail(&args[1..])?;
            sink.report_branch_int(int(args[0])?, condition, branch, insn);
        }
        EntryPoint::BranchIntPair => {
            let (condition, branch, insn) = decode_tail(&args[2..])?;
            sink.report_branch_int_pair(int(args[0])?, int(args[1])?, condition, branch, insn);
        }
        EntryPoint::BranchRef => {
            let (condition, branch, insn) = decode_tail(&args[1..])?;
            sink.report_branch_ref(args[0] == 0, condition, branch, insn);
        }
        EntryPoint::BranchRefPair => {
            let (condition, branch, insn) = decode_tail(&args[2..])?;
            sink.report_branch_ref_pair(args[0] == args[1], condition, branch, insn);
        }
        EntryPoint::SwitchCase => {
            let (_, branch, insn) = decode_tail(&args[2..])?;
            sink.report_switch_case(int(args[0])?, int(args[1])?, branch, insn);
        }
        EntryPoint::MutationTouched => return Err(DispatchError::NotDispatchable(entry)),
    }
    Ok(())
}

/// `(kind, branch, insn)`, the trailing literals of every decision probe
fn decode_tail(tail: &[i64]) -> Result<(Condition, BranchId, InsnIndex), DispatchError> {
    let kind = tail[0];
    let condition = i32::try_from(kind)
        .ok()
        .and_then(Condition::from_code)
        .ok_or(DispatchError::UnknownKind(kind))?;
    let branch = BranchId::try_from(tail[1]).map_err(|_| DispatchError::OutOfRange(tail[1]))?;
    let insn = InsnIndex::try_from(tail[2]).map_err(|_| DispatchError::OutOfRange(tail[2]))?;
    Ok((condition, branch, insn))
}

fn int(value: i64) -> Result<i32, DispatchError> {
    i32::try_from(value).map_err(|_| DispatchError::OutOfRange(value))
}
