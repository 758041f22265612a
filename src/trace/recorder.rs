//! Reference trace sink keeping one path per execution
//!
//! Steps are buffered per thread, so concurrent executions of the same
//! instrumented method never see each other's steps. A recursive call on
//! the same thread belongs to the same execution and appends to its path.

use super::predicate::BranchDistances;
use super::TraceSink;
use crate::bytecode::{Condition, InsnIndex, MutationId};
use crate::cfg::BranchId;
use crate::distance::{Path, PathStep};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

static NEXT_RECORDER: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static BUFFERS: RefCell<HashMap<u64, ExecutionBuffer>> = RefCell::new(HashMap::new());
}

#[derive(Debug, Default)]
struct ExecutionBuffer {
    steps: Vec<PathStep>,
    outcomes: Vec<(BranchId, bool)>,
    touched: BTreeMap<MutationId, f64>,
}

/// Everything one execution reported
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordedExecution {
    pub path: Path,
    /// Decision id and outcome, in report order
    pub outcomes: Vec<(BranchId, bool)>,
    /// Smallest infection distance seen per mutation
    pub touched: BTreeMap<MutationId, f64>,
}

/// Sink that turns probe reports into paths
#[derive(Debug)]
pub struct PathRecorder {
    id: u64,
}

impl Default for PathRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl PathRecorder {
    pub fn new() -> Self {
        Self {
            id: NEXT_RECORDER.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Take the calling thread's execution, leaving an empty one behind
    pub fn finish_execution(&self) -> RecordedExecution {
        let buffer = BUFFERS.with(|b| b.borrow_mut().remove(&self.id).unwrap_or_default());
        RecordedExecution {
            path: Path::new(buffer.steps),
            outcomes: buffer.outcomes,
            touched: buffer.touched,
        }
    }

    /// Path of the calling thread's execution
    pub fn finish(&self) -> Path {
        self.finish_execution().path
    }

    /// Steps recorded so far on the calling thread
    pub fn pending_steps(&self) -> usize {
        BUFFERS.with(|b| b.borrow().get(&self.id).map_or(0, |buf| buf.steps.len()))
    }

    fn record(&self, insn: InsnIndex, branch_id: BranchId, distances: BranchDistances) {
        let outcome = distances.outcome();
        let local_distance = distances.flip_distance();
        trace!(insn, branch_id, outcome, local_distance, "decision reported");
        BUFFERS.with(|b| {
            let mut buffers = b.borrow_mut();
            let buffer = buffers.entry(self.id).or_default();
            buffer.steps.push(PathStep::new(insn, local_distance));
            buffer.outcomes.push((branch_id, outcome));
        });
    }
}

impl TraceSink for PathRecorder {
    fn report_branch_int(&self, value: i32, condition: Condition, branch_id: BranchId, insn: InsnIndex) {
        self.record(insn, branch_id, BranchDistances::for_int(condition, i64::from(value)));
    }

    fn report_branch_int_pair(
        &self,
        left: i32,
        right: i32,
        condition: Condition,
        branch_id: BranchId,
        insn: InsnIndex,
    ) {
        let distances = BranchDistances::for_ints(condition, i64::from(left), i64::from(right));
        self.record(insn, branch_id, distances);
    }

    fn report_branch_ref(&self, is_null: bool, condition: Condition, branch_id: BranchId, insn: InsnIndex) {
        self.record(insn, branch_id, BranchDistances::for_null(condition, is_null));
    }

    fn report_branch_ref_pair(&self, same: bool, condition: Condition, branch_id: BranchId, insn: InsnIndex) {
        self.record(insn, branch_id, BranchDistances::for_refs(condition, same));
    }

    fn report_switch_case(&self, value: i32, key: i32, branch_id: BranchId, insn: InsnIndex) {
        let distances = BranchDistances::for_switch_case(i64::from(value), i64::from(key));
        self.record(insn, branch_id, distances);
    }

    fn report_mutation_touched(&self, mutation: MutationId, infection_distance: f64) {
        BUFFERS.with(|b| {
            let mut buffers = b.borrow_mut();
            let touched = &mut buffers.entry(self.id).or_default().touched;
            touched
                .entry(mutation)
                .and_modify(|d| *d = d.min(infection_distance))
                .or_insert(infection_distance);
        });
    }
}
