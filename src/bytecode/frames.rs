//! Instruction-flow analysis: evaluation-stack depth per instruction
//!
//! Propagates stack depth along normal and exceptional successors with a
//! worklist. A handler is entered with exactly one value (the exception)
//! on the stack. The analysis assumes targets were validated beforehand.

use super::{InsnIndex, MethodBody};
use crate::error::FrameError;
use std::collections::VecDeque;

/// Stack shape of a method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frames {
    /// Depth before each instruction; `None` if flow analysis never reaches it
    pub depth_before: Vec<Option<u16>>,
    /// Largest depth observed anywhere in the method
    pub max_depth: u16,
}

impl Frames {
    pub fn depth_at(&self, at: InsnIndex) -> Option<u16> {
        self.depth_before.get(at).copied().flatten()
    }

    pub fn is_reached(&self, at: InsnIndex) -> bool {
        self.depth_at(at).is_some()
    }
}

/// Normal-flow successors of the instruction at `at`
pub(crate) fn normal_successors(body: &MethodBody, at: InsnIndex) -> Vec<InsnIndex> {
    let opcode = &body.instructions[at].opcode;
    let mut next = opcode.explicit_targets();
    if !opcode.is_unconditional_transfer() {
        next.push(at + 1);
    }
    next
}

/// Compute the stack depth before every reachable instruction
pub fn analyze_frames(body: &MethodBody) -> Result<Frames, FrameError> {
    let len = body.instructions.len();
    if len == 0 {
        return Err(FrameError::EmptyBody);
    }

    let mut depth_before: Vec<Option<u16>> = vec![None; len];
    let mut max_depth: u16 = 0;
    let mut worklist: VecDeque<InsnIndex> = VecDeque::new();

    depth_before[0] = Some(0);
    worklist.push_back(0);

    while let Some(at) = worklist.pop_front() {
        let depth = match depth_before[at] {
            Some(d) => d,
            None => continue,
        };
        let opcode = &body.instructions[at].opcode;

        let pops = opcode.pops();
        if pops > depth {
            return Err(FrameError::StackUnderflow {
                at,
                needed: pops,
                available: depth,
            });
        }
        let after = (depth - pops)
            .checked_add(opcode.pushes())
            .ok_or(FrameError::StackOverflow { at })?;
        max_depth = max_depth.max(depth).max(after);

        if !opcode.is_unconditional_transfer() && at + 1 >= len {
            return Err(FrameError::FallsOffEnd { at });
        }

        for succ in normal_successors(body, at) {
            if succ >= len {
                continue;
            }
            merge(&mut depth_before, &mut worklist, succ, after)?;
        }

        for range in &body.exception_ranges {
            if range.start <= at && at < range.end && range.handler < len {
                merge(&mut depth_before, &mut worklist, range.handler, 1)?;
                max_depth = max_depth.max(1);
            }
        }
    }

    Ok(Frames {
        depth_before,
        max_depth,
    })
}

fn merge(
    depth_before: &mut [Option<u16>],
    worklist: &mut VecDeque<InsnIndex>,
    at: InsnIndex,
    depth: u16,
) -> Result<(), FrameError> {
    match depth_before[at] {
        None => {
            depth_before[at] = Some(depth);
            worklist.push_back(at);
            Ok(())
        }
        Some(existing) if existing == depth => Ok(()),
        Some(existing) => Err(FrameError::InconsistentDepth {
            at,
            first: existing,
            second: depth,
        }),
    }
}
