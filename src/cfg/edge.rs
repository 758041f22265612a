//! Edge kind classification for CFG edges

use crate::bytecode::{InsnIndex, Opcode};
use serde::{Deserialize, Serialize};

/// Kind of control flow edge between two instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Sequential fall-through to the next instruction
    Fallthrough,
    /// Unconditional jump
    Jump,
    /// Conditional jump taken
    BranchTaken,
    /// Conditional jump not taken (falls through)
    BranchNotTaken,
    /// Switch case with the given key
    SwitchCase { key: i32 },
    /// Switch default target
    SwitchDefault,
    /// Transfer to an exception handler
    Exception,
}

impl EdgeKind {
    /// Color for DOT visualization
    pub fn dot_color(&self) -> &'static str {
        match self {
            EdgeKind::Fallthrough => "black",
            EdgeKind::Jump => "gray",
            EdgeKind::BranchTaken => "green",
            EdgeKind::BranchNotTaken => "red",
            EdgeKind::SwitchCase { .. } => "blue",
            EdgeKind::SwitchDefault => "orange",
            EdgeKind::Exception => "purple",
        }
    }

    /// Label for DOT visualization
    pub fn dot_label(&self) -> String {
        match self {
            EdgeKind::Fallthrough | EdgeKind::Jump => String::new(),
            EdgeKind::BranchTaken => "T".to_string(),
            EdgeKind::BranchNotTaken => "F".to_string(),
            EdgeKind::SwitchCase { key } => format!("case {}", key),
            EdgeKind::SwitchDefault => "default".to_string(),
            EdgeKind::Exception => "catch".to_string(),
        }
    }
}

/// Normal-flow successors of the instruction at `at`, with their edge kinds
///
/// A fall-through target of `at + 1` is included for every instruction that
/// is not an unconditional transfer; the caller decides what to do when it
/// lies past the end of the body.
pub fn classify_successors(at: InsnIndex, opcode: &Opcode) -> Vec<(InsnIndex, EdgeKind)> {
    match opcode {
        Opcode::Goto { target } => vec![(*target, EdgeKind::Jump)],
        Opcode::If { target, .. } => vec![
            (*target, EdgeKind::BranchTaken),
            (at + 1, EdgeKind::BranchNotTaken),
        ],
        Opcode::TableSwitch { default, .. } | Opcode::LookupSwitch { default, .. } => {
            let mut edges = opcode
                .switch_cases()
                .unwrap_or_default()
                .into_iter()
                .map(|(key, t)| (t, EdgeKind::SwitchCase { key }))
                .collect::<Vec<_>>();
            edges.push((*default, EdgeKind::SwitchDefault));
            edges
        }
        Opcode::Return { .. } | Opcode::Throw => vec![],
        Opcode::Simple { .. } => vec![(at + 1, EdgeKind::Fallthrough)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{Condition, Operand};

    #[test]
    fn test_conditional_jump_has_two_successors() {
        let op = Opcode::If {
            condition: Condition::Lt,
            operand: Operand::IntPair,
            target: 9,
        };
        assert_eq!(
            classify_successors(4, &op),
            vec![(9, EdgeKind::BranchTaken), (5, EdgeKind::BranchNotTaken)]
        );
    }

    #[test]
    fn test_lookup_switch_edges_per_case_plus_default() {
        let op = Opcode::LookupSwitch {
            keys: vec![1, 10, 100],
            targets: vec![3, 4, 3],
            default: 5,
        };
        let edges = classify_successors(0, &op);
        assert_eq!(edges.len(), 4);
        assert_eq!(edges[2], (3, EdgeKind::SwitchCase { key: 100 }));
        assert_eq!(edges[3], (5, EdgeKind::SwitchDefault));
    }

    #[test]
    fn test_terminators_have_no_successors() {
        assert!(classify_successors(0, &Opcode::Throw).is_empty());
        assert!(classify_successors(0, &Opcode::Return { values: 1 }).is_empty());
        assert_eq!(
            classify_successors(2, &Opcode::Goto { target: 0 }),
            vec![(0, EdgeKind::Jump)]
        );
    }
}
