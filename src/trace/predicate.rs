//! Predicate-level branch distances
//!
//! For a decision and its concrete operands, how far each outcome is from
//! being taken. The taken side is always 0. Equality tests report the
//! operand gap; ordering tests report the gap plus one, the smallest change
//! that crosses the boundary from the far side.

use crate::bytecode::Condition;

/// Distance to making a decision come out true, and to making it false
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchDistances {
    pub if_true: f64,
    pub if_false: f64,
}

impl BranchDistances {
    /// `left <condition> right` on integers
    pub fn for_ints(condition: Condition, left: i64, right: i64) -> Self {
        // i64 difference of two widened i32 operands cannot overflow
        let gap = (left - right).unsigned_abs() as f64;
        match condition {
            Condition::Eq => Self {
                if_true: gap,
                if_false: if gap == 0.0 { 1.0 } else { 0.0 },
            },
            Condition::Ne => Self {
                if_true: if gap == 0.0 { 1.0 } else { 0.0 },
                if_false: gap,
            },
            _ if condition.holds(left, right) => Self {
                if_true: 0.0,
                if_false: gap + 1.0,
            },
            _ => Self {
                if_true: gap + 1.0,
                if_false: 0.0,
            },
        }
    }

    /// `value <condition> 0`
    pub fn for_int(condition: Condition, value: i64) -> Self {
        Self::for_ints(condition, value, 0)
    }

    /// Null check: `Eq` tests for null, `Ne` for non-null
    pub fn for_null(condition: Condition, is_null: bool) -> Self {
        Self::binary(matches!(condition, Condition::Eq) == is_null)
    }

    /// Reference identity: `Eq` tests for the same object
    pub fn for_refs(condition: Condition, same: bool) -> Self {
        Self::binary(matches!(condition, Condition::Eq) == same)
    }

    /// One switch case, scored as `value == key`
    pub fn for_switch_case(value: i64, key: i64) -> Self {
        Self::for_ints(Condition::Eq, value, key)
    }

    fn binary(holds: bool) -> Self {
        if holds {
            Self {
                if_true: 0.0,
                if_false: 1.0,
            }
        } else {
            Self {
                if_true: 1.0,
                if_false: 0.0,
            }
        }
    }

    /// Outcome the operands produce
    pub fn outcome(&self) -> bool {
        self.if_true == 0.0
    }

    /// Distance to the outcome that was not taken
    pub fn flip_distance(&self) -> f64 {
        if self.outcome() {
            self.if_false
        } else {
            self.if_true
        }
    }
}
