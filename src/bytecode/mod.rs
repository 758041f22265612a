//! Raw method representation handed over by the parsing collaborator
//!
//! Labels are already resolved: every jump, switch and handler refers to an
//! instruction by its position in `MethodBody::instructions`.

pub mod frames;

pub use frames::{analyze_frames, Frames};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of an instruction within a method body
pub type InsnIndex = usize;

/// Externally assigned fault identifier
pub type MutationId = u64;

/// Comparison performed by a conditional jump
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

impl Condition {
    /// Stable numeric code passed to the trace sink as the decision kind
    pub fn code(self) -> i32 {
        match self {
            Condition::Eq => 0,
            Condition::Ne => 1,
            Condition::Lt => 2,
            Condition::Ge => 3,
            Condition::Gt => 4,
            Condition::Le => 5,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0 => Condition::Eq,
            1 => Condition::Ne,
            2 => Condition::Lt,
            3 => Condition::Ge,
            4 => Condition::Gt,
            5 => Condition::Le,
            _ => return None,
        })
    }

    /// Whether the condition holds for `left <op> right`
    pub fn holds(self, left: i64, right: i64) -> bool {
        match self {
            Condition::Eq => left == right,
            Condition::Ne => left != right,
            Condition::Lt => left < right,
            Condition::Ge => left >= right,
            Condition::Gt => left > right,
            Condition::Le => left <= right,
        }
    }

    pub fn is_equality(self) -> bool {
        matches!(self, Condition::Eq | Condition::Ne)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Condition::Eq => "eq",
            Condition::Ne => "ne",
            Condition::Lt => "lt",
            Condition::Ge => "ge",
            Condition::Gt => "gt",
            Condition::Le => "le",
        };
        f.write_str(s)
    }
}

/// Shape of the operands a conditional jump consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    /// One integer compared against zero
    Int,
    /// Two integers compared with each other
    IntPair,
    /// One reference tested for null (`Eq` = is null)
    Ref,
    /// Two references compared by identity
    RefPair,
    /// Operands no trace entry point accepts
    Opaque { pops: u8 },
}

impl Operand {
    /// Number of stack values consumed by the jump
    pub fn pops(self) -> u16 {
        match self {
            Operand::Int | Operand::Ref => 1,
            Operand::IntPair | Operand::RefPair => 2,
            Operand::Opaque { pops } => u16::from(pops),
        }
    }
}

/// Instruction semantics relevant to control flow and stack shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Opcode {
    /// Any instruction that neither transfers control nor tests a value
    Simple {
        mnemonic: String,
        #[serde(default)]
        pops: u8,
        #[serde(default)]
        pushes: u8,
    },
    Goto {
        target: InsnIndex,
    },
    If {
        condition: Condition,
        operand: Operand,
        target: InsnIndex,
    },
    TableSwitch {
        low: i32,
        targets: Vec<InsnIndex>,
        default: InsnIndex,
    },
    LookupSwitch {
        keys: Vec<i32>,
        targets: Vec<InsnIndex>,
        default: InsnIndex,
    },
    Return {
        #[serde(default)]
        values: u8,
    },
    Throw,
}

impl Opcode {
    pub fn simple(mnemonic: &str, pops: u8, pushes: u8) -> Self {
        Opcode::Simple {
            mnemonic: mnemonic.to_string(),
            pops,
            pushes,
        }
    }

    /// Values popped from the evaluation stack
    pub fn pops(&self) -> u16 {
        match self {
            Opcode::Simple { pops, .. } => u16::from(*pops),
            Opcode::Goto { .. } => 0,
            Opcode::If { operand, .. } => operand.pops(),
            Opcode::TableSwitch { .. } | Opcode::LookupSwitch { .. } => 1,
            Opcode::Return { values } => u16::from(*values),
            Opcode::Throw => 1,
        }
    }

    /// Values pushed onto the evaluation stack
    pub fn pushes(&self) -> u16 {
        match self {
            Opcode::Simple { pushes, .. } => u16::from(*pushes),
            _ => 0,
        }
    }

    /// Jump, return and throw never fall through to the next instruction
    pub fn is_unconditional_transfer(&self) -> bool {
        match self {
            Opcode::Goto { .. } | Opcode::Return { .. } | Opcode::Throw => true,
            Opcode::TableSwitch { .. } | Opcode::LookupSwitch { .. } => true,
            _ => false,
        }
    }

    /// Switch keys paired with their targets, in declaration order
    pub fn switch_cases(&self) -> Option<Vec<(i32, InsnIndex)>> {
        match self {
            Opcode::TableSwitch { low, targets, .. } => Some(
                targets
                    .iter()
                    .enumerate()
                    .map(|(i, &t)| (low.wrapping_add(i as i32), t))
                    .collect(),
            ),
            Opcode::LookupSwitch { keys, targets, .. } => {
                Some(keys.iter().copied().zip(targets.iter().copied()).collect())
            }
            _ => None,
        }
    }

    /// Every explicit target (jump, case or default)
    pub fn explicit_targets(&self) -> Vec<InsnIndex> {
        match self {
            Opcode::Goto { target } | Opcode::If { target, .. } => vec![*target],
            Opcode::TableSwitch {
                targets, default, ..
            }
            | Opcode::LookupSwitch {
                targets, default, ..
            } => {
                let mut all = targets.clone();
                all.push(*default);
                all
            }
            _ => Vec::new(),
        }
    }

    pub fn mnemonic(&self) -> String {
        match self {
            Opcode::Simple { mnemonic, .. } => mnemonic.clone(),
            Opcode::Goto { target } => format!("goto {}", target),
            Opcode::If {
                condition,
                operand,
                target,
            } => format!("if_{}{} {}", operand_prefix(*operand), condition, target),
            Opcode::TableSwitch { .. } => "tableswitch".to_string(),
            Opcode::LookupSwitch { .. } => "lookupswitch".to_string(),
            Opcode::Return { .. } => "return".to_string(),
            Opcode::Throw => "throw".to_string(),
        }
    }
}

fn operand_prefix(operand: Operand) -> &'static str {
    match operand {
        Operand::Int => "",
        Operand::IntPair => "icmp",
        Operand::Ref => "null_",
        Operand::RefPair => "acmp",
        Operand::Opaque { .. } => "opaque_",
    }
}

/// One instruction of a method body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    #[serde(flatten)]
    pub opcode: Opcode,
    /// Source line, if debug information is present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl Instruction {
    pub fn new(opcode: Opcode) -> Self {
        Self { opcode, line: None }
    }

    pub fn at_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }
}

/// Protected range `[start, end)` whose exceptions transfer to `handler`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionRange {
    pub start: InsnIndex,
    pub end: InsnIndex,
    pub handler: InsnIndex,
}

/// A fault injected at one instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MutationSite {
    pub instruction: InsnIndex,
    pub mutation_id: MutationId,
}

/// Member access flags using the class-file bit layout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessFlags(pub u16);

impl AccessFlags {
    pub const PUBLIC: AccessFlags = AccessFlags(0x0001);
    pub const PRIVATE: AccessFlags = AccessFlags(0x0002);
    pub const PROTECTED: AccessFlags = AccessFlags(0x0004);
    pub const STATIC: AccessFlags = AccessFlags(0x0008);
    pub const FINAL: AccessFlags = AccessFlags(0x0010);
    pub const BRIDGE: AccessFlags = AccessFlags(0x0040);
    pub const NATIVE: AccessFlags = AccessFlags(0x0100);
    pub const ABSTRACT: AccessFlags = AccessFlags(0x0400);
    pub const SYNTHETIC: AccessFlags = AccessFlags(0x1000);

    pub fn contains(self, other: AccessFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for AccessFlags {
    type Output = AccessFlags;

    fn bitor(self, rhs: AccessFlags) -> AccessFlags {
        AccessFlags(self.0 | rhs.0)
    }
}

/// Identity of a method within the registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodKey {
    pub class_name: String,
    /// Method name followed by its descriptor
    pub method: String,
}

impl MethodKey {
    pub fn new(class_name: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            method: method.into(),
        }
    }
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class_name, self.method)
    }
}

/// A method's instruction stream plus its metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodBody {
    pub class_name: String,
    pub method_name: String,
    #[serde(default)]
    pub descriptor: String,
    #[serde(default)]
    pub access: AccessFlags,
    /// Declared evaluation-stack depth
    #[serde(default)]
    pub max_stack: u16,
    pub instructions: Vec<Instruction>,
    #[serde(default)]
    pub exception_ranges: Vec<ExceptionRange>,
    #[serde(default)]
    pub mutations: Vec<MutationSite>,
}

impl MethodBody {
    pub fn new(
        class_name: impl Into<String>,
        method_name: impl Into<String>,
        descriptor: impl Into<String>,
        instructions: Vec<Instruction>,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
            descriptor: descriptor.into(),
            access: AccessFlags::PUBLIC,
            max_stack: 0,
            instructions,
            exception_ranges: Vec::new(),
            mutations: Vec::new(),
        }
    }

    /// Name plus descriptor, the registry's per-class method id
    pub fn method_id(&self) -> String {
        format!("{}{}", self.method_name, self.descriptor)
    }

    pub fn key(&self) -> MethodKey {
        MethodKey::new(self.class_name.clone(), self.method_id())
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn with_access(mut self, access: AccessFlags) -> Self {
        self.access = access;
        self
    }

    pub fn with_max_stack(mut self, max_stack: u16) -> Self {
        self.max_stack = max_stack;
        self
    }

    pub fn with_exception_range(mut self, range: ExceptionRange) -> Self {
        self.exception_ranges.push(range);
        self
    }

    pub fn with_mutation(mut self, instruction: InsnIndex, mutation_id: MutationId) -> Self {
        self.mutations.push(MutationSite {
            instruction,
            mutation_id,
        });
        self
    }
}
