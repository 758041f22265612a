//! Error taxonomy
//!
//! Failures are contained at the smallest unit that can absorb them:
//! an unanalyzable method is skipped, a malformed body fails its class,
//! and path queries never fail (they fall back to the graph diameter).

use crate::bytecode::InsnIndex;
use thiserror::Error;

/// Instruction-flow analysis could not determine the stack shape of a method
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("method body is empty")]
    EmptyBody,

    #[error("stack underflow at instruction {at}: needs {needed}, has {available}")]
    StackUnderflow {
        at: InsnIndex,
        needed: u16,
        available: u16,
    },

    #[error("stack depth overflows at instruction {at}")]
    StackOverflow { at: InsnIndex },

    #[error("inconsistent stack depth at instruction {at}: {first} vs {second}")]
    InconsistentDepth {
        at: InsnIndex,
        first: u16,
        second: u16,
    },

    #[error("execution falls off the end of the body after instruction {at}")]
    FallsOffEnd { at: InsnIndex },
}

/// Errors raised while turning a method body into a graph
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CfgError {
    /// A jump, switch or handler refers to a position outside the body
    #[error("dangling edge: instruction {from} targets {target}, body has {len} instructions")]
    DanglingTarget {
        from: InsnIndex,
        target: InsnIndex,
        len: usize,
    },

    #[error("malformed exception range [{start}, {end}) -> {handler}")]
    MalformedExceptionRange {
        start: InsnIndex,
        end: InsnIndex,
        handler: InsnIndex,
    },

    #[error("malformed switch at instruction {at}: {keys} keys but {targets} targets")]
    MalformedSwitch {
        at: InsnIndex,
        keys: usize,
        targets: usize,
    },

    #[error("instruction {at}: condition {condition} cannot order references")]
    MalformedCondition { at: InsnIndex, condition: String },

    #[error("mutation {mutation_id} attached to instruction {at} outside the body")]
    DanglingMutation { mutation_id: u64, at: InsnIndex },

    #[error("unanalyzable method {method}: {source}")]
    Unanalyzable {
        method: String,
        #[source]
        source: FrameError,
    },
}

impl CfgError {
    /// Malformed input is an invariant violation; everything else is local
    /// to one method.
    pub fn is_malformed(&self) -> bool {
        !matches!(self, CfgError::Unanalyzable { .. })
    }
}

/// Errors raised by the probe injector
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstrumentError {
    #[error("method {0} is already instrumented")]
    AlreadyInstrumented(String),

    #[error("graph for {graph} does not belong to body {body}")]
    GraphMismatch { graph: String, body: String },

    #[error("decision vertex {0} has no registered branch id")]
    MissingBranchId(usize),

    #[error("vertex {vertex}: identifier {value} does not fit an int literal")]
    LiteralOverflow { vertex: usize, value: u64 },

    #[error(transparent)]
    Frames(#[from] FrameError),
}

/// Failure of a whole class pass
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassError {
    #[error("class {class}: method {method}: {source}")]
    Malformed {
        class: String,
        method: String,
        #[source]
        source: CfgError,
    },

    #[error("class {class}: method {method} declares class {declared}")]
    ForeignMethod {
        class: String,
        method: String,
        declared: String,
    },
}

/// Errors loading an analysis configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
