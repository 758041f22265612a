//! Shared fixtures for the integration tests
//!
//! `execute` runs a rewritten method on a tiny stack machine that knows just
//! enough mnemonics for the fixtures below, forwarding every probe call to a
//! trace sink.

#![allow(dead_code)]

use branchscope::bytecode::{Condition, Instruction, MethodBody, Opcode, Operand};
use branchscope::distance::MethodGraph;
use branchscope::instrument::{instrument, Emitted, InstrumentedMethod, ProbeOp, RewrittenMethod};
use branchscope::cfg::CfgBuilder;
use branchscope::trace::{dispatch, TraceSink};
use branchscope::Registry;

pub fn insn(opcode: Opcode) -> Instruction {
    Instruction::new(opcode)
}

pub fn simple(mnemonic: &str, pops: u8, pushes: u8) -> Instruction {
    insn(Opcode::simple(mnemonic, pops, pushes))
}

pub fn load(slot: u8) -> Instruction {
    simple(&format!("iload_{}", slot), 0, 1)
}

pub fn nop() -> Instruction {
    simple("nop", 0, 0)
}

pub fn ret() -> Instruction {
    insn(Opcode::Return { values: 0 })
}

pub fn goto(target: usize) -> Instruction {
    insn(Opcode::Goto { target })
}

pub fn if_int(condition: Condition, target: usize) -> Instruction {
    insn(Opcode::If {
        condition,
        operand: Operand::Int,
        target,
    })
}

pub fn if_icmp(condition: Condition, target: usize) -> Instruction {
    insn(Opcode::If {
        condition,
        operand: Operand::IntPair,
        target,
    })
}

/// Build, precompute and instrument `body` against a fresh registry
pub fn prepare(body: &MethodBody) -> (Registry, MethodGraph, InstrumentedMethod) {
    let registry = Registry::new();
    let graph = MethodGraph::precompute(CfgBuilder::new(&registry).build(body).unwrap());
    let instrumented = instrument(&graph, body, &registry).unwrap();
    (registry, graph, instrumented)
}

/// Run `code` with integer locals until it returns
///
/// Supports `iload_N`, `aload_N`, `iconst_K`, `aconst_null`, `nop`, `pop`
/// and every control-transfer opcode. References are integer handles, 0 is
/// null.
pub fn execute(code: &RewrittenMethod, locals: &[i64], sink: &dyn TraceSink) {
    let mut stack: Vec<i64> = Vec::new();
    let mut pc = 0;
    let mut budget = 10_000;

    while pc < code.len() {
        budget -= 1;
        assert!(budget > 0, "execution did not terminate");
        match &code.code[pc] {
            Emitted::Probe(op) => {
                match *op {
                    ProbeOp::Dup => {
                        let top = *stack.last().unwrap();
                        stack.push(top);
                    }
                    ProbeOp::Dup2 => {
                        let pair = stack[stack.len() - 2..].to_vec();
                        stack.extend(pair);
                    }
                    ProbeOp::PushInt(value) => stack.push(i64::from(value)),
                    ProbeOp::Invoke(entry) => {
                        let arity = usize::from(entry.arity());
                        let args = stack.split_off(stack.len() - arity);
                        dispatch(sink, entry, &args).unwrap();
                    }
                }
                pc += 1;
            }
            Emitted::Original { instruction, .. } => match &instruction.opcode {
                Opcode::Simple { mnemonic, .. } => {
                    simple_op(mnemonic, locals, &mut stack);
                    pc += 1;
                }
                Opcode::Goto { target } => pc = *target,
                Opcode::If {
                    condition,
                    operand,
                    target,
                } => {
                    let (left, right) = match operand {
                        Operand::Int | Operand::Ref => (stack.pop().unwrap(), 0),
                        Operand::IntPair | Operand::RefPair => {
                            let right = stack.pop().unwrap();
                            (stack.pop().unwrap(), right)
                        }
                        Operand::Opaque { .. } => panic!("opaque operands cannot run"),
                    };
                    pc = if condition.holds(left, right) { *target } else { pc + 1 };
                }
                Opcode::TableSwitch {
                    low,
                    targets,
                    default,
                } => {
                    let value = stack.pop().unwrap();
                    let slot = value - i64::from(*low);
                    pc = usize::try_from(slot)
                        .ok()
                        .and_then(|s| targets.get(s).copied())
                        .unwrap_or(*default);
                }
                Opcode::LookupSwitch {
                    keys,
                    targets,
                    default,
                } => {
                    let value = stack.pop().unwrap();
                    pc = keys
                        .iter()
                        .position(|&k| i64::from(k) == value)
                        .map_or(*default, |i| targets[i]);
                }
                Opcode::Return { .. } | Opcode::Throw => return,
            },
        }
    }
    panic!("fell off the end of the rewritten code");
}

fn simple_op(mnemonic: &str, locals: &[i64], stack: &mut Vec<i64>) {
    if let Some(slot) = mnemonic
        .strip_prefix("iload_")
        .or_else(|| mnemonic.strip_prefix("aload_"))
    {
        let slot: usize = slot.parse().unwrap();
        stack.push(locals[slot]);
    } else if let Some(k) = mnemonic.strip_prefix("iconst_") {
        stack.push(if k == "m1" { -1 } else { k.parse().unwrap() });
    } else {
        match mnemonic {
            "aconst_null" => stack.push(0),
            "nop" => {}
            "pop" => {
                stack.pop().unwrap();
            }
            other => panic!("unsupported mnemonic {}", other),
        }
    }
}
