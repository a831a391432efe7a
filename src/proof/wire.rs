//! Packed binary form of a program.
//!
//! Function bodies are flattened: a definition is written as a
//! `Function { name, len }` header followed by its `len` body instructions,
//! so decoding never recurses and nesting is bounded by `MAX_NESTING`.

use crate::error::ProofError;
use crate::proof::ir::MAX_NESTING;
use crate::proof::op::{Instruction, Operand, SlotIndex};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
enum WireInstruction {
    Concat(Vec<Operand>),
    Hash(Vec<Operand>),
    Reverse,
    Store(SlotIndex),
    Load(SlotIndex),
    Set(Operand),
    Swap(SlotIndex),
    Compose(Operand),
    /// Header of a definition; the next `len` instructions at this level are its body.
    Function { name: String, len: u32 },
    Call { name: String, args: Vec<Operand> },
}

pub(crate) fn encode(instructions: &[Instruction]) -> Result<Vec<u8>, ProofError> {
    let mut flat = Vec::new();
    flatten(instructions, &mut flat)?;
    Ok(postcard::to_allocvec(&flat)?)
}

pub(crate) fn decode(bytes: &[u8]) -> Result<Vec<Instruction>, ProofError> {
    let (flat, rest): (Vec<WireInstruction>, _) = postcard::take_from_bytes(bytes)?;
    if !rest.is_empty() {
        return Err(ProofError::malformed(format!(
            "{} trailing bytes after encoded program",
            rest.len()
        )));
    }
    unflatten(flat)
}

fn flatten(instructions: &[Instruction], out: &mut Vec<WireInstruction>) -> Result<(), ProofError> {
    for inst in instructions {
        let wire = match inst {
            Instruction::Concat(ops) => WireInstruction::Concat(ops.clone()),
            Instruction::Hash(ops) => WireInstruction::Hash(ops.clone()),
            Instruction::Reverse => WireInstruction::Reverse,
            Instruction::Store(slot) => WireInstruction::Store(*slot),
            Instruction::Load(slot) => WireInstruction::Load(*slot),
            Instruction::Set(op) => WireInstruction::Set(op.clone()),
            Instruction::Swap(slot) => WireInstruction::Swap(*slot),
            Instruction::Compose(op) => WireInstruction::Compose(op.clone()),
            Instruction::Call { name, args } => WireInstruction::Call {
                name: name.clone(),
                args: args.clone(),
            },
            Instruction::DefineFunction { name, body } => {
                let len = u32::try_from(body.len()).map_err(|_| {
                    ProofError::malformed(format!("function '{}' has too many instructions", name))
                })?;
                out.push(WireInstruction::Function {
                    name: name.clone(),
                    len,
                });
                flatten(body, out)?;
                continue;
            }
        };
        out.push(wire);
    }
    Ok(())
}

/// A definition whose body is still being filled.
struct OpenFunction {
    name: String,
    remaining: u32,
    body: Vec<Instruction>,
}

fn unflatten(flat: Vec<WireInstruction>) -> Result<Vec<Instruction>, ProofError> {
    let mut top = Vec::new();
    let mut open: Vec<OpenFunction> = Vec::new();

    for wire in flat {
        let inst = match wire {
            WireInstruction::Function { name, len } => {
                if open.len() >= MAX_NESTING {
                    return Err(ProofError::malformed(format!(
                        "function definitions nested deeper than {}",
                        MAX_NESTING
                    )));
                }
                open.push(OpenFunction {
                    name,
                    remaining: len,
                    body: Vec::new(),
                });
                close_finished(&mut open, &mut top);
                continue;
            }
            WireInstruction::Concat(ops) => Instruction::Concat(ops),
            WireInstruction::Hash(ops) => Instruction::Hash(ops),
            WireInstruction::Reverse => Instruction::Reverse,
            WireInstruction::Store(slot) => Instruction::Store(slot),
            WireInstruction::Load(slot) => Instruction::Load(slot),
            WireInstruction::Set(op) => Instruction::Set(op),
            WireInstruction::Swap(slot) => Instruction::Swap(slot),
            WireInstruction::Compose(op) => Instruction::Compose(op),
            WireInstruction::Call { name, args } => Instruction::Call { name, args },
        };
        place(inst, &mut open, &mut top);
        close_finished(&mut open, &mut top);
    }

    if let Some(unfinished) = open.last() {
        return Err(ProofError::malformed(format!(
            "encoded program ends inside function '{}'",
            unfinished.name
        )));
    }
    Ok(top)
}

/// Appends to the innermost open body, or to the top level.
fn place(inst: Instruction, open: &mut [OpenFunction], top: &mut Vec<Instruction>) {
    match open.last_mut() {
        Some(current) => {
            current.body.push(inst);
            current.remaining -= 1;
        }
        None => top.push(inst),
    }
}

fn close_finished(open: &mut Vec<OpenFunction>, top: &mut Vec<Instruction>) {
    while open.last().is_some_and(|current| current.remaining == 0) {
        let Some(done) = open.pop() else { break };
        let inst = Instruction::DefineFunction {
            name: done.name,
            body: done.body,
        };
        place(inst, open, top);
    }
}
