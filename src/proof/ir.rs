use crate::error::ProofError;
use crate::proof::op::{Instruction, Operand};
use crate::proof::wire;
use serde_json::Value;
use std::collections::HashMap;

/// How deeply `op_func` definitions may nest. A top-level definition is at
/// depth 1.
pub const MAX_NESTING: usize = 32;

/// Function name -> body.
///
/// There is one table per program. Definitions nested inside function bodies
/// land in the same table, so names are unique program-wide.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionTable {
    bodies: HashMap<String, Vec<Instruction>>,
}

impl FunctionTable {
    pub fn get(&self, name: &str) -> Option<&[Instruction]> {
        self.bodies.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bodies.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Function names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.bodies.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn register(&mut self, name: &str, body: &[Instruction]) -> Result<(), ProofError> {
        if self.bodies.contains_key(name) {
            return Err(ProofError::malformed(format!(
                "function '{}' is defined more than once",
                name
            )));
        }
        self.bodies.insert(name.to_string(), body.to_vec());
        Ok(())
    }
}

/// A validated proof program. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    instructions: Vec<Instruction>,
    functions: FunctionTable,
}

impl Program {
    /// Builds the function table and checks the scoping rules:
    /// every call names a defined function, and positional arguments only
    /// appear inside function bodies.
    ///
    /// All definitions are collected first, so a call may precede the
    /// `op_func` that defines its target.
    pub fn new(instructions: Vec<Instruction>) -> Result<Self, ProofError> {
        let mut functions = FunctionTable::default();
        collect_functions(&instructions, &mut functions, 0)?;
        check_scope(&instructions, &functions, false)?;
        Ok(Self {
            instructions,
            functions,
        })
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn functions(&self) -> &FunctionTable {
        &self.functions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Canonical JSON form (array of instruction arrays).
    pub fn to_json(&self) -> Value {
        Value::Array(self.instructions.iter().map(Instruction::to_json).collect())
    }

    /// Compact binary form for storage and transmission.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProofError> {
        wire::encode(&self.instructions)
    }

    /// Decodes the binary form and re-validates it like a freshly parsed program.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProofError> {
        Self::new(wire::decode(bytes)?)
    }
}

fn collect_functions(
    instructions: &[Instruction],
    functions: &mut FunctionTable,
    depth: usize,
) -> Result<(), ProofError> {
    for inst in instructions {
        if let Instruction::DefineFunction { name, body } = inst {
            if depth >= MAX_NESTING {
                return Err(ProofError::malformed(format!(
                    "function '{}' is nested deeper than {}",
                    name, MAX_NESTING
                )));
            }
            if name.is_empty() {
                return Err(ProofError::malformed("function name must not be empty"));
            }
            functions.register(name, body)?;
            collect_functions(body, functions, depth + 1)?;
        }
    }
    Ok(())
}

fn check_scope(
    instructions: &[Instruction],
    functions: &FunctionTable,
    in_function: bool,
) -> Result<(), ProofError> {
    for (i, inst) in instructions.iter().enumerate() {
        let located = |e: ProofError| e.located(format!("instruction {}", i));

        match inst {
            Instruction::DefineFunction { name, body } => {
                check_scope(body, functions, true)
                    .map_err(|e| e.located(format!("function '{}'", name)))
                    .map_err(located)?;
            }
            Instruction::Call { name, .. } if !functions.contains(name) => {
                return Err(located(ProofError::malformed(format!(
                    "call to undefined function '{}'",
                    name
                ))));
            }
            _ => {}
        }

        for operand in inst.operands() {
            match operand {
                Operand::Arg(0) => {
                    return Err(located(ProofError::malformed(
                        "argument index must be 1 or greater",
                    )));
                }
                Operand::Arg(index) if !in_function => {
                    return Err(located(ProofError::malformed(format!(
                        "positional argument a:{} used outside a function body",
                        index
                    ))));
                }
                _ => {}
            }
        }
    }
    Ok(())
}
