use crate::error::ProofError;
use crate::proof::ir::{MAX_NESTING, Program};
use crate::proof::op::{
    self, CALL_PREFIX, Instruction, OP_CAT, OP_COMPOSE, OP_FUNC, OP_LOAD, OP_REV, OP_SET,
    OP_SHA256, OP_STORE, OP_SWAP, Operand, SlotIndex,
};
use serde_json::Value;

/// Parses the JSON text form of a proof program.
pub fn parse_str(text: &str) -> Result<Program, ProofError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| ProofError::malformed(format!("invalid JSON: {}", e)))?;
    parse(&value)
}

/// Turns the untyped nested instruction list into a validated `Program`.
///
/// Grammar checks happen here; scoping checks (undefined functions,
/// arguments outside function bodies) happen in `Program::new`.
pub fn parse(value: &Value) -> Result<Program, ProofError> {
    let instructions = parse_block(value, 0)?;
    Program::new(instructions)
}

/// `depth` counts the `op_func` bodies enclosing this block.
fn parse_block(value: &Value, depth: usize) -> Result<Vec<Instruction>, ProofError> {
    let items = value
        .as_array()
        .ok_or_else(|| ProofError::malformed("expected a list of instructions"))?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            parse_instruction(item, depth).map_err(|e| e.located(format!("instruction {}", i)))
        })
        .collect()
}

fn parse_instruction(value: &Value, depth: usize) -> Result<Instruction, ProofError> {
    let items = value
        .as_array()
        .ok_or_else(|| ProofError::malformed(format!("instruction must be a list, got {}", value)))?;

    let (head, rest) = items
        .split_first()
        .ok_or_else(|| ProofError::malformed("empty instruction"))?;

    let opcode = head
        .as_str()
        .ok_or_else(|| ProofError::malformed(format!("opcode must be a string, got {}", head)))?;

    match opcode {
        OP_CAT => Ok(Instruction::Concat(parse_operands(rest)?)),
        OP_SHA256 => Ok(Instruction::Hash(parse_operands(rest)?)),
        OP_REV => {
            expect_arity(opcode, rest, 0)?;
            Ok(Instruction::Reverse)
        }
        OP_STORE => Ok(Instruction::Store(parse_single_slot(opcode, rest)?)),
        OP_LOAD => Ok(Instruction::Load(parse_single_slot(opcode, rest)?)),
        OP_SWAP => Ok(Instruction::Swap(parse_single_slot(opcode, rest)?)),
        OP_SET => Ok(Instruction::Set(parse_single_operand(opcode, rest)?)),
        OP_COMPOSE => Ok(Instruction::Compose(parse_single_operand(opcode, rest)?)),
        OP_FUNC => parse_function(rest, depth + 1),
        name if name.starts_with(CALL_PREFIX) => {
            let callee = &name[CALL_PREFIX.len()..];
            if callee.is_empty() {
                return Err(ProofError::malformed("call opcode is missing a function name"));
            }
            Ok(Instruction::Call {
                name: callee.to_string(),
                args: parse_operands(rest)?,
            })
        }
        other => Err(ProofError::malformed(format!("unknown opcode '{}'", other))),
    }
}

fn parse_function(rest: &[Value], depth: usize) -> Result<Instruction, ProofError> {
    expect_arity(OP_FUNC, rest, 2)?;
    if depth > MAX_NESTING {
        return Err(ProofError::malformed(format!(
            "function definitions nested deeper than {}",
            MAX_NESTING
        )));
    }

    let name = rest[0]
        .as_str()
        .ok_or_else(|| ProofError::malformed(format!("function name must be a string, got {}", rest[0])))?;
    if name.is_empty() {
        return Err(ProofError::malformed("function name must not be empty"));
    }

    let body = parse_block(&rest[1], depth).map_err(|e| e.located(format!("function '{}'", name)))?;

    Ok(Instruction::DefineFunction {
        name: name.to_string(),
        body,
    })
}

fn parse_operands(values: &[Value]) -> Result<Vec<Operand>, ProofError> {
    values.iter().map(parse_operand).collect()
}

fn parse_operand(value: &Value) -> Result<Operand, ProofError> {
    match value.as_str() {
        Some(token) => Operand::from_token(token),
        None => Err(ProofError::malformed(format!(
            "operand must be a prefixed string token, got {}",
            value
        ))),
    }
}

fn parse_single_operand(opcode: &str, rest: &[Value]) -> Result<Operand, ProofError> {
    expect_arity(opcode, rest, 1)?;
    parse_operand(&rest[0])
}

/// Slot addresses are either a bare integer (`32`) or an `m:<n>` token.
fn parse_single_slot(opcode: &str, rest: &[Value]) -> Result<SlotIndex, ProofError> {
    expect_arity(opcode, rest, 1)?;

    let value = &rest[0];
    if let Some(n) = value.as_i64() {
        return op::slot_from_int(n);
    }

    match parse_operand(value)? {
        Operand::Slot(slot) => Ok(slot),
        other => Err(ProofError::malformed(format!(
            "{} expects a memory slot, got '{}'",
            opcode, other
        ))),
    }
}

fn expect_arity(opcode: &str, rest: &[Value], expected: usize) -> Result<(), ProofError> {
    if rest.len() != expected {
        return Err(ProofError::malformed(format!(
            "{} expects {} operand(s), got {}",
            opcode,
            expected,
            rest.len()
        )));
    }
    Ok(())
}
