use crate::error::ProofError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;

// =============================================================================
// OPCODE NAMES - the wire names used by the JSON representation
// =============================================================================

pub const OP_CAT: &str = "op_cat";
pub const OP_SHA256: &str = "op_sha256";
pub const OP_REV: &str = "op_rev";
pub const OP_STORE: &str = "op_store";
pub const OP_LOAD: &str = "op_load";
pub const OP_SET: &str = "op_set";
pub const OP_SWAP: &str = "op_swap";
pub const OP_COMPOSE: &str = "op_compose";
pub const OP_FUNC: &str = "op_func";

/// Prefix of a function call opcode: `f_<name>`.
pub const CALL_PREFIX: &str = "f_";

/// Memory index that names the current buffer instead of a stored slot.
pub const BUFFER_SENTINEL: i64 = -1;

pub type SlotIndex = u32;

/// How many bytes a stream operand pulls from the byte source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadLen {
    /// At most this many bytes; fewer when the source runs dry.
    Bounded(usize),
    /// Everything left in the source. Only allowed when unbounded reads are enabled.
    Rest,
}

/// A single resolved-at-runtime argument of an instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    /// `s:<text>`
    Literal(Vec<u8>),
    /// `h:<hex>`
    Hex(Vec<u8>),
    /// `m:-1` - snapshot of the current buffer.
    Buffer,
    /// `m:<n>` - a memory slot.
    Slot(SlotIndex),
    /// `a:<n>` - 1-based positional argument of the enclosing call.
    Arg(usize),
    /// `r:<n>` / `r:*`
    Read(ReadLen),
}

impl Operand {
    /// Parses one operand token.
    ///
    /// Negative read lengths are a stream policy error. Everything else that
    /// does not fit the grammar is malformed.
    pub fn from_token(token: &str) -> Result<Self, ProofError> {
        let (prefix, body) = token
            .split_once(':')
            .ok_or_else(|| ProofError::malformed(format!("operand '{}' has no prefix", token)))?;

        match prefix {
            "s" => Ok(Operand::Literal(body.as_bytes().to_vec())),
            "h" => hex::decode(body).map(Operand::Hex).map_err(|e| {
                ProofError::malformed(format!("invalid hex literal '{}': {}", body, e))
            }),
            "m" => {
                let index = parse_int(token, body)?;
                if index == BUFFER_SENTINEL {
                    Ok(Operand::Buffer)
                } else {
                    slot_from_int(index).map(Operand::Slot)
                }
            }
            "a" => {
                let index = parse_int(token, body)?;
                if index < 1 {
                    return Err(ProofError::malformed(format!(
                        "argument index in '{}' must be 1 or greater",
                        token
                    )));
                }
                usize::try_from(index)
                    .map(Operand::Arg)
                    .map_err(|_| ProofError::malformed(format!("argument index too large: '{}'", token)))
            }
            "r" => {
                if body == "*" {
                    return Ok(Operand::Read(ReadLen::Rest));
                }
                let len = parse_int(token, body)?;
                if len < 0 {
                    return Err(ProofError::stream_policy(format!(
                        "read length must not be negative, got {}",
                        len
                    )));
                }
                usize::try_from(len)
                    .map(|n| Operand::Read(ReadLen::Bounded(n)))
                    .map_err(|_| ProofError::stream_policy(format!("read length too large: {}", len)))
            }
            _ => Err(ProofError::malformed(format!(
                "unknown operand prefix '{}' in '{}'",
                prefix, token
            ))),
        }
    }

    /// Canonical token form. `from_token(op.to_token())` always resolves to
    /// the same bytes, and gives `op` back for everything except a literal
    /// that is not valid UTF-8: that one is written as an `h:` token and so
    /// parses back as `Operand::Hex`.
    pub fn to_token(&self) -> String {
        match self {
            Operand::Literal(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) => format!("s:{}", text),
                Err(_) => format!("h:{}", hex::encode(bytes)),
            },
            Operand::Hex(bytes) => format!("h:{}", hex::encode(bytes)),
            Operand::Buffer => format!("m:{}", BUFFER_SENTINEL),
            Operand::Slot(slot) => format!("m:{}", slot),
            Operand::Arg(index) => format!("a:{}", index),
            Operand::Read(ReadLen::Bounded(n)) => format!("r:{}", n),
            Operand::Read(ReadLen::Rest) => "r:*".to_string(),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_token())
    }
}

fn parse_int(token: &str, body: &str) -> Result<i64, ProofError> {
    body.parse::<i64>()
        .map_err(|_| ProofError::malformed(format!("expected an integer in '{}'", token)))
}

pub(crate) fn slot_from_int(index: i64) -> Result<SlotIndex, ProofError> {
    SlotIndex::try_from(index)
        .map_err(|_| ProofError::malformed(format!("invalid memory slot index {}", index)))
}

// =============================================================================
// INSTRUCTION
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// `op_cat` - ( operands... -- buffer' )
    Concat(Vec<Operand>),
    /// `op_sha256` - concatenates like `Concat`, then digests.
    Hash(Vec<Operand>),
    /// `op_rev`
    Reverse,
    /// `op_store <slot>` - copies the buffer into a slot.
    Store(SlotIndex),
    /// `op_load <slot>` - replaces the buffer with a slot.
    Load(SlotIndex),
    /// `op_set <operand>`
    Set(Operand),
    /// `op_swap <slot>`
    Swap(SlotIndex),
    /// `op_compose <template>` - the only assertion a program can make.
    Compose(Operand),
    /// `op_func <name> [ body ]`
    DefineFunction { name: String, body: Vec<Instruction> },
    /// `f_<name> operands...`
    Call { name: String, args: Vec<Operand> },
}

impl Instruction {
    /// Opcode name as it appears in the JSON form.
    pub fn opcode(&self) -> String {
        match self {
            Instruction::Concat(_) => OP_CAT.to_string(),
            Instruction::Hash(_) => OP_SHA256.to_string(),
            Instruction::Reverse => OP_REV.to_string(),
            Instruction::Store(_) => OP_STORE.to_string(),
            Instruction::Load(_) => OP_LOAD.to_string(),
            Instruction::Set(_) => OP_SET.to_string(),
            Instruction::Swap(_) => OP_SWAP.to_string(),
            Instruction::Compose(_) => OP_COMPOSE.to_string(),
            Instruction::DefineFunction { .. } => OP_FUNC.to_string(),
            Instruction::Call { name, .. } => format!("{}{}", CALL_PREFIX, name),
        }
    }

    /// Operands resolved by the executor for this instruction.
    ///
    /// Slot indices of store/load/swap are addresses, not operands.
    pub fn operands(&self) -> &[Operand] {
        match self {
            Instruction::Concat(ops) | Instruction::Hash(ops) => ops,
            Instruction::Call { args, .. } => args,
            Instruction::Set(op) | Instruction::Compose(op) => std::slice::from_ref(op),
            Instruction::Reverse
            | Instruction::Store(_)
            | Instruction::Load(_)
            | Instruction::Swap(_)
            | Instruction::DefineFunction { .. } => &[],
        }
    }

    /// Renders the instruction back into its JSON array form.
    pub fn to_json(&self) -> Value {
        let mut items = vec![Value::String(self.opcode())];
        match self {
            Instruction::Store(slot) | Instruction::Load(slot) | Instruction::Swap(slot) => {
                items.push(json!(slot));
            }
            Instruction::DefineFunction { name, body } => {
                items.push(Value::String(name.clone()));
                items.push(Value::Array(body.iter().map(Instruction::to_json).collect()));
            }
            _ => {
                items.extend(self.operands().iter().map(|op| Value::String(op.to_token())));
            }
        }
        Value::Array(items)
    }
}
