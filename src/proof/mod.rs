//! # Proof programs
//!
//! A proof program is an ordered list of instructions that recomputes a
//! digest from literal data, scratch memory and an external byte source.
//!
//! ## Representation
//!
//! The portable form is JSON, an array of instruction arrays:
//!
//! ```text
//! [["op_func", "cats", [["op_cat", "a:1", "s:s"]]],
//!  ["op_sha256", "s:a", "m:-1", "s:b"],
//!  ["f_cats", "m:-1"]]
//! ```
//!
//! Operand tokens carry a prefix: `s:` text, `h:` hex, `m:` memory (`m:-1`
//! is the current buffer), `a:` positional argument, `r:` stream read.
//! Parsing turns this into typed `Instruction`s once; nothing downstream
//! deals with raw tokens.

pub mod disasm;
pub mod ir;
pub mod op;
pub mod parse;
mod wire;

pub use ir::{FunctionTable, MAX_NESTING, Program};
pub use op::{Instruction, Operand, ReadLen, SlotIndex};
pub use parse::{parse, parse_str};
