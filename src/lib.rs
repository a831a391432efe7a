//! # ProveBit proof engine
//!
//! Parses proof programs and replays them against a byte source to
//! re-derive the digest that was anchored for a file or directory.
//!
//! - [`proof`]: program representation, parser, encodings, disassembler
//! - [`runtime`]: the executor, its memory bank, byte source and compose matcher
//! - [`verify`]: comparing an execution against an expected root

pub mod error;
pub mod proof;
pub mod runtime;
pub mod verify;

pub use error::ProofError;
pub use proof::{Instruction, Operand, Program, ReadLen, parse, parse_str};
pub use runtime::{DigestOrder, Executor, ExecutorConfig};
pub use verify::{Verdict, verify};
