use crate::error::ProofError;
use crate::proof::{FunctionTable, Instruction, Operand, Program, ReadLen};
use crate::runtime::compose::{self, WILDCARD};
use crate::runtime::memory::MemoryBank;
use crate::runtime::source::ByteSource;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Read;
use tracing::{debug, info, trace, warn};

/// Byte order of the digests produced by `op_sha256`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestOrder {
    /// SHA-256 output as-is.
    #[default]
    Natural,
    /// Reversed, the order block-chain tooling displays hashes in.
    Reversed,
}

/// Hard ceiling on call depth. Calls recurse on the native stack, so a
/// configured `max_call_depth` above this is clamped down to it.
pub const MAX_CALL_DEPTH: usize = 512;

pub const DEFAULT_MAX_BUFFER_LEN: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Allow pulling the whole remaining source into memory in one go.
    pub allow_unbounded_reads: bool,
    /// Clamped to `MAX_CALL_DEPTH`.
    pub max_call_depth: usize,
    pub max_steps: Option<usize>,
    /// Largest buffer, in bytes, any instruction may produce.
    pub max_buffer_len: usize,
    pub digest_order: DigestOrder,
}

impl ExecutorConfig {
    /// The call depth actually enforced.
    pub fn call_depth_limit(&self) -> usize {
        self.max_call_depth.min(MAX_CALL_DEPTH)
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        ExecutorConfig {
            allow_unbounded_reads: false,
            max_call_depth: 256,
            max_steps: None,
            max_buffer_len: DEFAULT_MAX_BUFFER_LEN,
            digest_order: DigestOrder::Natural,
        }
    }
}

/// Runs proof programs against a byte source.
///
/// The executor only holds configuration; each `execute` call builds its own
/// memory bank and source cursor, so one executor can run many programs.
#[derive(Debug, Clone, Default)]
pub struct Executor {
    config: ExecutorConfig,
}

impl Executor {
    pub fn new() -> Self {
        Self::with_config(ExecutorConfig::default())
    }

    pub fn with_config(config: ExecutorConfig) -> Self {
        if config.max_call_depth > MAX_CALL_DEPTH {
            warn!(
                requested = config.max_call_depth,
                limit = MAX_CALL_DEPTH,
                "max_call_depth clamped"
            );
        }
        Self { config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Executes `program` against `source` and returns the final buffer.
    ///
    /// Any error aborts the whole run; no partial result is returned.
    pub fn execute<R: Read>(&self, program: &Program, source: R) -> Result<Vec<u8>, ProofError> {
        info!(
            instructions = program.len(),
            functions = program.functions().len(),
            "executing proof program"
        );

        let mut ctx = Context::new(&self.config, program.functions(), source);
        let mut frame = Frame::top_level();

        let result = ctx
            .exec_block(&mut frame, program.instructions())
            .and_then(|()| ctx.take_buffer(&mut frame));

        match &result {
            Ok(out) => info!(
                bytes = out.len(),
                steps = ctx.steps,
                consumed = ctx.source.consumed(),
                "proof program finished"
            ),
            Err(e) if e.is_abort() => warn!(error = %e, "proof program aborted"),
            Err(e) => warn!(error = %e, "proof program failed"),
        }
        result
    }

    /// Executes against an in-memory source.
    pub fn execute_bytes(&self, program: &Program, source: &[u8]) -> Result<Vec<u8>, ProofError> {
        self.execute(program, source)
    }
}

// =============================================================================
// EXECUTION STATE
// =============================================================================

/// The current buffer.
#[derive(Debug)]
enum Buffer {
    /// Stands for the unread remainder of the source; pulled in only when an
    /// instruction needs its bytes.
    Pending,
    Bytes(Vec<u8>),
}

/// One activation: the top-level program or a function call.
struct Frame {
    buffer: Buffer,
    /// Positional arguments; `None` at top level.
    args: Option<Vec<Vec<u8>>>,
}

impl Frame {
    fn top_level() -> Self {
        Frame {
            buffer: Buffer::Pending,
            args: None,
        }
    }

    /// A callee starts with an empty buffer.
    fn call(args: Vec<Vec<u8>>) -> Self {
        Frame {
            buffer: Buffer::Bytes(Vec::new()),
            args: Some(args),
        }
    }

    fn arg(&self, index: usize) -> Result<Vec<u8>, ProofError> {
        let args = self.args.as_ref().ok_or_else(|| {
            ProofError::malformed(format!(
                "positional argument a:{} used outside a function body",
                index
            ))
        })?;
        args.get(index.wrapping_sub(1)).cloned().ok_or_else(|| {
            ProofError::malformed(format!(
                "positional argument a:{} out of range ({} supplied)",
                index,
                args.len()
            ))
        })
    }
}

/// Mutable state shared by every frame of one execution.
struct Context<'a, R> {
    config: &'a ExecutorConfig,
    functions: &'a FunctionTable,
    memory: MemoryBank,
    source: ByteSource<R>,
    call_depth: usize,
    steps: usize,
}

impl<'a, R: Read> Context<'a, R> {
    fn new(config: &'a ExecutorConfig, functions: &'a FunctionTable, source: R) -> Self {
        Context {
            config,
            functions,
            memory: MemoryBank::new(),
            source: ByteSource::new(source),
            call_depth: 0,
            steps: 0,
        }
    }

    fn check_limits(&mut self) -> Result<(), ProofError> {
        self.steps += 1;

        if let Some(max) = self.config.max_steps {
            if self.steps > max {
                return Err(ProofError::StepLimit { limit: max });
            }
        }
        Ok(())
    }

    fn check_buffer_len(&self, len: usize) -> Result<(), ProofError> {
        if len > self.config.max_buffer_len {
            return Err(ProofError::BufferLimit {
                limit: self.config.max_buffer_len,
                len,
            });
        }
        Ok(())
    }

    fn exec_block(&mut self, frame: &mut Frame, instructions: &[Instruction]) -> Result<(), ProofError> {
        for inst in instructions {
            self.check_limits()?;
            trace!(opcode = %inst.opcode(), depth = self.call_depth, "step");
            self.exec_instruction(frame, inst)?;
            if let Buffer::Bytes(bytes) = &frame.buffer {
                self.check_buffer_len(bytes.len())?;
            }
        }
        Ok(())
    }

    fn exec_instruction(&mut self, frame: &mut Frame, inst: &Instruction) -> Result<(), ProofError> {
        // Reading the source explicitly consumes it from the front, so the
        // pending remainder no longer exists: the buffer is empty instead.
        if matches!(frame.buffer, Buffer::Pending) && reads_source(inst.operands()) {
            trace!("explicit read discards pending buffer");
            frame.buffer = Buffer::Bytes(Vec::new());
        }

        match inst {
            Instruction::Concat(operands) => {
                let value = self.concat(frame, operands)?;
                frame.buffer = Buffer::Bytes(value);
            }

            Instruction::Hash(operands) => {
                let digest = self.hash(frame, operands)?;
                frame.buffer = Buffer::Bytes(digest);
            }

            Instruction::Reverse => {
                self.buffer_mut(frame)?.reverse();
            }

            Instruction::Store(slot) => {
                let value = self.buffer_mut(frame)?.clone();
                self.memory.store(*slot, value);
            }

            Instruction::Load(slot) => {
                frame.buffer = Buffer::Bytes(self.memory.load(*slot));
            }

            Instruction::Set(operand) => {
                let value = self.resolve(frame, operand)?;
                frame.buffer = Buffer::Bytes(value);
            }

            Instruction::Swap(slot) => {
                let mut value = self.take_buffer(frame)?;
                self.memory.swap(*slot, &mut value);
                frame.buffer = Buffer::Bytes(value);
            }

            Instruction::Compose(template) => {
                let template = self.resolve(frame, template)?;
                let buffer = self.buffer_mut(frame)?;
                let composed = compose::compose(buffer, &template, WILDCARD)
                    .map_err(|m| ProofError::abort(format!("composition failed: {}", m)))?;
                frame.buffer = Buffer::Bytes(composed);
            }

            // Already registered in the function table at parse time.
            Instruction::DefineFunction { .. } => {}

            Instruction::Call { name, args } => {
                let values = args
                    .iter()
                    .map(|arg| self.resolve(frame, arg))
                    .collect::<Result<Vec<_>, _>>()?;
                frame.buffer = Buffer::Bytes(self.call(name, values)?);
            }
        }
        Ok(())
    }

    fn call(&mut self, name: &str, args: Vec<Vec<u8>>) -> Result<Vec<u8>, ProofError> {
        let functions = self.functions;
        let body = functions
            .get(name)
            .ok_or_else(|| ProofError::malformed(format!("call to undefined function '{}'", name)))?;

        let limit = self.config.call_depth_limit();
        if self.call_depth >= limit {
            return Err(ProofError::CallDepth {
                limit,
                function: name.to_string(),
            });
        }

        debug!(function = name, args = args.len(), depth = self.call_depth + 1, "call");

        let mut callee = Frame::call(args);
        self.call_depth += 1;
        let result = self.exec_block(&mut callee, body);
        self.call_depth -= 1;
        result.map_err(|e| e.in_function(name))?;

        self.take_buffer(&mut callee)
    }

    // =========================================================================
    // OPERAND RESOLUTION
    // =========================================================================

    /// Resolves one operand to owned bytes. A buffer reference is a copy, so
    /// later changes to the buffer never show through it.
    fn resolve(&mut self, frame: &mut Frame, operand: &Operand) -> Result<Vec<u8>, ProofError> {
        match operand {
            Operand::Literal(bytes) | Operand::Hex(bytes) => Ok(bytes.clone()),
            Operand::Buffer => Ok(self.buffer_mut(frame)?.clone()),
            Operand::Slot(slot) => Ok(self.memory.load(*slot)),
            Operand::Arg(index) => frame.arg(*index),
            Operand::Read(ReadLen::Bounded(len)) => Ok(self.source.read_up_to(*len)?),
            Operand::Read(ReadLen::Rest) => {
                if !self.config.allow_unbounded_reads {
                    return Err(ProofError::stream_policy(
                        "r:* requests the whole remaining stream but unbounded reads are disabled",
                    ));
                }
                Ok(self.source.read_rest()?)
            }
        }
    }

    /// Concatenation shared by `op_cat` and `op_sha256`: with no explicit
    /// `m:-1` the buffer is implicitly prepended.
    fn concat(&mut self, frame: &mut Frame, operands: &[Operand]) -> Result<Vec<u8>, ProofError> {
        let mut out = Vec::new();
        if !references_buffer(operands) {
            out.extend_from_slice(self.buffer_mut(frame)?);
        }
        for operand in operands {
            let bytes = self.resolve(frame, operand)?;
            self.check_buffer_len(out.len() + bytes.len())?;
            out.extend_from_slice(&bytes);
        }
        Ok(out)
    }

    /// Digests the same byte sequence `concat` would build.
    ///
    /// A pending buffer referenced exactly once is streamed from the source
    /// straight into the hasher, so large sources are hashed without being
    /// held in memory.
    fn hash(&mut self, frame: &mut Frame, operands: &[Operand]) -> Result<Vec<u8>, ProofError> {
        let implicit = !references_buffer(operands);
        let buffer_refs = operands.iter().filter(|op| **op == Operand::Buffer).count() + usize::from(implicit);
        let stream = buffer_refs == 1 && matches!(frame.buffer, Buffer::Pending);

        let mut hasher = Sha256::new();
        if implicit {
            self.digest_buffer(frame, &mut hasher, stream)?;
        }
        for operand in operands {
            match operand {
                Operand::Buffer => self.digest_buffer(frame, &mut hasher, stream)?,
                other => {
                    let bytes = self.resolve(frame, other)?;
                    hasher.update(&bytes);
                }
            }
        }

        let mut digest = hasher.finalize().to_vec();
        if self.config.digest_order == DigestOrder::Reversed {
            digest.reverse();
        }
        Ok(digest)
    }

    fn digest_buffer(&mut self, frame: &mut Frame, hasher: &mut Sha256, stream: bool) -> Result<(), ProofError> {
        if stream && matches!(frame.buffer, Buffer::Pending) {
            let copied = self.source.copy_rest_into(hasher)?;
            trace!(bytes = copied, "streamed source into digest");
        } else {
            hasher.update(self.buffer_mut(frame)?);
        }
        Ok(())
    }

    // =========================================================================
    // BUFFER ACCESS
    // =========================================================================

    /// Pulls a pending buffer in from the source.
    ///
    /// With unbounded reads disabled this only succeeds when nothing is left
    /// to read.
    fn materialize(&mut self, frame: &mut Frame) -> Result<(), ProofError> {
        if let Buffer::Pending = frame.buffer {
            let bytes = if self.config.allow_unbounded_reads {
                self.source.read_rest()?
            } else if self.source.is_exhausted()? {
                Vec::new()
            } else {
                return Err(ProofError::stream_policy(
                    "instruction needs the whole input stream buffered but unbounded reads are disabled",
                ));
            };
            frame.buffer = Buffer::Bytes(bytes);
        }
        Ok(())
    }

    fn buffer_mut<'f>(&mut self, frame: &'f mut Frame) -> Result<&'f mut Vec<u8>, ProofError> {
        self.materialize(frame)?;
        match &mut frame.buffer {
            Buffer::Bytes(bytes) => Ok(bytes),
            Buffer::Pending => Err(ProofError::stream_policy("buffer could not be materialized")),
        }
    }

    fn take_buffer(&mut self, frame: &mut Frame) -> Result<Vec<u8>, ProofError> {
        Ok(std::mem::take(self.buffer_mut(frame)?))
    }
}

fn reads_source(operands: &[Operand]) -> bool {
    operands.iter().any(|op| matches!(op, Operand::Read(_)))
}

fn references_buffer(operands: &[Operand]) -> bool {
    operands.iter().any(|op| *op == Operand::Buffer)
}
