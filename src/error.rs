use thiserror::Error;

/// Every way parsing or executing a proof program can fail.
///
/// `Malformed` and `StreamPolicy` mean the program (or the way it is being
/// run) is broken. `Abort` is the deliberate "proof does not hold" signal
/// raised by `op_compose`.
#[derive(Debug, Error)]
pub enum ProofError {
    #[error("malformed program: {0}")]
    Malformed(String),

    #[error("stream policy violation: {0}")]
    StreamPolicy(String),

    /// Raised by a failed composition. `call_stack` lists the functions the
    /// abort unwound through, innermost first.
    #[error("program abort: {reason}{}", format_call_stack(.call_stack))]
    Abort {
        reason: String,
        call_stack: Vec<String>,
    },

    #[error("call depth limit exceeded ({limit}) - possible infinite recursion in '{function}'")]
    CallDepth { limit: usize, function: String },

    #[error("execution step limit exceeded ({limit})")]
    StepLimit { limit: usize },

    #[error("buffer limit exceeded: {len} bytes, at most {limit} allowed")]
    BufferLimit { limit: usize, len: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid encoded program: {0}")]
    Decode(#[from] postcard::Error),
}

impl ProofError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        ProofError::Malformed(msg.into())
    }

    pub fn stream_policy(msg: impl Into<String>) -> Self {
        ProofError::StreamPolicy(msg.into())
    }

    pub fn abort(reason: impl Into<String>) -> Self {
        ProofError::Abort {
            reason: reason.into(),
            call_stack: Vec::new(),
        }
    }

    /// Records that the error unwound out of the function `name`.
    ///
    /// Only aborts carry a call stack; other errors pass through untouched.
    pub fn in_function(mut self, name: &str) -> Self {
        if let ProofError::Abort { call_stack, .. } = &mut self {
            call_stack.push(name.to_string());
        }
        self
    }

    /// Prefixes a parse-time diagnostic with where it happened.
    pub fn located(self, location: impl std::fmt::Display) -> Self {
        match self {
            ProofError::Malformed(msg) => ProofError::Malformed(format!("{}: {}", location, msg)),
            ProofError::StreamPolicy(msg) => {
                ProofError::StreamPolicy(format!("{}: {}", location, msg))
            }
            other => other,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, ProofError::Malformed(_) | ProofError::Decode(_))
    }

    pub fn is_abort(&self) -> bool {
        matches!(self, ProofError::Abort { .. })
    }

    pub fn call_stack(&self) -> &[String] {
        match self {
            ProofError::Abort { call_stack, .. } => call_stack,
            _ => &[],
        }
    }
}

fn format_call_stack(call_stack: &[String]) -> String {
    let mut out = String::new();
    if !call_stack.is_empty() {
        out.push_str("\n  call stack:");
        for (i, frame) in call_stack.iter().enumerate() {
            out.push_str(&format!("\n    {}: {}", i, frame));
        }
    }
    out
}
