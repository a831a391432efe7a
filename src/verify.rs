use crate::error::ProofError;
use crate::proof::Program;
use crate::runtime::Executor;
use std::io::Read;
use tracing::info;

/// Outcome of checking a proof program against an anchored root.
#[derive(Debug)]
pub enum Verdict {
    /// The program reproduced the expected root.
    Holds,
    /// The program ran to completion but produced a different value.
    Mismatch { computed: Vec<u8> },
    /// A composition inside the program failed.
    Aborted(ProofError),
    /// The program itself is broken.
    Malformed(ProofError),
    /// Anything else: stream policy, resource limits, I/O.
    Failed(ProofError),
}

impl Verdict {
    pub fn holds(&self) -> bool {
        matches!(self, Verdict::Holds)
    }
}

/// Runs `program` against `source` and compares the result with
/// `expected_root` (typically the Merkle root anchored in the ledger).
pub fn verify<R: Read>(
    executor: &Executor,
    program: &Program,
    source: R,
    expected_root: &[u8],
) -> Verdict {
    let verdict = match executor.execute(program, source) {
        Ok(computed) if computed == expected_root => Verdict::Holds,
        Ok(computed) => Verdict::Mismatch { computed },
        Err(e) if e.is_abort() => Verdict::Aborted(e),
        Err(e) if e.is_malformed() => Verdict::Malformed(e),
        Err(e) => Verdict::Failed(e),
    };
    info!(holds = verdict.holds(), "proof verified");
    verdict
}
