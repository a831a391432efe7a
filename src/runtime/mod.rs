pub mod compose;
pub mod executor;
pub mod memory;
pub mod source;

pub use executor::{DEFAULT_MAX_BUFFER_LEN, DigestOrder, Executor, ExecutorConfig, MAX_CALL_DEPTH};
pub use memory::MemoryBank;
pub use source::ByteSource;
