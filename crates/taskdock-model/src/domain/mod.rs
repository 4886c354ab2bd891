mod kv;
pub use kv::KeyValue;

mod env;
pub use env::Env;

mod flag;
pub use flag::Flag;

mod labels;
pub use labels::Labels;

mod timestamp;
pub use timestamp::Timestamp;

mod constants;
pub use constants::*;

/// Timeout value in milliseconds.
///
/// Used wherever a caller has to supply an explicit time limit.
pub type TimeoutMs = u64;
