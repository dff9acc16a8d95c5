//! Entropy source implementations.

pub mod helpers;

pub mod fixed;
pub mod os;
pub mod persisted_pool;
pub mod thread_jitter;

pub use fixed::{FixedSource, SequenceSource};
pub use os::OsEntropySource;
pub use persisted_pool::PersistedPoolSource;
pub use thread_jitter::ThreadJitterSource;
