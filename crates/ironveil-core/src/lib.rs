//! # ironveil-core
//!
//! **Random bytes you can defend, values you can trust.**
//!
//! `ironveil-core` is an in-process security-memory toolkit. It generates
//! cryptographically strong randomness from several independent entropy
//! sources, and it guards sensitive in-memory values against tampering.
//!
//! ## Quick Start
//!
//! ```no_run
//! use ironveil_core::{RandomGenerator, SecurityContext, ToolkitConfig};
//!
//! let ctx = SecurityContext::new(ToolkitConfig::default())?;
//!
//! // Fast, continuously reseeded bytes
//! let key = ctx.fast().get_bytes(32)?;
//! assert_eq!(key.len(), 32);
//!
//! // A value that alerts when it changes behind your back
//! let api_key = ctx.protect(String::from("s3cret"))?;
//! api_key.apply_changes(|k| k.push('!'))?;
//! assert_eq!(api_key.read()?, "s3cret!");
//! # Ok::<(), ironveil_core::VeilError>(())
//! ```
//!
//! ## Architecture
//!
//! Sources → EntropyHasher → SlowRandomGenerator (XOR + distinctness check)
//! → FastRandomGenerator (digest stretching, soft/hard reseeds) → Output
//!
//! - **Slow**: every round draws from every source, conditions each draw with
//!   its own digests and XORs the lot. Two identical intermediate arrays abort
//!   the call before a single byte is emitted.
//! - **Fast**: a digest-stretching PRNG seeded from the slow generator, with a
//!   background reseed past the soft threshold and a synchronous one past the
//!   hard threshold.
//!
//! Every source implements the [`EntropySource`] trait; every generator
//! implements [`RandomGenerator`].
//!
//! ## Injection detection
//!
//! [`ProtectedContainer`] keeps stamps of its value's state (canonical
//! serialisation) and code (type fingerprint). Reads verify them, and the
//! only sanctioned mutation path, [`ProtectedContainer::apply_changes`],
//! re-baselines them. Mismatches go to an [`AlertChannel`].

pub mod canonical;
pub mod config;
pub mod context;
pub mod digest;
pub mod entropy_hasher;
pub mod error;
pub mod fast;
pub mod injection;
pub mod protected;
pub mod quality;
pub mod random;
pub mod slow;
pub mod source;
pub mod sources;
pub mod stamp;
pub mod stretch;

pub use config::{AlertKind, ProtectionDefaults, ReseedPolicy, ToolkitConfig};
pub use context::SecurityContext;
pub use digest::{DigestHasher, RustCryptoHasher};
pub use entropy_hasher::EntropyHasher;
pub use error::{Result, VeilError};
pub use fast::{FastRandomGenerator, SlowSource};
pub use injection::{AlertChannel, AlertSink, InjectionDetector, InjectionMessage, InjectionType};
pub use protected::{ProtectedContainer, ProtectionMode};
pub use quality::{QualityReport, quick_min_entropy, quick_quality, quick_shannon};
pub use random::RandomGenerator;
pub use slow::{SlowRandomGenerator, SourceSummary};
pub use source::{EntropySource, SourceCategory, SourceInfo};
pub use stamp::{Protectable, Stamp, StampProvider};
pub use stretch::DigestRandomGenerator;

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
