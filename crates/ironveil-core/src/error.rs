//! Error taxonomy shared by every component of the crate.

use thiserror::Error;

use crate::injection::InjectionMessage;

/// Errors produced by entropy generation, stamping and protected containers.
#[derive(Debug, Error)]
pub enum VeilError {
    /// A component was assembled from a defective configuration. Fatal; the
    /// component is never handed out.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The caller passed an out-of-range count, index or bound.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Entropy cross-validation or a persisted pool checksum failed. No output
    /// was emitted and the operation is not retried.
    #[error("cryptographic integrity failure: {0}")]
    CryptographicIntegrity(String),

    /// Mutation attempted on a container that was made read-only.
    #[error("the protected value is read-only")]
    ReadOnlyViolation,

    /// The requested protection is not available for this value shape.
    #[error("unsupported type `{type_name}`: {reason}")]
    UnsupportedType {
        type_name: &'static str,
        reason: String,
    },

    /// Operation attempted after disposal.
    #[error("{0} has been disposed")]
    Disposed(&'static str),

    /// Tampering detected while the alert channel is set to raise.
    #[error("injection detected: {0}")]
    InjectionDetected(InjectionMessage),

    /// An entropy source could not produce bytes.
    #[error("entropy source `{source_name}` failed: {reason}")]
    SourceFailure {
        source_name: &'static str,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("configuration parse error: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, VeilError>;
