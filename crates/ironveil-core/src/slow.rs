//! Strong-but-slow generator combining several independent entropy sources.
//!
//! Architecture:
//! 1. Every round draws one digest's worth of raw bytes from *every* source
//! 2. Each draw is conditioned by its own digest hashers
//! 3. All hasher outputs are XOR-combined, so the result is at least as
//!    unpredictable as the best contributing source
//! 4. Every intermediate array is cross-checked for pairwise uniqueness; a
//!    stuck or cloned source aborts the call before any byte is emitted
//! 5. Thread-safe: one lock serialises whole rounds

use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use zeroize::Zeroizing;

use crate::digest::{self, xor_into};
use crate::entropy_hasher::EntropyHasher;
use crate::error::{Result, VeilError};
use crate::random::RandomGenerator;
use crate::sources::{OsEntropySource, PersistedPoolSource, ThreadJitterSource};

/// Multi-source entropy combiner with pairwise distinctness validation.
pub struct SlowRandomGenerator {
    hashers: Mutex<Vec<EntropyHasher>>,
    digest_size_bytes: usize,
    disposed: AtomicBool,
    total_output: AtomicU64,
}

impl SlowRandomGenerator {
    /// Build a generator from a fixed, non-empty set of entropy hashers that
    /// all share one digest size.
    pub fn new(hashers: Vec<EntropyHasher>) -> Result<Self> {
        let Some(first) = hashers.first() else {
            return Err(VeilError::InvalidConfiguration(
                "slow random generator needs at least one entropy hasher".into(),
            ));
        };
        let digest_size_bytes = first.digest_size_bytes();
        if let Some(odd) = hashers
            .iter()
            .find(|eh| eh.digest_size_bytes() != digest_size_bytes)
        {
            return Err(VeilError::InvalidConfiguration(format!(
                "entropy hasher for `{}` uses {}-byte digests, expected {}",
                odd.source().name(),
                odd.digest_size_bytes(),
                digest_size_bytes
            )));
        }
        Ok(Self {
            hashers: Mutex::new(hashers),
            digest_size_bytes,
            disposed: AtomicBool::new(false),
            total_output: AtomicU64::new(0),
        })
    }

    /// OS CSPRNG (SHA-512 ⊕ SHA3-512) and thread scheduling jitter (SHA-512).
    pub fn system_default() -> Result<Self> {
        Self::new(Self::system_hashers()?)
    }

    /// [`system_default`](Self::system_default) plus a persisted entropy pool
    /// (SHA3-512) at `path`, created if missing.
    pub fn system_with_pool(path: impl AsRef<Path>) -> Result<Self> {
        let mut hashers = Self::system_hashers()?;
        let pool = PersistedPoolSource::open_or_create(path)?;
        hashers.push(EntropyHasher::single(Arc::new(pool), digest::sha3_512())?);
        Self::new(hashers)
    }

    fn system_hashers() -> Result<Vec<EntropyHasher>> {
        Ok(vec![
            EntropyHasher::new(
                Arc::new(OsEntropySource),
                vec![digest::sha512(), digest::sha3_512()],
            )?,
            EntropyHasher::single(Arc::new(ThreadJitterSource), digest::sha512())?,
        ])
    }

    /// Size of one combined output block.
    pub fn digest_size_bytes(&self) -> usize {
        self.digest_size_bytes
    }

    /// Number of registered entropy hashers (zero after disposal).
    pub fn source_count(&self) -> usize {
        self.hashers.lock().unwrap().len()
    }

    /// Snapshot of the configured sources and their hashers.
    pub fn source_summaries(&self) -> Vec<SourceSummary> {
        self.hashers
            .lock()
            .unwrap()
            .iter()
            .map(|eh| {
                let info = eh.source().info();
                SourceSummary {
                    name: info.name.to_string(),
                    description: info.description.to_string(),
                    category: info.category.to_string(),
                    hashers: eh.hasher_names(),
                }
            })
            .collect()
    }

    /// Total bytes emitted so far.
    pub fn total_output(&self) -> u64 {
        self.total_output.load(Ordering::Relaxed)
    }

    /// Fill `buf` with combined, cross-validated entropy.
    ///
    /// On [`VeilError::CryptographicIntegrity`] `buf` is left untouched.
    pub fn fill(&self, buf: &mut [u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        let hashers = self.hashers.lock().unwrap();
        if self.disposed.load(Ordering::Acquire) {
            return Err(VeilError::Disposed("slow random generator"));
        }

        let mut staged = Zeroizing::new(Vec::with_capacity(buf.len()));
        while staged.len() < buf.len() {
            let mut witnesses = Vec::new();
            let mut final_output = Zeroizing::new(vec![0u8; self.digest_size_bytes]);
            for eh in hashers.iter() {
                let output = eh.draw(&mut witnesses)?;
                xor_into(&mut final_output, &output);
            }
            if hashers.len() > 1 {
                witnesses.push(final_output.clone());
            }
            ensure_pairwise_distinct(&witnesses)?;

            let take = self.digest_size_bytes.min(buf.len() - staged.len());
            staged.extend_from_slice(&final_output[..take]);
        }

        buf.copy_from_slice(&staged);
        self.total_output
            .fetch_add(buf.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    /// Release every source. Idempotent.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.hashers.lock().unwrap().clear();
        log::debug!("slow random generator disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl RandomGenerator for SlowRandomGenerator {
    fn fill(&self, buf: &mut [u8]) -> Result<()> {
        SlowRandomGenerator::fill(self, buf)
    }
}

/// Fail if any two arrays are bit-for-bit identical.
fn ensure_pairwise_distinct(arrays: &[Zeroizing<Vec<u8>>]) -> Result<()> {
    for (i, a) in arrays.iter().enumerate() {
        for (j, b) in arrays.iter().enumerate().skip(i + 1) {
            if a[..] == b[..] {
                log::warn!("entropy cross-check failed: intermediate arrays {i} and {j} are identical");
                return Err(VeilError::CryptographicIntegrity(format!(
                    "entropy intermediates {i} and {j} are identical; a source is stuck or duplicated"
                )));
            }
        }
    }
    Ok(())
}

/// Description of one configured source.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SourceSummary {
    pub name: String,
    pub description: String,
    pub category: String,
    pub hashers: Vec<&'static str>,
}
