//! One entropy source paired with the digests that condition it.

use std::sync::Arc;

use zeroize::Zeroizing;

use crate::digest::{DigestHasher, xor_into};
use crate::error::{Result, VeilError};
use crate::source::EntropySource;

/// Pairs an [`EntropySource`] with one or more [`DigestHasher`]s.
///
/// A draw takes exactly one digest's worth of raw bytes from the source,
/// hashes them with every configured hasher and XOR-combines the digests
/// into a single digest-sized output.
pub struct EntropyHasher {
    source: Arc<dyn EntropySource>,
    hashers: Vec<Box<dyn DigestHasher>>,
    digest_size_bytes: usize,
}

impl EntropyHasher {
    /// Pair `source` with `hashers`. All hashers must share one digest size.
    pub fn new(source: Arc<dyn EntropySource>, hashers: Vec<Box<dyn DigestHasher>>) -> Result<Self> {
        let Some(first) = hashers.first() else {
            return Err(VeilError::InvalidConfiguration(format!(
                "entropy hasher for `{}` has no digest hashers",
                source.name()
            )));
        };
        let digest_size_bytes = first.digest_size_bytes();
        if digest_size_bytes == 0 {
            return Err(VeilError::InvalidConfiguration(format!(
                "digest hasher `{}` reports a zero digest size",
                first.name()
            )));
        }
        if let Some(odd) = hashers
            .iter()
            .find(|h| h.digest_size_bytes() != digest_size_bytes)
        {
            return Err(VeilError::InvalidConfiguration(format!(
                "digest hasher `{}` produces {} bytes, expected {}",
                odd.name(),
                odd.digest_size_bytes(),
                digest_size_bytes
            )));
        }
        Ok(Self {
            source,
            hashers,
            digest_size_bytes,
        })
    }

    /// Convenience for the common single-digest case.
    pub fn single(source: Arc<dyn EntropySource>, hasher: Box<dyn DigestHasher>) -> Result<Self> {
        Self::new(source, vec![hasher])
    }

    pub fn source(&self) -> &Arc<dyn EntropySource> {
        &self.source
    }

    pub fn digest_size_bytes(&self) -> usize {
        self.digest_size_bytes
    }

    pub fn hasher_names(&self) -> Vec<&'static str> {
        self.hashers.iter().map(|h| h.name()).collect()
    }

    /// Perform one draw and return the digest-sized hasher output.
    ///
    /// Every intermediate array that must stay pairwise distinct is appended
    /// to `witnesses`: the raw draw, each digest and, when more than one
    /// digest was combined, the combined output.
    pub(crate) fn draw(&self, witnesses: &mut Vec<Zeroizing<Vec<u8>>>) -> Result<Zeroizing<Vec<u8>>> {
        let mut raw = Zeroizing::new(vec![0u8; self.digest_size_bytes]);
        self.source.fill(&mut raw)?;

        let mut output = Zeroizing::new(vec![0u8; self.digest_size_bytes]);
        let mut digests = Vec::with_capacity(self.hashers.len());
        for hasher in &self.hashers {
            let digest = Zeroizing::new(hasher.hash(&raw));
            if digest.len() != self.digest_size_bytes {
                return Err(VeilError::InvalidConfiguration(format!(
                    "digest hasher `{}` returned {} bytes, expected {}",
                    hasher.name(),
                    digest.len(),
                    self.digest_size_bytes
                )));
            }
            xor_into(&mut output, &digest);
            digests.push(digest);
        }

        witnesses.push(raw);
        let combined = digests.len() > 1;
        witnesses.extend(digests);
        if combined {
            witnesses.push(output.clone());
        }
        Ok(output)
    }
}
