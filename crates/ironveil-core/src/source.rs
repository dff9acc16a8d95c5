//! Abstract entropy source trait.
//!
//! Every entropy provider implements [`EntropySource`], which exposes metadata
//! via [`SourceInfo`] and a `fill` primitive. Sources are shared read-many
//! (`Arc<dyn EntropySource>`), so stateful sources synchronise internally.

use zeroize::Zeroizing;

use crate::error::Result;

/// Category of entropy source based on where its unpredictability comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceCategory {
    /// Operating-system CSPRNG.
    System,
    /// OS scheduler nondeterminism.
    Scheduling,
    /// Entropy carried across process runs on disk.
    Persisted,
    /// Fixed or scripted output, for tests and diagnostics.
    Deterministic,
}

impl std::fmt::Display for SourceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::Scheduling => write!(f, "scheduling"),
            Self::Persisted => write!(f, "persisted"),
            Self::Deterministic => write!(f, "deterministic"),
        }
    }
}

/// Metadata about an entropy source.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    /// Unique identifier (e.g. `"os_csprng"`).
    pub name: &'static str,
    /// One-line human-readable description.
    pub description: &'static str,
    /// Source category for classification.
    pub category: SourceCategory,
}

/// Trait that every entropy source must implement.
pub trait EntropySource: Send + Sync {
    /// Source metadata.
    fn info(&self) -> &SourceInfo;

    /// Fill `buf` completely with fresh entropy.
    fn fill(&self, buf: &mut [u8]) -> Result<()>;

    /// Fill `buf` with fresh entropy containing no zero bytes.
    fn fill_non_zero(&self, buf: &mut [u8]) -> Result<()> {
        fill_non_zero_from(buf, |chunk| self.fill(chunk))
    }

    /// Convenience: name from info.
    fn name(&self) -> &'static str {
        self.info().name
    }
}

/// Satisfy `buf` with non-zero bytes drawn through `fill`.
///
/// Each round over-requests about 5% so that a typical round finishes the job
/// even after discarding zeros; leftovers are wiped.
pub fn fill_non_zero_from<F>(buf: &mut [u8], mut fill: F) -> Result<()>
where
    F: FnMut(&mut [u8]) -> Result<()>,
{
    let mut written = 0;
    while written < buf.len() {
        let remaining = buf.len() - written;
        let request = remaining + remaining / 20 + 1;
        let mut scratch = Zeroizing::new(vec![0u8; request]);
        fill(&mut scratch)?;
        for &b in scratch.iter().filter(|&&b| b != 0) {
            if written == buf.len() {
                break;
            }
            buf[written] = b;
            written += 1;
        }
    }
    Ok(())
}
