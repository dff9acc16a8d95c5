//! Operating-system CSPRNG.

use crate::error::{Result, VeilError};
use crate::source::{EntropySource, SourceCategory, SourceInfo};

/// Reads from the OS CSPRNG through the `getrandom` crate
/// (`getrandom(2)`, `getentropy`, `BCryptGenRandom`, ...).
pub struct OsEntropySource;

static OS_INFO: SourceInfo = SourceInfo {
    name: "os_csprng",
    description: "Operating-system cryptographic random number generator",
    category: SourceCategory::System,
};

impl EntropySource for OsEntropySource {
    fn info(&self) -> &SourceInfo {
        &OS_INFO
    }

    fn fill(&self, buf: &mut [u8]) -> Result<()> {
        getrandom::fill(buf).map_err(|e| VeilError::SourceFailure {
            source_name: OS_INFO.name,
            reason: e.to_string(),
        })
    }
}
