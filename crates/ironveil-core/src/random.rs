//! Common interface of the slow and fast generators.

use crate::error::{Result, VeilError};
use crate::source::fill_non_zero_from;

/// A thread-safe source of cryptographically strong random bytes.
///
/// Only [`fill`](Self::fill) is required; everything else is derived from it.
pub trait RandomGenerator: Send + Sync {
    /// Fill `buf` completely. No-op on an empty buffer.
    fn fill(&self, buf: &mut [u8]) -> Result<()>;

    /// Fill `buf` with random bytes none of which is zero, for consumers that
    /// treat zero as a terminator.
    fn fill_non_zero(&self, buf: &mut [u8]) -> Result<()> {
        fill_non_zero_from(buf, |chunk| self.fill(chunk))
    }

    /// Allocate and return `n` random bytes.
    fn get_bytes(&self, n: usize) -> Result<Vec<u8>> {
        let mut out = vec![0u8; n];
        self.fill(&mut out)?;
        Ok(out)
    }

    fn next_u32(&self) -> Result<u32> {
        let mut b = [0u8; 4];
        self.fill(&mut b)?;
        Ok(u32::from_le_bytes(b))
    }

    fn next_u64(&self) -> Result<u64> {
        let mut b = [0u8; 8];
        self.fill(&mut b)?;
        Ok(u64::from_le_bytes(b))
    }

    fn next_bool(&self) -> Result<bool> {
        let mut b = [0u8; 1];
        self.fill(&mut b)?;
        Ok(b[0] & 1 == 1)
    }

    /// Uniform integer in `min..=max`, without modulo bias.
    fn next_in_range(&self, min: i64, max: i64) -> Result<i64> {
        if min > max {
            return Err(VeilError::InvalidArgument(format!(
                "empty range: min {min} > max {max}"
            )));
        }
        let span = (max as i128 - min as i128 + 1) as u128;
        let space = 1u128 << 64;
        if span == space {
            return Ok(self.next_u64()? as i64);
        }
        // Largest multiple of `span` that fits in 64 bits; draws above it are
        // rejected.
        let zone = space - space % span;
        loop {
            let v = self.next_u64()? as u128;
            if v < zone {
                return Ok((min as i128 + (v % span) as i128) as i64);
            }
        }
    }
}
