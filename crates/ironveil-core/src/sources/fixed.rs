//! Deterministic sources for diagnostics and tests.
//!
//! These provide no entropy at all. They exist so that the mixing engine can be
//! exercised against known inputs, including deliberately broken ones (a stuck
//! source, two cloned sources).

use std::sync::Mutex;

use crate::error::Result;
use crate::source::{EntropySource, SourceCategory, SourceInfo};

/// Repeats a fixed byte pattern on every draw.
pub struct FixedSource {
    info: SourceInfo,
    pattern: Vec<u8>,
}

impl FixedSource {
    pub fn new(name: &'static str, pattern: Vec<u8>) -> Self {
        assert!(!pattern.is_empty(), "pattern must not be empty");
        Self {
            info: SourceInfo {
                name,
                description: "fixed byte pattern",
                category: SourceCategory::Deterministic,
            },
            pattern,
        }
    }

    /// A source that returns `byte` everywhere.
    pub fn constant(name: &'static str, byte: u8) -> Self {
        Self::new(name, vec![byte])
    }
}

impl EntropySource for FixedSource {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn fill(&self, buf: &mut [u8]) -> Result<()> {
        for (dst, src) in buf.iter_mut().zip(self.pattern.iter().cycle()) {
            *dst = *src;
        }
        Ok(())
    }
}

/// Emits a wrapping byte counter that continues across draws.
///
/// Two instances created with the same start produce the same stream, which
/// makes generator output reproducible in tests.
pub struct SequenceSource {
    info: SourceInfo,
    next: Mutex<u8>,
}

impl SequenceSource {
    pub fn new(name: &'static str, start: u8) -> Self {
        Self {
            info: SourceInfo {
                name,
                description: "wrapping byte counter",
                category: SourceCategory::Deterministic,
            },
            next: Mutex::new(start),
        }
    }
}

impl EntropySource for SequenceSource {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn fill(&self, buf: &mut [u8]) -> Result<()> {
        let mut next = self.next.lock().unwrap();
        for b in buf.iter_mut() {
            *b = *next;
            *next = next.wrapping_add(1);
        }
        Ok(())
    }
}
