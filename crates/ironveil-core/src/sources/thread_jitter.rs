//! Thread lifecycle timing: entropy from thread create/join scheduling.

use std::thread;

use crate::error::{Result, VeilError};
use crate::source::{EntropySource, SourceCategory, SourceInfo};
use crate::sources::helpers::{fold_into, monotonic_nanos, timing_bytes};

/// Harvests timing jitter from spawning and joining short-lived threads.
///
/// Each cycle exercises kernel thread allocation, core selection and a
/// context switch on join, all of which depend on the load of every other
/// process on the machine. Each thread runs a variable amount of busy work so
/// consecutive samples do not settle into a rhythm.
///
/// Oversamples: `4n + 64` thread lifecycles are folded into `n` output bytes,
/// so no byte rests on a single, possibly correlated, sample. Slow.
pub struct ThreadJitterSource;

const OVERSAMPLE: usize = 4;
const EXTRA_SAMPLES: usize = 64;

static THREAD_JITTER_INFO: SourceInfo = SourceInfo {
    name: "thread_jitter",
    description: "Thread create/join kernel scheduling jitter",
    category: SourceCategory::Scheduling,
};

impl EntropySource for ThreadJitterSource {
    fn info(&self) -> &SourceInfo {
        &THREAD_JITTER_INFO
    }

    fn fill(&self, buf: &mut [u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        let raw_count = buf.len() * OVERSAMPLE + EXTRA_SAMPLES;
        let mut timings: Vec<u64> = Vec::with_capacity(raw_count);
        let mut lcg: u64 = monotonic_nanos() | 1;

        for _ in 0..raw_count {
            lcg = lcg.wrapping_mul(6364136223846793005).wrapping_add(1);
            let work_amount = (lcg >> 48) as u32 % 100;

            let t0 = monotonic_nanos();
            let handle = thread::spawn(move || {
                let mut sink: u64 = 0;
                for j in 0..work_amount {
                    sink = sink.wrapping_add(j as u64);
                }
                std::hint::black_box(sink);
            });
            handle.join().map_err(|_| VeilError::SourceFailure {
                source_name: THREAD_JITTER_INFO.name,
                reason: "sampling thread panicked".into(),
            })?;
            timings.push(monotonic_nanos().wrapping_sub(t0));
        }

        let bytes = fold_into(&timing_bytes(&timings, usize::MAX), buf.len());
        if bytes.len() < buf.len() {
            return Err(VeilError::SourceFailure {
                source_name: THREAD_JITTER_INFO.name,
                reason: format!("collected {} of {} bytes", bytes.len(), buf.len()),
            });
        }
        buf.copy_from_slice(&bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info() {
        let src = ThreadJitterSource;
        assert_eq!(src.name(), "thread_jitter");
        assert_eq!(src.info().category, SourceCategory::Scheduling);
    }

    #[test]
    fn fills_exact_length() {
        let mut buf = [0u8; 48];
        ThreadJitterSource.fill(&mut buf).unwrap();
        let first = buf[0];
        assert!(buf.iter().any(|&b| b != first), "all bytes identical");
    }

    #[test]
    fn empty_buffer_spawns_nothing() {
        ThreadJitterSource.fill(&mut []).unwrap();
    }
}
