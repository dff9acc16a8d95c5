//! Digest-based stretching generator.
//!
//! Expands a small seed into an arbitrarily long stream:
//!
//! ```text
//! state  = H(state_counter ‖ state ‖ seed)        per output block
//! seed   = H(seed ‖ seed_counter)                 every 10 blocks
//! seed   = H(material ‖ seed)                     on reseed
//! ```
//!
//! Counters are appended little-endian. The generator is deterministic; all of
//! its unpredictability comes from the seed material fed in by the caller.

use zeroize::Zeroizing;

use crate::digest::DigestHasher;

const CYCLE_COUNT: u64 = 10;

/// Deterministic digest-stretching PRNG. Not thread-safe on its own; the fast
/// generator wraps it in a lock.
pub struct DigestRandomGenerator {
    hasher: Box<dyn DigestHasher>,
    seed: Zeroizing<Vec<u8>>,
    seed_counter: u64,
    state: Zeroizing<Vec<u8>>,
    state_counter: u64,
}

impl DigestRandomGenerator {
    pub fn new(hasher: Box<dyn DigestHasher>) -> Self {
        let size = hasher.digest_size_bytes();
        Self {
            hasher,
            seed: Zeroizing::new(vec![0u8; size]),
            seed_counter: 1,
            state: Zeroizing::new(vec![0u8; size]),
            state_counter: 1,
        }
    }

    pub fn digest_size_bytes(&self) -> usize {
        self.state.len()
    }

    pub fn hasher_name(&self) -> &'static str {
        self.hasher.name()
    }

    /// Mix `material` into the seed. Material accumulates; it never replaces
    /// what was there before.
    pub fn add_seed_material(&mut self, material: &[u8]) {
        let mut input = Zeroizing::new(Vec::with_capacity(material.len() + self.seed.len()));
        input.extend_from_slice(material);
        input.extend_from_slice(&self.seed);
        self.seed = Zeroizing::new(self.hasher.hash(&input));
    }

    /// Fill `out` and return how many state blocks were generated for it.
    pub fn next_bytes(&mut self, out: &mut [u8]) -> u64 {
        if out.is_empty() {
            return 0;
        }
        self.generate_state();
        let mut advances = 1;
        let mut offset = 0;
        for b in out.iter_mut() {
            if offset == self.state.len() {
                self.generate_state();
                advances += 1;
                offset = 0;
            }
            *b = self.state[offset];
            offset += 1;
        }
        advances
    }

    fn cycle_seed(&mut self) {
        let mut input = Zeroizing::new(Vec::with_capacity(self.seed.len() + 8));
        input.extend_from_slice(&self.seed);
        input.extend_from_slice(&self.seed_counter.to_le_bytes());
        self.seed_counter = self.seed_counter.wrapping_add(1);
        self.seed = Zeroizing::new(self.hasher.hash(&input));
    }

    fn generate_state(&mut self) {
        let mut input = Zeroizing::new(Vec::with_capacity(8 + self.state.len() + self.seed.len()));
        input.extend_from_slice(&self.state_counter.to_le_bytes());
        input.extend_from_slice(&self.state);
        input.extend_from_slice(&self.seed);
        self.state_counter = self.state_counter.wrapping_add(1);
        self.state = Zeroizing::new(self.hasher.hash(&input));

        if self.state_counter % CYCLE_COUNT == 0 {
            self.cycle_seed();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::{sha256, sha512};

    fn seeded(seed: &[u8]) -> DigestRandomGenerator {
        let mut g = DigestRandomGenerator::new(sha512());
        g.add_seed_material(seed);
        g
    }

    #[test]
    fn same_seed_same_stream() {
        let mut a = seeded(b"seed");
        let mut b = seeded(b"seed");
        let mut x = [0u8; 300];
        let mut y = [0u8; 300];
        a.next_bytes(&mut x);
        b.next_bytes(&mut y);
        assert_eq!(x, y);
    }

    #[test]
    fn different_seeds_differ() {
        let mut a = seeded(b"seed_a");
        let mut b = seeded(b"seed_b");
        let mut x = [0u8; 64];
        let mut y = [0u8; 64];
        a.next_bytes(&mut x);
        b.next_bytes(&mut y);
        assert_ne!(x, y);
    }

    #[test]
    fn first_block_matches_construction() {
        let mut g = DigestRandomGenerator::new(sha256());
        let mut out = [0u8; 32];
        g.next_bytes(&mut out);

        let mut input = Vec::new();
        input.extend_from_slice(&1u64.to_le_bytes());
        input.extend_from_slice(&[0u8; 32]);
        input.extend_from_slice(&[0u8; 32]);
        assert_eq!(&out[..], &sha256().hash(&input)[..]);
    }

    #[test]
    fn advance_count_matches_block_usage() {
        let mut g = seeded(b"count");
        assert_eq!(g.next_bytes(&mut []), 0);
        assert_eq!(g.next_bytes(&mut [0u8; 1]), 1);
        assert_eq!(g.next_bytes(&mut [0u8; 64]), 1);
        assert_eq!(g.next_bytes(&mut [0u8; 65]), 2);
        assert_eq!(g.next_bytes(&mut [0u8; 640]), 10);
    }

    #[test]
    fn consecutive_calls_never_repeat() {
        let mut g = seeded(b"stream");
        let mut seen = std::collections::HashSet::new();
        for _ in 0..500 {
            let mut block = [0u8; 64];
            g.next_bytes(&mut block);
            assert!(seen.insert(block.to_vec()), "state block repeated");
        }
    }

    #[test]
    fn reseed_changes_stream() {
        let mut a = seeded(b"base");
        let mut b = seeded(b"base");
        b.add_seed_material(b"more");
        let mut x = [0u8; 64];
        let mut y = [0u8; 64];
        a.next_bytes(&mut x);
        b.next_bytes(&mut y);
        assert_ne!(x, y);
    }
}
