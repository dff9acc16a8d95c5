//! Timing primitives shared by jitter-based sources.

// ---------------------------------------------------------------------------
// High-resolution timing
// ---------------------------------------------------------------------------

/// Monotonic timestamp in nanoseconds relative to a process-local epoch.
pub fn monotonic_nanos() -> u64 {
    use std::sync::OnceLock;
    use std::time::Instant;
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let epoch = EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_nanos() as u64
}

// ---------------------------------------------------------------------------
// XOR-fold
// ---------------------------------------------------------------------------

/// XOR-fold all 8 bytes of a `u64` into a single byte.
#[inline]
pub fn xor_fold_u64(v: u64) -> u8 {
    v.to_le_bytes().iter().fold(0, |acc, b| acc ^ b)
}

// ---------------------------------------------------------------------------
// Timing entropy extraction
// ---------------------------------------------------------------------------

/// Turn raw timestamps into at most `n_bytes` raw entropy bytes.
///
/// Consecutive deltas are XORed pairwise, then each 64-bit value is folded to
/// one byte. `n` timestamps yield `n - 2` bytes.
pub fn timing_bytes(timings: &[u64], n_bytes: usize) -> Vec<u8> {
    if timings.len() < 3 {
        return Vec::new();
    }
    let deltas: Vec<u64> = timings
        .windows(2)
        .map(|w| w[1].wrapping_sub(w[0]))
        .collect();
    deltas
        .windows(2)
        .map(|w| xor_fold_u64(w[0] ^ w[1]))
        .take(n_bytes)
        .collect()
}

/// XOR `raw` down into exactly `n_bytes` bytes, wrapping around so every raw
/// byte lands in some output byte. Empty when `raw` is shorter than `n_bytes`.
pub fn fold_into(raw: &[u8], n_bytes: usize) -> Vec<u8> {
    if n_bytes == 0 || raw.len() < n_bytes {
        return Vec::new();
    }
    let mut out = vec![0u8; n_bytes];
    for (i, b) in raw.iter().enumerate() {
        out[i % n_bytes] ^= b;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_nanos_advances() {
        let a = monotonic_nanos();
        std::thread::sleep(std::time::Duration::from_millis(1));
        assert!(monotonic_nanos() > a);
    }

    #[test]
    fn xor_fold_known_values() {
        assert_eq!(xor_fold_u64(0), 0);
        assert_eq!(xor_fold_u64(0xFF), 0xFF);
        assert_eq!(xor_fold_u64(0x0101), 0);
        assert_eq!(xor_fold_u64(0x0102_0000_0000_0000), 0x03);
    }

    #[test]
    fn timing_bytes_too_few() {
        assert!(timing_bytes(&[], 8).is_empty());
        assert!(timing_bytes(&[1, 2], 8).is_empty());
    }

    #[test]
    fn timing_bytes_three_timings_one_byte() {
        assert_eq!(timing_bytes(&[100, 200, 150], 8).len(), 1);
    }

    #[test]
    fn timing_bytes_truncates() {
        let timings: Vec<u64> = (0..100).map(|i| i * i).collect();
        assert_eq!(timing_bytes(&timings, 5).len(), 5);
    }

    #[test]
    fn timing_bytes_constant_timings_are_zero() {
        let out = timing_bytes(&[42u64; 20], 10);
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn fold_into_mixes_every_raw_byte() {
        assert_eq!(fold_into(&[1, 2, 4, 8, 16, 32], 2), vec![1 ^ 4 ^ 16, 2 ^ 8 ^ 32]);
        assert_eq!(fold_into(&[7, 9], 2), vec![7, 9]);
    }

    #[test]
    fn fold_into_needs_enough_input() {
        assert!(fold_into(&[1, 2], 3).is_empty());
        assert!(fold_into(&[1, 2], 0).is_empty());
    }
}
