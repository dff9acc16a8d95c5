//! Pluggable one-way hash functions.
//!
//! Generators never call a hash implementation directly; they go through
//! [`DigestHasher`] so that the digest family is a configuration choice. The
//! stock hashers wrap RustCrypto's `sha2` and `sha3` crates.

use std::marker::PhantomData;

use sha2::Digest;

/// A one-way hash function producing fixed-size digests.
pub trait DigestHasher: Send + Sync {
    /// Short identifier (e.g. `"sha512"`).
    fn name(&self) -> &'static str;

    /// Digest size in bits.
    fn digest_size_bits(&self) -> usize;

    /// Hash `data` into exactly `digest_size_bytes()` bytes.
    fn hash(&self, data: &[u8]) -> Vec<u8>;

    fn digest_size_bytes(&self) -> usize {
        self.digest_size_bits() / 8
    }
}

/// Adapter turning any RustCrypto [`Digest`] into a [`DigestHasher`].
pub struct RustCryptoHasher<D> {
    name: &'static str,
    _digest: PhantomData<fn() -> D>,
}

impl<D: Digest> RustCryptoHasher<D> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            _digest: PhantomData,
        }
    }
}

impl<D: Digest + 'static> DigestHasher for RustCryptoHasher<D> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn digest_size_bits(&self) -> usize {
        <D as Digest>::output_size() * 8
    }

    fn hash(&self, data: &[u8]) -> Vec<u8> {
        D::digest(data).to_vec()
    }
}

/// SHA-256 (32-byte digests).
pub fn sha256() -> Box<dyn DigestHasher> {
    Box::new(RustCryptoHasher::<sha2::Sha256>::new("sha256"))
}

/// SHA-512 (64-byte digests).
pub fn sha512() -> Box<dyn DigestHasher> {
    Box::new(RustCryptoHasher::<sha2::Sha512>::new("sha512"))
}

/// SHA3-512 (64-byte digests).
pub fn sha3_512() -> Box<dyn DigestHasher> {
    Box::new(RustCryptoHasher::<sha3::Sha3_512>::new("sha3_512"))
}

/// XOR `src` into `dst` byte by byte. Both slices must have equal length.
pub(crate) fn xor_into(dst: &mut [u8], src: &[u8]) {
    debug_assert_eq!(dst.len(), src.len());
    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= s;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_hasher_sizes() {
        assert_eq!(sha256().digest_size_bits(), 256);
        assert_eq!(sha512().digest_size_bytes(), 64);
        assert_eq!(sha3_512().digest_size_bytes(), 64);
    }

    #[test]
    fn hash_output_matches_reported_size() {
        for hasher in [sha256(), sha512(), sha3_512()] {
            let out = hasher.hash(b"ironveil");
            assert_eq!(out.len(), hasher.digest_size_bytes(), "{}", hasher.name());
        }
    }

    #[test]
    fn sha256_known_answer() {
        let out = sha256().hash(b"abc");
        assert_eq!(
            out[..4],
            [0xba, 0x78, 0x16, 0xbf],
            "SHA-256(\"abc\") prefix mismatch"
        );
    }

    #[test]
    fn sha512_and_sha3_differ() {
        assert_ne!(sha512().hash(b"x"), sha3_512().hash(b"x"));
    }

    #[test]
    fn xor_into_is_involution() {
        let mut a = vec![0xAA, 0x0F, 0x00];
        let b = vec![0xFF, 0xF0, 0x11];
        xor_into(&mut a, &b);
        assert_eq!(a, vec![0x55, 0xFF, 0x11]);
        xor_into(&mut a, &b);
        assert_eq!(a, vec![0xAA, 0x0F, 0x00]);
    }
}
