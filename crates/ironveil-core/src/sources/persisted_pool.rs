//! File-backed entropy pool carried across process runs.
//!
//! # On-disk record
//!
//! ```text
//! u32 LE  position-field length (always 4)
//! u32 LE  position
//! [u8; 3072] pool
//! [u8; 32]   SHA-256(position ‖ pool)
//! ```
//!
//! The whole record is XORed with a keystream derived from the current user
//! (user name, home directory) and the absolute file path, so a pool file is
//! only readable by the same user at the same location. A checksum mismatch or
//! an out-of-range position fails with
//! [`VeilError::CryptographicIntegrity`]; the pool is never used partially.
//!
//! Every draw advances the position, stirs the consumed window and rewrites the
//! file atomically (temporary file + rename).

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::digest::xor_into;
use crate::error::{Result, VeilError};
use crate::source::{EntropySource, SourceCategory, SourceInfo};

/// Pool size in bytes.
pub const POOL_SIZE: usize = 3072;

const POSITION_FIELD_LEN: u32 = 4;
const BLOCK: usize = 32;
const RECORD_LEN: usize = 4 + 4 + POOL_SIZE + BLOCK;

static POOL_INFO: SourceInfo = SourceInfo {
    name: "persisted_pool",
    description: "Entropy pool persisted on disk between runs",
    category: SourceCategory::Persisted,
};

struct PoolState {
    position: usize,
    pool: Zeroizing<Vec<u8>>,
}

/// Entropy source backed by an obscured pool file.
pub struct PersistedPoolSource {
    path: PathBuf,
    key: Zeroizing<[u8; 32]>,
    state: Mutex<PoolState>,
}

impl PersistedPoolSource {
    /// Open an existing pool file, or create a fresh one if none exists.
    pub fn open_or_create(path: impl AsRef<Path>) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    /// Create a new pool seeded from the OS CSPRNG, replacing any existing file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = std::path::absolute(path.as_ref())?;
        let mut pool = Zeroizing::new(vec![0u8; POOL_SIZE]);
        os_fill(&mut pool)?;
        let source = Self {
            key: user_scoped_key(&path),
            path,
            state: Mutex::new(PoolState { position: 0, pool }),
        };
        source.persist(&source.state.lock().unwrap())?;
        log::debug!("created entropy pool at {}", source.path.display());
        Ok(source)
    }

    /// Open and verify an existing pool file.
    ///
    /// Fresh OS entropy is stirred in right away, so two copies of the same
    /// file diverge on first use.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = std::path::absolute(path.as_ref())?;
        let key = user_scoped_key(&path);
        let mut record = Zeroizing::new(fs::read(&path)?);
        apply_keystream(&key, &mut record);
        let (position, pool) = decode(&record).inspect_err(|e| {
            log::warn!("entropy pool {} rejected: {e}", path.display());
        })?;

        let source = Self {
            path,
            key,
            state: Mutex::new(PoolState { position, pool }),
        };

        let mut fresh = Zeroizing::new([0u8; 64]);
        os_fill(&mut fresh[..])?;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        source.stir(&fresh[..])?;
        source.stir(&now.to_le_bytes())?;
        Ok(source)
    }

    /// Location of the pool file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current read position inside the pool.
    pub fn position(&self) -> usize {
        self.state.lock().unwrap().position
    }

    /// Mix external material into the whole pool and persist it.
    pub fn stir(&self, material: &[u8]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        for (i, window) in state.pool.chunks_mut(BLOCK).enumerate() {
            let mask = Sha256::new()
                .chain_update(b"stir")
                .chain_update((i as u64).to_le_bytes())
                .chain_update(material)
                .chain_update(&*window)
                .finalize();
            xor_into(window, &mask[..window.len()]);
        }
        self.persist(&state)
    }

    fn persist(&self, state: &PoolState) -> Result<()> {
        let mut record = encode(state.position, &state.pool);
        apply_keystream(&self.key, &mut record);

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&record)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        log::debug!(
            "persisted entropy pool {} (position {})",
            self.path.display(),
            state.position
        );
        Ok(())
    }
}

impl EntropySource for PersistedPoolSource {
    fn info(&self) -> &SourceInfo {
        &POOL_INFO
    }

    fn fill(&self, buf: &mut [u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        let mut state = self.state.lock().unwrap();
        for chunk in buf.chunks_mut(BLOCK) {
            let position = state.position;
            let block = Sha256::new()
                .chain_update(b"output")
                .chain_update((position as u32).to_le_bytes())
                .chain_update(&state.pool[..])
                .finalize();
            chunk.copy_from_slice(&block[..chunk.len()]);

            // Consumed output is never reproducible from the stored pool.
            let mask = Sha256::new()
                .chain_update(b"advance")
                .chain_update(block)
                .finalize();
            xor_into(&mut state.pool[position..position + BLOCK], &mask);
            state.position = (position + BLOCK) % POOL_SIZE;
        }
        self.persist(&state)
    }
}

fn os_fill(buf: &mut [u8]) -> Result<()> {
    getrandom::fill(buf).map_err(|e| VeilError::SourceFailure {
        source_name: POOL_INFO.name,
        reason: e.to_string(),
    })
}

fn checksum(position: usize, pool: &[u8]) -> [u8; 32] {
    Sha256::new()
        .chain_update((position as u32).to_le_bytes())
        .chain_update(pool)
        .finalize()
        .into()
}

fn encode(position: usize, pool: &[u8]) -> Zeroizing<Vec<u8>> {
    let mut record = Zeroizing::new(Vec::with_capacity(RECORD_LEN));
    record.extend_from_slice(&POSITION_FIELD_LEN.to_le_bytes());
    record.extend_from_slice(&(position as u32).to_le_bytes());
    record.extend_from_slice(pool);
    record.extend_from_slice(&checksum(position, pool));
    record
}

fn decode(record: &[u8]) -> Result<(usize, Zeroizing<Vec<u8>>)> {
    let integrity = |msg: &str| VeilError::CryptographicIntegrity(format!("entropy pool: {msg}"));

    if record.len() != RECORD_LEN {
        return Err(integrity("unexpected record length"));
    }
    let field_len = u32::from_le_bytes([record[0], record[1], record[2], record[3]]);
    if field_len != POSITION_FIELD_LEN {
        return Err(integrity("bad position marker"));
    }
    let position = u32::from_le_bytes([record[4], record[5], record[6], record[7]]) as usize;
    let pool = &record[8..8 + POOL_SIZE];
    let stored = &record[8 + POOL_SIZE..];
    if stored != checksum(position, pool) {
        return Err(integrity("checksum mismatch"));
    }
    if position >= POOL_SIZE || position % BLOCK != 0 {
        return Err(integrity("position out of range"));
    }
    Ok((position, Zeroizing::new(pool.to_vec())))
}

/// Key bound to the current user and the pool's absolute location.
fn user_scoped_key(path: &Path) -> Zeroizing<[u8; 32]> {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_default();
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_default();
    Zeroizing::new(
        Sha256::new()
            .chain_update(b"ironveil entropy pool v1")
            .chain_update(user.as_bytes())
            .chain_update([0u8])
            .chain_update(home.as_bytes())
            .chain_update([0u8])
            .chain_update(path.to_string_lossy().as_bytes())
            .finalize()
            .into(),
    )
}

fn apply_keystream(key: &[u8; 32], data: &mut [u8]) {
    for (i, chunk) in data.chunks_mut(BLOCK).enumerate() {
        let pad = Sha256::new()
            .chain_update(key)
            .chain_update((i as u64).to_le_bytes())
            .finalize();
        xor_into(chunk, &pad[..chunk.len()]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_roundtrip() {
        let pool = vec![0x5Au8; POOL_SIZE];
        let record = encode(64, &pool);
        assert_eq!(record.len(), RECORD_LEN);
        let (position, decoded) = decode(&record).unwrap();
        assert_eq!(position, 64);
        assert_eq!(&decoded[..], &pool[..]);
    }

    #[test]
    fn decode_rejects_flipped_pool_byte() {
        let mut record = encode(0, &vec![1u8; POOL_SIZE]);
        record[100] ^= 0x01;
        assert!(matches!(
            decode(&record),
            Err(VeilError::CryptographicIntegrity(_))
        ));
    }

    #[test]
    fn decode_rejects_truncated_record() {
        let record = encode(0, &vec![1u8; POOL_SIZE]);
        assert!(matches!(
            decode(&record[..RECORD_LEN - 1]),
            Err(VeilError::CryptographicIntegrity(_))
        ));
    }

    #[test]
    fn decode_rejects_out_of_range_position() {
        let record = encode(POOL_SIZE, &vec![1u8; POOL_SIZE]);
        assert!(matches!(
            decode(&record),
            Err(VeilError::CryptographicIntegrity(_))
        ));
    }

    #[test]
    fn keystream_is_involution() {
        let key = [9u8; 32];
        let original: Vec<u8> = (0..100u8).collect();
        let mut data = original.clone();
        apply_keystream(&key, &mut data);
        assert_ne!(data, original);
        apply_keystream(&key, &mut data);
        assert_eq!(data, original);
    }

    #[test]
    fn create_fill_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pool.bin");

        let src = PersistedPoolSource::create(&path).unwrap();
        let mut a = [0u8; 80];
        src.fill(&mut a).unwrap();
        assert_eq!(src.position(), 96);
        drop(src);

        let on_disk = fs::read(&path).unwrap();
        assert_eq!(on_disk.len(), RECORD_LEN);

        let reopened = PersistedPoolSource::open(&path).unwrap();
        assert_eq!(reopened.position(), 96);
        let mut b = [0u8; 80];
        reopened.fill(&mut b).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn open_or_create_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.pool");
        assert!(!path.exists());
        let src = PersistedPoolSource::open_or_create(&path).unwrap();
        assert!(path.exists());
        assert_eq!(src.position(), 0);
    }

    #[test]
    fn corrupted_file_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pool.bin");
        PersistedPoolSource::create(&path).unwrap();

        let mut bytes = fs::read(&path).unwrap();
        bytes[500] ^= 0xFF;
        fs::write(&path, &bytes).unwrap();

        assert!(matches!(
            PersistedPoolSource::open(&path),
            Err(VeilError::CryptographicIntegrity(_))
        ));
    }

    #[test]
    fn moved_file_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("a.pool");
        let moved = dir.path().join("b.pool");
        PersistedPoolSource::create(&original).unwrap();
        fs::copy(&original, &moved).unwrap();

        assert!(matches!(
            PersistedPoolSource::open(&moved),
            Err(VeilError::CryptographicIntegrity(_))
        ));
    }
}
