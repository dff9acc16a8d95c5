//! Fast generator: a digest-stretching PRNG continuously reseeded from a
//! [`SlowRandomGenerator`].
//!
//! # Reseed policy
//!
//! `state_counter` counts state blocks generated since the last reseed. For a
//! request of `n` bytes the projected counter is
//! `state_counter + 1 + n / digest_size`:
//!
//! - above the **hard** threshold the call reseeds synchronously before
//!   generating anything;
//! - above the **soft** threshold a reseed is scheduled on a background thread
//!   (at most one in flight) and the call proceeds on the current state.
//!
//! Check, optional reseed and generation happen under one lock, and every
//! reseed applies its seed under that same lock, so reseeds are totally
//! ordered and never interleave with a fill. A background reseed draws its
//! seed material from the slow generator before taking the lock; fills keep
//! running on the current state meanwhile.
//!
//! A single request is generated in chunks of at most `hard - 1` blocks, so
//! the counter never passes the hard threshold even for requests larger than
//! it.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use zeroize::Zeroizing;

use crate::config::ReseedPolicy;
use crate::digest::{self, DigestHasher};
use crate::error::{Result, VeilError};
use crate::random::RandomGenerator;
use crate::slow::SlowRandomGenerator;
use crate::stretch::DigestRandomGenerator;

/// Where the fast generator gets its seed material from.
pub enum SlowSource {
    /// Exclusively owned; disposed together with the fast generator.
    Owned(SlowRandomGenerator),
    /// Shared with other users; left alone on disposal.
    Shared(Arc<SlowRandomGenerator>),
}

impl From<SlowRandomGenerator> for SlowSource {
    fn from(slow: SlowRandomGenerator) -> Self {
        Self::Owned(slow)
    }
}

impl From<Arc<SlowRandomGenerator>> for SlowSource {
    fn from(slow: Arc<SlowRandomGenerator>) -> Self {
        Self::Shared(slow)
    }
}

struct GeneratorState {
    prng: DigestRandomGenerator,
    state_counter: u64,
}

struct FastInner {
    generator: Mutex<GeneratorState>,
    slow: Arc<SlowRandomGenerator>,
    owns_slow: bool,
    policy: ReseedPolicy,
    digest_size_bytes: usize,
    seed_size_bytes: usize,
    reseed_in_flight: AtomicBool,
    disposed: AtomicBool,
    reseeds: AtomicU64,
    background: Mutex<Option<JoinHandle<Result<()>>>>,
}

/// Thread-safe, continuously reseeded stretching generator.
pub struct FastRandomGenerator {
    inner: Arc<FastInner>,
}

impl FastRandomGenerator {
    /// SHA-512 stretching generator with the default reseed policy.
    pub fn new(slow: impl Into<SlowSource>) -> Result<Self> {
        Self::with_policy(slow, digest::sha512(), ReseedPolicy::default())
    }

    /// Fully configured constructor. Seeds the generator from `slow` before
    /// returning.
    pub fn with_policy(
        slow: impl Into<SlowSource>,
        hasher: Box<dyn DigestHasher>,
        policy: ReseedPolicy,
    ) -> Result<Self> {
        policy.validate()?;
        if hasher.digest_size_bytes() == 0 {
            return Err(VeilError::InvalidConfiguration(format!(
                "digest hasher `{}` reports a zero digest size",
                hasher.name()
            )));
        }
        let (slow, owns_slow) = match slow.into() {
            SlowSource::Owned(slow) => (Arc::new(slow), true),
            SlowSource::Shared(slow) => (slow, false),
        };
        let prng = DigestRandomGenerator::new(hasher);
        let digest_size_bytes = prng.digest_size_bytes();
        let seed_size_bytes = policy.seed_size_bytes.unwrap_or(digest_size_bytes);

        let inner = FastInner {
            generator: Mutex::new(GeneratorState {
                prng,
                state_counter: 0,
            }),
            slow,
            owns_slow,
            policy,
            digest_size_bytes,
            seed_size_bytes,
            reseed_in_flight: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            reseeds: AtomicU64::new(0),
            background: Mutex::new(None),
        };
        {
            let mut state = inner.generator.lock().unwrap();
            inner.seed_locked(&mut state)?;
        }
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub fn digest_size_bytes(&self) -> usize {
        self.inner.digest_size_bytes
    }

    pub fn policy(&self) -> &ReseedPolicy {
        &self.inner.policy
    }

    /// State blocks generated since the last reseed.
    pub fn state_counter(&self) -> u64 {
        self.inner.generator.lock().unwrap().state_counter
    }

    /// Completed reseeds, not counting the initial seeding.
    pub fn reseed_count(&self) -> u64 {
        self.inner.reseeds.load(Ordering::Acquire)
    }

    pub fn is_reseed_in_flight(&self) -> bool {
        self.inner.reseed_in_flight.load(Ordering::Acquire)
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Fill `buf`, reseeding first if the policy demands it.
    pub fn fill(&self, buf: &mut [u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        let inner = &self.inner;
        if inner.disposed.load(Ordering::Acquire) {
            return Err(VeilError::Disposed("fast random generator"));
        }

        // `validate` guarantees hard >= 2, so a chunk holds at least one block.
        let max_chunk = usize::try_from(inner.policy.hard_threshold - 1)
            .unwrap_or(usize::MAX)
            .saturating_mul(inner.digest_size_bytes);

        let mut state = inner.generator.lock().unwrap();
        for chunk in buf.chunks_mut(max_chunk) {
            let projected =
                state.state_counter + 1 + (chunk.len() / inner.digest_size_bytes) as u64;

            if projected > inner.policy.hard_threshold {
                // A pending background reseed keeps its claim and releases the
                // flag itself once it has applied its seed.
                let claimed = !inner.reseed_in_flight.swap(true, Ordering::AcqRel);
                let result = inner.reseed_locked(&mut state);
                if claimed {
                    inner.reseed_in_flight.store(false, Ordering::Release);
                }
                result?;
            } else if projected > inner.policy.soft_threshold
                && !inner.reseed_in_flight.swap(true, Ordering::AcqRel)
            {
                self.schedule_background_reseed();
            }

            let advances = state.prng.next_bytes(chunk);
            state.state_counter += advances;
        }
        Ok(())
    }

    /// Reseed synchronously right now.
    pub fn reseed(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(VeilError::Disposed("fast random generator"));
        }
        let mut state = self.inner.generator.lock().unwrap();
        self.inner.reseed_locked(&mut state)
    }

    /// Wait for the most recently scheduled background reseed and return its
    /// outcome. `Ok(())` when none was scheduled.
    pub fn join_background_reseed(&self) -> Result<()> {
        let handle = self.inner.background.lock().unwrap().take();
        match handle {
            Some(handle) => handle.join().unwrap_or_else(|_| {
                Err(VeilError::SourceFailure {
                    source_name: "fast_random_reseed",
                    reason: "background reseed thread panicked".into(),
                })
            }),
            None => Ok(()),
        }
    }

    /// Stop serving bytes and release the slow generator if it is owned.
    /// Idempotent.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    fn schedule_background_reseed(&self) {
        let weak = Arc::downgrade(&self.inner);
        let spawned = thread::Builder::new()
            .name("ironveil-reseed".into())
            .spawn(move || match weak.upgrade() {
                Some(inner) => inner.background_reseed(),
                None => Ok(()),
            });
        match spawned {
            Ok(handle) => *self.inner.background.lock().unwrap() = Some(handle),
            Err(e) => {
                self.inner.reseed_in_flight.store(false, Ordering::Release);
                log::error!("could not spawn background reseed: {e}");
            }
        }
    }
}

impl FastInner {
    fn draw_seed(&self) -> Result<Zeroizing<Vec<u8>>> {
        let mut seed = Zeroizing::new(vec![0u8; self.seed_size_bytes]);
        self.slow.fill(&mut seed)?;
        Ok(seed)
    }

    fn apply_seed(&self, state: &mut GeneratorState, seed: &[u8]) {
        state.prng.add_seed_material(seed);
        state.state_counter = 0;
    }

    fn seed_locked(&self, state: &mut GeneratorState) -> Result<()> {
        let seed = self.draw_seed()?;
        self.apply_seed(state, &seed);
        Ok(())
    }

    fn reseed_locked(&self, state: &mut GeneratorState) -> Result<()> {
        let previous = state.state_counter;
        self.seed_locked(state)?;
        self.reseeds.fetch_add(1, Ordering::AcqRel);
        log::debug!("fast random generator reseeded after {previous} blocks");
        Ok(())
    }

    fn background_reseed(&self) -> Result<()> {
        let result = if self.disposed.load(Ordering::Acquire) {
            Ok(())
        } else {
            self.draw_seed().map(|seed| {
                let mut state = self.generator.lock().unwrap();
                if !self.disposed.load(Ordering::Acquire) {
                    let previous = state.state_counter;
                    self.apply_seed(&mut state, &seed);
                    self.reseeds.fetch_add(1, Ordering::AcqRel);
                    log::debug!("fast random generator reseeded in background after {previous} blocks");
                }
            })
        };
        self.reseed_in_flight.store(false, Ordering::Release);

        match result {
            Err(e) if self.disposed.load(Ordering::Acquire) => {
                log::debug!("background reseed abandoned, generator disposed: {e}");
                Ok(())
            }
            Err(e) => {
                log::error!("background reseed failed: {e}");
                Err(e)
            }
            Ok(()) => Ok(()),
        }
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        if self.owns_slow {
            self.slow.dispose();
        }
        log::debug!("fast random generator disposed");
    }
}

impl Drop for FastInner {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl RandomGenerator for FastRandomGenerator {
    fn fill(&self, buf: &mut [u8]) -> Result<()> {
        FastRandomGenerator::fill(self, buf)
    }
}

/// Adapter for the `rand` ecosystem.
///
/// # Panics
/// `RngCore` is infallible, so generator failures (disposal, a failed
/// synchronous reseed) panic here. Use [`RandomGenerator`] to handle them.
impl rand::RngCore for FastRandomGenerator {
    fn next_u32(&mut self) -> u32 {
        let mut b = [0u8; 4];
        self.fill_bytes(&mut b);
        u32::from_le_bytes(b)
    }

    fn next_u64(&mut self) -> u64 {
        let mut b = [0u8; 8];
        self.fill_bytes(&mut b);
        u64::from_le_bytes(b)
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        if let Err(e) = FastRandomGenerator::fill(self, dst) {
            panic!("fast random generator failed: {e}");
        }
    }
}

impl rand::CryptoRng for FastRandomGenerator {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Barrier, Condvar};
    use std::thread::ThreadId;

    use crate::entropy_hasher::EntropyHasher;
    use crate::source::{EntropySource, SourceCategory, SourceInfo};
    use crate::sources::SequenceSource;

    /// Counter source whose draws block while the gate is closed. Records
    /// every thread that draws after `close` was first called.
    struct GatedSource {
        info: SourceInfo,
        closed: Mutex<bool>,
        opened: Condvar,
        armed: AtomicBool,
        callers: Mutex<Vec<ThreadId>>,
        inner: SequenceSource,
    }

    impl GatedSource {
        fn new() -> Self {
            Self {
                info: SourceInfo {
                    name: "gated",
                    description: "counter behind a gate",
                    category: SourceCategory::Deterministic,
                },
                closed: Mutex::new(false),
                opened: Condvar::new(),
                armed: AtomicBool::new(false),
                callers: Mutex::new(Vec::new()),
                inner: SequenceSource::new("gated_inner", 0),
            }
        }

        fn close(&self) {
            self.armed.store(true, Ordering::Release);
            *self.closed.lock().unwrap() = true;
        }

        fn open(&self) {
            *self.closed.lock().unwrap() = false;
            self.opened.notify_all();
        }

        fn callers(&self) -> Vec<ThreadId> {
            self.callers.lock().unwrap().clone()
        }
    }

    impl EntropySource for GatedSource {
        fn info(&self) -> &SourceInfo {
            &self.info
        }

        fn fill(&self, buf: &mut [u8]) -> Result<()> {
            if self.armed.load(Ordering::Acquire) {
                let id = thread::current().id();
                let mut callers = self.callers.lock().unwrap();
                if !callers.contains(&id) {
                    callers.push(id);
                }
            }
            let mut closed = self.closed.lock().unwrap();
            while *closed {
                closed = self.opened.wait(closed).unwrap();
            }
            drop(closed);
            self.inner.fill(buf)
        }
    }

    fn sequence_slow() -> SlowRandomGenerator {
        let eh = EntropyHasher::single(Arc::new(SequenceSource::new("seq", 0)), digest::sha512())
            .unwrap();
        SlowRandomGenerator::new(vec![eh]).unwrap()
    }

    fn policy(soft: u64, hard: u64) -> ReseedPolicy {
        ReseedPolicy {
            soft_threshold: soft,
            hard_threshold: hard,
            seed_size_bytes: None,
        }
    }

    fn fast_with(soft: u64, hard: u64) -> FastRandomGenerator {
        FastRandomGenerator::with_policy(sequence_slow(), digest::sha512(), policy(soft, hard)).unwrap()
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    #[test]
    fn rejects_invalid_policy() {
        let err = FastRandomGenerator::with_policy(sequence_slow(), digest::sha512(), policy(8, 8))
            .err()
            .unwrap();
        assert!(matches!(err, VeilError::InvalidConfiguration(_)));
    }

    struct ZeroBitHasher;

    impl DigestHasher for ZeroBitHasher {
        fn name(&self) -> &'static str {
            "zero_bits"
        }

        fn digest_size_bits(&self) -> usize {
            0
        }

        fn hash(&self, _data: &[u8]) -> Vec<u8> {
            Vec::new()
        }
    }

    #[test]
    fn rejects_zero_sized_digest() {
        let err = FastRandomGenerator::with_policy(
            sequence_slow(),
            Box::new(ZeroBitHasher),
            ReseedPolicy::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, VeilError::InvalidConfiguration(_)));
    }

    #[test]
    fn initial_seed_is_not_a_reseed() {
        let fast = fast_with(100, 200);
        assert_eq!(fast.reseed_count(), 0);
        assert_eq!(fast.state_counter(), 0);
        assert_eq!(fast.digest_size_bytes(), 64);
    }

    #[test]
    fn same_slow_stream_same_output() {
        let a = fast_with(100, 200);
        let b = fast_with(100, 200);
        assert_eq!(a.get_bytes(200).unwrap(), b.get_bytes(200).unwrap());
    }

    // -----------------------------------------------------------------------
    // Counters and thresholds
    // -----------------------------------------------------------------------

    #[test]
    fn empty_fill_is_noop() {
        let fast = fast_with(100, 200);
        fast.fill(&mut []).unwrap();
        assert_eq!(fast.state_counter(), 0);
    }

    #[test]
    fn counter_tracks_exact_block_usage() {
        let fast = fast_with(100, 200);
        fast.fill(&mut [0u8; 1]).unwrap();
        assert_eq!(fast.state_counter(), 1);
        fast.fill(&mut [0u8; 64]).unwrap();
        assert_eq!(fast.state_counter(), 2);
        fast.fill(&mut [0u8; 129]).unwrap();
        assert_eq!(fast.state_counter(), 5);
    }

    #[test]
    fn hard_threshold_reseeds_synchronously() {
        let fast = fast_with(7, 8);
        fast.fill(&mut [0u8; 320]).unwrap();
        assert_eq!(fast.state_counter(), 5);
        assert_eq!(fast.reseed_count(), 0);

        // projected = 5 + 1 + 5 = 11 > 8
        fast.fill(&mut [0u8; 320]).unwrap();
        assert_eq!(fast.reseed_count(), 1);
        assert!(fast.state_counter() < 10, "counter must restart after reseed");
        assert_eq!(fast.state_counter(), 5);
    }

    #[test]
    fn oversized_request_reseeds_between_chunks() {
        // hard = 4 caps a chunk at 3 blocks: 640 bytes are served as
        // 3 + 3 + 3 + 1 blocks with a synchronous reseed before each chunk
        // after the first.
        // The first chunk also crosses the soft threshold; that background
        // reseed can only apply once the fill releases the lock.
        let fast = fast_with(2, 4);
        let out = fast.get_bytes(64 * 10).unwrap();
        assert_eq!(out.len(), 640);
        fast.join_background_reseed().unwrap();
        assert_eq!(fast.reseed_count(), 3 + 1);
        assert_eq!(fast.state_counter(), 0);
    }

    #[test]
    fn block_aligned_pieces_match_one_large_request() {
        let a = fast_with(100, 200);
        let b = fast_with(100, 200);
        let whole = a.get_bytes(64 * 6).unwrap();
        let mut pieces = Vec::new();
        for _ in 0..6 {
            pieces.extend(b.get_bytes(64).unwrap());
        }
        assert_eq!(whole, pieces);
    }

    #[test]
    fn soft_threshold_schedules_background_reseed() {
        let fast = fast_with(2, 1000);
        fast.fill(&mut [0u8; 192]).unwrap();
        fast.join_background_reseed().unwrap();
        assert_eq!(fast.reseed_count(), 1);
        assert_eq!(fast.state_counter(), 0);
        assert!(!fast.is_reseed_in_flight());
    }

    #[test]
    fn below_soft_threshold_never_reseeds() {
        let fast = fast_with(50, 100);
        for _ in 0..10 {
            fast.fill(&mut [0u8; 64]).unwrap();
        }
        fast.join_background_reseed().unwrap();
        assert_eq!(fast.reseed_count(), 0);
        assert_eq!(fast.state_counter(), 10);
    }

    #[test]
    fn manual_reseed_changes_stream() {
        let a = fast_with(100, 200);
        let b = fast_with(100, 200);
        b.reseed().unwrap();
        assert_ne!(a.get_bytes(64).unwrap(), b.get_bytes(64).unwrap());
    }

    // -----------------------------------------------------------------------
    // Disposal
    // -----------------------------------------------------------------------

    #[test]
    fn dispose_is_idempotent_and_releases_owned_slow() {
        let fast = fast_with(100, 200);
        fast.dispose();
        fast.dispose();
        assert!(fast.is_disposed());
        assert!(fast.inner.slow.is_disposed());
        assert!(matches!(
            fast.fill(&mut [0u8; 4]),
            Err(VeilError::Disposed(_))
        ));
    }

    #[test]
    fn dispose_leaves_shared_slow_alone() {
        let slow = Arc::new(sequence_slow());
        let fast = FastRandomGenerator::new(Arc::clone(&slow)).unwrap();
        fast.dispose();
        assert!(!slow.is_disposed());
        drop(fast);
        assert!(!slow.is_disposed());
        assert!(slow.get_bytes(8).is_ok());
    }

    #[test]
    fn drop_disposes_owned_slow() {
        let fast = fast_with(100, 200);
        let slow = Arc::clone(&fast.inner.slow);
        drop(fast);
        assert!(slow.is_disposed());
    }

    #[test]
    fn background_reseed_failure_reaches_joiner() {
        let slow = Arc::new(sequence_slow());
        let fast = FastRandomGenerator::with_policy(
            Arc::clone(&slow),
            digest::sha512(),
            policy(2, 1000),
        )
        .unwrap();
        slow.dispose();

        // Soft crossing only: the fill itself never touches the slow generator.
        fast.fill(&mut [0u8; 192]).unwrap();
        let err = fast.join_background_reseed().unwrap_err();
        assert!(matches!(err, VeilError::Disposed(_)));
        assert!(!fast.is_disposed());
        assert!(!fast.is_reseed_in_flight());
        assert_eq!(fast.reseed_count(), 0);
    }

    #[test]
    fn background_reseed_after_dispose_is_silent() {
        let fast = fast_with(2, 1000);
        fast.fill(&mut [0u8; 192]).unwrap();
        fast.dispose();
        assert!(fast.join_background_reseed().is_ok());
    }

    // -----------------------------------------------------------------------
    // Concurrency and interop
    // -----------------------------------------------------------------------

    #[test]
    fn concurrent_fills_with_reseeds() {
        let fast = Arc::new(fast_with(4, 16));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let fast = Arc::clone(&fast);
                std::thread::spawn(move || {
                    for _ in 0..20 {
                        fast.fill(&mut [0u8; 200]).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        fast.join_background_reseed().unwrap();
        assert!(fast.reseed_count() > 0);
        assert!(fast.state_counter() <= 16);
    }

    #[test]
    fn one_background_reseed_however_many_threads_cross_soft() {
        const THREADS: usize = 8;
        let gate = Arc::new(GatedSource::new());
        let eh = EntropyHasher::single(Arc::clone(&gate) as Arc<dyn EntropySource>, digest::sha512())
            .unwrap();
        let slow = SlowRandomGenerator::new(vec![eh]).unwrap();
        let fast = Arc::new(
            FastRandomGenerator::with_policy(slow, digest::sha512(), policy(2, 1000)).unwrap(),
        );

        // From here on the background reseed is stuck in the slow source
        // while every worker crosses the soft threshold.
        gate.close();
        let barrier = Arc::new(Barrier::new(THREADS));
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let fast = Arc::clone(&fast);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    fast.fill(&mut [0u8; 192]).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(fast.is_reseed_in_flight());
        assert_eq!(fast.reseed_count(), 0);
        assert_eq!(fast.state_counter(), 3 * THREADS as u64);

        gate.open();
        fast.join_background_reseed().unwrap();
        assert_eq!(gate.callers().len(), 1, "exactly one reseed thread drew seed");
        assert_eq!(fast.reseed_count(), 1);
        assert_eq!(fast.state_counter(), 0);
        assert!(!fast.is_reseed_in_flight());
    }

    #[test]
    fn works_as_rand_rng() {
        use rand::Rng;
        let mut fast = fast_with(100, 200);
        for _ in 0..100 {
            let v: u32 = fast.random_range(0..10);
            assert!(v < 10);
        }
    }

    #[test]
    fn system_default_end_to_end() {
        let fast = FastRandomGenerator::new(SlowRandomGenerator::system_default().unwrap()).unwrap();
        let a = fast.get_bytes(1000).unwrap();
        let b = fast.get_bytes(1000).unwrap();
        assert_ne!(a, b);
    }
}
