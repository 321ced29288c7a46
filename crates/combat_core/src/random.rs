//! Seedable randomness.
//!
//! Every random decision in the simulator and the composition search goes
//! through [`RandomSource`], so a fixed seed reproduces a run exactly and
//! tests can substitute their own streams.

use rand::{Rng, RngCore, SeedableRng};
use rand_distr::{Distribution, Exp, Geometric};
use rand_pcg::Pcg32;

/// The distributions the model needs, and nothing else.
pub trait RandomSource {
    /// Raw 64 random bits.
    fn next_u64(&mut self) -> u64;

    /// Uniform sample in `[0, 1)`.
    fn uniform(&mut self) -> f64;

    /// Uniform index in `0..len`. Returns 0 when `len` is 0.
    fn index(&mut self, len: usize) -> usize;

    /// `true` with probability `p` (clamped to `[0, 1]`).
    fn bernoulli(&mut self, p: f64) -> bool;

    /// Exponential sample with the given mean.
    fn exponential(&mut self, mean: f64) -> f64;

    /// Number of trials up to and including the first success (support `1..`).
    fn geometric(&mut self, p: f64) -> u64;
}

/// Fisher-Yates shuffle driven by [`RandomSource::index`].
pub fn shuffle<T, R: RandomSource + ?Sized>(rng: &mut R, items: &mut [T]) {
    for i in (1..items.len()).rev() {
        let j = rng.index(i + 1);
        items.swap(i, j);
    }
}

/// PCG-backed [`RandomSource`].
#[derive(Debug, Clone)]
pub struct SeededRng {
    rng: Pcg32,
}

impl SeededRng {
    /// Create a generator from a 64-bit seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    /// Derive an independent generator for a sub-task.
    #[must_use]
    pub fn derive(seed: u64, stream: u64) -> Self {
        Self::new(mix_seed(seed, stream))
    }
}

impl RandomSource for SeededRng {
    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn uniform(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    fn index(&mut self, len: usize) -> usize {
        if len == 0 {
            0
        } else {
            self.rng.random_range(0..len)
        }
    }

    fn bernoulli(&mut self, p: f64) -> bool {
        self.rng.random_bool(p.clamp(0.0, 1.0))
    }

    fn exponential(&mut self, mean: f64) -> f64 {
        if mean <= 0.0 {
            return 0.0;
        }
        match Exp::new(1.0 / mean) {
            Ok(dist) => dist.sample(&mut self.rng),
            Err(_) => 0.0,
        }
    }

    fn geometric(&mut self, p: f64) -> u64 {
        // rand_distr counts failures before the first success
        match Geometric::new(p.clamp(f64::MIN_POSITIVE, 1.0)) {
            Ok(dist) => dist.sample(&mut self.rng).saturating_add(1),
            Err(_) => 1,
        }
    }
}

/// FNV-1a over `bytes`, fixed across platforms and Rust releases.
#[must_use]
pub fn stable_hash(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, &b| {
        (hash ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
    })
}

/// SplitMix64 finalizer over two words.
#[must_use]
pub fn mix_seed(seed: u64, stream: u64) -> u64 {
    let mut z = seed ^ stream.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
