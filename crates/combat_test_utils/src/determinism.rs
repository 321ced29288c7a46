//! Determinism testing utilities.
//!
//! Provides a harness for verifying that battle predictions produce
//! identical results given identical inputs and seeds.
//!
//! # Testing Strategy
//!
//! The composition search compares thousands of simulated battles, and the
//! result cache assumes a battle is a pure function of its inputs. Sources
//! of non-determinism include:
//!
//! - **Unseeded randomness**: every random decision must go through the
//!   caller's [`RandomSource`](combat_core::random::RandomSource).
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Nothing in the battle loop may iterate a hash map.
//!
//! - **Parallel evaluation order**: fitness evaluation runs on a thread pool,
//!   so each gene gets its own derived random stream.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: same seed, same result for a single battle
//! 2. **Property tests**: random armies must still produce deterministic outputs
//! 3. **Parallel tests**: running N predictions on N threads all match
//! 4. **Serialization**: results survive a bincode round trip byte for byte

use std::thread;

use combat_core::predictor::CombatPredictor;
use combat_core::random::SeededRng;
use combat_core::recording::CombatRecording;
use combat_core::settings::{CombatSettings, Defender};
use combat_core::unit::{CombatResult, CombatState};

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic predictions).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that every run matched, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Prediction is non-deterministic!\n\
                 Runs: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a computation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run
/// * `setup` - Function to create the input
/// * `run` - Function producing the output from the input
/// * `hash` - Function to compute the output hash
pub fn verify_determinism<S, T, Setup, Run, HashFn>(
    runs: usize,
    setup: Setup,
    run: Run,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Run: Fn(S) -> T,
    HashFn: Fn(&T) -> u64,
{
    let hashes: Vec<u64> = (0..runs).map(|_| hash(&run(setup()))).collect();
    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
    }
}

/// Hash of a result's serialized bytes, as the headless runner records it.
///
/// # Panics
///
/// Panics if the result does not serialize.
#[must_use]
pub fn result_hash(result: &CombatResult) -> u64 {
    result.fingerprint().expect("combat results serialize")
}

/// Predict the same battle `runs` times with the same seed.
///
/// # Example
///
/// ```ignore
/// use combat_test_utils::{determinism::verify_prediction_determinism, fixtures};
///
/// let state = fixtures::battle(&[("Marine", 4)], &[("Zergling", 4)]);
/// verify_prediction_determinism(&fixtures::predictor(), &state, &Default::default(), 7, 5)
///     .assert_deterministic();
/// ```
pub fn verify_prediction_determinism(
    predictor: &CombatPredictor,
    state: &CombatState,
    settings: &CombatSettings,
    seed: u64,
    runs: usize,
) -> DeterminismResult {
    verify_determinism(
        runs,
        || (state.clone(), SeededRng::new(seed)),
        |(state, mut rng)| predictor.predict_engage(state, settings, Defender::default(), &mut rng),
        result_hash,
    )
}

/// Result of parallel prediction runs.
#[derive(Debug, Clone)]
pub struct ParallelRunResult {
    /// Result hash from each thread.
    pub hashes: Vec<u64>,
    /// Number of threads used.
    pub threads: usize,
}

impl ParallelRunResult {
    /// Check if all threads produced identical results.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }

    /// Assert all threads matched.
    ///
    /// # Panics
    ///
    /// Panics if threads produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic() {
            let mut unique: Vec<u64> = self.hashes.clone();
            unique.sort_unstable();
            unique.dedup();
            panic!(
                "Parallel predictions diverged!\n\
                 Threads: {}\n\
                 Unique hashes: {}\n\
                 All hashes: {:?}",
                self.threads,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Predict the same battle on `threads` scoped threads sharing one predictor.
///
/// Shared predictors hand out cached environments from behind a lock, so
/// this also exercises concurrent environment lookups.
///
/// # Panics
///
/// Panics if a worker thread panics.
pub fn run_parallel_predictions(
    predictor: &CombatPredictor,
    state: &CombatState,
    settings: &CombatSettings,
    seed: u64,
    threads: usize,
) -> ParallelRunResult {
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                s.spawn(|| {
                    let mut rng = SeededRng::new(seed);
                    let result =
                        predictor.predict_engage(state.clone(), settings, Defender::default(), &mut rng);
                    result_hash(&result)
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    ParallelRunResult { hashes, threads }
}

/// Compare two recordings frame by frame, finding the first divergence.
///
/// # Returns
///
/// `None` if the recordings match, `Some(tick)` of the first differing
/// frame otherwise. A recording that ends early diverges at the first
/// frame the other one has extra.
#[must_use]
pub fn find_first_divergence(a: &CombatRecording, b: &CombatRecording) -> Option<u32> {
    for (fa, fb) in a.frames.iter().zip(&b.frames) {
        if fa != fb {
            return Some(fa.tick.min(fb.tick));
        }
    }

    let shorter = a.frames.len().min(b.frames.len());
    a.frames
        .get(shorter)
        .or_else(|| b.frames.get(shorter))
        .map(|f| f.tick)
}

/// Verify that a bincode round trip preserves a result exactly.
#[must_use]
pub fn verify_serialization_determinism(result: &CombatResult) -> bool {
    let Ok(bytes) = result.serialize() else {
        return false;
    };
    let Ok(restored) = CombatResult::deserialize(&bytes) else {
        return false;
    };
    restored.serialize().is_ok_and(|again| again == bytes)
}

/// Proptest strategies for determinism testing.
///
/// These strategies generate random but reproducible battle inputs for
/// property-based testing of the simulator.
pub mod strategies {
    use combat_core::settings::CombatSettings;
    use combat_core::unit::Owner;
    use proptest::prelude::*;

    /// Bundled units that fight on the ground with a weapon.
    pub const GROUND_FIGHTERS: &[&str] = &[
        "Marine", "Marauder", "Reaper", "Hellion", "SiegeTank", "Zealot", "Stalker", "Adept",
        "Immortal", "Zergling", "Roach", "Hydralisk", "Queen", "Ultralisk",
    ];

    /// Bundled units that fly.
    pub const AIR_UNITS: &[&str] = &[
        "VikingFighter", "Medivac", "Banshee", "Phoenix", "VoidRay", "Mutalisk", "Corruptor",
    ];

    /// Any fighter from the lists above.
    pub fn arb_unit_name() -> impl Strategy<Value = &'static str> {
        prop_oneof![
            3 => proptest::sample::select(GROUND_FIGHTERS),
            1 => proptest::sample::select(AIR_UNITS),
        ]
    }

    /// A ground fighter.
    pub fn arb_ground_fighter() -> impl Strategy<Value = &'static str> {
        proptest::sample::select(GROUND_FIGHTERS)
    }

    /// Either owner.
    pub fn arb_owner() -> impl Strategy<Value = Owner> {
        prop_oneof![Just(Owner::One), Just(Owner::Two)]
    }

    /// Army as `(name, count)` pairs with 1..=4 of each of up to `max_kinds` kinds.
    pub fn arb_army(max_kinds: usize) -> impl Strategy<Value = Vec<(&'static str, u32)>> {
        proptest::collection::vec((arb_unit_name(), 1u32..=4u32), 1..=max_kinds.max(1))
    }

    /// Fraction of health left on a unit.
    pub fn arb_health_fraction() -> impl Strategy<Value = f32> {
        (1u32..=100u32).prop_map(|p| p as f32 / 100.0)
    }

    /// Random seed.
    pub fn arb_seed() -> impl Strategy<Value = u64> {
        any::<u64>()
    }

    /// Settings with every toggle randomized and a bounded battle length.
    pub fn arb_settings() -> impl Strategy<Value = CombatSettings> {
        (
            any::<bool>(),
            any::<bool>(),
            any::<bool>(),
            any::<bool>(),
            10u32..=200u32,
        )
            .prop_map(|(bad_micro, splash, timing, positioning, max_time)| {
                let mut settings = CombatSettings::default()
                    .with_bad_micro(bad_micro)
                    .with_splash(splash)
                    .with_timing_adjustment(timing)
                    .with_max_time(max_time as f32);
                settings.assume_reasonable_positioning = positioning;
                settings
            })
    }
}
