//! Batch battle runner.
//!
//! Predicts one scenario under many seeds, in parallel using rayon, and
//! collects outcome statistics.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use combat_core::predictor::CombatPredictor;
use combat_core::random::SeededRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::metrics::{BatchSummary, BattleMetrics};
use crate::scenario::{Scenario, ScenarioError};

/// Configuration for a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Scenario name or path, for the record
    pub scenario: String,
    /// Number of battles to run
    pub count: u32,
    /// Run battles on the rayon pool
    pub parallel: bool,
    /// Worker threads when parallel (0 = rayon default)
    pub threads: u32,
    /// Output directory for results
    pub output_dir: PathBuf,
    /// Starting seed for deterministic runs
    pub seed_start: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            scenario: "marines_vs_zerglings".to_string(),
            count: 100,
            parallel: true,
            threads: 0,
            output_dir: PathBuf::from("results"),
            seed_start: 0,
        }
    }
}

impl BatchConfig {
    /// Create config for a specific scenario
    pub fn new(scenario: &str, count: u32) -> Self {
        Self {
            scenario: scenario.to_string(),
            count,
            ..Default::default()
        }
    }

    /// Set output directory
    pub fn with_output(mut self, dir: PathBuf) -> Self {
        self.output_dir = dir;
        self
    }

    /// Set seed start
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Enable or disable parallel execution
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

/// Results from a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used
    pub config: BatchConfig,
    /// Per-battle metrics, in seed order
    pub battles: Vec<BattleMetrics>,
    /// Aggregate summary
    pub summary: BatchSummary,
    /// Total runtime
    pub duration_seconds: f64,
}

impl BatchResults {
    /// Save results to JSON file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from JSON file
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

fn run_single_battle(
    predictor: &CombatPredictor,
    scenario: &Scenario,
    state: &combat_core::unit::CombatState,
    index: u32,
    seed: u64,
) -> BattleMetrics {
    let mut rng = SeededRng::new(seed);
    let result = predictor.predict_engage(state.clone(), &scenario.settings, scenario.defender, &mut rng);
    BattleMetrics::from_result(predictor.catalog(), index, seed, &result)
}

/// Run a batch of battles
pub fn run_batch(
    predictor: &CombatPredictor,
    scenario: &Scenario,
    config: BatchConfig,
) -> Result<BatchResults, ScenarioError> {
    let start = Instant::now();
    let state = scenario.build_state(predictor)?;
    let completed = AtomicU32::new(0);

    info!(
        "Starting batch run: {} battles of '{}'",
        config.count, scenario.name
    );

    let run = |i: u32| {
        let seed = config.seed_start.wrapping_add(u64::from(i));
        let metrics = run_single_battle(predictor, scenario, &state, i, seed);
        let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
        if done % 100 == 0 {
            debug!("Progress: {}/{}", done, config.count);
        }
        metrics
    };

    let battles: Vec<BattleMetrics> = if config.parallel {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads as usize)
            .build();
        match pool {
            Ok(pool) => pool.install(|| (0..config.count).into_par_iter().map(run).collect()),
            Err(e) => {
                warn!("Failed to build thread pool: {}, using the global pool", e);
                (0..config.count).into_par_iter().map(run).collect()
            }
        }
    } else {
        (0..config.count).map(run).collect()
    };

    let summary = BatchSummary::from_battles(&battles);
    let duration_seconds = start.elapsed().as_secs_f64();

    info!(
        "Batch complete: {} battles in {:.2}s ({:.1} battles/sec)",
        battles.len(),
        duration_seconds,
        battles.len() as f64 / duration_seconds.max(1e-9)
    );

    Ok(BatchResults {
        config,
        battles,
        summary,
        duration_seconds,
    })
}

/// Outcome of a determinism check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyReport {
    /// Runs compared.
    pub runs: u32,
    /// Result hash of each run.
    pub hashes: Vec<u64>,
    /// Whether every run produced byte-identical results.
    pub is_deterministic: bool,
}

/// Predict the scenario `runs` times with the same seed and compare the
/// serialized results byte for byte.
pub fn verify_determinism(
    predictor: &CombatPredictor,
    scenario: &Scenario,
    seed: u64,
    runs: u32,
) -> Result<VerifyReport, ScenarioError> {
    let state = scenario.build_state(predictor)?;
    let mut reference: Option<Vec<u8>> = None;
    let mut hashes = Vec::with_capacity(runs as usize);
    let mut is_deterministic = true;

    for _ in 0..runs {
        let result = predictor.predict_engage(
            state.clone(),
            &scenario.settings,
            scenario.defender,
            &mut SeededRng::new(seed),
        );
        let bytes = result.serialize()?;
        hashes.push(result.fingerprint()?);
        match &reference {
            Some(first) if *first != bytes => is_deterministic = false,
            Some(_) => {}
            None => reference = Some(bytes),
        }
    }

    Ok(VerifyReport {
        runs,
        hashes,
        is_deterministic,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::UnitGroup;
    use combat_test_utils::fixtures;

    fn lopsided() -> Scenario {
        Scenario {
            one: vec![UnitGroup::new("Marine", 6)],
            two: vec![UnitGroup::new("Zergling", 3)],
            ..Scenario::default()
        }
    }

    #[test]
    fn test_batch_config_default() {
        let config = BatchConfig::default();
        assert_eq!(config.count, 100);
        assert!(config.parallel);
    }

    #[test]
    fn test_batch_config_builder() {
        let config = BatchConfig::new("custom_scenario", 500)
            .with_output(PathBuf::from("/tmp/results"))
            .with_seed(12345)
            .with_parallel(false);

        assert_eq!(config.scenario, "custom_scenario");
        assert_eq!(config.count, 500);
        assert_eq!(config.seed_start, 12345);
        assert!(!config.parallel);
    }

    #[test]
    fn test_run_batch_small() {
        let predictor = fixtures::predictor();
        let results = run_batch(&predictor, &lopsided(), BatchConfig::new("test", 10)).unwrap();

        assert_eq!(results.battles.len(), 10);
        assert_eq!(results.summary.total_battles, 10);
        assert_eq!(results.summary.wins[0], 10);
        assert!(results.battles.iter().enumerate().all(|(i, b)| b.index == i as u32));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let predictor = fixtures::predictor();
        let scenario = lopsided();
        let parallel = run_batch(&predictor, &scenario, BatchConfig::new("p", 12).with_seed(3)).unwrap();
        let sequential = run_batch(
            &predictor,
            &scenario,
            BatchConfig::new("s", 12).with_seed(3).with_parallel(false),
        )
        .unwrap();
        assert_eq!(parallel.battles, sequential.battles);
    }

    #[test]
    fn test_verify_determinism() {
        let predictor = fixtures::predictor();
        let report = verify_determinism(&predictor, &Scenario::default(), 12345, 5).unwrap();
        assert!(report.is_deterministic);
        assert_eq!(report.hashes.len(), 5);
    }

    #[test]
    fn test_batch_results_save_load() {
        let predictor = fixtures::predictor();
        let results = run_batch(&predictor, &Scenario::default(), BatchConfig::new("test", 5)).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");

        results.save(&path).unwrap();
        assert!(path.exists());

        let loaded = BatchResults::load(&path).unwrap();
        assert_eq!(loaded.battles.len(), 5);
        assert_eq!(loaded.config.scenario, "test");
    }
}
