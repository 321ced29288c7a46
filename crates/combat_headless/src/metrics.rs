//! Battle metrics for batch statistics and JSON output.

use std::collections::BTreeMap;

use combat_core::data::UnitCatalog;
use combat_core::optimizer::SearchOutcome;
use combat_core::unit::{CombatResult, Owner};
use serde::{Deserialize, Serialize};

/// Outcome of one predicted battle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BattleMetrics {
    /// Index within the batch.
    pub index: u32,
    /// Random seed used.
    pub seed: u64,
    /// Winning owner id (None = draw).
    pub winner: Option<u8>,
    /// Simulated seconds.
    pub time: f32,
    /// Time-integrated health fraction per owner.
    pub average_health_time: [f32; 2],
    /// Surviving units per owner.
    pub survivors: [u32; 2],
    /// Resource value left per owner, scaled by remaining health.
    pub remaining_value: [f32; 2],
    /// Hash of the serialized result (for determinism validation).
    pub result_hash: u64,
}

impl BattleMetrics {
    /// Metrics of `result`.
    #[must_use]
    pub fn from_result(catalog: &UnitCatalog, index: u32, seed: u64, result: &CombatResult) -> Self {
        let survivors = Owner::BOTH.map(|owner| {
            result
                .state
                .units_of(owner)
                .filter(|u| u.is_alive())
                .count() as u32
        });
        let remaining_value = Owner::BOTH.map(|owner| result.state.army_value(catalog, owner));
        Self {
            index,
            seed,
            winner: result.winner().map(Owner::id),
            time: result.time,
            average_health_time: result.average_health_time,
            survivors,
            remaining_value,
            result_hash: result.fingerprint().unwrap_or_default(),
        }
    }
}

/// Aggregate statistics over a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Number of battles.
    pub total_battles: u32,
    /// Wins per owner.
    pub wins: [u32; 2],
    /// Battles without a winner.
    pub draws: u32,
    /// Win rate keyed by "owner1"/"owner2".
    pub win_rates: BTreeMap<String, f64>,
    /// Mean simulated seconds.
    pub avg_time: f64,
    /// Mean remaining value per owner.
    pub avg_remaining_value: [f64; 2],
    /// Distinct result hashes seen.
    pub distinct_outcomes: usize,
}

impl BatchSummary {
    /// Summarize `battles`.
    #[must_use]
    pub fn from_battles(battles: &[BattleMetrics]) -> Self {
        let mut summary = Self {
            total_battles: battles.len() as u32,
            ..Self::default()
        };
        if battles.is_empty() {
            return summary;
        }

        let mut hashes = Vec::with_capacity(battles.len());
        for battle in battles {
            match battle.winner {
                Some(1) => summary.wins[0] += 1,
                Some(_) => summary.wins[1] += 1,
                None => summary.draws += 1,
            }
            summary.avg_time += f64::from(battle.time);
            for i in 0..2 {
                summary.avg_remaining_value[i] += f64::from(battle.remaining_value[i]);
            }
            hashes.push(battle.result_hash);
        }

        let n = battles.len() as f64;
        summary.avg_time /= n;
        for value in &mut summary.avg_remaining_value {
            *value /= n;
        }
        for (i, wins) in summary.wins.iter().enumerate() {
            summary
                .win_rates
                .insert(format!("owner{}", i + 1), f64::from(*wins) / n);
        }
        hashes.sort_unstable();
        hashes.dedup();
        summary.distinct_outcomes = hashes.len();
        summary
    }
}

/// One unit line of an optimizer report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitCount {
    /// Catalog name.
    pub unit: String,
    /// How many.
    pub count: u32,
}

/// JSON form of a composition search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationReport {
    /// Scenario name.
    pub scenario: String,
    /// Search seed.
    pub seed: u64,
    /// Best army found.
    pub units: Vec<UnitCount>,
    /// Upgrades in the best army.
    pub upgrades: Vec<String>,
    /// Fitness of the best army.
    pub fitness: f32,
    /// Estimated seconds to build it.
    pub build_time: f32,
    /// Best and mean fitness per generation.
    pub history: Vec<(f32, f32)>,
}

impl OptimizationReport {
    /// Report for `outcome`.
    #[must_use]
    pub fn new(catalog: &UnitCatalog, scenario: &str, seed: u64, outcome: &SearchOutcome) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            units: outcome
                .best
                .units
                .iter()
                .map(|&(unit_type, count)| UnitCount {
                    unit: catalog.get(unit_type).name.clone(),
                    count,
                })
                .collect(),
            upgrades: outcome
                .best
                .upgrades
                .iter()
                .map(|upgrade| format!("{upgrade:?}"))
                .collect(),
            fitness: outcome.best_fitness,
            build_time: outcome.best_estimate.time,
            history: outcome
                .history
                .iter()
                .map(|g| (g.best_fitness, g.mean_fitness))
                .collect(),
        }
    }
}
