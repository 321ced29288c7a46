//! Matchup statistics over many seeded battles.
//!
//! The simulator is stochastic (target order, healer offsets, splash
//! rotation), so a single battle says little about a matchup. These helpers
//! run a battle under many seeds and summarize the outcomes.

use combat_core::predictor::CombatPredictor;
use combat_core::random::{mix_seed, SeededRng};
use combat_core::settings::{CombatSettings, Defender};
use combat_core::unit::{CombatState, Owner};

/// Statistics for a set of battles.
#[derive(Debug, Clone, Default)]
pub struct BattleStats {
    /// Total battles run.
    pub total_battles: u32,
    /// Wins for owner 1.
    pub wins_one: u32,
    /// Wins for owner 2.
    pub wins_two: u32,
    /// Battles with equal remaining health.
    pub draws: u32,
    /// Average simulated seconds.
    pub avg_time: f64,
    /// Average remaining value of the winner over its starting value.
    pub avg_remaining_ratio: f64,
}

impl BattleStats {
    /// Win rate for owner 1 (0.0 to 1.0).
    pub fn win_rate_one(&self) -> f64 {
        if self.total_battles == 0 {
            return 0.5;
        }
        self.wins_one as f64 / self.total_battles as f64
    }

    /// Win rate for owner 2 (0.0 to 1.0).
    pub fn win_rate_two(&self) -> f64 {
        if self.total_battles == 0 {
            return 0.5;
        }
        self.wins_two as f64 / self.total_battles as f64
    }

    /// Check if the matchup is balanced (owner 1 win rate within range).
    pub fn is_balanced(&self, min_rate: f64, max_rate: f64) -> bool {
        let rate = self.win_rate_one();
        rate >= min_rate && rate <= max_rate
    }
}

/// Predict `state` once per seed derived from `seed` and tally the outcomes.
pub fn run_matchup(
    predictor: &CombatPredictor,
    state: &CombatState,
    settings: &CombatSettings,
    defender: Defender,
    runs: u32,
    seed: u64,
) -> BattleStats {
    let catalog = predictor.catalog();
    let starting = Owner::BOTH.map(|owner| state.army_value(catalog, owner));

    let mut stats = BattleStats::default();
    let mut time_sum = 0.0;
    let mut ratio_sum = 0.0;

    for run in 0..runs {
        let mut rng = SeededRng::new(mix_seed(seed, u64::from(run)));
        let result = predictor.predict_engage(state.clone(), settings, defender, &mut rng);

        stats.total_battles += 1;
        time_sum += f64::from(result.time);
        match result.winner() {
            Some(owner) => {
                if owner == Owner::One {
                    stats.wins_one += 1;
                } else {
                    stats.wins_two += 1;
                }
                let index = owner.index();
                let remaining = result.state.army_value(catalog, owner);
                ratio_sum += f64::from(remaining / starting[index].max(0.01));
            }
            None => stats.draws += 1,
        }
    }

    if runs > 0 {
        stats.avg_time = time_sum / f64::from(runs);
        stats.avg_remaining_ratio = ratio_sum / f64::from(runs);
    }
    tracing::debug!(
        runs,
        wins_one = stats.wins_one,
        wins_two = stats.wins_two,
        "Matchup finished"
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn test_battle_stats_win_rate() {
        let stats = BattleStats {
            total_battles: 100,
            wins_one: 55,
            wins_two: 40,
            draws: 5,
            avg_time: 12.0,
            avg_remaining_ratio: 0.3,
        };

        assert!((stats.win_rate_one() - 0.55).abs() < 0.001);
        assert!((stats.win_rate_two() - 0.40).abs() < 0.001);
        assert!(stats.is_balanced(0.45, 0.55));
    }

    #[test]
    fn test_empty_stats_are_even() {
        let stats = BattleStats::default();
        assert_eq!(stats.win_rate_one(), 0.5);
        assert_eq!(stats.win_rate_two(), 0.5);
    }

    #[test]
    fn test_army_value_scales_with_health() {
        let catalog = fixtures::catalog();
        let mut state = fixtures::battle(&[("Marine", 2)], &[("Zergling", 1)]);
        assert_eq!(state.army_value(&catalog, Owner::One), 100.0);
        state.units[0].kill();
        assert_eq!(state.army_value(&catalog, Owner::One), 50.0);
        assert_eq!(state.army_value(&catalog, Owner::Two), 25.0);
    }

    #[test]
    fn test_outnumbered_zerglings_lose() {
        let predictor = fixtures::predictor();
        let state = fixtures::battle(&[("Marine", 6)], &[("Zergling", 3)]);
        let stats = run_matchup(
            &predictor,
            &state,
            &CombatSettings::default(),
            Defender::default(),
            10,
            99,
        );
        assert_eq!(stats.total_battles, 10);
        assert_eq!(stats.wins_one, 10);
        assert!(stats.avg_remaining_ratio > 0.0 && stats.avg_remaining_ratio <= 1.0);
    }
}
