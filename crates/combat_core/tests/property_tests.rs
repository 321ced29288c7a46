//! Property-based tests for the simulator and the genetic operators.

use combat_core::prelude::*;
use combat_test_utils::determinism::strategies::*;
use combat_test_utils::fixtures;
use proptest::prelude::*;

fn available() -> AvailableUnitTypes {
    AvailableUnitTypes::from_names(
        &fixtures::catalog(),
        &[("Marine", 12), ("Marauder", 6), ("Medivac", 1), ("SiegeTank", 3)],
    )
    .expect("bundled names")
}

fn arb_counts() -> impl Strategy<Value = Vec<u32>> {
    proptest::collection::vec(0u32..=20, 4)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_health_stays_in_bounds(
        one in arb_army(3),
        two in arb_army(3),
        settings in arb_settings(),
        seed in arb_seed(),
    ) {
        let state = fixtures::battle(&one, &two);
        let result = fixtures::predictor().predict_engage(
            state,
            &settings,
            Defender::default(),
            &mut SeededRng::new(seed),
        );
        for unit in &result.state.units {
            prop_assert!(unit.invariants_hold(), "unit out of bounds: {unit:?}");
        }
    }

    #[test]
    fn prop_result_keeps_input_order(
        one in arb_army(3),
        two in arb_army(3),
        seed in arb_seed(),
    ) {
        let state = fixtures::battle(&one, &two);
        let before: Vec<_> = state.units.iter().map(|u| (u.owner, u.unit_type)).collect();
        let result = fixtures::predictor().predict_engage(
            state,
            &CombatSettings::default(),
            Defender::default(),
            &mut SeededRng::new(seed),
        );
        let after: Vec<_> = result
            .state
            .units
            .iter()
            .take(before.len())
            .map(|u| (u.owner, u.unit_type))
            .collect();
        prop_assert_eq!(before, after);
    }

    #[test]
    fn prop_battle_ends_near_max_time(
        one in arb_army(2),
        two in arb_army(2),
        settings in arb_settings(),
        seed in arb_seed(),
    ) {
        let state = fixtures::battle(&one, &two);
        let result = fixtures::predictor().predict_engage(
            state,
            &settings,
            Defender::default(),
            &mut SeededRng::new(seed),
        );
        prop_assert!(result.time >= settings.start_time);
        prop_assert!(result.time <= settings.max_time + 5.0);
    }

    #[test]
    fn prop_scale_respects_maxima(counts in arb_counts(), factor in 0.0f32..4.0) {
        let available = available();
        let mut gene = CompositionGene::from_counts(counts, &available);
        gene.scale(factor, &available);
        for (i, &count) in gene.counts().iter().enumerate() {
            prop_assert!(count <= available.maximum(i));
        }
    }

    #[test]
    fn prop_mutate_respects_maxima(counts in arb_counts(), seed in arb_seed(), rate in 0.0f64..=1.0) {
        let available = available();
        let mut gene = CompositionGene::from_counts(counts, &available);
        gene.mutate(rate, &mut SeededRng::new(seed), &available);
        prop_assert_eq!(gene.len(), available.len());
        for (i, &count) in gene.counts().iter().enumerate() {
            prop_assert!(count <= available.maximum(i));
        }
    }

    #[test]
    fn prop_crossover_takes_parent_slots(a in arb_counts(), b in arb_counts(), seed in arb_seed()) {
        let available = available();
        let a = CompositionGene::from_counts(a, &available);
        let b = CompositionGene::from_counts(b, &available);
        let child = CompositionGene::crossover(&a, &b, CrossoverMode::PerSlot, &mut SeededRng::new(seed));
        for i in 0..child.len() {
            let c = child.counts()[i];
            prop_assert!(c == a.counts()[i] || c == b.counts()[i]);
        }
    }

    #[test]
    fn prop_materialize_round_trips(counts in arb_counts()) {
        let available = available();
        let gene = CompositionGene::from_counts(counts, &available);
        let composition = gene.materialize(&available);
        prop_assert_eq!(composition.unit_count(), gene.total());
        prop_assert_eq!(CompositionGene::from_units(&available, &composition), gene);
    }
}

// =============================================================================
// Battle symmetry and monotonicity
// =============================================================================

fn predict(state: CombatState, defender: Defender, seed: u64) -> CombatResult {
    fixtures::predictor().predict_engage(state, &CombatSettings::default(), defender, &mut SeededRng::new(seed))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Swapping owners and the defender only changes the random stream, so a
    /// battle won with a clear margin keeps its winner.
    #[test]
    fn prop_owner_swap_same_winner(
        one in arb_army(2),
        two in arb_army(2),
        seed in arb_seed(),
    ) {
        let defender = Defender::default();
        let result = predict(fixtures::battle(&one, &two), defender, seed);
        let swapped = predict(fixtures::battle(&two, &one), defender.swapped(), seed);

        let Some(winner) = result.winner() else {
            return Ok(());
        };
        let start = fixtures::battle(&one, &two);
        let margin = result.state.total_health(winner) / start.total_health(winner);
        let loser_gone = result.state.total_health(winner.opponent()) == 0.0;
        if loser_gone && margin > 0.4 {
            prop_assert_eq!(swapped.winner(), Some(winner.opponent()));
        }
    }

    #[test]
    fn prop_extra_unit_never_lowers_average_health(
        one in arb_army(2),
        two in arb_army(2),
        seed in arb_seed(),
    ) {
        let mut more = one.clone();
        more[0].1 += 1;

        let fewer = predict(fixtures::battle(&one, &two), Defender::default(), seed);
        let extra = predict(fixtures::battle(&more, &two), Defender::default(), seed);
        prop_assert!(
            extra.average_health_time[0] >= fewer.average_health_time[0],
            "{:?} -> {:?} vs {:?}: {} -> {}",
            one,
            more,
            two,
            fewer.average_health_time[0],
            extra.average_health_time[0],
        );
    }
}
