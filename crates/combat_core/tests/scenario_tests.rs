//! Battle scenarios against the bundled catalog.
//!
//! These pin down outcomes that are not in doubt in the real game, so a
//! change to the model that flips one of them is a regression.

use combat_core::prelude::*;
use combat_core::surround::max_surround;
use combat_test_utils::fixtures;

fn winner(state: CombatState) -> Option<Owner> {
    winner_with(state, &CombatSettings::default(), Defender::default())
}

fn winner_with(state: CombatState, settings: &CombatSettings, defender: Defender) -> Option<Owner> {
    fixtures::predictor()
        .predict_engage(state, settings, defender, &mut SeededRng::new(1))
        .winner()
}

fn shielded_marines(owner: Owner, n: usize) -> Vec<CombatUnit> {
    (0..n)
        .map(|_| CombatUnit::new(owner, fixtures::unit_type("Marine"), 50.0, false))
        .collect()
}

fn zerglings(owner: Owner, n: usize) -> Vec<CombatUnit> {
    (0..n)
        .map(|_| CombatUnit::new(owner, fixtures::unit_type("Zergling"), 35.0, false))
        .collect()
}

// =============================================================================
// Marines and zerglings
// =============================================================================

#[test]
fn test_one_marine_beats_one_zergling() {
    let mut units = shielded_marines(Owner::One, 1);
    units.extend(zerglings(Owner::Two, 1));
    assert_eq!(winner(CombatState::new(units)), Some(Owner::One));
}

#[test]
fn test_marine_zergling_owner_swap() {
    let mut units = shielded_marines(Owner::Two, 1);
    units.extend(zerglings(Owner::One, 1));
    assert_eq!(
        winner_with(CombatState::new(units), &CombatSettings::default(), Defender::Owner(Owner::Two)),
        Some(Owner::Two)
    );
}

#[test]
fn test_four_marines_beat_four_zerglings() {
    let mut units = shielded_marines(Owner::One, 4);
    units.extend(zerglings(Owner::Two, 4));
    assert_eq!(winner(CombatState::new(units)), Some(Owner::One));
}

#[test]
fn test_three_zerglings_beat_one_marine() {
    let mut units = shielded_marines(Owner::One, 1);
    units.extend(zerglings(Owner::Two, 3));
    assert_eq!(winner(CombatState::new(units)), Some(Owner::Two));
}

#[test]
fn test_more_marines_keep_more_health() {
    let predictor = fixtures::predictor();
    let run = |marines: u32| {
        let state = fixtures::battle(&[("Marine", marines)], &[("Zergling", 3)]);
        predictor.predict_engage(state, &CombatSettings::default(), Defender::default(), &mut SeededRng::new(4))
    };
    let few = run(1);
    let many = run(6);
    assert!(many.average_health_time[0] > few.average_health_time[0]);
    assert_eq!(many.winner(), Some(Owner::One));
}

// =============================================================================
// Air and air-targetable units
// =============================================================================

#[test]
fn test_viking_beats_colossus() {
    let state = fixtures::battle(&[("VikingFighter", 1)], &[("Colossus", 1)]);
    assert_eq!(winner(state), Some(Owner::One));
}

#[test]
fn test_liberator_hits_colossus() {
    let state = fixtures::battle(&[("Liberator", 1)], &[("Colossus", 1)]);
    assert_eq!(winner(state), Some(Owner::One));
}

#[test]
fn test_battlecruiser_beats_thor() {
    let state = fixtures::battle(&[("Battlecruiser", 1)], &[("Thor", 1)]);
    assert_eq!(winner(state), Some(Owner::One));
}

#[test]
fn test_unarmed_sides_stop_immediately() {
    let predictor = fixtures::predictor();
    let state = fixtures::battle(&[("Overlord", 2)], &[("Observer", 1)]);
    let result = predictor.predict_engage(state, &CombatSettings::default(), Defender::default(), &mut SeededRng::new(1));
    assert!(result.time <= 1.0);
    assert!(result.state.units.iter().all(|u| u.health == u.health_max));
}

// =============================================================================
// Upgrades
// =============================================================================

#[test]
fn test_weapon_upgrades_turn_mirror_match() {
    let predictor = fixtures::predictor();
    let mut upgrades = UpgradeSet::new();
    for upgrade in UpgradeFamily::TerranInfantryWeapons.levels() {
        upgrades.insert(upgrade);
    }
    let environment = predictor.get_combat_environment(UpgradeSet::new(), upgrades);
    let state = fixtures::battle(&[("Marine", 8)], &[("Marine", 8)]).with_environment(environment);
    assert_eq!(
        winner_with(state, &CombatSettings::default(), Defender::Neutral),
        Some(Owner::Two)
    );
}

#[test]
fn test_environments_are_shared() {
    let predictor = fixtures::predictor();
    let mut upgrades = UpgradeSet::new();
    upgrades.insert(UpgradeFamily::ZergMeleeWeapons.at(UpgradeLevel::One));
    let a = predictor.get_combat_environment(upgrades, UpgradeSet::new());
    let b = predictor.get_combat_environment(upgrades, UpgradeSet::new());
    assert!(std::sync::Arc::ptr_eq(&a, &b));
}

// =============================================================================
// Surround limits
// =============================================================================

#[test]
fn test_surround_reference_values() {
    let catalog = fixtures::catalog();
    let melee = catalog.melee_reference_radius();
    let marine = catalog.get(fixtures::unit_type("Marine")).radius;
    let area = marine * marine * std::f32::consts::PI;

    let one = max_surround(area, 1, melee);
    assert_eq!((one.max_attackers_per_defender, one.max_melee_attackers), (6, 6));
    let two = max_surround(area * 2.0, 2, melee);
    assert_eq!((two.max_attackers_per_defender, two.max_melee_attackers), (4, 8));
    let three = max_surround(area * 3.0, 3, melee);
    assert_eq!((three.max_attackers_per_defender, three.max_melee_attackers), (3, 9));
}

// =============================================================================
// Result cache
// =============================================================================

#[test]
fn test_cached_prediction_matches_uncached() {
    let cached = fixtures::predictor().with_result_cache();
    let state = fixtures::battle(&[("Stalker", 4), ("Zealot", 2)], &[("Roach", 5), ("Zergling", 6)]);

    let settings = CombatSettings::default();
    let first = cached.predict_engage(state.clone(), &settings, Defender::default(), &mut SeededRng::new(2));
    let second = cached.predict_engage(state.clone(), &settings, Defender::default(), &mut SeededRng::new(99));
    assert_eq!(cached.cache_len(), 1);
    assert_eq!(first.time, second.time);

    for (before, after) in state.units.iter().zip(&second.state.units) {
        assert_eq!(before.unit_type, after.unit_type);
        assert_eq!(before.owner, after.owner);
    }
}
