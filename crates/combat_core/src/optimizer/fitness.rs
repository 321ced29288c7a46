//! Fitness of a simulated composition.

use serde::{Deserialize, Serialize};

use super::available::AvailableUnitTypes;
use super::gene::CompositionGene;
use super::search::CompositionSearchSettings;
use super::GENE_OWNER;
use crate::build_time::BuildEstimate;
use crate::predictor::CombatPredictor;
use crate::random::RandomSource;
use crate::unit::{CombatResult, CombatState, Owner};
use crate::upgrades::UpgradeSet;

const VESPENE_WEIGHT: f32 = 1.2;
const ARMED_LOSS_FACTOR: f32 = -10.0;
const UNARMED_LOSS_FACTOR: f32 = -1.0;
const TEMPORARY_COST: f32 = 5.0;
const TEMPORARY_LOSS_FACTOR: f32 = -100.0;
const GROUND_GRACE_TIME: f32 = 20.0;
const GROUND_PENALTY: f32 = 1000.0;
const LOSING_PENALTY: f32 = -10_000.0;
const FIXED_TIME_OWN_WEIGHT: f32 = 0.001;

/// Which score drives the search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitnessMode {
    /// [`mineral_score`].
    #[default]
    MineralScore,
    /// [`mineral_score_fixed_time`].
    FixedTime,
}

#[derive(Debug, Default)]
struct Tally {
    our: f32,
    enemy: f32,
    loss: f32,
    our_damage_cost: f32,
}

fn damage_taken_fraction(before_health: f32, before_shield: f32, max: f32, after: f32) -> f32 {
    (before_health + before_shield - after) / max.max(0.01)
}

/// Score the units present at the start of the battle.
fn tally(predictor: &CombatPredictor, initial: &CombatState, result: &CombatResult, player: Owner) -> Tally {
    let catalog = predictor.catalog();
    let env = predictor.default_environment();
    let mut tally = Tally::default();

    for (before, after) in initial.units.iter().zip(&result.state.units) {
        debug_assert_eq!(before.unit_type, after.unit_type, "result order differs from input");
        let fraction = damage_taken_fraction(
            before.health,
            before.shield,
            before.max_total_health(),
            after.health + after.shield,
        );
        let cost = catalog.get(before.unit_type).weighted_cost(VESPENE_WEIGHT);

        if before.owner == player {
            tally.our -= cost * (1.0 + fraction);
            tally.our_damage_cost += cost * fraction;
        } else {
            let armed = env.combat_info(after.owner, after.unit_type).max_dps() > 0.0;
            let factor = if armed {
                ARMED_LOSS_FACTOR
            } else {
                UNARMED_LOSS_FACTOR
            };
            tally.loss += cost * factor * (1.0 - fraction);
            tally.enemy += cost * (1.0 + fraction);
        }
    }
    tally
}

fn purchase_cost(predictor: &CombatPredictor, estimate: &BuildEstimate, upgrades: &UpgradeSet) -> f32 {
    let research: f32 = upgrades
        .iter()
        .filter_map(|u| predictor.catalog().upgrade(u))
        .map(|data| data.minerals + VESPENE_WEIGHT * data.vespene)
        .sum();
    research + estimate.minerals + VESPENE_WEIGHT * estimate.vespene
}

/// Weight of enemy value, 1 up to 30 seconds of production and decaying after.
fn time_multiplier(estimate: &BuildEstimate) -> f32 {
    (60.0 / (30.0 + estimate.time.max(0.0))).clamp(0.0, 1.0)
}

/// Penalty for battles dragging on without any own ground unit left.
fn ground_penalty(result: &CombatResult, player: Owner) -> f32 {
    if result.time <= GROUND_GRACE_TIME {
        return 0.0;
    }
    let has_ground = result
        .state
        .units_of(player)
        .any(|u| u.is_alive() && !u.is_flying);
    if has_ground {
        0.0
    } else {
        GROUND_PENALTY * (result.time - GROUND_GRACE_TIME) / GROUND_GRACE_TIME
    }
}

/// Score of `player`'s side after a battle.
///
/// Own units count against the score by their cost, more so when damaged.
/// Enemy damage counts for it, discounted by production time. Enemies left
/// alive are penalized, ten times as much when they can still fight.
/// Spawned enemy units are cheap but very costly to leave alive. Upgrades
/// and the estimated purchase are subtracted.
#[must_use]
pub fn mineral_score(
    predictor: &CombatPredictor,
    initial: &CombatState,
    result: &CombatResult,
    player: Owner,
    estimate: &BuildEstimate,
    upgrades: &UpgradeSet,
) -> f32 {
    debug_assert!(result.state.units.len() >= initial.units.len());
    let mut tally = tally(predictor, initial, result, player);

    for spawned in result.state.units.iter().skip(initial.units.len()) {
        if spawned.owner == player {
            continue;
        }
        let fraction = 1.0 - spawned.total_health() / spawned.max_total_health().max(0.01);
        tally.loss += TEMPORARY_COST * TEMPORARY_LOSS_FACTOR * (1.0 - fraction);
        tally.enemy += TEMPORARY_COST * (1.0 + fraction);
    }

    tally.our -= purchase_cost(predictor, estimate, upgrades);

    tally.our + tally.enemy * time_multiplier(estimate) + tally.loss - ground_penalty(result, player)
}

/// Score for a fixed engagement time: losing is heavily penalized, winners
/// are ranked by enemy value destroyed minus own value lost.
#[must_use]
pub fn mineral_score_fixed_time(
    predictor: &CombatPredictor,
    initial: &CombatState,
    result: &CombatResult,
    player: Owner,
    estimate: &BuildEstimate,
    upgrades: &UpgradeSet,
) -> f32 {
    if result.winner() != Some(player) {
        return LOSING_PENALTY + mineral_score(predictor, initial, result, player, estimate, upgrades);
    }

    let mut tally = tally(predictor, initial, result, player);
    tally.our -= purchase_cost(predictor, estimate, upgrades);
    tally.enemy -= tally.our_damage_cost;

    tally.enemy * time_multiplier(estimate) + tally.our * FIXED_TIME_OWN_WEIGHT
        - ground_penalty(result, player)
}

/// Simulate `gene` against `opponent` and score it.
///
/// Only upgrades the opponent state does not already give the gene's owner
/// are charged for.
pub fn calculate_fitness<R: RandomSource + ?Sized>(
    predictor: &CombatPredictor,
    opponent: &CombatState,
    available: &AvailableUnitTypes,
    gene: &CompositionGene,
    estimate: &BuildEstimate,
    settings: &CompositionSearchSettings,
    rng: &mut R,
) -> f32 {
    let mut state = opponent.clone();
    let mut upgrades = gene.materialize(available).upgrades;
    if let Some(env) = &state.environment {
        upgrades.remove_all(env.upgrades(GENE_OWNER));
    }
    gene.add_to_state(predictor, &mut state, available, GENE_OWNER);

    let result = predictor.predict_engage(state.clone(), &settings.combat, settings.defender, rng);
    let score = match settings.fitness {
        FitnessMode::MineralScore => mineral_score,
        FitnessMode::FixedTime => mineral_score_fixed_time,
    };
    score(predictor, &state, &result, GENE_OWNER, estimate, &upgrades)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::data::{UnitCatalog, UnitTypeId};
    use crate::unit::CombatUnit;

    const CATALOG: &str = r#"
        CatalogData(
            melee_reference: "Zergling",
            units: [
                UnitData(name: "Marine", race: Terran, radius: 0.375, speed: 2.25, health: 45.0,
                    attributes: [Light, Biological], cost: Cost(minerals: 50.0, supply: 1.0),
                    weapons: [WeaponData(damage: 6.0, cooldown: 0.8608, range: 5.0, target: Any)]),
                UnitData(name: "Zergling", race: Zerg, radius: 0.375, speed: 2.95, health: 35.0, melee: true,
                    cost: Cost(minerals: 25.0, supply: 0.5),
                    weapons: [WeaponData(damage: 5.0, cooldown: 0.696, range: 0.1, target: Ground)]),
                UnitData(name: "Overlord", race: Zerg, radius: 1.0, health: 200.0, flying: true,
                    cost: Cost(minerals: 100.0)),
                UnitData(name: "Viking", race: Terran, radius: 0.75, health: 135.0, flying: true,
                    cost: Cost(minerals: 150.0, vespene: 75.0, supply: 2.0),
                    weapons: [WeaponData(damage: 10.0, attacks: 2, cooldown: 1.43, range: 9.0, target: Air)]),
            ],
        )
    "#;

    fn predictor() -> CombatPredictor {
        CombatPredictor::new(Arc::new(UnitCatalog::from_ron_str(CATALOG).unwrap()))
    }

    fn unit(p: &CombatPredictor, owner: Owner, name: &str) -> CombatUnit {
        p.make_unit(owner, p.catalog().lookup(name).unwrap())
    }

    fn result(state: CombatState, time: f32) -> CombatResult {
        CombatResult {
            state,
            time,
            average_health_time: [0.0; 2],
        }
    }

    #[test]
    fn test_killing_armed_enemies_scores_higher() {
        let p = predictor();
        let initial = CombatState::new(vec![
            unit(&p, Owner::One, "Zergling"),
            unit(&p, Owner::Two, "Marine"),
        ]);
        let untouched = result(initial.clone(), 5.0);
        let mut won = initial.clone();
        won.units[0].kill();
        let won = result(won, 5.0);

        let estimate = BuildEstimate::default();
        let upgrades = UpgradeSet::new();
        let a = mineral_score(&p, &initial, &untouched, Owner::Two, &estimate, &upgrades);
        let b = mineral_score(&p, &initial, &won, Owner::Two, &estimate, &upgrades);
        // ling cost 25: loss -250 becomes 0, enemy 25 becomes 50
        assert!((b - a - 275.0).abs() < 1e-3, "{a} {b}");
    }

    #[test]
    fn test_unarmed_survivors_penalized_less() {
        let p = predictor();
        let estimate = BuildEstimate::default();
        let upgrades = UpgradeSet::new();

        let armed = CombatState::new(vec![unit(&p, Owner::One, "Zergling"), unit(&p, Owner::Two, "Marine")]);
        let unarmed = CombatState::new(vec![unit(&p, Owner::One, "Overlord"), unit(&p, Owner::Two, "Marine")]);

        let armed_score = mineral_score(&p, &armed, &result(armed.clone(), 1.0), Owner::Two, &estimate, &upgrades);
        let unarmed_score =
            mineral_score(&p, &unarmed, &result(unarmed.clone(), 1.0), Owner::Two, &estimate, &upgrades);
        // ling: -50 + 25 - 250; overlord: -50 + 100 - 100
        assert!((armed_score - -275.0).abs() < 1e-3);
        assert!((unarmed_score - -50.0).abs() < 1e-3);
    }

    #[test]
    fn test_purchase_and_time_reduce_score() {
        let p = predictor();
        let initial = CombatState::new(vec![unit(&p, Owner::One, "Zergling"), unit(&p, Owner::Two, "Marine")]);
        let mut after = initial.clone();
        after.units[0].kill();
        let after = result(after, 2.0);
        let upgrades = UpgradeSet::new();

        let quick = mineral_score(&p, &initial, &after, Owner::Two, &BuildEstimate::default(), &upgrades);
        let slow = mineral_score(
            &p,
            &initial,
            &after,
            Owner::Two,
            &BuildEstimate {
                time: 90.0,
                minerals: 50.0,
                vespene: 0.0,
            },
            &upgrades,
        );
        assert!(slow < quick - 50.0);
    }

    #[test]
    fn test_air_only_survivor_penalized_in_long_battles() {
        let p = predictor();
        let initial = CombatState::new(vec![unit(&p, Owner::One, "Overlord"), unit(&p, Owner::Two, "Viking")]);
        let estimate = BuildEstimate::default();
        let upgrades = UpgradeSet::new();

        let short = mineral_score(&p, &initial, &result(initial.clone(), 20.0), Owner::Two, &estimate, &upgrades);
        let long = mineral_score(&p, &initial, &result(initial.clone(), 40.0), Owner::Two, &estimate, &upgrades);
        assert!((short - long - 1000.0).abs() < 1e-2);
    }

    #[test]
    fn test_spawned_enemy_survivors_are_costly() {
        let p = predictor();
        let initial = CombatState::new(vec![unit(&p, Owner::Two, "Marine")]);
        let mut with_spawn = initial.clone();
        with_spawn.units.push(CombatUnit::new(Owner::One, UnitTypeId(1), 35.0, false));
        let mut spawn_dead = with_spawn.clone();
        spawn_dead.units[1].kill();

        let estimate = BuildEstimate::default();
        let upgrades = UpgradeSet::new();
        let alive = mineral_score(&p, &initial, &result(with_spawn, 5.0), Owner::Two, &estimate, &upgrades);
        let dead = mineral_score(&p, &initial, &result(spawn_dead, 5.0), Owner::Two, &estimate, &upgrades);
        assert!((dead - alive - 505.0).abs() < 1e-3);
    }

    #[test]
    fn test_fixed_time_penalizes_losing() {
        let p = predictor();
        let initial = CombatState::new(vec![unit(&p, Owner::One, "Zergling"), unit(&p, Owner::Two, "Marine")]);
        let estimate = BuildEstimate::default();
        let upgrades = UpgradeSet::new();

        let mut lost = initial.clone();
        lost.units[1].kill();
        let lost_score = mineral_score_fixed_time(&p, &initial, &result(lost, 5.0), Owner::Two, &estimate, &upgrades);

        let mut won = initial.clone();
        won.units[0].kill();
        let won_score = mineral_score_fixed_time(&p, &initial, &result(won, 5.0), Owner::Two, &estimate, &upgrades);

        assert!(lost_score < -9000.0);
        // enemy 50 minus no own damage, own -50 scaled down
        assert!((won_score - (50.0 - 0.05)).abs() < 1e-3);
    }
}
