//! Discrete-time battle simulation.
//!
//! Two groups of units trade damage in coarse steps until one side is gone,
//! the time limit is reached or a whole pass changes nothing. Each step:
//!
//! 1. Pick the step length, growing from 1 to 5 seconds.
//! 2. Aggregate per-side presence (air, ground, footprint) and accumulate
//!    the time-weighted health average.
//! 3. Derive melee surround limits from the opposing footprint.
//! 4. Measure Guardian Shield coverage.
//! 5. Run both sides' abilities.
//! 6. Let both sides pick targets against the same state. Damage is
//!    collected per unit and applied once both sides have attacked, so
//!    neither owner moves first.
//!
//! Positions are not modeled. Travel time is approximated from the
//! defending side's range and the attackers' movement speed.

use std::f32::consts::PI;
use std::sync::Arc;

use crate::abilities::{
    damage_multiplier, guardian_shield_coverage, AbilityOutcome, AbilityTable,
    GuardianShieldState, SideTurn, GUARDIAN_SHIELD_REDUCTION,
};
use crate::damage::{CombatEnvironment, WeaponProfile, WeaponSlot};
use crate::data::UnitCatalog;
use crate::random::{shuffle, RandomSource};
use crate::recording::CombatRecording;
use crate::settings::{CombatSettings, Defender};
use crate::surround::{max_surround, SurroundInfo};
use crate::unit::{CombatResult, CombatState, CombatUnit, Owner};

/// Upper bound on simulation passes.
pub const MAX_ITERATIONS: u32 = 100;

/// Wait used for units that cannot move into range.
const UNREACHABLE_WAIT: f32 = 100_000.0;

/// Score penalty for ranged units engaging outranging targets against a
/// mostly melee army.
const KITING_PENALTY: f32 = 1000.0;

/// Vespene weight in target value.
const TARGET_VESPENE_WEIGHT: f32 = 1.5;

/// Runs battles for one catalog.
#[derive(Debug, Clone, Copy)]
pub struct BattleSimulator<'a> {
    catalog: &'a UnitCatalog,
    abilities: &'a AbilityTable,
    default_environment: &'a Arc<CombatEnvironment>,
}

impl<'a> BattleSimulator<'a> {
    /// Create a simulator. `default_environment` is used for states without
    /// their own environment and for target valuation.
    #[must_use]
    pub fn new(
        catalog: &'a UnitCatalog,
        abilities: &'a AbilityTable,
        default_environment: &'a Arc<CombatEnvironment>,
    ) -> Self {
        Self {
            catalog,
            abilities,
            default_environment,
        }
    }

    /// Value of attacking `target` for a side with the given presence.
    ///
    /// Expensive, high-DPS targets score higher. Targets unable to hit any
    /// unit of the attacking side are heavily discounted.
    #[must_use]
    pub fn target_score(&self, target: &CombatUnit, has_ground: bool, has_air: bool) -> f32 {
        let data = self.catalog.get(target.unit_type);
        let cost = data.weighted_cost(TARGET_VESPENE_WEIGHT);
        let air_dps = self
            .default_environment
            .calculate_dps(Owner::One, target.unit_type, true);
        let ground_dps = self
            .default_environment
            .calculate_dps(Owner::One, target.unit_type, false);

        let score = 0.01 * cost + 1000.0 * air_dps.max(ground_dps);
        let harmless = (!has_ground && air_dps == 0.0)
            || (!has_air && ground_dps == 0.0)
            || (air_dps == 0.0 && ground_dps == 0.0);
        if harmless {
            score * 0.01
        } else {
            score
        }
    }

    /// Simulate a battle.
    ///
    /// The returned state keeps the input unit order, with dead units at 0
    /// health and spawned units appended at the end.
    pub fn simulate<R: RandomSource + ?Sized>(
        &self,
        mut state: CombatState,
        settings: &CombatSettings,
        defender: Defender,
        rng: &mut R,
        mut recording: Option<&mut CombatRecording>,
    ) -> CombatResult {
        let env = state
            .environment
            .clone()
            .unwrap_or_else(|| Arc::clone(self.default_environment));
        let rules = Rules {
            sim: self,
            env: &env,
            settings,
        };
        let melee_radius = self.catalog.melee_reference_radius();
        let units = &mut state.units;

        let mut groups = [
            owner_indices(units, Owner::One),
            owner_indices(units, Owner::Two),
        ];
        shuffle(rng, &mut groups[0]);
        shuffle(rng, &mut groups[1]);

        let (max_range_defender, fastest_attacker_speed) = rules.approach(units, &groups, defender);

        let mut time = settings.start_time;
        if time == 0.0 {
            for unit in units.iter_mut() {
                unit.buff_timer = 0.0;
            }
        }

        let recording_offset = recording.as_deref().map_or(0.0, |r| r.start_offset(time));
        let mut weighted = [0.0_f32; 2];
        let mut weights = [0.0_f32; 2];
        let mut changed = true;
        let mut iterations = 0;

        for it in 0..MAX_ITERATIONS {
            if !changed {
                break;
            }
            iterations = it + 1;
            let dt = (1.0 + it as f32 / 10.0).min(5.0);

            let stats = [
                rules.side_stats(units, &groups[0]),
                rules.side_stats(units, &groups[1]),
            ];
            for (side, s) in stats.iter().enumerate() {
                weighted[side] += s.health * dt;
                weights[side] += dt;
            }

            if let Some(recording) = recording.as_deref_mut() {
                recording.record(
                    recording_offset + time,
                    groups.iter().flatten().map(|&i| &units[i]),
                );
            }

            let surround = [
                max_surround(stats[1].area * PI, stats[1].ground, melee_radius),
                max_surround(stats[0].area * PI, stats[0].ground, melee_radius),
            ];

            let mut guardian = [
                guardian_shield_coverage(self.catalog, self.abilities, units, &groups[0], dt),
                guardian_shield_coverage(self.catalog, self.abilities, units, &groups[1], dt),
            ];

            let tick = Tick {
                time,
                dt,
                stats,
                surround,
                max_extra_melee_distance: (stats[0].area / PI).sqrt() * PI
                    + (stats[1].area / PI).sqrt() * PI,
                max_range_defender,
                fastest_attacker_speed,
                defender,
            };

            tracing::trace!(iteration = it, time, dt, "Battle pass");

            changed = false;
            let mut consumed: [Vec<bool>; 2] = Default::default();
            for side in Owner::BOTH {
                let i = side.index();
                let (did_change, used) =
                    rules.ability_turn(dt, units, &mut groups[i], &mut guardian[i], rng);
                changed |= did_change;
                consumed[i] = used;
            }

            let mut pending = vec![0.0_f32; units.len()];
            for side in Owner::BOTH {
                let shield = guardian[side.opponent().index()].fraction;
                changed |= rules.attack_turn(
                    &tick,
                    side,
                    units,
                    &groups,
                    &consumed[side.index()],
                    shield,
                    &mut pending,
                    rng,
                );
            }
            apply_damage(units, &mut groups, &pending);

            if cfg!(feature = "debug-validation") {
                for unit in units.iter() {
                    assert!(
                        unit.invariants_hold(),
                        "unit out of range after pass {it}: {unit:?}"
                    );
                }
            }

            time += dt;
            if time >= settings.max_time {
                break;
            }
        }

        let average_health_time = [
            weighted[0] / weights[0].max(0.01),
            weighted[1] / weights[1].max(0.01),
        ];

        tracing::debug!(
            iterations,
            time,
            health_one = state.total_health(Owner::One),
            health_two = state.total_health(Owner::Two),
            "Battle simulated"
        );

        CombatResult {
            state,
            time,
            average_health_time,
        }
    }
}

fn owner_indices(units: &[CombatUnit], owner: Owner) -> Vec<usize> {
    units
        .iter()
        .enumerate()
        .filter(|(_, u)| u.owner == owner)
        .map(|(i, _)| i)
        .collect()
}

/// Whether `unit` is still alive once `damage` is applied.
fn survives(unit: &CombatUnit, damage: f32) -> bool {
    unit.is_alive() && unit.barrier + unit.total_health() > damage
}

/// Apply the damage dealt during a pass and swap-remove the dead from
/// their groups. The state keeps dead units at 0 health.
fn apply_damage(units: &mut [CombatUnit], groups: &mut [Vec<usize>; 2], pending: &[f32]) {
    for (unit, &damage) in units.iter_mut().zip(pending) {
        if damage > 0.0 {
            unit.modify_health(-damage);
        }
    }
    for group in groups.iter_mut() {
        let mut k = 0;
        while k < group.len() {
            if units[group[k]].is_alive() {
                k += 1;
            } else {
                group.swap_remove(k);
            }
        }
    }
}

/// Seconds until a unit with `range` and `speed` can hit something
/// `distance` away.
#[must_use]
pub fn time_to_be_able_to_attack(range: f32, speed: f32, distance: f32) -> f32 {
    if speed > 0.0 {
        (distance - range).max(0.0) / speed
    } else {
        UNREACHABLE_WAIT
    }
}

/// Aggregates of one side's living units.
#[derive(Debug, Clone, Copy, Default)]
struct SideStats {
    /// Units air weapons can hit.
    air: u32,
    /// Units ground weapons can hit.
    ground: u32,
    /// Summed squared radii.
    area: f32,
    /// Summed health and shield.
    health: f32,
}

/// Per-pass values shared by both sides' turns.
#[derive(Debug, Clone, Copy)]
struct Tick {
    time: f32,
    dt: f32,
    stats: [SideStats; 2],
    surround: [SurroundInfo; 2],
    max_extra_melee_distance: f32,
    max_range_defender: f32,
    fastest_attacker_speed: f32,
    defender: Defender,
}

#[derive(Debug, Clone, Copy)]
struct TargetChoice {
    /// Position in the opposing group.
    position: usize,
    slot: WeaponSlot,
}

/// Read-only battle inputs.
struct Rules<'s, 'a> {
    sim: &'s BattleSimulator<'a>,
    env: &'s CombatEnvironment,
    settings: &'s CombatSettings,
}

impl Rules<'_, '_> {
    fn is_melee(&self, unit: &CombatUnit) -> bool {
        self.sim.catalog.get(unit.unit_type).melee
    }

    /// Longest defender range and fastest attacker speed.
    fn approach(&self, units: &[CombatUnit], groups: &[Vec<usize>; 2], defender: Defender) -> (f32, f32) {
        let range = |indices: &mut dyn Iterator<Item = usize>| {
            indices
                .map(|i| self.env.attack_range(units[i].owner, units[i].unit_type))
                .fold(0.0_f32, f32::max)
        };
        let speed = |indices: &mut dyn Iterator<Item = usize>| {
            indices
                .map(|i| self.sim.catalog.get(units[i].unit_type).speed)
                .fold(0.0_f32, f32::max)
        };

        match defender {
            Defender::Owner(owner) => (
                range(&mut groups[owner.index()].iter().copied()),
                speed(&mut groups[owner.opponent().index()].iter().copied()),
            ),
            Defender::Neutral => (range(&mut (0..units.len())), speed(&mut (0..units.len()))),
        }
    }

    fn side_stats(&self, units: &[CombatUnit], group: &[usize]) -> SideStats {
        let mut stats = SideStats::default();
        for unit in group.iter().map(|&i| &units[i]).filter(|u| u.is_alive()) {
            let data = self.sim.catalog.get(unit.unit_type);
            stats.air += u32::from(unit.is_flying || data.air_targetable);
            stats.ground += u32::from(!unit.is_flying);
            stats.area += data.radius * data.radius;
            stats.health += unit.total_health();
        }
        stats
    }

    /// Run the abilities of one side.
    ///
    /// Returns whether anything changed and, per acting group position,
    /// whether the ability took the unit's turn. Units spawned here act from
    /// the next pass on.
    fn ability_turn<R: RandomSource + ?Sized>(
        &self,
        dt: f32,
        units: &mut Vec<CombatUnit>,
        group: &mut Vec<usize>,
        guardian: &mut GuardianShieldState,
        rng: &mut R,
    ) -> (bool, Vec<bool>) {
        let acting = group.len();
        let mut consumed = vec![false; acting];
        let mut has_been_healed = vec![false; acting];
        let mut changed = false;

        for x in 0..acting {
            let index = group[x];
            if !units[index].is_alive() {
                continue;
            }
            let Some(handler) = self.sim.abilities.get(units[index].unit_type) else {
                continue;
            };
            let mut turn = SideTurn {
                catalog: self.sim.catalog,
                units: &mut *units,
                group: &mut *group,
                has_been_healed: &mut has_been_healed,
                guardian_shield: &mut *guardian,
                rng: &mut *rng,
                dt,
            };
            let (outcome, did_change) = turn.run(handler, x);
            changed |= did_change;
            consumed[x] = outcome == AbilityOutcome::Consumed;
        }

        (changed, consumed)
    }

    /// One side attacks the other, adding its damage to `pending`.
    /// Returns whether anything changed.
    #[allow(clippy::too_many_arguments)]
    fn attack_turn<R: RandomSource + ?Sized>(
        &self,
        tick: &Tick,
        side: Owner,
        units: &[CombatUnit],
        groups: &[Vec<usize>; 2],
        consumed: &[bool],
        opponent_shield: f32,
        pending: &mut [f32],
        rng: &mut R,
    ) -> bool {
        let settings = self.settings;
        let catalog = self.sim.catalog;
        let surround = tick.surround[side.index()];
        let own = tick.stats[side.index()];
        let g1 = &groups[side.index()];
        let g2 = &groups[side.opponent().index()];

        let living_melee = g2
            .iter()
            .filter(|&&i| units[i].is_alive() && self.is_melee(&units[i]))
            .count();
        let opponent_melee_fraction = if g2.is_empty() {
            0.0
        } else {
            living_melee as f32 / g2.len() as f32
        };

        let mut changed = false;
        let mut melee_used = 0_u32;
        let mut attackers_on = vec![0_u32; g2.len()];
        let acting = consumed.len();

        for (x, &index) in g1.iter().enumerate().take(acting) {
            if consumed[x] || !units[index].is_alive() {
                continue;
            }
            let unit_type = units[index].unit_type;
            let handler = self.sim.abilities.get(unit_type);

            let info = self.env.combat_info(units[index].owner, unit_type);
            if info.air.base_dps() == 0.0 && info.ground.base_dps() == 0.0 {
                continue;
            }

            let data = catalog.get(unit_type);
            if settings.workers_do_no_damage && data.harvester {
                continue;
            }

            let melee = data.melee;
            if melee && settings.enable_surround_limits && melee_used >= surround.max_melee_attackers {
                continue;
            }

            if settings.enable_timing_adjustment {
                let range = info.attack_range();
                let wait = if tick.defender.is(side) {
                    if tick.fastest_attacker_speed > 0.0 {
                        (tick.max_range_defender - range) / tick.fastest_attacker_speed
                    } else {
                        UNREACHABLE_WAIT
                    }
                } else {
                    let mut distance = tick.max_range_defender;
                    if melee {
                        // Stagger melee arrival across the group.
                        distance += tick.max_extra_melee_distance * (x as f32 / acting as f32);
                    }
                    time_to_be_able_to_attack(range, data.speed, distance)
                };
                if tick.time < wait {
                    changed = true;
                    continue;
                }
            }

            let Some(choice) = self.choose_target(
                units,
                g2,
                pending,
                index,
                &attackers_on,
                surround,
                own,
                opponent_melee_fraction,
            ) else {
                continue;
            };

            if melee {
                melee_used += 1;
            }
            attackers_on[choice.position] += 1;
            changed = true;

            let weapon = info.weapon(choice.slot);
            let scale = damage_multiplier(handler, &units[index], tick.time) * tick.dt;
            let primary = g2[choice.position];
            let primary_melee = self.is_melee(&units[primary]);

            let mut remaining_splash = weapon.splash().max(1.0);
            let shielded = !melee && roll(rng, opponent_shield);
            let dps = weapon.get_dps(units[primary].unit_type, shield_modifier(shielded))
                * remaining_splash.min(1.0);
            pending[primary] += dps * scale;
            remaining_splash -= 1.0;

            if settings.enable_splash && remaining_splash > 0.001 && (!melee || primary_melee) {
                let splash = Splash {
                    weapon,
                    primary,
                    scale,
                    shield_fraction: if melee { 0.0 } else { opponent_shield },
                };
                splash.apply(remaining_splash, units, g2, pending, rng);
            }
        }

        changed
    }

    /// Best target in `g2` for the unit at `attacker`, if any can be hit.
    #[allow(clippy::too_many_arguments)]
    fn choose_target(
        &self,
        units: &[CombatUnit],
        g2: &[usize],
        pending: &[f32],
        attacker: usize,
        attackers_on: &[u32],
        surround: SurroundInfo,
        own: SideStats,
        opponent_melee_fraction: f32,
    ) -> Option<TargetChoice> {
        let settings = self.settings;
        let catalog = self.sim.catalog;
        let unit = &units[attacker];
        let data = catalog.get(unit.unit_type);
        let info = self.env.combat_info(unit.owner, unit.unit_type);
        let hits_air = info.air.base_dps() > 0.0;
        let hits_ground = info.ground.base_dps() > 0.0;
        let own_range = info.attack_range();
        let flip_for_bad_micro = settings.bad_micro && unit.owner == Owner::Two;

        let mut best: Option<(TargetChoice, f32, f32)> = None;

        for (j, &other_index) in g2.iter().enumerate() {
            let other = &units[other_index];
            if !survives(other, pending[other_index]) {
                continue;
            }
            let other_data = catalog.get(other.unit_type);
            let reachable = (other_data.can_be_attacked_by_air() && hits_air)
                || (!other.is_flying && hits_ground);
            if !reachable {
                continue;
            }

            let air_dps = info.air.get_dps(other.unit_type, 0.0);
            let ground_dps = info.ground.get_dps(other.unit_type, 0.0);
            let mut score = air_dps.max(ground_dps)
                * self.sim.target_score(other, own.ground > 0, own.air > 0)
                * 0.001;

            if flip_for_bad_micro {
                score = -score;
            }

            if data.melee {
                if settings.enable_surround_limits
                    && attackers_on[j] >= surround.max_attackers_per_defender
                {
                    continue;
                }
                if !settings.bad_micro && settings.assume_reasonable_positioning {
                    score = -score;
                }
                if settings.enable_melee_blocking {
                    if other_data.melee {
                        score += 1000.0;
                    } else if data.speed < 1.05 * other_data.speed {
                        score -= 500.0;
                    }
                }
            } else if !unit.is_flying {
                let range_diff = self.env.attack_range(other.owner, other.unit_type) - own_range;
                if (opponent_melee_fraction > 0.5 && range_diff > 0.5)
                    || (opponent_melee_fraction > 0.3 && range_diff > 1.0)
                {
                    score -= KITING_PENALTY;
                }
            }

            let health = other.total_health() - pending[other_index];
            let better = match best {
                None => true,
                Some((_, best_score, best_health)) => {
                    score > best_score || (score == best_score && health < best_health)
                }
            };
            if better {
                let slot = if ground_dps > air_dps {
                    WeaponSlot::Ground
                } else {
                    WeaponSlot::Air
                };
                best = Some((TargetChoice { position: j, slot }, score, health));
            }
        }

        best.map(|(choice, _, _)| choice)
    }
}

fn roll<R: RandomSource + ?Sized>(rng: &mut R, probability: f32) -> bool {
    probability > 0.0 && rng.uniform() < f64::from(probability)
}

fn shield_modifier(shielded: bool) -> f32 {
    if shielded {
        -GUARDIAN_SHIELD_REDUCTION
    } else {
        0.0
    }
}

/// Extra hits of a splash weapon after the primary target.
struct Splash<'w> {
    weapon: &'w WeaponProfile,
    primary: usize,
    scale: f32,
    shield_fraction: f32,
}

impl Splash<'_> {
    /// Spend `remaining` charges on targets still alive after `pending`,
    /// starting at a random position and rotating through the group. Every
    /// charge hits at full strength except a fractional last one.
    fn apply<R: RandomSource + ?Sized>(
        &self,
        mut remaining: f32,
        units: &[CombatUnit],
        g2: &[usize],
        pending: &mut [f32],
        rng: &mut R,
    ) {
        if g2.is_empty() {
            return;
        }
        let start = rng.index(g2.len());

        for step in 0..g2.len() {
            if remaining <= 0.001 {
                break;
            }
            let target = g2[(start + step) % g2.len()];
            if target == self.primary || !survives(&units[target], pending[target]) {
                continue;
            }

            let shielded = roll(rng, self.shield_fraction);
            let dps = self
                .weapon
                .get_dps(units[target].unit_type, shield_modifier(shielded))
                * remaining.min(1.0);
            if dps <= 0.0 {
                continue;
            }

            pending[target] += dps * self.scale;
            remaining -= 1.0;
        }
    }
}
