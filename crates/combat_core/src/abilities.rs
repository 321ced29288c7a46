//! Special unit abilities.
//!
//! Each catalog unit may carry a [`SpecialAbility`]. [`AbilityTable`] resolves
//! those once per catalog into handlers indexed by unit type, so the battle
//! loop performs a single table lookup per unit and never branches on names.

use std::f32::consts::PI;

use crate::data::{SpecialAbility, UnitCatalog, UnitTypeId};
use crate::random::RandomSource;
use crate::unit::{make_unit, CombatUnit};

/// Health restored per second by a healer.
pub const HEAL_PER_SECOND: f32 = 12.6 / 1.4;
/// Shield restored per second by a shield battery.
pub const SHIELD_RECHARGE_PER_SECOND: f32 = 50.4 / 1.4;
/// Energy spent per point of health or shield restored.
pub const ENERGY_PER_POINT: f32 = 1.0 / 3.0;
/// Energy cost of spawning a temporary unit.
pub const SPAWN_ENERGY_COST: f32 = 25.0;
/// Energy a spawned temporary unit starts with. It decays one per second.
pub const SPAWNED_ENERGY: f32 = 21.0 * 1.4;
/// Energy cost of Guardian Shield.
pub const GUARDIAN_SHIELD_ENERGY: f32 = 75.0;
/// Guardian Shield duration in seconds.
pub const GUARDIAN_SHIELD_DURATION: f32 = 11.0;
/// Ground area one Guardian Shield is assumed to cover.
pub const GUARDIAN_SHIELD_AREA: f32 = 4.5 * 4.5 * PI * 0.4;
/// Upper bound on the fraction of a group covered by Guardian Shield.
pub const GUARDIAN_SHIELD_MAX_FRACTION: f32 = 0.8;
/// Damage per hit removed by Guardian Shield.
pub const GUARDIAN_SHIELD_REDUCTION: f32 = 2.0;
/// Seconds until interceptors reach full damage.
pub const INTERCEPTOR_RAMP_TIME: f32 = 4.0;

/// Resolved ability of a unit type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbilityHandler {
    /// Heal damaged biological allies.
    Heal,
    /// Restore allied shields.
    ShieldRecharge,
    /// Spawn a temporary unit of this type.
    Spawn(UnitTypeId),
    /// Lose energy over time and die when it runs out.
    Decay,
    /// Cast Guardian Shield.
    GuardianShield,
    /// Damage ramps up and scales with own health.
    Interceptors,
}

/// Per-type ability handlers for one catalog.
#[derive(Debug, Clone)]
pub struct AbilityTable {
    handlers: Vec<Option<AbilityHandler>>,
}

impl AbilityTable {
    /// Resolve every unit's ability.
    #[must_use]
    pub fn new(catalog: &UnitCatalog) -> Self {
        let handlers = catalog
            .iter()
            .map(|(_, data)| match &data.ability {
                None => None,
                Some(SpecialAbility::Heal) => Some(AbilityHandler::Heal),
                Some(SpecialAbility::ShieldRecharge) => Some(AbilityHandler::ShieldRecharge),
                Some(SpecialAbility::SpawnTemporary { unit }) => match catalog.lookup(unit) {
                    Ok(id) => Some(AbilityHandler::Spawn(id)),
                    Err(_) => {
                        tracing::warn!(unit = %data.name, spawned = %unit, "Spawned unit missing, ability ignored");
                        None
                    }
                },
                Some(SpecialAbility::Decay) => Some(AbilityHandler::Decay),
                Some(SpecialAbility::GuardianShield) => Some(AbilityHandler::GuardianShield),
                Some(SpecialAbility::Interceptors) => Some(AbilityHandler::Interceptors),
            })
            .collect();
        Self { handlers }
    }

    /// Handler for a unit type.
    #[must_use]
    pub fn get(&self, unit_type: UnitTypeId) -> Option<AbilityHandler> {
        self.handlers.get(unit_type.index()).copied().flatten()
    }
}

/// What the unit does after its ability ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbilityOutcome {
    /// The ability took the unit's turn.
    Consumed,
    /// The unit may still attack.
    Continue,
}

/// Guardian Shield state of one side for the current tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuardianShieldState {
    /// Fraction of the side's footprint under a shield.
    pub fraction: f32,
    /// Shields cover more area than the side occupies.
    pub covers_all: bool,
    /// A sentry of this side already cast this tick.
    pub activated: bool,
}

/// Tick down running shields of `group` and measure its coverage.
pub fn guardian_shield_coverage(
    catalog: &UnitCatalog,
    table: &AbilityTable,
    units: &mut [CombatUnit],
    group: &[usize],
    dt: f32,
) -> GuardianShieldState {
    let mut shielded_area = 0.0;
    let mut total_area = 0.0;
    for &index in group {
        let unit = &mut units[index];
        if table.get(unit.unit_type) == Some(AbilityHandler::GuardianShield) && unit.buff_timer > 0.0 {
            unit.buff_timer = (unit.buff_timer - dt).max(0.0);
            shielded_area += GUARDIAN_SHIELD_AREA;
        }
        let r = catalog.get(unit.unit_type).radius;
        total_area += r * r * PI;
    }

    GuardianShieldState {
        fraction: GUARDIAN_SHIELD_MAX_FRACTION.min(shielded_area / (0.001 + total_area)),
        covers_all: shielded_area > total_area,
        activated: false,
    }
}

/// Mutable view of one side during its turn.
pub struct SideTurn<'a, R: RandomSource + ?Sized> {
    /// Unit catalog.
    pub catalog: &'a UnitCatalog,
    /// Every unit in the battle.
    pub units: &'a mut Vec<CombatUnit>,
    /// Indices into `units` of this side.
    pub group: &'a mut Vec<usize>,
    /// Group positions already healed or recharged this tick.
    pub has_been_healed: &'a mut Vec<bool>,
    /// Guardian Shield state of this side.
    pub guardian_shield: &'a mut GuardianShieldState,
    /// Random source.
    pub rng: &'a mut R,
    /// Step length.
    pub dt: f32,
}

impl<R: RandomSource + ?Sized> SideTurn<'_, R> {
    /// Run the ability of the unit at group position `x`.
    ///
    /// Returns the outcome and whether any state changed.
    pub fn run(&mut self, handler: AbilityHandler, x: usize) -> (AbilityOutcome, bool) {
        match handler {
            AbilityHandler::Heal => (AbilityOutcome::Consumed, self.heal(x)),
            AbilityHandler::ShieldRecharge => (AbilityOutcome::Consumed, self.recharge(x)),
            AbilityHandler::Spawn(spawned) => (AbilityOutcome::Consumed, self.spawn(x, spawned)),
            AbilityHandler::Decay => {
                let unit = &mut self.units[self.group[x]];
                unit.energy -= self.dt;
                if unit.energy <= 0.0 {
                    unit.energy = 0.0;
                    unit.kill();
                    (AbilityOutcome::Consumed, true)
                } else {
                    (AbilityOutcome::Continue, false)
                }
            }
            AbilityHandler::GuardianShield => (AbilityOutcome::Continue, self.guardian_shield(x)),
            AbilityHandler::Interceptors => (AbilityOutcome::Continue, false),
        }
    }

    /// First ally from a random offset matching `eligible`, skipping `x`.
    fn find_ally(&mut self, x: usize, eligible: impl Fn(&CombatUnit) -> bool) -> Option<usize> {
        let len = self.group.len();
        let offset = self.rng.index(len);
        (0..len)
            .map(|j| (j + offset) % len)
            .find(|&pos| {
                pos != x
                    && !self.has_been_healed[pos]
                    && self.units[self.group[pos]].is_alive()
                    && eligible(&self.units[self.group[pos]])
            })
    }

    fn heal(&mut self, x: usize) -> bool {
        if self.units[self.group[x]].energy <= 0.0 {
            return false;
        }
        let catalog = self.catalog;
        let Some(pos) = self.find_ally(x, |u| {
            u.health < u.health_max
                && catalog
                    .get(u.unit_type)
                    .has_attribute(crate::data::Attribute::Biological)
        }) else {
            return false;
        };

        let healer = self.group[x];
        let target = self.group[pos];
        let missing = self.units[target].health_max - self.units[target].health;
        let amount = (HEAL_PER_SECOND * self.dt)
            .min(missing)
            .min(self.units[healer].energy / ENERGY_PER_POINT);

        self.units[target].modify_health(amount);
        self.units[healer].energy = (self.units[healer].energy - amount * ENERGY_PER_POINT).max(0.0);
        self.has_been_healed[pos] = true;
        true
    }

    fn recharge(&mut self, x: usize) -> bool {
        if self.units[self.group[x]].energy <= 0.0 {
            return false;
        }
        let Some(pos) = self.find_ally(x, |u| u.shield < u.shield_max) else {
            return false;
        };

        let battery = self.group[x];
        let target = self.group[pos];
        let missing = self.units[target].shield_max - self.units[target].shield;
        let amount = (SHIELD_RECHARGE_PER_SECOND * self.dt)
            .min(missing)
            .min(self.units[battery].energy / ENERGY_PER_POINT);

        let unit = &mut self.units[target];
        unit.shield = (unit.shield + amount).min(unit.shield_max);
        self.units[battery].energy =
            (self.units[battery].energy - amount * ENERGY_PER_POINT).max(0.0);
        self.has_been_healed[pos] = true;
        true
    }

    fn spawn(&mut self, x: usize, spawned: UnitTypeId) -> bool {
        let caster = self.group[x];
        if self.units[caster].energy <= SPAWN_ENERGY_COST {
            return false;
        }
        self.units[caster].energy -= SPAWN_ENERGY_COST;

        let mut unit = make_unit(self.catalog, self.units[caster].owner, spawned);
        unit.energy = SPAWNED_ENERGY;
        self.units.push(unit);
        self.group.push(self.units.len() - 1);
        self.has_been_healed.push(false);
        true
    }

    fn guardian_shield(&mut self, x: usize) -> bool {
        let shield = &mut *self.guardian_shield;
        let unit = &mut self.units[self.group[x]];
        if unit.energy < GUARDIAN_SHIELD_ENERGY || shield.activated || shield.covers_all {
            return false;
        }
        unit.energy -= GUARDIAN_SHIELD_ENERGY;
        unit.buff_timer = GUARDIAN_SHIELD_DURATION;
        shield.activated = true;
        true
    }
}

/// Damage multiplier of a unit at `time`.
#[must_use]
pub fn damage_multiplier(handler: Option<AbilityHandler>, unit: &CombatUnit, time: f32) -> f32 {
    match handler {
        Some(AbilityHandler::Interceptors) => {
            let health_fraction = unit.total_health() / unit.max_total_health().max(0.01);
            health_fraction * (time / INTERCEPTOR_RAMP_TIME).min(1.0)
        }
        _ => 1.0,
    }
}
