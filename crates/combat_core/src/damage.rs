//! Damage and armor resolution.
//!
//! Folds weapon stats, attribute bonuses and both owners' upgrades into a
//! DPS table per (attacker type, target type) pair:
//!
//! ```text
//! dps = max(0, damage + attribute_bonus + weapon_upgrades - effective_armor) * attacks / interval
//! effective_armor = (armor + armor_upgrades) * max_health / (max_health + max_shield)
//! ```
//!
//! Shield and health damage are not tracked separately, so armor is spread
//! evenly over the combined pool. The tables are built once per upgrade pair
//! in [`CombatEnvironment::new`] and never change afterwards.

use crate::data::{
    Attribute, Producer, Race, UnitCatalog, UnitData, UnitTypeId, Upgrade, UpgradeFamily,
    WeaponData, WeaponEffect,
};
use crate::error::{CombatError, Result};
use crate::unit::{CombatUnit, Owner};
use crate::upgrades::UpgradeSet;

/// Weapon slot of a unit. A weapon targeting both layers fills both slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeaponSlot {
    /// Hits flying and air-targetable units.
    Air,
    /// Hits non-flying units.
    Ground,
}

/// Splash multipliers by unit name. Applied during combat, not folded into DPS.
const SPLASH_TABLE: &[(&str, WeaponSlot, f32)] = &[
    ("Liberator", WeaponSlot::Air, 3.0),
    ("MissileTurret", WeaponSlot::Air, 3.0),
    ("SiegeTankSieged", WeaponSlot::Ground, 4.0),
    ("Hellion", WeaponSlot::Ground, 2.0),
    ("HellionTank", WeaponSlot::Ground, 3.0),
    ("Mutalisk", WeaponSlot::Ground, 1.44),
    ("Mutalisk", WeaponSlot::Air, 1.44),
    ("Thor", WeaponSlot::Air, 3.0),
    ("Archon", WeaponSlot::Ground, 3.0),
    ("Archon", WeaponSlot::Air, 3.0),
    ("Colossus", WeaponSlot::Ground, 3.0),
];

/// A weapon resolved against one pair of upgrade sets.
#[derive(Debug, Clone, Default)]
pub struct WeaponProfile {
    available: bool,
    damage: f32,
    attacks: u32,
    interval: f32,
    range: f32,
    splash: f32,
    base_dps: f32,
    dps_cache: Vec<f32>,
}

impl WeaponProfile {
    /// A slot without a weapon.
    #[must_use]
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Whether the slot holds a weapon.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Damage per attack including weapon upgrades, before armor.
    #[must_use]
    pub fn damage(&self) -> f32 {
        self.damage
    }

    /// Attacks per volley.
    #[must_use]
    pub fn attacks(&self) -> u32 {
        self.attacks
    }

    /// Seconds between volleys after upgrade effects.
    #[must_use]
    pub fn interval(&self) -> f32 {
        self.interval
    }

    /// Range after upgrade effects. 0 when unavailable.
    #[must_use]
    pub fn range(&self) -> f32 {
        self.range
    }

    /// Splash multiplier, 0 for single-target weapons.
    #[must_use]
    pub fn splash(&self) -> f32 {
        self.splash
    }

    /// DPS ignoring the target's armor and attributes.
    #[must_use]
    pub fn base_dps(&self) -> f32 {
        self.base_dps
    }

    /// DPS against `target`, with `modifier` extra damage per attack.
    ///
    /// # Panics
    ///
    /// Panics if `target` is outside the catalog this profile was built from.
    #[must_use]
    pub fn get_dps(&self, target: UnitTypeId, modifier: f32) -> f32 {
        if !self.available {
            return 0.0;
        }
        let Some(cached) = self.dps_cache.get(target.index()) else {
            panic!(
                "target type {target} outside DPS table of {} entries",
                self.dps_cache.len()
            );
        };
        self.apply_modifier(*cached, modifier)
    }

    /// Checked variant of [`WeaponProfile::get_dps`].
    pub fn checked_dps(&self, target: UnitTypeId, modifier: f32) -> Result<f32> {
        if !self.available {
            return Ok(0.0);
        }
        self.dps_cache
            .get(target.index())
            .map(|cached| self.apply_modifier(*cached, modifier))
            .ok_or(CombatError::UnknownUnitType(target))
    }

    fn apply_modifier(&self, cached: f32, modifier: f32) -> f32 {
        (cached + modifier * self.attacks as f32 / self.interval).max(0.0)
    }
}

/// Resolve one weapon of `unit_type` against every catalog type.
///
/// `effective_armor` holds the target-side armor per type, already weighted
/// by health share (see [`effective_armor_table`]).
#[must_use]
pub fn resolve_weapon(
    catalog: &UnitCatalog,
    unit_type: UnitTypeId,
    weapon: &WeaponData,
    slot: WeaponSlot,
    upgrades: &UpgradeSet,
    effective_armor: &[f32],
) -> WeaponProfile {
    let data = catalog.get(unit_type);

    let mut interval = weapon.cooldown;
    let mut range = weapon.range;
    for effect in data
        .upgrade_effects
        .iter()
        .filter(|e| upgrades.contains(e.upgrade))
    {
        match effect.effect {
            WeaponEffect::CooldownDivisor(divisor) if divisor > 0.0 => interval /= divisor,
            WeaponEffect::CooldownDivisor(_) => {}
            WeaponEffect::RangeBonus(bonus) => range += bonus,
        }
    }

    let damage = weapon.damage + damage_bonus(catalog, unit_type, upgrades);
    let volley = weapon.attacks as f32 / interval;

    let dps_cache = catalog
        .iter()
        .zip(effective_armor)
        .map(|((_, target), armor)| {
            if !slot_hits(slot, target) {
                return 0.0;
            }
            let bonus: f32 = weapon
                .bonuses
                .iter()
                .filter(|b| target_has(target, b.attribute))
                .map(|b| b.bonus)
                .sum();
            (damage + bonus - armor).max(0.0) * volley
        })
        .collect();

    WeaponProfile {
        available: true,
        damage,
        attacks: weapon.attacks,
        interval,
        range,
        splash: 0.0,
        base_dps: damage * volley,
        dps_cache,
    }
}

fn slot_hits(slot: WeaponSlot, target: &UnitData) -> bool {
    match slot {
        WeaponSlot::Air => target.can_be_attacked_by_air(),
        WeaponSlot::Ground => !target.flying,
    }
}

fn target_has(target: &UnitData, attribute: Attribute) -> bool {
    target.has_attribute(attribute) || (attribute == Attribute::Structure && target.structure)
}

fn levels(upgrades: &UpgradeSet, family: UpgradeFamily) -> f32 {
    family
        .levels()
        .iter()
        .filter(|u| upgrades.contains(**u))
        .count() as f32
}

/// Producer of the unit this one morphs from, if aliased.
fn canonical_producer(catalog: &UnitCatalog, unit_type: UnitTypeId) -> Option<Producer> {
    catalog.get(catalog.canonical(unit_type)).producer
}

/// Extra damage per attack from weapon upgrades.
#[must_use]
pub fn damage_bonus(catalog: &UnitCatalog, unit_type: UnitTypeId, upgrades: &UpgradeSet) -> f32 {
    let data = catalog.get(unit_type);
    if data.structure {
        return 0.0;
    }

    match data.race {
        Race::Protoss if data.flying => levels(upgrades, UpgradeFamily::ProtossAirWeapons),
        Race::Protoss => levels(upgrades, UpgradeFamily::ProtossGroundWeapons),
        Race::Zerg if data.flying => levels(upgrades, UpgradeFamily::ZergFlyerWeapons),
        Race::Zerg if data.melee => levels(upgrades, UpgradeFamily::ZergMeleeWeapons),
        Race::Zerg => levels(upgrades, UpgradeFamily::ZergMissileWeapons),
        Race::Terran => match canonical_producer(catalog, unit_type) {
            Some(Producer::Barracks) => levels(upgrades, UpgradeFamily::TerranInfantryWeapons),
            Some(Producer::Factory) => levels(upgrades, UpgradeFamily::TerranVehicleWeapons),
            Some(Producer::Starport) => levels(upgrades, UpgradeFamily::TerranShipWeapons),
            _ => 0.0,
        },
        Race::Neutral => 0.0,
    }
}

/// Extra armor from armor and shield upgrades.
///
/// Protoss shield levels are folded into the same armor term as the armor
/// levels, so they are also weighted by the unit's health share.
#[must_use]
pub fn armor_bonus(catalog: &UnitCatalog, unit_type: UnitTypeId, upgrades: &UpgradeSet) -> f32 {
    let data = catalog.get(unit_type);
    if data.structure {
        return if data.race == Race::Terran && upgrades.contains(Upgrade::TerranBuildingArmor) {
            2.0
        } else {
            0.0
        };
    }

    match data.race {
        Race::Protoss => {
            let armor = if data.flying {
                levels(upgrades, UpgradeFamily::ProtossAirArmor)
            } else {
                levels(upgrades, UpgradeFamily::ProtossGroundArmor)
            };
            armor + levels(upgrades, UpgradeFamily::ProtossShields)
        }
        Race::Zerg if data.flying => levels(upgrades, UpgradeFamily::ZergFlyerArmor),
        Race::Zerg => levels(upgrades, UpgradeFamily::ZergGroundArmor),
        Race::Terran => match canonical_producer(catalog, unit_type) {
            Some(Producer::Barracks) => levels(upgrades, UpgradeFamily::TerranInfantryArmor),
            Some(Producer::Factory | Producer::Starport) => {
                levels(upgrades, UpgradeFamily::TerranVehicleAndShipArmor)
            }
            _ => 0.0,
        },
        Race::Neutral => 0.0,
    }
}

/// Health-weighted armor of every catalog type under `upgrades`.
#[must_use]
pub fn effective_armor_table(catalog: &UnitCatalog, upgrades: &UpgradeSet) -> Vec<f32> {
    catalog
        .iter()
        .map(|(id, data)| {
            let armor = data.armor + armor_bonus(catalog, id, upgrades);
            armor * data.health / (data.health + data.shield)
        })
        .collect()
}

/// Both weapon slots of one unit type.
#[derive(Debug, Clone, Default)]
pub struct UnitCombatInfo {
    /// Weapon hitting air-targetable units.
    pub air: WeaponProfile,
    /// Weapon hitting ground units.
    pub ground: WeaponProfile,
}

impl UnitCombatInfo {
    fn new(
        catalog: &UnitCatalog,
        unit_type: UnitTypeId,
        upgrades: &UpgradeSet,
        target_armor: &[f32],
    ) -> Self {
        let data = catalog.get(unit_type);
        let resolve = |weapon: Option<&WeaponData>, slot| {
            weapon.map_or_else(WeaponProfile::unavailable, |w| {
                resolve_weapon(catalog, unit_type, w, slot, upgrades, target_armor)
            })
        };
        Self {
            air: resolve(data.air_weapon(), WeaponSlot::Air),
            ground: resolve(data.ground_weapon(), WeaponSlot::Ground),
        }
    }

    /// Weapon in a slot.
    #[must_use]
    pub fn weapon(&self, slot: WeaponSlot) -> &WeaponProfile {
        match slot {
            WeaponSlot::Air => &self.air,
            WeaponSlot::Ground => &self.ground,
        }
    }

    /// Longest range over both slots.
    #[must_use]
    pub fn attack_range(&self) -> f32 {
        self.air.range().max(self.ground.range())
    }

    /// Shortest attack interval over both slots, infinite without weapons.
    #[must_use]
    pub fn attack_interval(&self) -> f32 {
        [&self.air, &self.ground]
            .into_iter()
            .filter(|w| w.is_available())
            .map(WeaponProfile::interval)
            .fold(f32::INFINITY, f32::min)
    }

    /// Larger base DPS of the two slots.
    #[must_use]
    pub fn max_dps(&self) -> f32 {
        self.air.base_dps().max(self.ground.base_dps())
    }
}

/// Resolved weapons for every unit type of both owners.
///
/// Immutable after construction; share it through an `Arc` between battles
/// with the same upgrades.
#[derive(Debug, Clone)]
pub struct CombatEnvironment {
    upgrades: [UpgradeSet; 2],
    info: [Vec<UnitCombatInfo>; 2],
}

impl CombatEnvironment {
    /// Precompute all weapon tables for the given upgrade pair.
    #[must_use]
    pub fn new(catalog: &UnitCatalog, upgrades_one: UpgradeSet, upgrades_two: UpgradeSet) -> Self {
        let armor_one = effective_armor_table(catalog, &upgrades_one);
        let armor_two = effective_armor_table(catalog, &upgrades_two);

        let build = |own: &UpgradeSet, target_armor: &[f32]| -> Vec<UnitCombatInfo> {
            catalog
                .iter()
                .map(|(id, _)| UnitCombatInfo::new(catalog, id, own, target_armor))
                .collect()
        };

        let mut info = [
            build(&upgrades_one, &armor_two),
            build(&upgrades_two, &armor_one),
        ];

        for (name, slot, splash) in SPLASH_TABLE {
            // Catalogs without the unit just skip the entry.
            let Ok(id) = catalog.lookup(name) else {
                continue;
            };
            for table in &mut info {
                let weapon = match slot {
                    WeaponSlot::Air => &mut table[id.index()].air,
                    WeaponSlot::Ground => &mut table[id.index()].ground,
                };
                weapon.splash = *splash;
            }
        }

        tracing::debug!(
            unit_types = catalog.len(),
            upgrades_one = upgrades_one.len(),
            upgrades_two = upgrades_two.len(),
            "Combat environment built"
        );

        Self {
            upgrades: [upgrades_one, upgrades_two],
            info,
        }
    }

    /// Upgrades of one owner.
    #[must_use]
    pub fn upgrades(&self, owner: Owner) -> &UpgradeSet {
        &self.upgrades[owner.index()]
    }

    /// Both owners' upgrades.
    #[must_use]
    pub fn upgrade_pair(&self) -> [UpgradeSet; 2] {
        self.upgrades
    }

    /// Weapons of a unit type for one owner.
    ///
    /// # Panics
    ///
    /// Panics if `unit_type` is not from the catalog this was built with.
    #[must_use]
    pub fn combat_info(&self, owner: Owner, unit_type: UnitTypeId) -> &UnitCombatInfo {
        &self.info[owner.index()][unit_type.index()]
    }

    /// Longest weapon range of a unit type.
    #[must_use]
    pub fn attack_range(&self, owner: Owner, unit_type: UnitTypeId) -> f32 {
        self.combat_info(owner, unit_type).attack_range()
    }

    /// Base DPS of the air or ground slot.
    #[must_use]
    pub fn calculate_dps(&self, owner: Owner, unit_type: UnitTypeId, air: bool) -> f32 {
        let info = self.combat_info(owner, unit_type);
        if air {
            info.air.base_dps()
        } else {
            info.ground.base_dps()
        }
    }

    /// Best DPS `attacker` can deal to `target`.
    #[must_use]
    pub fn calculate_dps_against(&self, attacker: &CombatUnit, target: &CombatUnit) -> f32 {
        let info = self.combat_info(attacker.owner, attacker.unit_type);
        info.ground
            .get_dps(target.unit_type, 0.0)
            .max(info.air.get_dps(target.unit_type, 0.0))
    }

    /// Summed base DPS of a group for one slot.
    #[must_use]
    pub fn calculate_group_dps<'a>(
        &self,
        units: impl IntoIterator<Item = &'a CombatUnit>,
        air: bool,
    ) -> f32 {
        units
            .into_iter()
            .map(|u| self.calculate_dps(u.owner, u.unit_type, air))
            .sum()
    }
}
