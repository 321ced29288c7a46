//! Unit data structures for data-driven unit definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::upgrade_data::Upgrade;

/// Index of a unit type within a [`UnitCatalog`](super::UnitCatalog).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitTypeId(pub u32);

impl UnitTypeId {
    /// Index into per-type tables.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for UnitTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Playable race of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Race {
    /// Terran.
    Terran,
    /// Zerg.
    Zerg,
    /// Protoss.
    Protoss,
    /// Neutral or unknown.
    #[default]
    Neutral,
}

/// Unit attributes referenced by damage bonuses and abilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Attribute {
    /// Light units.
    Light,
    /// Armored units.
    Armored,
    /// Biological units (healable by Medivacs).
    Biological,
    /// Mechanical units.
    Mechanical,
    /// Psionic units.
    Psionic,
    /// Massive units.
    Massive,
    /// Structures.
    Structure,
}

/// Which layer a weapon can hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetKind {
    /// Air targets only.
    Air,
    /// Ground targets only.
    Ground,
    /// Both layers.
    Any,
}

impl TargetKind {
    /// Whether the weapon can hit air-targetable units.
    #[must_use]
    pub const fn hits_air(self) -> bool {
        matches!(self, Self::Air | Self::Any)
    }

    /// Whether the weapon can hit ground units.
    #[must_use]
    pub const fn hits_ground(self) -> bool {
        matches!(self, Self::Ground | Self::Any)
    }
}

/// Extra damage against targets with a given attribute.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DamageBonus {
    /// Attribute the bonus applies to.
    pub attribute: Attribute,
    /// Extra damage per attack.
    pub bonus: f32,
}

/// Static weapon definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponData {
    /// Damage per attack before bonuses and armor.
    pub damage: f32,

    /// Attacks per volley.
    #[serde(default = "default_attacks")]
    pub attacks: u32,

    /// Seconds between volleys.
    pub cooldown: f32,

    /// Attack range.
    pub range: f32,

    /// Which layer this weapon hits.
    pub target: TargetKind,

    /// Bonus damage per attribute.
    #[serde(default)]
    pub bonuses: Vec<DamageBonus>,
}

const fn default_attacks() -> u32 {
    1
}

/// Resource cost of a unit or upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Cost {
    /// Mineral cost.
    pub minerals: f32,
    /// Vespene cost.
    #[serde(default)]
    pub vespene: f32,
    /// Supply used.
    #[serde(default)]
    pub supply: f32,
}

/// Building a unit is trained from.
///
/// Terran weapon and armor upgrades are chosen by producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Producer {
    /// Terran infantry.
    Barracks,
    /// Terran vehicles.
    Factory,
    /// Terran ships.
    Starport,
    /// Protoss gateway units.
    Gateway,
    /// Protoss robotics units.
    RoboticsFacility,
    /// Protoss air units.
    Stargate,
    /// Zerg larva morphs.
    Larva,
    /// Anything else (workers, structures, morphs).
    Other,
}

/// Per-unit special behavior run before normal targeting.
///
/// The simulator dispatches on this tag instead of on unit names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SpecialAbility {
    /// Heals damaged biological allies (Medivac).
    Heal,
    /// Restores allied shields using energy (Shield Battery).
    ShieldRecharge,
    /// Spends energy to spawn a temporary unit into its own group (Infestor).
    SpawnTemporary {
        /// Name of the unit to spawn.
        unit: String,
    },
    /// Loses one energy per second and dies at zero (Infested Terran).
    Decay,
    /// Projects a damage-reducing area buff (Sentry).
    GuardianShield,
    /// Damage ramps up over the first seconds and scales with health (Carrier).
    Interceptors,
}

/// Weapon change granted by an upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WeaponEffect {
    /// Divide the attack interval.
    CooldownDivisor(f32),
    /// Add to the weapon range.
    RangeBonus(f32),
}

/// An upgrade and what it does to this unit's weapons.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UpgradeEffect {
    /// Upgrade that must be researched.
    pub upgrade: Upgrade,
    /// Effect on every weapon of the unit.
    pub effect: WeaponEffect,
}

/// Data-driven unit definition.
///
/// # Example RON
///
/// ```ron
/// UnitData(
///     name: "Marine",
///     race: Terran,
///     radius: 0.375,
///     speed: 2.25,
///     health: 45.0,
///     armor: 0.0,
///     attributes: [Light, Biological],
///     weapons: [
///         WeaponData(damage: 6.0, cooldown: 0.8608, range: 5.0, target: Any),
///     ],
///     cost: Cost(minerals: 50.0, supply: 1.0),
///     build_time: 18.0,
///     producer: Some(Barracks),
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitData {
    /// Unique name, used for lookups from scenarios and other data.
    pub name: String,

    /// Race of the unit.
    #[serde(default)]
    pub race: Race,

    /// Footprint radius.
    pub radius: f32,

    /// Movement speed in distance per second.
    #[serde(default)]
    pub speed: f32,

    /// Maximum health.
    pub health: f32,

    /// Maximum shield.
    #[serde(default)]
    pub shield: f32,

    /// Base armor.
    #[serde(default)]
    pub armor: f32,

    /// Attributes used for bonus damage and healing eligibility.
    #[serde(default)]
    pub attributes: Vec<Attribute>,

    /// Whether the unit flies.
    #[serde(default)]
    pub flying: bool,

    /// Ground units that air weapons can also hit (Colossus).
    #[serde(default)]
    pub air_targetable: bool,

    /// Whether the unit is a structure.
    #[serde(default)]
    pub structure: bool,

    /// Whether the unit fights in melee.
    #[serde(default)]
    pub melee: bool,

    /// Basic resource harvester.
    #[serde(default)]
    pub harvester: bool,

    /// Weapons. At most one may hit air and one may hit ground.
    #[serde(default)]
    pub weapons: Vec<WeaponData>,

    /// Production cost.
    #[serde(default)]
    pub cost: Cost,

    /// Production time in seconds.
    #[serde(default)]
    pub build_time: f32,

    /// Unit this one is a morph of (e.g. sieged tank to tank).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    /// Building that trains the unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub producer: Option<Producer>,

    /// Extra damage absorbed before shields (Immortal barrier).
    #[serde(default)]
    pub barrier: f32,

    /// Special behavior, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ability: Option<SpecialAbility>,

    /// Upgrade-driven weapon changes.
    #[serde(default)]
    pub upgrade_effects: Vec<UpgradeEffect>,
}

impl UnitData {
    /// Check if this unit has an attribute.
    #[must_use]
    pub fn has_attribute(&self, attribute: Attribute) -> bool {
        self.attributes.contains(&attribute)
    }

    /// Whether air weapons can hit this unit.
    #[must_use]
    pub const fn can_be_attacked_by_air(&self) -> bool {
        self.flying || self.air_targetable
    }

    /// Combined maximum health and shield.
    #[must_use]
    pub fn max_total_health(&self) -> f32 {
        self.health + self.shield
    }

    /// Minerals plus weighted vespene.
    #[must_use]
    pub fn weighted_cost(&self, vespene_multiplier: f32) -> f32 {
        self.cost.minerals + vespene_multiplier * self.cost.vespene
    }

    /// Weapon able to hit air targets.
    #[must_use]
    pub fn air_weapon(&self) -> Option<&WeaponData> {
        self.weapons.iter().find(|w| w.target.hits_air())
    }

    /// Weapon able to hit ground targets.
    #[must_use]
    pub fn ground_weapon(&self) -> Option<&WeaponData> {
        self.weapons.iter().find(|w| w.target.hits_ground())
    }
}
