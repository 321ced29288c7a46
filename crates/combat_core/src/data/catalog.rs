//! Read-only unit and upgrade catalog.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::unit_data::{SpecialAbility, UnitData, UnitTypeId};
use super::upgrade_data::{Upgrade, UpgradeData};
use crate::error::{CombatError, Result};

/// Serialized form of the catalog.
///
/// # Example RON
///
/// ```ron
/// CatalogData(
///     melee_reference: "Zealot",
///     units: [ UnitData(name: "Zealot", radius: 0.5, health: 100.0, shield: 50.0, melee: true) ],
///     upgrades: [ UpgradeData(upgrade: TerranBuildingArmor, minerals: 150.0, vespene: 150.0) ],
/// )
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogData {
    /// Unit used as the representative melee footprint for surround limits.
    #[serde(default = "default_melee_reference")]
    pub melee_reference: String,

    /// Unit definitions. Position in this list is the [`UnitTypeId`].
    pub units: Vec<UnitData>,

    /// Upgrade costs.
    #[serde(default)]
    pub upgrades: Vec<UpgradeData>,
}

fn default_melee_reference() -> String {
    "Zealot".to_string()
}

/// Validated catalog with name lookup.
#[derive(Debug, Clone)]
pub struct UnitCatalog {
    units: Vec<UnitData>,
    upgrades: HashMap<Upgrade, UpgradeData>,
    by_name: HashMap<String, UnitTypeId>,
    melee_reference: UnitTypeId,
}

impl UnitCatalog {
    /// Parse and validate a catalog from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        let data: CatalogData = ron::from_str(text).map_err(|e| CombatError::CatalogParse {
            message: e.to_string(),
        })?;
        Self::from_data(data)
    }

    /// Validate already-deserialized catalog data.
    pub fn from_data(data: CatalogData) -> Result<Self> {
        let mut by_name = HashMap::with_capacity(data.units.len());
        for (index, unit) in data.units.iter().enumerate() {
            let id = UnitTypeId(index as u32);
            if by_name.insert(unit.name.clone(), id).is_some() {
                return Err(invalid(&unit.name, "duplicate unit name"));
            }
        }

        let melee_reference = *by_name
            .get(&data.melee_reference)
            .ok_or_else(|| invalid(&data.melee_reference, "melee reference unit is not defined"))?;

        let upgrades = data.upgrades.iter().map(|u| (u.upgrade, *u)).collect();

        let catalog = Self {
            units: data.units,
            upgrades,
            by_name,
            melee_reference,
        };
        catalog.validate()?;

        tracing::debug!(
            units = catalog.units.len(),
            upgrades = catalog.upgrades.len(),
            "Unit catalog loaded"
        );

        Ok(catalog)
    }

    fn validate(&self) -> Result<()> {
        for unit in &self.units {
            if unit.health <= 0.0 {
                return Err(invalid(&unit.name, "health must be positive"));
            }
            if unit.radius < 0.0 || unit.speed < 0.0 || unit.shield < 0.0 || unit.barrier < 0.0 {
                return Err(invalid(&unit.name, "negative radius, speed, shield or barrier"));
            }
            for weapon in &unit.weapons {
                if weapon.cooldown <= 0.0 {
                    return Err(invalid(&unit.name, "weapon cooldown must be positive"));
                }
                if weapon.attacks == 0 {
                    return Err(invalid(&unit.name, "weapon must attack at least once"));
                }
            }
            if unit.weapons.iter().filter(|w| w.target.hits_air()).count() > 1 {
                return Err(invalid(&unit.name, "more than one weapon hits air"));
            }
            if unit.weapons.iter().filter(|w| w.target.hits_ground()).count() > 1 {
                return Err(invalid(&unit.name, "more than one weapon hits ground"));
            }
            if let Some(alias) = &unit.alias {
                if !self.by_name.contains_key(alias) {
                    return Err(invalid(&unit.name, &format!("unknown alias '{alias}'")));
                }
            }
            if let Some(SpecialAbility::SpawnTemporary { unit: spawned }) = &unit.ability {
                if !self.by_name.contains_key(spawned) {
                    return Err(invalid(&unit.name, &format!("unknown spawned unit '{spawned}'")));
                }
            }
        }
        Ok(())
    }

    /// Number of unit types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether the catalog has no units.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Unit data by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not from this catalog.
    #[must_use]
    pub fn get(&self, id: UnitTypeId) -> &UnitData {
        &self.units[id.index()]
    }

    /// Unit data by id, checked.
    pub fn try_get(&self, id: UnitTypeId) -> Result<&UnitData> {
        self.units
            .get(id.index())
            .ok_or(CombatError::UnknownUnitType(id))
    }

    /// Resolve a unit name.
    pub fn lookup(&self, name: &str) -> Result<UnitTypeId> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| CombatError::UnknownUnitName(name.to_string()))
    }

    /// Follow the morph alias of a unit, if any.
    #[must_use]
    pub fn canonical(&self, id: UnitTypeId) -> UnitTypeId {
        self.get(id)
            .alias
            .as_deref()
            .and_then(|alias| self.by_name.get(alias).copied())
            .unwrap_or(id)
    }

    /// Cost data for an upgrade.
    #[must_use]
    pub fn upgrade(&self, upgrade: Upgrade) -> Option<&UpgradeData> {
        self.upgrades.get(&upgrade)
    }

    /// Radius of the representative melee unit.
    #[must_use]
    pub fn melee_reference_radius(&self) -> f32 {
        self.get(self.melee_reference).radius
    }

    /// All unit ids with their data.
    pub fn iter(&self) -> impl Iterator<Item = (UnitTypeId, &UnitData)> {
        self.units
            .iter()
            .enumerate()
            .map(|(i, u)| (UnitTypeId(i as u32), u))
    }
}

fn invalid(unit: &str, message: &str) -> CombatError {
    CombatError::InvalidCatalog {
        unit: unit.to_string(),
        message: message.to_string(),
    }
}
