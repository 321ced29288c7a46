//! Slots a composition may draw from.

use serde::{Deserialize, Serialize};

use crate::data::{UnitCatalog, UnitTypeId, Upgrade, UpgradeLevel};
use crate::error::{CombatError, Result};

/// Something a gene slot can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildOrderItem {
    /// A count of units.
    Unit(UnitTypeId),
    /// An upgrade. For tiered families the count is the level.
    Upgrade(Upgrade),
}

/// Ordered slots with per-slot maxima.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AvailableUnitTypes {
    slots: Vec<(BuildOrderItem, u32)>,
}

impl AvailableUnitTypes {
    /// Empty slot list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a slot. Tiered upgrades are normalized to level one and capped
    /// at three; other upgrades are capped at one.
    #[must_use]
    pub fn with(mut self, item: BuildOrderItem, maximum: u32) -> Self {
        self.push(item, maximum);
        self
    }

    /// Add a slot; see [`AvailableUnitTypes::with`].
    pub fn push(&mut self, item: BuildOrderItem, maximum: u32) {
        let (item, maximum) = match item {
            BuildOrderItem::Upgrade(Upgrade::Tiered(family, _)) => (
                BuildOrderItem::Upgrade(Upgrade::Tiered(family, UpgradeLevel::One)),
                maximum.min(3),
            ),
            BuildOrderItem::Upgrade(upgrade) => (BuildOrderItem::Upgrade(upgrade), maximum.min(1)),
            unit => (unit, maximum),
        };
        self.slots.push((item, maximum));
    }

    /// Unit slots from catalog names.
    pub fn from_names(catalog: &UnitCatalog, units: &[(&str, u32)]) -> Result<Self> {
        let mut available = Self::new();
        for (name, maximum) in units {
            available.push(BuildOrderItem::Unit(catalog.lookup(name)?), *maximum);
        }
        Ok(available)
    }

    /// Check every unit slot against `catalog`.
    pub fn validate(&self, catalog: &UnitCatalog) -> Result<()> {
        for (item, _) in &self.slots {
            if let BuildOrderItem::Unit(unit_type) = item {
                catalog.try_get(*unit_type)?;
            }
        }
        if self.slots.is_empty() {
            return Err(CombatError::OptimizerSetup(
                "no unit types available".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether there are no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Item in slot `index`.
    #[must_use]
    pub fn item(&self, index: usize) -> BuildOrderItem {
        self.slots[index].0
    }

    /// Largest count allowed in slot `index`.
    #[must_use]
    pub fn maximum(&self, index: usize) -> u32 {
        self.slots[index].1
    }

    /// Unit type of slot `index`, `None` for upgrade slots.
    #[must_use]
    pub fn unit_type(&self, index: usize) -> Option<UnitTypeId> {
        match self.item(index) {
            BuildOrderItem::Unit(unit_type) => Some(unit_type),
            BuildOrderItem::Upgrade(_) => None,
        }
    }

    /// Slot holding `item`. Tiered upgrades match their family's slot.
    #[must_use]
    pub fn index_of(&self, item: BuildOrderItem) -> Option<usize> {
        let item = match item {
            BuildOrderItem::Upgrade(Upgrade::Tiered(family, _)) => {
                BuildOrderItem::Upgrade(Upgrade::Tiered(family, UpgradeLevel::One))
            }
            other => other,
        };
        self.slots.iter().position(|(slot, _)| *slot == item)
    }

    /// Slots in order.
    pub fn iter(&self) -> impl Iterator<Item = (BuildOrderItem, u32)> + '_ {
        self.slots.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::UpgradeFamily;

    #[test]
    fn test_upgrade_slots_are_normalized() {
        let available = AvailableUnitTypes::new()
            .with(BuildOrderItem::Unit(UnitTypeId(0)), 20)
            .with(
                BuildOrderItem::Upgrade(UpgradeFamily::ZergMeleeWeapons.at(UpgradeLevel::Two)),
                10,
            )
            .with(BuildOrderItem::Upgrade(Upgrade::TerranBuildingArmor), 5);

        assert_eq!(available.len(), 3);
        assert_eq!(available.maximum(0), 20);
        assert_eq!(available.maximum(1), 3);
        assert_eq!(available.maximum(2), 1);
        assert_eq!(
            available.item(1),
            BuildOrderItem::Upgrade(UpgradeFamily::ZergMeleeWeapons.at(UpgradeLevel::One))
        );
        assert_eq!(available.unit_type(0), Some(UnitTypeId(0)));
        assert_eq!(available.unit_type(1), None);
    }

    #[test]
    fn test_index_of_matches_any_tier() {
        let available = AvailableUnitTypes::new()
            .with(BuildOrderItem::Unit(UnitTypeId(4)), 20)
            .with(
                BuildOrderItem::Upgrade(UpgradeFamily::ZergMeleeWeapons.at(UpgradeLevel::One)),
                3,
            );
        let level_three = UpgradeFamily::ZergMeleeWeapons.at(UpgradeLevel::Three);
        assert_eq!(available.index_of(BuildOrderItem::Upgrade(level_three)), Some(1));
        assert_eq!(available.index_of(BuildOrderItem::Unit(UnitTypeId(4))), Some(0));
        assert_eq!(available.index_of(BuildOrderItem::Unit(UnitTypeId(5))), None);
    }

    #[test]
    fn test_empty_slots_rejected() {
        let catalog = UnitCatalog::from_ron_str(
            r#"CatalogData(units: [UnitData(name: "Zealot", radius: 0.5, health: 100.0)])"#,
        )
        .unwrap();
        assert!(AvailableUnitTypes::new().validate(&catalog).is_err());
        let bad = AvailableUnitTypes::new().with(BuildOrderItem::Unit(UnitTypeId(7)), 1);
        assert!(matches!(bad.validate(&catalog), Err(CombatError::UnknownUnitType(_))));
        assert!(AvailableUnitTypes::from_names(&catalog, &[("Zealot", 4)])
            .unwrap()
            .validate(&catalog)
            .is_ok());
    }
}
