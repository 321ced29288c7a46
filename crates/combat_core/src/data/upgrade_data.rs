//! Upgrade identifiers and their catalog data.

use serde::{Deserialize, Serialize};

/// Upgrade families researched in three levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UpgradeFamily {
    /// Barracks unit weapons.
    TerranInfantryWeapons,
    /// Barracks unit armor.
    TerranInfantryArmor,
    /// Factory unit weapons.
    TerranVehicleWeapons,
    /// Starport unit weapons.
    TerranShipWeapons,
    /// Factory and Starport unit armor.
    TerranVehicleAndShipArmor,
    /// Protoss ground weapons.
    ProtossGroundWeapons,
    /// Protoss ground armor.
    ProtossGroundArmor,
    /// Protoss shields.
    ProtossShields,
    /// Protoss air weapons.
    ProtossAirWeapons,
    /// Protoss air armor.
    ProtossAirArmor,
    /// Zerg melee attacks.
    ZergMeleeWeapons,
    /// Zerg missile attacks.
    ZergMissileWeapons,
    /// Zerg ground carapace.
    ZergGroundArmor,
    /// Zerg flyer attacks.
    ZergFlyerWeapons,
    /// Zerg flyer carapace.
    ZergFlyerArmor,
}

impl UpgradeFamily {
    /// Every family, in bit order.
    pub const ALL: [Self; 15] = [
        Self::TerranInfantryWeapons,
        Self::TerranInfantryArmor,
        Self::TerranVehicleWeapons,
        Self::TerranShipWeapons,
        Self::TerranVehicleAndShipArmor,
        Self::ProtossGroundWeapons,
        Self::ProtossGroundArmor,
        Self::ProtossShields,
        Self::ProtossAirWeapons,
        Self::ProtossAirArmor,
        Self::ZergMeleeWeapons,
        Self::ZergMissileWeapons,
        Self::ZergGroundArmor,
        Self::ZergFlyerWeapons,
        Self::ZergFlyerArmor,
    ];

    /// The upgrade for one level of this family.
    #[must_use]
    pub const fn at(self, level: UpgradeLevel) -> Upgrade {
        Upgrade::Tiered(self, level)
    }

    /// Levels 1 through 3 of this family.
    #[must_use]
    pub const fn levels(self) -> [Upgrade; 3] {
        [
            self.at(UpgradeLevel::One),
            self.at(UpgradeLevel::Two),
            self.at(UpgradeLevel::Three),
        ]
    }
}

/// Level within a tiered family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UpgradeLevel {
    /// Level 1.
    One,
    /// Level 2.
    Two,
    /// Level 3.
    Three,
}

impl UpgradeLevel {
    /// Numeric level (1..=3).
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Three => 3,
        }
    }

    /// Level from a number, `None` outside 1..=3.
    #[must_use]
    pub const fn from_number(level: u32) -> Option<Self> {
        match level {
            1 => Some(Self::One),
            2 => Some(Self::Two),
            3 => Some(Self::Three),
            _ => None,
        }
    }
}

/// Upgrade identifier.
///
/// Every variant maps to a fixed bit in [`UpgradeSet`](crate::upgrades::UpgradeSet).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Upgrade {
    /// One level of a tiered family.
    Tiered(UpgradeFamily, UpgradeLevel),
    /// +2 armor for Terran structures.
    TerranBuildingArmor,
    /// Adept Resonating Glaives.
    AdeptPiercingAttack,
    /// Colossus Extended Thermal Lance.
    ExtendedThermalLance,
}

const SINGLE_UPGRADES: [Upgrade; 3] = [
    Upgrade::TerranBuildingArmor,
    Upgrade::AdeptPiercingAttack,
    Upgrade::ExtendedThermalLance,
];

impl Upgrade {
    /// Number of distinct upgrade identifiers.
    pub const COUNT: usize = UpgradeFamily::ALL.len() * 3 + SINGLE_UPGRADES.len();

    /// Dense bit index of this upgrade.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Tiered(family, level) => family as usize * 3 + level.number() as usize - 1,
            Self::TerranBuildingArmor => UpgradeFamily::ALL.len() * 3,
            Self::AdeptPiercingAttack => UpgradeFamily::ALL.len() * 3 + 1,
            Self::ExtendedThermalLance => UpgradeFamily::ALL.len() * 3 + 2,
        }
    }

    /// Inverse of [`Upgrade::index`].
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        let tiered = UpgradeFamily::ALL.len() * 3;
        if index < tiered {
            let family = UpgradeFamily::ALL[index / 3];
            let level = UpgradeLevel::from_number((index % 3) as u32 + 1)?;
            Some(Self::Tiered(family, level))
        } else {
            SINGLE_UPGRADES.get(index - tiered).copied()
        }
    }

    /// Whether the upgrade belongs to a level 1..3 family.
    #[must_use]
    pub const fn is_tiered(self) -> bool {
        matches!(self, Self::Tiered(..))
    }
}

/// Catalog data for one upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UpgradeData {
    /// The upgrade described.
    pub upgrade: Upgrade,
    /// Mineral cost.
    pub minerals: f32,
    /// Vespene cost.
    #[serde(default)]
    pub vespene: f32,
    /// Research time in seconds.
    #[serde(default)]
    pub research_time: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_round_trip_covers_all() {
        for index in 0..Upgrade::COUNT {
            let upgrade = Upgrade::from_index(index).unwrap();
            assert_eq!(upgrade.index(), index);
        }
        assert!(Upgrade::from_index(Upgrade::COUNT).is_none());
    }

    #[test]
    fn test_family_levels_are_consecutive() {
        let levels = UpgradeFamily::ZergMeleeWeapons.levels();
        assert_eq!(levels[1].index(), levels[0].index() + 1);
        assert_eq!(levels[2].index(), levels[0].index() + 2);
        assert!(levels.iter().all(|u| u.is_tiered()));
        assert!(!Upgrade::TerranBuildingArmor.is_tiered());
    }

    #[test]
    fn test_level_numbers() {
        assert_eq!(UpgradeLevel::from_number(2), Some(UpgradeLevel::Two));
        assert_eq!(UpgradeLevel::from_number(0), None);
        assert_eq!(UpgradeLevel::Three.number(), 3);
    }

    #[test]
    fn test_upgrade_ron_format() {
        let upgrade: Upgrade = ron::from_str("Tiered(ProtossShields, Two)").unwrap();
        assert_eq!(upgrade, UpgradeFamily::ProtossShields.at(UpgradeLevel::Two));
    }
}
