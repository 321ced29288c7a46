//! Data structures for the unit and upgrade catalog.
//!
//! This module contains pure data structures that describe unit types,
//! weapons and upgrades. All structs are designed to be deserialized
//! from RON files.
//!
//! **Note:** This module contains no IO - it only defines data types and
//! parses text handed to it. File loading is handled by `combat_headless`.

mod catalog;
mod unit_data;
mod upgrade_data;

pub use catalog::{CatalogData, UnitCatalog};
pub use unit_data::{
    Attribute, Cost, DamageBonus, Producer, Race, SpecialAbility, TargetKind, UnitData,
    UnitTypeId, UpgradeEffect, WeaponData, WeaponEffect,
};
pub use upgrade_data::{Upgrade, UpgradeData, UpgradeFamily, UpgradeLevel};
