//! Test fixtures and helpers.
//!
//! The bundled catalog plus builders for battle states, so tests can name
//! units instead of looking up type ids.

use std::sync::{Arc, OnceLock};

use combat_core::data::{UnitCatalog, UnitTypeId};
use combat_core::predictor::CombatPredictor;
use combat_core::unit::{CombatState, CombatUnit, Owner};

/// The catalog shipped in `assets/data/catalog.ron`.
pub const CATALOG_RON: &str = include_str!("../../../assets/data/catalog.ron");

static CATALOG: OnceLock<Arc<UnitCatalog>> = OnceLock::new();

/// Parsed bundled catalog, shared across tests.
///
/// # Panics
///
/// Panics if the bundled catalog does not parse.
#[must_use]
pub fn catalog() -> Arc<UnitCatalog> {
    CATALOG
        .get_or_init(|| {
            Arc::new(UnitCatalog::from_ron_str(CATALOG_RON).expect("bundled catalog is valid"))
        })
        .clone()
}

/// Predictor over the bundled catalog, without a result cache.
#[must_use]
pub fn predictor() -> CombatPredictor {
    CombatPredictor::new(catalog())
}

/// Type id of a bundled unit.
///
/// # Panics
///
/// Panics if the name is not in the catalog.
#[must_use]
pub fn unit_type(name: &str) -> UnitTypeId {
    catalog()
        .lookup(name)
        .unwrap_or_else(|e| panic!("fixture unit {name}: {e}"))
}

/// Full-health unit of a bundled type.
#[must_use]
pub fn unit(owner: Owner, name: &str) -> CombatUnit {
    combat_core::unit::make_unit(&catalog(), owner, unit_type(name))
}

/// Units for one owner from `(name, count)` pairs, in order.
#[must_use]
pub fn army(owner: Owner, units: &[(&str, u32)]) -> Vec<CombatUnit> {
    units
        .iter()
        .flat_map(|&(name, count)| (0..count).map(move |_| unit(owner, name)))
        .collect()
}

/// Battle of owner 1's units followed by owner 2's, without upgrades.
#[must_use]
pub fn battle(one: &[(&str, u32)], two: &[(&str, u32)]) -> CombatState {
    let mut units = army(Owner::One, one);
    units.extend(army(Owner::Two, two));
    CombatState::new(units)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_catalog_parses() {
        let catalog = catalog();
        assert!(catalog.len() > 40);
        assert_eq!(catalog.get(unit_type("Marine")).health, 45.0);
    }

    #[test]
    fn test_battle_orders_owners() {
        let state = battle(&[("Marine", 2)], &[("Zergling", 3)]);
        assert_eq!(state.units.len(), 5);
        assert_eq!(state.units_of(Owner::One).count(), 2);
        assert!(state.units[2..].iter().all(|u| u.owner == Owner::Two));
    }
}
