//! Production time estimates for the composition search.
//!
//! The search only needs a rough answer to "how long until I have this
//! army", so [`BuildTimePredictor`] is a trait and callers can plug in a
//! real build-order simulator. [`IncomeBuildTimePredictor`] is a simple
//! stand-in: the estimate is the slower of gathering the resources at a
//! constant income and producing the units on a fixed number of producers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::data::{UnitCatalog, UnitTypeId};
use crate::error::{CombatError, Result};
use crate::optimizer::ArmyComposition;
use crate::upgrades::UpgradeSet;

/// Time reported for targets that can never be afforded.
pub const UNAFFORDABLE_TIME: f32 = 1.0e6;

/// What the player already has.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildState {
    /// Owned units by type.
    pub units: Vec<(UnitTypeId, u32)>,
    /// Researched upgrades.
    pub upgrades: UpgradeSet,
    /// Banked minerals.
    pub minerals: f32,
    /// Banked vespene.
    pub vespene: f32,
}

impl BuildState {
    /// Owned count of one unit type.
    #[must_use]
    pub fn count(&self, unit_type: UnitTypeId) -> u32 {
        self.units
            .iter()
            .filter(|(t, _)| *t == unit_type)
            .map(|(_, n)| n)
            .sum()
    }
}

/// Estimated cost of reaching a target composition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildEstimate {
    /// Seconds until everything is built.
    pub time: f32,
    /// Minerals spent.
    pub minerals: f32,
    /// Vespene spent.
    pub vespene: f32,
}

/// Estimates production time for a batch of target compositions.
pub trait BuildTimePredictor {
    /// One estimate per target, in target order.
    fn predict_time_to_build(
        &self,
        start: &BuildState,
        targets: &[ArmyComposition],
    ) -> Result<Vec<BuildEstimate>>;
}

/// Economy assumed by [`IncomeBuildTimePredictor`].
///
/// ```ron
/// IncomeModel(mineral_income: 20.0, producers: 6)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncomeModel {
    /// Minerals per second.
    pub mineral_income: f32,
    /// Vespene per second.
    pub vespene_income: f32,
    /// Units produced in parallel.
    pub producers: u32,
}

impl Default for IncomeModel {
    fn default() -> Self {
        Self {
            mineral_income: 16.0,
            vespene_income: 6.0,
            producers: 4,
        }
    }
}

/// Constant-income estimator.
#[derive(Debug, Clone)]
pub struct IncomeBuildTimePredictor {
    catalog: Arc<UnitCatalog>,
    model: IncomeModel,
}

impl IncomeBuildTimePredictor {
    /// Create an estimator with the default income model.
    #[must_use]
    pub fn new(catalog: Arc<UnitCatalog>) -> Self {
        Self::with_model(catalog, IncomeModel::default())
    }

    /// Create an estimator with an explicit income model.
    #[must_use]
    pub fn with_model(catalog: Arc<UnitCatalog>, model: IncomeModel) -> Self {
        Self { catalog, model }
    }

    /// The income model.
    #[must_use]
    pub fn model(&self) -> &IncomeModel {
        &self.model
    }

    fn estimate(&self, start: &BuildState, target: &ArmyComposition) -> Result<BuildEstimate> {
        let mut minerals = 0.0;
        let mut vespene = 0.0;
        let mut unit_time = 0.0;

        for &(unit_type, count) in &target.units {
            let missing = count.saturating_sub(start.count(unit_type));
            if missing == 0 {
                continue;
            }
            let data = self.catalog.try_get(unit_type)?;
            let n = missing as f32;
            minerals += data.cost.minerals * n;
            vespene += data.cost.vespene * n;
            unit_time += data.build_time * n;
        }

        let mut research_time = 0.0;
        for upgrade in target.upgrades.difference(&start.upgrades).iter() {
            let data = self
                .catalog
                .upgrade(upgrade)
                .ok_or(CombatError::MissingUpgradeData(upgrade))?;
            minerals += data.minerals;
            vespene += data.vespene;
            research_time += data.research_time;
        }

        let production_time = (unit_time / self.model.producers.max(1) as f32).max(research_time);
        let gather = |needed: f32, banked: f32, income: f32| {
            let missing = (needed - banked).max(0.0);
            if missing <= 0.0 {
                0.0
            } else if income > 0.0 {
                missing / income
            } else {
                UNAFFORDABLE_TIME
            }
        };
        let resource_time = gather(minerals, start.minerals, self.model.mineral_income)
            .max(gather(vespene, start.vespene, self.model.vespene_income));

        Ok(BuildEstimate {
            time: production_time.max(resource_time),
            minerals,
            vespene,
        })
    }
}

impl BuildTimePredictor for IncomeBuildTimePredictor {
    fn predict_time_to_build(
        &self,
        start: &BuildState,
        targets: &[ArmyComposition],
    ) -> Result<Vec<BuildEstimate>> {
        targets.iter().map(|t| self.estimate(start, t)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Upgrade, UpgradeFamily, UpgradeLevel};

    const CATALOG: &str = r#"
        CatalogData(
            melee_reference: "Zealot",
            units: [
                UnitData(name: "Zealot", radius: 0.5, health: 100.0, shield: 50.0, melee: true,
                    cost: Cost(minerals: 100.0, supply: 2.0), build_time: 27.0),
                UnitData(name: "Stalker", radius: 0.625, health: 80.0, shield: 80.0,
                    cost: Cost(minerals: 125.0, vespene: 50.0, supply: 2.0), build_time: 30.0),
            ],
            upgrades: [
                UpgradeData(upgrade: Tiered(ProtossGroundWeapons, One), minerals: 100.0, vespene: 100.0,
                    research_time: 129.0),
            ],
        )
    "#;

    fn predictor(model: IncomeModel) -> (IncomeBuildTimePredictor, UnitTypeId, UnitTypeId) {
        let catalog = Arc::new(UnitCatalog::from_ron_str(CATALOG).unwrap());
        let zealot = catalog.lookup("Zealot").unwrap();
        let stalker = catalog.lookup("Stalker").unwrap();
        (IncomeBuildTimePredictor::with_model(catalog, model), zealot, stalker)
    }

    fn army(units: Vec<(UnitTypeId, u32)>) -> ArmyComposition {
        ArmyComposition {
            units,
            upgrades: UpgradeSet::new(),
        }
    }

    #[test]
    fn test_resource_limited() {
        let model = IncomeModel {
            mineral_income: 10.0,
            vespene_income: 10.0,
            producers: 100,
        };
        let (p, zealot, _) = predictor(model);
        let estimates = p
            .predict_time_to_build(&BuildState::default(), &[army(vec![(zealot, 4)])])
            .unwrap();
        assert_eq!(estimates[0].minerals, 400.0);
        assert_eq!(estimates[0].time, 40.0);
    }

    #[test]
    fn test_production_limited() {
        let model = IncomeModel {
            mineral_income: 1000.0,
            vespene_income: 1000.0,
            producers: 2,
        };
        let (p, zealot, _) = predictor(model);
        let estimates = p
            .predict_time_to_build(&BuildState::default(), &[army(vec![(zealot, 4)])])
            .unwrap();
        assert_eq!(estimates[0].time, 54.0);
    }

    #[test]
    fn test_owned_units_and_bank_are_used() {
        let (p, zealot, stalker) = predictor(IncomeModel::default());
        let start = BuildState {
            units: vec![(zealot, 2)],
            minerals: 10_000.0,
            vespene: 10_000.0,
            ..BuildState::default()
        };
        let estimates = p
            .predict_time_to_build(&start, &[army(vec![(zealot, 2)]), army(vec![(stalker, 1)])])
            .unwrap();
        assert_eq!(estimates[0], BuildEstimate::default());
        assert_eq!(estimates[1].vespene, 50.0);
        assert_eq!(estimates[1].time, 30.0 / 4.0);
    }

    #[test]
    fn test_upgrades_add_cost_and_research() {
        let (p, _, _) = predictor(IncomeModel::default());
        let mut target = army(Vec::new());
        target.upgrades.insert(UpgradeFamily::ProtossGroundWeapons.at(UpgradeLevel::One));
        let estimate = p
            .predict_time_to_build(&BuildState::default(), &[target])
            .unwrap()[0];
        assert_eq!(estimate.minerals, 100.0);
        assert_eq!(estimate.time, 129.0);
    }

    #[test]
    fn test_missing_upgrade_data_is_an_error() {
        let (p, _, _) = predictor(IncomeModel::default());
        let mut target = army(Vec::new());
        target.upgrades.insert(Upgrade::ExtendedThermalLance);
        let err = p
            .predict_time_to_build(&BuildState::default(), &[target])
            .unwrap_err();
        assert!(matches!(err, CombatError::MissingUpgradeData(Upgrade::ExtendedThermalLance)));
    }

    #[test]
    fn test_no_income_is_unaffordable() {
        let model = IncomeModel {
            mineral_income: 0.0,
            ..IncomeModel::default()
        };
        let (p, zealot, _) = predictor(model);
        let estimates = p
            .predict_time_to_build(&BuildState::default(), &[army(vec![(zealot, 1)])])
            .unwrap();
        assert_eq!(estimates[0].time, UNAFFORDABLE_TIME);
    }
}
