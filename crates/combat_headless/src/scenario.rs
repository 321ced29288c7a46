//! Scenario loading and configuration.
//!
//! A scenario describes one battle: both armies, their upgrades and the
//! simulation settings. An optional search section turns it into a
//! composition search problem, where owner 1's army is the opponent and
//! owner 2's army (if any) seeds the population.
//!
//! ```ron
//! Scenario(
//!     name: "Bio vs ling",
//!     one: [(unit: "Marine", count: 8)],
//!     two: [(unit: "Zergling", count: 16, health: 0.5)],
//!     upgrades_two: [Tiered(ZergMeleeWeapons, One)],
//!     settings: (max_time: 60.0),
//! )
//! ```

use std::path::Path;

use combat_core::build_time::{BuildState, IncomeModel};
use combat_core::data::{UnitCatalog, Upgrade};
use combat_core::error::CombatError;
use combat_core::optimizer::{
    ArmyComposition, AvailableUnitTypes, BuildOrderItem, CompositionSearchSettings,
};
use combat_core::predictor::CombatPredictor;
use combat_core::settings::{CombatSettings, Defender};
use combat_core::unit::{CombatState, CombatUnit, Owner};
use combat_core::upgrades::UpgradeSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// A name or setting the model rejects.
    #[error("Invalid scenario: {0}")]
    Combat(#[from] CombatError),
    /// Scenario content out of range.
    #[error("Invalid scenario: {0}")]
    Invalid(String),
}

fn full_health() -> f32 {
    1.0
}

/// A number of identical units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitGroup {
    /// Catalog name.
    pub unit: String,
    /// How many.
    pub count: u32,
    /// Fraction of health and shield left, in `(0, 1]`.
    #[serde(default = "full_health")]
    pub health: f32,
}

impl UnitGroup {
    /// Full-health group.
    pub fn new(unit: impl Into<String>, count: u32) -> Self {
        Self {
            unit: unit.into(),
            count,
            health: 1.0,
        }
    }
}

/// What a search slot holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SlotItem {
    /// Units by catalog name.
    Unit(String),
    /// An upgrade; tiered families search over levels.
    Upgrade(Upgrade),
}

/// One search slot and its maximum count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSlot {
    /// Slot content.
    pub item: SlotItem,
    /// Largest count the search may pick.
    pub max: u32,
}

/// Composition search part of a scenario.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchScenario {
    /// Slots to search over.
    pub available: Vec<SearchSlot>,
    /// Search parameters.
    pub settings: CompositionSearchSettings,
    /// Economy for production estimates. Without it, genes are not
    /// scaled to the time budget.
    pub income: Option<IncomeModel>,
    /// Units the searching player already owns.
    pub starting_units: Vec<UnitGroup>,
    /// Banked minerals.
    pub starting_minerals: f32,
    /// Banked vespene.
    pub starting_vespene: f32,
}

/// A complete scenario configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Owner 1's army.
    #[serde(default)]
    pub one: Vec<UnitGroup>,
    /// Owner 2's army.
    #[serde(default)]
    pub two: Vec<UnitGroup>,
    /// Owner 1's upgrades.
    #[serde(default)]
    pub upgrades_one: Vec<Upgrade>,
    /// Owner 2's upgrades.
    #[serde(default)]
    pub upgrades_two: Vec<Upgrade>,
    /// Simulation settings.
    #[serde(default)]
    pub settings: CombatSettings,
    /// Which side holds position.
    #[serde(default)]
    pub defender: Defender,
    /// Optional composition search.
    #[serde(default)]
    pub search: Option<SearchScenario>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::marines_vs_zerglings()
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let scenario: Scenario = ron::from_str(&contents)?;
        Ok(scenario)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// Four marines against four zerglings.
    #[must_use]
    pub fn marines_vs_zerglings() -> Self {
        Self {
            name: "Marines vs Zerglings".to_string(),
            description: "Even-count ranged against melee".to_string(),
            one: vec![UnitGroup::new("Marine", 4)],
            two: vec![UnitGroup::new("Zergling", 4)],
            upgrades_one: Vec::new(),
            upgrades_two: Vec::new(),
            settings: CombatSettings::default(),
            defender: Defender::default(),
            search: None,
        }
    }

    fn upgrade_set(upgrades: &[Upgrade]) -> UpgradeSet {
        upgrades.iter().copied().collect()
    }

    fn push_units(
        predictor: &CombatPredictor,
        units: &mut Vec<CombatUnit>,
        owner: Owner,
        groups: &[UnitGroup],
    ) -> Result<(), ScenarioError> {
        for group in groups {
            if !(group.health > 0.0 && group.health <= 1.0) {
                return Err(ScenarioError::Invalid(format!(
                    "health fraction {} for {} is outside (0, 1]",
                    group.health, group.unit
                )));
            }
            let unit_type = predictor.catalog().lookup(&group.unit)?;
            for _ in 0..group.count {
                let mut unit = predictor.make_unit(owner, unit_type);
                unit.health = unit.health_max * group.health;
                unit.shield = unit.shield_max * group.health;
                units.push(unit);
            }
        }
        Ok(())
    }

    /// Battle state with both armies and their upgrades.
    pub fn build_state(&self, predictor: &CombatPredictor) -> Result<CombatState, ScenarioError> {
        let mut units = Vec::new();
        Self::push_units(predictor, &mut units, Owner::One, &self.one)?;
        Self::push_units(predictor, &mut units, Owner::Two, &self.two)?;
        let environment = predictor.get_combat_environment(
            Self::upgrade_set(&self.upgrades_one),
            Self::upgrade_set(&self.upgrades_two),
        );
        Ok(CombatState::new(units).with_environment(environment))
    }

    /// Owner 1's army alone, the opponent of a composition search.
    pub fn opponent_state(&self, predictor: &CombatPredictor) -> Result<CombatState, ScenarioError> {
        let mut units = Vec::new();
        Self::push_units(predictor, &mut units, Owner::One, &self.one)?;
        let environment = predictor
            .get_combat_environment(Self::upgrade_set(&self.upgrades_one), UpgradeSet::new());
        Ok(CombatState::new(units).with_environment(environment))
    }

    /// Owner 2's army as a seed composition, `None` when empty.
    pub fn seed_composition(
        &self,
        catalog: &UnitCatalog,
    ) -> Result<Option<ArmyComposition>, ScenarioError> {
        if self.two.is_empty() && self.upgrades_two.is_empty() {
            return Ok(None);
        }
        let mut composition = ArmyComposition {
            upgrades: Self::upgrade_set(&self.upgrades_two),
            ..ArmyComposition::default()
        };
        for group in &self.two {
            composition.units.push((catalog.lookup(&group.unit)?, group.count));
        }
        Ok(Some(composition))
    }

    /// The search section, or an error naming the scenario.
    pub fn search(&self) -> Result<&SearchScenario, ScenarioError> {
        self.search.as_ref().ok_or_else(|| {
            ScenarioError::Invalid(format!("scenario '{}' has no search section", self.name))
        })
    }

    /// Resolve the search slots against `catalog`.
    pub fn available(&self, catalog: &UnitCatalog) -> Result<AvailableUnitTypes, ScenarioError> {
        let mut available = AvailableUnitTypes::new();
        for slot in &self.search()?.available {
            let item = match &slot.item {
                SlotItem::Unit(name) => BuildOrderItem::Unit(catalog.lookup(name)?),
                SlotItem::Upgrade(upgrade) => BuildOrderItem::Upgrade(*upgrade),
            };
            available.push(item, slot.max);
        }
        available.validate(catalog)?;
        Ok(available)
    }

    /// What the searching player starts with.
    pub fn starting_build_state(&self, catalog: &UnitCatalog) -> Result<BuildState, ScenarioError> {
        let search = self.search()?;
        let mut state = BuildState {
            upgrades: Self::upgrade_set(&self.upgrades_two),
            minerals: search.starting_minerals,
            vespene: search.starting_vespene,
            ..BuildState::default()
        };
        for group in &search.starting_units {
            state.units.push((catalog.lookup(&group.unit)?, group.count));
        }
        Ok(state)
    }
}
