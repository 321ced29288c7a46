//! # Combat Core
//!
//! Battle outcome prediction and army composition search for a
//! StarCraft II style game.
//!
//! This crate contains **only** the model:
//! - No game client or bot control
//! - No file IO beyond parsing catalog text
//! - No system randomness (every random decision takes a [`random::RandomSource`])
//!
//! The same seed and inputs always produce byte-identical results, which
//! the determinism and property tests rely on.
//!
//! ## Crate Structure
//!
//! - [`data`] - Static unit and upgrade catalog
//! - [`damage`] - Weapon resolution and damage-per-second tables
//! - [`surround`] - Melee surround limits
//! - [`simulator`] - Discrete-time battle simulation
//! - [`predictor`] - Environment and result caching around the simulator
//! - [`optimizer`] - Genetic composition search
//! - [`build_time`] - Production time estimates used by the search

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod abilities;
pub mod build_time;
pub mod damage;
pub mod data;
pub mod error;
pub mod optimizer;
pub mod predictor;
pub mod random;
pub mod recording;
pub mod settings;
pub mod simulator;
pub mod surround;
pub mod unit;
pub mod upgrades;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::build_time::{
        BuildEstimate, BuildState, BuildTimePredictor, IncomeBuildTimePredictor, IncomeModel,
    };
    pub use crate::damage::CombatEnvironment;
    pub use crate::data::{UnitCatalog, UnitData, UnitTypeId, Upgrade, UpgradeFamily, UpgradeLevel};
    pub use crate::error::{CombatError, Result};
    pub use crate::optimizer::{
        find_best_composition_genetic, scale_until_winning, ArmyComposition, AvailableUnitTypes,
        BuildOrderItem, CompositionGene, CompositionSearchSettings, CrossoverMode, FitnessMode,
        SearchOutcome, SearchSetup,
    };
    pub use crate::predictor::CombatPredictor;
    pub use crate::random::{RandomSource, SeededRng};
    pub use crate::recording::CombatRecording;
    pub use crate::settings::{CombatSettings, Defender};
    pub use crate::unit::{CombatResult, CombatState, CombatUnit, Owner};
    pub use crate::upgrades::UpgradeSet;
}
