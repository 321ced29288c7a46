//! Genetic search for army compositions.
//!
//! A [`CompositionGene`] holds one count per slot of [`AvailableUnitTypes`].
//! Slots are either unit types or upgrades; tiered upgrade slots count
//! levels. Genes are scored by simulating them as owner 2 against a fixed
//! opponent and weighing the outcome against their cost and production time.
//!
//! The search in [`find_best_composition_genetic`] runs a fixed population
//! over a fixed number of generations with elitism, crossover and mutation.
//! Fitness evaluation is parallel but every gene uses its own seeded stream,
//! so results do not depend on thread scheduling.

mod available;
mod fitness;
mod gene;
mod search;

use crate::unit::Owner;

pub use available::{AvailableUnitTypes, BuildOrderItem};
pub use fitness::{calculate_fitness, mineral_score, mineral_score_fixed_time, FitnessMode};
pub use gene::{ArmyComposition, CompositionGene, CrossoverMode};
pub use search::{
    find_best_composition_genetic, scale_until_winning, CompositionSearchSettings,
    GenerationSummary, SearchOutcome, SearchSetup,
};

/// Owner the searched composition plays as.
pub const GENE_OWNER: Owner = Owner::Two;
