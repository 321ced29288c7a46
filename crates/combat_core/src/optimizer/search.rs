//! The evolution loop.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::available::AvailableUnitTypes;
use super::fitness::{calculate_fitness, FitnessMode};
use super::gene::{ArmyComposition, CompositionGene, CrossoverMode};
use super::GENE_OWNER;
use crate::build_time::{BuildEstimate, BuildState, BuildTimePredictor};
use crate::error::{CombatError, Result};
use crate::predictor::CombatPredictor;
use crate::random::{RandomSource, SeededRng};
use crate::settings::{CombatSettings, Defender};
use crate::unit::CombatState;

const WINNING_SCALE: f32 = 1.5;
const WINNING_PASSES: usize = 5;

/// Tunables for [`find_best_composition_genetic`].
///
/// ```ron
/// CompositionSearchSettings(population: 30, generations: 80, crossover: PerGene)
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositionSearchSettings {
    /// Genes per generation.
    pub population: usize,
    /// Generations to run.
    pub generations: usize,
    /// Base per-slot mutation probability.
    pub mutation_rate: f64,
    /// Mean unit count of random genes.
    pub mean_total_count: f64,
    /// Production time budget in seconds genes are scaled towards.
    pub available_time: f32,
    /// Top genes copied unchanged into the next generation.
    pub elites: usize,
    /// Build-time refinement passes per generation.
    pub scaling_passes: usize,
    /// Generation at which the seed composition replaces the last gene.
    pub seed_generation: usize,
    /// How parents are combined.
    pub crossover: CrossoverMode,
    /// Which score ranks genes.
    pub fitness: FitnessMode,
    /// Settings for every simulated battle.
    pub combat: CombatSettings,
    /// Defending side in every simulated battle.
    pub defender: Defender,
}

impl Default for CompositionSearchSettings {
    fn default() -> Self {
        Self {
            population: 20,
            generations: 50,
            mutation_rate: 0.2,
            mean_total_count: 10.0,
            available_time: 4.0 * 60.0,
            elites: 5,
            scaling_passes: 4,
            seed_generation: 20,
            crossover: CrossoverMode::default(),
            fitness: FitnessMode::default(),
            combat: CombatSettings::default(),
            defender: Defender::default(),
        }
    }
}

impl CompositionSearchSettings {
    /// Set population size and elite count.
    #[must_use]
    pub fn with_population(mut self, population: usize, elites: usize) -> Self {
        self.population = population;
        self.elites = elites;
        self
    }

    /// Set the number of generations.
    #[must_use]
    pub fn with_generations(mut self, generations: usize) -> Self {
        self.generations = generations;
        self
    }

    /// Set the production time budget.
    #[must_use]
    pub fn with_available_time(mut self, seconds: f32) -> Self {
        self.available_time = seconds;
        self
    }

    /// Set the crossover mode.
    #[must_use]
    pub fn with_crossover(mut self, crossover: CrossoverMode) -> Self {
        self.crossover = crossover;
        self
    }

    /// Set the fitness mode.
    #[must_use]
    pub fn with_fitness(mut self, fitness: FitnessMode) -> Self {
        self.fitness = fitness;
        self
    }

    /// Set the battle settings.
    #[must_use]
    pub fn with_combat(mut self, combat: CombatSettings) -> Self {
        self.combat = combat;
        self
    }

    /// Set the generation the seed composition enters at.
    #[must_use]
    pub fn with_seed_generation(mut self, generation: usize) -> Self {
        self.seed_generation = generation;
        self
    }

    /// Reject settings the loop cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`CombatError::OptimizerSetup`] when there are no generations,
    /// no elites, or no room for the random survivor.
    pub fn validate(&self) -> Result<()> {
        if self.generations == 0 {
            return Err(CombatError::OptimizerSetup("generations must be at least 1".to_string()));
        }
        if self.elites == 0 {
            return Err(CombatError::OptimizerSetup("elites must be at least 1".to_string()));
        }
        if self.population < self.elites + 1 {
            return Err(CombatError::OptimizerSetup(format!(
                "population {} too small for {} elites plus a survivor",
                self.population, self.elites
            )));
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(CombatError::OptimizerSetup(format!(
                "mutation rate {} outside [0, 1]",
                self.mutation_rate
            )));
        }
        Ok(())
    }
}

/// Optional inputs of a search.
///
/// A starting build state and a build-time predictor go together; the
/// search is rejected when only one of them is given.
#[derive(Clone, Copy, Default)]
pub struct SearchSetup<'a> {
    /// What the player already has.
    pub starting: Option<&'a BuildState>,
    /// Production time oracle.
    pub build_predictor: Option<&'a dyn BuildTimePredictor>,
    /// Composition injected at [`CompositionSearchSettings::seed_generation`].
    pub seed: Option<&'a ArmyComposition>,
}

impl<'a> SearchSetup<'a> {
    /// No build-time scaling and no seed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scale genes towards the time budget using `predictor`.
    #[must_use]
    pub fn with_build_predictor(
        mut self,
        starting: &'a BuildState,
        predictor: &'a dyn BuildTimePredictor,
    ) -> Self {
        self.starting = Some(starting);
        self.build_predictor = Some(predictor);
        self
    }

    /// Inject `seed` into the population.
    #[must_use]
    pub fn with_seed(mut self, seed: &'a ArmyComposition) -> Self {
        self.seed = Some(seed);
        self
    }

    fn oracle(&self) -> Result<Option<(&'a BuildState, &'a dyn BuildTimePredictor)>> {
        match (self.starting, self.build_predictor) {
            (Some(start), Some(predictor)) => Ok(Some((start, predictor))),
            (None, None) => Ok(None),
            (Some(_), None) => Err(CombatError::OptimizerSetup(
                "starting build state given without a build-time predictor".to_string(),
            )),
            (None, Some(_)) => Err(CombatError::OptimizerSetup(
                "build-time predictor given without a starting build state".to_string(),
            )),
        }
    }
}

/// Fitness of one generation after evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationSummary {
    /// Zero-based generation index.
    pub generation: usize,
    /// Fitness of the best gene.
    pub best_fitness: f32,
    /// Mean fitness over the population.
    pub mean_fitness: f32,
}

/// Result of [`find_best_composition_genetic`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOutcome {
    /// Best composition of the final generation.
    pub best: ArmyComposition,
    /// Gene behind [`SearchOutcome::best`].
    pub best_gene: CompositionGene,
    /// Its fitness.
    pub best_fitness: f32,
    /// Production estimate for the best gene.
    pub best_estimate: BuildEstimate,
    /// One entry per generation.
    pub history: Vec<GenerationSummary>,
}

#[derive(Debug, Clone)]
struct Candidate {
    gene: CompositionGene,
    estimate: BuildEstimate,
    fitness: Option<f32>,
}

impl Candidate {
    fn new(gene: CompositionGene) -> Self {
        Self {
            gene,
            estimate: BuildEstimate::default(),
            fitness: None,
        }
    }

    fn score(&self) -> f32 {
        self.fitness.unwrap_or(f32::NEG_INFINITY)
    }
}

/// Search for the composition that best beats `opponent`.
///
/// Genes play as owner 2 against the units in `opponent`. When `setup`
/// carries a build-time predictor, new genes are rescaled towards
/// `settings.available_time` before evaluation. Elites keep their fitness
/// across generations, so the best fitness per generation never decreases.
///
/// # Errors
///
/// Returns [`CombatError::OptimizerSetup`] for inconsistent setup or
/// settings, [`CombatError::UnknownUnitType`] for slots the catalog does not
/// know, and any error of the build-time predictor.
pub fn find_best_composition_genetic<R: RandomSource + ?Sized>(
    predictor: &CombatPredictor,
    opponent: &CombatState,
    available: &AvailableUnitTypes,
    setup: SearchSetup<'_>,
    settings: &CompositionSearchSettings,
    rng: &mut R,
) -> Result<SearchOutcome> {
    let oracle = setup.oracle()?;
    settings.validate()?;
    available.validate(predictor.catalog())?;

    let base_seed = rng.next_u64();
    let mut population: Vec<Candidate> = (0..settings.population)
        .map(|_| Candidate::new(CompositionGene::randomize(available, settings.mean_total_count, rng)))
        .collect();
    let mut history = Vec::with_capacity(settings.generations);

    tracing::debug!(
        population = settings.population,
        generations = settings.generations,
        slots = available.len(),
        "Starting composition search"
    );

    for generation in 0..settings.generations {
        if generation == settings.seed_generation {
            if let (Some(seed), Some(last)) = (setup.seed, population.last_mut()) {
                *last = Candidate::new(CompositionGene::from_units(available, seed));
            }
        }

        if let Some((start, build_predictor)) = oracle {
            scale_to_budget(&mut population, available, start, build_predictor, settings)?;
        }

        let scores: Vec<(usize, f32)> = population
            .par_iter()
            .enumerate()
            .filter(|(_, c)| c.fitness.is_none())
            .map(|(i, c)| {
                let mut gene_rng = SeededRng::derive(base_seed, c.gene.fingerprint());
                let fitness = calculate_fitness(
                    predictor,
                    opponent,
                    available,
                    &c.gene,
                    &c.estimate,
                    settings,
                    &mut gene_rng,
                );
                (i, fitness)
            })
            .collect();
        for (i, fitness) in scores {
            population[i].fitness = Some(fitness);
        }

        population.sort_by(|a, b| b.score().total_cmp(&a.score()));

        let summary = GenerationSummary {
            generation,
            best_fitness: population[0].score(),
            mean_fitness: population.iter().map(Candidate::score).sum::<f32>() / population.len() as f32,
        };
        tracing::info!(
            generation,
            best = summary.best_fitness,
            mean = summary.mean_fitness,
            "Generation evaluated"
        );
        history.push(summary);

        if generation + 1 < settings.generations {
            population = next_generation(&population, available, settings, rng);
        }
    }

    let best = population.swap_remove(0);
    Ok(SearchOutcome {
        best: best.gene.materialize(available),
        best_fitness: best.score(),
        best_estimate: best.estimate,
        best_gene: best.gene,
        history,
    })
}

/// Rescale unevaluated genes until their production time matches the budget.
fn scale_to_budget(
    population: &mut [Candidate],
    available: &AvailableUnitTypes,
    start: &BuildState,
    build_predictor: &dyn BuildTimePredictor,
    settings: &CompositionSearchSettings,
) -> Result<()> {
    let pending: Vec<usize> = (0..population.len())
        .filter(|&i| population[i].fitness.is_none())
        .collect();
    if pending.is_empty() {
        return Ok(());
    }

    let estimate = |population: &[Candidate]| -> Result<Vec<BuildEstimate>> {
        let targets: Vec<ArmyComposition> = pending
            .iter()
            .map(|&i| population[i].gene.materialize(available))
            .collect();
        let estimates = build_predictor.predict_time_to_build(start, &targets)?;
        if estimates.len() != targets.len() {
            return Err(CombatError::InvalidState(format!(
                "build-time predictor returned {} estimates for {} targets",
                estimates.len(),
                targets.len()
            )));
        }
        Ok(estimates)
    };

    for _ in 0..settings.scaling_passes {
        let estimates = estimate(&*population)?;
        let mut changed = false;
        for (&i, est) in pending.iter().zip(&estimates) {
            let factor = settings.available_time / est.time.max(0.001);
            if (factor - 1.0).abs() > 0.01 {
                let before = population[i].gene.clone();
                population[i].gene.scale(factor, available);
                changed |= population[i].gene != before;
            }
        }
        if !changed {
            break;
        }
    }

    for (&i, est) in pending.iter().zip(estimate(&*population)?) {
        population[i].estimate = est;
    }
    Ok(())
}

/// Elites, one random survivor, then mutated children of the survivors.
fn next_generation<R: RandomSource + ?Sized>(
    ranked: &[Candidate],
    available: &AvailableUnitTypes,
    settings: &CompositionSearchSettings,
    rng: &mut R,
) -> Vec<Candidate> {
    let mut next: Vec<Candidate> = ranked.iter().take(settings.elites).cloned().collect();
    next.push(ranked[rng.index(ranked.len())].clone());

    let survivors = next.len();
    while next.len() < settings.population {
        let a = &next[rng.index(survivors)].gene;
        let b = &next[rng.index(survivors)].gene;
        let mut child = CompositionGene::crossover(a, b, settings.crossover, rng);
        child.mutate(settings.mutation_rate, rng, available);
        next.push(Candidate::new(child));
    }
    next
}

/// Scale `gene` by 1.5 until it beats `opponent`, for at most five battles.
///
/// Returns whether the last simulated battle was won.
pub fn scale_until_winning<R: RandomSource + ?Sized>(
    predictor: &CombatPredictor,
    opponent: &CombatState,
    available: &AvailableUnitTypes,
    gene: &mut CompositionGene,
    settings: &CompositionSearchSettings,
    rng: &mut R,
) -> bool {
    for pass in 0..WINNING_PASSES {
        let mut state = opponent.clone();
        gene.add_to_state(predictor, &mut state, available, GENE_OWNER);
        let result = predictor.predict_engage(state, &settings.combat, settings.defender, rng);
        if result.winner() == Some(GENE_OWNER) {
            tracing::debug!(pass, total = gene.total(), "Composition wins");
            return true;
        }
        if pass + 1 < WINNING_PASSES {
            gene.scale(WINNING_SCALE, available);
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::build_time::{IncomeBuildTimePredictor, IncomeModel};
    use crate::data::UnitCatalog;
    use crate::unit::Owner;

    const CATALOG: &str = r#"
        CatalogData(
            melee_reference: "Zergling",
            units: [
                UnitData(name: "Marine", race: Terran, radius: 0.375, speed: 2.25, health: 45.0,
                    attributes: [Light, Biological], cost: Cost(minerals: 50.0, supply: 1.0),
                    build_time: 18.0,
                    weapons: [WeaponData(damage: 6.0, cooldown: 0.8608, range: 5.0, target: Any)]),
                UnitData(name: "Zergling", race: Zerg, radius: 0.375, speed: 2.95, health: 35.0, melee: true,
                    attributes: [Light, Biological], cost: Cost(minerals: 25.0, supply: 0.5),
                    build_time: 17.0,
                    weapons: [WeaponData(damage: 5.0, cooldown: 0.696, range: 0.1, target: Ground)]),
            ],
        )
    "#;

    fn predictor() -> CombatPredictor {
        CombatPredictor::new(Arc::new(UnitCatalog::from_ron_str(CATALOG).unwrap()))
    }

    fn zerglings(p: &CombatPredictor, n: usize) -> CombatState {
        let ling = p.catalog().lookup("Zergling").unwrap();
        CombatState::new((0..n).map(|_| p.make_unit(Owner::One, ling)).collect())
    }

    fn available(p: &CombatPredictor) -> AvailableUnitTypes {
        AvailableUnitTypes::from_names(p.catalog(), &[("Marine", 20), ("Zergling", 20)]).unwrap()
    }

    fn small_settings() -> CompositionSearchSettings {
        CompositionSearchSettings::default()
            .with_population(6, 2)
            .with_generations(4)
            .with_seed_generation(100)
    }

    #[test]
    fn test_half_configured_oracle_rejected() {
        let p = predictor();
        let start = BuildState::default();
        let setup = SearchSetup {
            starting: Some(&start),
            ..SearchSetup::new()
        };
        let err = find_best_composition_genetic(
            &p,
            &zerglings(&p, 2),
            &available(&p),
            setup,
            &small_settings(),
            &mut SeededRng::new(1),
        )
        .unwrap_err();
        assert!(matches!(err, CombatError::OptimizerSetup(_)));
    }

    #[test]
    fn test_invalid_settings_rejected() {
        assert!(CompositionSearchSettings::default().validate().is_ok());
        assert!(CompositionSearchSettings::default().with_population(5, 5).validate().is_err());
        assert!(CompositionSearchSettings::default().with_population(5, 0).validate().is_err());
        assert!(CompositionSearchSettings::default().with_generations(0).validate().is_err());
    }

    #[test]
    fn test_settings_from_ron() {
        let settings: CompositionSearchSettings =
            ron::from_str("CompositionSearchSettings(population: 30, crossover: PerGene)").unwrap();
        assert_eq!(settings.population, 30);
        assert_eq!(settings.crossover, CrossoverMode::PerGene);
        assert_eq!(settings.generations, 50);
    }

    #[test]
    fn test_best_fitness_never_decreases() {
        let p = predictor();
        let settings = small_settings();
        let outcome = find_best_composition_genetic(
            &p,
            &zerglings(&p, 4),
            &available(&p),
            SearchSetup::new(),
            &settings,
            &mut SeededRng::new(42),
        )
        .unwrap();

        assert_eq!(outcome.history.len(), settings.generations);
        for pair in outcome.history.windows(2) {
            assert!(pair[1].best_fitness >= pair[0].best_fitness);
        }
        assert_eq!(outcome.best_fitness, outcome.history.last().unwrap().best_fitness);
        assert_eq!(outcome.best_gene.len(), 2);
        assert_eq!(outcome.best, outcome.best_gene.materialize(&available(&p)));
    }

    #[test]
    fn test_search_is_reproducible() {
        let p = predictor();
        let run = |seed| {
            find_best_composition_genetic(
                &p,
                &zerglings(&p, 3),
                &available(&p),
                SearchSetup::new(),
                &small_settings(),
                &mut SeededRng::new(seed),
            )
            .unwrap()
        };
        let a = run(9);
        let b = run(9);
        assert_eq!(a.best_gene, b.best_gene);
        assert_eq!(a.history, b.history);
    }

    #[test]
    fn test_seed_composition_is_evaluated() {
        let p = predictor();
        let opponent = zerglings(&p, 4);
        let available = available(&p);
        let marine = p.catalog().lookup("Marine").unwrap();
        let seed = ArmyComposition {
            units: vec![(marine, 8)],
            ..ArmyComposition::default()
        };
        let settings = small_settings().with_seed_generation(0);

        let outcome = find_best_composition_genetic(
            &p,
            &opponent,
            &available,
            SearchSetup::new().with_seed(&seed),
            &settings,
            &mut SeededRng::new(3),
        )
        .unwrap();

        let seed_gene = CompositionGene::from_units(&available, &seed);
        let base_seed = SeededRng::new(3).next_u64();
        let seed_fitness = calculate_fitness(
            &p,
            &opponent,
            &available,
            &seed_gene,
            &BuildEstimate::default(),
            &settings,
            &mut SeededRng::derive(base_seed, seed_gene.fingerprint()),
        );
        assert!(outcome.history[0].best_fitness >= seed_fitness);
    }

    #[test]
    fn test_genes_scaled_to_time_budget() {
        let p = predictor();
        let available = available(&p);
        let oracle = IncomeBuildTimePredictor::with_model(
            p.shared_catalog(),
            IncomeModel {
                mineral_income: 10.0,
                vespene_income: 10.0,
                producers: 100,
            },
        );
        let settings = CompositionSearchSettings::default().with_available_time(40.0);
        let mut population = vec![Candidate::new(CompositionGene::from_counts(vec![4, 0], &available))];

        scale_to_budget(&mut population, &available, &BuildState::default(), &oracle, &settings).unwrap();

        // 8 marines cost 400 minerals, 40 s at 10/s
        assert_eq!(population[0].gene.counts(), &[8, 0]);
        assert_eq!(population[0].estimate.time, 40.0);
    }

    #[test]
    fn test_evaluated_genes_are_not_rescaled() {
        let p = predictor();
        let available = available(&p);
        let oracle = IncomeBuildTimePredictor::new(p.shared_catalog());
        let settings = CompositionSearchSettings::default();
        let mut elite = Candidate::new(CompositionGene::from_counts(vec![1, 1], &available));
        elite.fitness = Some(5.0);
        let mut population = vec![elite];

        scale_to_budget(&mut population, &available, &BuildState::default(), &oracle, &settings).unwrap();
        assert_eq!(population[0].gene.counts(), &[1, 1]);
    }

    #[test]
    fn test_scale_until_winning() {
        let p = predictor();
        let available = available(&p);
        let settings = CompositionSearchSettings::default();
        let opponent = zerglings(&p, 3);

        let mut gene = CompositionGene::from_counts(vec![1, 0], &available);
        assert!(scale_until_winning(&p, &opponent, &available, &mut gene, &settings, &mut SeededRng::new(5)));
        assert!(gene.total() > 1);

        let mut empty = CompositionGene::zeros(2);
        assert!(!scale_until_winning(&p, &opponent, &available, &mut empty, &settings, &mut SeededRng::new(5)));
        assert_eq!(empty.total(), 0);
    }
}
