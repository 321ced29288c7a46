//! Combat predictor with shared environments and an optional result cache.
//!
//! [`CombatPredictor`] is the entry point for battle prediction. It owns the
//! catalog, builds [`CombatEnvironment`]s lazily per upgrade pair and can
//! memoize whole battle results.
//!
//! ## Result caching
//!
//! The cache key is a hash over the units sorted into a canonical order,
//! both owners' upgrades, the settings and the defender. With the cache
//! enabled every battle is simulated in canonical order, so the result does
//! not depend on the order units were listed in; it is mapped back to the
//! caller's order before returning. The random source does not take part in
//! the key: a hit returns whatever the first simulation of that battle
//! produced.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, PoisonError, RwLock};

use crate::abilities::AbilityTable;
use crate::damage::CombatEnvironment;
use crate::data::{UnitCatalog, UnitTypeId};
use crate::random::RandomSource;
use crate::recording::CombatRecording;
use crate::settings::{CombatSettings, Defender};
use crate::simulator::BattleSimulator;
use crate::unit::{make_unit, CombatResult, CombatState, CombatUnit, Owner};
use crate::upgrades::UpgradeSet;

type EnvironmentKey = (UpgradeSet, UpgradeSet);

/// Predicts battles for one catalog.
#[derive(Debug)]
pub struct CombatPredictor {
    catalog: Arc<UnitCatalog>,
    abilities: AbilityTable,
    default_environment: Arc<CombatEnvironment>,
    environments: RwLock<HashMap<EnvironmentKey, Arc<CombatEnvironment>>>,
    results: Option<RwLock<HashMap<u64, CombatResult>>>,
}

impl CombatPredictor {
    /// Create a predictor without a result cache.
    #[must_use]
    pub fn new(catalog: Arc<UnitCatalog>) -> Self {
        let abilities = AbilityTable::new(&catalog);
        let default_environment = Arc::new(CombatEnvironment::new(
            &catalog,
            UpgradeSet::new(),
            UpgradeSet::new(),
        ));
        let mut environments = HashMap::new();
        environments.insert(
            (UpgradeSet::new(), UpgradeSet::new()),
            Arc::clone(&default_environment),
        );

        Self {
            catalog,
            abilities,
            default_environment,
            environments: RwLock::new(environments),
            results: None,
        }
    }

    /// Enable memoization of battle results.
    #[must_use]
    pub fn with_result_cache(mut self) -> Self {
        self.results = Some(RwLock::new(HashMap::new()));
        self
    }

    /// The unit catalog.
    #[must_use]
    pub fn catalog(&self) -> &UnitCatalog {
        &self.catalog
    }

    /// Shared handle to the unit catalog.
    #[must_use]
    pub fn shared_catalog(&self) -> Arc<UnitCatalog> {
        Arc::clone(&self.catalog)
    }

    /// Environment without upgrades.
    #[must_use]
    pub fn default_environment(&self) -> &Arc<CombatEnvironment> {
        &self.default_environment
    }

    /// A simulator borrowing this predictor's tables.
    #[must_use]
    pub fn simulator(&self) -> BattleSimulator<'_> {
        BattleSimulator::new(&self.catalog, &self.abilities, &self.default_environment)
    }

    /// Full-health unit with 100 energy.
    #[must_use]
    pub fn make_unit(&self, owner: Owner, unit_type: UnitTypeId) -> CombatUnit {
        make_unit(&self.catalog, owner, unit_type)
    }

    /// Value of attacking `target`; see [`BattleSimulator::target_score`].
    #[must_use]
    pub fn target_score(&self, target: &CombatUnit, has_ground: bool, has_air: bool) -> f32 {
        self.simulator().target_score(target, has_ground, has_air)
    }

    /// Environment for an upgrade pair, built on first use.
    pub fn get_combat_environment(
        &self,
        upgrades_one: UpgradeSet,
        upgrades_two: UpgradeSet,
    ) -> Arc<CombatEnvironment> {
        let key = (upgrades_one, upgrades_two);
        {
            let environments = self
                .environments
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(env) = environments.get(&key) {
                return Arc::clone(env);
            }
        }

        let env = Arc::new(CombatEnvironment::new(&self.catalog, upgrades_one, upgrades_two));
        let mut environments = self
            .environments
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(environments.entry(key).or_insert(env))
    }

    /// Environment `env` with `upgrades` added to one owner.
    pub fn combine_combat_environment(
        &self,
        env: Option<&CombatEnvironment>,
        upgrades: &UpgradeSet,
        owner: Owner,
    ) -> Arc<CombatEnvironment> {
        let mut pair = env.map_or([UpgradeSet::new(); 2], CombatEnvironment::upgrade_pair);
        pair[owner.index()].combine(upgrades);
        self.get_combat_environment(pair[0], pair[1])
    }

    /// Number of environments built so far, including the default.
    #[must_use]
    pub fn environment_count(&self) -> usize {
        self.environments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Predict a battle.
    pub fn predict_engage<R: RandomSource + ?Sized>(
        &self,
        state: CombatState,
        settings: &CombatSettings,
        defender: Defender,
        rng: &mut R,
    ) -> CombatResult {
        let Some(results) = &self.results else {
            return self.simulator().simulate(state, settings, defender, rng, None);
        };

        let order = canonical_order(&state.units);
        let key = self.cache_key(&state, &order, settings, defender);

        let cached = results
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned();
        if let Some(result) = cached {
            tracing::trace!(key, "Battle result cache hit");
            return restore_order(result, &order, state.environment);
        }

        let environment = state.environment.clone();
        let canonical = CombatState {
            units: order.iter().map(|&i| state.units[i].clone()).collect(),
            environment: state.environment,
        };
        let result = self
            .simulator()
            .simulate(canonical, settings, defender, rng, None);

        results
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, result.clone());
        restore_order(result, &order, environment)
    }

    /// Predict a battle and append its frames to `recording`. Never cached.
    pub fn predict_engage_recorded<R: RandomSource + ?Sized>(
        &self,
        state: CombatState,
        settings: &CombatSettings,
        defender: Defender,
        rng: &mut R,
        recording: &mut CombatRecording,
    ) -> CombatResult {
        self.simulator()
            .simulate(state, settings, defender, rng, Some(recording))
    }

    /// Drop all cached results. Environments are kept.
    pub fn clear_cache(&self) {
        if let Some(results) = &self.results {
            results
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
        }
    }

    /// Number of cached results.
    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.results.as_ref().map_or(0, |results| {
            results.read().unwrap_or_else(PoisonError::into_inner).len()
        })
    }

    fn cache_key(
        &self,
        state: &CombatState,
        order: &[usize],
        settings: &CombatSettings,
        defender: Defender,
    ) -> u64 {
        let mut hasher = DefaultHasher::new();
        for &i in order {
            hash_unit(&state.units[i], &mut hasher);
        }
        let upgrades = state
            .environment
            .as_deref()
            .map_or([UpgradeSet::new(); 2], CombatEnvironment::upgrade_pair);
        upgrades.hash(&mut hasher);
        settings.cache_words().hash(&mut hasher);
        defender.hash(&mut hasher);
        hasher.finish()
    }
}

fn hash_unit<H: Hasher>(unit: &CombatUnit, hasher: &mut H) {
    unit.owner.hash(hasher);
    unit.unit_type.hash(hasher);
    unit.health.to_bits().hash(hasher);
    unit.shield.to_bits().hash(hasher);
    unit.barrier.to_bits().hash(hasher);
    unit.energy.to_bits().hash(hasher);
    unit.buff_timer.to_bits().hash(hasher);
    unit.is_flying.hash(hasher);
}

/// Indices of `units` in canonical order.
fn canonical_order(units: &[CombatUnit]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..units.len()).collect();
    order.sort_by(|&a, &b| {
        let (a, b) = (&units[a], &units[b]);
        a.owner
            .cmp(&b.owner)
            .then(a.unit_type.cmp(&b.unit_type))
            .then(a.health.total_cmp(&b.health))
            .then(a.shield.total_cmp(&b.shield))
            .then(a.barrier.total_cmp(&b.barrier))
            .then(a.energy.total_cmp(&b.energy))
            .then(a.buff_timer.total_cmp(&b.buff_timer))
            .then(a.is_flying.cmp(&b.is_flying))
    });
    order
}

/// Map a canonical-order result back to the caller's order. Units spawned
/// during the battle stay at the end.
fn restore_order(
    mut result: CombatResult,
    order: &[usize],
    environment: Option<Arc<CombatEnvironment>>,
) -> CombatResult {
    let spawned = result.state.units.split_off(order.len());
    let mut slots: Vec<Option<CombatUnit>> = vec![None; order.len()];
    for (unit, &original) in result.state.units.drain(..).zip(order) {
        slots[original] = Some(unit);
    }
    result.state.units = slots.into_iter().flatten().chain(spawned).collect();
    result.state.environment = environment;
    result
}
