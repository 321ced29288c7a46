//! Composition genes and their genetic operators.

use serde::{Deserialize, Serialize};

use super::available::{AvailableUnitTypes, BuildOrderItem};
use crate::data::{UnitTypeId, Upgrade, UpgradeLevel};
use crate::predictor::CombatPredictor;
use crate::random::{mix_seed, RandomSource};
use crate::unit::{CombatState, Owner};
use crate::upgrades::UpgradeSet;

/// Chance that a slot holding at most one item is set.
const SINGLE_SLOT_PROBABILITY: f64 = 0.2;
/// Chance that a mutating non-zero slot swaps with another slot.
const SWAP_PROBABILITY: f64 = 0.2;

/// How [`CompositionGene::crossover`] picks parents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossoverMode {
    /// Independent coin flip per slot.
    #[default]
    PerSlot,
    /// One coin flip for the whole gene; the child copies one parent.
    PerGene,
}

/// Concrete units and upgrades of a gene.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArmyComposition {
    /// Unit types with non-zero counts, in slot order.
    pub units: Vec<(UnitTypeId, u32)>,
    /// Upgrades, tiered families expanded to every level up to the count.
    pub upgrades: UpgradeSet,
}

impl ArmyComposition {
    /// Merge `other` into this composition.
    pub fn combine(&mut self, other: &Self) {
        for &(unit_type, count) in &other.units {
            match self.units.iter_mut().find(|(t, _)| *t == unit_type) {
                Some((_, existing)) => *existing += count,
                None => self.units.push((unit_type, count)),
            }
        }
        self.upgrades.combine(&other.upgrades);
    }

    /// Total number of units.
    #[must_use]
    pub fn unit_count(&self) -> u32 {
        self.units.iter().map(|(_, n)| n).sum()
    }
}

/// Per-slot counts of one candidate composition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompositionGene {
    counts: Vec<u32>,
}

impl CompositionGene {
    /// All-zero gene with `len` slots.
    #[must_use]
    pub fn zeros(len: usize) -> Self {
        Self {
            counts: vec![0; len],
        }
    }

    /// Gene with explicit counts, clipped to the slot maxima.
    #[must_use]
    pub fn from_counts(mut counts: Vec<u32>, available: &AvailableUnitTypes) -> Self {
        counts.resize(available.len(), 0);
        for (i, count) in counts.iter_mut().enumerate() {
            *count = (*count).min(available.maximum(i));
        }
        Self { counts }
    }

    /// Random gene with about `mean_total_count` units.
    ///
    /// The total is drawn from an exponential distribution and split at
    /// uniformly random points, then each slot is clipped to its maximum.
    pub fn randomize<R: RandomSource + ?Sized>(
        available: &AvailableUnitTypes,
        mean_total_count: f64,
        rng: &mut R,
    ) -> Self {
        let len = available.len();
        if len == 0 {
            return Self::zeros(0);
        }
        let total = rng.exponential(mean_total_count).round() as usize;

        let mut points = Vec::with_capacity(len + 1);
        points.push(0);
        points.extend((1..len).map(|_| rng.index(total + 1)));
        points.push(total);
        points.sort_unstable();

        let counts = points
            .windows(2)
            .enumerate()
            .map(|(i, w)| ((w[1] - w[0]) as u32).min(available.maximum(i)))
            .collect();
        Self { counts }
    }

    /// Gene reproducing `composition` as closely as the slots allow.
    #[must_use]
    pub fn from_units(available: &AvailableUnitTypes, composition: &ArmyComposition) -> Self {
        let mut counts = vec![0; available.len()];
        for &(unit_type, count) in &composition.units {
            if let Some(i) = available.index_of(BuildOrderItem::Unit(unit_type)) {
                counts[i] += count;
            }
        }
        for upgrade in composition.upgrades.iter() {
            let Some(i) = available.index_of(BuildOrderItem::Upgrade(upgrade)) else {
                continue;
            };
            counts[i] = match upgrade {
                Upgrade::Tiered(_, level) => counts[i].max(u32::from(level.number())),
                _ => 1,
            };
        }
        Self::from_counts(counts, available)
    }

    /// Slot counts.
    #[must_use]
    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// Number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether the gene has no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all slot counts.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.counts.iter().sum()
    }

    /// Randomly perturb slot counts.
    ///
    /// Empty slots mutate with probability `rate`, occupied ones with
    /// `2 * rate`. A mutating slot that holds at most one item is set with
    /// probability 0.2. Occupied slots may swap with a random slot;
    /// otherwise the count is redrawn from a geometric distribution with
    /// mean `2 + count`.
    pub fn mutate<R: RandomSource + ?Sized>(
        &mut self,
        rate: f64,
        rng: &mut R,
        available: &AvailableUnitTypes,
    ) {
        let len = self.counts.len();
        for i in 0..len {
            let count = self.counts[i];
            let probability = if count > 0 { rate * 2.0 } else { rate };
            if !rng.bernoulli(probability) {
                continue;
            }

            let maximum = available.maximum(i);
            if maximum == 1 {
                self.counts[i] = u32::from(rng.bernoulli(SINGLE_SLOT_PROBABILITY));
            } else if count > 0 && rng.bernoulli(SWAP_PROBABILITY) {
                let j = rng.index(len);
                self.counts.swap(i, j);
                self.counts[i] = self.counts[i].min(maximum);
                self.counts[j] = self.counts[j].min(available.maximum(j));
            } else {
                let drawn = rng.geometric(1.0 / (2.0 + f64::from(count)));
                self.counts[i] = drawn.min(u64::from(maximum)) as u32;
            }
        }
    }

    /// Multiply every count by `factor`.
    ///
    /// Rounding carries a running offset across slots, so the rounded total
    /// tracks the scaled total.
    pub fn scale(&mut self, factor: f32, available: &AvailableUnitTypes) {
        let mut offset = 0.0_f64;
        for (i, count) in self.counts.iter_mut().enumerate() {
            let next = offset + f64::from(*count) * f64::from(factor);
            let scaled = (next.round() - offset.round()).max(0.0) as u32;
            *count = scaled.min(available.maximum(i));
            offset = next;
        }
    }

    /// Child of two parents.
    ///
    /// # Panics
    ///
    /// Panics if the parents have different lengths.
    #[must_use]
    pub fn crossover<R: RandomSource + ?Sized>(
        a: &Self,
        b: &Self,
        mode: CrossoverMode,
        rng: &mut R,
    ) -> Self {
        assert_eq!(a.counts.len(), b.counts.len(), "crossover of genes with different slot counts");
        let counts = match mode {
            CrossoverMode::PerSlot => a
                .counts
                .iter()
                .zip(&b.counts)
                .map(|(&x, &y)| if rng.bernoulli(0.5) { x } else { y })
                .collect(),
            CrossoverMode::PerGene => {
                if rng.bernoulli(0.5) {
                    a.counts.clone()
                } else {
                    b.counts.clone()
                }
            }
        };
        Self { counts }
    }

    /// Units and upgrades this gene stands for.
    #[must_use]
    pub fn materialize(&self, available: &AvailableUnitTypes) -> ArmyComposition {
        let mut composition = ArmyComposition::default();
        for (i, &count) in self.counts.iter().enumerate() {
            if count == 0 {
                continue;
            }
            match available.item(i) {
                BuildOrderItem::Unit(unit_type) => composition.units.push((unit_type, count)),
                BuildOrderItem::Upgrade(Upgrade::Tiered(family, _)) => {
                    for level in 1..=count.min(3) {
                        if let Some(level) = UpgradeLevel::from_number(level) {
                            composition.upgrades.insert(family.at(level));
                        }
                    }
                }
                BuildOrderItem::Upgrade(upgrade) => composition.upgrades.insert(upgrade),
            }
        }
        composition
    }

    /// Append this gene's units to `state` for `owner` and add its upgrades
    /// to the state's environment.
    pub fn add_to_state(
        &self,
        predictor: &CombatPredictor,
        state: &mut CombatState,
        available: &AvailableUnitTypes,
        owner: Owner,
    ) {
        let composition = self.materialize(available);
        for &(unit_type, count) in &composition.units {
            state
                .units
                .extend((0..count).map(|_| predictor.make_unit(owner, unit_type)));
        }
        state.environment = Some(predictor.combine_combat_environment(
            state.environment.as_deref(),
            &composition.upgrades,
            owner,
        ));
    }

    /// Hash of the counts, used to derive per-gene random streams. The
    /// value depends only on the counts and their order.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        self.counts
            .iter()
            .fold(self.counts.len() as u64, |hash, &count| {
                mix_seed(hash, u64::from(count))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::UpgradeFamily;
    use crate::random::SeededRng;

    fn available() -> AvailableUnitTypes {
        AvailableUnitTypes::new()
            .with(BuildOrderItem::Unit(UnitTypeId(0)), 20)
            .with(BuildOrderItem::Unit(UnitTypeId(1)), 5)
            .with(BuildOrderItem::Unit(UnitTypeId(2)), 1)
            .with(
                BuildOrderItem::Upgrade(UpgradeFamily::ZergMeleeWeapons.at(UpgradeLevel::One)),
                3,
            )
    }

    fn within_bounds(gene: &CompositionGene, available: &AvailableUnitTypes) -> bool {
        gene.len() == available.len()
            && gene
                .counts()
                .iter()
                .enumerate()
                .all(|(i, &c)| c <= available.maximum(i))
    }

    #[test]
    fn test_randomize_respects_maxima() {
        let available = available();
        let mut rng = SeededRng::new(11);
        for _ in 0..200 {
            let gene = CompositionGene::randomize(&available, 10.0, &mut rng);
            assert!(within_bounds(&gene, &available), "{gene:?}");
        }
    }

    #[test]
    fn test_mutate_respects_maxima() {
        let available = available();
        let mut rng = SeededRng::new(5);
        let mut gene = CompositionGene::from_counts(vec![10, 5, 1, 2], &available);
        for _ in 0..500 {
            gene.mutate(0.5, &mut rng, &available);
            assert!(within_bounds(&gene, &available), "{gene:?}");
        }
    }

    #[test]
    fn test_zero_rate_mutation_is_identity() {
        let available = available();
        let mut rng = SeededRng::new(5);
        let mut gene = CompositionGene::from_counts(vec![3, 2, 0, 1], &available);
        let before = gene.clone();
        gene.mutate(0.0, &mut rng, &available);
        assert_eq!(gene, before);
    }

    #[test]
    fn test_scale_tracks_total() {
        let wide = AvailableUnitTypes::new()
            .with(BuildOrderItem::Unit(UnitTypeId(0)), 100)
            .with(BuildOrderItem::Unit(UnitTypeId(1)), 100)
            .with(BuildOrderItem::Unit(UnitTypeId(2)), 100);
        let mut gene = CompositionGene::from_counts(vec![1, 1, 1], &wide);
        gene.scale(1.5, &wide);
        // 1.5, 3.0, 4.5 rounded at the running offset
        assert_eq!(gene.counts(), &[2, 1, 2]);
        assert_eq!(gene.total(), 5);

        let mut gene = CompositionGene::from_counts(vec![4, 6, 0], &wide);
        gene.scale(0.5, &wide);
        assert_eq!(gene.counts(), &[2, 3, 0]);
    }

    #[test]
    fn test_scale_clips_to_maxima() {
        let available = available();
        let mut gene = CompositionGene::from_counts(vec![10, 4, 1, 1], &available);
        gene.scale(3.0, &available);
        assert!(within_bounds(&gene, &available));
        assert_eq!(gene.counts()[0], 20);
    }

    #[test]
    fn test_crossover_modes() {
        let available = available();
        let a = CompositionGene::from_counts(vec![1, 1, 1, 1], &available);
        let b = CompositionGene::from_counts(vec![2, 2, 0, 2], &available);
        let mut rng = SeededRng::new(2);

        for _ in 0..50 {
            let child = CompositionGene::crossover(&a, &b, CrossoverMode::PerGene, &mut rng);
            assert!(child == a || child == b);
        }

        let mixed = (0..50)
            .map(|_| CompositionGene::crossover(&a, &b, CrossoverMode::PerSlot, &mut rng))
            .any(|child| child != a && child != b);
        assert!(mixed);
    }

    #[test]
    fn test_materialize_expands_upgrade_levels() {
        let available = available();
        let gene = CompositionGene::from_counts(vec![4, 0, 1, 2], &available);
        let composition = gene.materialize(&available);

        assert_eq!(composition.units, vec![(UnitTypeId(0), 4), (UnitTypeId(2), 1)]);
        let levels = UpgradeFamily::ZergMeleeWeapons.levels();
        assert!(composition.upgrades.contains(levels[0]));
        assert!(composition.upgrades.contains(levels[1]));
        assert!(!composition.upgrades.contains(levels[2]));
    }

    #[test]
    fn test_from_units_inverts_materialize() {
        let available = available();
        let gene = CompositionGene::from_counts(vec![7, 3, 0, 3], &available);
        let back = CompositionGene::from_units(&available, &gene.materialize(&available));
        assert_eq!(back, gene);
    }

    #[test]
    fn test_fingerprint_is_fixed_by_counts() {
        let available = available();
        let gene = CompositionGene::from_counts(vec![3, 1, 0, 1], &available);
        let expected = [3, 1, 0, 1]
            .iter()
            .fold(4, |hash, &count| mix_seed(hash, count));
        assert_eq!(gene.fingerprint(), expected);

        let reordered = CompositionGene::from_counts(vec![1, 3, 0, 1], &available);
        assert_ne!(gene.fingerprint(), reordered.fingerprint());
    }

    #[test]
    fn test_combine_merges_counts() {
        let mut a = ArmyComposition {
            units: vec![(UnitTypeId(0), 2)],
            upgrades: UpgradeSet::new(),
        };
        let mut upgrades = UpgradeSet::new();
        upgrades.insert(Upgrade::TerranBuildingArmor);
        let b = ArmyComposition {
            units: vec![(UnitTypeId(0), 3), (UnitTypeId(4), 1)],
            upgrades,
        };
        a.combine(&b);
        assert_eq!(a.units, vec![(UnitTypeId(0), 5), (UnitTypeId(4), 1)]);
        assert_eq!(a.unit_count(), 6);
        assert!(a.upgrades.contains(Upgrade::TerranBuildingArmor));
    }
}
