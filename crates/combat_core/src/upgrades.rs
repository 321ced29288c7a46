//! Fixed-size upgrade bitset.

use serde::{Deserialize, Serialize};

use crate::data::Upgrade;

const WORDS: usize = 2;

/// Set of researched upgrades for one owner.
///
/// Backed by a fixed 128-bit array so it is `Copy`, hashable and cheap to
/// combine. Every [`Upgrade`] has a dedicated bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct UpgradeSet {
    bits: [u64; WORDS],
}

const _: () = assert!(Upgrade::COUNT <= WORDS * 64);

impl UpgradeSet {
    /// An empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self { bits: [0; WORDS] }
    }

    /// Whether the upgrade is present.
    #[must_use]
    pub const fn contains(&self, upgrade: Upgrade) -> bool {
        let index = upgrade.index();
        self.bits[index / 64] & (1 << (index % 64)) != 0
    }

    /// Add an upgrade.
    pub fn insert(&mut self, upgrade: Upgrade) {
        let index = upgrade.index();
        self.bits[index / 64] |= 1 << (index % 64);
    }

    /// Remove an upgrade.
    pub fn remove(&mut self, upgrade: Upgrade) {
        let index = upgrade.index();
        self.bits[index / 64] &= !(1 << (index % 64));
    }

    /// Add every upgrade from `other`.
    pub fn combine(&mut self, other: &Self) {
        for (a, b) in self.bits.iter_mut().zip(other.bits) {
            *a |= b;
        }
    }

    /// Remove every upgrade present in `other`.
    pub fn remove_all(&mut self, other: &Self) {
        for (a, b) in self.bits.iter_mut().zip(other.bits) {
            *a &= !b;
        }
    }

    /// Upgrades in either set.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut out = *self;
        out.combine(other);
        out
    }

    /// Upgrades in both sets.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        let mut out = *self;
        for (a, b) in out.bits.iter_mut().zip(other.bits) {
            *a &= b;
        }
        out
    }

    /// Upgrades in `self` but not in `other`.
    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        let mut out = *self;
        out.remove_all(other);
        out
    }

    /// Number of upgrades present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Whether no upgrade is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|w| *w == 0)
    }

    /// Raw words, for hashing into cache keys.
    #[must_use]
    pub const fn words(&self) -> [u64; WORDS] {
        self.bits
    }

    /// Present upgrades in bit order.
    pub fn iter(&self) -> impl Iterator<Item = Upgrade> + '_ {
        (0..Upgrade::COUNT)
            .filter_map(Upgrade::from_index)
            .filter(|u| self.contains(*u))
    }
}

impl FromIterator<Upgrade> for UpgradeSet {
    fn from_iter<I: IntoIterator<Item = Upgrade>>(iter: I) -> Self {
        let mut set = Self::new();
        for upgrade in iter {
            set.insert(upgrade);
        }
        set
    }
}

impl Extend<Upgrade> for UpgradeSet {
    fn extend<I: IntoIterator<Item = Upgrade>>(&mut self, iter: I) {
        for upgrade in iter {
            self.insert(upgrade);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{UpgradeFamily, UpgradeLevel};

    fn shields(level: UpgradeLevel) -> Upgrade {
        UpgradeFamily::ProtossShields.at(level)
    }

    #[test]
    fn test_insert_contains_remove() {
        let mut set = UpgradeSet::new();
        assert!(set.is_empty());
        set.insert(Upgrade::ExtendedThermalLance);
        set.insert(shields(UpgradeLevel::One));
        assert!(set.contains(Upgrade::ExtendedThermalLance));
        assert!(set.contains(shields(UpgradeLevel::One)));
        assert!(!set.contains(shields(UpgradeLevel::Two)));
        assert_eq!(set.len(), 2);

        set.remove(Upgrade::ExtendedThermalLance);
        assert!(!set.contains(Upgrade::ExtendedThermalLance));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_set_algebra() {
        let a: UpgradeSet = [shields(UpgradeLevel::One), Upgrade::TerranBuildingArmor]
            .into_iter()
            .collect();
        let b: UpgradeSet = [shields(UpgradeLevel::One), Upgrade::AdeptPiercingAttack]
            .into_iter()
            .collect();

        assert_eq!(a.union(&b).len(), 3);
        assert_eq!(a.intersection(&b).iter().collect::<Vec<_>>(), vec![shields(UpgradeLevel::One)]);
        assert_eq!(
            a.difference(&b).iter().collect::<Vec<_>>(),
            vec![Upgrade::TerranBuildingArmor]
        );
    }

    #[test]
    fn test_last_bit_usable() {
        let mut set = UpgradeSet::new();
        let last = Upgrade::from_index(Upgrade::COUNT - 1).unwrap();
        set.insert(last);
        assert!(set.contains(last));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![last]);
    }
}
