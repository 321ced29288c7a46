//! Battle units and battle state.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::damage::CombatEnvironment;
use crate::data::{UnitCatalog, UnitTypeId};
use crate::error::{CombatError, Result};

/// Side of a battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Owner {
    /// Player 1.
    One,
    /// Player 2.
    Two,
}

impl Owner {
    /// Both owners in id order.
    pub const BOTH: [Self; 2] = [Self::One, Self::Two];

    /// Owner from a 1-based id.
    pub fn from_id(id: u8) -> Result<Self> {
        match id {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            other => Err(CombatError::InvalidOwner(other)),
        }
    }

    /// 1-based id.
    #[must_use]
    pub const fn id(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }

    /// 0-based index for per-owner arrays.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::One => 0,
            Self::Two => 1,
        }
    }

    /// The other side.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::One => Self::Two,
            Self::Two => Self::One,
        }
    }
}

/// A unit taking part in one battle.
///
/// Populated once from the catalog at battle start and mutated only by the
/// simulator. Invariant: `0 <= health <= health_max`,
/// `0 <= shield <= shield_max`, `barrier >= 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatUnit {
    /// Owning side.
    pub owner: Owner,
    /// Catalog type.
    pub unit_type: UnitTypeId,
    /// Current health.
    pub health: f32,
    /// Maximum health.
    pub health_max: f32,
    /// Current shield.
    pub shield: f32,
    /// Maximum shield.
    pub shield_max: f32,
    /// Temporary damage absorption spent before shields.
    pub barrier: f32,
    /// Current energy.
    pub energy: f32,
    /// Whether the unit is airborne.
    pub is_flying: bool,
    /// Remaining Guardian Shield time.
    pub buff_timer: f32,
}

impl CombatUnit {
    /// A unit with explicit health and no shield, energy 0.
    #[must_use]
    pub fn new(owner: Owner, unit_type: UnitTypeId, health: f32, is_flying: bool) -> Self {
        Self {
            owner,
            unit_type,
            health,
            health_max: health,
            shield: 0.0,
            shield_max: 0.0,
            barrier: 0.0,
            energy: 0.0,
            is_flying,
            buff_timer: 0.0,
        }
    }

    /// Set current and maximum shield.
    #[must_use]
    pub fn with_shield(mut self, shield: f32) -> Self {
        self.shield = shield;
        self.shield_max = shield;
        self
    }

    /// Set energy.
    #[must_use]
    pub fn with_energy(mut self, energy: f32) -> Self {
        self.energy = energy;
        self
    }

    /// Whether the unit still has health.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }

    /// Health plus shield.
    #[must_use]
    pub fn total_health(&self) -> f32 {
        self.health + self.shield
    }

    /// Maximum health plus maximum shield.
    #[must_use]
    pub fn max_total_health(&self) -> f32 {
        self.health_max + self.shield_max
    }

    /// Apply damage (negative) or healing (positive).
    ///
    /// Damage drains barrier, then shield, then health. Healing only
    /// restores health. Results are clamped to the valid range.
    pub fn modify_health(&mut self, delta: f32) {
        if delta < 0.0 {
            let mut damage = -delta;

            let absorbed = damage.min(self.barrier);
            self.barrier -= absorbed;
            damage -= absorbed;

            let absorbed = damage.min(self.shield);
            self.shield -= absorbed;
            damage -= absorbed;

            self.health = (self.health - damage).max(0.0);
        } else {
            self.health = (self.health + delta).min(self.health_max);
        }
    }

    /// Kill the unit outright.
    pub fn kill(&mut self) {
        self.barrier = 0.0;
        self.shield = 0.0;
        self.health = 0.0;
    }

    /// Check the health/shield invariant.
    #[must_use]
    pub fn invariants_hold(&self) -> bool {
        (0.0..=self.health_max).contains(&self.health)
            && (0.0..=self.shield_max).contains(&self.shield)
            && self.barrier >= 0.0
            && self.energy.is_finite()
    }
}

/// Create a full-health unit from catalog data.
///
/// Units start with 100 energy. Units with a barrier (Immortal) get it as
/// extra absorption on top of their shield.
#[must_use]
pub fn make_unit(catalog: &UnitCatalog, owner: Owner, unit_type: UnitTypeId) -> CombatUnit {
    let data = catalog.get(unit_type);
    CombatUnit {
        owner,
        unit_type,
        health: data.health,
        health_max: data.health,
        shield: data.shield,
        shield_max: data.shield,
        barrier: data.barrier,
        energy: 100.0,
        is_flying: data.flying,
        buff_timer: 0.0,
    }
}

/// Units of both sides plus the environment they fight under.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CombatState {
    /// All units, both owners interleaved.
    pub units: Vec<CombatUnit>,

    /// Damage tables for this battle's upgrades. `None` means no upgrades.
    #[serde(skip)]
    pub environment: Option<Arc<CombatEnvironment>>,
}

impl CombatState {
    /// State without upgrades.
    #[must_use]
    pub fn new(units: Vec<CombatUnit>) -> Self {
        Self {
            units,
            environment: None,
        }
    }

    /// Attach an environment.
    #[must_use]
    pub fn with_environment(mut self, environment: Arc<CombatEnvironment>) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Units of one owner.
    pub fn units_of(&self, owner: Owner) -> impl Iterator<Item = &CombatUnit> {
        self.units.iter().filter(move |u| u.owner == owner)
    }

    /// Summed health and shield of one owner.
    #[must_use]
    pub fn total_health(&self, owner: Owner) -> f32 {
        self.units_of(owner).map(CombatUnit::total_health).sum()
    }

    /// Resource value of one owner's units, each scaled by its remaining
    /// health and shield.
    #[must_use]
    pub fn army_value(&self, catalog: &UnitCatalog, owner: Owner) -> f32 {
        self.units_of(owner)
            .map(|u| {
                let fraction = u.total_health() / u.max_total_health().max(0.01);
                catalog.get(u.unit_type).weighted_cost(1.0) * fraction
            })
            .sum()
    }

    /// Owner with more remaining health and shield, `None` on a tie.
    #[must_use]
    pub fn owner_with_best_outcome(&self) -> Option<Owner> {
        let one = self.total_health(Owner::One);
        let two = self.total_health(Owner::Two);
        if one > two {
            Some(Owner::One)
        } else if two > one {
            Some(Owner::Two)
        } else {
            None
        }
    }
}

/// Outcome of a simulated battle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatResult {
    /// Final state. Same unit order as the input, spawned units appended.
    pub state: CombatState,
    /// Simulated time when the battle stopped.
    pub time: f32,
    /// Per-owner time-weighted average of remaining health+shield.
    pub average_health_time: [f32; 2],
}

impl CombatResult {
    /// Winner by remaining health and shield.
    #[must_use]
    pub fn winner(&self) -> Option<Owner> {
        self.state.owner_with_best_outcome()
    }

    /// Serialize for fingerprinting or storage. The environment is skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| {
            CombatError::InvalidState(format!("Failed to serialize combat result: {e}"))
        })
    }

    /// Hash of the serialized result, stable across runs and toolchains.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn fingerprint(&self) -> Result<u64> {
        Ok(crate::random::stable_hash(&self.serialize()?))
    }

    /// Deserialize from [`CombatResult::serialize`] output.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid result.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(|e| {
            CombatError::InvalidState(format!("Failed to deserialize combat result: {e}"))
        })
    }
}
