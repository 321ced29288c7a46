//! Battle configuration.

use serde::{Deserialize, Serialize};

use crate::unit::Owner;

/// Toggles and limits for one simulated battle.
///
/// Deserializes with defaults for missing fields:
///
/// ```ron
/// CombatSettings(enable_splash: false, max_time: 60.0)
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatSettings {
    /// Owner 2 picks its worst target instead of its best.
    pub bad_micro: bool,
    /// Apply splash damage to extra targets.
    pub enable_splash: bool,
    /// Delay attacks until units could have walked into range.
    pub enable_timing_adjustment: bool,
    /// Cap melee attackers by the surround model.
    pub enable_surround_limits: bool,
    /// Melee units prefer melee targets and slower targets.
    pub enable_melee_blocking: bool,
    /// Basic harvesters never attack.
    pub workers_do_no_damage: bool,
    /// Melee units pick the least valuable reachable target, as if the
    /// enemy kept its valuable units behind.
    pub assume_reasonable_positioning: bool,
    /// Stop once simulated time reaches this.
    pub max_time: f32,
    /// Simulated time at the start of the battle.
    pub start_time: f32,
}

impl Default for CombatSettings {
    fn default() -> Self {
        Self {
            bad_micro: false,
            enable_splash: true,
            enable_timing_adjustment: true,
            enable_surround_limits: true,
            enable_melee_blocking: true,
            workers_do_no_damage: false,
            assume_reasonable_positioning: true,
            max_time: 100_000.0,
            start_time: 0.0,
        }
    }
}

impl CombatSettings {
    /// Set the time limit.
    #[must_use]
    pub fn with_max_time(mut self, max_time: f32) -> Self {
        self.max_time = max_time;
        self
    }

    /// Set the starting time.
    #[must_use]
    pub fn with_start_time(mut self, start_time: f32) -> Self {
        self.start_time = start_time;
        self
    }

    /// Enable or disable bad micro.
    #[must_use]
    pub fn with_bad_micro(mut self, bad_micro: bool) -> Self {
        self.bad_micro = bad_micro;
        self
    }

    /// Enable or disable splash.
    #[must_use]
    pub fn with_splash(mut self, enabled: bool) -> Self {
        self.enable_splash = enabled;
        self
    }

    /// Enable or disable the travel-time gate.
    #[must_use]
    pub fn with_timing_adjustment(mut self, enabled: bool) -> Self {
        self.enable_timing_adjustment = enabled;
        self
    }

    /// Stable hash input for result caching.
    pub(crate) fn cache_words(&self) -> [u32; 3] {
        let flags = [
            self.bad_micro,
            self.enable_splash,
            self.enable_timing_adjustment,
            self.enable_surround_limits,
            self.enable_melee_blocking,
            self.workers_do_no_damage,
            self.assume_reasonable_positioning,
        ]
        .iter()
        .enumerate()
        .fold(0u32, |acc, (i, flag)| acc | (u32::from(*flag) << i));
        [flags, self.max_time.to_bits(), self.start_time.to_bits()]
    }
}

/// Which side holds position while the other approaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Defender {
    /// This owner defends.
    Owner(Owner),
    /// Both sides approach; travel times use both groups.
    Neutral,
}

impl Default for Defender {
    fn default() -> Self {
        Self::Owner(Owner::One)
    }
}

impl Defender {
    /// Defender from an id: 1 or 2 for an owner, anything else is neutral.
    #[must_use]
    pub fn from_id(id: u8) -> Self {
        Owner::from_id(id).map_or(Self::Neutral, Self::Owner)
    }

    /// Whether `owner` is the defending side.
    #[must_use]
    pub fn is(self, owner: Owner) -> bool {
        self == Self::Owner(owner)
    }

    /// Same designation with owners swapped.
    #[must_use]
    pub fn swapped(self) -> Self {
        match self {
            Self::Owner(owner) => Self::Owner(owner.opponent()),
            Self::Neutral => Self::Neutral,
        }
    }
}
