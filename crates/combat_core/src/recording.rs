//! Diagnostic battle recording.
//!
//! Frames summarize remaining health+shield per (unit type, owner) once per
//! simulator iteration. Recording is write-only from the simulator's side
//! and never influences results.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::data::{UnitCatalog, UnitTypeId};
use crate::unit::{CombatUnit, Owner};

/// Game loops per second at normal speed.
pub const TICKS_PER_SECOND: f32 = 22.4;

/// Convert game loops to seconds.
#[must_use]
pub fn ticks_to_seconds(ticks: u32) -> f32 {
    ticks as f32 / TICKS_PER_SECOND
}

/// Summed health and shield of one unit type for one owner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthEntry {
    /// Unit type.
    pub unit_type: UnitTypeId,
    /// Owner.
    pub owner: Owner,
    /// Summed health and shield.
    pub health: f32,
}

/// One snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordingFrame {
    /// Game loop of the snapshot.
    pub tick: u32,
    /// Entries in first-seen order.
    pub healths: Vec<HealthEntry>,
}

impl RecordingFrame {
    /// Add a unit, merging with an existing entry of the same type and owner.
    pub fn add(&mut self, unit_type: UnitTypeId, owner: Owner, health: f32, shield: f32) {
        if let Some(entry) = self
            .healths
            .iter_mut()
            .find(|e| e.unit_type == unit_type && e.owner == owner)
        {
            entry.health += health + shield;
        } else {
            self.healths.push(HealthEntry {
                unit_type,
                owner,
                health: health + shield,
            });
        }
    }
}

/// Frames of one or more consecutive battles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CombatRecording {
    /// Recorded frames in time order.
    pub frames: Vec<RecordingFrame>,
}

impl CombatRecording {
    /// An empty recording.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seconds to add to battle time so a new battle starts after the
    /// last recorded frame.
    #[must_use]
    pub fn start_offset(&self, start_time: f32) -> f32 {
        self.frames
            .last()
            .map_or(0.0, |f| ticks_to_seconds(f.tick) + 1.0 - start_time)
    }

    /// Record the state of `units` at `seconds`.
    pub fn record<'a>(&mut self, seconds: f32, units: impl IntoIterator<Item = &'a CombatUnit>) {
        let mut frame = RecordingFrame {
            tick: (seconds * TICKS_PER_SECOND).round().max(0.0) as u32,
            healths: Vec::new(),
        };
        for unit in units {
            frame.add(unit.unit_type, unit.owner, unit.health, unit.shield);
        }
        self.frames.push(frame);
    }

    /// Write `tick,unit,owner,health` rows.
    pub fn write_csv<W: Write>(&self, catalog: &UnitCatalog, mut out: W) -> io::Result<()> {
        writeln!(out, "tick,unit,owner,health")?;
        for frame in &self.frames {
            for entry in &frame.healths {
                let name = catalog
                    .try_get(entry.unit_type)
                    .map_or_else(|_| entry.unit_type.to_string(), |d| d.name.clone());
                writeln!(
                    out,
                    "{},{},{},{}",
                    frame.tick,
                    name,
                    entry.owner.id(),
                    entry.health
                )?;
            }
        }
        Ok(())
    }
}
