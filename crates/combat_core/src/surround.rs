//! Melee surround limits.
//!
//! Defenders are treated as standing on the rim of a disk with their
//! combined footprint area; melee attackers form a ring one melee radius
//! further out. The result slightly overcounts for large homogeneous
//! clusters.

use std::f32::consts::PI;

/// Packing efficiency applied to groups of more than one defender.
const PACKING_DENSITY: f32 = 0.6;

/// How many melee units can engage a defending group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurroundInfo {
    /// Melee attackers allowed on a single defender.
    pub max_attackers_per_defender: u32,
    /// Melee attackers allowed in total.
    pub max_melee_attackers: u32,
}

/// Surround limits for defenders of total footprint `area`.
#[must_use]
pub fn max_surround(area: f32, defenders: u32, melee_radius: f32) -> SurroundInfo {
    let area = if defenders > 1 {
        area / PACKING_DENSITY
    } else {
        area
    };
    let radius = (area / PI).sqrt();

    let circumference_defenders = 2.0 * PI * radius;
    let circumference_attackers = 2.0 * PI * (radius + melee_radius);

    let defenders_in_range = (defenders as f32).min(circumference_defenders / (2.0 * melee_radius));
    let max_melee_attackers = (circumference_attackers / (2.0 * melee_radius)).ceil();

    let max_attackers_per_defender = if defenders_in_range > 0.0 {
        (max_melee_attackers / defenders_in_range).ceil()
    } else {
        1.0
    };

    SurroundInfo {
        max_attackers_per_defender: max_attackers_per_defender as u32,
        max_melee_attackers: max_melee_attackers as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARINE_RADIUS: f32 = 0.375;
    const ZEALOT_RADIUS: f32 = 0.5;

    fn marines(count: u32) -> SurroundInfo {
        let area = count as f32 * MARINE_RADIUS * MARINE_RADIUS * PI;
        max_surround(area, count, ZEALOT_RADIUS)
    }

    #[test]
    fn test_reference_values() {
        assert_eq!(
            marines(1),
            SurroundInfo {
                max_attackers_per_defender: 6,
                max_melee_attackers: 6
            }
        );
        assert_eq!(
            marines(2),
            SurroundInfo {
                max_attackers_per_defender: 4,
                max_melee_attackers: 8
            }
        );
        assert_eq!(
            marines(3),
            SurroundInfo {
                max_attackers_per_defender: 3,
                max_melee_attackers: 9
            }
        );
        assert_eq!(
            marines(4),
            SurroundInfo {
                max_attackers_per_defender: 3,
                max_melee_attackers: 10
            }
        );
    }

    #[test]
    fn test_large_single_defender() {
        let thor = max_surround(PI, 1, ZEALOT_RADIUS);
        assert_eq!(thor.max_melee_attackers, 10);
        assert_eq!(thor.max_attackers_per_defender, 10);
    }

    #[test]
    fn test_no_defenders() {
        let info = max_surround(0.0, 0, ZEALOT_RADIUS);
        assert_eq!(info.max_attackers_per_defender, 1);
        // A ring of melee radius around a point still fits four
        assert_eq!(info.max_melee_attackers, 4);
    }

    #[test]
    fn test_capacity_grows_with_group() {
        let small = marines(5);
        let large = marines(30);
        assert!(large.max_melee_attackers > small.max_melee_attackers);
        assert!(large.max_attackers_per_defender <= small.max_attackers_per_defender);
    }
}
