//! Building data structures for data-driven building definitions.

use serde::{Deserialize, Serialize};

use crate::components::{Footprint, WeaponSpec};

/// Periodic credit income definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeData {
    /// Credits per payout.
    pub amount: u32,
    /// Ticks between payouts.
    pub interval: u32,
}

/// Data-driven building definition.
///
/// # Example RON
///
/// ```ron
/// BuildingData(
///     id: "barracks",
///     cost: 300,
///     build_time: 60,
///     construction_time: 40,
///     health: 200,
///     footprint: (width: 2, height: 2),
///     power_usage: 20,
///     produces: ["infantry", "grenadier", "rocket_soldier"],
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingData {
    /// Unique string identifier for this building type.
    pub id: String,

    /// Display name. Defaults to the id.
    #[serde(default)]
    pub name: Option<String>,

    /// Credits to produce this building.
    pub cost: u32,

    /// Ticks spent in the producer's queue.
    pub build_time: u32,

    /// Ticks of on-site construction after placement.
    #[serde(default)]
    pub construction_time: u32,

    /// Maximum health points.
    pub health: u32,

    /// Size in grid cells.
    #[serde(default)]
    pub footprint: Footprint,

    /// Power supplied while active.
    #[serde(default)]
    pub power_output: u32,

    /// Power drawn while active.
    #[serde(default)]
    pub power_usage: u32,

    /// Resource extraction income.
    #[serde(default)]
    pub income: Option<IncomeData>,

    /// Defensive weapon.
    #[serde(default)]
    pub weapon: Option<WeaponSpec>,

    /// Unit and building ids this building can produce.
    #[serde(default)]
    pub produces: Vec<String>,

    /// Whether this is a headquarters.
    #[serde(default)]
    pub headquarters: bool,
}

impl BuildingData {
    /// Display name, falling back to the id.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        let data: BuildingData =
            ron::from_str(r#"(id: "power_plant", cost: 300, build_time: 40, health: 200, power_output: 100)"#)
                .unwrap();
        assert_eq!(data.footprint, Footprint::default());
        assert_eq!(data.power_output, 100);
        assert_eq!(data.construction_time, 0);
        assert!(data.produces.is_empty());
        assert!(!data.headquarters);
    }

    #[test]
    fn test_parse_income() {
        let data: BuildingData = ron::from_str(
            r#"(
                id: "oil_derrick",
                cost: 300,
                build_time: 40,
                health: 200,
                footprint: (width: 1, height: 2),
                income: Some((amount: 100, interval: 300)),
            )"#,
        )
        .unwrap();
        assert_eq!(
            data.income,
            Some(IncomeData {
                amount: 100,
                interval: 300
            })
        );
        assert_eq!(data.footprint, Footprint::new(1, 2));
    }
}
