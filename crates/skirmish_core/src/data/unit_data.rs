//! Unit data structures for data-driven unit definitions.

use serde::{Deserialize, Serialize};

use crate::components::{UnitClass, WeaponSpec};
use crate::math::{fixed_serde, Fixed};

/// Data-driven unit definition.
///
/// Compiled into a [`UnitBlueprint`](crate::production::UnitBlueprint) when
/// the registry is built.
///
/// # Example RON
///
/// ```ron
/// UnitData(
///     id: "rocket_soldier",
///     cost: 200,
///     build_time: 60,
///     health: 45,
///     class: Infantry,
///     speed: 0.35,
///     weapon: Some(WeaponSpec(
///         damage: 120,
///         range: 7.0,
///         cooldown: 80,
///         projectile_speed: 0.5,
///         damage_type: Explosive,
///     )),
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitData {
    /// Unique string identifier for this unit type.
    pub id: String,

    /// Display name. Defaults to the id.
    #[serde(default)]
    pub name: Option<String>,

    /// Credits to produce this unit.
    pub cost: u32,

    /// Production time in simulation ticks.
    pub build_time: u32,

    /// Maximum health points.
    pub health: u32,

    /// Movement class.
    #[serde(default)]
    pub class: UnitClass,

    /// Movement speed in world units per tick.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,

    /// Sight radius used for scouting.
    #[serde(default = "default_sight", with = "fixed_serde")]
    pub sight: Fixed,

    /// Weapon (None for unarmed units).
    #[serde(default)]
    pub weapon: Option<WeaponSpec>,
}

fn default_sight() -> Fixed {
    Fixed::from_num(8)
}

impl UnitData {
    /// Display name, falling back to the id.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}
