//! The blueprint catalogue for a match.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::building_data::BuildingData;
use super::map_data::MapDefinition;
use super::unit_data::UnitData;
use crate::ai::{PersonalityProfile, ProfileTable};
use crate::components::{Income, WeaponSpec};
use crate::error::ConfigError;
use crate::math::Fixed;
use crate::production::{
    BlueprintRegistry, BuildingBlueprint, BuildingTypeId, ProductionKind, UnitBlueprint, UnitTypeId,
};

/// Longest flight a projectile may need to cross its weapon's full range.
pub const MAX_FLIGHT_TICKS: u32 = 10_000;

/// All unit and building definitions, plus optional AI profile overrides.
///
/// # Example RON
///
/// ```ron
/// GameData(
///     units: [
///         (id: "infantry", cost: 100, build_time: 60, health: 45, speed: 0.35),
///     ],
///     buildings: [
///         (id: "headquarters", cost: 1000, build_time: 0, health: 500,
///          headquarters: true, power_output: 100, power_usage: 50,
///          produces: ["barracks"]),
///         (id: "barracks", cost: 300, build_time: 60, health: 200,
///          produces: ["infantry"]),
///     ],
/// )
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameData {
    /// Unit definitions.
    pub units: Vec<UnitData>,
    /// Building definitions.
    pub buildings: Vec<BuildingData>,
    /// Replacement AI profiles; personalities not listed keep their defaults.
    #[serde(default)]
    pub personalities: Vec<PersonalityProfile>,
}

impl GameData {
    /// Parse game data from RON and validate it.
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let data: Self = ron::from_str(text).map_err(|source| ConfigError::Parse {
            what: "game data",
            source,
        })?;
        data.validate()?;
        Ok(data)
    }

    /// Check ids are unique, references resolve and values are in range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for id in self
            .units
            .iter()
            .map(|u| &u.id)
            .chain(self.buildings.iter().map(|b| &b.id))
        {
            if !seen.insert(id.as_str()) {
                return Err(ConfigError::DuplicateBlueprint(id.clone()));
            }
        }

        for unit in &self.units {
            if unit.health == 0 {
                return Err(invalid(&unit.id, "health", "must be positive"));
            }
            if unit.speed < Fixed::ZERO {
                return Err(invalid(&unit.id, "speed", "must not be negative"));
            }
            if let Some(weapon) = &unit.weapon {
                validate_weapon(&unit.id, weapon)?;
            }
        }

        for building in &self.buildings {
            if building.health == 0 {
                return Err(invalid(&building.id, "health", "must be positive"));
            }
            if building.footprint.width == 0 || building.footprint.height == 0 {
                return Err(invalid(&building.id, "footprint", "must cover at least one cell"));
            }
            if let Some(weapon) = &building.weapon {
                validate_weapon(&building.id, weapon)?;
            }
            if let Some(income) = &building.income {
                if income.interval == 0 {
                    return Err(invalid(&building.id, "income.interval", "must be positive"));
                }
            }
            for item in &building.produces {
                if !seen.contains(item.as_str()) {
                    return Err(ConfigError::UnknownBlueprint {
                        id: item.clone(),
                        referenced_by: format!("building '{}'", building.id),
                    });
                }
            }
        }

        for profile in &self.personalities {
            profile.validate()?;
        }
        Ok(())
    }

    /// Check that every start entity in `map` names a known blueprint.
    pub fn validate_map(&self, map: &MapDefinition) -> Result<(), ConfigError> {
        for entity in &map.start {
            let known = self.units.iter().any(|u| u.id == entity.blueprint)
                || self.buildings.iter().any(|b| b.id == entity.blueprint);
            if !known {
                return Err(ConfigError::UnknownBlueprint {
                    id: entity.blueprint.clone(),
                    referenced_by: format!("map '{}' start manifest", map.name),
                });
            }
        }
        Ok(())
    }

    /// Compile definitions into an id-indexed registry.
    pub fn build_registry(&self) -> Result<BlueprintRegistry, ConfigError> {
        self.validate()?;
        let mut registry = BlueprintRegistry::new();

        for unit in &self.units {
            registry.register_unit(UnitBlueprint {
                id: UnitTypeId(0),
                name: unit.id.clone(),
                cost: unit.cost,
                build_time: unit.build_time,
                health: unit.health,
                class: unit.class,
                speed: unit.speed,
                sight: unit.sight,
                weapon: unit.weapon,
            });
        }

        // Register every building before linking `produces`, since
        // buildings may produce buildings defined later in the file.
        let mut ids = Vec::with_capacity(self.buildings.len());
        for building in &self.buildings {
            ids.push(registry.register_building(BuildingBlueprint {
                id: BuildingTypeId(0),
                name: building.id.clone(),
                cost: building.cost,
                build_time: building.build_time,
                construction_time: building.construction_time,
                health: building.health,
                footprint: building.footprint,
                power_output: building.power_output,
                power_usage: building.power_usage,
                income: building.income.map_or(0, |i| i.amount),
                income_interval: building.income.map_or(0, |i| i.interval),
                weapon: building.weapon,
                produces: Vec::new(),
                is_headquarters: building.headquarters,
            }));
        }

        for (building, id) in self.buildings.iter().zip(ids) {
            let mut produces = Vec::with_capacity(building.produces.len());
            for name in &building.produces {
                let item: ProductionKind =
                    registry
                        .item_by_name(name)
                        .ok_or_else(|| ConfigError::UnknownBlueprint {
                            id: name.clone(),
                            referenced_by: format!("building '{}'", building.id),
                        })?;
                produces.push(item);
            }
            if let Some(blueprint) = registry.building_mut(id) {
                blueprint.produces = produces;
            }
        }

        Ok(registry)
    }

    /// Default AI profiles with this data's overrides applied.
    #[must_use]
    pub fn profile_table(&self) -> ProfileTable {
        let mut table = ProfileTable::default();
        for profile in &self.personalities {
            table.set(profile.clone());
        }
        table
    }
}

fn validate_weapon(id: &str, weapon: &WeaponSpec) -> Result<(), ConfigError> {
    if weapon.range <= Fixed::ZERO {
        return Err(invalid(id, "weapon.range", "must be positive"));
    }
    if weapon.splash_radius < Fixed::ZERO {
        return Err(invalid(id, "weapon.splash_radius", "must not be negative"));
    }
    if weapon.projectile_speed < Fixed::ZERO {
        return Err(invalid(id, "weapon.projectile_speed", "must not be negative"));
    }
    if weapon.projectile_speed > Fixed::ZERO {
        let flight = weapon
            .range
            .checked_div(weapon.projectile_speed)
            .and_then(|ticks| ticks.checked_ceil());
        if flight.map_or(true, |ticks| ticks > Fixed::from_num(MAX_FLIGHT_TICKS)) {
            return Err(invalid(
                id,
                "weapon.projectile_speed",
                "too slow to cross the weapon's range",
            ));
        }
    }
    Ok(())
}

fn invalid(id: &str, field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: format!("{id}.{field}"),
        message: message.to_string(),
    }
}

/// Income component for a freshly built building.
#[must_use]
pub fn income_for(blueprint: &BuildingBlueprint) -> Option<Income> {
    (blueprint.income > 0 && blueprint.income_interval > 0).then_some(Income {
        amount: blueprint.income,
        interval: blueprint.income_interval,
        elapsed: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: &str = r#"(
        units: [
            (id: "infantry", cost: 100, build_time: 60, health: 45, speed: 0.35,
             weapon: Some((damage: 10, range: 4.0, cooldown: 25))),
        ],
        buildings: [
            (id: "headquarters", cost: 1000, build_time: 0, health: 500,
             headquarters: true, power_output: 100, power_usage: 50,
             produces: ["barracks"]),
            (id: "barracks", cost: 300, build_time: 60, construction_time: 30,
             health: 200, produces: ["infantry"]),
            (id: "oil_derrick", cost: 300, build_time: 40, health: 200,
             income: Some((amount: 100, interval: 300))),
        ],
    )"#;

    #[test]
    fn test_build_registry_links_production() {
        let data = GameData::from_ron_str(DATA).unwrap();
        let registry = data.build_registry().unwrap();

        let hq = registry
            .building_id("headquarters")
            .and_then(|id| registry.building(id))
            .unwrap();
        let barracks_id = registry.building_id("barracks").unwrap();
        assert!(hq.is_headquarters);
        assert!(hq.can_produce(ProductionKind::Building(barracks_id)));

        let barracks = registry.building(barracks_id).unwrap();
        let infantry = registry.unit_id("infantry").unwrap();
        assert!(barracks.can_produce(ProductionKind::Unit(infantry)));
        assert_eq!(barracks.construction_time, 30);

        let derrick = registry
            .building_id("oil_derrick")
            .and_then(|id| registry.building(id))
            .unwrap();
        assert_eq!(
            income_for(derrick),
            Some(Income {
                amount: 100,
                interval: 300,
                elapsed: 0
            })
        );
    }

    #[test]
    fn test_unknown_produce_reference() {
        let text = DATA.replace("produces: [\"infantry\"]", "produces: [\"cavalry\"]");
        let err = GameData::from_ron_str(&text).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownBlueprint { ref id, .. } if id == "cavalry"));
    }

    #[test]
    fn test_duplicate_ids() {
        let text = DATA.replace("id: \"oil_derrick\"", "id: \"barracks\"");
        assert!(matches!(
            GameData::from_ron_str(&text),
            Err(ConfigError::DuplicateBlueprint(id)) if id == "barracks"
        ));
    }

    #[test]
    fn test_zero_health_rejected() {
        let text = DATA.replace("health: 45", "health: 0");
        assert!(matches!(
            GameData::from_ron_str(&text),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_crawling_projectile_rejected() {
        let text = DATA.replace("cooldown: 25", "cooldown: 25, projectile_speed: 0.000000001");
        let err = GameData::from_ron_str(&text).unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "infantry.weapon.projectile_speed"),
            "{err}"
        );

        let ok = DATA.replace("cooldown: 25", "cooldown: 25, projectile_speed: 0.5");
        assert!(GameData::from_ron_str(&ok).is_ok());
    }

    #[test]
    fn test_negative_weapon_values_rejected() {
        for (weapon, field) in [
            ("splash_radius: -1.0", "infantry.weapon.splash_radius"),
            ("projectile_speed: -2.0", "infantry.weapon.projectile_speed"),
        ] {
            let text = DATA.replace("cooldown: 25", &format!("cooldown: 25, {weapon}"));
            assert!(matches!(
                GameData::from_ron_str(&text),
                Err(ConfigError::InvalidValue { field: ref f, .. }) if f == field
            ));
        }
    }

    #[test]
    fn test_turret_weapon_checked() {
        let text = DATA.replace(
            "income: Some((amount: 100, interval: 300))",
            "weapon: Some((damage: 20, range: 0.0, cooldown: 30))",
        );
        assert!(matches!(
            GameData::from_ron_str(&text),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "oil_derrick.weapon.range"
        ));
    }

    #[test]
    fn test_validate_map_checks_start_blueprints() {
        let data = GameData::from_ron_str(DATA).unwrap();
        let map = MapDefinition::from_ron_str(
            r#"(name: "M", width: 4, height: 4,
                players: [(id: 0, credits: 0, controller: Human)],
                start: [(player: 0, blueprint: "mothership", cell: (0, 0))])"#,
        )
        .unwrap();
        assert!(matches!(
            data.validate_map(&map),
            Err(ConfigError::UnknownBlueprint { .. })
        ));
    }
}
