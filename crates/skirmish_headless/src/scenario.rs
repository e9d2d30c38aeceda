//! Scenario loading.
//!
//! A scenario file ties together the blueprint data, a map and the
//! simulation settings for a match:
//!
//! ```ron
//! ScenarioFile(
//!     name: "Skirmish 1v1",
//!     data: Some("../game_data.ron"),
//!     map: "../maps/skirmish_1v1.ron",
//!     config: (tick_rate: 20),
//!     max_ticks: 36000,
//! )
//! ```
//!
//! Relative paths are resolved against the scenario file's directory. When
//! `data` is omitted the built-in blueprint set is used.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use skirmish_core::ai::Personality;
use skirmish_core::config::SimConfig;
use skirmish_core::data::{GameData, MapDefinition};
use skirmish_core::economy::Controller;
use skirmish_core::error::ConfigError;
use skirmish_core::simulation::Simulation;
use thiserror::Error;
use tracing::debug;

/// Blueprint set shipped with the runner.
pub const DEFAULT_GAME_DATA: &str = include_str!("../data/game_data.ron");

/// Map used when no scenario is given.
pub const DEFAULT_MAP: &str = include_str!("../data/maps/skirmish_1v1.ron");

/// Errors that can occur when loading scenarios.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// A referenced file does not exist.
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// A file exists but could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    ReadError {
        /// File being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The scenario file itself is not valid RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),

    /// Data, map or config failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The scenario cannot be used the way it was asked to be.
    #[error("Invalid scenario: {0}")]
    Invalid(String),
}

/// On-disk scenario description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioFile {
    /// Scenario name.
    pub name: String,
    /// Blueprint data file. `None` uses [`DEFAULT_GAME_DATA`].
    #[serde(default)]
    pub data: Option<PathBuf>,
    /// Map file.
    pub map: PathBuf,
    /// Simulation settings; omitted fields keep their defaults.
    #[serde(default)]
    pub config: SimConfig,
    /// Tick limit for non-interactive runs.
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,
}

/// Ten minutes at the default tick rate.
const fn default_max_ticks() -> u64 {
    12_000
}

/// A fully loaded scenario, ready to start simulations from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Blueprints.
    pub data: GameData,
    /// Map.
    pub map: MapDefinition,
    /// Simulation settings.
    pub config: SimConfig,
    /// Tick limit for non-interactive runs.
    pub max_ticks: u64,
}

impl Scenario {
    /// Load a scenario file and everything it references.
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let text = read_file(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_ron_str(&text, base)
    }

    /// Parse a scenario, resolving relative paths against `base`.
    pub fn from_ron_str(text: &str, base: &Path) -> Result<Self, ScenarioError> {
        let file: ScenarioFile = ron::from_str(text)?;
        let data = match &file.data {
            Some(path) => load_game_data(&base.join(path))?,
            None => GameData::from_ron_str(DEFAULT_GAME_DATA)?,
        };
        let map = load_map(&base.join(&file.map))?;
        let scenario = Self {
            name: file.name,
            data,
            map,
            config: file.config,
            max_ticks: file.max_ticks,
        };
        scenario.validate()?;
        debug!(scenario = %scenario.name, map = %scenario.map.name, "scenario loaded");
        Ok(scenario)
    }

    /// The built-in blueprints on the built-in map.
    pub fn builtin() -> Result<Self, ScenarioError> {
        let scenario = Self {
            name: "Skirmish 1v1".into(),
            data: GameData::from_ron_str(DEFAULT_GAME_DATA)?,
            map: MapDefinition::from_ron_str(DEFAULT_MAP)?,
            config: SimConfig::default(),
            max_ticks: default_max_ticks(),
        };
        scenario.validate()?;
        Ok(scenario)
    }

    /// Load the scenario at `path`, or the built-in one when `None`.
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self, ScenarioError> {
        path.map_or_else(Self::builtin, Self::load)
    }

    /// Check that the data, map and config fit together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.config.validate()?;
        self.map.validate()?;
        self.data.validate_map(&self.map)
    }

    /// Start a fresh simulation.
    pub fn simulation(&self) -> Result<Simulation, ConfigError> {
        Simulation::from_scenario(self.config.clone(), &self.data, &self.map)
    }

    /// Copy of this scenario with the first two player slots handed to AI
    /// controllers of the given personalities.
    pub fn with_personalities(&self, first: Personality, second: Personality) -> Result<Self, ScenarioError> {
        if self.map.players.len() < 2 {
            return Err(ScenarioError::Invalid(format!(
                "map '{}' has {} player slot(s), need at least 2",
                self.map.name,
                self.map.players.len()
            )));
        }
        let mut scenario = self.clone();
        scenario.map.players[0].controller = Controller::Ai(first);
        scenario.map.players[1].controller = Controller::Ai(second);
        Ok(scenario)
    }
}

/// Read and validate a blueprint file.
pub fn load_game_data(path: &Path) -> Result<GameData, ScenarioError> {
    let text = read_file(path)?;
    Ok(GameData::from_ron_str(&text)?)
}

/// Read and structurally validate a map file.
pub fn load_map(path: &Path) -> Result<MapDefinition, ScenarioError> {
    let text = read_file(path)?;
    Ok(MapDefinition::from_ron_str(&text)?)
}

fn read_file(path: &Path) -> Result<String, ScenarioError> {
    if !path.exists() {
        return Err(ScenarioError::FileNotFound(path.to_path_buf()));
    }
    std::fs::read_to_string(path).map_err(|source| ScenarioError::ReadError {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_test_utils::fixtures::{map_to_ron, ScenarioBuilder, TEST_DATA};

    fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    fn small_map() -> String {
        let builder = ScenarioBuilder::new(24, 24)
            .human(500)
            .human(500)
            .entity(0, "headquarters", (2, 2))
            .entity(1, "headquarters", (20, 20));
        map_to_ron(builder.map())
    }

    #[test]
    fn test_builtin_scenario_is_valid() {
        let scenario = Scenario::builtin().unwrap();
        assert_eq!(scenario.map.players.len(), 2);
        assert!(scenario.data.units.iter().any(|u| u.id == "infantry"));
        let sim = scenario.simulation().unwrap();
        assert!(sim.store().len() >= 2);
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("maps")).unwrap();
        write(dir.path(), "data.ron", TEST_DATA);
        write(&dir.path().join("maps"), "small.ron", &small_map());
        let path = write(
            dir.path(),
            "duel.ron",
            r#"(name: "duel", data: Some("data.ron"), map: "maps/small.ron", config: (tick_rate: 30))"#,
        );

        let scenario = Scenario::load(&path).unwrap();
        assert_eq!(scenario.name, "duel");
        assert_eq!(scenario.config.tick_rate, 30);
        assert_eq!(scenario.max_ticks, 12_000);
        assert_eq!(scenario.data.units.len(), 4);
        assert!(scenario.simulation().is_ok());
    }

    #[test]
    fn test_missing_data_uses_builtin_blueprints() {
        let dir = tempfile::tempdir().unwrap();
        let map = ScenarioBuilder::new(24, 24)
            .human(500)
            .entity(0, "infantry", (3, 3));
        write(dir.path(), "map.ron", &map_to_ron(map.map()));
        let path = write(dir.path(), "s.ron", r#"(name: "builtin data", map: "map.ron")"#);

        let scenario = Scenario::load(&path).unwrap();
        assert!(scenario.data.buildings.iter().any(|b| b.id == "war_factory"));
    }

    #[test]
    fn test_missing_map_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "s.ron", r#"(name: "lost", map: "nowhere.ron")"#);
        let err = Scenario::load(&path).unwrap_err();
        assert!(matches!(err, ScenarioError::FileNotFound(p) if p.ends_with("nowhere.ron")));
    }

    #[test]
    fn test_unknown_blueprint_in_map_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "data.ron", TEST_DATA);
        let map = ScenarioBuilder::new(24, 24).human(500).entity(0, "mammoth_tank", (3, 3));
        write(dir.path(), "map.ron", &map_to_ron(map.map()));
        let path = write(dir.path(), "s.ron", r#"(name: "bad", data: Some("data.ron"), map: "map.ron")"#);

        let err = Scenario::load(&path).unwrap_err();
        assert!(matches!(err, ScenarioError::Config(ConfigError::UnknownBlueprint { .. })));
    }

    #[test]
    fn test_malformed_scenario_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "s.ron", "(name: \"broken\", map: ");
        assert!(matches!(Scenario::load(&path), Err(ScenarioError::ParseError(_))));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "map.ron", &small_map());
        write(dir.path(), "data.ron", TEST_DATA);
        let path = write(
            dir.path(),
            "s.ron",
            r#"(name: "zero", data: Some("data.ron"), map: "map.ron", config: (tick_rate: 0))"#,
        );
        assert!(matches!(
            Scenario::load(&path),
            Err(ScenarioError::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn test_with_personalities_needs_two_slots() {
        let mut scenario = Scenario::builtin().unwrap();
        let swapped = scenario
            .with_personalities(Personality::Rusher, Personality::Defensive)
            .unwrap();
        assert_eq!(swapped.map.players[0].controller, Controller::Ai(Personality::Rusher));
        assert_eq!(swapped.map.players[1].controller, Controller::Ai(Personality::Defensive));

        scenario.map.players.truncate(1);
        assert!(matches!(
            scenario.with_personalities(Personality::Rusher, Personality::Rusher),
            Err(ScenarioError::Invalid(_))
        ));
    }
}
