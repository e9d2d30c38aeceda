//! Map definitions: terrain grid, players and the start manifest.

use serde::{Deserialize, Serialize};

use crate::components::{PlayerId, TeamId, MAX_PLAYERS};
use crate::economy::Controller;
use crate::error::ConfigError;
use crate::math::{fixed_serde, Fixed};
use crate::terrain::{TerrainCell, TerrainGrid};

/// A player slot on a map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSetup {
    /// Player index, `0..MAX_PLAYERS`.
    pub id: PlayerId,
    /// Alliance tag. Defaults to the player index (free-for-all).
    #[serde(default)]
    pub team: Option<TeamId>,
    /// Starting credits.
    pub credits: u32,
    /// Human or AI.
    pub controller: Controller,
}

impl PlayerSetup {
    /// Effective team.
    #[must_use]
    pub fn team(&self) -> TeamId {
        self.team.unwrap_or(self.id)
    }
}

/// An entity present when the match starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartEntity {
    /// Owning player.
    pub player: PlayerId,
    /// Unit or building blueprint id.
    pub blueprint: String,
    /// Grid cell: unit position, or building footprint top-left.
    pub cell: (u32, u32),
}

/// A complete map.
///
/// # Example RON
///
/// ```ron
/// MapDefinition(
///     name: "Crossing",
///     width: 8,
///     height: 4,
///     terrain: [
///         "..~~....",
///         "..~~..T.",
///         "........",
///         "....^^..",
///     ],
///     players: [
///         (id: 0, credits: 7500, controller: Human),
///         (id: 1, credits: 7500, controller: Ai(Balanced)),
///     ],
///     start: [
///         (player: 0, blueprint: "headquarters", cell: (0, 0)),
///         (player: 1, blueprint: "headquarters", cell: (6, 2)),
///     ],
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapDefinition {
    /// Map name.
    pub name: String,
    /// Width in cells.
    pub width: u32,
    /// Height in cells.
    pub height: u32,
    /// World units per cell.
    #[serde(default = "default_cell_size", with = "fixed_serde")]
    pub cell_size: Fixed,
    /// Terrain rows, top to bottom, using the legend from
    /// [`TerrainCell::from_symbol`]. Empty means open grass everywhere.
    #[serde(default)]
    pub terrain: Vec<String>,
    /// Player slots.
    pub players: Vec<PlayerSetup>,
    /// Starting entities.
    #[serde(default)]
    pub start: Vec<StartEntity>,
}

fn default_cell_size() -> Fixed {
    Fixed::ONE
}

impl MapDefinition {
    /// Parse a map from RON. Blueprint references are checked later,
    /// against the game data, by [`GameData::validate_map`](super::GameData::validate_map).
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let map: Self =
            ron::from_str(text).map_err(|source| ConfigError::Parse { what: "map", source })?;
        map.validate()?;
        Ok(map)
    }

    /// Check dimensions, terrain legend and player slots.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidValue {
                field: "width/height".into(),
                message: "map must have at least one cell".into(),
            });
        }
        if self.cell_size <= Fixed::ZERO {
            return Err(ConfigError::InvalidValue {
                field: "cell_size".into(),
                message: "must be positive".into(),
            });
        }
        self.terrain_grid()?;

        if self.players.is_empty() || self.players.len() > MAX_PLAYERS {
            return Err(ConfigError::InvalidPlayer(format!(
                "expected 1..={MAX_PLAYERS} players, found {}",
                self.players.len()
            )));
        }
        for (index, player) in self.players.iter().enumerate() {
            if player.id as usize != index {
                return Err(ConfigError::InvalidPlayer(format!(
                    "player slots must be numbered 0.. in order; slot {index} has id {}",
                    player.id
                )));
            }
        }
        for entity in &self.start {
            if entity.player as usize >= self.players.len() {
                return Err(ConfigError::InvalidPlayer(format!(
                    "start entity '{}' belongs to unknown player {}",
                    entity.blueprint, entity.player
                )));
            }
        }
        Ok(())
    }

    /// Build the terrain grid.
    pub fn terrain_grid(&self) -> Result<TerrainGrid, ConfigError> {
        if self.terrain.is_empty() {
            return Ok(TerrainGrid::new(self.width, self.height, self.cell_size));
        }

        let expected = (self.width as usize) * (self.height as usize);
        let mut cells = Vec::with_capacity(expected);
        for row in &self.terrain {
            if row.chars().count() != self.width as usize {
                return Err(ConfigError::TerrainSize {
                    expected,
                    actual: cells.len() + row.chars().count(),
                });
            }
            for symbol in row.chars() {
                let cell = TerrainCell::from_symbol(symbol).ok_or_else(|| ConfigError::InvalidValue {
                    field: "terrain".into(),
                    message: format!("unknown terrain symbol '{symbol}'"),
                })?;
                cells.push(cell);
            }
        }
        if cells.len() != expected {
            return Err(ConfigError::TerrainSize {
                expected,
                actual: cells.len(),
            });
        }
        Ok(TerrainGrid::from_cells(self.width, self.height, self.cell_size, cells))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::Personality;

    const MAP: &str = r#"(
        name: "Crossing",
        width: 4,
        height: 2,
        terrain: ["..~.", "T^.#"],
        players: [
            (id: 0, credits: 500, controller: Human),
            (id: 1, team: Some(0), credits: 500, controller: Ai(Rusher)),
        ],
        start: [(player: 1, blueprint: "headquarters", cell: (2, 0))],
    )"#;

    #[test]
    fn test_parse_map() {
        let map = MapDefinition::from_ron_str(MAP).unwrap();
        assert_eq!(map.players[1].controller, Controller::Ai(Personality::Rusher));
        assert_eq!(map.players[1].team(), 0);
        assert_eq!(map.players[0].team(), 0);

        let grid = map.terrain_grid().unwrap();
        assert!(!grid.is_passable(2, 0));
        assert!(!grid.is_passable(3, 1));
        assert!(grid.is_passable(1, 1));
        assert_eq!(grid.cell(1, 1).map(|c| c.elevation), Some(1));
    }

    #[test]
    fn test_terrain_size_mismatch() {
        let text = MAP.replace("\"T^.#\"", "\"T^.\"");
        let err = MapDefinition::from_ron_str(&text).unwrap_err();
        assert!(matches!(err, ConfigError::TerrainSize { expected: 8, .. }));
    }

    #[test]
    fn test_unknown_terrain_symbol() {
        let text = MAP.replace("\"T^.#\"", "\"T^.x\"");
        assert!(matches!(
            MapDefinition::from_ron_str(&text),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_start_entity_for_missing_player() {
        let text = MAP.replace("(player: 1,", "(player: 5,");
        assert!(matches!(
            MapDefinition::from_ron_str(&text),
            Err(ConfigError::InvalidPlayer(_))
        ));
    }

    #[test]
    fn test_empty_terrain_is_open() {
        let map = MapDefinition {
            name: "Flat".into(),
            width: 3,
            height: 3,
            cell_size: Fixed::ONE,
            terrain: Vec::new(),
            players: vec![PlayerSetup {
                id: 0,
                team: None,
                credits: 0,
                controller: Controller::Human,
            }],
            start: Vec::new(),
        };
        assert!(map.validate().is_ok());
        assert!(map.terrain_grid().unwrap().is_passable(2, 2));
    }
}
