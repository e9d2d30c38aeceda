//! Test fixtures and helpers.
//!
//! A compact blueprint set and scenario builders for consistent testing.

use fixed::types::I32F32;
use skirmish_core::ai::Personality;
use skirmish_core::components::{EntityId, PlayerId, TeamId};
use skirmish_core::config::SimConfig;
use skirmish_core::data::{GameData, MapDefinition, PlayerSetup, StartEntity};
use skirmish_core::economy::Controller;
use skirmish_core::math::Vec2Fixed;
use skirmish_core::simulation::Simulation;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// World position from integer coordinates.
#[must_use]
pub fn pos(x: i32, y: i32) -> Vec2Fixed {
    Vec2Fixed::from_ints(x, y)
}

/// Blueprints used across the test suites.
///
/// Timings are short so scenarios resolve in a few hundred ticks.
pub const TEST_DATA: &str = r#"(
    units: [
        (id: "rifleman", cost: 100, build_time: 10, health: 45, speed: 0.5,
         weapon: Some((damage: 15, range: 4.0, cooldown: 5))),
        (id: "tank", cost: 700, build_time: 30, health: 300, class: Tank, speed: 0.4,
         weapon: Some((damage: 60, range: 5.0, cooldown: 10, projectile_speed: 1.0,
                       damage_type: Explosive))),
        (id: "rocket", cost: 200, build_time: 15, health: 45, speed: 0.4,
         weapon: Some((damage: 40, range: 6.0, cooldown: 12, projectile_speed: 0.5,
                       splash_radius: 1.5, damage_type: Explosive, impact: Splash))),
        (id: "scout", cost: 50, build_time: 5, health: 20, class: Vehicle, speed: 1.0, sight: 12.0),
    ],
    buildings: [
        (id: "headquarters", cost: 1000, build_time: 0, health: 500,
         footprint: (width: 2, height: 2), headquarters: true,
         power_output: 100, power_usage: 50,
         produces: ["barracks", "power_plant", "derrick", "turret"]),
        (id: "barracks", cost: 300, build_time: 20, construction_time: 10, health: 200,
         power_usage: 20, produces: ["rifleman", "rocket", "scout"]),
        (id: "factory", cost: 500, build_time: 30, construction_time: 10, health: 300,
         footprint: (width: 3, height: 2), power_usage: 30, produces: ["tank"]),
        (id: "power_plant", cost: 300, build_time: 20, construction_time: 10, health: 200,
         power_output: 100),
        (id: "derrick", cost: 300, build_time: 20, construction_time: 10, health: 150,
         footprint: (width: 1, height: 1), power_usage: 10,
         income: Some((amount: 100, interval: 50))),
        (id: "turret", cost: 400, build_time: 20, construction_time: 10, health: 250,
         footprint: (width: 1, height: 1), power_usage: 20,
         weapon: Some((damage: 20, range: 6.0, cooldown: 6))),
    ],
)"#;

/// Parsed [`TEST_DATA`].
///
/// # Panics
///
/// Panics if the fixture data is malformed.
#[must_use]
pub fn test_data() -> GameData {
    GameData::from_ron_str(TEST_DATA).expect("fixture game data is valid")
}

/// Default configuration with a small fixed worker pool.
#[must_use]
pub fn test_config() -> SimConfig {
    SimConfig {
        worker_threads: Some(2),
        partition_chunk_size: 8,
        ..SimConfig::default()
    }
}

/// Builder for small test maps and the simulations running them.
#[derive(Debug, Clone)]
pub struct ScenarioBuilder {
    map: MapDefinition,
    config: SimConfig,
}

impl ScenarioBuilder {
    /// Open grass map of `width` x `height` cells with no players yet.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            map: MapDefinition {
                name: "test".into(),
                width,
                height,
                cell_size: I32F32::ONE,
                terrain: Vec::new(),
                players: Vec::new(),
                start: Vec::new(),
            },
            config: test_config(),
        }
    }

    /// Add the next player slot.
    #[must_use]
    pub fn player(mut self, team: TeamId, credits: u32, controller: Controller) -> Self {
        let id = self.map.players.len() as PlayerId;
        self.map.players.push(PlayerSetup {
            id,
            team: Some(team),
            credits,
            controller,
        });
        self
    }

    /// Add a human player on their own team.
    #[must_use]
    pub fn human(self, credits: u32) -> Self {
        let team = self.map.players.len() as TeamId;
        self.player(team, credits, Controller::Human)
    }

    /// Add an AI player on their own team.
    #[must_use]
    pub fn ai(self, personality: Personality, credits: u32) -> Self {
        let team = self.map.players.len() as TeamId;
        self.player(team, credits, Controller::Ai(personality))
    }

    /// Add a start entity.
    #[must_use]
    pub fn entity(mut self, player: PlayerId, blueprint: &str, cell: (u32, u32)) -> Self {
        self.map.start.push(StartEntity {
            player,
            blueprint: blueprint.into(),
            cell,
        });
        self
    }

    /// Replace the terrain rows.
    #[must_use]
    pub fn terrain(mut self, rows: &[&str]) -> Self {
        self.map.terrain = rows.iter().map(|r| (*r).to_string()).collect();
        self
    }

    /// Adjust the configuration.
    #[must_use]
    pub fn config(mut self, adjust: impl FnOnce(&mut SimConfig)) -> Self {
        adjust(&mut self.config);
        self
    }

    /// The map built so far.
    #[must_use]
    pub fn map(&self) -> &MapDefinition {
        &self.map
    }

    /// Build the simulation on [`TEST_DATA`].
    ///
    /// # Panics
    ///
    /// Panics if the scenario is invalid.
    #[must_use]
    pub fn build(self) -> Simulation {
        Simulation::from_scenario(self.config, &test_data(), &self.map).expect("fixture scenario is valid")
    }
}

/// Two human players, each with a headquarters in opposite corners of a
/// 48x48 map.
#[must_use]
pub fn duel(credits: u32) -> Simulation {
    ScenarioBuilder::new(48, 48)
        .human(credits)
        .human(credits)
        .entity(0, "headquarters", (4, 4))
        .entity(1, "headquarters", (42, 42))
        .build()
}

/// Two AI players with the given personalities, set up like [`duel`].
#[must_use]
pub fn ai_duel(a: Personality, b: Personality, credits: u32) -> Simulation {
    ScenarioBuilder::new(48, 48)
        .ai(a, credits)
        .ai(b, credits)
        .entity(0, "headquarters", (4, 4))
        .entity(1, "headquarters", (42, 42))
        .config(|c| c.ai_decision_interval = 5)
        .build()
}

/// First entity owned by `player` whose blueprint is `name`.
#[must_use]
pub fn find_owned(sim: &Simulation, player: PlayerId, name: &str) -> Option<EntityId> {
    sim.snapshot()
        .owned_by(player)
        .find(|e| e.type_name == name)
        .map(|e| e.id)
}

/// Serialize a map back to RON, e.g. to write scenario files in tests.
///
/// # Panics
///
/// Panics if serialization fails.
#[must_use]
pub fn map_to_ron(map: &MapDefinition) -> String {
    ron::ser::to_string_pretty(map, ron::ser::PrettyConfig::default()).expect("maps serialize")
}
