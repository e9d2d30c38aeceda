//! Core simulation loop.
//!
//! The simulation runs at a fixed tick rate. Each tick executes a fixed
//! sequence of phases; only movement planning runs on more than one thread.
//!
//! # Tick Phases
//!
//! 1. **Order intake** - drain the order queue, validate and apply
//! 2. **Spatial refresh** - purge index entries with no live entity
//! 3. **Movement & targeting** - plan every unit in parallel into intents
//! 4. **Apply intents** - write positions/orders back, update the index
//! 5. **Combat** - fire weapons, fly projectiles, apply damage
//! 6. **Production & economy** - power, queues, construction, income
//! 7. **AI** - budgeted controller evaluations, orders land next tick
//! 8. **Cleanup** - remove destroyed entities from store, index and map
//! 9. **Defeat checks**
//!
//! # Determinism
//!
//! - No floating-point math in simulation state (uses [`Fixed`](crate::math::Fixed))
//! - No system randomness
//! - Sorted entity ids everywhere iteration order matters
//! - Parallel movement results are merged in id order, so the worker count
//!   never changes the outcome
//!
//! # Example
//!
//! ```
//! use skirmish_core::config::SimConfig;
//! use skirmish_core::data::{GameData, MapDefinition};
//! use skirmish_core::simulation::Simulation;
//!
//! let data = GameData::from_ron_str(r#"(
//!     units: [(id: "infantry", cost: 100, build_time: 20, health: 45, speed: 0.5)],
//!     buildings: [(id: "headquarters", cost: 1000, build_time: 0, health: 500,
//!                  headquarters: true, produces: ["infantry"])],
//! )"#).unwrap();
//! let map = MapDefinition::from_ron_str(r#"(
//!     name: "Duel", width: 16, height: 16,
//!     players: [(id: 0, credits: 500, controller: Human)],
//!     start: [(player: 0, blueprint: "headquarters", cell: (2, 2))],
//! )"#).unwrap();
//!
//! let mut sim = Simulation::from_scenario(SimConfig::default(), &data, &map).unwrap();
//! let events = sim.tick();
//! assert_eq!(events.tick, 1);
//! assert_eq!(sim.snapshot().entities.len(), 1);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use tracing::{debug_span, info, warn};

use crate::ai::{AiDirector, AiWorld, ProfileTable};
use crate::combat::run_combat;
use crate::components::{
    BuildingState, Entity, EntityId, EntityKind, PlayerId, TeamId,
};
use crate::config::SimConfig;
use crate::construction::{spawn_building, spawn_unit, ProductionPhase};
use crate::data::{GameData, MapDefinition, StartEntity};
use crate::economy::{recompute_power, Player};
use crate::error::{ConfigError, GameError, OrderError, Result};
use crate::events::{Diagnostic, SimEvent, TickEvents};
use crate::math::Vec2Fixed;
use crate::movement::{apply_intents, compute_intents, partition_units, MovementContext};
use crate::orders::{DeferredOrder, OrderContext, OrderQueue, OrderSender, PlayerOrder};
use crate::production::BlueprintRegistry;
use crate::snapshot::WorldSnapshot;
use crate::spatial::SpatialIndex;
use crate::store::EntityStore;
use crate::terrain::TerrainGrid;

/// Authoritative game state and the tick pipeline.
#[derive(Debug)]
pub struct Simulation {
    tick: u64,
    config: SimConfig,
    store: EntityStore,
    spatial: SpatialIndex,
    terrain: TerrainGrid,
    registry: BlueprintRegistry,
    profiles: ProfileTable,
    players: Vec<Player>,
    orders: OrderQueue,
    deferred: Vec<DeferredOrder>,
    ai: AiDirector,
    pool: rayon::ThreadPool,
    fielded_hq: Vec<bool>,
}

impl Simulation {
    /// Create an empty simulation on `terrain`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the movement
    /// thread pool cannot be started.
    pub fn new(
        config: SimConfig,
        registry: BlueprintRegistry,
        terrain: TerrainGrid,
        players: Vec<Player>,
        profiles: ProfileTable,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("skirmish-move-{i}"));
        if let Some(threads) = config.worker_threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder.build().map_err(|e| ConfigError::InvalidValue {
            field: "worker_threads".into(),
            message: e.to_string(),
        })?;

        Ok(Self {
            tick: 0,
            spatial: SpatialIndex::new(config.spatial_cell_size),
            ai: AiDirector::new(&players),
            fielded_hq: vec![false; players.len()],
            config,
            store: EntityStore::new(),
            terrain,
            registry,
            profiles,
            players,
            orders: OrderQueue::new(),
            deferred: Vec::new(),
            pool,
        })
    }

    /// Build a simulation from data definitions and a map.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any definition is malformed, references
    /// an unknown blueprint, or places a start entity on blocked ground.
    pub fn from_scenario(
        config: SimConfig,
        data: &GameData,
        map: &MapDefinition,
    ) -> std::result::Result<Self, ConfigError> {
        map.validate()?;
        data.validate_map(map)?;
        let registry = data.build_registry()?;
        let players = map
            .players
            .iter()
            .map(|p| Player::new(p.id, p.team(), p.credits, p.controller))
            .collect();

        let mut sim = Self::new(config, registry, map.terrain_grid()?, players, data.profile_table())?;
        for entity in &map.start {
            sim.place_start_entity(entity)?;
        }
        recompute_power(&mut sim.players, &sim.store);
        info!(
            map = %map.name,
            players = sim.players.len(),
            entities = sim.store.len(),
            "simulation ready"
        );
        Ok(sim)
    }

    fn place_start_entity(&mut self, entity: &StartEntity) -> std::result::Result<EntityId, ConfigError> {
        let bad = || ConfigError::BadPlacement {
            id: entity.blueprint.clone(),
            player: entity.player,
        };
        let (x, y) = entity.cell;
        if let Some(unit) = self.registry.unit_id(&entity.blueprint) {
            let airborne = self
                .registry
                .unit(unit)
                .is_some_and(|bp| bp.class.is_airborne());
            if !self.terrain.in_bounds(x, y) || (!airborne && !self.terrain.is_open(x, y)) {
                return Err(bad());
            }
            let position = self.terrain.grid_to_world(x, y);
            return self.spawn_unit(entity.player, &entity.blueprint, position).map_err(|_| bad());
        }
        self.place_building(entity.player, &entity.blueprint, (x, y))
            .map_err(|_| bad())
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Number of ticks run so far.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Entity store.
    #[must_use]
    pub const fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Spatial index.
    #[must_use]
    pub const fn spatial(&self) -> &SpatialIndex {
        &self.spatial
    }

    /// Terrain and building footprints.
    #[must_use]
    pub const fn terrain(&self) -> &TerrainGrid {
        &self.terrain
    }

    /// Blueprint registry.
    #[must_use]
    pub const fn registry(&self) -> &BlueprintRegistry {
        &self.registry
    }

    /// All players, indexed by id.
    #[must_use]
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// One player.
    #[must_use]
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(id as usize)
    }

    /// Mutable access to a player, for scenario setup.
    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(id as usize)
    }

    /// AI controllers.
    #[must_use]
    pub const fn ai(&self) -> &AiDirector {
        &self.ai
    }

    /// Produce orders waiting for queue space.
    #[must_use]
    pub fn deferred_orders(&self) -> &[DeferredOrder] {
        &self.deferred
    }

    /// Handle for submitting orders from any thread.
    #[must_use]
    pub fn order_sender(&self) -> OrderSender {
        self.orders.sender()
    }

    /// Queue an order for the next tick.
    pub fn submit(&self, order: PlayerOrder) {
        self.orders.sender().submit(order);
    }

    /// The single team left standing, once every other team is defeated.
    #[must_use]
    pub fn winner(&self) -> Option<TeamId> {
        let mut alive = self.players.iter().filter(|p| !p.defeated).map(|p| p.team);
        let first = alive.next()?;
        let teams_at_start = self.players.iter().any(|p| p.team != first);
        (teams_at_start && alive.all(|t| t == first)).then_some(first)
    }

    // ------------------------------------------------------------------
    // Direct manipulation (scenario setup, tools, tests)
    // ------------------------------------------------------------------

    /// Spawn a unit by blueprint name.
    ///
    /// # Errors
    ///
    /// Returns an error if the player or blueprint is unknown, or if the
    /// position is off the map or blocked for this unit.
    pub fn spawn_unit(&mut self, player: PlayerId, blueprint: &str, position: Vec2Fixed) -> Result<EntityId> {
        let team = self
            .player(player)
            .map(|p| p.team)
            .ok_or(OrderError::InactivePlayer(player))?;
        let id = self
            .registry
            .unit_id(blueprint)
            .ok_or_else(|| OrderError::UnknownBlueprint(blueprint.to_string()))?;
        let blueprint = self
            .registry
            .unit(id)
            .ok_or_else(|| OrderError::UnknownBlueprint(blueprint.to_string()))?;
        if !self.can_stand(blueprint.class.is_airborne(), position) {
            return Err(GameError::InvalidState(format!(
                "{} cannot stand at ({}, {})",
                blueprint.name, position.x, position.y
            )));
        }
        Ok(spawn_unit(&mut self.store, &mut self.spatial, blueprint, player, team, position))
    }

    /// On the map, and on open ground unless flying.
    fn can_stand(&self, airborne: bool, position: Vec2Fixed) -> bool {
        match self.terrain.world_to_grid(position) {
            Some((x, y)) => airborne || self.terrain.is_open(x, y),
            None => false,
        }
    }

    /// Place a finished building with its top-left corner on `cell`.
    ///
    /// # Errors
    ///
    /// Returns an error if the player or blueprint is unknown or the
    /// footprint does not fit.
    pub fn place_building(&mut self, player: PlayerId, blueprint: &str, cell: (u32, u32)) -> Result<EntityId> {
        let team = self
            .player(player)
            .map(|p| p.team)
            .ok_or(OrderError::InactivePlayer(player))?;
        let id = self
            .registry
            .building_id(blueprint)
            .ok_or_else(|| OrderError::UnknownBlueprint(blueprint.to_string()))?;
        let bp = self
            .registry
            .building(id)
            .ok_or_else(|| OrderError::UnknownBlueprint(blueprint.to_string()))?;
        if !self.terrain.footprint_fits(cell.0, cell.1, bp.footprint) {
            return Err(GameError::InvalidState(format!(
                "{blueprint} does not fit at {cell:?}"
            )));
        }
        if bp.is_headquarters {
            if let Some(fielded) = self.fielded_hq.get_mut(player as usize) {
                *fielded = true;
            }
        }
        Ok(spawn_building(
            &mut self.store,
            &mut self.spatial,
            &mut self.terrain,
            bp,
            player,
            team,
            cell,
            false,
        ))
    }

    /// Mark an entity for removal at the end of the next tick.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity does not exist.
    pub fn despawn(&mut self, id: EntityId) -> Result<()> {
        if self.store.resolve(id).is_none() {
            return Err(GameError::EntityNotFound(id));
        }
        self.store.mark_destroyed(id);
        Ok(())
    }

    /// Mutable access to a live entity, for scenario setup.
    ///
    /// Position changes made through this handle are not indexed; use
    /// [`Simulation::teleport`] to move entities.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        if self.store.resolve(id).is_none() {
            return None;
        }
        self.store.get_mut(id)
    }

    /// Move a unit instantly, keeping the spatial index in sync.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity does not exist or the position is
    /// off the map.
    pub fn teleport(&mut self, id: EntityId, position: Vec2Fixed) -> Result<()> {
        if self.terrain.world_to_grid(position).is_none() {
            return Err(GameError::InvalidState(format!(
                "({}, {}) is outside the map",
                position.x, position.y
            )));
        }
        let entity = self
            .store
            .get_mut(id)
            .filter(|e| !e.health.is_dead())
            .ok_or(GameError::EntityNotFound(id))?;
        entity.position = position;
        self.spatial.update(id, position);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    /// Advance the simulation by one tick and return what happened.
    pub fn tick(&mut self) -> TickEvents {
        self.tick += 1;
        let span = debug_span!("tick", tick = self.tick);
        let _guard = span.enter();
        let mut events = TickEvents::new(self.tick);

        // 1. Order intake
        let orders = self.orders.drain();
        OrderContext {
            store: &mut self.store,
            players: &mut self.players,
            registry: &self.registry,
            terrain: &self.terrain,
            config: &self.config,
            deferred: &mut self.deferred,
            events: &mut events,
            tick: self.tick,
        }
        .apply_all(orders);

        // 2. Spatial refresh
        for id in self.spatial.purge_stale(&self.store) {
            warn!(entity = id, "stale spatial index entry purged");
            events.diagnose(Diagnostic::SpatialInconsistency { id });
        }

        // 3. Movement & targeting (parallel), 4. apply
        let partitions = partition_units(&self.store, self.config.partition_chunk_size);
        let ctx = MovementContext {
            store: &self.store,
            spatial: &self.spatial,
            terrain: &self.terrain,
            config: &self.config,
        };
        let intents = compute_intents(&self.pool, ctx, &partitions);
        apply_intents(&mut self.store, &mut self.spatial, &intents);

        // 5. Combat
        run_combat(&mut self.store, &self.spatial, &self.config, &mut events);

        // 6. Production & economy
        ProductionPhase {
            store: &mut self.store,
            spatial: &mut self.spatial,
            terrain: &mut self.terrain,
            players: &mut self.players,
            registry: &self.registry,
            config: &self.config,
            deferred: &mut self.deferred,
            events: &mut events,
            tick: self.tick,
        }
        .run();

        // 7. AI
        let sender = self.orders.sender();
        self.ai.run(
            AiWorld {
                store: &self.store,
                spatial: &self.spatial,
                terrain: &self.terrain,
                registry: &self.registry,
                profiles: &self.profiles,
                tick: self.tick,
            },
            &mut self.players,
            &sender,
            self.config.ai_budget_per_tick,
            self.config.ai_decision_interval,
        );

        // 8. Cleanup, 9. defeat
        self.cleanup(&mut events);
        self.check_defeat(&mut events);

        #[cfg(feature = "debug-validation")]
        {
            let problems = self.consistency_errors();
            assert!(problems.is_empty(), "tick {}: {problems:?}", self.tick);
        }

        events
    }

    /// Remove destroyed entities from the store, the index and the map.
    fn cleanup(&mut self, events: &mut TickEvents) {
        for entity in self.store.drain_destroyed() {
            self.spatial.remove(entity.id);
            match entity.kind {
                EntityKind::Unit(_) => events.push(SimEvent::UnitDestroyed {
                    id: entity.id,
                    owner: entity.owner,
                    position: entity.position,
                }),
                EntityKind::Building(building) => {
                    self.terrain.release(entity.id);
                    events.push(SimEvent::BuildingDestroyed {
                        id: entity.id,
                        owner: entity.owner,
                        building_type: building.building_type,
                        position: entity.position,
                    });
                }
                EntityKind::Projectile(_) => {}
            }
        }
    }

    fn check_defeat(&mut self, events: &mut TickEvents) {
        for index in 0..self.players.len() {
            if self.players[index].defeated {
                continue;
            }
            let id = self.players[index].id;
            let mut owns_anything = false;
            let mut has_hq = false;
            for entity in self.store.owned_by(id) {
                match &entity.kind {
                    EntityKind::Unit(_) => owns_anything = true,
                    EntityKind::Building(b) => {
                        owns_anything = true;
                        has_hq |= self
                            .registry
                            .building(b.building_type)
                            .is_some_and(|bp| bp.is_headquarters);
                    }
                    EntityKind::Projectile(_) => {}
                }
            }
            self.fielded_hq[index] |= has_hq;

            let lost_hq = self.config.defeat_on_hq_loss && self.fielded_hq[index] && !has_hq;
            if owns_anything && !lost_hq {
                continue;
            }
            self.players[index].defeated = true;
            self.deferred.retain(|d| d.player != id);
            info!(player = id, tick = self.tick, "player defeated");
            events.push(SimEvent::PlayerDefeated { player: id });
        }
    }

    // ------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------

    /// Read-only view of the current state.
    #[must_use]
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot::capture(self.tick, &self.store, &self.players, &self.registry, |player| {
            self.ai
                .controllers()
                .iter()
                .find(|c| c.player() == player)
                .map(|c| c.state())
        })
    }

    /// Mismatches between the store and the spatial index.
    #[must_use]
    pub fn consistency_errors(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for id in self.spatial.ids() {
            match self.store.get(id) {
                None => problems.push(format!("indexed entity {id} is not in the store")),
                Some(e) if self.spatial.position_of(id) != Some(e.position) => {
                    problems.push(format!("entity {id} is indexed at a stale position"));
                }
                Some(_) => {}
            }
        }
        for entity in self.store.iter() {
            if entity.is_targetable() && !self.spatial.contains(entity.id) {
                problems.push(format!("entity {} is missing from the index", entity.id));
            }
        }
        problems
    }

    /// Hash of the simulation state, for determinism checks.
    ///
    /// Two simulations with identical state produce identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.tick.hash(&mut hasher);
        self.store.len().hash(&mut hasher);

        for entity in self.store.iter() {
            entity.id.hash(&mut hasher);
            entity.owner.hash(&mut hasher);
            entity.position.x.to_bits().hash(&mut hasher);
            entity.position.y.to_bits().hash(&mut hasher);
            entity.health.current.hash(&mut hasher);
            match &entity.kind {
                EntityKind::Unit(unit) => {
                    unit.order.hash(&mut hasher);
                    unit.target.hash(&mut hasher);
                    unit.cooldown.hash(&mut hasher);
                }
                EntityKind::Building(building) => {
                    building.queue.len().hash(&mut hasher);
                    if let BuildingState::UnderConstruction { progress, .. } = building.state {
                        progress.to_bits().hash(&mut hasher);
                    }
                }
                EntityKind::Projectile(projectile) => {
                    projectile.ttl.hash(&mut hasher);
                }
            }
        }

        for player in &self.players {
            player.credits.hash(&mut hasher);
            player.defeated.hash(&mut hasher);
        }
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Order;
    use crate::orders::OrderKind;

    const DATA: &str = r#"(
        units: [
            (id: "rifleman", cost: 100, build_time: 3, health: 45, speed: 0.5,
             weapon: Some((damage: 15, range: 4.0, cooldown: 2))),
        ],
        buildings: [
            (id: "headquarters", cost: 1000, build_time: 0, health: 500,
             footprint: (width: 2, height: 2), headquarters: true,
             power_output: 100, power_usage: 50, produces: ["rifleman"]),
        ],
    )"#;

    const MAP: &str = r#"(
        name: "Test",
        width: 32,
        height: 32,
        players: [
            (id: 0, team: Some(0), credits: 500, controller: Human),
            (id: 1, team: Some(1), credits: 500, controller: Human),
        ],
        start: [
            (player: 0, blueprint: "headquarters", cell: (2, 2)),
            (player: 1, blueprint: "headquarters", cell: (28, 28)),
        ],
    )"#;

    fn sim() -> Simulation {
        let config = SimConfig {
            worker_threads: Some(2),
            ..SimConfig::default()
        };
        Simulation::from_scenario(
            config,
            &GameData::from_ron_str(DATA).unwrap(),
            &MapDefinition::from_ron_str(MAP).unwrap(),
        )
        .unwrap()
    }

    fn hq(sim: &Simulation, player: PlayerId) -> EntityId {
        sim.store().owned_by(player).next().unwrap().id
    }

    #[test]
    fn test_scenario_setup() {
        let sim = sim();
        assert_eq!(sim.store().len(), 2);
        assert_eq!(sim.player(0).unwrap().power_produced, 100);
        assert!(sim.consistency_errors().is_empty());
        assert!(sim.terrain().occupant(3, 3).is_some());
    }

    #[test]
    fn test_bad_start_placement() {
        let map = MAP.replace("cell: (28, 28)", "cell: (31, 31)");
        let err = Simulation::from_scenario(
            SimConfig::default(),
            &GameData::from_ron_str(DATA).unwrap(),
            &MapDefinition::from_ron_str(&map).unwrap(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::BadPlacement { player: 1, .. }));
    }

    #[test]
    fn test_spawn_needs_open_ground_on_map() {
        let mut sim = sim();
        let before = sim.store().len();
        assert!(sim.spawn_unit(0, "rifleman", Vec2Fixed::from_ints(40, 5)).is_err());
        assert!(sim.spawn_unit(0, "rifleman", Vec2Fixed::from_ints(-1, 5)).is_err());
        // Inside the headquarters footprint.
        assert!(sim.spawn_unit(0, "rifleman", Vec2Fixed::from_ints(3, 3)).is_err());
        assert_eq!(sim.store().len(), before);

        let unit = sim.spawn_unit(0, "rifleman", Vec2Fixed::from_ints(10, 10)).unwrap();
        assert!(sim.teleport(unit, Vec2Fixed::from_ints(10, 99)).is_err());
        assert_eq!(sim.store().get(unit).unwrap().position, Vec2Fixed::from_ints(10, 10));
        assert!(sim.consistency_errors().is_empty());
    }

    #[test]
    fn test_orders_apply_on_next_tick() {
        let mut sim = sim();
        let unit = sim.spawn_unit(0, "rifleman", Vec2Fixed::from_ints(10, 10)).unwrap();
        sim.tick();

        let destination = Vec2Fixed::from_ints(12, 10);
        sim.submit(PlayerOrder::new(
            0,
            OrderKind::Move {
                units: vec![unit],
                destination,
            },
        ));
        let unit_order = |sim: &Simulation| sim.store().get(unit).and_then(Entity::as_unit).unwrap().order;
        assert_eq!(unit_order(&sim), Order::Idle);
        sim.tick();
        assert!(matches!(unit_order(&sim), Order::Move(_) | Order::Idle));
        assert_ne!(sim.store().get(unit).unwrap().position, Vec2Fixed::from_ints(10, 10));
    }

    #[test]
    fn test_production_through_orders() {
        let mut sim = sim();
        let building = hq(&sim, 0);
        sim.submit(PlayerOrder::new(
            0,
            OrderKind::Produce {
                building,
                item: "rifleman".into(),
            },
        ));
        let mut spawned = Vec::new();
        for _ in 0..5 {
            spawned.extend(sim.tick().spawned_units());
        }
        assert_eq!(spawned.len(), 1);
        assert_eq!(sim.player(0).unwrap().credits, 400);
    }

    #[test]
    fn test_rejected_order_is_reported() {
        let mut sim = sim();
        let enemy_hq = hq(&sim, 1);
        sim.submit(PlayerOrder::new(0, OrderKind::Sell { building: enemy_hq }));
        let events = sim.tick();
        assert!(matches!(
            events.diagnostics.as_slice(),
            [Diagnostic::OrderRejected { player: 0, .. }]
        ));
        assert!(sim.store().resolve(enemy_hq).is_some());
    }

    #[test]
    fn test_destroyed_hq_defeats_player() {
        let mut sim = sim();
        let enemy_hq = hq(&sim, 1);
        sim.despawn(enemy_hq).unwrap();
        let events = sim.tick();
        assert!(events.destroyed().any(|id| id == enemy_hq));
        assert!(events
            .events
            .iter()
            .any(|e| matches!(e, SimEvent::PlayerDefeated { player: 1 })));
        assert!(!sim.spatial().contains(enemy_hq));
        assert!(sim.terrain().occupant(29, 29).is_none());
        assert_eq!(sim.winner(), Some(0));
    }

    #[test]
    fn test_state_hash_tracks_changes() {
        let mut a = sim();
        let mut b = sim();
        assert_eq!(a.state_hash(), b.state_hash());
        a.tick();
        b.tick();
        assert_eq!(a.state_hash(), b.state_hash());
        a.spawn_unit(0, "rifleman", Vec2Fixed::from_ints(5, 9)).unwrap();
        assert_ne!(a.state_hash(), b.state_hash());
    }
}
