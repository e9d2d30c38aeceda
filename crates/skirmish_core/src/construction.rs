//! The production phase: construction, queue progress and delivery.
//!
//! Finished units appear on the nearest open cell around their building.
//! Finished buildings are placed on the nearest free footprint around the
//! producer and start under construction. When nothing fits, the item stays
//! at the head of the queue and delivery is retried every tick.

use tracing::{debug, trace};

use crate::components::{
    Building, BuildingState, Entity, EntityId, EntityKind, Footprint, Health, Order, PlayerId,
    Unit,
};
use crate::config::SimConfig;
use crate::data::income_for;
use crate::economy::{collect_income, recompute_power, Player};
use crate::events::{Diagnostic, Exhaustion, SimEvent, TickEvents};
use crate::math::{Fixed, Vec2Fixed};
use crate::orders::{enqueue, DeferredOrder};
use crate::production::{
    BlueprintRegistry, BuildingBlueprint, EnqueueOutcome, ProductionKind, UnitBlueprint,
};
use crate::spatial::SpatialIndex;
use crate::store::EntityStore;
use crate::terrain::{footprint_cells, ring_cells, TerrainGrid};

/// World state touched by the production phase.
pub(crate) struct ProductionPhase<'a> {
    pub store: &'a mut EntityStore,
    pub spatial: &'a mut SpatialIndex,
    pub terrain: &'a mut TerrainGrid,
    pub players: &'a mut [Player],
    pub registry: &'a BlueprintRegistry,
    pub config: &'a SimConfig,
    pub deferred: &'a mut Vec<DeferredOrder>,
    pub events: &'a mut TickEvents,
    pub tick: u64,
}

impl ProductionPhase<'_> {
    /// Run power, deferred orders, construction, queues and income.
    pub fn run(&mut self) {
        recompute_power(self.players, self.store);
        self.retry_deferred();

        for id in self.store.sorted_ids() {
            self.advance_building(id);
        }

        // Buildings finished this tick count from now on.
        recompute_power(self.players, self.store);
        collect_income(self.players, self.store, self.events);
    }

    fn retry_deferred(&mut self) {
        let pending = std::mem::take(self.deferred);
        for order in pending {
            if self.tick > order.expires_at {
                debug!(player = order.player, building = order.building, "deferred order expired");
                self.events.diagnose(Diagnostic::DeferredOrderExpired {
                    player: order.player,
                    building: order.building,
                });
                continue;
            }
            if self.store.resolve(order.building).is_none() {
                continue;
            }
            match enqueue(
                self.store,
                self.players,
                self.registry,
                order.player,
                order.building,
                order.item,
            ) {
                Ok(EnqueueOutcome::Queued) => {}
                Ok(EnqueueOutcome::QueueFull) => self.deferred.push(order),
                Err(error) => {
                    debug!(player = order.player, %error, "deferred order dropped");
                    self.events.diagnose(Diagnostic::rejected(order.player, &error));
                }
            }
        }
    }

    fn advance_building(&mut self, id: EntityId) {
        let Some(entity) = self.store.resolve(id) else {
            return;
        };
        let owner = entity.owner;
        let Some(player) = self.players.get(owner as usize) else {
            return;
        };
        if player.defeated {
            return;
        }
        let rate = player.power_ratio();

        let Some(building) = self.store.get_mut(id).and_then(Entity::as_building_mut) else {
            return;
        };

        if matches!(building.state, BuildingState::UnderConstruction { .. }) {
            if building.advance_construction(rate) {
                let building_type = building.building_type;
                debug!(building = id, owner, "construction complete");
                self.events.push(SimEvent::BuildingCompleted {
                    id,
                    owner,
                    building_type,
                });
            }
            return;
        }
        if !building.is_active() {
            return;
        }

        let Some(head) = building.queue.current_mut() else {
            return;
        };
        head.advance(rate);
        if !head.is_complete() {
            return;
        }
        let item = head.kind;
        let rally = building.rally_point;

        if self.deliver(id, owner, item, rally) {
            if let Some(building) = self.store.get_mut(id).and_then(Entity::as_building_mut) {
                building.queue.pop_complete();
            }
        } else {
            trace!(building = id, "no room to deliver, holding item");
            self.events.diagnose(Diagnostic::ResourceExhausted {
                building: id,
                reason: Exhaustion::NoSpawnCell,
            });
        }
    }

    /// Place a finished item. Returns `false` if there was no room.
    fn deliver(
        &mut self,
        producer: EntityId,
        owner: PlayerId,
        item: ProductionKind,
        rally: Option<Vec2Fixed>,
    ) -> bool {
        let team = self.players.get(owner as usize).map_or(owner, |p| p.team);
        match item {
            ProductionKind::Unit(unit_type) => {
                let Some(blueprint) = self.registry.unit(unit_type) else {
                    return false;
                };
                let Some(cell) = self.find_spawn_cell(producer) else {
                    return false;
                };
                let position = self.terrain.grid_to_world(cell.0, cell.1);
                let id = spawn_unit(self.store, self.spatial, blueprint, owner, team, position);
                if let (Some(point), Some(unit)) =
                    (rally, self.store.get_mut(id).and_then(Entity::as_unit_mut))
                {
                    unit.order = Order::FollowRally(point);
                }
                self.events.push(SimEvent::UnitSpawned {
                    id,
                    owner,
                    unit_type,
                    position,
                });
                true
            }
            ProductionKind::Building(building_type) => {
                let Some(blueprint) = self.registry.building(building_type) else {
                    return false;
                };
                let Some(origin) = self.find_building_site(producer, blueprint.footprint) else {
                    return false;
                };
                let id = spawn_building(
                    self.store,
                    self.spatial,
                    self.terrain,
                    blueprint,
                    owner,
                    team,
                    origin,
                    true,
                );
                let position = self.terrain.footprint_center(origin.0, origin.1, blueprint.footprint);
                self.events.push(SimEvent::BuildingPlaced {
                    id,
                    owner,
                    building_type,
                    position,
                });
                if self
                    .store
                    .get(id)
                    .and_then(Entity::as_building)
                    .is_some_and(Building::is_active)
                {
                    self.events.push(SimEvent::BuildingCompleted {
                        id,
                        owner,
                        building_type,
                    });
                }
                true
            }
        }
    }

    /// Center cell and search radius around a producer.
    fn search_area(&self, producer: EntityId) -> Option<((u32, u32), u32)> {
        let entity = self.store.get(producer)?;
        let footprint = entity.as_building().map_or(Footprint::new(1, 1), |b| b.footprint);
        let center = self.terrain.world_to_grid(entity.position)?;
        let reach = u32::from(footprint.width.max(footprint.height)).div_ceil(2);
        Some((center, reach + self.config.spawn_search_radius))
    }

    /// Nearest open cell with no unit standing on it, ring by ring.
    fn find_spawn_cell(&self, producer: EntityId) -> Option<(u32, u32)> {
        let ((cx, cy), radius) = self.search_area(producer)?;
        let clearance = self.terrain.cell_size() / Fixed::from_num(2);
        (1..=radius)
            .flat_map(|r| ring_cells(cx, cy, r))
            .find(|&(x, y)| {
                self.terrain.is_open(x, y)
                    && !self.unit_near(self.terrain.grid_to_world(x, y), clearance)
            })
    }

    /// Nearest top-left cell where `footprint` fits with no unit inside.
    fn find_building_site(&self, producer: EntityId, footprint: Footprint) -> Option<(u32, u32)> {
        let ((cx, cy), radius) = self.search_area(producer)?;
        let reach = radius + u32::from(footprint.width.max(footprint.height));
        (1..=reach).flat_map(|r| ring_cells(cx, cy, r)).find(|&(x, y)| {
            self.terrain.footprint_fits(x, y, footprint)
                && footprint_cells(x, y, footprint).all(|(fx, fy)| {
                    !self.unit_near(
                        self.terrain.grid_to_world(fx, fy),
                        self.terrain.cell_size() / Fixed::from_num(2),
                    )
                })
        })
    }

    fn unit_near(&self, point: Vec2Fixed, radius: Fixed) -> bool {
        self.spatial
            .query_circle(point, radius)
            .into_iter()
            .filter_map(|id| self.store.resolve(id))
            .any(|e| e.as_unit().is_some())
    }
}

/// Create a unit from its blueprint and index it.
pub(crate) fn spawn_unit(
    store: &mut EntityStore,
    spatial: &mut SpatialIndex,
    blueprint: &UnitBlueprint,
    owner: PlayerId,
    team: u8,
    position: Vec2Fixed,
) -> EntityId {
    let mut unit = Unit::new(blueprint.id, blueprint.class, blueprint.speed);
    unit.weapon = blueprint.weapon;
    unit.sight = blueprint.sight;
    let id = store.spawn(|id| Entity {
        id,
        owner,
        team,
        position,
        health: Health::new(blueprint.health),
        kind: EntityKind::Unit(unit),
    });
    spatial.insert(id, position);
    id
}

/// Create a building with top-left cell `origin`, occupy its footprint and
/// index it. Buildings with no construction time start active.
#[allow(clippy::too_many_arguments)]
pub(crate) fn spawn_building(
    store: &mut EntityStore,
    spatial: &mut SpatialIndex,
    terrain: &mut TerrainGrid,
    blueprint: &BuildingBlueprint,
    owner: PlayerId,
    team: u8,
    origin: (u32, u32),
    under_construction: bool,
) -> EntityId {
    let position = terrain.footprint_center(origin.0, origin.1, blueprint.footprint);
    let mut building = Building::new(blueprint.id, blueprint.footprint);
    building.power_output = blueprint.power_output;
    building.power_usage = blueprint.power_usage;
    building.income = income_for(blueprint);
    building.weapon = blueprint.weapon;
    if under_construction && blueprint.construction_time > 0 {
        building.state = BuildingState::UnderConstruction {
            progress: Fixed::ZERO,
            total: blueprint.construction_time,
        };
    }

    let id = store.spawn(|id| Entity {
        id,
        owner,
        team,
        position,
        health: Health::new(blueprint.health),
        kind: EntityKind::Building(building),
    });
    terrain.occupy(origin.0, origin.1, blueprint.footprint, id);
    spatial.insert(id, position);
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::UnitClass;
    use crate::economy::Controller;
    use crate::production::{BuildingTypeId, UnitTypeId};
    use crate::terrain::TerrainCell;

    struct World {
        store: EntityStore,
        spatial: SpatialIndex,
        terrain: TerrainGrid,
        players: Vec<Player>,
        registry: BlueprintRegistry,
        config: SimConfig,
        deferred: Vec<DeferredOrder>,
        tick: u64,
    }

    impl World {
        fn new(credits: u32) -> (Self, BuildingTypeId, UnitTypeId) {
            let mut registry = BlueprintRegistry::new();
            let soldier = registry.register_unit(UnitBlueprint {
                id: UnitTypeId(0),
                name: "soldier".into(),
                cost: 100,
                build_time: 2,
                health: 40,
                class: UnitClass::Infantry,
                speed: Fixed::ONE,
                sight: Fixed::from_num(6),
                weapon: None,
            });
            let barracks = registry.register_building(BuildingBlueprint {
                id: BuildingTypeId(0),
                name: "barracks".into(),
                cost: 300,
                build_time: 4,
                construction_time: 4,
                health: 200,
                footprint: Footprint::new(2, 2),
                power_output: 0,
                power_usage: 0,
                income: 0,
                income_interval: 0,
                weapon: None,
                produces: vec![ProductionKind::Unit(soldier)],
                is_headquarters: false,
            });
            let world = Self {
                store: EntityStore::new(),
                spatial: SpatialIndex::new(Fixed::from_num(4)),
                terrain: TerrainGrid::new(12, 12, Fixed::ONE),
                players: vec![Player::new(0, 0, credits, Controller::Human)],
                registry,
                config: SimConfig::default(),
                deferred: Vec::new(),
                tick: 0,
            };
            (world, barracks, soldier)
        }

        fn place(&mut self, building: BuildingTypeId, origin: (u32, u32)) -> EntityId {
            let blueprint = self.registry.building(building).cloned().unwrap();
            spawn_building(
                &mut self.store,
                &mut self.spatial,
                &mut self.terrain,
                &blueprint,
                0,
                0,
                origin,
                false,
            )
        }

        fn tick(&mut self) -> TickEvents {
            self.tick += 1;
            let mut events = TickEvents::new(self.tick);
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
            events
        }

        fn enqueue(&mut self, building: EntityId, item: ProductionKind) -> EnqueueOutcome {
            enqueue(&mut self.store, &mut self.players, &self.registry, 0, building, item).unwrap()
        }
    }

    #[test]
    fn test_unit_spawns_next_to_building() {
        let (mut world, barracks, soldier) = World::new(1000);
        let b = world.place(barracks, (5, 5));
        world.enqueue(b, ProductionKind::Unit(soldier));

        assert_eq!(world.tick().spawned_units().count(), 0);
        let events = world.tick();
        let spawned: Vec<_> = events.spawned_units().collect();
        assert_eq!(spawned.len(), 1);

        let unit = world.store.get(spawned[0]).unwrap();
        let cell = world.terrain.world_to_grid(unit.position).unwrap();
        assert!(world.terrain.is_open(cell.0, cell.1));
        assert!(world.spatial.contains(spawned[0]));
        assert_eq!(world.players[0].credits, 900);
    }

    #[test]
    fn test_rally_point_gives_follow_order() {
        let (mut world, barracks, soldier) = World::new(1000);
        let b = world.place(barracks, (5, 5));
        let rally = Vec2Fixed::from_ints(1, 1);
        world.store.get_mut(b).and_then(Entity::as_building_mut).unwrap().rally_point = Some(rally);
        world.enqueue(b, ProductionKind::Unit(soldier));
        world.tick();
        let id = world.tick().spawned_units().next().unwrap();
        assert_eq!(
            world.store.get(id).and_then(Entity::as_unit).unwrap().order,
            Order::FollowRally(rally)
        );
    }

    #[test]
    fn test_held_item_delivered_once_space_frees() {
        let (mut world, barracks, soldier) = World::new(1000);
        let b = world.place(barracks, (5, 5));
        // Wall off every cell within reach
        for y in 0..12 {
            for x in 0..12 {
                if world.terrain.occupant(x, y).is_none() {
                    world.terrain.set_cell(x, y, TerrainCell::from_symbol('~').unwrap());
                }
            }
        }
        world.enqueue(b, ProductionKind::Unit(soldier));
        for _ in 0..5 {
            let events = world.tick();
            assert_eq!(events.spawned_units().count(), 0);
        }
        let last = world.tick();
        assert!(last.diagnostics.iter().any(|d| matches!(
            d,
            Diagnostic::ResourceExhausted {
                reason: Exhaustion::NoSpawnCell,
                ..
            }
        )));
        assert_eq!(
            world.store.get(b).and_then(Entity::as_building).unwrap().queue.len(),
            1
        );

        world.terrain.set_cell(4, 4, TerrainCell::default());
        let spawned: Vec<_> = world.tick().spawned_units().collect();
        assert_eq!(spawned.len(), 1);
        let position = world.store.get(spawned[0]).unwrap().position;
        assert_eq!(world.terrain.world_to_grid(position), Some((4, 4)));
    }

    #[test]
    fn test_power_shortage_slows_production() {
        let (mut world, barracks, soldier) = World::new(1000);
        let b = world.place(barracks, (5, 5));
        {
            let building = world.store.get_mut(b).and_then(Entity::as_building_mut).unwrap();
            building.power_usage = 10;
        }
        let generator = world.place(barracks, (0, 0));
        world
            .store
            .get_mut(generator)
            .and_then(Entity::as_building_mut)
            .unwrap()
            .power_output = 5;
        world.enqueue(b, ProductionKind::Unit(soldier));

        // Build time 2 at half power takes 4 ticks
        for _ in 0..3 {
            assert_eq!(world.tick().spawned_units().count(), 0);
        }
        assert_eq!(world.tick().spawned_units().count(), 1);
    }

    #[test]
    fn test_produced_building_is_placed_under_construction() {
        let (mut world, barracks, _) = World::new(2000);
        let producer = world.place(barracks, (5, 5));
        world
            .registry
            .building_mut(barracks)
            .unwrap()
            .produces
            .push(ProductionKind::Building(barracks));
        world.enqueue(producer, ProductionKind::Building(barracks));

        let mut placed = None;
        for _ in 0..4 {
            for event in world.tick().events {
                if let SimEvent::BuildingPlaced { id, .. } = event {
                    placed = Some(id);
                }
            }
        }
        let placed = placed.unwrap();
        let building = world.store.get(placed).and_then(Entity::as_building).unwrap();
        assert!(!building.is_active());

        let mut completed = false;
        for _ in 0..4 {
            completed |= world
                .tick()
                .events
                .iter()
                .any(|e| matches!(e, SimEvent::BuildingCompleted { id, .. } if *id == placed));
        }
        assert!(completed);
    }

    #[test]
    fn test_deferred_order_retried_then_expires() {
        let (mut world, barracks, soldier) = World::new(10_000);
        let b = world.place(barracks, (5, 5));
        for _ in 0..5 {
            world.enqueue(b, ProductionKind::Unit(soldier));
        }
        assert_eq!(world.enqueue(b, ProductionKind::Unit(soldier)), EnqueueOutcome::QueueFull);
        world.deferred.push(DeferredOrder {
            player: 0,
            building: b,
            item: ProductionKind::Unit(soldier),
            expires_at: 100,
        });

        // First unit finishes on tick 2, freeing a slot for the deferred one
        world.tick();
        world.tick();
        world.tick();
        assert!(world.deferred.is_empty());
        assert_eq!(
            world.store.get(b).and_then(Entity::as_building).unwrap().queue.len(),
            5
        );

        world.deferred.push(DeferredOrder {
            player: 0,
            building: b,
            item: ProductionKind::Unit(soldier),
            expires_at: world.tick,
        });
        world.tick();
        world.tick();
        assert!(world.deferred.is_empty());
    }
}
